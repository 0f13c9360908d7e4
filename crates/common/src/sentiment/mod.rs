//! Sentiment classifier adapter
//!
//! Wraps the pre-trained TF-IDF + MLP pipeline behind a pure function
//! contract. The fitted pipeline is shipped as a versioned JSON artifact
//! (vocabulary with per-term idf weights, one hidden layer, one output
//! unit) exported from the training stack. The artifact is loaded once at
//! process start; a load failure is fatal, since no review can be scored
//! without it.
//!
//! Inference is deterministic: identical input text against an unchanged
//! artifact produces byte-identical output.

use crate::db::models::Sentiment;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Artifact schema version this build understands
pub const ARTIFACT_VERSION: u32 = 1;

/// Per-term entry in the fitted TF-IDF vocabulary
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TermWeight {
    /// Column index of the term in the feature vector
    pub index: usize,
    /// Inverse document frequency weight fitted at training time
    pub idf: f32,
}

/// Fully-connected hidden layer, one row of input weights per unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiddenLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

/// Output unit producing the positive-class logit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputLayer {
    pub weights: Vec<f32>,
    pub bias: f32,
}

/// Serialized form of the fitted pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentArtifact {
    pub version: u32,
    pub vocabulary: HashMap<String, TermWeight>,
    pub hidden: HiddenLayer,
    pub output: OutputLayer,
}

/// Result of classifying one review text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: Sentiment,
    /// Maximum posterior class probability, in [0.5, 1.0] for two classes
    pub confidence: f32,
}

impl Prediction {
    /// Confidence formatted as a percentage with one decimal place
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}", self.confidence * 100.0)
    }
}

/// The loaded, immutable sentiment model
#[derive(Debug)]
pub struct SentimentModel {
    artifact: SentimentArtifact,
    vocab_size: usize,
}

impl SentimentModel {
    /// Load the artifact from disk, failing fast on any read, parse,
    /// version, or shape problem
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::ModelLoad {
            message: format!("cannot read artifact {}: {}", path.display(), e),
        })?;

        let artifact: SentimentArtifact =
            serde_json::from_str(&raw).map_err(|e| AppError::ModelLoad {
                message: format!("cannot parse artifact {}: {}", path.display(), e),
            })?;

        let model = Self::from_artifact(artifact)?;

        tracing::info!(
            path = %path.display(),
            vocabulary = model.vocab_size,
            hidden_units = model.artifact.hidden.bias.len(),
            "Sentiment model loaded"
        );

        Ok(model)
    }

    /// Build a model from an already-deserialized artifact, validating shape
    pub fn from_artifact(artifact: SentimentArtifact) -> Result<Self> {
        if artifact.version != ARTIFACT_VERSION {
            return Err(AppError::ModelLoad {
                message: format!(
                    "artifact version {} does not match supported version {}",
                    artifact.version, ARTIFACT_VERSION
                ),
            });
        }

        let vocab_size = artifact.vocabulary.len();
        if vocab_size == 0 {
            return Err(AppError::ModelLoad {
                message: "artifact vocabulary is empty".to_string(),
            });
        }

        // Vocabulary indices must densely cover 0..vocab_size
        let mut seen = vec![false; vocab_size];
        for (term, weight) in &artifact.vocabulary {
            if weight.index >= vocab_size || seen[weight.index] {
                return Err(AppError::ModelLoad {
                    message: format!("invalid or duplicate vocabulary index for term '{}'", term),
                });
            }
            seen[weight.index] = true;
        }

        let hidden_units = artifact.hidden.bias.len();
        if hidden_units == 0 || artifact.hidden.weights.len() != hidden_units {
            return Err(AppError::ModelLoad {
                message: "hidden layer weight and bias counts do not match".to_string(),
            });
        }
        if artifact.hidden.weights.iter().any(|row| row.len() != vocab_size) {
            return Err(AppError::ModelLoad {
                message: "hidden layer weight rows do not match vocabulary size".to_string(),
            });
        }
        if artifact.output.weights.len() != hidden_units {
            return Err(AppError::ModelLoad {
                message: "output layer weights do not match hidden unit count".to_string(),
            });
        }

        Ok(Self {
            artifact,
            vocab_size,
        })
    }

    /// Classify review text into a sentiment label with a confidence score
    ///
    /// `confidence` is the maximum posterior probability across the two
    /// classes; `label` is Positive iff the positive class is the argmax.
    /// Empty text yields the pipeline's unconditioned prediction (an
    /// all-zero feature vector), no special-casing.
    pub fn classify(&self, text: &str) -> Prediction {
        let features = self.tfidf(text);
        let p_positive = self.forward(&features);

        let label = if p_positive >= 0.5 {
            Sentiment::Positive
        } else {
            Sentiment::Negative
        };

        Prediction {
            label,
            confidence: p_positive.max(1.0 - p_positive),
        }
    }

    /// Sparse l2-normalized TF-IDF feature vector for the given text
    fn tfidf(&self, text: &str) -> Vec<(usize, f32)> {
        let mut accumulated: HashMap<usize, f32> = HashMap::new();

        for token in tokenize(text) {
            // Terms outside the fitted vocabulary (including the stop words
            // the vectorizer dropped at training time) contribute nothing.
            if let Some(weight) = self.artifact.vocabulary.get(&token) {
                *accumulated.entry(weight.index).or_insert(0.0) += weight.idf;
            }
        }

        let norm = accumulated.values().map(|v| v * v).sum::<f32>().sqrt();

        let mut features: Vec<(usize, f32)> = if norm > 0.0 {
            accumulated
                .into_iter()
                .map(|(index, value)| (index, value / norm))
                .collect()
        } else {
            Vec::new()
        };

        // Fixed traversal order keeps the float accumulation bit-stable
        features.sort_unstable_by_key(|&(index, _)| index);
        features
    }

    /// Forward pass: ReLU hidden layer, sigmoid over the positive logit
    fn forward(&self, features: &[(usize, f32)]) -> f32 {
        let hidden = &self.artifact.hidden;

        let mut logit = self.artifact.output.bias;
        for (unit, row) in hidden.weights.iter().enumerate() {
            let mut sum = hidden.bias[unit];
            for &(index, value) in features {
                sum += row[index] * value;
            }
            let activation = sum.max(0.0);
            logit += self.artifact.output.weights[unit] * activation;
        }

        sigmoid(logit)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Lowercased alphanumeric tokens of at least two characters, matching the
/// training vectorizer's token pattern
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_artifact() -> SentimentArtifact {
        // One hidden unit per polarity; "wonderful" excites the positive
        // unit, "terrible" the negative one, "movie" neither.
        let vocabulary = HashMap::from([
            ("wonderful".to_string(), TermWeight { index: 0, idf: 1.0 }),
            ("terrible".to_string(), TermWeight { index: 1, idf: 1.0 }),
            ("movie".to_string(), TermWeight { index: 2, idf: 0.5 }),
        ]);

        SentimentArtifact {
            version: ARTIFACT_VERSION,
            vocabulary,
            hidden: HiddenLayer {
                weights: vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
                bias: vec![0.0, 0.0],
            },
            output: OutputLayer {
                weights: vec![4.0, -4.0],
                bias: 0.0,
            },
        }
    }

    fn toy_model() -> SentimentModel {
        SentimentModel::from_artifact(toy_artifact()).unwrap()
    }

    #[test]
    fn test_positive_review() {
        let model = toy_model();
        let prediction = model.classify("this movie was wonderful");
        assert_eq!(prediction.label, Sentiment::Positive);
        assert!(prediction.confidence >= 0.5);
        assert!(prediction.confidence <= 1.0);
    }

    #[test]
    fn test_negative_review() {
        let model = toy_model();
        let prediction = model.classify("a truly TERRIBLE movie");
        assert_eq!(prediction.label, Sentiment::Negative);
        assert!(prediction.confidence > 0.5);
    }

    #[test]
    fn test_confidence_is_max_posterior() {
        let model = toy_model();
        for text in ["wonderful", "terrible", "movie", ""] {
            let prediction = model.classify(text);
            assert!(prediction.confidence >= 0.5);
            assert!(prediction.confidence <= 1.0);
        }
    }

    #[test]
    fn test_empty_text_is_unconditioned() {
        let model = toy_model();
        let prediction = model.classify("");
        // All-zero features, zero biases: the toy pipeline sits at 0.5
        assert!((prediction.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_deterministic() {
        let model = toy_model();
        let text = "a wonderful, wonderful movie with one terrible scene";
        let a = model.classify(text);
        let b = model.classify(text);
        assert_eq!(a.label, b.label);
        assert_eq!(a.confidence.to_bits(), b.confidence.to_bits());
    }

    #[test]
    fn test_unknown_tokens_ignored() {
        let model = toy_model();
        let a = model.classify("wonderful");
        let b = model.classify("wonderful zzzzqqq the of");
        assert_eq!(a.confidence.to_bits(), b.confidence.to_bits());
    }

    #[test]
    fn test_confidence_percent_formatting() {
        let prediction = Prediction {
            label: Sentiment::Positive,
            confidence: 0.972_6,
        };
        assert_eq!(prediction.confidence_percent(), "97.3");
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut artifact = toy_artifact();
        artifact.version = ARTIFACT_VERSION + 1;
        assert!(SentimentModel::from_artifact(artifact).is_err());
    }

    #[test]
    fn test_ragged_hidden_layer_rejected() {
        let mut artifact = toy_artifact();
        artifact.hidden.weights[1] = vec![0.0, 1.0];
        assert!(SentimentModel::from_artifact(artifact).is_err());
    }

    #[test]
    fn test_duplicate_vocabulary_index_rejected() {
        let mut artifact = toy_artifact();
        artifact
            .vocabulary
            .insert("extra".to_string(), TermWeight { index: 0, idf: 1.0 });
        assert!(SentimentModel::from_artifact(artifact).is_err());
    }

    #[test]
    fn test_load_missing_artifact_fails() {
        let err = SentimentModel::load("/nonexistent/sentiment.json").unwrap_err();
        assert!(matches!(err, AppError::ModelLoad { .. }));
    }

    #[test]
    fn test_artifact_json_roundtrip() {
        let json = serde_json::to_string(&toy_artifact()).unwrap();
        let artifact: SentimentArtifact = serde_json::from_str(&json).unwrap();
        let model = SentimentModel::from_artifact(artifact).unwrap();
        assert_eq!(model.classify("wonderful").label, Sentiment::Positive);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("It's GREAT, 10/10 - no complaints!"),
            vec!["it", "great", "10", "10", "no", "complaints"]
        );
        assert!(tokenize("a I .").is_empty());
    }
}
