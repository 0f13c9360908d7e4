//! Review entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sentiment label enum
///
/// Two-class closed world: every stored review is exactly one of the two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    /// Class index as used by the training pipeline (positive = 1)
    pub fn class_index(&self) -> u8 {
        match self {
            Sentiment::Positive => 1,
            Sentiment::Negative => 0,
        }
    }
}

impl From<String> for Sentiment {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Positive" => Sentiment::Positive,
            _ => Sentiment::Negative,
        }
    }
}

impl From<Sentiment> for String {
    fn from(sentiment: Sentiment) -> Self {
        match sentiment {
            Sentiment::Positive => "Positive".to_string(),
            Sentiment::Negative => "Negative".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text")]
    pub sentiment: String,

    /// Maximum class probability at creation time, never recomputed
    pub confidence: f64,

    /// External catalog identifier, null when the review is free-standing
    #[sea_orm(column_type = "Text", nullable)]
    pub imdb_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the sentiment label as an enum
    pub fn label(&self) -> Sentiment {
        Sentiment::from(self.sentiment.clone())
    }

    /// Confidence formatted as a percentage with one decimal place
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}", self.confidence * 100.0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_string_roundtrip() {
        assert_eq!(Sentiment::from(String::from(Sentiment::Positive)), Sentiment::Positive);
        assert_eq!(Sentiment::from(String::from(Sentiment::Negative)), Sentiment::Negative);
        assert_eq!(Sentiment::from("garbage".to_string()), Sentiment::Negative);
    }

    #[test]
    fn test_class_index() {
        assert_eq!(Sentiment::Positive.class_index(), 1);
        assert_eq!(Sentiment::Negative.class_index(), 0);
    }

    #[test]
    fn test_confidence_percent_formatting() {
        let review = Model {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            content: "fine".to_string(),
            sentiment: "Positive".to_string(),
            confidence: 0.876_54,
            imdb_id: None,
            created_at: chrono::DateTime::UNIX_EPOCH.into(),
        };
        assert_eq!(review.confidence_percent(), "87.7");
    }
}
