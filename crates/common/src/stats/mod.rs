//! Review statistics and pagination helpers
//!
//! Pure computations over already-fetched data: per-user sentiment
//! aggregates for the profile view and page counts for catalog search.

use crate::db::models::Sentiment;
use serde::{Deserialize, Serialize};

/// Sentiment aggregate over a user's reviews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub positive_percent: f64,
    pub negative_percent: f64,
}

impl ReviewStats {
    /// Aggregate a sequence of sentiments
    ///
    /// The result depends only on the multiset of labels, not their order.
    /// Percent fields are 0 for an empty input, never a division fault.
    pub fn from_sentiments<I>(sentiments: I) -> Self
    where
        I: IntoIterator<Item = Sentiment>,
    {
        let mut total = 0usize;
        let mut positive = 0usize;

        for sentiment in sentiments {
            total += 1;
            if sentiment == Sentiment::Positive {
                positive += 1;
            }
        }

        let negative = total - positive;

        let (positive_percent, negative_percent) = if total > 0 {
            (
                (positive as f64 / total as f64) * 100.0,
                (negative as f64 / total as f64) * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            total,
            positive,
            negative,
            positive_percent,
            negative_percent,
        }
    }
}

/// Number of pages needed to display `total_results` at `page_size` per page
///
/// Ceiling division; zero results means zero pages. The caller is responsible
/// for coercing a malformed upstream count to 0 before invoking this.
pub fn page_count(total_results: u64, page_size: u64) -> u64 {
    total_results.div_ceil(page_size)
}
