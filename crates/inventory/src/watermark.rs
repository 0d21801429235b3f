use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Last calendar day the reconciliation has confirmed as fully processed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub last_processed: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl Watermark {
    pub fn new(last_processed: NaiveDate, updated_at: DateTime<Utc>) -> Self {
        Self {
            last_processed,
            updated_at,
        }
    }
}
