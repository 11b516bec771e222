use crate::part::Outcome;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator correction of a finalized verdict (false positive/negative audit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub car_id: String,
    pub original_outcome: Outcome,
    pub real_outcome: Outcome,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
