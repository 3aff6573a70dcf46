use serde::{Deserialize, Serialize};

/// A persisted consultation session: one room's one continuous
/// consultation, from join to teardown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub room: String,
    /// Rolling summary produced by the summarize branch, carried forward
    /// as the `prior_summary` input to the next graph run.
    pub prior_summary: String,
    pub created_at: String,
    pub updated_at: String,
}
