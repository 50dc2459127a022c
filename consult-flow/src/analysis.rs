use serde::{Deserialize, Serialize};

/// The four free-text fields the model is constrained to return.
/// Values are surfaced verbatim; nothing beyond JSON conformance is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub graft: String,
    pub recovery_time: String,
    pub suggested_method: String,
    pub summary: String,
}
