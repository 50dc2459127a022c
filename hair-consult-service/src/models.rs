use consult_flow::{AnalysisResponse, Message, Session};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Snapshot of one session's wizard state, returned by every endpoint that
/// touches it. Stands in for the screen render.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub step: String,
    pub analysis_pending: bool,
    pub exchange_in_flight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub transcript: Vec<Message>,
}

impl SessionView {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            step: session.state.step.as_str().to_string(),
            analysis_pending: session.state.analysis_pending,
            exchange_in_flight: session.state.exchange_in_flight,
            analysis: session.state.analysis.clone(),
            error: session.state.error.clone(),
            transcript: session.state.transcript.messages().to_vec(),
        }
    }
}
