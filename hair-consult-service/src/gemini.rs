use anyhow::anyhow;
use async_trait::async_trait;
use consult_flow::{
    AnalysisResponse, ChatSession, ConsultError, FormData, FragmentStream, GenerativeProvider,
    Role,
};
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::prompts;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Client for the hosted generative model. One instance serves both call
/// shapes the wizard needs: single-turn structured generation and the
/// streamed chat turns.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Reads `GEMINI_API_KEY` (required) and `GEMINI_MODEL` (optional)
    /// from the environment.
    pub fn from_env() -> consult_flow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConsultError::MissingCredential("GEMINI_API_KEY"))?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_key, model))
    }

    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{API_BASE}/{}:{method}", self.model)
    }

    /// Issues one non-streaming generateContent call and pulls the reply
    /// text out of the response envelope.
    async fn generate_content(&self, payload: Value) -> anyhow::Result<String> {
        let response = self
            .http
            .post(self.endpoint("generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("model request failed: {}", response.status()));
        }

        let body: Value = response.json().await?;
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow!("unexpected response shape from model"))?;

        Ok(text.to_string())
    }
}

/// Content for the analysis request: the prompt, plus the photo as inline
/// data when one was uploaded.
fn contents_for_form(form: &FormData) -> Value {
    let mut parts = vec![json!({ "text": prompts::analysis_prompt(form) })];
    if let Some(photo) = &form.photo {
        parts.push(json!({
            "inline_data": {
                "mime_type": photo.mime_type,
                "data": photo.base64,
            }
        }));
    }
    json!([{ "role": "user", "parts": parts }])
}

/// Content for a chat turn: the session history followed by the new user turn.
fn contents_for_chat(session: &ChatSession, user_turn: &str) -> Value {
    let mut contents: Vec<Value> = session
        .history
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::User => "user",
                Role::Model => "model",
            };
            json!({ "role": role, "parts": [{ "text": message.text }] })
        })
        .collect();
    contents.push(json!({ "role": "user", "parts": [{ "text": user_turn }] }));
    Value::Array(contents)
}

/// Pulls the concatenated text parts out of one streamed chunk, if it
/// carries any.
fn fragment_from_chunk(chunk: &Value) -> Option<String> {
    let parts = chunk["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();
    if text.is_empty() { None } else { Some(text) }
}

/// Splits complete SSE lines off the front of the buffer and returns the
/// `data:` payloads among them. Incomplete trailing lines stay buffered.
fn drain_sse_data(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(newline) = buffer.find('\n') {
        let line: String = buffer.drain(..=newline).collect();
        let line = line.trim();
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if !data.is_empty() && data != "[DONE]" {
                payloads.push(data.to_string());
            }
        }
    }
    payloads
}

#[async_trait]
impl GenerativeProvider for GeminiClient {
    async fn generate_analysis(&self, form: &FormData) -> consult_flow::Result<AnalysisResponse> {
        let payload = json!({
            "system_instruction": { "parts": [{ "text": prompts::ANALYSIS_SYSTEM_INSTRUCTION }] },
            "contents": contents_for_form(form),
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": prompts::analysis_schema(),
            },
        });

        let text = self
            .generate_content(payload)
            .await
            .map_err(|e| ConsultError::Provider(e.to_string()))?;

        serde_json::from_str::<AnalysisResponse>(text.trim())
            .map_err(|e| ConsultError::Provider(format!("malformed analysis payload: {e}")))
    }

    async fn stream_chat(
        &self,
        session: &ChatSession,
        user_turn: &str,
    ) -> consult_flow::Result<FragmentStream> {
        let payload = json!({
            "system_instruction": { "parts": [{ "text": session.system_instruction }] },
            "contents": contents_for_chat(session, user_turn),
        });

        let response = self
            .http
            .post(format!("{}?alt=sse", self.endpoint("streamGenerateContent")))
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ConsultError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConsultError::Provider(format!(
                "model request failed: {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel::<consult_flow::Result<String>>(32);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(item) = bytes.next().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("chat stream transport error: {e}");
                        let _ = tx.send(Err(ConsultError::Provider(e.to_string()))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                for data in drain_sse_data(&mut buffer) {
                    match serde_json::from_str::<Value>(&data) {
                        Ok(value) => {
                            if let Some(fragment) = fragment_from_chunk(&value) {
                                if tx.send(Ok(fragment)).await.is_err() {
                                    // Receiver gone: the exchange was cancelled,
                                    // remaining fragments are ignored.
                                    return;
                                }
                            }
                        }
                        Err(e) => debug!("skipping unparseable stream chunk: {e}"),
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
