use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::analysis::AnalysisResponse;
use crate::chat::ChatSession;
use crate::error::Result;
use crate::form::FormData;

/// Ordered fragments of one streamed reply. Finite and non-restartable:
/// it is consumed by exactly one in-flight exchange, and cancelling an
/// exchange just means no longer polling it.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// The hosted generative model, as the two call shapes the wizard needs.
/// Injecting this keeps every piece of flow logic testable with
/// deterministic fakes.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Single-turn structured generation: prompt built from the form
    /// (photo inlined when present), reply constrained to the analysis
    /// schema. No partial results: any transport, schema or parse failure
    /// surfaces as one error.
    async fn generate_analysis(&self, form: &FormData) -> Result<AnalysisResponse>;

    /// One chat turn against the persistent session. The reply arrives as
    /// a stream of text fragments that concatenate in arrival order.
    async fn stream_chat(
        &self,
        session: &ChatSession,
        user_turn: &str,
    ) -> Result<FragmentStream>;
}
