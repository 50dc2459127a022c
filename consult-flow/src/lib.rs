pub mod analysis;
pub mod chat;
pub mod error;
pub mod form;
pub mod provider;
pub mod step;
pub mod storage;

// Re-export commonly used types
pub use analysis::AnalysisResponse;
pub use chat::{APOLOGY_MESSAGE, ChatSession, Message, Role, Transcript, WELCOME_MESSAGE};
pub use error::{ConsultError, Result};
pub use form::{
    ACCEPTED_PHOTO_TYPES, FormData, GOAL_OPTIONS, Gender, HairLossLevel, MAX_PHOTO_BYTES, Photo,
    PreviousOperation,
};
pub use provider::{FragmentStream, GenerativeProvider};
pub use step::{Step, WizardEvent, WizardState};
pub use storage::{InMemorySessionStorage, Session, SessionStorage};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::StreamExt;

    struct CannedProvider;

    #[async_trait]
    impl GenerativeProvider for CannedProvider {
        async fn generate_analysis(&self, _form: &FormData) -> Result<AnalysisResponse> {
            Ok(AnalysisResponse {
                graft: "2800-3000 Greft".to_string(),
                recovery_time: "10-14 Gün".to_string(),
                suggested_method: "DHI Tekniği".to_string(),
                summary: "Saç çizgisi restorasyonu için uygun bir adaysınız.".to_string(),
            })
        }

        async fn stream_chat(
            &self,
            _session: &ChatSession,
            _user_turn: &str,
        ) -> Result<FragmentStream> {
            let fragments: Vec<Result<String>> = ["İyileşme ", "süreci ", "genellikle sorunsuzdur."]
                .into_iter()
                .map(|fragment| Ok(fragment.to_string()))
                .collect();
            Ok(Box::pin(futures_util::stream::iter(fragments)))
        }
    }

    fn sample_form() -> FormData {
        FormData {
            age: "29".to_string(),
            gender: Gender::Male,
            hair_loss_level: HairLossLevel::Norwood4,
            previous_operation: PreviousOperation::No,
            goals: vec![GOAL_OPTIONS[0].to_string(), GOAL_OPTIONS[3].to_string()],
            photo: None,
        }
    }

    #[tokio::test]
    async fn full_wizard_flow() {
        let provider = CannedProvider;
        let mut state = WizardState::new();

        state.apply(WizardEvent::Start).unwrap();
        let form = sample_form();
        state.apply(WizardEvent::FormSubmitted(form.clone())).unwrap();

        let analysis = provider.generate_analysis(&form).await.unwrap();
        state.apply(WizardEvent::AnalysisReady(analysis)).unwrap();
        state.apply(WizardEvent::ContinueToChat).unwrap();
        assert_eq!(state.step, Step::Chat);

        let chat = state.chat.clone().unwrap();
        state.begin_exchange("İyileşme süreci nasıl işliyor?").unwrap();
        let mut stream = provider
            .stream_chat(&chat, "İyileşme süreci nasıl işliyor?")
            .await
            .unwrap();
        while let Some(fragment) = stream.next().await {
            state.append_fragment(&fragment.unwrap()).unwrap();
        }
        let reply = state
            .complete_exchange("İyileşme süreci nasıl işliyor?")
            .unwrap();
        assert_eq!(reply, "İyileşme süreci genellikle sorunsuzdur.");

        state.apply(WizardEvent::BookAppointment).unwrap();
        state.apply(WizardEvent::CloseAppointment).unwrap();
        assert_eq!(state.step, Step::Chat);
        assert_eq!(state.transcript.len(), 3);
    }

    #[tokio::test]
    async fn session_storage_round_trip() {
        let storage = InMemorySessionStorage::new();

        let mut session = Session::new();
        session.state.apply(WizardEvent::Start).unwrap();
        let id = session.id.clone();

        storage.save(session).await.unwrap();
        let restored = storage.get(&id).await.unwrap().unwrap();
        assert_eq!(restored.state.step, Step::Form);

        storage.delete(&id).await.unwrap();
        assert!(storage.get(&id).await.unwrap().is_none());
    }
}
