use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::AnalysisResponse;
use crate::chat::{ChatSession, Message, Transcript, WELCOME_MESSAGE};
use crate::error::{ConsultError, Result};
use crate::form::FormData;

/// The five screens of the wizard. The current value decides what is
/// rendered; it only ever changes through [`WizardState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Welcome,
    Form,
    Analysis,
    Chat,
    Appointment,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Welcome => "welcome",
            Step::Form => "form",
            Step::Analysis => "analysis",
            Step::Chat => "chat",
            Step::Appointment => "appointment",
        }
    }
}

/// Every way the wizard state can change. User actions and the two network
/// outcomes, nothing else.
#[derive(Debug, Clone)]
pub enum WizardEvent {
    Start,
    FormSubmitted(FormData),
    AnalysisReady(AnalysisResponse),
    AnalysisFailed(String),
    ContinueToChat,
    BookAppointment,
    CloseAppointment,
}

impl WizardEvent {
    fn name(&self) -> &'static str {
        match self {
            WizardEvent::Start => "start",
            WizardEvent::FormSubmitted(_) => "submit-form",
            WizardEvent::AnalysisReady(_) => "analysis-ready",
            WizardEvent::AnalysisFailed(_) => "analysis-failed",
            WizardEvent::ContinueToChat => "continue",
            WizardEvent::BookAppointment => "book-appointment",
            WizardEvent::CloseAppointment => "close-appointment",
        }
    }
}

/// The whole wizard in one value: current step, the most recent form and
/// analysis, the user-facing error, the transcript and the model-side chat
/// session. One reducer applies events; illegal transitions are rejected,
/// never coerced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardState {
    pub step: Step,
    pub form: Option<FormData>,
    pub analysis: Option<AnalysisResponse>,
    pub error: Option<String>,
    /// True while the one-shot analysis request is outstanding. The form
    /// accepts no input during this window.
    pub analysis_pending: bool,
    /// True while a chat exchange is streaming. Only one at a time.
    pub exchange_in_flight: bool,
    pub transcript: Transcript,
    pub chat: Option<ChatSession>,
}

impl WizardState {
    pub fn new() -> Self {
        Self {
            step: Step::Welcome,
            form: None,
            analysis: None,
            error: None,
            analysis_pending: false,
            exchange_in_flight: false,
            transcript: Transcript::default(),
            chat: None,
        }
    }

    pub fn apply(&mut self, event: WizardEvent) -> Result<()> {
        debug!(step = self.step.as_str(), event = event.name(), "applying event");
        match (self.step, event) {
            (Step::Welcome, WizardEvent::Start) => {
                self.step = Step::Form;
                Ok(())
            }
            (Step::Form, WizardEvent::FormSubmitted(form)) => {
                if self.analysis_pending {
                    return Err(ConsultError::InvalidTransition {
                        step: self.step,
                        event: "submit-form",
                    });
                }
                form.validate()?;
                // Stale results from an earlier attempt never survive a
                // new submission.
                self.error = None;
                self.analysis = None;
                self.form = Some(form);
                self.analysis_pending = true;
                Ok(())
            }
            (Step::Form, WizardEvent::AnalysisReady(analysis)) if self.analysis_pending => {
                self.analysis = Some(analysis);
                self.analysis_pending = false;
                self.step = Step::Analysis;
                Ok(())
            }
            (Step::Form, WizardEvent::AnalysisFailed(message)) if self.analysis_pending => {
                self.analysis_pending = false;
                self.error = Some(message);
                Ok(())
            }
            (Step::Analysis, WizardEvent::ContinueToChat) => {
                let summary = self
                    .analysis
                    .as_ref()
                    .map(|analysis| analysis.summary.clone())
                    .ok_or(ConsultError::InvalidTransition {
                        step: Step::Analysis,
                        event: "continue",
                    })?;
                if self.chat.is_none() {
                    self.chat = Some(ChatSession::for_analysis(&summary));
                }
                if self.transcript.is_empty() {
                    self.transcript.push(Message::model(WELCOME_MESSAGE));
                }
                self.step = Step::Chat;
                Ok(())
            }
            (Step::Chat, WizardEvent::BookAppointment) => {
                self.step = Step::Appointment;
                Ok(())
            }
            (Step::Appointment, WizardEvent::CloseAppointment) => {
                self.step = Step::Chat;
                Ok(())
            }
            (step, event) => Err(ConsultError::InvalidTransition {
                step,
                event: event.name(),
            }),
        }
    }

    /// Opens a chat exchange: records the user's message and the placeholder
    /// the streamed reply will grow into. Rejected while another exchange is
    /// in flight.
    pub fn begin_exchange(&mut self, user_turn: &str) -> Result<()> {
        if self.step != Step::Chat {
            return Err(ConsultError::InvalidTransition {
                step: self.step,
                event: "send-message",
            });
        }
        if self.exchange_in_flight {
            return Err(ConsultError::ExchangeInFlight);
        }
        self.transcript.push(Message::user(user_turn));
        self.transcript.begin_reply()?;
        self.exchange_in_flight = true;
        Ok(())
    }

    /// Appends one streamed fragment to the in-progress reply.
    pub fn append_fragment(&mut self, fragment: &str) -> Result<()> {
        self.transcript.push_fragment(fragment)
    }

    /// Closes the exchange: seals the transcript entry and records the turn
    /// in the model-side history. Returns the full reply text.
    pub fn complete_exchange(&mut self, user_turn: &str) -> Result<String> {
        let reply = self.transcript.finish_reply()?;
        if let Some(chat) = &mut self.chat {
            chat.record_exchange(user_turn, &reply);
        }
        self.exchange_in_flight = false;
        Ok(reply)
    }

    /// Closes the exchange after a stream failure: the placeholder becomes
    /// the fixed apology and the turn stays out of the model-side history.
    pub fn fail_exchange(&mut self) {
        self.transcript.abort_reply();
        self.exchange_in_flight = false;
    }
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}
