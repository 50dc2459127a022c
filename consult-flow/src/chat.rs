use serde::{Deserialize, Serialize};

use crate::error::{ConsultError, Result};

/// Fixed greeting shown when the chat opens. Produced locally, never by the model.
pub const WELCOME_MESSAGE: &str = "Merhaba! Ben SmartConsult. Ön analiz sonuçlarınla ilgili aklına takılan her şeyi sorabilirsin. Örneğin, 'iyileşme süreci nasıl işliyor?' veya 'operasyon günü beni neler bekliyor?' gibi sorular sorabilirsin.";

/// Fixed text that replaces a reply whose stream failed mid-way.
pub const APOLOGY_MESSAGE: &str =
    "Üzgünüm, bir sorunla karşılaştım. Lütfen daha sonra tekrar dene.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Append-only conversation visible to the user.
///
/// At most one reply is in progress at a time; its fragments grow a single
/// placeholder entry in place. Completed entries are never rewritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
    in_progress: Option<usize>,
}

impl Transcript {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_streaming(&self) -> bool {
        self.in_progress.is_some()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Appends the empty placeholder entry the streamed reply will grow into.
    pub fn begin_reply(&mut self) -> Result<()> {
        if self.in_progress.is_some() {
            return Err(ConsultError::ExchangeInFlight);
        }
        self.messages.push(Message::model(""));
        self.in_progress = Some(self.messages.len() - 1);
        Ok(())
    }

    /// Appends one arrived fragment to the in-progress entry.
    pub fn push_fragment(&mut self, fragment: &str) -> Result<()> {
        let index = self.in_progress.ok_or(ConsultError::NoReplyInProgress)?;
        self.messages[index].text.push_str(fragment);
        Ok(())
    }

    /// Seals the in-progress entry and returns the full reply text.
    pub fn finish_reply(&mut self) -> Result<String> {
        let index = self.in_progress.take().ok_or(ConsultError::NoReplyInProgress)?;
        Ok(self.messages[index].text.clone())
    }

    /// Replaces the in-progress entry with the fixed apology. Everything
    /// already in the transcript stays as it is.
    pub fn abort_reply(&mut self) {
        if let Some(index) = self.in_progress.take() {
            self.messages[index].text = APOLOGY_MESSAGE.to_string();
        }
    }
}

/// Model-side state of the persistent chat: the system instruction the
/// session was opened with plus the turns actually exchanged with the model.
/// The fixed welcome message is not part of this history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub system_instruction: String,
    pub history: Vec<Message>,
}

impl ChatSession {
    /// Opens a session seeded with the preliminary analysis summary.
    pub fn for_analysis(summary: &str) -> Self {
        let system_instruction = format!(
            "You are SmartConsult, a friendly and knowledgeable assistant from Smile Hair Clinic. \
             Your role is to answer questions about the user's preliminary hair transplant analysis \
             and guide them. The initial analysis summary is: \"{summary}\". Be reassuring, clear, \
             and professional. Encourage the user to ask any questions they have. If asked about \
             topics outside of hair transplants or the clinic, gently steer the conversation back. \
             At the end of the conversation, suggest booking a detailed consultation with a human expert."
        );
        Self {
            system_instruction,
            history: Vec::new(),
        }
    }

    /// Records one completed exchange. Failed turns are never recorded, so a
    /// half-delivered reply cannot poison later turns.
    pub fn record_exchange(&mut self, user_turn: &str, reply: &str) {
        self.history.push(Message::user(user_turn));
        self.history.push(Message::model(reply));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_concatenate_into_one_entry() {
        let mut transcript = Transcript::default();
        transcript.push(Message::user("Merhaba"));
        transcript.begin_reply().unwrap();
        for fragment in ["Mer", "haba", "! Nasıl yardımcı olabilirim?"] {
            transcript.push_fragment(fragment).unwrap();
        }
        let reply = transcript.finish_reply().unwrap();
        assert_eq!(reply, "Merhaba! Nasıl yardımcı olabilirim?");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.messages()[1].text, reply);
    }

    #[test]
    fn transcript_is_append_only_across_exchanges() {
        let mut transcript = Transcript::default();
        transcript.push(Message::model(WELCOME_MESSAGE));
        for turn in 0..3 {
            transcript.push(Message::user(format!("soru {turn}")));
            transcript.begin_reply().unwrap();
            transcript.push_fragment("cevap").unwrap();
            transcript.finish_reply().unwrap();
        }
        assert_eq!(transcript.len(), 7);
        assert_eq!(transcript.messages()[0].text, WELCOME_MESSAGE);
        assert_eq!(transcript.messages()[1].text, "soru 0");
    }

    #[test]
    fn abort_replaces_only_the_placeholder() {
        let mut transcript = Transcript::default();
        transcript.push(Message::model(WELCOME_MESSAGE));
        transcript.push(Message::user("soru"));
        transcript.begin_reply().unwrap();
        transcript.push_fragment("yarım kalan").unwrap();
        transcript.abort_reply();
        assert!(!transcript.is_streaming());
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.messages()[2].text, APOLOGY_MESSAGE);
        assert_eq!(transcript.messages()[0].text, WELCOME_MESSAGE);
    }

    #[test]
    fn second_reply_cannot_start_while_one_is_open() {
        let mut transcript = Transcript::default();
        transcript.begin_reply().unwrap();
        assert!(matches!(
            transcript.begin_reply(),
            Err(ConsultError::ExchangeInFlight)
        ));
    }

    #[test]
    fn session_history_excludes_the_welcome_message() {
        let mut session = ChatSession::for_analysis("Kısa özet.");
        assert!(session.system_instruction.contains("Kısa özet."));
        assert!(session.history.is_empty());
        session.record_exchange("soru", "cevap");
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0], Message::user("soru"));
    }
}
