use chrono::{DateTime, Utc};
use consult_flow::ConsultError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed simulated-processing delay before a request is declared received.
/// There is no backend behind this; the whole submission is a placeholder
/// for a future integration.
pub const PROCESSING_DELAY: Duration = Duration::from_millis(1500);

pub const CONFIRMATION_MESSAGE: &str =
    "Talebiniz alındı. Danışmanımız en kısa sürede sizinle iletişime geçecektir.";

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentRequest {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl AppointmentRequest {
    pub fn validate(&self) -> consult_flow::Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("phone", &self.phone),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(ConsultError::Validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentConfirmation {
    pub reference: String,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

impl AppointmentConfirmation {
    pub fn new() -> Self {
        Self {
            reference: format!("REQ-{:08X}", rand::random::<u32>()),
            message: CONFIRMATION_MESSAGE.to_string(),
            received_at: Utc::now(),
        }
    }
}

impl Default for AppointmentConfirmation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_three_fields_are_required() {
        let complete = AppointmentRequest {
            name: "Ayşe Yılmaz".to_string(),
            phone: "+90 555 000 00 00".to_string(),
            email: "ayse@example.com".to_string(),
        };
        assert!(complete.validate().is_ok());

        for missing in ["name", "phone", "email"] {
            let mut request = complete.clone();
            match missing {
                "name" => request.name = "  ".to_string(),
                "phone" => request.phone = String::new(),
                _ => request.email = String::new(),
            }
            let err = request.validate().unwrap_err();
            assert!(err.to_string().contains(missing));
        }
    }

    #[test]
    fn confirmation_carries_a_reference() {
        let confirmation = AppointmentConfirmation::new();
        assert!(confirmation.reference.starts_with("REQ-"));
        assert_eq!(confirmation.message, CONFIRMATION_MESSAGE);
    }
}
