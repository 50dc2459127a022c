pub mod appointment;
pub mod gemini;
pub mod models;
pub mod prompts;
pub mod service;

pub use gemini::GeminiClient;
pub use service::{AppState, create_app};
