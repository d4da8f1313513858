use super::AdvisoryError;

/// Language-model client abstraction (allows mocking).
pub trait LlmClient: Send + Sync {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, AdvisoryError>;
}
