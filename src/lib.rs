pub mod advisory;
pub mod assessment;
pub mod config;
pub mod models;
pub mod service;
pub mod store;

use tracing_subscriber::EnvFilter;

pub use assessment::{
    AllergenKnowledgeBase, AllergyAssessment, AssessmentEngine, AssessmentError,
    DefaultAssessmentEngine,
};
pub use config::EngineConfig;
pub use models::{AllergyProfile, CartLine, CartSnapshot};

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter.
/// Calling it again is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
