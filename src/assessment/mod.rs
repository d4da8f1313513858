pub mod detection;
pub mod engine;
pub mod messages;
pub mod normalize;
pub mod reference;
pub mod scoring;
pub mod types;

pub use engine::DefaultAssessmentEngine;
pub use reference::AllergenKnowledgeBase;
pub use types::*;
