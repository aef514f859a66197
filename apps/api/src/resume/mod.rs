pub mod customizer;
pub mod handlers;
pub mod prompts;

pub use customizer::{CustomizedResume, ResumeCustomizer};
