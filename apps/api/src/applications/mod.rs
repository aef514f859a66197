pub mod handlers;
pub mod registrar;

pub use registrar::{ApplicationRegistrar, SubmitOutcome};
