pub mod filter;
pub mod handlers;
pub mod prompts;
pub mod scorer;

pub use filter::matches_preferences;
pub use scorer::MatchScorer;
