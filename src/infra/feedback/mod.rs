pub mod sqlite_feedback_store;

pub use sqlite_feedback_store::SqliteFeedbackStore;
