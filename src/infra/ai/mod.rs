pub mod gemini_moderation_client;

pub use gemini_moderation_client::GeminiModerationClient;
