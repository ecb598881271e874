// Core moderation module - rule filter plus the AI-backed pipeline.
// Following the same pattern as the feedback module.

pub mod moderation_models;
pub mod moderation_service;
pub mod rule_filter;

pub use moderation_models::*;
pub use moderation_service::*;
