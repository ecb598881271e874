// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "feedback/mod.rs"]
pub mod feedback;

#[path = "notifications/mod.rs"]
pub mod notifications;
