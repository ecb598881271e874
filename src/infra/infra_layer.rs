// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "feedback/mod.rs"]
pub mod feedback;

#[path = "email/mod.rs"]
pub mod email;
