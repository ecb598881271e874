// Core feedback module - submission flow and the storage port.

pub mod feedback_models;
pub mod feedback_service;

pub use feedback_models::*;
pub use feedback_service::*;
