pub mod notification_models;
pub mod notification_service;

pub use notification_models::EmailMessage;
pub use notification_service::{EmailError, Mailer, NotificationService};
