// HTTP layer - axum routes and handlers.
// Handlers stay thin: parse, call the core service, map the outcome to a status.

pub mod error;

pub mod routes;

pub mod server;

pub mod state;

pub use server::serve;
pub use state::AppState;
