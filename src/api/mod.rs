//! HTTP interface: model listing, predictions, health, metrics and the
//! static frontend

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
