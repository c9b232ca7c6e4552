//! HTTP surface (C9): the axum router, request/response shapes, and the
//! middleware that authenticates and error-maps every request.

pub mod auth_mw;
pub mod background;
pub mod error;
pub mod progress;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
