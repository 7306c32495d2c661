//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → request.rs (request ID minting)
//!     → operator endpoints | live reload | Site::dispatch
//!     → response.rs (HTML with cache markers, JSON envelopes)
//!     → Send to client
//! ```

pub mod livereload;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, UuidRequestId, X_REQUEST_ID};
pub use response::{json_error, json_success, Envelope};
pub use server::{AppState, HttpServer, ServerError};
