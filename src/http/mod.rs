//! HTTP integration of the request context.
//!
//! # Data Flow
//! ```text
//! incoming request
//!     → request.rs (assign request ID, open context scope)
//!     → handler (records stamped with the request ID)
//!     → request.rs (access line, close context scope)
//!     → response with x-request-id
//! ```

pub mod request;
pub mod server;

pub use request::{request_context, with_request_context, X_REQUEST_ID};
pub use server::HttpServer;
