//! Consolidated test mocks for the runhub workspace
//!
//! A scripted execution backend that counts its lifecycle calls, and an
//! in-memory session transport for driving the session controller without
//! sockets.

pub mod backend;
pub mod transport;

pub use backend::*;
pub use transport::*;
