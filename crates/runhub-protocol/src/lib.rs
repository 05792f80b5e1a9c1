//! Type definitions for the runhub wire protocol.
//!
//! This crate is the shared contract between the execution server and its
//! clients: the batch request/response bodies, the messages exchanged over an
//! interactive `/connect` session, the application close codes and the fixed
//! set of signal names a client may deliver to a running job.
//!
//! ## Example
//!
//! ```rust
//! use runhub_protocol::{ServerMessage, Stage};
//!
//! let msg = ServerMessage::stage(Stage::Run);
//! assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"type":"stage","stage":"run"}"#);
//! ```

pub mod close;
pub mod error;
pub mod messages;
pub mod request;
pub mod result;
pub mod runtime;
pub mod signal;

pub use close::*;
pub use error::*;
pub use messages::*;
pub use request::*;
pub use result::*;
pub use runtime::*;
pub use signal::*;
