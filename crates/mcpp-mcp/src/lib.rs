//! MCP protocol client and tool invocation for mcpp.
//!
//! [`ProtocolClient`] drives `initialize → tools/list → tools/call` over a
//! spawned process's stdio or an HTTP endpoint. [`ToolCaller`] picks the
//! transport for a template and owns the lifetime of ephemeral servers.
#![deny(unused_crate_dependencies)]

mod caller;
mod client;
mod connection;
pub mod decoder;
mod error;
pub mod process;
pub mod protocol;
mod result;
mod session;
pub mod transport;

pub use caller::{ToolCallError, ToolCallErrorKind, ToolCaller};
pub use client::ProtocolClient;
pub use connection::{Connection, ConnectionInfo, Timeouts};
pub use error::ClientError;
pub use protocol::{ClientInfo, PROTOCOL_VERSION, ServerInfo};
pub use result::normalise_tool_result;
pub use session::{ConnectionStatus, SessionState};

#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use axum as _;
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tempfile as _;
