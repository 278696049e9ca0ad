//! Wire adapter: framing and TCP connections to the debugger server.
//!
//! - [`codec::FrameDecoder`] splits the byte stream into messages
//! - [`connection::TcpConnection`] implements the `MessageChannel` port
//! - [`connection::TcpConnector`] implements the `Connector` port

pub mod codec;
pub mod connection;
pub mod error;
