//! Server communication: wire types and line transport

pub mod protocol;
pub mod transport;

pub use protocol::{Action, ServerMessage};
pub use transport::{LineTransport, Transport};
