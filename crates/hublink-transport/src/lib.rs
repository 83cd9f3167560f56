//! TCP transport layer for the hublink gateway protocol.
//!
//! Wraps a plain `std::net::TcpStream` with the settings the protocol
//! requires (no send coalescing) and the small set of operations the
//! connection engine needs: connect, clone for a reader thread, and
//! orderly shutdown.

mod error;
mod tcp;

pub use error::{Result, TransportError};
pub use tcp::{is_reset_by_peer, GatewaySocket};
