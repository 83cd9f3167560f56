//! Client for the hublink gateway protocol.
//!
//! hublink talks to a gateway over one persistent TCP connection: requests
//! are correlated with responses by sequence number, unsolicited callbacks
//! are dispatched to registered handlers, and the connection heals itself
//! through keepalive probes and auto-reconnect.
//!
//! # Crate Structure
//!
//! - [`transport`] — TCP socket plumbing
//! - [`frame`] — wire packet model and stream framing
//! - [`codec`] — format-descriptor driven argument packing
//! - [`conn`] — connection lifecycle, correlation, and dispatch

/// Re-export transport types.
pub mod transport {
    pub use hublink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use hublink_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use hublink_codec::*;
}

/// Re-export connection types.
pub mod conn {
    pub use hublink_conn::*;
}
