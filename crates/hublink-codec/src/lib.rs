//! Format-descriptor driven binary argument codec.
//!
//! Payloads are packed argument lists described by a compact format string:
//! space-separated tokens, each a type letter with an optional repeat count
//! (`"H"`, `"B3"`, `"s8"`). Encoding and decoding are purely positional —
//! no token is self-describing, so both peers must agree on the format or
//! the data corrupts silently. That agreement is a protocol contract, not
//! something this crate can check at runtime.

mod codec;
mod error;
mod format;
mod value;

pub use codec::{pack, unpack};
pub use error::{CodecError, Result};
pub use format::{parse_format, Token, TypeKind};
pub use value::Value;
