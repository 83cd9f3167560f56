/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared packet length is smaller than the fixed header.
    #[error("invalid packet length {length} (minimum 8)")]
    InvalidLength { length: u8 },

    /// The payload exceeds the 8-bit length field's budget.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
