/// Errors that can occur while building, encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the classic CAN data length.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A binary frame record carries a length byte above the maximum.
    #[error("invalid frame length byte {0} (max 8)")]
    InvalidLength(u8),

    /// A filter expression could not be parsed.
    #[error("invalid filter {input:?}: {reason}")]
    InvalidFilter { input: String, reason: &'static str },

    /// A candump log line could not be parsed.
    #[error("invalid log line {line:?}: {reason}")]
    InvalidLogLine { line: String, reason: &'static str },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame record was received.
    #[error("stream closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
