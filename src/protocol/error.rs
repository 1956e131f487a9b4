/// Protocol parsing errors
#[derive(Debug)]
pub enum ProtocolError {
    InvalidMessage,
    InvalidUtf8(std::string::FromUtf8Error),
    UnknownMessageKind(u8),
    UnknownResultKind(u8),
    BatchTooLarge(i32),
    Io(std::io::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::InvalidMessage => write!(f, "invalid message"),
            ProtocolError::InvalidUtf8(e) => write!(f, "invalid UTF-8: {}", e),
            ProtocolError::UnknownMessageKind(k) => {
                write!(f, "unknown message kind: 0x{:02x}", k)
            }
            ProtocolError::UnknownResultKind(k) => {
                write!(f, "unknown result kind: 0x{:02x}", k)
            }
            ProtocolError::BatchTooLarge(count) => {
                write!(f, "transaction batch count {} exceeds maximum", count)
            }
            ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        ProtocolError::Io(e)
    }
}
