use std::fmt;

/// Errors surfaced by the connection layer.
#[derive(Debug)]
pub enum NetError {
    /// Socket I/O failure. Drops the affected peer; other peers keep
    /// being served.
    Transport(std::io::Error),
    /// Malformed bytes. The message is dropped; no peer penalty.
    Decode(&'static str),
    /// A frame declared a length above the protocol limit.
    FrameTooLarge(usize),
}

impl From<std::io::Error> for NetError {
    fn from(e: std::io::Error) -> Self {
        NetError::Transport(e)
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::Transport(e) => write!(f, "transport error: {e}"),
            NetError::Decode(msg) => write!(f, "decode error: {msg}"),
            NetError::FrameTooLarge(len) => write!(f, "frame of {len} bytes exceeds limit"),
        }
    }
}

impl std::error::Error for NetError {}
