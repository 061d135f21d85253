use thiserror::Error;

/// Error kinds per spec §7.
#[derive(Debug, Error)]
pub enum GnutellaError {
    /// RPC timeout or connection failure.
    #[error("transport error talking to peer: {0}")]
    Transport(String),

    /// `obtain` called for a file the target leaf does not have.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Local I/O failed while reading or writing a file during a transfer.
    #[error("read error for {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// Duplicate `queryHit`, expired TTL, or unknown `messageId` — silently
    /// dropped by callers, but surfaced as an error variant so the drop is
    /// at least traceable in logs.
    #[error("protocol drop: {0}")]
    ProtocolDrop(String),
}
