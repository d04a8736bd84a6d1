//! Error types for streaming-zip

use thiserror::Error;

/// Result type for streaming-zip operations
pub type Result<T> = std::result::Result<T, ZipError>;

/// Errors produced while parsing, extracting, emitting, or encrypting a ZIP archive.
#[derive(Debug, Error)]
pub enum ZipError {
    /// Propagated as-is from a `Reader`/`Writer` transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic malformed-container error not covered by a more specific kind.
    #[error("bad ZIP format: {0}")]
    BadFormat(String),

    #[error("end of central directory record not found")]
    EndOfCentralDirectoryNotFound,

    #[error("Zip64 end of central directory record not found")]
    EndOfCentralDirectoryZip64NotFound,

    #[error("Zip64 end of central directory locator not found")]
    EndOfCentralDirectoryLocatorZip64NotFound,

    #[error("central directory header not found at expected offset")]
    CentralDirectoryHeaderNotFound,

    #[error("local file header not found at expected offset")]
    LocalFileHeaderNotFound,

    #[error("Zip64 extra field missing a required sentinel value")]
    ExtraFieldZip64NotFound,

    #[error("unsupported compression method {0}")]
    UnsupportedCompression(u16),

    #[error("unsupported WinZip-AES strength {0}")]
    UnsupportedEncryption(u8),

    #[error("entry is password-protected but no password was supplied")]
    Encrypted,

    #[error("incorrect password")]
    InvalidPassword,

    #[error("signature verification failed (CRC-32 or HMAC mismatch)")]
    InvalidSignature,

    #[error("duplicate entry name: {0}")]
    DuplicatedName(String),

    #[error("archive comment exceeds 65535 bytes")]
    ZipFileCommentTooLarge,

    #[error("entry comment for {0} exceeds 65535 bytes")]
    FileEntryCommentTooLarge(String),

    #[error("both worker_scripts and worker_scripts_path were set")]
    ConfigConflict,

    #[error("no entry named {0} was found")]
    EntryNotFound(String),
}
