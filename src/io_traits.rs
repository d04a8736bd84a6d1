//! External collaborator interfaces (spec §6): `Reader`, `Writer`, `Codec`.
//!
//! Concrete I/O adapters (in-memory buffers, blob-like objects, data URIs,
//! HTTP range fetchers) are out of scope (spec §1) — this crate only defines
//! the trait shapes they must implement. `async_trait` makes the traits
//! dyn-compatible so adapters can be supplied as `Box<dyn Reader>` /
//! `Box<dyn Writer>`, matching the pattern the teacher's own service crates
//! use for pluggable async backends.

use crate::error::Result;
use async_trait::async_trait;

/// Random-access byte source. `read` is idempotent and bounds-enforced: a
/// request past `size` is an error, not a short read.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Total length of the underlying byte source.
    fn size(&self) -> u64;

    /// One-time setup (e.g. opening a handle). Idempotent.
    async fn init(&mut self) -> Result<()>;

    /// Read exactly `length` bytes starting at `offset`.
    async fn read(&mut self, offset: u64, length: u64) -> Result<Vec<u8>>;
}

/// Append-only byte sink.
#[async_trait]
pub trait Writer: Send + Sync {
    /// Bytes written so far.
    fn size(&self) -> u64;

    /// One-time setup. Idempotent.
    async fn init(&mut self) -> Result<()>;

    /// Append bytes to the sink.
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Retrieve the sink's accumulated bytes (spec §6 "get_data() → Sink") —
    /// e.g. an in-memory buffer's contents, a blob handle, or a data URI.
    /// Callers that only need the written byte count, not the payload, can
    /// ignore the result.
    async fn get_data(&self) -> Result<Vec<u8>>;
}

/// Result of a [`Codec::flush`] call: trailing bytes plus whatever signature
/// the direction produces — a CRC-32 for unencrypted streams, an HMAC-SHA1
/// tag for encrypted ones.
#[derive(Debug, Clone, Default)]
pub struct FlushResult {
    pub data: Vec<u8>,
    pub signature: Option<Signature>,
}

#[derive(Debug, Clone)]
pub enum Signature {
    Crc32(u32),
    Tag(Vec<u8>),
}

/// One direction of the codec pipeline (spec §4.3): `append` consumes input
/// bytes and returns ready-to-write output bytes (the amount may lag input
/// due to internal buffering); `flush` drains everything left and returns
/// the final integrity signature.
#[async_trait]
pub trait Codec: Send {
    async fn append(&mut self, bytes: &[u8]) -> Result<Vec<u8>>;
    async fn flush(&mut self) -> Result<FlushResult>;
}
