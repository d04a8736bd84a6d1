//! # streaming-zip: a streaming ZIP reader/writer
//!
//! `streaming-zip` parses and emits ZIP containers — including Zip64 and
//! WinZip-AES (compression method 99) — over abstract [`io_traits::Reader`]/
//! [`io_traits::Writer`] collaborators, so the whole pipeline works the same
//! whether the underlying bytes live on disk, in memory, or behind an HTTP
//! range fetcher. Concrete adapters for those transports are out of scope
//! for this crate (see `DESIGN.md`); bring your own by implementing
//! [`io_traits::Reader`] and [`io_traits::Writer`].
//!
//! ## What's in here
//!
//! - [`reader::ZipReader`] — enumerate a central directory and extract
//!   entries, with Zip64 and WinZip-AES support.
//! - [`writer::ZipWriter`] — append entries and emit a well-formed archive,
//!   auto-promoting to Zip64 at close when needed.
//! - [`config::Config`] — chunk size, worker concurrency, and dispatch
//!   knobs shared by both.
//!
//! ## Quick start
//!
//! ```ignore
//! use streaming_zip::reader::ZipReader;
//! use streaming_zip::writer::{AddOptions, ZipWriter};
//!
//! // `sink`/`source` implement `streaming_zip::io_traits::{Writer, Reader}`.
//! let writer = ZipWriter::new(sink);
//! writer.add("hello.txt", b"hello", AddOptions::default()).await?;
//! writer.close().await?;
//!
//! let mut reader = ZipReader::new(source);
//! for entry in reader.get_entries().await? {
//!     println!("{}: {} bytes", entry.name, entry.uncompressed_size);
//! }
//! # Ok::<(), streaming_zip::ZipError>(())
//! ```

pub mod codec;
pub mod config;
pub mod cp437;
pub mod crc32;
pub mod driver;
pub mod encryption;
pub mod error;
pub mod extractor;
pub mod io_traits;
pub mod model;
pub mod parallel;
pub mod parser;
pub mod reader;
pub mod writer;

pub use config::Config;
pub use error::{Result, ZipError};
pub use io_traits::{Codec, Reader, Writer};
pub use model::EntryMetadata;
pub use reader::{GetDataOptions, ZipEntry, ZipReader};
pub use writer::{AddOptions, ZipWriter};
