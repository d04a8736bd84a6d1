//! Reader handle (spec §3/§4.4/§4.5): owns a random-access [`Reader`],
//! enumerates the central directory, and extracts individual entries.

use crate::config::Config;
use crate::error::{Result, ZipError};
pub use crate::extractor::GetDataOptions;
use crate::extractor;
use crate::io_traits::{Reader, Writer};
pub use crate::model::EntryMetadata as ZipEntry;
use crate::model::EntryMap;
use crate::parser;

/// Owns a [`Reader`] and a lazily-parsed central directory. Lives for one
/// enumeration + extraction session (spec §3 "Reader handle").
pub struct ZipReader<R: Reader> {
    reader: R,
    config: Config,
    initialized: bool,
    entries: Option<EntryMap>,
}

impl<R: Reader> ZipReader<R> {
    /// Wrap `reader` with the default [`Config`].
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, Config::default())
    }

    /// Wrap `reader` with an explicit [`Config`] (spec §9 "Global mutable
    /// configuration" — values are passed to the constructor, not read from
    /// a process-wide default mutated by a `configure` call).
    pub fn with_config(reader: R, config: Config) -> Self {
        Self {
            reader,
            config,
            initialized: false,
            entries: None,
        }
    }

    async fn ensure_initialized(&mut self) -> Result<()> {
        if !self.initialized {
            self.reader.init().await?;
            self.initialized = true;
        }
        Ok(())
    }

    /// Parse (if not already parsed) and return the central directory
    /// entries, in their on-disk order.
    pub async fn get_entries(&mut self) -> Result<Vec<ZipEntry>> {
        self.ensure_parsed().await?;
        Ok(self
            .entries
            .as_ref()
            .expect("just parsed")
            .values()
            .cloned()
            .collect())
    }

    /// Look up one entry by name without forcing extraction.
    pub async fn find_entry(&mut self, name: &str) -> Result<Option<ZipEntry>> {
        self.ensure_parsed().await?;
        Ok(self.entries.as_ref().expect("just parsed").get(name).cloned())
    }

    async fn ensure_parsed(&mut self) -> Result<()> {
        self.ensure_initialized().await?;
        if self.entries.is_none() {
            let parsed = parser::parse(&mut self.reader).await?;
            self.entries = Some(parsed.entries);
        }
        Ok(())
    }

    /// Extract the named entry's payload into `writer`, returning
    /// `writer.get_data()`'s result (spec §4.5).
    pub async fn get_data(
        &mut self,
        name: &str,
        options: GetDataOptions<'_>,
        writer: &mut dyn Writer,
    ) -> Result<Vec<u8>> {
        self.ensure_parsed().await?;
        let meta = self
            .entries
            .as_ref()
            .expect("just parsed")
            .get(name)
            .cloned()
            .ok_or_else(|| ZipError::EntryNotFound(name.to_string()))?;
        extractor::extract(&mut self.reader, &meta, self.config.chunk_size, options, writer).await
    }
}
