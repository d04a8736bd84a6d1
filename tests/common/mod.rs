//! In-memory `Reader`/`Writer` fixtures for integration tests.
//!
//! Concrete I/O adapters are out of scope for the library itself (spec §1 —
//! "concrete I/O adapters... are external collaborators"), so these live
//! only under `tests/`, standing in for a real file/blob/HTTP-range backend.

use streaming_zip::{Reader, Result, Writer};

#[derive(Clone, Default)]
pub struct VecReader {
    data: Vec<u8>,
}

impl VecReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[async_trait::async_trait]
impl Reader for VecReader {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn init(&mut self) -> Result<()> {
        Ok(())
    }

    async fn read(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let start = offset as usize;
        let end = start + length as usize;
        Ok(self.data[start..end].to_vec())
    }
}

#[derive(Default)]
pub struct VecWriter {
    pub buf: Vec<u8>,
}

#[async_trait::async_trait]
impl Writer for VecWriter {
    fn size(&self) -> u64 {
        self.buf.len() as u64
    }

    async fn init(&mut self) -> Result<()> {
        Ok(())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    async fn get_data(&self) -> Result<Vec<u8>> {
        Ok(self.buf.clone())
    }
}
