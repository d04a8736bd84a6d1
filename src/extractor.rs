//! Entry extractor (spec §4.5): parses the local file header, configures
//! the codec pipeline, and drives extraction through the chunked driver.

use crate::codec::InflatePipeline;
use crate::driver::{self, ProgressCallback};
use crate::encryption::{self, AesDecryptStage};
use crate::error::{Result, ZipError};
use crate::io_traits::{Reader, Writer};
use crate::model::{bit_flag, compression_method, AesExtra, EntryMetadata, ExtraFields, EXTRA_TAG_AES};

const LOCAL_FILE_HEADER_SIG: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const LOCAL_HEADER_FIXED_LEN: u64 = 30;

/// Per-call options for [`crate::reader::ZipReader::get_data`].
pub struct GetDataOptions<'a> {
    pub password: Option<&'a str>,
    pub check_signature: bool,
    pub on_progress: ProgressCallback<'a>,
}

impl Default for GetDataOptions<'_> {
    fn default() -> Self {
        Self {
            password: None,
            check_signature: true,
            on_progress: None,
        }
    }
}

/// Local file header fields needed to configure the codec and locate the
/// start of entry data. Re-decoded from the local header itself rather than
/// trusted from the central directory (spec §4.5 step 3: "name and
/// extra-field lengths may differ from central directory"), since the local
/// header — not the central directory — is what actually precedes the bytes
/// this function is about to stream.
struct LocalHeader {
    bit_flag: u16,
    compression_method: u16,
    aes: Option<AesExtra>,
    data_offset: u64,
}

impl LocalHeader {
    fn is_encrypted(&self) -> bool {
        self.bit_flag & bit_flag::ENCRYPTED != 0
    }

    /// The compression method extraction should actually apply — for AES
    /// entries this is the inner method recovered from the local header's
    /// own `0x9901` extra field, not the outer 99 (mirrors
    /// `EntryMetadata::logical_compression_method`).
    fn logical_compression_method(&self) -> u16 {
        match self.aes {
            Some(aes) => aes.inner_compression_method,
            None => self.compression_method,
        }
    }
}

async fn read_local_header(reader: &mut dyn Reader, offset: u64) -> Result<LocalHeader> {
    let fixed = reader.read(offset, LOCAL_HEADER_FIXED_LEN).await?;
    if fixed[0..4] != LOCAL_FILE_HEADER_SIG {
        return Err(ZipError::LocalFileHeaderNotFound);
    }
    let bit_flag_value = u16::from_le_bytes([fixed[6], fixed[7]]);
    let compression_method = u16::from_le_bytes([fixed[8], fixed[9]]);
    let name_len = u16::from_le_bytes([fixed[26], fixed[27]]) as u64;
    let extra_len = u16::from_le_bytes([fixed[28], fixed[29]]) as u64;

    let extra_bytes = reader
        .read(offset + LOCAL_HEADER_FIXED_LEN + name_len, extra_len)
        .await?;
    let extra_field = ExtraFields::parse(&extra_bytes);

    let mut aes = None;
    if bit_flag_value & bit_flag::ENCRYPTED != 0 {
        if let Some(payload) = extra_field.get(EXTRA_TAG_AES) {
            let parsed = AesExtra::parse(payload)?;
            if parsed.strength != AesExtra::STRENGTH_AES256 {
                return Err(ZipError::UnsupportedEncryption(parsed.strength));
            }
            aes = Some(parsed);
        }
    }

    Ok(LocalHeader {
        bit_flag: bit_flag_value,
        compression_method,
        aes,
        data_offset: offset + LOCAL_HEADER_FIXED_LEN + name_len + extra_len,
    })
}

/// Extract `meta`'s payload from `reader` into `writer`, returning whatever
/// `writer.get_data()` resolves to once the stream is complete (spec §4.5
/// step 7: "return writer.get_data()").
pub async fn extract(
    reader: &mut dyn Reader,
    meta: &EntryMetadata,
    chunk_size: usize,
    options: GetDataOptions<'_>,
    writer: &mut dyn Writer,
) -> Result<Vec<u8>> {
    if meta.directory {
        return writer.get_data().await;
    }

    let local = read_local_header(reader, meta.local_header_offset).await?;

    // Compression method and encryption are configured from the local
    // header's own fields, not the central directory's — they're re-decoded
    // above precisely because they may differ (spec §4.5 step 3).
    let logical_method = local.logical_compression_method();
    if logical_method != compression_method::STORE && logical_method != compression_method::DEFLATE {
        return Err(ZipError::UnsupportedCompression(logical_method));
    }

    let (region_offset, region_len, aes_stage) = if local.is_encrypted() {
        let password = options.password.ok_or(ZipError::Encrypted)?;
        let preamble = reader
            .read(local.data_offset, encryption::PREAMBLE_LEN as u64)
            .await?;
        let salt: [u8; encryption::SALT_LEN] = preamble[..encryption::SALT_LEN].try_into().unwrap();
        let verifier: [u8; encryption::VERIFIER_LEN] =
            preamble[encryption::SALT_LEN..].try_into().unwrap();
        let stage = AesDecryptStage::new(password, &salt, &verifier)?;
        (
            local.data_offset + encryption::PREAMBLE_LEN as u64,
            meta.compressed_size - encryption::PREAMBLE_LEN as u64,
            Some(stage),
        )
    } else {
        (local.data_offset, meta.compressed_size, None)
    };

    let expected_crc = (options.check_signature && aes_stage.is_none()).then_some(meta.crc32);

    let mut codec = InflatePipeline::new(
        logical_method == compression_method::DEFLATE,
        aes_stage,
        expected_crc,
    );

    driver::run_chunked(
        &mut codec,
        reader,
        writer,
        region_offset,
        region_len,
        chunk_size,
        options.on_progress,
    )
    .await?;

    writer.get_data().await
}
