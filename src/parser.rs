//! Container parser (spec §4.4): locates the EOCDR and Zip64 trailer, walks
//! the central directory, and decodes extra fields into [`EntryMetadata`].

use crate::cp437;
use crate::error::{Result, ZipError};
use crate::io_traits::Reader;
use crate::model::{
    bit_flag, AesExtra, EntryMap, EntryMetadata, ExtraFields, Zip64Extra, EXTRA_TAG_AES,
    EXTRA_TAG_ZIP64, SENTINEL_32,
};
use indexmap::IndexMap;

const EOCDR_SIG: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
const ZIP64_LOCATOR_SIG: [u8; 4] = [0x50, 0x4b, 0x06, 0x07];
const ZIP64_EOCDR_SIG: [u8; 4] = [0x50, 0x4b, 0x06, 0x06];
const CDH_SIG: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];

const EOCDR_FIXED_LEN: u64 = 22;
const ZIP64_LOCATOR_LEN: u64 = 20;
const ZIP64_EOCDR_LEN: u64 = 56;
const CDH_FIXED_LEN: u64 = 46;
const MAX_COMMENT_LEN: u64 = 65535;

/// Result of walking the whole central directory.
pub struct ParsedArchive {
    pub entries: EntryMap,
    /// Whether the EOCDR escalated to the Zip64 trailer.
    pub zip64: bool,
}

/// Locate the EOCDR and walk the central directory it points at (spec
/// §4.4, steps 1-7).
pub async fn parse(reader: &mut dyn Reader) -> Result<ParsedArchive> {
    let size = reader.size();
    let (eocdr_offset, eocdr) = find_eocdr(reader, size).await?;

    let entries_16 = u16::from_le_bytes([eocdr[10], eocdr[11]]);
    let cd_size_32 = u32::from_le_bytes(eocdr[12..16].try_into().unwrap());
    let cd_offset_32 = u32::from_le_bytes(eocdr[16..20].try_into().unwrap());

    let mut entry_count = entries_16 as u64;
    let mut cd_offset = cd_offset_32 as u64;
    let mut zip64 = false;

    if cd_size_32 == u32::MAX || entries_16 == u16::MAX {
        zip64 = true;
        if eocdr_offset < ZIP64_LOCATOR_LEN {
            return Err(ZipError::EndOfCentralDirectoryLocatorZip64NotFound);
        }
        let locator = reader
            .read(eocdr_offset - ZIP64_LOCATOR_LEN, ZIP64_LOCATOR_LEN)
            .await?;
        if locator[0..4] != ZIP64_LOCATOR_SIG {
            return Err(ZipError::EndOfCentralDirectoryLocatorZip64NotFound);
        }
        let zip64_eocdr_offset = u64::from_le_bytes(locator[8..16].try_into().unwrap());
        let zip64_eocdr = reader.read(zip64_eocdr_offset, ZIP64_EOCDR_LEN).await?;
        if zip64_eocdr[0..4] != ZIP64_EOCDR_SIG {
            return Err(ZipError::EndOfCentralDirectoryZip64NotFound);
        }
        entry_count = u64::from_le_bytes(zip64_eocdr[32..40].try_into().unwrap());
        cd_offset = u64::from_le_bytes(zip64_eocdr[48..56].try_into().unwrap());
    }

    let mut entries: EntryMap = IndexMap::with_capacity(entry_count as usize);
    let mut offset = cd_offset;
    for _ in 0..entry_count {
        let (name, meta, consumed) = parse_central_directory_header(reader, offset).await?;
        offset += consumed;
        entries.insert(name, meta);
    }

    Ok(ParsedArchive { entries, zip64 })
}

/// EOCDR search (spec §4.4): try the fixed 22-byte tail first (the common
/// case of no archive comment), then scan backward through up to
/// `22 + 65535` bytes for the signature.
async fn find_eocdr(reader: &mut dyn Reader, size: u64) -> Result<(u64, Vec<u8>)> {
    if size >= EOCDR_FIXED_LEN {
        let tail_offset = size - EOCDR_FIXED_LEN;
        let tail = reader.read(tail_offset, EOCDR_FIXED_LEN).await?;
        if tail[0..4] == EOCDR_SIG {
            return Ok((tail_offset, tail));
        }
    }

    let scan_len = std::cmp::min(size, EOCDR_FIXED_LEN + MAX_COMMENT_LEN);
    let scan_offset = size - scan_len;
    let buf = reader.read(scan_offset, scan_len).await?;

    for i in (0..buf.len().saturating_sub(3)).rev() {
        if buf[i..i + 4] == EOCDR_SIG {
            let offset = scan_offset + i as u64;
            let fixed = reader.read(offset, EOCDR_FIXED_LEN).await?;
            return Ok((offset, fixed));
        }
    }

    Err(ZipError::EndOfCentralDirectoryNotFound)
}

/// Decode one central directory header, returning the entry name, its
/// metadata, and the total byte length consumed (fixed header + name +
/// extra + comment), so the caller can advance to the next record.
async fn parse_central_directory_header(
    reader: &mut dyn Reader,
    offset: u64,
) -> Result<(String, EntryMetadata, u64)> {
    let fixed = reader.read(offset, CDH_FIXED_LEN).await?;
    if fixed[0..4] != CDH_SIG {
        return Err(ZipError::CentralDirectoryHeaderNotFound);
    }

    let version_needed = u16::from_le_bytes([fixed[6], fixed[7]]);
    let bit_flag_value = u16::from_le_bytes([fixed[8], fixed[9]]);
    let compression_method = u16::from_le_bytes([fixed[10], fixed[11]]);
    let mod_time = u16::from_le_bytes([fixed[12], fixed[13]]);
    let mod_date = u16::from_le_bytes([fixed[14], fixed[15]]);
    let crc32 = u32::from_le_bytes(fixed[16..20].try_into().unwrap());
    let compressed_size_32 = u32::from_le_bytes(fixed[20..24].try_into().unwrap());
    let uncompressed_size_32 = u32::from_le_bytes(fixed[24..28].try_into().unwrap());
    let name_len = u16::from_le_bytes([fixed[28], fixed[29]]) as u64;
    let extra_len = u16::from_le_bytes([fixed[30], fixed[31]]) as u64;
    let comment_len = u16::from_le_bytes([fixed[32], fixed[33]]) as u64;
    let external_attrs = u32::from_le_bytes(fixed[38..42].try_into().unwrap());
    let local_header_offset_32 = u32::from_le_bytes(fixed[42..46].try_into().unwrap());

    let variable = reader
        .read(offset + CDH_FIXED_LEN, name_len + extra_len + comment_len)
        .await?;
    let name_bytes = &variable[0..name_len as usize];
    let extra_bytes = &variable[name_len as usize..(name_len + extra_len) as usize];
    let comment_bytes = &variable[(name_len + extra_len) as usize..];

    let is_utf8 = bit_flag_value & bit_flag::UTF8_NAME != 0;
    let decode = |bytes: &[u8]| -> Result<String> {
        if is_utf8 {
            String::from_utf8(bytes.to_vec())
                .map_err(|_| ZipError::BadFormat("invalid UTF-8 in entry name/comment".into()))
        } else {
            Ok(cp437::decode(bytes))
        }
    };
    let name = decode(name_bytes)?;
    let comment = decode(comment_bytes)?;

    let extra_field = ExtraFields::parse(extra_bytes);

    let mut uncompressed_size = uncompressed_size_32 as u64;
    let mut compressed_size = compressed_size_32 as u64;
    let mut local_header_offset = local_header_offset_32 as u64;

    let needs_uncompressed = uncompressed_size_32 == SENTINEL_32;
    let needs_compressed = compressed_size_32 == SENTINEL_32;
    let needs_offset = local_header_offset_32 == SENTINEL_32;

    if needs_uncompressed || needs_compressed || needs_offset {
        let payload = extra_field
            .get(EXTRA_TAG_ZIP64)
            .ok_or(ZipError::ExtraFieldZip64NotFound)?;
        let zip64 = Zip64Extra::parse(payload, needs_uncompressed, needs_compressed, needs_offset)?;
        if let Some(v) = zip64.uncompressed_size {
            uncompressed_size = v;
        }
        if let Some(v) = zip64.compressed_size {
            compressed_size = v;
        }
        if let Some(v) = zip64.local_header_offset {
            local_header_offset = v;
        }
    }

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

    let directory = external_attrs & 0x10 != 0 || name.ends_with('/');

    let meta = EntryMetadata {
        name: name.clone(),
        comment,
        directory,
        version_needed,
        bit_flag: bit_flag_value,
        compression_method,
        last_mod_date_time: ((mod_date as u32) << 16) | mod_time as u32,
        crc32,
        compressed_size,
        uncompressed_size,
        local_header_offset,
        extra_field,
        aes,
        force_zip64: false,
    };

    let consumed = CDH_FIXED_LEN + name_len + extra_len + comment_len;
    Ok((name, meta, consumed))
}
