//! Core data model: entry metadata, extra fields, MS-DOS date/time packing.

use indexmap::IndexMap;
use time::OffsetDateTime;

/// Recognized extra-field tag identifying a Zip64 extension record.
pub const EXTRA_TAG_ZIP64: u16 = 0x0001;
/// Recognized extra-field tag identifying a WinZip-AES extension record.
pub const EXTRA_TAG_AES: u16 = 0x9901;

/// 32-bit sentinel that forces a Zip64 extra-field escape.
pub const SENTINEL_32: u32 = 0xFFFF_FFFF;
/// 16-bit sentinel used by the classic EOCDR when Zip64-promoted.
pub const SENTINEL_16: u16 = 0xFFFF;
/// Ceiling on archive and per-entry comment length (spec §3).
pub const MAX_COMMENT_LEN: usize = 65535;

/// Bit-flag bit positions used by this implementation.
pub mod bit_flag {
    pub const ENCRYPTED: u16 = 1 << 0;
    pub const DATA_DESCRIPTOR: u16 = 1 << 3;
    pub const UTF8_NAME: u16 = 1 << 11;
}

/// Compression method as it appears on the wire (method 99 is WinZip-AES;
/// the *logical* inner method is tracked separately on [`EntryMetadata`]).
pub mod compression_method {
    pub const STORE: u16 = 0;
    pub const DEFLATE: u16 = 8;
    pub const WINZIP_AES: u16 = 99;
}

/// Ordered mapping from 16-bit extra-field tag to opaque payload bytes.
/// Ordering is insertion order, matching how entries were parsed or added.
#[derive(Debug, Clone, Default)]
pub struct ExtraFields {
    fields: Vec<(u16, Vec<u8>)>,
}

impl ExtraFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: u16, data: Vec<u8>) {
        if let Some(slot) = self.fields.iter_mut().find(|(t, _)| *t == tag) {
            slot.1 = data;
        } else {
            self.fields.push((tag, data));
        }
    }

    pub fn get(&self, tag: u16) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, d)| d.as_slice())
    }

    pub fn remove(&mut self, tag: u16) -> Option<Vec<u8>> {
        let idx = self.fields.iter().position(|(t, _)| *t == tag)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &[u8])> {
        self.fields.iter().map(|(t, d)| (*t, d.as_slice()))
    }

    /// Parse a raw on-disk extra-field block into the tag→bytes map.
    pub fn parse(raw: &[u8]) -> Self {
        let mut fields = Vec::new();
        let mut i = 0usize;
        while i + 4 <= raw.len() {
            let tag = u16::from_le_bytes([raw[i], raw[i + 1]]);
            let len = u16::from_le_bytes([raw[i + 2], raw[i + 3]]) as usize;
            i += 4;
            if i + len > raw.len() {
                break;
            }
            fields.push((tag, raw[i..i + len].to_vec()));
            i += len;
        }
        Self { fields }
    }

    /// Serialize back to the on-disk tag/len/data sequence.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (tag, data) in &self.fields {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
        out
    }

    pub fn len_bytes(&self) -> usize {
        self.fields.iter().map(|(_, d)| 4 + d.len()).sum()
    }
}

/// Decoded contents of the `0x0001` Zip64 extra field, in the fixed order
/// {uncompressed_size, compressed_size, local_header_offset} — only the
/// fields whose 32-bit counterpart was the `0xFFFFFFFF` sentinel are present
/// on read; on write all three are always emitted (spec §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct Zip64Extra {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub local_header_offset: Option<u64>,
}

impl Zip64Extra {
    /// Parse the Zip64 extra payload, consuming fields in listed order only
    /// for those that are sentineled in the 32-bit header.
    pub fn parse(
        payload: &[u8],
        need_uncompressed: bool,
        need_compressed: bool,
        need_offset: bool,
    ) -> crate::error::Result<Self> {
        let mut cursor = 0usize;
        let mut take = || -> crate::error::Result<u64> {
            if cursor + 8 > payload.len() {
                return Err(crate::error::ZipError::ExtraFieldZip64NotFound);
            }
            let v = u64::from_le_bytes(payload[cursor..cursor + 8].try_into().unwrap());
            cursor += 8;
            Ok(v)
        };
        let mut out = Zip64Extra::default();
        if need_uncompressed {
            out.uncompressed_size = Some(take()?);
        }
        if need_compressed {
            out.compressed_size = Some(take()?);
        }
        if need_offset {
            out.local_header_offset = Some(take()?);
        }
        Ok(out)
    }

    /// Serialize the 24-byte write-side payload (always all three fields,
    /// per spec §3's "on write" note).
    pub fn to_bytes_full(uncompressed: u64, compressed: u64, offset: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(24);
        out.extend_from_slice(&uncompressed.to_le_bytes());
        out.extend_from_slice(&compressed.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out
    }
}

/// Decoded contents of the `0x9901` WinZip-AES extra field: a 2-byte vendor
/// version (AE-1 or AE-2), 2-byte vendor id `"AE"`, 1-byte strength, and a
/// 2-byte inner compression method — 7 bytes total.
#[derive(Debug, Clone, Copy)]
pub struct AesExtra {
    /// 1 = AE-1 (keeps CRC-32), 2 = AE-2 (CRC-32 zeroed, HMAC-only auth).
    pub vendor_version: u16,
    pub strength: u8,
    pub inner_compression_method: u16,
}

impl AesExtra {
    pub const VENDOR_ID: &'static [u8; 2] = b"AE";
    pub const STRENGTH_AES256: u8 = 3;
    /// AE-2: no CRC-32 is stored, matching spec §4.2/§4.6's "authentication
    /// via HMAC tag, CRC kept zero" behavior.
    pub const VENDOR_VERSION_AE2: u16 = 2;

    pub fn parse(payload: &[u8]) -> crate::error::Result<Self> {
        if payload.len() < 7 {
            return Err(crate::error::ZipError::BadFormat(
                "truncated WinZip-AES extra field".into(),
            ));
        }
        let vendor_version = u16::from_le_bytes([payload[0], payload[1]]);
        let vendor_id = &payload[2..4];
        if vendor_id != Self::VENDOR_ID {
            return Err(crate::error::ZipError::BadFormat(
                "unrecognized AES vendor id".into(),
            ));
        }
        let strength = payload[4];
        let inner_compression_method = u16::from_le_bytes([payload[5], payload[6]]);
        Ok(Self {
            vendor_version,
            strength,
            inner_compression_method,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(7);
        out.extend_from_slice(&self.vendor_version.to_le_bytes());
        out.extend_from_slice(Self::VENDOR_ID);
        out.push(self.strength);
        out.extend_from_slice(&self.inner_compression_method.to_le_bytes());
        out
    }
}

/// Per-entry metadata shared by reader and writer (spec §3).
#[derive(Debug, Clone, Default)]
pub struct EntryMetadata {
    pub name: String,
    pub comment: String,
    pub directory: bool,
    pub version_needed: u16,
    pub bit_flag: u16,
    /// Wire compression method (0, 8, or 99). The *logical* inner method for
    /// AES entries is tracked in `aes` below.
    pub compression_method: u16,
    pub last_mod_date_time: u32,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
    pub extra_field: ExtraFields,
    /// Present when the entry is password protected; carries the decoded
    /// WinZip-AES extra field.
    pub aes: Option<AesExtra>,
    /// Set when the caller requested Zip64 for this entry explicitly (the
    /// per-add `zip64` option, spec §6) regardless of whether its actual
    /// sizes/offset need the escape. Never set by the parser — on read,
    /// [`needs_zip64`](Self::needs_zip64) is only ever driven by the
    /// sentinel fields actually observed on disk.
    pub force_zip64: bool,
}

impl EntryMetadata {
    pub fn is_encrypted(&self) -> bool {
        self.bit_flag & bit_flag::ENCRYPTED != 0
    }

    pub fn is_utf8_name(&self) -> bool {
        self.bit_flag & bit_flag::UTF8_NAME != 0
    }

    /// The compression method extraction/codecs should actually apply —
    /// for AES entries this is the inner method recovered from the 0x9901
    /// extra field, not the outer 99.
    pub fn logical_compression_method(&self) -> u16 {
        match self.aes {
            Some(aes) => aes.inner_compression_method,
            None => self.compression_method,
        }
    }

    pub fn needs_zip64(&self) -> bool {
        self.force_zip64
            || self.uncompressed_size >= SENTINEL_32 as u64
            || self.compressed_size >= SENTINEL_32 as u64
            || self.local_header_offset >= SENTINEL_32 as u64
    }
}

/// Pack a UTC timestamp into the MS-DOS date/time format used by ZIP
/// (spec §3: year origin 1980, seconds in 2-second units).
pub fn pack_dos_time(dt: OffsetDateTime) -> u32 {
    let year = dt.year().max(1980) as u32;
    let dos_date = ((year - 1980) << 9) | ((dt.month() as u32) << 5) | (dt.day() as u32);
    let dos_time =
        ((dt.hour() as u32) << 11) | ((dt.minute() as u32) << 5) | ((dt.second() as u32) / 2);
    (dos_date << 16) | dos_time
}

/// Unpack an MS-DOS packed date/time into a UTC timestamp. Returns `None`
/// if the packed value does not correspond to a valid calendar date.
pub fn unpack_dos_time(packed: u32) -> Option<OffsetDateTime> {
    let dos_time = (packed & 0xFFFF) as u32;
    let dos_date = (packed >> 16) as u32;

    let year = 1980 + (dos_date >> 9);
    let month = ((dos_date >> 5) & 0xF) as u8;
    let day = (dos_date & 0x1F) as u8;
    let hour = (dos_time >> 11) as u8;
    let minute = ((dos_time >> 5) & 0x3F) as u8;
    let second = ((dos_time & 0x1F) * 2) as u8;

    let month = time::Month::try_from(month.clamp(1, 12)).ok()?;
    let date = time::Date::from_calendar_date(year as i32, month, day.max(1)).ok()?;
    let time = time::Time::from_hms(hour.min(23), minute.min(59), second.min(59)).ok()?;
    Some(date.with_time(time).assume_utc())
}

/// Ordered entry map used by the writer; insertion order is central
/// directory order (spec §3).
pub type EntryMap = IndexMap<String, EntryMetadata>;
