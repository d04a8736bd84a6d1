//! Writer handle (spec §3/§4.6/§4.7): the container emitter (per-entry
//! local header, codec payload, data descriptor, and the central directory
//! written at close) plus the writer serializer that lets entries be added
//! concurrently while keeping sink writes in a single, well-ordered stream.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Mutex;

use crate::codec::DeflatePipeline;
use crate::config::{Config, WorkerDispatch};
use crate::driver::{self, ProgressCallback};
use crate::encryption::AesEncryptStage;
use crate::error::{Result, ZipError};
use crate::io_traits::{Codec, Signature, Writer};
use crate::model::{
    self, bit_flag, compression_method, AesExtra, EntryMap, EntryMetadata, ExtraFields,
    Zip64Extra, EXTRA_TAG_AES, EXTRA_TAG_ZIP64, MAX_COMMENT_LEN, SENTINEL_32,
};
use crate::parallel::{WorkerCodec, WorkerPool};

const LOCAL_FILE_HEADER_SIG: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const DATA_DESCRIPTOR_SIG: [u8; 4] = [0x50, 0x4b, 0x07, 0x08];
const CENTRAL_DIRECTORY_HEADER_SIG: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];
const ZIP64_EOCDR_SIG: [u8; 4] = [0x50, 0x4b, 0x06, 0x06];
const ZIP64_LOCATOR_SIG: [u8; 4] = [0x50, 0x4b, 0x06, 0x07];
const EOCDR_SIG: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

const VERSION_BASE: u16 = 0x14;
const VERSION_ZIP64: u16 = 0x2D;
const VERSION_AES: u16 = 0x33;
const VERSION_MADE_BY_BASE: u16 = 0x14;
const VERSION_MADE_BY_ZIP64: u16 = 0x2D;

/// Per-`add` options (spec §4.6).
pub struct AddOptions<'a> {
    pub directory: bool,
    pub comment: Option<String>,
    pub last_mod_date: Option<time::OffsetDateTime>,
    pub password: Option<&'a str>,
    /// Deflate level, 0-9. `0` selects STORE.
    pub level: u32,
    /// Force this entry (and the archive, if any entry sets it) into Zip64.
    pub zip64: bool,
    /// Build the whole entry in memory before writing, instead of streaming
    /// straight to the sink (spec §4.7 "buffered write").
    pub buffered_write: bool,
    /// Run the codec off-thread if the writer's `Config` permits it.
    pub off_thread: bool,
    /// Raw extra-field records to carry alongside the Zip64/AES ones this
    /// module manages itself.
    pub extra_field: Option<ExtraFields>,
    pub on_progress: ProgressCallback<'a>,
}

impl Default for AddOptions<'_> {
    fn default() -> Self {
        Self {
            directory: false,
            comment: None,
            last_mod_date: None,
            password: None,
            level: 6,
            zip64: false,
            buffered_write: false,
            off_thread: false,
            extra_field: None,
            on_progress: None,
        }
    }
}

struct SinkState<W: Writer> {
    sink: W,
    initialized: bool,
}

impl<W: Writer> SinkState<W> {
    async fn ensure_initialized(&mut self) -> Result<()> {
        if !self.initialized {
            self.sink.init().await?;
            self.initialized = true;
        }
        Ok(())
    }
}

/// In-memory [`Writer`] used for the buffered-write path: the whole entry is
/// composed here first, then copied to the real sink under the write lock.
#[derive(Default)]
struct VecWriter {
    buf: Vec<u8>,
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

/// Owns a [`Writer`] sink and the central directory accumulated so far.
/// Cheaply `Clone`: every clone shares the same underlying sink and entry
/// map, so entries may be added concurrently from several tasks (spec §4.7
/// "Writer Serializer").
#[derive(Clone)]
pub struct ZipWriter<W: Writer> {
    sink: Arc<Mutex<SinkState<W>>>,
    names: Arc<Mutex<EntryMap>>,
    comment: Arc<Mutex<Option<String>>>,
    pool: WorkerPool,
    config: Config,
    force_zip64: bool,
}

impl<W: Writer> ZipWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, Config::default(), false)
    }

    /// `force_zip64` promotes the whole archive to Zip64 at close,
    /// regardless of entry count or central directory size (spec §4.6
    /// "three triggers").
    pub fn with_config(sink: W, config: Config, force_zip64: bool) -> Self {
        Self {
            sink: Arc::new(Mutex::new(SinkState {
                sink,
                initialized: false,
            })),
            names: Arc::new(Mutex::new(IndexMap::new())),
            comment: Arc::new(Mutex::new(None)),
            pool: WorkerPool::from_config(&config),
            config,
            force_zip64,
        }
    }

    /// Set the archive-level comment written after the EOCDR at close.
    pub async fn set_comment(&self, comment: String) -> Result<()> {
        if comment.len() > MAX_COMMENT_LEN {
            return Err(ZipError::ZipFileCommentTooLarge);
        }
        *self.comment.lock().await = Some(comment);
        Ok(())
    }

    /// Add one entry. `data` is ignored (treated as empty) when
    /// `options.directory` is set (spec §4.6 "directory entries carry no
    /// data stream").
    pub async fn add(&self, name: &str, data: &[u8], options: AddOptions<'_>) -> Result<()> {
        let directory = options.directory;
        let entry_name = if directory && !name.ends_with('/') {
            format!("{name}/")
        } else {
            name.to_string()
        };

        if let Some(comment) = &options.comment {
            if comment.len() > MAX_COMMENT_LEN {
                return Err(ZipError::FileEntryCommentTooLarge(entry_name));
            }
        }

        {
            let mut names = self.names.lock().await;
            if names.contains_key(&entry_name) {
                return Err(ZipError::DuplicatedName(entry_name));
            }
            // Reserve the slot eagerly so two concurrent `add`s for the same
            // name never both succeed, regardless of which finishes first.
            names.insert(entry_name.clone(), EntryMetadata::default());
        }

        let dispatch = self.config.dispatch_for(options.off_thread);
        tracing::debug!(
            archive = self.config.name.as_deref().unwrap_or("<unnamed>"),
            entry = %entry_name,
            buffered = options.buffered_write,
            ?dispatch,
            "adding entry"
        );

        let _permit = self.pool.acquire().await;
        let outcome = self.add_inner(&entry_name, data, &options, dispatch).await;
        if let Err(err) = &outcome {
            tracing::warn!(entry = %entry_name, error = %err, "entry emission failed, releasing name");
        }

        let mut names = self.names.lock().await;
        match outcome {
            Ok(meta) => {
                names.insert(entry_name, meta);
                Ok(())
            }
            Err(err) => {
                names.shift_remove(&entry_name);
                Err(err)
            }
        }
    }

    async fn add_inner(
        &self,
        name: &str,
        data: &[u8],
        options: &AddOptions<'_>,
        dispatch: WorkerDispatch,
    ) -> Result<EntryMetadata> {
        if !options.buffered_write {
            if let Ok(mut guard) = Arc::clone(&self.sink).try_lock_owned() {
                guard.ensure_initialized().await?;
                let local_header_offset = guard.sink.size();
                let meta = emit_entry(
                    name,
                    data,
                    options,
                    self.config.chunk_size,
                    dispatch,
                    &mut guard.sink,
                )
                .await?;
                return Ok(EntryMetadata {
                    local_header_offset,
                    ..meta
                });
            }
        }

        // Buffered path: compose the whole entry in memory, then wait for
        // the sink lock and copy it across in one shot (spec §4.7 — a
        // direct write already in flight, or an explicit request, pushes
        // new entries onto this path instead of blocking on the sink).
        let mut buffer = VecWriter::default();
        let meta = emit_entry(name, data, options, self.config.chunk_size, dispatch, &mut buffer)
            .await?;

        let mut guard = self.sink.lock().await;
        guard.ensure_initialized().await?;
        let local_header_offset = guard.sink.size();
        guard.sink.write(&buffer.buf).await?;
        Ok(EntryMetadata {
            local_header_offset,
            ..meta
        })
    }

    /// Write the central directory and EOCDR (promoting to Zip64 if any of
    /// the three triggers apply) and finish the archive. Callers must await
    /// every `add` before calling this.
    pub async fn close(&self) -> Result<()> {
        tracing::debug!(
            archive = self.config.name.as_deref().unwrap_or("<unnamed>"),
            "closing archive"
        );
        let mut guard = self.sink.lock().await;
        guard.ensure_initialized().await?;
        let names = self.names.lock().await;

        let cd_start = guard.sink.size();
        let mut cd_len = 0u64;
        for meta in names.values() {
            let record = build_central_directory_record(meta);
            guard.sink.write(&record).await?;
            cd_len += record.len() as u64;
        }

        let entry_count = names.len() as u64;
        let promote_zip64 = self.force_zip64
            || cd_start >= SENTINEL_32 as u64
            || entry_count >= u16::MAX as u64
            || names.values().any(EntryMetadata::needs_zip64);

        if promote_zip64 {
            tracing::debug!(entry_count, cd_start, "promoting archive to Zip64");
            let zip64_eocdr_offset = guard.sink.size();
            let mut rec = Vec::with_capacity(56);
            rec.extend_from_slice(&ZIP64_EOCDR_SIG);
            rec.extend_from_slice(&44u64.to_le_bytes()); // record size, excluding sig + this field
            rec.extend_from_slice(&VERSION_MADE_BY_ZIP64.to_le_bytes());
            rec.extend_from_slice(&VERSION_ZIP64.to_le_bytes());
            rec.extend_from_slice(&0u32.to_le_bytes()); // disk number
            rec.extend_from_slice(&0u32.to_le_bytes()); // disk with CD start
            rec.extend_from_slice(&entry_count.to_le_bytes());
            rec.extend_from_slice(&entry_count.to_le_bytes());
            rec.extend_from_slice(&cd_len.to_le_bytes());
            rec.extend_from_slice(&cd_start.to_le_bytes());
            guard.sink.write(&rec).await?;

            let mut locator = Vec::with_capacity(20);
            locator.extend_from_slice(&ZIP64_LOCATOR_SIG);
            locator.extend_from_slice(&0u32.to_le_bytes()); // disk with Zip64 EOCDR
            locator.extend_from_slice(&zip64_eocdr_offset.to_le_bytes());
            locator.extend_from_slice(&1u32.to_le_bytes()); // total disks
            guard.sink.write(&locator).await?;
        }

        let comment = self.comment.lock().await.clone().unwrap_or_default();
        let mut eocdr = Vec::with_capacity(22);
        eocdr.extend_from_slice(&EOCDR_SIG);
        eocdr.extend_from_slice(&0u16.to_le_bytes()); // disk number
        eocdr.extend_from_slice(&0u16.to_le_bytes()); // disk with CD start
        let entries_field = if promote_zip64 {
            u16::MAX
        } else {
            entry_count as u16
        };
        eocdr.extend_from_slice(&entries_field.to_le_bytes());
        eocdr.extend_from_slice(&entries_field.to_le_bytes());
        let cd_len_field = if promote_zip64 { u32::MAX } else { cd_len as u32 };
        eocdr.extend_from_slice(&cd_len_field.to_le_bytes());
        let cd_start_field = if promote_zip64 {
            u32::MAX
        } else {
            cd_start as u32
        };
        eocdr.extend_from_slice(&cd_start_field.to_le_bytes());
        eocdr.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        guard.sink.write(&eocdr).await?;
        guard.sink.write(comment.as_bytes()).await?;

        Ok(())
    }

    /// Retrieve the underlying sink's accumulated bytes (spec §6
    /// `Writer::get_data`), e.g. to read back an in-memory archive after
    /// [`close`](Self::close).
    pub async fn get_data(&self) -> Result<Vec<u8>> {
        self.sink.lock().await.sink.get_data().await
    }
}

/// Compose one entry — local header, codec payload, data descriptor — into
/// `writer`, returning its metadata with `local_header_offset` left at 0
/// (the caller fills it in once the real write offset is known, which for
/// a buffered entry is only decided at flush time).
async fn emit_entry(
    name: &str,
    data: &[u8],
    options: &AddOptions<'_>,
    chunk_size: usize,
    dispatch: WorkerDispatch,
    writer: &mut dyn Writer,
) -> Result<EntryMetadata> {
    let directory = options.directory;
    let level = if directory { 0 } else { options.level };
    let use_deflate = level > 0;
    let password = if directory { None } else { options.password };

    let inner_method = if use_deflate {
        compression_method::DEFLATE
    } else {
        compression_method::STORE
    };
    let wire_method = if password.is_some() {
        compression_method::WINZIP_AES
    } else {
        inner_method
    };

    let payload = if directory { &[][..] } else { data };
    let uncompressed_size = payload.len() as u64;
    let zip64_entry = options.zip64 || uncompressed_size >= SENTINEL_32 as u64;

    let mut bit_flag_value = bit_flag::DATA_DESCRIPTOR | bit_flag::UTF8_NAME;
    if password.is_some() {
        bit_flag_value |= bit_flag::ENCRYPTED;
    }

    let mut version_needed = VERSION_BASE;
    if zip64_entry {
        version_needed = version_needed.max(VERSION_ZIP64);
    }
    if password.is_some() {
        version_needed = version_needed.max(VERSION_AES);
    }

    let last_mod_date_time = model::pack_dos_time(
        options
            .last_mod_date
            .unwrap_or_else(time::OffsetDateTime::now_utc),
    );

    let name_bytes = name.as_bytes();
    let mut header = Vec::with_capacity(30 + name_bytes.len());
    header.extend_from_slice(&LOCAL_FILE_HEADER_SIG);
    header.extend_from_slice(&version_needed.to_le_bytes());
    header.extend_from_slice(&bit_flag_value.to_le_bytes());
    header.extend_from_slice(&wire_method.to_le_bytes());
    header.extend_from_slice(&((last_mod_date_time & 0xFFFF) as u16).to_le_bytes());
    header.extend_from_slice(&((last_mod_date_time >> 16) as u16).to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes()); // crc32, see data descriptor
    let size_placeholder = if zip64_entry { u32::MAX } else { 0 };
    header.extend_from_slice(&size_placeholder.to_le_bytes()); // compressed size
    header.extend_from_slice(&size_placeholder.to_le_bytes()); // uncompressed size
    header.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    header.extend_from_slice(&0u16.to_le_bytes()); // extra field length
    header.extend_from_slice(name_bytes);
    writer.write(&header).await?;

    let aes_stage = match password {
        Some(pw) => Some(AesEncryptStage::new(pw)?),
        None => None,
    };

    let payload_start = writer.size();
    let inner_codec: Box<dyn Codec> =
        Box::new(DeflatePipeline::new(use_deflate.then_some(level), aes_stage));
    let mut codec: Box<dyn Codec> = match dispatch {
        WorkerDispatch::InProcess => inner_codec,
        WorkerDispatch::OffThread => Box::new(WorkerCodec::new(inner_codec)),
    };
    let flush = driver::run_chunked_from_slice(
        codec.as_mut(),
        writer,
        payload,
        chunk_size,
        options.on_progress,
    )
    .await?;
    let compressed_size = writer.size() - payload_start;

    let crc32 = match flush.signature {
        Some(Signature::Crc32(v)) => v,
        _ => 0,
    };

    let mut descriptor = Vec::with_capacity(24);
    descriptor.extend_from_slice(&DATA_DESCRIPTOR_SIG);
    descriptor.extend_from_slice(&crc32.to_le_bytes());
    if zip64_entry {
        descriptor.extend_from_slice(&compressed_size.to_le_bytes());
        descriptor.extend_from_slice(&uncompressed_size.to_le_bytes());
    } else {
        descriptor.extend_from_slice(&(compressed_size as u32).to_le_bytes());
        descriptor.extend_from_slice(&(uncompressed_size as u32).to_le_bytes());
    }
    writer.write(&descriptor).await?;

    let aes_extra = password.is_some().then(|| AesExtra {
        vendor_version: AesExtra::VENDOR_VERSION_AE2,
        strength: AesExtra::STRENGTH_AES256,
        inner_compression_method: inner_method,
    });

    let mut extra_field = ExtraFields::new();
    if let Some(user_extra) = &options.extra_field {
        for (tag, bytes) in user_extra.iter() {
            extra_field.insert(tag, bytes.to_vec());
        }
    }

    Ok(EntryMetadata {
        name: name.to_string(),
        comment: options.comment.clone().unwrap_or_default(),
        directory,
        version_needed,
        bit_flag: bit_flag_value,
        compression_method: wire_method,
        last_mod_date_time,
        crc32,
        compressed_size,
        uncompressed_size,
        local_header_offset: 0,
        extra_field,
        aes: aes_extra,
        force_zip64: zip64_entry,
    })
}

/// Render one central directory record: signature ‖ fixed fields ‖ name ‖
/// Zip64 extra ‖ AES extra ‖ raw user extras ‖ comment (spec §4.6 "Close").
fn build_central_directory_record(meta: &EntryMetadata) -> Vec<u8> {
    let zip64_needed = meta.needs_zip64();
    let version_made_by = if zip64_needed {
        VERSION_MADE_BY_ZIP64
    } else {
        VERSION_MADE_BY_BASE
    };

    let mut extra = ExtraFields::new();
    if zip64_needed {
        extra.insert(
            EXTRA_TAG_ZIP64,
            Zip64Extra::to_bytes_full(
                meta.uncompressed_size,
                meta.compressed_size,
                meta.local_header_offset,
            ),
        );
    }
    if let Some(aes) = meta.aes {
        extra.insert(EXTRA_TAG_AES, aes.to_bytes());
    }
    for (tag, bytes) in meta.extra_field.iter() {
        if tag != EXTRA_TAG_ZIP64 && tag != EXTRA_TAG_AES {
            extra.insert(tag, bytes.to_vec());
        }
    }

    let name_bytes = meta.name.as_bytes();
    let comment_bytes = meta.comment.as_bytes();
    let extra_bytes = extra.to_bytes();

    let mut out = Vec::with_capacity(46 + name_bytes.len() + extra_bytes.len() + comment_bytes.len());
    out.extend_from_slice(&CENTRAL_DIRECTORY_HEADER_SIG);
    out.extend_from_slice(&version_made_by.to_le_bytes());
    out.extend_from_slice(&meta.version_needed.to_le_bytes());
    out.extend_from_slice(&meta.bit_flag.to_le_bytes());
    out.extend_from_slice(&meta.compression_method.to_le_bytes());
    out.extend_from_slice(&((meta.last_mod_date_time & 0xFFFF) as u16).to_le_bytes());
    out.extend_from_slice(&((meta.last_mod_date_time >> 16) as u16).to_le_bytes());
    out.extend_from_slice(&meta.crc32.to_le_bytes());
    let compressed_32 = if zip64_needed {
        u32::MAX
    } else {
        meta.compressed_size as u32
    };
    let uncompressed_32 = if zip64_needed {
        u32::MAX
    } else {
        meta.uncompressed_size as u32
    };
    out.extend_from_slice(&compressed_32.to_le_bytes());
    out.extend_from_slice(&uncompressed_32.to_le_bytes());
    out.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(&(extra_bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(&(comment_bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number start
    out.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
    let external_attrs: u32 = if meta.directory { 0x10 } else { 0 };
    out.extend_from_slice(&external_attrs.to_le_bytes());
    let offset_32 = if zip64_needed {
        u32::MAX
    } else {
        meta.local_header_offset as u32
    };
    out.extend_from_slice(&offset_32.to_le_bytes());
    out.extend_from_slice(name_bytes);
    out.extend_from_slice(&extra_bytes);
    out.extend_from_slice(comment_bytes);
    out
}
