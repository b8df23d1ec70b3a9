//! Archive ingestion.
//!
//! A pull may deliver its bundle as a zip stream:
//! - `meta/asset-meta.edn`: version and per-asset content hashes
//! - `assets/<path>`: one entry per asset
//!
//! The stream is first copied into the spool directory with bounded
//! buffers, then read through its central directory. Entry sizes come from
//! the central directory, so archives written by streaming producers (sizes
//! in trailing data descriptors) are read the same as any other. Asset
//! bodies are extracted next to it and hashed on the way through; nothing
//! is held in memory wholesale.

use crate::error::{ApiError, AssetError, Result};
use crate::hash::HashingWriter;
use crate::metadata::AssetMetadata;
use crate::scan::check_bundle_path;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Archive entry holding the bundle metadata.
pub const META_ENTRY: &str = "meta/asset-meta.edn";

/// Prefix of asset entries inside the archive.
pub const ASSET_PREFIX: &str = "assets/";

/// Name of the downloaded archive inside the spool directory.
pub const ARCHIVE_FILE: &str = "bundle.zip";

const SPOOL_BUFFER_SIZE: usize = 64 * 1024;

/// An asset body written to the spool directory.
#[derive(Debug, Clone)]
pub struct SpooledAsset {
    pub path: String,
    pub content_hash: String,
    pub size: u64,
    /// Location of the body in the spool directory
    pub file: PathBuf,
}

/// A fully read archive.
#[derive(Debug, Clone)]
pub struct SpooledBundle {
    pub version: String,
    pub assets: Vec<SpooledAsset>,
}

/// Read a zip stream, spooling asset bodies into `spool_dir`.
///
/// A read error carrying an [`ApiError`] (the transport failed mid-body)
/// surfaces as that error rather than as a local I/O failure.
pub fn ingest_archive<R: Read>(mut reader: R, spool_dir: &Path) -> Result<SpooledBundle> {
    fs::create_dir_all(spool_dir).map_err(|e| AssetError::io(spool_dir, e))?;

    let archive_file = spool_dir.join(ARCHIVE_FILE);
    let received = download(&mut reader, &archive_file)?;
    tracing::debug!("Received archive ({} bytes)", received);

    let bundle = extract(&archive_file, spool_dir)?;
    if let Err(e) = fs::remove_file(&archive_file) {
        tracing::debug!("Failed to remove {}: {}", archive_file.display(), e);
    }
    Ok(bundle)
}

/// Copy the whole stream into `file`. Returns the number of bytes copied.
fn download<R: Read>(reader: &mut R, file: &Path) -> Result<u64> {
    let out = File::create(file).map_err(|e| AssetError::io(file, e))?;
    let mut writer = BufWriter::with_capacity(SPOOL_BUFFER_SIZE, out);
    let mut buf = vec![0u8; SPOOL_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(stream_error(e)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| AssetError::io(file, e))?;
        total += n as u64;
    }
    writer.flush().map_err(|e| AssetError::io(file, e))?;
    Ok(total)
}

fn stream_error(e: io::Error) -> AssetError {
    match e.get_ref().and_then(|inner| inner.downcast_ref::<ApiError>()) {
        Some(api) => AssetError::Api(api.clone()),
        None => AssetError::Bundle(format!("failed to read archive: {}", e)),
    }
}

fn extract(archive_file: &Path, spool_dir: &Path) -> Result<SpooledBundle> {
    let file = File::open(archive_file).map_err(|e| AssetError::io(archive_file, e))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| AssetError::Bundle(format!("failed to read archive: {}", e)))?;

    let mut meta: Option<AssetMetadata> = None;
    let mut assets: Vec<SpooledAsset> = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| AssetError::Bundle(format!("failed to read archive: {}", e)))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();

        if name == META_ENTRY {
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| AssetError::Bundle(format!("failed to read {}: {}", META_ENTRY, e)))?;
            let parsed = AssetMetadata::from_edn(&text)
                .map_err(|e| AssetError::Bundle(format!("invalid {}: {}", META_ENTRY, e)))?;
            meta = Some(parsed);
        } else if let Some(path) = name.strip_prefix(ASSET_PREFIX) {
            check_bundle_path(path)?;
            let file = spool_dir.join(format!("{:06}.part", assets.len()));
            let size = entry.size();
            let content_hash = spool_entry(&mut entry, &file, size)?;
            tracing::debug!("Spooled {} ({} bytes)", path, size);
            assets.push(SpooledAsset {
                path: path.to_string(),
                content_hash,
                size,
                file,
            });
        } else {
            tracing::debug!("Skipping unknown archive entry {}", name);
        }
    }

    let meta = meta.ok_or_else(|| {
        AssetError::Bundle(format!("archive has no {} entry", META_ENTRY))
    })?;

    for asset in &mut assets {
        if let Some(record) = meta.record(&asset.path) {
            asset.content_hash = record.content_hash.clone();
        }
    }

    Ok(SpooledBundle {
        version: meta.version,
        assets,
    })
}

/// Extract one entry. Reads fail as `Bundle` (the archive is corrupt),
/// writes as `Io` at the spool file.
fn spool_entry<R: Read>(entry: &mut R, file: &Path, size: u64) -> Result<String> {
    let out = File::create(file).map_err(|e| AssetError::io(file, e))?;
    let mut writer = HashingWriter::new(BufWriter::with_capacity(SPOOL_BUFFER_SIZE, out), size);
    let mut buf = vec![0u8; SPOOL_BUFFER_SIZE];
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(AssetError::Bundle(format!("corrupt archive entry: {}", e))),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| AssetError::io(file, e))?;
    }
    if writer.written() != size {
        return Err(AssetError::Bundle(format!(
            "archive entry length mismatch: expected {} bytes, read {}",
            size,
            writer.written()
        )));
    }
    let (mut buffered, hash) = writer.finish();
    buffered.flush().map_err(|e| AssetError::io(file, e))?;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::content_hash;
    use std::io::Cursor;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    /// Build an archive in memory. Entries are written in the given order.
    fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// Build an archive the way a streaming producer does: stored entries
    /// with general purpose flag bit 3 set, zero sizes in the local headers
    /// and the real sizes in trailing data descriptors.
    fn build_streamed_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
        let mut out = Vec::new();
        let mut central = Vec::new();
        for (name, data) in entries {
            let offset = out.len() as u32;
            let crc = crc32fast::hash(data);
            let size = data.len() as u32;

            out.extend_from_slice(&0x04034b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // stored
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0x21u16.to_le_bytes());
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(data);
            out.extend_from_slice(&0x08074b50u32.to_le_bytes());
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());

            central.extend_from_slice(&0x02014b50u32.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0x21u16.to_le_bytes());
            central.extend_from_slice(&crc.to_le_bytes());
            central.extend_from_slice(&size.to_le_bytes());
            central.extend_from_slice(&size.to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&[0u8; 12]);
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name.as_bytes());
        }
        let central_offset = out.len() as u32;
        let count = entries.len() as u16;
        out.extend_from_slice(&central);
        out.extend_from_slice(&0x06054b50u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&central_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    /// Yields `data`, then fails with `error`.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
        error: Option<io::Error>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            match self.error.take() {
                Some(e) => Err(e),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_ingest_meta_last() {
        let tmp = TempDir::new().unwrap();
        let archive = build_archive(&[
            ("assets/a.txt", b"hello"),
            ("assets/content/x.json", b"{}"),
            (META_ENTRY, br#"{:aliased-version "v5" :assets []}"#),
        ]);
        let bundle = ingest_archive(Cursor::new(archive), tmp.path()).unwrap();
        assert_eq!(bundle.version, "v5");
        assert_eq!(bundle.assets.len(), 2);
        assert_eq!(bundle.assets[0].path, "a.txt");
        assert_eq!(bundle.assets[0].content_hash, content_hash(b"hello"));
        assert_eq!(fs::read(&bundle.assets[0].file).unwrap(), b"hello");
        assert_eq!(bundle.assets[1].path, "content/x.json");
        assert_eq!(bundle.assets[1].size, 2);
        assert!(!tmp.path().join(ARCHIVE_FILE).exists());
    }

    #[test]
    fn test_ingest_data_descriptor_entries() {
        let tmp = TempDir::new().unwrap();
        let archive = build_streamed_archive(&[
            (META_ENTRY, br#"{:version "v3" :assets []}"#),
            ("assets/a.txt", b"hello"),
            ("assets/images/logo.png", b"\x89PNG"),
        ]);
        let bundle = ingest_archive(Cursor::new(archive), tmp.path()).unwrap();
        assert_eq!(bundle.version, "v3");
        assert_eq!(bundle.assets.len(), 2);
        assert_eq!(bundle.assets[0].content_hash, content_hash(b"hello"));
        assert_eq!(fs::read(&bundle.assets[1].file).unwrap(), b"\x89PNG");
    }

    #[test]
    fn test_interrupted_transfer_is_transport_error() {
        let tmp = TempDir::new().unwrap();
        let archive = build_archive(&[
            ("assets/a.txt", b"hello"),
            (META_ENTRY, br#"{:version "v1"}"#),
        ]);
        let half = archive[..archive.len() / 2].to_vec();
        let reader = FailingReader {
            data: Cursor::new(half),
            error: Some(io::Error::other(ApiError::Transport {
                endpoint: "assets/pull".to_string(),
                message: "connection reset".to_string(),
            })),
        };
        let err = ingest_archive(reader, tmp.path()).unwrap_err();
        assert_eq!(err.code(), "transport-error");
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_untagged_read_error_is_invalid_bundle() {
        let tmp = TempDir::new().unwrap();
        let reader = FailingReader {
            data: Cursor::new(b"PK".to_vec()),
            error: Some(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")),
        };
        let err = ingest_archive(reader, tmp.path()).unwrap_err();
        assert_eq!(err.code(), "invalid-bundle");
    }

    #[test]
    fn test_truncated_archive_is_invalid_bundle() {
        let tmp = TempDir::new().unwrap();
        let archive = build_archive(&[
            ("assets/a.txt", b"hello"),
            (META_ENTRY, br#"{:version "v1"}"#),
        ]);
        let half = archive[..archive.len() / 2].to_vec();
        let err = ingest_archive(Cursor::new(half), tmp.path()).unwrap_err();
        assert_eq!(err.code(), "invalid-bundle");
    }

    #[test]
    fn test_ingest_prefers_declared_hash() {
        let tmp = TempDir::new().unwrap();
        let archive = build_archive(&[
            (META_ENTRY, br#"{:version "v1" :assets [{:path "a.txt" :content-hash "declared"}]}"#),
            ("assets/a.txt", b"hello"),
        ]);
        let bundle = ingest_archive(Cursor::new(archive), tmp.path()).unwrap();
        assert_eq!(bundle.assets[0].content_hash, "declared");
    }

    #[test]
    fn test_ingest_skips_directories_and_unknown_entries() {
        let tmp = TempDir::new().unwrap();
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.add_directory("assets/images/", options).unwrap();
        zip.start_file("README", options).unwrap();
        zip.write_all(b"ignored").unwrap();
        zip.start_file(META_ENTRY, options).unwrap();
        zip.write_all(br#"{:version "v2"}"#).unwrap();
        let archive = zip.finish().unwrap().into_inner();

        let bundle = ingest_archive(Cursor::new(archive), tmp.path()).unwrap();
        assert_eq!(bundle.version, "v2");
        assert!(bundle.assets.is_empty());
    }

    #[test]
    fn test_ingest_missing_meta() {
        let tmp = TempDir::new().unwrap();
        let archive = build_archive(&[("assets/a.txt", b"hello")]);
        let err = ingest_archive(Cursor::new(archive), tmp.path()).unwrap_err();
        assert_eq!(err.code(), "invalid-bundle");
    }

    #[test]
    fn test_ingest_rejects_traversal() {
        let tmp = TempDir::new().unwrap();
        let archive = build_archive(&[
            (META_ENTRY, br#"{:version "v1"}"#),
            ("assets/../escape.txt", b"x"),
        ]);
        assert!(ingest_archive(Cursor::new(archive), tmp.path()).is_err());
    }

    #[test]
    fn test_ingest_garbage() {
        let tmp = TempDir::new().unwrap();
        let err = ingest_archive(Cursor::new(b"not a zip at all".to_vec()), tmp.path());
        assert!(err.is_err());
    }
}
