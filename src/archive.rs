use std::io::{Cursor, Write};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info, warn};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::{
    config::DEFAULT_COMPRESSION_LEVEL,
    error::{DownloadError, Result},
    index::{folder_prefix, PathIndex},
    types::ProjectSnapshot,
};

/// One file placed in an archive at its archive-relative path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub content: Bytes,
}

/// Compression service turning named byte buffers into one archive blob
///
/// Entries may sit at arbitrary nested paths; directories are implied.
pub trait ArchiveCodec: Send + Sync {
    /// Whether the codec can be used right now
    fn is_available(&self) -> bool {
        true
    }

    fn encode(&self, entries: &[ArchiveEntry], level: i64) -> Result<Bytes>;

    fn identifier(&self) -> String;
}

/// Deflate-compressed ZIP archives
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCodec;

impl ArchiveCodec for ZipCodec {
    fn encode(&self, entries: &[ArchiveEntry], level: i64) -> Result<Bytes> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        // level 0 means no compression at all
        let options = if level == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(level))
        };

        for entry in entries {
            writer
                .start_file(entry.path.as_str(), options)
                .map_err(codec_error)?;
            writer.write_all(&entry.content).map_err(|e| DownloadError::Codec {
                message: format!("failed to write {}: {}", entry.path, e),
            })?;
            debug!("Zip add: {}", entry.path);
        }

        let cursor = writer.finish().map_err(codec_error)?;
        Ok(Bytes::from(cursor.into_inner()))
    }

    fn identifier(&self) -> String {
        "zip/deflate".to_string()
    }
}

fn codec_error(e: zip::result::ZipError) -> DownloadError {
    DownloadError::Codec {
        message: e.to_string(),
    }
}

/// A finished archive plus the name it should be saved under
#[derive(Debug, Clone)]
pub struct BuiltArchive {
    pub content: Bytes,
    pub file_name: String,
    pub entry_count: usize,
}

/// Packs every record under an archive root into one compressed blob
#[derive(Clone)]
pub struct ArchiveBuilder {
    codec: Arc<dyn ArchiveCodec>,
    compression_level: i64,
}

impl ArchiveBuilder {
    pub fn new(codec: Arc<dyn ArchiveCodec>) -> Self {
        Self {
            codec,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = level;
        self
    }

    /// Build the archive for `root_path` (`""` for the whole project)
    ///
    /// Selecting nothing under a path that is not a known folder only logs a
    /// warning; an empty archive is still produced.
    pub async fn build_archive(&self, index: &PathIndex, root_path: &str) -> Result<BuiltArchive> {
        if !self.codec.is_available() {
            warn!("Archive codec {} not available", self.codec.identifier());
            return Err(DownloadError::CodecUnavailable);
        }

        let file_name = archive_file_name(index.snapshot(), root_path);
        info!(
            "Zipping folder: {} as {}",
            if root_path.is_empty() { "(root)" } else { root_path },
            file_name
        );

        let entries = select_entries(index, root_path)?;
        if entries.is_empty() && !root_path.is_empty() && !index.is_folder(root_path) {
            warn!("Nothing to archive under {}", root_path);
        }

        let entry_count = entries.len();
        let codec = self.codec.clone();
        let level = self.compression_level;
        let content = tokio::task::spawn_blocking(move || codec.encode(&entries, level))
            .await
            .map_err(|e| DownloadError::Codec {
                message: format!("archive task failed: {}", e),
            })??;

        info!("ZIP generated ({} entries, {} bytes)", entry_count, content.len());
        Ok(BuiltArchive {
            content,
            file_name,
            entry_count,
        })
    }
}

/// Decode every downloadable record under `root_path`, keyed by relative path
pub fn select_entries(index: &PathIndex, root_path: &str) -> Result<Vec<ArchiveEntry>> {
    let prefix = folder_prefix(root_path);
    let mut entries = Vec::new();

    for record in &index.snapshot().files {
        let Some(relative) = relative_path(&prefix, &record.path) else {
            continue;
        };
        if let Some(content) = record.decode()? {
            entries.push(ArchiveEntry {
                path: relative.to_string(),
                content,
            });
        }
    }

    Ok(entries)
}

/// Path of `path` inside an archive rooted at `prefix`; `None` when outside it
/// or when nothing remains after the prefix
pub fn relative_path<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    path.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

/// `<last segment>.zip`, or `<project name>.zip` for the project root
pub fn archive_file_name(snapshot: &ProjectSnapshot, root_path: &str) -> String {
    let trimmed = root_path.trim_end_matches('/');
    let stem = if trimmed.is_empty() {
        snapshot.project_name.trim()
    } else {
        trimmed.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(trimmed)
    };

    if stem.is_empty() {
        "project_root.zip".to_string()
    } else {
        format!("{}.zip", stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::FileRecord;
    use std::io::Read;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn index(name: &str, files: Vec<FileRecord>) -> PathIndex {
        PathIndex::build(Arc::new(ProjectSnapshot {
            project_id: "p".to_string(),
            project_name: name.to_string(),
            files,
        }))
    }

    fn read_zip(bytes: &Bytes) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut out = Vec::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).unwrap();
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).unwrap();
            out.push((file.name().to_string(), buf));
        }
        out.sort();
        out
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("src/", "src/utils/a.ts"), Some("utils/a.ts"));
        assert_eq!(relative_path("src/", "srcx/a.ts"), None);
        assert_eq!(relative_path("src/", "src/"), None);
        assert_eq!(relative_path("", "a.txt"), Some("a.txt"));
    }

    #[test]
    fn test_archive_file_name() {
        let snapshot = ProjectSnapshot {
            project_id: "p".to_string(),
            project_name: "demo".to_string(),
            files: vec![],
        };
        assert_eq!(archive_file_name(&snapshot, ""), "demo.zip");
        assert_eq!(archive_file_name(&snapshot, "src/components"), "components.zip");
        assert_eq!(archive_file_name(&snapshot, "src/"), "src.zip");

        let unnamed = ProjectSnapshot {
            project_name: " ".to_string(),
            ..snapshot
        };
        assert_eq!(archive_file_name(&unnamed, ""), "project_root.zip");
    }

    #[tokio::test]
    async fn test_whole_project_archive() {
        let idx = index(
            "demo",
            vec![FileRecord::text("a.txt", "hi"), FileRecord::text("dir/b.txt", "yo")],
        );
        let builder = ArchiveBuilder::new(Arc::new(ZipCodec));

        let archive = builder.build_archive(&idx, "").await.unwrap();

        assert_eq!(archive.file_name, "demo.zip");
        assert_eq!(archive.entry_count, 2);
        assert_eq!(
            read_zip(&archive.content),
            vec![
                ("a.txt".to_string(), b"hi".to_vec()),
                ("dir/b.txt".to_string(), b"yo".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_folder_archive_strips_root() {
        let idx = index(
            "demo",
            vec![
                FileRecord::text("src/utils/a.ts", "export {}"),
                FileRecord::text("src/main.ts", "main"),
                FileRecord::placeholder("src/empty"),
                FileRecord::text("README.md", "readme"),
            ],
        );
        let builder = ArchiveBuilder::new(Arc::new(ZipCodec));

        let archive = builder.build_archive(&idx, "src").await.unwrap();
        let names: Vec<String> = read_zip(&archive.content).into_iter().map(|(n, _)| n).collect();

        assert_eq!(archive.file_name, "src.zip");
        assert_eq!(names, vec!["main.ts".to_string(), "utils/a.ts".to_string()]);
    }

    #[tokio::test]
    async fn test_binary_round_trip() {
        let raw: Vec<u8> = (0u8..=255).collect();
        let encoded = {
            use base64::{engine::general_purpose::STANDARD, Engine as _};
            STANDARD.encode(&raw)
        };
        let idx = index("demo", vec![FileRecord::binary("assets/blob.bin", encoded)]);
        let builder = ArchiveBuilder::new(Arc::new(ZipCodec));

        let archive = builder.build_archive(&idx, "assets").await.unwrap();
        let files = read_zip(&archive.content);

        assert_eq!(files, vec![("blob.bin".to_string(), raw)]);
    }

    #[tokio::test]
    async fn test_unknown_root_yields_empty_archive() {
        let idx = index("demo", vec![FileRecord::text("a.txt", "hi")]);
        let builder = ArchiveBuilder::new(Arc::new(ZipCodec));

        let archive = builder.build_archive(&idx, "nope").await.unwrap();

        assert_eq!(archive.entry_count, 0);
        assert!(read_zip(&archive.content).is_empty());
        assert_eq!(archive.file_name, "nope.zip");
    }

    #[tokio::test]
    async fn test_store_level_still_decodes() {
        let idx = index("demo", vec![FileRecord::text("a.txt", "hi".repeat(100))]);
        let builder = ArchiveBuilder::new(Arc::new(ZipCodec)).with_compression_level(0);

        let archive = builder.build_archive(&idx, "").await.unwrap();
        assert_eq!(read_zip(&archive.content)[0].1, "hi".repeat(100).into_bytes());
    }

    struct OfflineCodec(AtomicBool);

    impl ArchiveCodec for OfflineCodec {
        fn is_available(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }

        fn encode(&self, entries: &[ArchiveEntry], level: i64) -> Result<Bytes> {
            ZipCodec.encode(entries, level)
        }

        fn identifier(&self) -> String {
            "offline".to_string()
        }
    }

    #[tokio::test]
    async fn test_codec_unavailable() {
        let idx = index("demo", vec![FileRecord::text("a.txt", "hi")]);
        let builder = ArchiveBuilder::new(Arc::new(OfflineCodec(AtomicBool::new(false))));

        let err = builder.build_archive(&idx, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CodecUnavailable);
    }
}
