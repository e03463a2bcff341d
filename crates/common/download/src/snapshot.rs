//! Writing a snapshot to disk.
//!
//! The body is streamed into a draft file next to its final location. Only a
//! validated draft is moved to its timestamped name, so a file named
//! `upload_<timestamp>.xml` is always complete.

use crate::clock::Timestamp;
use crate::error::ErrContext;
use crate::error::FetchError;
use nix::sys::statvfs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use tempfile::PathPersistError;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::io::BufWriter;

/// Size of the blocks written to disk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// How many `_<n>` suffixes are tried when snapshots share the same second.
const MAX_NAME_SUFFIX: u32 = 1000;

/// The name of a snapshot, derived from the UTC time the request was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    prefix: String,
    stamp: String,
}

impl SnapshotName {
    pub fn new(prefix: &str, timestamp: Timestamp) -> Self {
        Self {
            prefix: prefix.into(),
            stamp: timestamp.format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    /// `<prefix>_<stamp>.xml` for the first snapshot of a second, `<prefix>_<stamp>_<n>.xml` after.
    pub fn file_name(&self, suffix: u32) -> String {
        match suffix {
            0 => format!("{}_{}.xml", self.prefix, self.stamp),
            n => format!("{}_{}_{n}.xml", self.prefix, self.stamp),
        }
    }
}

/// A temporary file receiving a response body.
///
/// The file is removed when the draft is dropped without being persisted.
pub struct DraftSnapshot {
    writer: BufWriter<File>,
    path: TempPath,
    len: u64,
    first_significant_byte: Option<u8>,
}

impl DraftSnapshot {
    /// Creates a draft in `dir`, so it can later be renamed within the same file system.
    ///
    /// The draft is named `.<prefix>_<random>.part`.
    pub fn new_in(dir: &Path, prefix: &str) -> Result<Self, FetchError> {
        let file = tempfile::Builder::new()
            .prefix(&format!(".{prefix}_"))
            .suffix(".part")
            .tempfile_in(dir)
            .context(format!("Can't create a draft file in {dir:?}"))?;
        let (file, path) = file.into_parts();

        Ok(DraftSnapshot {
            writer: BufWriter::with_capacity(CHUNK_SIZE, File::from_std(file)),
            path,
            len: 0,
            first_significant_byte: None,
        })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), FetchError> {
        if self.first_significant_byte.is_none() {
            self.first_significant_byte = chunk
                .iter()
                .copied()
                .find(|byte| !byte.is_ascii_whitespace());
        }
        self.writer
            .write_all(chunk)
            .await
            .context(format!("Can't write to draft file {:?}", &*self.path))?;
        self.len += chunk.len() as u64;
        Ok(())
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cheap check that the payload is XML-shaped: the first non-whitespace byte is `<`.
    pub fn looks_like_xml(&self) -> bool {
        self.first_significant_byte == Some(b'<')
    }

    /// Ensures the content reached the disk.
    pub async fn finish(&mut self) -> Result<(), FetchError> {
        self.writer
            .flush()
            .await
            .context(format!("Can't flush draft file {:?}", &*self.path))?;
        self.writer
            .get_ref()
            .sync_all()
            .await
            .context(format!("Can't sync draft file {:?}", &*self.path))?;
        Ok(())
    }

    /// Moves the draft to the first free name for this snapshot in `dir`.
    ///
    /// An existing file is never overwritten.
    pub fn persist(self, dir: &Path, name: &SnapshotName) -> Result<PathBuf, FetchError> {
        let DraftSnapshot { writer, path, .. } = self;
        drop(writer);

        let mut draft = path;
        for suffix in 0..MAX_NAME_SUFFIX {
            let target = dir.join(name.file_name(suffix));
            match draft.persist_noclobber(&target) {
                Ok(()) => return Ok(target),
                Err(PathPersistError { error, path }) if error.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!("{target:?} already exists, trying the next name");
                    draft = path;
                }
                Err(PathPersistError { error, .. }) => {
                    return Err(FetchError::FromIo {
                        context: format!("Can't move the snapshot to {target:?}"),
                        source: error,
                    })
                }
            }
        }

        Err(FetchError::NameCollision {
            path: dir.join(name.file_name(0)),
        })
    }
}

/// Fails if `required` bytes would eat into the last 5% of the file system holding `dir`.
pub fn check_free_space(dir: &Path, required: u64) -> Result<(), FetchError> {
    let stats =
        statvfs::statvfs(dir).context(format!("Can't read file system stats for {dir:?}"))?;
    let block_size = stats.block_size() as u64;
    let reserved = (stats.blocks() as u64 * block_size) * 5 / 100;
    let usable = (stats.blocks_available() as u64 * block_size).saturating_sub(reserved);

    if required >= usable {
        return Err(FetchError::InsufficientSpace {
            dir: dir.to_path_buf(),
            required,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use tempfile::TempDir;

    fn name() -> SnapshotName {
        SnapshotName::new("upload", Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap())
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn snapshot_names_use_utc_timestamp() {
        assert_eq!(name().file_name(0), "upload_20240309_070501.xml");
        assert_eq!(name().file_name(2), "upload_20240309_070501_2.xml");
    }

    #[tokio::test]
    async fn persisted_draft_holds_written_bytes() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut draft = DraftSnapshot::new_in(dir.path(), "upload")?;
        draft.write_chunk(b"  \n<?xml version=\"1.0\"?>").await?;
        draft.write_chunk(b"<root/>").await?;
        draft.finish().await?;

        assert_eq!(draft.len(), 31);
        assert!(draft.looks_like_xml());

        let path = draft.persist(dir.path(), &name())?;

        assert_eq!(path, dir.path().join("upload_20240309_070501.xml"));
        assert_eq!(
            std::fs::read(&path)?,
            b"  \n<?xml version=\"1.0\"?><root/>".to_vec()
        );
        assert_eq!(files_in(dir.path()), ["upload_20240309_070501.xml"]);
        Ok(())
    }

    #[tokio::test]
    async fn dropped_draft_leaves_nothing_behind() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut draft = DraftSnapshot::new_in(dir.path(), "upload")?;
        draft.write_chunk(b"<partial").await?;
        drop(draft);

        assert!(files_in(dir.path()).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn draft_file_is_named_after_the_snapshot_prefix() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let _upload = DraftSnapshot::new_in(dir.path(), "upload")?;
        let _rsd = DraftSnapshot::new_in(dir.path(), "rsd")?;

        let files = files_in(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.starts_with(".upload_") && f.ends_with(".part")));
        assert!(files.iter().any(|f| f.starts_with(".rsd_") && f.ends_with(".part")));
        Ok(())
    }

    #[tokio::test]
    async fn existing_snapshot_is_never_overwritten() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("upload_20240309_070501.xml"), "<first/>")?;
        std::fs::write(dir.path().join("upload_20240309_070501_1.xml"), "<second/>")?;

        let mut draft = DraftSnapshot::new_in(dir.path(), "upload")?;
        draft.write_chunk(b"<third/>").await?;
        draft.finish().await?;
        let path = draft.persist(dir.path(), &name())?;

        assert_eq!(path, dir.path().join("upload_20240309_070501_2.xml"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("upload_20240309_070501.xml"))?,
            "<first/>"
        );
        assert_eq!(std::fs::read_to_string(path)?, "<third/>");
        Ok(())
    }

    #[tokio::test]
    async fn non_xml_payload_is_detected() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut draft = DraftSnapshot::new_in(dir.path(), "upload")?;
        draft.write_chunk(b"   ").await?;
        draft.write_chunk(b"{\"json\": true}").await?;

        assert!(!draft.is_empty());
        assert!(!draft.looks_like_xml());
        Ok(())
    }

    #[test]
    fn absurd_sizes_do_not_fit_on_disk() {
        let dir = TempDir::new().unwrap();

        assert!(check_free_space(dir.path(), 1).is_ok());
        assert!(matches!(
            check_free_space(dir.path(), u64::MAX),
            Err(FetchError::InsufficientSpace { .. })
        ));
    }
}
