//! Filesystem library of source videos, edited outputs, and records.
//!
//! Layout under the library root:
//!
//! ```text
//! originals/<id>.<ext>
//! edited/<id>/<stem>_edited.<ext>
//! records/<id>.json
//! ```

use std::path::{Path, PathBuf};

use crate::record::{VideoMetadata, VideoRecord};

const ORIGINALS_DIR: &str = "originals";
const EDITED_DIR: &str = "edited";
const RECORDS_DIR: &str = "records";
const DEFAULT_EXTENSION: &str = "mp4";

/// Errors that can occur when working with the library.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Video not found: {id}")]
    NotFound { id: String },
}

impl LibraryError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Handle to a library directory.
#[derive(Debug, Clone)]
pub struct VideoLibrary {
    root: PathBuf,
}

impl VideoLibrary {
    /// Open a library, creating its directory structure if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let root = root.as_ref().to_path_buf();
        for subdir in [ORIGINALS_DIR, EDITED_DIR, RECORDS_DIR] {
            let dir = root.join(subdir);
            std::fs::create_dir_all(&dir).map_err(|e| LibraryError::io(&dir, e))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy a file on disk into the library and create its record.
    pub fn import_file(
        &self,
        source: impl AsRef<Path>,
        metadata: VideoMetadata,
    ) -> Result<VideoRecord, LibraryError> {
        let source = source.as_ref();
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video")
            .to_string();
        let id = uuid::Uuid::new_v4().to_string();
        let dest = self.original_destination(&id, &filename);

        let size_bytes = std::fs::copy(source, &dest).map_err(|e| LibraryError::io(source, e))?;
        let record = VideoRecord::new(id, filename, dest, size_bytes, metadata);
        self.save(&record)?;

        tracing::info!(
            video_id = %record.id,
            filename = %record.original_filename,
            size_bytes,
            "Imported video"
        );
        Ok(record)
    }

    /// Store uploaded bytes as a new original and create its record.
    pub fn import_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
        metadata: VideoMetadata,
    ) -> Result<VideoRecord, LibraryError> {
        let filename = sanitize_filename(filename);
        let id = uuid::Uuid::new_v4().to_string();
        let dest = self.original_destination(&id, &filename);

        std::fs::write(&dest, bytes).map_err(|e| LibraryError::io(&dest, e))?;
        let record = VideoRecord::new(id, filename, dest, bytes.len() as u64, metadata);
        self.save(&record)?;

        tracing::info!(
            video_id = %record.id,
            filename = %record.original_filename,
            size_bytes = record.size_bytes,
            "Stored upload"
        );
        Ok(record)
    }

    /// Load a record by id.
    pub fn load(&self, id: &str) -> Result<VideoRecord, LibraryError> {
        if !is_valid_id(id) {
            return Err(LibraryError::NotFound { id: id.to_string() });
        }
        let path = self.record_path(id);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LibraryError::NotFound { id: id.to_string() });
            }
            Err(e) => return Err(LibraryError::io(&path, e)),
        };
        serde_json::from_str(&json).map_err(|e| LibraryError::Parse { path, source: e })
    }

    /// Persist a record. Written to a temp file and renamed into place.
    pub fn save(&self, record: &VideoRecord) -> Result<(), LibraryError> {
        let path = self.record_path(&record.id);
        let json = serde_json::to_string_pretty(record).map_err(|e| LibraryError::Parse {
            path: path.clone(),
            source: e,
        })?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| LibraryError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| LibraryError::io(&path, e))?;
        Ok(())
    }

    /// All records, oldest first. Unreadable records are skipped with a warning.
    pub fn list(&self) -> Result<Vec<VideoRecord>, LibraryError> {
        let dir = self.root.join(RECORDS_DIR);
        let entries = std::fs::read_dir(&dir).map_err(|e| LibraryError::io(&dir, e))?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LibraryError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load(id) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = %path.display(), "Skipping record: {e}"),
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    /// Stored location of a record's original.
    pub fn original_path(&self, record: &VideoRecord) -> PathBuf {
        record.original_path.clone()
    }

    /// Directory holding a record's edited outputs.
    pub fn edited_dir_for(&self, record: &VideoRecord) -> PathBuf {
        self.root.join(EDITED_DIR).join(&record.id)
    }

    /// Where the edited output for a record belongs.
    pub fn edited_path_for(&self, record: &VideoRecord) -> PathBuf {
        self.edited_dir_for(record).join(record.edited_filename())
    }

    /// Canonical form of `path` when it names an existing file inside the
    /// record's edited directory. Relative paths are taken from that
    /// directory.
    pub fn resolve_edited_artifact(&self, record: &VideoRecord, path: &Path) -> Option<PathBuf> {
        let dir = self.edited_dir_for(record);
        let candidate = std::fs::canonicalize(dir.join(path)).ok()?;
        let dir = std::fs::canonicalize(&dir).ok()?;
        (candidate.starts_with(&dir) && candidate.is_file()).then_some(candidate)
    }

    /// [`Self::edited_path_for`] with its parent directory created.
    pub fn prepare_edited_path(&self, record: &VideoRecord) -> Result<PathBuf, LibraryError> {
        let path = self.edited_path_for(record);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LibraryError::io(parent, e))?;
        }
        Ok(path)
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(RECORDS_DIR).join(format!("{id}.json"))
    }

    fn original_destination(&self, id: &str, filename: &str) -> PathBuf {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_EXTENSION);
        self.root.join(ORIGINALS_DIR).join(format!("{id}.{ext}"))
    }
}

/// Ids are UUID-shaped; anything else cannot name a record.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Keep only the final path component of an uploaded filename.
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return "video".to_string();
    }
    base.chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect()
}
