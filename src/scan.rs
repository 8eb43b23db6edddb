//! Discovery of frame files under a recordings root.
//!
//! Recordings are usually laid out as `session_*/lap_*/frame_*.jpeg`, but any
//! depth works. Frames are returned sorted by their `/`-joined path relative
//! to the root, so two scans of the same tree always agree on the order.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::StigError;
use crate::naming::is_frame_candidate;

/// The result of one traversal of a recordings root.
#[derive(Clone, Debug)]
pub struct FrameScan {
    root: PathBuf,
    frames: Vec<PathBuf>,
    newest: Option<SystemTime>,
}

impl FrameScan {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Frame paths in deterministic order.
    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<PathBuf> {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Most recent modification time among the frames.
    ///
    /// # Errors
    /// [`StigError::NoFramesFound`] when the scan found nothing.
    pub fn newest_mtime(&self) -> Result<SystemTime, StigError> {
        self.newest.ok_or_else(|| StigError::NoFramesFound {
            path: self.root.clone(),
        })
    }

    /// Frame paths relative to the root, `/`-separated.
    pub fn relative_paths(&self) -> Vec<String> {
        self.frames
            .iter()
            .map(|path| rel_string(&self.root, path))
            .collect()
    }
}

/// Recursively lists every frame file beneath `root`, in deterministic order.
pub fn discover_frames(root: &Path) -> Result<Vec<PathBuf>, StigError> {
    scan_frames(root).map(FrameScan::into_frames)
}

/// Newest modification time among the frames beneath `root`.
pub fn newest_modification_time(root: &Path) -> Result<SystemTime, StigError> {
    scan_frames(root)?.newest_mtime()
}

/// Walks `root` once, collecting frame paths and their newest mtime.
///
/// # Errors
/// [`StigError::PathNotFound`] when `root` does not exist or is not a
/// directory. Traversal and metadata errors fail the scan immediately.
pub fn scan_frames(root: &Path) -> Result<FrameScan, StigError> {
    if !root.is_dir() {
        return Err(StigError::PathNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut frames = Vec::new();
    let mut newest: Option<SystemTime> = None;

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|source| StigError::Traversal {
            path: source
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            message: source.to_string(),
        })?;

        if !entry.file_type().is_file() || !is_frame_candidate(entry.path()) {
            continue;
        }

        let modified = entry
            .metadata()
            .map_err(|source| StigError::Traversal {
                path: entry.path().to_path_buf(),
                message: source.to_string(),
            })?
            .modified()
            .map_err(|source| StigError::path_io(entry.path(), source))?;

        newest = Some(newest.map_or(modified, |current| current.max(modified)));
        frames.push(entry.into_path());
    }

    frames.sort_by_cached_key(|path| rel_string(root, path));

    tracing::debug!(root = %root.display(), frames = frames.len(), "scanned recordings");

    Ok(FrameScan {
        root: root.to_path_buf(),
        frames,
        newest,
    })
}

pub(crate) fn rel_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
