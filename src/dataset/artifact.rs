//! On-disk layout of a dataset artifact.
//!
//! An artifact is two files in the datasets root:
//!
//! - `<model>-<crc32c>.frames`: a 32-byte header followed by `count` frames
//!   of `height * width` bytes each, row-major, in dataset order. The name
//!   embeds the CRC32C of the pixel payload, so each distinct build gets its
//!   own file.
//! - `<model>.manifest.json`: the label arrays, the source path of every frame
//!   and the bookkeeping needed for cache checks. It names the images file it
//!   belongs to, so renaming it into place publishes both halves at once.
//!
//! Header layout (little-endian):
//!
//! | offset | size | field                  |
//! |--------|------|------------------------|
//! | 0      | 8    | magic `STIGFRMS`       |
//! | 8      | 4    | format version          |
//! | 12     | 4    | height                  |
//! | 16     | 4    | width                   |
//! | 20     | 4    | reserved (zero)         |
//! | 24     | 8    | frame count             |

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::StigError;
use crate::normalize::FrameSize;

pub const IMAGES_MAGIC: [u8; 8] = *b"STIGFRMS";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 32;

const IMAGES_EXTENSION: &str = "frames";
const MANIFEST_SUFFIX: &str = ".manifest.json";

/// Header of an images file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImagesHeader {
    pub version: u32,
    pub frame_size: FrameSize,
    pub count: u64,
}

impl ImagesHeader {
    pub fn new(frame_size: FrameSize, count: usize) -> Self {
        Self {
            version: FORMAT_VERSION,
            frame_size,
            count: count as u64,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..8].copy_from_slice(&IMAGES_MAGIC);
        bytes[8..12].copy_from_slice(&self.version.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.frame_size.height.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.frame_size.width.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.count.to_le_bytes());
        bytes
    }

    /// Parses the header at the start of `bytes`.
    pub fn decode(bytes: &[u8], path: &Path) -> Result<Self, StigError> {
        if bytes.len() < HEADER_LEN {
            return Err(StigError::corrupt(
                path,
                format!(
                    "images file is {} bytes, shorter than the {HEADER_LEN}-byte header",
                    bytes.len()
                ),
            ));
        }
        if bytes[0..8] != IMAGES_MAGIC {
            return Err(StigError::corrupt(path, "images file has a bad magic number"));
        }

        let version = read_u32(&bytes[8..12]);
        if version != FORMAT_VERSION {
            return Err(StigError::corrupt(
                path,
                format!("images format version {version}, expected {FORMAT_VERSION}"),
            ));
        }

        let height = read_u32(&bytes[12..16]);
        let width = read_u32(&bytes[16..20]);
        let frame_size = FrameSize::new(height, width).map_err(|_| {
            StigError::corrupt(path, format!("images header has frame size {height}x{width}"))
        })?;

        let mut count = [0u8; 8];
        count.copy_from_slice(&bytes[24..32]);

        Ok(Self {
            version,
            frame_size,
            count: u64::from_le_bytes(count),
        })
    }

    /// Expected payload length in bytes, if it fits in memory at all.
    pub fn payload_len(&self) -> Option<usize> {
        usize::try_from(self.count)
            .ok()?
            .checked_mul(self.frame_size.pixels())
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

/// The labels half of an artifact, stored as JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub model_name: String,
    pub frame_size: FrameSize,
    pub len: usize,
    /// File name (not path) of the images file, relative to the manifest.
    pub images_file: String,
    pub images_crc32c: u32,
    /// When the build that produced this artifact started scanning.
    pub built_at: SystemTime,
    pub newest_source_mtime: SystemTime,
    pub recordings_root: PathBuf,
    pub throttles: Vec<u8>,
    pub steerings: Vec<u8>,
    /// Frame paths relative to `recordings_root`, in dataset order.
    pub sources: Vec<String>,
}

impl Manifest {
    /// Reads a manifest. A file that exists but does not parse is corrupt.
    pub fn read(path: &Path) -> Result<Self, StigError> {
        let file = File::open(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StigError::PathNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                StigError::path_io(path, source)
            }
        })?;

        serde_json::from_reader(BufReader::new(file))
            .map_err(|source| StigError::corrupt(path, format!("unreadable manifest: {source}")))
    }

    /// Resolves the images file next to the manifest at `manifest_path`.
    pub fn images_path(&self, manifest_path: &Path) -> Result<PathBuf, StigError> {
        let name = Path::new(&self.images_file);
        let is_plain_name = name.file_name().map(|n| n == name.as_os_str()) == Some(true);
        if !is_plain_name {
            return Err(StigError::corrupt(
                manifest_path,
                format!("images_file '{}' is not a plain file name", self.images_file),
            ));
        }

        Ok(manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(name))
    }

    pub(crate) fn write_atomically(&self, path: &Path) -> Result<(), StigError> {
        persist_atomically(path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, self).map_err(|source| {
                StigError::ManifestWrite {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            writer
                .write_all(b"\n")
                .map_err(|source| StigError::path_io(path, source))
        })
    }
}

/// Everything a caller needs to locate and validate a built artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub model_name: String,
    pub manifest_path: PathBuf,
    pub images_path: PathBuf,
    pub frame_size: FrameSize,
    pub len: usize,
}

impl ArtifactHandle {
    pub(crate) fn from_manifest(manifest_path: &Path, manifest: &Manifest) -> Result<Self, StigError> {
        Ok(Self {
            model_name: manifest.model_name.clone(),
            manifest_path: manifest_path.to_path_buf(),
            images_path: manifest.images_path(manifest_path)?,
            frame_size: manifest.frame_size,
            len: manifest.len,
        })
    }
}

/// Location of the manifest for `model_name` under `datasets_root`.
pub fn manifest_path(datasets_root: &Path, model_name: &str) -> PathBuf {
    datasets_root.join(format!("{model_name}{MANIFEST_SUFFIX}"))
}

pub(crate) fn images_file_name(model_name: &str, crc: u32) -> String {
    format!("{model_name}-{crc:08x}.{IMAGES_EXTENSION}")
}

/// True when `file_name` is an images file written for `model_name`.
pub(crate) fn is_images_file_for(model_name: &str, file_name: &str) -> bool {
    let Some(rest) = file_name
        .strip_prefix(model_name)
        .and_then(|rest| rest.strip_prefix('-'))
    else {
        return false;
    };
    let Some(hex) = rest
        .strip_suffix(IMAGES_EXTENSION)
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return false;
    };

    hex.len() == 8 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Model names become file names, so they are restricted to a safe alphabet.
pub fn validate_model_name(name: &str) -> Result<(), StigError> {
    let invalid = |message: &str| StigError::InvalidModelName {
        name: name.to_string(),
        message: message.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid(
            "may only contain ASCII letters, digits, '-', '_' and '.'",
        ));
    }
    Ok(())
}

/// Writes `dest` through a temporary file in the same directory, then
/// renames it into place, so readers see either the old file or the new one.
pub(crate) fn persist_atomically(
    dest: &Path,
    write: impl FnOnce(&mut BufWriter<&mut File>) -> Result<(), StigError>,
) -> Result<(), StigError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".stig-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| StigError::path_io(dir, source))?;

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer
            .flush()
            .map_err(|source| StigError::path_io(dest, source))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|source| StigError::path_io(dest, source))?;

    temp.persist(dest)
        .map_err(|err| StigError::path_io(dest, err.error))?;

    sync_dir(dir);
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(err) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::warn!(dir = %dir.display(), %err, "failed to sync directory");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Deletes images files of `model_name` other than `keep`. Failures are
/// logged, not returned: the new artifact is already committed.
pub(crate) fn remove_superseded_images(datasets_root: &Path, model_name: &str, keep: &str) {
    let entries = match fs::read_dir(datasets_root) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = %datasets_root.display(), %err, "failed to list datasets dir");
            return;
        }
    };

    for entry in entries.filter_map(Result::ok) {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name == keep || !is_images_file_for(model_name, name) {
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => tracing::debug!(file = %entry.path().display(), "removed superseded images file"),
            Err(err) => {
                tracing::warn!(file = %entry.path().display(), %err, "failed to remove superseded images file")
            }
        }
    }
}
