//! Read-only access to a built dataset artifact.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::artifact::{ArtifactHandle, ImagesHeader, Manifest, FORMAT_VERSION, HEADER_LEN};
use crate::error::StigError;
use crate::label::CLASSES_PER_AXIS;
use crate::normalize::{to_unit_range, FrameSize};

/// How the images file is brought into memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Map the file read-only; pages are read on first access.
    #[default]
    Mmap,
    /// Read the whole file into an owned buffer.
    InMemory,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub mode: LoadMode,
    /// Recompute the payload CRC32C and compare it with the manifest. This
    /// touches every page, so it is off by default.
    pub verify_checksum: bool,
}

/// A read-only byte view over the images file.
pub trait FrameStore: Send + Sync {
    fn bytes(&self) -> &[u8];
}

impl FrameStore for Mmap {
    fn bytes(&self) -> &[u8] {
        self
    }
}

impl FrameStore for Vec<u8> {
    fn bytes(&self) -> &[u8] {
        self
    }
}

/// One dataset item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameItem<'a> {
    /// Row-major grayscale pixels of the dataset's frame size.
    pub image: &'a [u8],
    pub throttle: u8,
    pub steering: u8,
}

impl FrameItem<'_> {
    /// Model input for this item, scaled to `[0, 1]`.
    pub fn to_unit_range(&self) -> Vec<f32> {
        to_unit_range(self.image)
    }
}

/// An artifact opened for indexed reads.
pub struct LoadedDataset {
    manifest: Manifest,
    manifest_path: PathBuf,
    images_path: PathBuf,
    store: Box<dyn FrameStore>,
}

impl std::fmt::Debug for LoadedDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDataset")
            .field("model_name", &self.manifest.model_name)
            .field("len", &self.manifest.len)
            .field("frame_size", &self.manifest.frame_size)
            .field("images_path", &self.images_path)
            .finish()
    }
}

/// Opens the artifact described by `handle`.
pub fn load(handle: &ArtifactHandle, options: &LoadOptions) -> Result<LoadedDataset, StigError> {
    LoadedDataset::open(&handle.manifest_path, handle.frame_size, options)
}

impl LoadedDataset {
    /// Opens the artifact whose manifest is at `manifest_path`, checking that
    /// its frames have size `expected`.
    ///
    /// # Errors
    /// [`StigError::ArtifactCorrupt`] when the manifest and images file
    /// disagree with each other or with `expected`.
    pub fn open(
        manifest_path: &Path,
        expected: FrameSize,
        options: &LoadOptions,
    ) -> Result<Self, StigError> {
        let manifest = Manifest::read(manifest_path)?;
        check_manifest(&manifest, manifest_path, expected)?;

        let images_path = manifest.images_path(manifest_path)?;
        let store = open_store(&images_path, options.mode)?;
        check_images(&manifest, &images_path, store.bytes(), options.verify_checksum)?;

        tracing::debug!(
            model = %manifest.model_name,
            frames = manifest.len,
            mode = ?options.mode,
            "dataset loaded"
        );

        Ok(Self {
            manifest,
            manifest_path: manifest_path.to_path_buf(),
            images_path,
            store,
        })
    }

    pub fn len(&self) -> usize {
        self.manifest.len
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.len == 0
    }

    pub fn frame_size(&self) -> FrameSize {
        self.manifest.frame_size
    }

    /// Item `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<FrameItem<'_>> {
        if index >= self.len() {
            return None;
        }

        let frame_len = self.frame_size().pixels();
        let start = HEADER_LEN + index * frame_len;
        Some(FrameItem {
            image: &self.store.bytes()[start..start + frame_len],
            throttle: self.manifest.throttles[index],
            steering: self.manifest.steerings[index],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = FrameItem<'_>> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// Path of the frame item `index` came from, relative to the recordings root.
    pub fn source(&self, index: usize) -> Option<&str> {
        self.manifest.sources.get(index).map(String::as_str)
    }

    pub fn throttles(&self) -> &[u8] {
        &self.manifest.throttles
    }

    pub fn steerings(&self) -> &[u8] {
        &self.manifest.steerings
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn images_path(&self) -> &Path {
        &self.images_path
    }

    /// Number of pixel bytes in the images file.
    pub fn payload_len(&self) -> usize {
        self.store.bytes().len() - HEADER_LEN
    }
}

fn open_store(path: &Path, mode: LoadMode) -> Result<Box<dyn FrameStore>, StigError> {
    if !path.is_file() {
        return Err(StigError::corrupt(path, "images file is missing"));
    }

    match mode {
        LoadMode::Mmap => {
            let file = File::open(path).map_err(|source| StigError::path_io(path, source))?;
            // SAFETY: artifacts are never modified in place. A rebuild writes
            // a new file and renames it, leaving existing mappings intact.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|source| StigError::path_io(path, source))?;
            Ok(Box::new(mmap))
        }
        LoadMode::InMemory => {
            let bytes = std::fs::read(path).map_err(|source| StigError::path_io(path, source))?;
            Ok(Box::new(bytes))
        }
    }
}

fn check_manifest(manifest: &Manifest, path: &Path, expected: FrameSize) -> Result<(), StigError> {
    if manifest.format_version != FORMAT_VERSION {
        return Err(StigError::corrupt(
            path,
            format!(
                "manifest format version {}, expected {FORMAT_VERSION}",
                manifest.format_version
            ),
        ));
    }

    if manifest.frame_size != expected {
        return Err(StigError::corrupt(
            path,
            format!(
                "frame size {} does not match expected {expected}",
                manifest.frame_size
            ),
        ));
    }

    let counts = [
        ("throttle labels", manifest.throttles.len()),
        ("steering labels", manifest.steerings.len()),
        ("sources", manifest.sources.len()),
    ];
    for (what, count) in counts {
        if count != manifest.len {
            return Err(StigError::corrupt(
                path,
                format!("{count} {what} for {} images", manifest.len),
            ));
        }
    }

    let labels = [
        ("throttle", &manifest.throttles),
        ("steering", &manifest.steerings),
    ];
    for (axis, indices) in labels {
        if let Some((index, value)) = indices
            .iter()
            .enumerate()
            .find(|(_, value)| usize::from(**value) >= CLASSES_PER_AXIS)
        {
            return Err(StigError::corrupt(
                path,
                format!("{axis} label {value} at item {index} is outside 0..{CLASSES_PER_AXIS}"),
            ));
        }
    }

    Ok(())
}

fn check_images(
    manifest: &Manifest,
    path: &Path,
    bytes: &[u8],
    verify_checksum: bool,
) -> Result<(), StigError> {
    let header = ImagesHeader::decode(bytes, path)?;

    if header.frame_size != manifest.frame_size {
        return Err(StigError::corrupt(
            path,
            format!(
                "images header frame size {} does not match manifest {}",
                header.frame_size, manifest.frame_size
            ),
        ));
    }
    if header.count != manifest.len as u64 {
        return Err(StigError::corrupt(
            path,
            format!(
                "images file holds {} frames, manifest has {} labels",
                header.count, manifest.len
            ),
        ));
    }

    let payload = &bytes[HEADER_LEN..];
    let expected_len = header.payload_len();
    if expected_len != Some(payload.len()) {
        return Err(StigError::corrupt(
            path,
            format!(
                "images payload is {} bytes, expected {}",
                payload.len(),
                expected_len.map_or_else(|| "an impossible size".to_string(), |n| n.to_string())
            ),
        ));
    }

    if verify_checksum {
        let actual = crc32c::crc32c(payload);
        if actual != manifest.images_crc32c {
            return Err(StigError::corrupt(
                path,
                format!(
                    "payload checksum {actual:08x} does not match manifest {:08x}",
                    manifest.images_crc32c
                ),
            ));
        }
    }

    Ok(())
}
