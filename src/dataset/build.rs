//! Dataset construction with a freshness-checked on-disk cache.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use super::artifact::{self, ArtifactHandle, ImagesHeader, Manifest, FORMAT_VERSION};
use crate::error::StigError;
use crate::label::LabelCodec;
use crate::naming::parse_frame_name;
use crate::normalize::{normalize_path_into, FrameSize};
use crate::scan::{scan_frames, FrameScan};

/// What to build and where.
#[derive(Clone, Debug)]
pub struct BuildConfig {
    /// Namespaces the artifact files inside `datasets_root`.
    pub model_name: String,
    pub recordings_root: PathBuf,
    pub datasets_root: PathBuf,
    pub frame_size: FrameSize,
    /// Decode frames on the rayon thread pool.
    pub parallel: bool,
    /// Rebuild even when the cached artifact is fresh.
    pub force: bool,
    /// Show a progress bar while decoding.
    pub progress: bool,
}

impl BuildConfig {
    pub fn new(
        model_name: impl Into<String>,
        recordings_root: impl Into<PathBuf>,
        datasets_root: impl Into<PathBuf>,
        frame_size: FrameSize,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            recordings_root: recordings_root.into(),
            datasets_root: datasets_root.into(),
            frame_size,
            parallel: true,
            force: false,
            progress: false,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        artifact::manifest_path(&self.datasets_root, &self.model_name)
    }
}

/// Why a cached artifact was not reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildReason {
    /// No manifest, or the images file it names is gone.
    Missing,
    /// A frame was modified after the cached build started.
    SourceNewer,
    /// Frames were added or removed.
    FrameCountChanged { cached: usize, found: usize },
    /// Frames were renamed or moved, which can relabel them without touching
    /// their modification times.
    SourcesChanged,
    /// The cached artifact was written in another format version.
    FormatChanged { cached: u32 },
    FrameSizeChanged { cached: FrameSize, requested: FrameSize },
    Forced,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::Missing => write!(f, "no cached artifact"),
            RebuildReason::SourceNewer => write!(f, "recordings changed since the last build"),
            RebuildReason::FrameCountChanged { cached, found } => {
                write!(f, "frame count changed from {cached} to {found}")
            }
            RebuildReason::SourcesChanged => write!(f, "frames were renamed or moved"),
            RebuildReason::FormatChanged { cached } => {
                write!(f, "artifact format changed from {cached} to {FORMAT_VERSION}")
            }
            RebuildReason::FrameSizeChanged { cached, requested } => {
                write!(f, "frame size changed from {cached} to {requested}")
            }
            RebuildReason::Forced => write!(f, "rebuild forced"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    /// The cached artifact was reused; nothing was decoded.
    Fresh,
    Rebuilt(RebuildReason),
}

#[derive(Clone, Debug)]
pub struct BuildOutcome {
    pub artifact: ArtifactHandle,
    pub status: CacheStatus,
}

/// Returns a handle to an up-to-date artifact for `config`, building it if
/// the cache is missing or stale.
///
/// A build either commits a complete artifact or writes nothing: every
/// frame name is validated before decoding starts, and any naming, decode or
/// I/O error aborts before the first file is written.
///
/// Concurrent builds of the same model into the same datasets root are not
/// coordinated; callers must serialize them.
pub fn build_dataset(config: &BuildConfig, codec: &LabelCodec) -> Result<BuildOutcome, StigError> {
    artifact::validate_model_name(&config.model_name)?;

    let started = SystemTime::now();
    let scan = scan_frames(&config.recordings_root)?;
    let newest = scan.newest_mtime()?;
    let manifest_path = config.manifest_path();

    let reason = if config.force {
        RebuildReason::Forced
    } else {
        match check_cache(&manifest_path, config, &scan, newest)? {
            CacheCheck::Fresh(artifact) => {
                tracing::info!(
                    model = %config.model_name,
                    frames = artifact.len,
                    manifest = %manifest_path.display(),
                    "dataset cache is fresh"
                );
                return Ok(BuildOutcome {
                    artifact,
                    status: CacheStatus::Fresh,
                });
            }
            CacheCheck::Stale(reason) => reason,
        }
    };

    tracing::info!(
        model = %config.model_name,
        frames = scan.len(),
        %reason,
        "building dataset"
    );

    let artifact = rebuild(config, codec, &scan, newest, started)?;
    Ok(BuildOutcome {
        artifact,
        status: CacheStatus::Rebuilt(reason),
    })
}

enum CacheCheck {
    Fresh(ArtifactHandle),
    Stale(RebuildReason),
}

fn check_cache(
    manifest_path: &Path,
    config: &BuildConfig,
    scan: &FrameScan,
    newest: SystemTime,
) -> Result<CacheCheck, StigError> {
    if !manifest_path.is_file() {
        return Ok(CacheCheck::Stale(RebuildReason::Missing));
    }

    let manifest = Manifest::read(manifest_path)?;
    if manifest.model_name != config.model_name {
        return Err(StigError::corrupt(
            manifest_path,
            format!(
                "manifest belongs to model '{}', expected '{}'",
                manifest.model_name, config.model_name
            ),
        ));
    }
    if manifest.format_version != FORMAT_VERSION {
        return Ok(CacheCheck::Stale(RebuildReason::FormatChanged {
            cached: manifest.format_version,
        }));
    }

    let artifact = ArtifactHandle::from_manifest(manifest_path, &manifest)?;
    if !artifact.images_path.is_file() {
        return Ok(CacheCheck::Stale(RebuildReason::Missing));
    }
    if manifest.frame_size != config.frame_size {
        return Ok(CacheCheck::Stale(RebuildReason::FrameSizeChanged {
            cached: manifest.frame_size,
            requested: config.frame_size,
        }));
    }
    if manifest.built_at < newest {
        return Ok(CacheCheck::Stale(RebuildReason::SourceNewer));
    }
    if manifest.len != scan.len() {
        return Ok(CacheCheck::Stale(RebuildReason::FrameCountChanged {
            cached: manifest.len,
            found: scan.len(),
        }));
    }
    if manifest.sources != scan.relative_paths() {
        return Ok(CacheCheck::Stale(RebuildReason::SourcesChanged));
    }

    Ok(CacheCheck::Fresh(artifact))
}

fn rebuild(
    config: &BuildConfig,
    codec: &LabelCodec,
    scan: &FrameScan,
    newest: SystemTime,
    started: SystemTime,
) -> Result<ArtifactHandle, StigError> {
    let frames = scan.frames();
    let size = config.frame_size;

    // Names first, so a malformed frame aborts before any decoding work.
    let mut throttles = Vec::with_capacity(frames.len());
    let mut steerings = Vec::with_capacity(frames.len());
    for path in frames {
        let record = parse_frame_name(path)?;
        throttles.push(codec.encode_throttle(record.throttle_label)?);
        steerings.push(codec.encode_steering(record.steering_label)?);
    }

    let header = ImagesHeader::new(size, frames.len());
    let payload_len = header.payload_len().ok_or_else(|| {
        StigError::corrupt(
            &config.recordings_root,
            format!("{} frames of {size} do not fit in memory", frames.len()),
        )
    })?;
    let mut pixels = vec![0u8; payload_len];

    let progress = progress_bar(frames.len() as u64, config.progress);
    decode_frames(frames, size, &mut pixels, config.parallel, &progress)?;
    progress.finish_and_clear();

    let crc = crc32c::crc32c(&pixels);
    let images_file = artifact::images_file_name(&config.model_name, crc);
    let images_path = config.datasets_root.join(&images_file);
    let manifest_path = config.manifest_path();

    fs::create_dir_all(&config.datasets_root)
        .map_err(|source| StigError::path_io(&config.datasets_root, source))?;

    artifact::persist_atomically(&images_path, |writer| {
        writer
            .write_all(&header.encode())
            .and_then(|()| writer.write_all(&pixels))
            .map_err(|source| StigError::path_io(&images_path, source))
    })?;

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        model_name: config.model_name.clone(),
        frame_size: size,
        len: frames.len(),
        images_file: images_file.clone(),
        images_crc32c: crc,
        built_at: started,
        newest_source_mtime: newest,
        recordings_root: config.recordings_root.clone(),
        throttles,
        steerings,
        sources: scan.relative_paths(),
    };
    manifest.write_atomically(&manifest_path)?;

    artifact::remove_superseded_images(&config.datasets_root, &config.model_name, &images_file);

    tracing::info!(
        model = %config.model_name,
        frames = manifest.len,
        images = %images_path.display(),
        manifest = %manifest_path.display(),
        "dataset written"
    );

    ArtifactHandle::from_manifest(&manifest_path, &manifest)
}

/// Decodes every frame into its slot of `pixels`. Slot `i` always receives
/// frame `i`, whichever thread decodes it.
fn decode_frames(
    frames: &[PathBuf],
    size: FrameSize,
    pixels: &mut [u8],
    parallel: bool,
    progress: &ProgressBar,
) -> Result<(), StigError> {
    let decode = |(slot, path): (&mut [u8], &PathBuf)| -> Result<(), StigError> {
        normalize_path_into(path, size, slot)?;
        progress.inc(1);
        Ok(())
    };

    if parallel {
        pixels
            .par_chunks_exact_mut(size.pixels())
            .zip(frames.par_iter())
            .try_for_each(decode)
    } else {
        pixels
            .chunks_exact_mut(size.pixels())
            .zip(frames.iter())
            .try_for_each(decode)
    }
}

fn progress_bar(len: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}
