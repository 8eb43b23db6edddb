//! Building, caching and loading training datasets.
//!
//! [`build_dataset`] turns a recordings tree into an artifact in the
//! datasets root and reuses it while it is fresh. [`load`] opens an artifact
//! for indexed reads.

pub mod artifact;
pub mod build;
pub mod load;

pub use artifact::{manifest_path, validate_model_name, ArtifactHandle, Manifest};
pub use build::{build_dataset, BuildConfig, BuildOutcome, CacheStatus, RebuildReason};
pub use load::{load, FrameItem, FrameStore, LoadMode, LoadOptions, LoadedDataset};
