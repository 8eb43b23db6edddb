use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Where the bytes of a failed decode came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeOrigin {
    /// A frame file read from storage.
    File(PathBuf),
    /// A caller-supplied buffer (e.g. an inference request body).
    Buffer { len: usize },
}

impl fmt::Display for DecodeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeOrigin::File(path) => write!(f, "{}", path.display()),
            DecodeOrigin::Buffer { len } => write!(f, "in-memory buffer ({len} bytes)"),
        }
    }
}

/// The main error type for stig operations.
#[derive(Debug, Error)]
pub enum StigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid frame name {path}: {message}")]
    Naming { path: PathBuf, message: String },

    #[error("Failed to decode image from {origin}: {source}")]
    Decode {
        origin: DecodeOrigin,
        #[source]
        source: image::ImageError,
    },

    #[error("No frames found in {path}")]
    NoFramesFound { path: PathBuf },

    #[error("Path not found: {path}")]
    PathNotFound { path: PathBuf },

    #[error("Failed while traversing {path}: {message}")]
    Traversal { path: PathBuf, message: String },

    #[error("Corrupt dataset artifact {path}: {message}")]
    ArtifactCorrupt { path: PathBuf, message: String },

    #[error("Failed to write manifest {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid frame size {height}x{width}: both dimensions must be positive")]
    InvalidFrameSize { height: u32, width: u32 },

    #[error("Invalid model name '{name}': {message}")]
    InvalidModelName { name: String, message: String },

    #[error("Unknown {axis} label '{label}'")]
    UnknownLabel { axis: &'static str, label: String },

    #[error("Unknown {axis} label index {index}")]
    UnknownLabelIndex { axis: &'static str, index: usize },

    #[error("Expected {expected} {axis} logits, got {actual}")]
    LogitsArity {
        axis: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl StigError {
    /// True for errors a serving layer should report as bad client input
    /// (undecodable image bytes). Everything else is a server fault.
    pub fn is_bad_input(&self) -> bool {
        matches!(self, StigError::Decode { .. })
    }

    pub(crate) fn path_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StigError::PathIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        StigError::ArtifactCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }
}
