//! Frame naming protocol.
//!
//! The recorder stores the action that was held while a frame was captured in
//! the frame's file name, and the file name is the only place labels live:
//!
//! ```text
//! frame_<timestamp>_<throttle>_<steering>.<jpg|jpeg|png>
//! ```
//!
//! `<timestamp>` is one or more ASCII digits, `<throttle>` is one of `""`,
//! `accelerate`, `brake` and `<steering>` is one of `""`, `left`, `right`.
//! Either label may be empty, so `frame_300__right.jpg` is valid. Only the
//! extension is matched case-insensitively.
//!
//! This module is the single place that knows the grammar.

use std::path::Path;

use crate::error::StigError;
use crate::label::{STEERING_TABLE, THROTTLE_TABLE};

/// Every frame file name starts with this prefix.
pub const FRAME_PREFIX: &str = "frame_";

/// Image extensions a frame may use (compared case-insensitively).
pub const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Metadata recovered from a frame's file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRecord {
    /// Capture timestamp as written by the recorder.
    pub timestamp: u64,
    /// One of `""`, `"accelerate"`, `"brake"`.
    pub throttle_label: &'static str,
    /// One of `""`, `"left"`, `"right"`.
    pub steering_label: &'static str,
}

impl FrameRecord {
    /// Formats the file name the recorder would write for this record.
    pub fn file_name(&self, extension: &str) -> String {
        format!(
            "{}{}_{}_{}.{}",
            FRAME_PREFIX, self.timestamp, self.throttle_label, self.steering_label, extension
        )
    }
}

/// Returns true when `path` looks like a frame file: a `frame_` prefix and a
/// supported image extension. Such files are expected to parse; anything that
/// does not is a malformed frame rather than an unrelated file.
pub fn is_frame_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };

    name.starts_with(FRAME_PREFIX) && has_frame_extension(path)
}

fn has_frame_extension(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    FRAME_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
}

/// Parses the file name of `path` into a [`FrameRecord`].
///
/// # Errors
/// Returns [`StigError::Naming`] carrying `path` when the name does not follow
/// the grammar.
pub fn parse_frame_name(path: &Path) -> Result<FrameRecord, StigError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| StigError::Naming {
            path: path.to_path_buf(),
            message: "file name is missing or not valid UTF-8".to_string(),
        })?;

    parse_file_name(name).map_err(|message| StigError::Naming {
        path: path.to_path_buf(),
        message,
    })
}

fn parse_file_name(name: &str) -> Result<FrameRecord, String> {
    let (stem, ext) = name
        .rsplit_once('.')
        .ok_or_else(|| "missing file extension".to_string())?;

    if !FRAME_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
    {
        return Err(format!(
            "unsupported extension '.{ext}'; expected one of .jpg, .jpeg, .png"
        ));
    }

    let fields = stem
        .strip_prefix(FRAME_PREFIX)
        .ok_or_else(|| format!("expected '{FRAME_PREFIX}' prefix"))?;

    // Labels never contain '_', so a valid name splits into exactly three fields.
    let mut parts = fields.split('_');
    let (Some(timestamp), Some(throttle), Some(steering), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!(
            "expected frame_<timestamp>_<throttle>_<steering>, found '{stem}'"
        ));
    };

    if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!(
            "invalid timestamp '{timestamp}'; expected one or more digits"
        ));
    }
    let timestamp = timestamp
        .parse::<u64>()
        .map_err(|_| format!("timestamp '{timestamp}' does not fit in 64 bits"))?;

    let throttle_label = THROTTLE_TABLE.lookup(throttle).ok_or_else(|| {
        format!("unknown throttle label '{throttle}'; expected '', 'accelerate' or 'brake'")
    })?;
    let steering_label = STEERING_TABLE.lookup(steering).ok_or_else(|| {
        format!("unknown steering label '{steering}'; expected '', 'left' or 'right'")
    })?;

    Ok(FrameRecord {
        timestamp,
        throttle_label,
        steering_label,
    })
}
