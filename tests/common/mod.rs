#![allow(dead_code)]

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::{GrayImage, Luma};
use stig::dataset::BuildConfig;
use stig::FrameSize;

/// Writes a uniformly shaded frame. The format follows the extension.
pub fn write_flat_frame(dir: &Path, name: &str, width: u32, height: u32, shade: u8) -> PathBuf {
    save(dir, name, GrayImage::from_pixel(width, height, Luma([shade])))
}

/// Writes a frame with a diagonal gradient, so resizing has real work to do.
pub fn write_gradient_frame(dir: &Path, name: &str, width: u32, height: u32, seed: u8) -> PathBuf {
    let image = GrayImage::from_fn(width, height, |x, y| {
        Luma([(x.wrapping_mul(3) + y.wrapping_mul(5) + u32::from(seed)) as u8])
    });
    save(dir, name, image)
}

fn save(dir: &Path, name: &str, image: GrayImage) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    image.save(&path).expect("write frame");
    path
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    OpenOptions::new()
        .write(true)
        .open(path)
        .expect("open for mtime")
        .set_modified(time)
        .expect("set mtime");
}

pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .expect("read mtime")
}

/// Build config rooted in `temp`, with recordings in `temp/recordings` and
/// datasets in `temp/datasets`.
pub fn config(temp: &Path, height: u32, width: u32) -> BuildConfig {
    BuildConfig::new(
        "stig",
        temp.join("recordings"),
        temp.join("datasets"),
        FrameSize::new(height, width).expect("valid frame size"),
    )
}

/// File names in `dir`, sorted. Empty if `dir` does not exist.
pub fn list_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
