//! Dataset inspection.
//!
//! Summarizes a loaded dataset: how many frames it holds, how its labels are
//! distributed on each axis, and which (throttle, steering) combinations
//! occur.

mod report;

pub use report::{AxisHistogram, CombinationCount, InspectReport, LabelCount, SummarySection};

use std::time::UNIX_EPOCH;

use crate::dataset::LoadedDataset;
use crate::label::{AxisTable, LabelCodec, CLASSES_PER_AXIS};

/// Width of histogram bars in characters.
const BAR_WIDTH: usize = 20;

/// Inspect a loaded dataset and produce a report.
pub fn inspect_dataset(dataset: &LoadedDataset, codec: &LabelCodec) -> InspectReport {
    let manifest = dataset.manifest();

    let summary = SummarySection {
        model_name: manifest.model_name.clone(),
        frames: dataset.len(),
        frame_size: dataset.frame_size(),
        payload_bytes: dataset.payload_len(),
        built_at_unix_secs: manifest
            .built_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
        recordings_root: manifest.recordings_root.display().to_string(),
    };

    InspectReport {
        summary,
        throttle: histogram(&codec.throttle, dataset.throttles()),
        steering: histogram(&codec.steering, dataset.steerings()),
        combinations: combinations(codec, dataset.throttles(), dataset.steerings()),
        bar_width: BAR_WIDTH,
    }
}

fn count_indices(indices: &[u8]) -> [usize; CLASSES_PER_AXIS] {
    let mut counts = [0usize; CLASSES_PER_AXIS];
    for &index in indices {
        // The loader rejects out-of-range indices, so this never skips.
        if let Some(slot) = counts.get_mut(usize::from(index)) {
            *slot += 1;
        }
    }
    counts
}

fn histogram(table: &AxisTable, indices: &[u8]) -> AxisHistogram {
    let entries = count_indices(indices)
        .into_iter()
        .enumerate()
        .map(|(index, count)| LabelCount {
            label: table.display_name(index).to_string(),
            index: index as u8,
            count,
        })
        .collect();

    AxisHistogram {
        axis: table.axis().to_string(),
        total: indices.len(),
        entries,
    }
}

/// Counts of every (throttle, steering) pair that occurs, most frequent
/// first, ties broken by index order.
fn combinations(codec: &LabelCodec, throttles: &[u8], steerings: &[u8]) -> Vec<CombinationCount> {
    let mut grid = [[0usize; CLASSES_PER_AXIS]; CLASSES_PER_AXIS];
    for (&throttle, &steering) in throttles.iter().zip(steerings) {
        if let Some(cell) = grid
            .get_mut(usize::from(throttle))
            .and_then(|row| row.get_mut(usize::from(steering)))
        {
            *cell += 1;
        }
    }

    let mut combos: Vec<CombinationCount> = Vec::new();
    for (t, row) in grid.iter().enumerate() {
        for (s, &count) in row.iter().enumerate() {
            if count == 0 {
                continue;
            }
            combos.push(CombinationCount {
                throttle: codec.throttle.display_name(t).to_string(),
                steering: codec.steering.display_name(s).to_string(),
                count,
            });
        }
    }

    // Stable sort keeps index order among equal counts.
    combos.sort_by(|a, b| b.count.cmp(&a.count));
    combos
}
