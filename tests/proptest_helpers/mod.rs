#![allow(dead_code)]

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use stig::label::{STEERING_LABELS, THROTTLE_LABELS};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A well-formed frame file name together with the label indices it encodes.
#[derive(Clone, Debug)]
pub struct NamedFrame {
    pub file_name: String,
    pub timestamp: u64,
    pub throttle: usize,
    pub steering: usize,
}

pub fn arb_frame_name() -> BoxedStrategy<NamedFrame> {
    (
        any::<u64>(),
        0usize..THROTTLE_LABELS.len(),
        0usize..STEERING_LABELS.len(),
        prop::sample::select(vec!["jpg", "jpeg", "png", "JPG", "Jpeg"]),
    )
        .prop_map(|(timestamp, throttle, steering, ext)| NamedFrame {
            file_name: format!(
                "frame_{timestamp}_{}_{}.{ext}",
                THROTTLE_LABELS[throttle], STEERING_LABELS[steering]
            ),
            timestamp,
            throttle,
            steering,
        })
        .boxed()
}

/// Three logits per axis, finite and bounded.
pub fn arb_logits() -> BoxedStrategy<Vec<f32>> {
    proptest::collection::vec(-100.0f32..100.0, 3).boxed()
}
