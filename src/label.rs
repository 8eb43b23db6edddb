//! Label codec for the two action axes.
//!
//! Each axis has exactly three classes. The empty label is the neutral class
//! (no throttle input, straight steering) and always encodes to 0; the two
//! action labels encode to 1 and 2. The tables are compile-time constants and
//! a [`LabelCodec`] is a plain value that callers pass to whatever needs to
//! encode or decode labels.

use serde::Serialize;

use crate::error::StigError;

/// Number of classes per action axis.
pub const CLASSES_PER_AXIS: usize = 3;

/// Throttle labels in class-index order.
pub const THROTTLE_LABELS: [&str; CLASSES_PER_AXIS] = ["", "accelerate", "brake"];

/// Steering labels in class-index order.
pub const STEERING_LABELS: [&str; CLASSES_PER_AXIS] = ["", "left", "right"];

/// The lookup table for a single action axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisTable {
    axis: &'static str,
    labels: [&'static str; CLASSES_PER_AXIS],
    neutral_name: &'static str,
}

impl AxisTable {
    pub const fn new(
        axis: &'static str,
        labels: [&'static str; CLASSES_PER_AXIS],
        neutral_name: &'static str,
    ) -> Self {
        Self {
            axis,
            labels,
            neutral_name,
        }
    }

    /// Name of the axis, used in error messages.
    pub fn axis(&self) -> &'static str {
        self.axis
    }

    /// All labels, indexed by class.
    pub fn labels(&self) -> &[&'static str; CLASSES_PER_AXIS] {
        &self.labels
    }

    /// Returns the table's own `'static` copy of `label`, if it is known.
    pub fn lookup(&self, label: &str) -> Option<&'static str> {
        self.labels.iter().copied().find(|known| *known == label)
    }

    pub fn encode(&self, label: &str) -> Result<u8, StigError> {
        self.labels
            .iter()
            .position(|known| *known == label)
            .map(|index| index as u8)
            .ok_or_else(|| StigError::UnknownLabel {
                axis: self.axis,
                label: label.to_string(),
            })
    }

    pub fn decode(&self, index: usize) -> Result<&'static str, StigError> {
        self.labels
            .get(index)
            .copied()
            .ok_or(StigError::UnknownLabelIndex {
                axis: self.axis,
                index,
            })
    }

    /// Human-readable form of a class; the empty neutral label is shown by role.
    pub fn display_name(&self, index: usize) -> &'static str {
        match self.labels.get(index) {
            Some(&"") => self.neutral_name,
            Some(&label) => label,
            None => "?",
        }
    }
}

pub const THROTTLE_TABLE: AxisTable = AxisTable::new("throttle", THROTTLE_LABELS, "(neutral)");
pub const STEERING_TABLE: AxisTable = AxisTable::new("steering", STEERING_LABELS, "(straight)");

/// A decoded action, as returned to the game by the serving layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Action {
    pub throttle: &'static str,
    pub steering: &'static str,
}

/// Bidirectional mapping between label strings and class indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelCodec {
    pub throttle: AxisTable,
    pub steering: AxisTable,
}

impl LabelCodec {
    pub const fn standard() -> Self {
        Self {
            throttle: THROTTLE_TABLE,
            steering: STEERING_TABLE,
        }
    }

    #[inline]
    pub fn encode_throttle(&self, label: &str) -> Result<u8, StigError> {
        self.throttle.encode(label)
    }

    #[inline]
    pub fn encode_steering(&self, label: &str) -> Result<u8, StigError> {
        self.steering.encode(label)
    }

    #[inline]
    pub fn decode_throttle(&self, index: usize) -> Result<&'static str, StigError> {
        self.throttle.decode(index)
    }

    #[inline]
    pub fn decode_steering(&self, index: usize) -> Result<&'static str, StigError> {
        self.steering.decode(index)
    }

    /// Maps the two heads' logits to an action by taking the argmax of each.
    ///
    /// Ties resolve to the lowest class index. NaN logits never win.
    pub fn decode_prediction(
        &self,
        throttle_logits: &[f32],
        steering_logits: &[f32],
    ) -> Result<Action, StigError> {
        let throttle = argmax(self.throttle.axis, throttle_logits)?;
        let steering = argmax(self.steering.axis, steering_logits)?;

        Ok(Action {
            throttle: self.decode_throttle(throttle)?,
            steering: self.decode_steering(steering)?,
        })
    }
}

impl Default for LabelCodec {
    fn default() -> Self {
        Self::standard()
    }
}

fn argmax(axis: &'static str, logits: &[f32]) -> Result<usize, StigError> {
    if logits.len() != CLASSES_PER_AXIS {
        return Err(StigError::LogitsArity {
            axis,
            expected: CLASSES_PER_AXIS,
            actual: logits.len(),
        });
    }

    let mut best = 0;
    for (index, value) in logits.iter().enumerate().skip(1) {
        if *value > logits[best] || (logits[best].is_nan() && !value.is_nan()) {
            best = index;
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_neutral_as_zero() {
        let codec = LabelCodec::standard();
        assert_eq!(codec.encode_throttle("").unwrap(), 0);
        assert_eq!(codec.encode_steering("").unwrap(), 0);
    }

    #[test]
    fn encodes_actions() {
        let codec = LabelCodec::standard();
        assert_eq!(codec.encode_throttle("accelerate").unwrap(), 1);
        assert_eq!(codec.encode_throttle("brake").unwrap(), 2);
        assert_eq!(codec.encode_steering("left").unwrap(), 1);
        assert_eq!(codec.encode_steering("right").unwrap(), 2);
    }

    #[test]
    fn decode_inverts_encode() {
        let codec = LabelCodec::standard();
        for label in THROTTLE_LABELS {
            let index = codec.encode_throttle(label).unwrap();
            assert_eq!(codec.decode_throttle(index as usize).unwrap(), label);
        }
        for label in STEERING_LABELS {
            let index = codec.encode_steering(label).unwrap();
            assert_eq!(codec.decode_steering(index as usize).unwrap(), label);
        }
    }

    #[test]
    fn unknown_label_is_an_error() {
        let codec = LabelCodec::standard();
        let err = codec.encode_throttle("left").unwrap_err();
        assert!(matches!(
            err,
            StigError::UnknownLabel {
                axis: "throttle",
                ..
            }
        ));
        assert!(codec.encode_steering("Left").is_err());
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let codec = LabelCodec::standard();
        let err = codec.decode_steering(3).unwrap_err();
        assert!(matches!(
            err,
            StigError::UnknownLabelIndex {
                axis: "steering",
                index: 3
            }
        ));
    }

    #[test]
    fn decode_prediction_takes_argmax() {
        let codec = LabelCodec::standard();
        let action = codec
            .decode_prediction(&[0.1, 2.5, -1.0], &[0.0, -3.0, 0.7])
            .unwrap();
        assert_eq!(
            action,
            Action {
                throttle: "accelerate",
                steering: "right",
            }
        );
    }

    #[test]
    fn decode_prediction_ties_pick_lowest_index() {
        let codec = LabelCodec::standard();
        let action = codec
            .decode_prediction(&[1.0, 1.0, 1.0], &[f32::NAN, 0.5, 0.5])
            .unwrap();
        assert_eq!(action.throttle, "");
        assert_eq!(action.steering, "left");
    }

    #[test]
    fn decode_prediction_rejects_wrong_arity() {
        let codec = LabelCodec::standard();
        let err = codec.decode_prediction(&[1.0, 2.0], &[0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            StigError::LogitsArity {
                axis: "throttle",
                expected: 3,
                actual: 2
            }
        ));
    }
}
