use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Failures raised while scoring a matched pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("payload shape mismatch: {left_width}x{left_height} vs {right_width}x{right_height}")]
    ShapeMismatch {
        left_width: usize,
        left_height: usize,
        right_width: usize,
        right_height: usize,
    },
    #[error("label map {width}x{height} carries {len} labels")]
    MalformedPayload {
        width: usize,
        height: usize,
        len: usize,
    },
}

/// Scores a counterpart frame against a payload frame.
///
/// Implementations must be pure: the same pair always yields the same score.
pub trait MetricEvaluator {
    type Payload;
    type Score;

    /// Short identifier recorded alongside every score.
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        counterpart: &Self::Payload,
        payload: &Self::Payload,
    ) -> Result<Self::Score, MetricError>;
}

/// Dense per-pixel semantic class labels, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMap {
    pub width: usize,
    pub height: usize,
    pub labels: Vec<u8>,
}

impl LabelMap {
    pub fn new(width: usize, height: usize, labels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            labels,
        }
    }

    /// A map where every pixel carries `label`.
    pub fn filled(width: usize, height: usize, label: u8) -> Self {
        Self::new(width, height, vec![label; width * height])
    }

    fn validate(&self) -> Result<(), MetricError> {
        if self.labels.len() != self.width * self.height {
            return Err(MetricError::MalformedPayload {
                width: self.width,
                height: self.height,
                len: self.labels.len(),
            });
        }
        Ok(())
    }
}

/// Per-class intersection-over-union plus the mean over classes present in either map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IouScore {
    pub mean_iou: f64,
    pub class_iou: BTreeMap<u8, f64>,
}

/// Semantic segmentation mean IoU.
#[derive(Debug, Default, Clone, Copy)]
pub struct MeanIou;

impl MetricEvaluator for MeanIou {
    type Payload = LabelMap;
    type Score = IouScore;

    fn name(&self) -> &str {
        "mIoU"
    }

    fn evaluate(
        &self,
        counterpart: &LabelMap,
        payload: &LabelMap,
    ) -> Result<IouScore, MetricError> {
        counterpart.validate()?;
        payload.validate()?;
        if counterpart.width != payload.width || counterpart.height != payload.height {
            return Err(MetricError::ShapeMismatch {
                left_width: counterpart.width,
                left_height: counterpart.height,
                right_width: payload.width,
                right_height: payload.height,
            });
        }
        // (intersection, union) per class
        let mut counts: BTreeMap<u8, (u64, u64)> = BTreeMap::new();
        for (&truth, &predicted) in counterpart.labels.iter().zip(&payload.labels) {
            if truth == predicted {
                let entry = counts.entry(truth).or_default();
                entry.0 += 1;
                entry.1 += 1;
            } else {
                counts.entry(truth).or_default().1 += 1;
                counts.entry(predicted).or_default().1 += 1;
            }
        }
        let class_iou: BTreeMap<u8, f64> = counts
            .into_iter()
            .map(|(class, (intersection, union))| (class, intersection as f64 / union as f64))
            .collect();
        let mean_iou = if class_iou.is_empty() {
            1.0
        } else {
            class_iou.values().sum::<f64>() / class_iou.len() as f64
        };
        Ok(IouScore {
            mean_iou,
            class_iou,
        })
    }
}
