use anyhow::Context;
use common::span;
use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};
use std::cmp::Ordering;

/// A box in original image pixels, before rounding for output.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

/// Candidate in model input space.
#[derive(Debug, Clone)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
    class_id: u32,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32, iou_threshold: f32, max_detections: usize) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            max_detections,
        }
    }

    /// Parse detections from a YOLOv8 detection head.
    ///
    /// `predictions` is `[1, 4 + num_classes, num_anchors]`, each anchor holding
    /// `cx, cy, w, h` in input pixels followed by one score per class.
    ///
    /// Results are ordered by descending confidence, after class-aware NMS,
    /// mapped back onto the original image and clamped to its bounds.
    #[tracing::instrument(skip(self, predictions, transform))]
    pub fn parse_detections(
        &self,
        predictions: &ArrayViewD<f32>,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<RawDetection>> {
        let shape = predictions.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 {
            anyhow::bail!("Unexpected output tensor shape {:?}, expected [1, C, N]", shape);
        }

        let view = predictions
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .context("Output tensor is not two-dimensional after removing batch axis")?;

        if view.nrows() < 5 {
            anyhow::bail!(
                "Output tensor has {} rows per anchor, expected at least 5",
                view.nrows()
            );
        }

        let candidates = self.collect_candidates(&view);
        let kept = self.non_max_suppression(candidates);

        tracing::debug!(detections = kept.len(), "Post-processing complete");

        Ok(kept
            .into_iter()
            .map(|c| to_original_space(&c, transform))
            .collect())
    }

    fn collect_candidates(&self, view: &ArrayView2<f32>) -> Vec<Candidate> {
        let _s = span!("collect_candidates");

        let num_anchors = view.ncols();
        let num_classes = view.nrows() - 4;
        let mut candidates = Vec::new();

        for i in 0..num_anchors {
            // Argmax over class scores
            let mut confidence = f32::NEG_INFINITY;
            let mut class_id = 0usize;
            for c in 0..num_classes {
                let score = view[[4 + c, i]];
                if score > confidence {
                    confidence = score;
                    class_id = c;
                }
            }

            if confidence.is_nan() || confidence < self.confidence_threshold {
                continue;
            }

            let (x1, y1, x2, y2) =
                cxcywh_to_xyxy(view[[0, i]], view[[1, i]], view[[2, i]], view[[3, i]]);

            candidates.push(Candidate {
                x1,
                y1,
                x2,
                y2,
                confidence,
                class_id: class_id as u32,
            });
        }

        candidates
    }

    /// Greedy per-class suppression, highest confidence first.
    fn non_max_suppression(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        let _s = span!("non_max_suppression");

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        let mut kept: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            if kept.len() >= self.max_detections {
                break;
            }
            let suppressed = kept.iter().any(|k| {
                k.class_id == candidate.class_id && iou(k, &candidate) > self.iou_threshold
            });
            if !suppressed {
                kept.push(candidate);
            }
        }

        kept
    }
}

fn to_original_space(c: &Candidate, transform: &TransformParams) -> RawDetection {
    let max_x = transform.orig_width as f32;
    let max_y = transform.orig_height as f32;

    let x1 = ((c.x1 - transform.offset_x) / transform.scale).clamp(0.0, max_x);
    let y1 = ((c.y1 - transform.offset_y) / transform.scale).clamp(0.0, max_y);
    let x2 = ((c.x2 - transform.offset_x) / transform.scale).clamp(0.0, max_x);
    let y2 = ((c.y2 - transform.offset_y) / transform.scale).clamp(0.0, max_y);

    RawDetection {
        x1: x1.min(x2),
        y1: y1.min(y2),
        x2: x1.max(x2),
        y2: y1.max(y2),
        confidence: c.confidence.clamp(0.0, 1.0),
        class_id: c.class_id,
    }
}

fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let ix = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let iy = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let intersection = ix * iy;

    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - intersection;

    if union > 0.0 { intersection / union } else { 0.0 }
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}
