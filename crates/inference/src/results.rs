//! The JSON records written to stdout.

use crate::errors::DetectorError;
use crate::postprocessing::RawDetection;
use crate::taxonomy::{self, MaskClass};
use serde::{Serialize, Serializer, ser::SerializeStruct};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub confidence: f64,
    #[serde(rename = "class")]
    pub class_id: u32,
    pub label: &'static str,
    pub color: &'static str,
}

impl Detection {
    /// Truncates corners to whole pixels and rounds confidence to 3 decimals.
    pub fn from_raw(raw: &RawDetection) -> Self {
        let info = taxonomy::lookup(raw.class_id);
        Self {
            x1: raw.x1 as i32,
            y1: raw.y1 as i32,
            x2: raw.x2 as i32,
            y2: raw.y2 as i32,
            confidence: round_to(f64::from(raw.confidence).clamp(0.0, 1.0), 3),
            class_id: raw.class_id,
            label: info.label,
            color: info.color,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub total: u32,
    pub masked: u32,
    pub unmasked: u32,
    pub incorrect: u32,
    pub mask_rate: f64,
}

impl Stats {
    /// Unknown classes count toward `total` only.
    pub fn record(&mut self, class: MaskClass) {
        self.total += 1;
        match class {
            MaskClass::Masked => self.masked += 1,
            MaskClass::Unmasked => self.unmasked += 1,
            MaskClass::Incorrect => self.incorrect += 1,
            MaskClass::Unknown => {}
        }
        self.mask_rate = self.compute_mask_rate();
    }

    fn compute_mask_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round_to(f64::from(self.masked) / f64::from(self.total) * 100.0, 1)
    }
}

impl Serialize for Stats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Stats", 5)?;
        state.serialize_field("total", &self.total)?;
        state.serialize_field("masked", &self.masked)?;
        state.serialize_field("unmasked", &self.unmasked)?;
        state.serialize_field("incorrect", &self.incorrect)?;
        // No detections: the rate is the integer 0, not 0.0
        if self.total == 0 {
            state.serialize_field("maskRate", &0u32)?;
        } else {
            state.serialize_field("maskRate", &self.mask_rate)?;
        }
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    success: bool,
    pub detections: Vec<Detection>,
    pub stats: Stats,
    pub image_width: u32,
    pub image_height: u32,
}

impl DetectionReport {
    /// Builds the report in model output order.
    pub fn new(raw: &[RawDetection], image_width: u32, image_height: u32) -> Self {
        let mut stats = Stats::default();
        let detections = raw
            .iter()
            .map(|r| {
                stats.record(taxonomy::lookup(r.class_id).class);
                Detection::from_raw(r)
            })
            .collect();

        Self {
            success: true,
            detections,
            stats,
            image_width,
            image_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    success: bool,
    pub error: String,
}

impl FailureReport {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Exactly one of these is printed per invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetectionResult {
    Success(DetectionReport),
    Failure(FailureReport),
}

impl DetectionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DetectionResult::Success(_))
    }
}

impl From<Result<DetectionReport, DetectorError>> for DetectionResult {
    fn from(result: Result<DetectionReport, DetectorError>) -> Self {
        match result {
            Ok(report) => DetectionResult::Success(report),
            Err(e) => DetectionResult::Failure(FailureReport::new(e.to_string())),
        }
    }
}

/// Answer to `--health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub message: String,
}

/// Half-to-even, so exact ties like 6.25 land on 6.2.
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(class_id: u32, confidence: f32) -> RawDetection {
        RawDetection {
            x1: 10.7,
            y1: 20.2,
            x2: 30.9,
            y2: 40.5,
            confidence,
            class_id,
        }
    }

    #[test]
    fn test_detection_truncates_and_rounds() {
        let det = Detection::from_raw(&raw(1, 0.87654));
        assert_eq!((det.x1, det.y1, det.x2, det.y2), (10, 20, 30, 40));
        assert_eq!(det.confidence, 0.877);
        assert_eq!(det.label, "Maskesiz");
        assert_eq!(det.color, "#EF4444");
    }

    #[test]
    fn test_detection_json_field_names() {
        let value = serde_json::to_value(Detection::from_raw(&raw(0, 0.5))).unwrap();
        assert_eq!(
            value,
            json!({
                "x1": 10, "y1": 20, "x2": 30, "y2": 40,
                "confidence": 0.5,
                "class": 0,
                "label": "Maskeli",
                "color": "#22C55E"
            })
        );
    }

    #[test]
    fn test_unknown_class_counts_toward_total_only() {
        let report = DetectionReport::new(&[raw(0, 0.9), raw(7, 0.8)], 100, 100);

        assert_eq!(report.stats.total, 2);
        assert_eq!(report.stats.masked, 1);
        assert_eq!(report.stats.unmasked, 0);
        assert_eq!(report.stats.incorrect, 0);
        assert_eq!(report.stats.mask_rate, 50.0);
        assert_eq!(report.detections[1].label, "Unknown");
        assert_eq!(report.detections[1].color, "#888888");
    }

    #[test]
    fn test_stats_buckets_sum_to_total() {
        let detections: Vec<_> = [0, 1, 2, 0, 2, 2, 1, 0, 0]
            .iter()
            .map(|&c| raw(c, 0.5))
            .collect();
        let stats = DetectionReport::new(&detections, 10, 10).stats;

        assert_eq!(stats.total, 9);
        assert_eq!(stats.masked, 4);
        assert_eq!(stats.unmasked, 2);
        assert_eq!(stats.incorrect, 3);
        assert_eq!(stats.total, stats.masked + stats.unmasked + stats.incorrect);
    }

    #[test]
    fn test_mask_rate_rounding() {
        // 1 of 3 masked -> 33.333... -> 33.3
        let report = DetectionReport::new(&[raw(0, 0.5), raw(1, 0.5), raw(2, 0.5)], 1, 1);
        assert_eq!(report.stats.mask_rate, 33.3);

        // 2 of 3 masked -> 66.666... -> 66.7
        let report = DetectionReport::new(&[raw(0, 0.5), raw(0, 0.5), raw(2, 0.5)], 1, 1);
        assert_eq!(report.stats.mask_rate, 66.7);
    }

    #[test]
    fn test_empty_report_has_zero_stats() {
        let report = DetectionReport::new(&[], 640, 480);
        let value = serde_json::to_value(&DetectionResult::Success(report)).unwrap();

        assert_eq!(
            value,
            json!({
                "success": true,
                "detections": [],
                "stats": {
                    "total": 0,
                    "masked": 0,
                    "unmasked": 0,
                    "incorrect": 0,
                    "maskRate": 0
                },
                "imageWidth": 640,
                "imageHeight": 480
            })
        );
    }

    #[test]
    fn test_mask_rate_ties_round_to_even() {
        // 1 of 16 masked -> exactly 6.25
        let mut detections = vec![raw(0, 0.5)];
        detections.extend((0..15).map(|_| raw(1, 0.5)));
        let report = DetectionReport::new(&detections, 1, 1);

        assert_eq!(report.stats.total, 16);
        assert_eq!(report.stats.mask_rate, 6.2);
    }

    #[test]
    fn test_confidence_ties_round_to_even() {
        // 0.8125 is exact in f32
        assert_eq!(Detection::from_raw(&raw(0, 0.8125)).confidence, 0.812);
        assert_eq!(Detection::from_raw(&raw(0, 0.4375)).confidence, 0.438);
    }

    #[test]
    fn test_empty_mask_rate_is_integer_zero() {
        let empty = serde_json::to_string(&DetectionReport::new(&[], 4, 4)).unwrap();
        assert!(empty.contains(r#""maskRate":0}"#), "{}", empty);

        // Detections with none masked keep the float form
        let unmasked = serde_json::to_string(&DetectionReport::new(&[raw(1, 0.5)], 4, 4)).unwrap();
        assert!(unmasked.contains(r#""maskRate":0.0}"#), "{}", unmasked);
    }

    #[test]
    fn test_failure_shape() {
        let result = DetectionResult::from(Err(DetectorError::EmptyInput));
        assert!(!result.is_success());
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"success":false,"error":"No input received"}"#
        );
    }

    #[test]
    fn test_success_field_order() {
        let result = DetectionResult::from(Ok(DetectionReport::new(&[], 2, 3)));
        let text = serde_json::to_string(&result).unwrap();

        assert!(result.is_success());
        assert!(text.starts_with(r#"{"success":true,"detections":[],"stats":"#));
        assert!(text.ends_with(r#""imageWidth":2,"imageHeight":3}"#));
    }

    #[test]
    fn test_confidence_clamped_into_unit_range() {
        assert_eq!(Detection::from_raw(&raw(0, 1.2)).confidence, 1.0);
        assert_eq!(Detection::from_raw(&raw(0, -0.1)).confidence, 0.0);
    }
}
