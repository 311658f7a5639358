use crate::{
    backend::{InferenceBackend, InferenceOutput},
    config::InferenceConfig,
    errors::DetectorError,
    input,
    model::ModelHandle,
    postprocessing::{PostProcessor, TransformParams},
    results::{DetectionReport, DetectionResult, HealthReport},
    serialization::write_json_line,
};
use preprocess::{CpuPreProcessor, Preprocess, PreprocessResult};
use std::io::{self, Read, Write};
use std::time::Instant;

/// One request in, one JSON line out: acquire, decode, infer, serialize.
pub struct InferenceService<B: InferenceBackend> {
    model: ModelHandle<B>,
    preprocessor: CpuPreProcessor,
    postprocessor: PostProcessor,
}

impl<B: InferenceBackend> InferenceService<B> {
    pub fn new(model: ModelHandle<B>, config: &InferenceConfig) -> Self {
        let postprocessor = PostProcessor::new(
            config.confidence_threshold,
            config.iou_threshold,
            config.max_detections,
        );
        let preprocessor = CpuPreProcessor::new(config.input_size);
        Self {
            model,
            preprocessor,
            postprocessor,
        }
    }

    pub fn model(&self) -> &ModelHandle<B> {
        &self.model
    }

    /// Handle one request from `input` and write its result line to `output`.
    ///
    /// Request failures are reported in-band; the only error returned is
    /// failing to write the result itself.
    pub fn run<R: Read, W: Write>(&mut self, input: R, output: W) -> io::Result<()> {
        let result = self.process(input);
        write_json_line(output, &result)
    }

    pub fn process<R: Read>(&mut self, input: R) -> DetectionResult {
        let start = Instant::now();

        let result = input::read_input(input).and_then(|raw| self.detect(&raw));

        match &result {
            Ok(report) => tracing::info!(
                detections = report.stats.total,
                mask_rate = report.stats.mask_rate,
                width = report.image_width,
                height = report.image_height,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request processed"
            ),
            Err(e) => tracing::warn!(
                kind = e.kind(),
                error = %e,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request failed"
            ),
        }

        DetectionResult::from(result)
    }

    /// Run the detector over the raw request text.
    pub fn detect(&mut self, raw: &str) -> Result<DetectionReport, DetectorError> {
        let _span = tracing::info_span!("detect").entered();

        let image = input::decode_request(raw)?;
        let (width, height) = image.dimensions();

        let backend = self.model.get()?;

        let PreprocessResult {
            data,
            scale,
            offset_x,
            offset_y,
        } = self
            .preprocessor
            .preprocess(image.as_raw(), width, height)
            .map_err(DetectorError::Inference)?;

        let InferenceOutput { predictions } = {
            let _infer_span = tracing::info_span!("model_inference").entered();
            backend.infer(&data).map_err(DetectorError::Inference)?
        };

        tracing::debug!(shape = ?predictions.shape(), "Raw model output");

        let transform = TransformParams {
            orig_width: width,
            orig_height: height,
            scale,
            offset_x,
            offset_y,
        };

        let detections = self
            .postprocessor
            .parse_detections(&predictions.view(), &transform)
            .map_err(DetectorError::Inference)?;

        Ok(DetectionReport::new(&detections, width, height))
    }

    /// Load the model without running a request.
    pub fn health(&mut self) -> HealthReport {
        let loaded = self.model.get().map(|_| ());
        match loaded {
            Ok(()) => HealthReport {
                ok: true,
                message: format!("Model loaded from {}", self.model.path().display()),
            },
            Err(e) => HealthReport {
                ok: false,
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendOptions;
    use ndarray::{Array, IxDyn};
    use std::io::Cursor;
    use std::path::Path;

    /// Backend returning a fixed head output with a single anchor
    struct FixedBackend {
        anchor: [f32; 7],
    }

    impl InferenceBackend for FixedBackend {
        fn load_model(_path: &Path, _options: &BackendOptions) -> anyhow::Result<Self> {
            // cx, cy, w, h in 640 input space, then masked/unmasked/incorrect scores
            Ok(Self {
                anchor: [320.0, 320.0, 64.0, 128.0, 0.05, 0.91234, 0.1],
            })
        }

        fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
            assert_eq!(images.shape(), &[1, 3, 640, 640]);
            let predictions = Array::from_shape_vec(IxDyn(&[1, 7, 1]), self.anchor.to_vec())?;
            Ok(InferenceOutput { predictions })
        }
    }

    fn png_base64(width: u32, height: u32) -> String {
        use base64::Engine;
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn service_with_model(path: &Path) -> InferenceService<FixedBackend> {
        let config = InferenceConfig::test_default(path);
        let model = ModelHandle::new(path, config.backend_options());
        InferenceService::new(model, &config)
    }

    #[test]
    fn test_detect_maps_boxes_to_original_image() {
        let model = tempfile::NamedTempFile::new().unwrap();
        let mut service = service_with_model(model.path());

        // 320x320 -> scale 2, no padding
        let report = service.detect(&png_base64(320, 320)).unwrap();

        assert_eq!(report.image_width, 320);
        assert_eq!(report.image_height, 320);
        assert_eq!(report.detections.len(), 1);

        let det = &report.detections[0];
        assert_eq!((det.x1, det.y1, det.x2, det.y2), (144, 128, 176, 192));
        assert_eq!(det.confidence, 0.912);
        assert_eq!(det.class_id, 1);
        assert_eq!(det.label, "Maskesiz");

        assert_eq!(report.stats.total, 1);
        assert_eq!(report.stats.unmasked, 1);
        assert_eq!(report.stats.mask_rate, 0.0);
    }

    #[test]
    fn test_decode_failure_reported_before_model_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_with_model(&dir.path().join("missing.onnx"));

        let err = service.detect("@@not-base64@@").unwrap_err();
        assert!(matches!(err, DetectorError::Decode(_)));
        assert!(!service.model().is_loaded());
    }

    #[test]
    fn test_process_empty_input() {
        let model = tempfile::NamedTempFile::new().unwrap();
        let mut service = service_with_model(model.path());

        let result = service.process(Cursor::new(Vec::new()));
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"success":false,"error":"No input received"}"#
        );
    }

    #[test]
    fn test_run_writes_one_line() {
        let model = tempfile::NamedTempFile::new().unwrap();
        let mut service = service_with_model(model.path());

        let request = format!(r#"{{"image": "{}"}}"#, png_base64(64, 48));
        let mut output = Vec::new();
        service.run(Cursor::new(request), &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["imageWidth"], 64);
        assert_eq!(value["imageHeight"], 48);
        assert_eq!(value["stats"]["total"], 1);
    }

    #[test]
    fn test_zero_input_size_reported_as_failure() {
        let model = tempfile::NamedTempFile::new().unwrap();
        let mut config = InferenceConfig::test_default(model.path());
        config.input_size = (0, 640);
        let handle = ModelHandle::new(model.path(), config.backend_options());
        let mut service = InferenceService::<FixedBackend>::new(handle, &config);

        let result = service.process(Cursor::new(png_base64(8, 8)));
        let value = serde_json::to_value(&result).unwrap();

        assert!(!result.is_success());
        assert_eq!(value["success"], false);
        let error = value["error"].as_str().unwrap();
        assert!(error.starts_with("Inference failed: "), "{}", error);
        assert!(error.contains("Invalid model input size 0x640"), "{}", error);
    }

    #[test]
    fn test_health_reports_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_with_model(&dir.path().join("best.onnx"));

        let report = service.health();
        assert!(!report.ok);
        assert!(report.message.starts_with("Model not found: "));
    }

    #[test]
    fn test_health_loads_model() {
        let model = tempfile::NamedTempFile::new().unwrap();
        let mut service = service_with_model(model.path());

        let report = service.health();
        assert!(report.ok, "{}", report.message);
        assert!(service.model().is_loaded());
    }
}
