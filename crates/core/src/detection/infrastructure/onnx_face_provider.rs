//! Face analysis backed by ONNX Runtime via `ort`.
//!
//! The detector runs on a letterboxed copy of the frame and emits rows of
//! `[cx, cy, w, h, score, ...]` in input pixels. Every surviving face is then
//! cropped and passed through the optional per-face networks:
//!
//! - landmarks: 136 values, `(x, y)` pairs normalised to the crop
//! - expression: 7 scores in [`Expression::ALL`] order
//! - age/gender: `[female, male, age / 100]`
//! - recognition: an embedding, L2-normalised into the face descriptor
use std::path::Path;
use std::sync::Arc;

use ort::session::Session;

use crate::detection::domain::detection_provider::{DetectionError, DetectionProvider};
use crate::detection::domain::face_detection::{
    Expressions, FaceDetection, FaceLandmarks, Gender, GenderEstimate,
};
use crate::detection::infrastructure::execution_provider::preferred_execution_providers;
use crate::detection::infrastructure::math::{self, ScoredBox};
use crate::detection::infrastructure::model_manifest::{ModelManifest, SubModel};
use crate::detection::infrastructure::model_resolver::{self, ProgressFn};
use crate::shared::frame::Frame;
use crate::shared::geometry::{Point, Rect};
use crate::shared::settings::AnalysisSettings;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

const LANDMARK_INPUT_SIZE: u32 = 112;
const RECOGNITION_INPUT_SIZE: u32 = 112;
const EXPRESSION_INPUT_SIZE: u32 = 112;
const AGE_GENDER_INPUT_SIZE: u32 = 96;

/// Pixel scaling applied before a network sees a crop.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Normalization {
    /// `v / 255`
    UnitRange,
    /// `(v - 127.5) / 127.5`
    Centered,
}

impl Normalization {
    fn apply(self, v: u8) -> f32 {
        match self {
            Normalization::UnitRange => v as f32 / 255.0,
            Normalization::Centered => (v as f32 - 127.5) / 127.5,
        }
    }
}

/// A per-face network fed a square crop.
struct FaceClassifier {
    session: Session,
    input_size: u32,
    normalization: Normalization,
}

impl FaceClassifier {
    fn run(&mut self, frame: &Frame, face: &Rect) -> Result<Vec<f32>, DetectionError> {
        let tensor = crop_tensor(frame, face, self.input_size, self.normalization);
        let input = ort::value::Tensor::from_array(tensor).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(inference_error)?;
        if outputs.len() == 0 {
            return Err(DetectionError::Inference("model produced no outputs".into()));
        }
        let values = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        Ok(values.iter().copied().collect())
    }
}

struct LoadedModels {
    detector: Session,
    detector_input: u32,
    landmarks: Option<FaceClassifier>,
    recognition: Option<FaceClassifier>,
    expression: Option<FaceClassifier>,
    age_gender: Option<FaceClassifier>,
}

pub struct OnnxFaceProvider {
    model_base: String,
    input_size: u32,
    score_threshold: f64,
    progress: Option<Arc<dyn Fn(u64, u64) + Send + Sync>>,
    models: Option<LoadedModels>,
}

impl OnnxFaceProvider {
    pub fn new(model_base: impl Into<String>, input_size: u32, score_threshold: f64) -> Self {
        Self {
            model_base: model_base.into(),
            input_size,
            score_threshold,
            progress: None,
            models: None,
        }
    }

    /// Reports shard download progress when the model base is remote.
    pub fn with_download_progress(
        mut self,
        progress: impl Fn(u64, u64) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self::new(
            settings.model_base.clone(),
            settings.detector_input_size,
            settings.score_threshold,
        )
    }

    fn load_all(&self) -> Result<LoadedModels, DetectionError> {
        log::info!("Loading face analysis models from {}", self.model_base);
        let progress = self.progress.clone().map(|p| -> ProgressFn {
            Box::new(move |done, total| p(done, total))
        });
        let dir = model_resolver::resolve_model_base(&self.model_base, progress)
            .map_err(|e| DetectionError::Manifest(e.to_string()))?;
        let manifest =
            ModelManifest::load(&dir).map_err(|e| DetectionError::Manifest(e.to_string()))?;

        let (detector, detector_input) =
            load_session(&manifest, &dir, SubModel::TinyFaceDetector, self.input_size)?.ok_or(
                DetectionError::Manifest("tiny_face_detector is not listed".into()),
            )?;

        let classifier = |model, fallback, normalization| {
            load_session(&manifest, &dir, model, fallback).map(|loaded| {
                loaded.map(|(session, input_size)| FaceClassifier {
                    session,
                    input_size,
                    normalization,
                })
            })
        };

        Ok(LoadedModels {
            detector,
            detector_input,
            landmarks: classifier(
                SubModel::FaceLandmark68,
                LANDMARK_INPUT_SIZE,
                Normalization::UnitRange,
            )?,
            recognition: classifier(
                SubModel::FaceRecognition,
                RECOGNITION_INPUT_SIZE,
                Normalization::Centered,
            )?,
            expression: classifier(
                SubModel::FaceExpression,
                EXPRESSION_INPUT_SIZE,
                Normalization::UnitRange,
            )?,
            age_gender: classifier(
                SubModel::AgeGender,
                AGE_GENDER_INPUT_SIZE,
                Normalization::UnitRange,
            )?,
        })
    }
}

impl DetectionProvider for OnnxFaceProvider {
    fn load_models(&mut self) -> Result<(), DetectionError> {
        if self.models.is_some() {
            return Ok(());
        }
        let models = self.load_all()?;
        self.models = Some(models);
        log::info!("Models loaded successfully");
        Ok(())
    }

    fn detect_faces(&mut self, source: &Frame) -> Result<Vec<FaceDetection>, DetectionError> {
        let threshold = self.score_threshold;
        let models = self.models.as_mut().ok_or(DetectionError::ModelsNotLoaded)?;
        if source.width() == 0 || source.height() == 0 {
            return Ok(Vec::new());
        }

        let (tensor, lb) = letterbox(source, models.detector_input);
        let input = ort::value::Tensor::from_array(tensor).map_err(inference_error)?;
        let outputs = models
            .detector
            .run(ort::inputs![input])
            .map_err(inference_error)?;
        if outputs.len() == 0 {
            return Err(DetectionError::Inference("detector produced no outputs".into()));
        }
        let raw = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let shape = raw.shape().to_vec();
        let data: Vec<f32> = raw.iter().copied().collect();
        drop(outputs);

        let boxes = decode_detections(&data, &shape, &lb, threshold)?;
        let (fw, fh) = (source.width() as f64, source.height() as f64);

        let mut faces = Vec::with_capacity(boxes.len());
        for b in math::nms(boxes, NMS_IOU_THRESH) {
            let rect =
                Rect::from_corners(b.bbox[0], b.bbox[1], b.bbox[2], b.bbox[3]).clamp_to(fw, fh);
            if rect.area() < 1.0 {
                continue;
            }
            let mut face = FaceDetection::new(rect, b.score);

            if let Some(net) = models.landmarks.as_mut() {
                face.landmarks = Some(decode_landmarks(&net.run(source, &rect)?, &rect));
            }
            if let Some(net) = models.expression.as_mut() {
                face.expressions = decode_expressions(&net.run(source, &rect)?);
            }
            if let Some(net) = models.age_gender.as_mut() {
                if let Some((age, gender)) = decode_age_gender(&net.run(source, &rect)?) {
                    face.age = Some(age);
                    face.gender = Some(gender);
                }
            }
            if let Some(net) = models.recognition.as_mut() {
                let mut descriptor = net.run(source, &rect)?;
                math::l2_normalize(&mut descriptor);
                face.descriptor = Some(descriptor);
            }
            faces.push(face);
        }

        log::debug!("Detected {} faces", faces.len());
        Ok(faces)
    }
}

fn inference_error(e: impl std::fmt::Display) -> DetectionError {
    DetectionError::Inference(e.to_string())
}

/// Builds a session for `model`, returning it with its square input size.
/// `Ok(None)` when the manifest does not list the model.
fn load_session(
    manifest: &ModelManifest,
    dir: &Path,
    model: SubModel,
    fallback_input: u32,
) -> Result<Option<(Session, u32)>, DetectionError> {
    let load_error = |reason: String| DetectionError::ModelLoad {
        model: model.display_name().to_string(),
        reason,
    };
    let Some(bytes) = manifest
        .assemble(dir, model)
        .map_err(|e| load_error(e.to_string()))?
    else {
        log::info!("{} model not listed, skipping", model.display_name());
        return Ok(None);
    };

    let session = build_session(&bytes).map_err(|e| load_error(e.to_string()))?;
    let input_size = session_input_size(&session)
        .or_else(|| manifest.entry(model).and_then(|e| e.input_size))
        .unwrap_or(fallback_input);
    log::info!(
        "{} model loaded successfully ({input_size}x{input_size})",
        model.display_name()
    );
    Ok(Some((session, input_size)))
}

fn build_session(bytes: &[u8]) -> Result<Session, Box<dyn std::error::Error>> {
    let session = Session::builder()?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_memory(bytes)?;
    Ok(session)
}

/// Square input size from a fixed NCHW input shape, if the graph has one.
fn session_input_size(session: &Session) -> Option<u32> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            if shape.len() >= 4 && shape[2] > 0 {
                Some(shape[2] as u32)
            } else {
                None
            }
        } else {
            None
        }
    })
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Mapping from letterboxed input pixels back to frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Reads channel `c` of pixel `(x, y)`, replicating gray frames.
fn pixel(frame: &Frame, x: usize, y: usize, c: usize) -> u8 {
    let channels = frame.channels() as usize;
    let offset = (y * frame.width() as usize + x) * channels;
    frame.data()[offset + c.min(channels - 1)]
}

/// Letterbox-resize a frame to `target_size` × `target_size`, NCHW float32.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = pixel(frame, src_x, src_y, c) as f32 / 255.0;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Crops `face` out of the frame and resamples it to `size` × `size`.
fn crop_tensor(
    frame: &Frame,
    face: &Rect,
    size: u32,
    normalization: Normalization,
) -> ndarray::Array4<f32> {
    let size = size as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    let max_x = frame.width().saturating_sub(1) as f64;
    let max_y = frame.height().saturating_sub(1) as f64;

    for y in 0..size {
        let sy = (face.y + (y as f64 + 0.5) * face.height / size as f64).clamp(0.0, max_y) as usize;
        for x in 0..size {
            let sx =
                (face.x + (x as f64 + 0.5) * face.width / size as f64).clamp(0.0, max_x) as usize;
            for c in 0..3 {
                tensor[[0, c, y, x]] = normalization.apply(pixel(frame, sx, sy, c));
            }
        }
    }
    tensor
}

// ---------------------------------------------------------------------------
// Output decoding
// ---------------------------------------------------------------------------

/// Parses detector rows into frame-space boxes above `threshold`.
///
/// Accepts `[1, detections, features]` and the transposed
/// `[1, features, detections]` layout.
fn decode_detections(
    data: &[f32],
    shape: &[usize],
    lb: &Letterbox,
    threshold: f64,
) -> Result<Vec<ScoredBox>, DetectionError> {
    if shape.len() != 3 {
        return Err(DetectionError::Inference(format!(
            "unexpected detector output shape: {shape:?}"
        )));
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(DetectionError::Inference(format!(
            "detector output too small: {shape:?}"
        )));
    }

    let at = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut boxes = Vec::new();
    for i in 0..num_dets {
        let score = at(i, 4);
        if score < threshold {
            continue;
        }
        let (cx, cy, w, h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));
        let (x1, y1) = lb.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = lb.to_frame(cx + w / 2.0, cy + h / 2.0);
        boxes.push(ScoredBox {
            bbox: [x1, y1, x2, y2],
            score,
        });
    }
    Ok(boxes)
}

fn decode_landmarks(values: &[f32], face: &Rect) -> FaceLandmarks {
    let positions = values
        .chunks_exact(2)
        .map(|p| {
            Point::new(
                face.x + p[0] as f64 * face.width,
                face.y + p[1] as f64 * face.height,
            )
        })
        .collect();
    FaceLandmarks::from_positions(positions)
}

fn decode_expressions(values: &[f32]) -> Option<Expressions> {
    if values.len() < 7 {
        return None;
    }
    let p = math::to_probabilities(&values[..7]);
    Some(Expressions::from_probabilities([
        p[0], p[1], p[2], p[3], p[4], p[5], p[6],
    ]))
}

/// Age in whole years and the more probable gender.
fn decode_age_gender(values: &[f32]) -> Option<(f64, GenderEstimate)> {
    if values.len() < 3 {
        return None;
    }
    let p = math::softmax(&values[..2]);
    let gender = if p[1] >= p[0] {
        GenderEstimate {
            gender: Gender::Male,
            probability: p[1],
        }
    } else {
        GenderEstimate {
            gender: Gender::Female,
            probability: p[0],
        }
    };
    let age = (values[2] as f64 * 100.0).round().max(0.0);
    Some((age, gender))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detection::Expression;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn identity() -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        }
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 416: scale 2.08, 416x208, pad_y 104
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let (tensor, lb) = letterbox(&frame, 416);

        assert_eq!(tensor.shape(), &[1, 3, 416, 416]);
        assert_relative_eq!(lb.scale, 2.08, epsilon = 1e-9);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 104);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let (tensor, lb) = letterbox(&frame, 416);

        let y = lb.pad_y as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, 1]], 1.0, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0, epsilon = 0.01);
    }

    #[test]
    fn test_letterbox_gray_frame() {
        let frame = Frame::new(vec![255u8; 10 * 10], 10, 10, 1, 0);
        let (tensor, _) = letterbox(&frame, 20);
        assert_relative_eq!(tensor[[0, 2, 5, 5]], 1.0, epsilon = 0.01);
    }

    #[test]
    fn test_letterbox_maps_back_to_frame() {
        let lb = Letterbox {
            scale: 2.0,
            pad_x: 0,
            pad_y: 10,
        };
        assert_eq!(lb.to_frame(20.0, 30.0), (10.0, 10.0));
    }

    #[test]
    fn test_crop_tensor_samples_face_region() {
        // Left half black, right half white.
        let mut data = vec![0u8; 20 * 10 * 3];
        for y in 0..10 {
            for x in 10..20 {
                let o = (y * 20 + x) * 3;
                data[o..o + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
        let frame = Frame::new(data, 20, 10, 3, 0);
        let right = Rect::new(10.0, 0.0, 10.0, 10.0);

        let unit = crop_tensor(&frame, &right, 8, Normalization::UnitRange);
        assert_eq!(unit.shape(), &[1, 3, 8, 8]);
        assert_relative_eq!(unit[[0, 0, 4, 4]], 1.0);

        let left = Rect::new(0.0, 0.0, 10.0, 10.0);
        let centered = crop_tensor(&frame, &left, 8, Normalization::Centered);
        assert_relative_eq!(centered[[0, 1, 0, 0]], -1.0);
    }

    #[test]
    fn test_decode_detections_row_layout() {
        // Six candidates of five features, only the first above threshold.
        let mut data = vec![0.0f32; 6 * 5];
        data[..5].copy_from_slice(&[50.0, 60.0, 20.0, 40.0, 0.9]);
        data[5..10].copy_from_slice(&[10.0, 10.0, 4.0, 4.0, 0.1]);
        let boxes = decode_detections(&data, &[1, 6, 5], &identity(), 0.4).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].bbox, [40.0, 40.0, 60.0, 80.0]);
        assert_relative_eq!(boxes[0].score, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_decode_detections_transposed_layout() {
        // 5 features x 6 detections, only detection 2 scores.
        let mut data = vec![0.0f32; 5 * 6];
        let put = |d: &mut Vec<f32>, feat: usize, det: usize, v: f32| d[feat * 6 + det] = v;
        put(&mut data, 0, 2, 100.0);
        put(&mut data, 1, 2, 100.0);
        put(&mut data, 2, 2, 50.0);
        put(&mut data, 3, 2, 50.0);
        put(&mut data, 4, 2, 0.8);

        let lb = Letterbox {
            scale: 2.0,
            pad_x: 0,
            pad_y: 0,
        };
        let boxes = decode_detections(&data, &[1, 5, 6], &lb, 0.4).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].bbox, [37.5, 37.5, 62.5, 62.5]);
    }

    #[test]
    fn test_decode_detections_rejects_bad_shape() {
        let err = decode_detections(&[0.0; 4], &[4], &identity(), 0.4).unwrap_err();
        assert!(matches!(err, DetectionError::Inference(_)));
    }

    #[test]
    fn test_decode_landmarks_maps_into_face() {
        let mut values = vec![0.0f32; 136];
        values[0] = 0.5;
        values[1] = 0.25;
        let face = Rect::new(100.0, 50.0, 80.0, 40.0);
        let landmarks = decode_landmarks(&values, &face);
        assert_eq!(landmarks.positions.len(), 68);
        assert_eq!(landmarks.positions[0], Point::new(140.0, 60.0));
        assert_eq!(landmarks.jaw_outline.len(), 17);
    }

    #[test]
    fn test_decode_expressions_from_probabilities() {
        let e = decode_expressions(&[0.05, 0.87, 0.02, 0.02, 0.02, 0.01, 0.01]).unwrap();
        assert_eq!(e.dominant().map(|(e, _)| e), Some(Expression::Happy));
        assert_relative_eq!(e.happy, 0.87, epsilon = 1e-6);
    }

    #[test]
    fn test_decode_expressions_too_short() {
        assert!(decode_expressions(&[0.5, 0.5]).is_none());
    }

    #[test]
    fn test_decode_age_gender() {
        let (age, gender) = decode_age_gender(&[-1.0, 2.0, 0.283]).unwrap();
        assert_eq!(age, 28.0);
        assert_eq!(gender.gender, Gender::Male);
        assert!(gender.probability > 0.9);

        let (_, gender) = decode_age_gender(&[3.0, 0.0, 0.4]).unwrap();
        assert_eq!(gender.gender, Gender::Female);
    }

    #[test]
    fn test_detect_before_load_fails() {
        let mut provider = OnnxFaceProvider::new("models", 416, 0.4);
        let frame = Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, 0);
        let err = provider.detect_faces(&frame).unwrap_err();
        assert!(matches!(err, DetectionError::ModelsNotLoaded));
    }

    #[test]
    fn test_load_from_missing_base_fails() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("absent").to_string_lossy().to_string();
        let mut provider = OnnxFaceProvider::new(base, 416, 0.4);
        assert!(matches!(
            provider.load_models(),
            Err(DetectionError::Manifest(_))
        ));
    }

    #[test]
    fn test_load_without_manifest_fails() {
        let tmp = TempDir::new().unwrap();
        let mut provider =
            OnnxFaceProvider::new(tmp.path().to_string_lossy().to_string(), 416, 0.4);
        assert!(matches!(
            provider.load_models(),
            Err(DetectionError::Manifest(_))
        ));
    }
}
