//! DETR object detector on tract-onnx
//!
//! Expects an ONNX export of a DETR checkpoint (e.g. `facebook/detr-resnet-50`)
//! with a single `pixel_values` input and `logits` / `pred_boxes` outputs.

use std::path::Path;

use image::RgbImage;
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use super::postprocess::{DetrOutput, decode_detr};
use super::{Detection, DetectionError, Detector};

/// ImageNet normalization used by the DETR image processor
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// DETR detector running a local ONNX model
pub struct DetrDetector {
    model: Plan,
    labels: Vec<String>,
    input_width: u32,
    input_height: u32,
}

impl DetrDetector {
    /// Load and optimize the model for a fixed input size
    ///
    /// # Errors
    ///
    /// Returns error if the model cannot be loaded or optimized
    pub fn load(
        model_path: &Path,
        labels: Vec<String>,
        input_width: u32,
        input_height: u32,
    ) -> Result<Self, DetectionError> {
        let model_err = |e: TractError| {
            DetectionError::Model(format!("{}: {e}", model_path.display()))
        };

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(model_err)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .map_err(model_err)?
            .into_optimized()
            .map_err(model_err)?
            .into_runnable()
            .map_err(model_err)?;

        tracing::info!(
            path = %model_path.display(),
            input_width,
            input_height,
            classes = labels.len(),
            "detector model loaded"
        );

        Ok(Self {
            model,
            labels,
            input_width,
            input_height,
        })
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let resized = imageops::resize(
            image,
            self.input_width,
            self.input_height,
            FilterType::Triangle,
        );

        tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, self.input_width as usize),
            |(_, channel, y, x)| {
                #[allow(clippy::cast_possible_truncation)]
                let pixel = resized.get_pixel(x as u32, y as u32);
                (f32::from(pixel[channel]) / 255.0 - MEAN[channel]) / STD[channel]
            },
        )
        .into_tensor()
    }
}

impl Detector for DetrDetector {
    fn name(&self) -> &'static str {
        "detr-onnx"
    }

    fn detect(&self, image: &RgbImage, threshold: f32) -> Result<Vec<Detection>, DetectionError> {
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let (logits, boxes) = split_outputs(&outputs)?;
        let classes = logits.shape().last().copied().unwrap_or_default();
        let queries = boxes.shape().iter().rev().nth(1).copied().unwrap_or_default();

        let logits: Vec<f32> = logits.iter().copied().collect();
        let boxes: Vec<f32> = boxes.iter().copied().collect();

        decode_detr(
            &DetrOutput {
                logits: &logits,
                boxes: &boxes,
                queries,
                classes,
            },
            &self.labels,
            image.width(),
            image.height(),
            threshold,
        )
    }
}

type LogitsAndBoxes<'a> = (tract_ndarray::ArrayViewD<'a, f32>, tract_ndarray::ArrayViewD<'a, f32>);

/// Pick out the class logits and box tensors
///
/// Boxes are the output whose last dimension is 4.
fn split_outputs(outputs: &TVec<TValue>) -> Result<LogitsAndBoxes<'_>, DetectionError> {
    let views = outputs
        .iter()
        .map(|value| {
            value
                .to_array_view::<f32>()
                .map_err(|e| DetectionError::Output(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut boxes = None;
    let mut logits = None;
    for view in views {
        if view.shape().last() == Some(&4) && boxes.is_none() {
            boxes = Some(view);
        } else if logits.is_none() {
            logits = Some(view);
        }
    }

    match (logits, boxes) {
        (Some(logits), Some(boxes)) => Ok((logits, boxes)),
        _ => Err(DetectionError::Output(format!(
            "expected logits and pred_boxes outputs, got {}",
            outputs.len()
        ))),
    }
}
