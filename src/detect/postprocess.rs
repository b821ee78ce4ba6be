//! DETR output decoding

use super::labels::UNUSED_LABEL;
use super::{BoundingBox, Detection, DetectionError};

/// Raw DETR outputs for a single image
///
/// `logits` is `[queries, classes]` where the last class is "no object";
/// `boxes` is `[queries, 4]` as normalized (cx, cy, w, h).
#[derive(Debug, Clone, Copy)]
pub struct DetrOutput<'a> {
    pub logits: &'a [f32],
    pub boxes: &'a [f32],
    pub queries: usize,
    pub classes: usize,
}

/// Turn raw DETR outputs into pixel-space detections above `threshold`
///
/// # Errors
///
/// Returns error if the buffers do not match the declared shape
pub fn decode_detr(
    output: &DetrOutput<'_>,
    labels: &[String],
    frame_width: u32,
    frame_height: u32,
    threshold: f32,
) -> Result<Vec<Detection>, DetectionError> {
    if output.classes < 2 {
        return Err(DetectionError::Output(format!(
            "expected at least 2 classes, got {}",
            output.classes
        )));
    }
    if output.logits.len() != output.queries * output.classes {
        return Err(DetectionError::Output(format!(
            "logits length {} does not match {}x{}",
            output.logits.len(),
            output.queries,
            output.classes
        )));
    }
    if output.boxes.len() != output.queries * 4 {
        return Err(DetectionError::Output(format!(
            "boxes length {} does not match {}x4",
            output.boxes.len(),
            output.queries
        )));
    }

    #[allow(clippy::cast_precision_loss)]
    let (width, height) = (frame_width as f32, frame_height as f32);

    let detections = output
        .logits
        .chunks_exact(output.classes)
        .zip(output.boxes.chunks_exact(4))
        .filter_map(|(row, bbox)| {
            let (class_id, score) = best_class(row)?;
            if score < threshold {
                return None;
            }

            let label = labels.get(class_id)?;
            if label.is_empty() || label == UNUSED_LABEL {
                return None;
            }

            let (cx, cy, w, h) = (bbox[0], bbox[1], bbox[2], bbox[3]);
            let bbox = BoundingBox::new(
                ((cx - w / 2.0) * width).clamp(0.0, width),
                ((cy - h / 2.0) * height).clamp(0.0, height),
                ((cx + w / 2.0) * width).clamp(0.0, width),
                ((cy + h / 2.0) * height).clamp(0.0, height),
            );

            Some(Detection::new(label.clone(), score, bbox))
        })
        .collect();

    Ok(detections)
}

/// Softmax over a logit row, best real class and its probability
///
/// The trailing "no object" class takes part in the softmax but is never
/// picked.
fn best_class(row: &[f32]) -> Option<(usize, f32)> {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return None;
    }

    let sum: f32 = row.iter().map(|&l| (l - max).exp()).sum();
    row[..row.len() - 1]
        .iter()
        .enumerate()
        .map(|(id, &l)| (id, (l - max).exp() / sum))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        ["N/A", "person", "cat"].iter().map(ToString::to_string).collect()
    }

    #[test]
    fn confident_query_becomes_pixel_box() {
        // One query, classes: N/A, person, cat, no-object
        let logits = [0.0, 0.0, 12.0, 0.0];
        let boxes = [0.5, 0.5, 0.5, 0.5];
        let output = DetrOutput {
            logits: &logits,
            boxes: &boxes,
            queries: 1,
            classes: 4,
        };

        let detections = decode_detr(&output, &labels(), 200, 100, 0.9).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "cat");
        assert!(detections[0].confidence > 0.99);
        assert_eq!(detections[0].bbox, BoundingBox::new(50.0, 25.0, 150.0, 75.0));
    }

    #[test]
    fn no_object_class_is_never_reported() {
        let logits = [0.0, 0.0, 0.0, 20.0];
        let boxes = [0.5, 0.5, 0.2, 0.2];
        let output = DetrOutput {
            logits: &logits,
            boxes: &boxes,
            queries: 1,
            classes: 4,
        };

        // The best real class has a tiny probability, so it fails the threshold
        assert!(decode_detr(&output, &labels(), 10, 10, 0.5).unwrap().is_empty());
    }

    #[test]
    fn below_threshold_and_unused_labels_are_dropped() {
        let logits = [
            0.0, 1.0, 1.2, 0.0, // person vs cat, low confidence
            15.0, 0.0, 0.0, 0.0, // N/A slot
        ];
        let boxes = [0.5; 8];
        let output = DetrOutput {
            logits: &logits,
            boxes: &boxes,
            queries: 2,
            classes: 4,
        };

        assert!(decode_detr(&output, &labels(), 10, 10, 0.9).unwrap().is_empty());
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let output = DetrOutput {
            logits: &[0.0; 3],
            boxes: &[0.0; 4],
            queries: 1,
            classes: 4,
        };
        assert!(decode_detr(&output, &labels(), 10, 10, 0.9).is_err());
    }
}
