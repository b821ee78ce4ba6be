//! Class labels for COCO-trained DETR checkpoints

use std::path::Path;

use super::DetectionError;

/// Placeholder for class ids unused by the checkpoint
pub const UNUSED_LABEL: &str = "N/A";

/// `id2label` of the DETR ResNet-50 COCO checkpoint, indexed by class id
pub const COCO_LABELS: [&str; 91] = [
    "N/A", "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "N/A", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "N/A", "backpack",
    "umbrella", "N/A", "N/A", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard",
    "sports ball", "kite", "baseball bat", "baseball glove", "skateboard", "surfboard",
    "tennis racket", "bottle", "N/A", "wine glass", "cup", "fork", "knife", "spoon", "bowl",
    "banana", "apple", "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut",
    "cake", "chair", "couch", "potted plant", "bed", "N/A", "dining table", "N/A", "N/A",
    "toilet", "N/A", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone", "microwave",
    "oven", "toaster", "sink", "refrigerator", "N/A", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// Default label table as owned strings
#[must_use]
pub fn coco() -> Vec<String> {
    COCO_LABELS.iter().map(ToString::to_string).collect()
}

/// Load a label table, one label per line, line number = class id
///
/// # Errors
///
/// Returns error if the file cannot be read or is empty
pub fn load(path: &Path) -> Result<Vec<String>, DetectionError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DetectionError::Model(format!("failed to read labels {}: {e}", path.display()))
    })?;
    parse(&content).ok_or_else(|| {
        DetectionError::Model(format!("labels file {} is empty", path.display()))
    })
}

fn parse(content: &str) -> Option<Vec<String>> {
    let labels: Vec<String> = content
        .lines()
        .map(|line| line.trim().to_string())
        .collect();

    if labels.iter().all(String::is_empty) {
        None
    } else {
        Some(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_ids_match_checkpoint() {
        assert_eq!(COCO_LABELS[1], "person");
        assert_eq!(COCO_LABELS[17], "cat");
        assert_eq!(COCO_LABELS[44], "bottle");
        assert_eq!(COCO_LABELS[90], "toothbrush");
    }

    #[test]
    fn parse_keeps_blank_lines_as_ids() {
        let labels = parse("background\n\ncat\n").unwrap();
        assert_eq!(labels, vec!["background", "", "cat"]);
    }

    #[test]
    fn parse_rejects_empty_file() {
        assert!(parse("\n \n").is_none());
    }
}
