//! Short-range face detector post-processing.
//!
//! The detector is an SSD-style network over a 128x128 input with 896
//! anchors (16x16 grid with 2 anchors per cell at stride 8, 8x8 grid with 6
//! per cell at stride 16). It outputs:
//! - regressors: [1, 896, 16] - box deltas (cx, cy, w, h) plus 6 keypoint
//!   pairs we do not use
//! - scores: [1, 896, 1] - raw logits
//!
//! Decoding is anchor-relative:
//! cx = dx / input_size * anchor_w + anchor_cx
//! w  = dw / input_size * anchor_w

use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::{Array2, Array4};
use ort::{session::Session, value::Value};

pub const INPUT_SIZE: usize = 128;
pub const NUM_ANCHORS: usize = 896;
const BOX_DIMS: usize = 16;

/// A detected face region, bbox normalized (x, y, w, h) relative to the frame.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: [f32; 4],
    pub score: f32,
}

/// SSD anchor table, (896, 4) rows of (cx, cy, w, h) in normalized units.
///
/// All anchors share unit extent; only the centers vary per grid cell.
pub fn generate_anchors() -> Array2<f32> {
    let mut data = Vec::with_capacity(NUM_ANCHORS * 4);
    for (stride, anchors_per_cell) in [(8usize, 2usize), (16, 6)] {
        let cells = INPUT_SIZE / stride;
        for y in 0..cells {
            for x in 0..cells {
                for _ in 0..anchors_per_cell {
                    let cx = (x as f32 + 0.5) / cells as f32;
                    let cy = (y as f32 + 0.5) / cells as f32;
                    data.extend_from_slice(&[cx, cy, 1.0, 1.0]);
                }
            }
        }
    }
    Array2::from_shape_vec((NUM_ANCHORS, 4), data).expect("anchor table shape")
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Decode raw detector outputs into scored boxes.
pub fn decode_detections(
    raw_boxes: &[f32],
    raw_scores: &[f32],
    anchors: &Array2<f32>,
    score_threshold: f32,
) -> Result<Vec<Detection>> {
    ensure!(
        raw_boxes.len() >= NUM_ANCHORS * BOX_DIMS,
        "short box tensor: got {}, expected {}",
        raw_boxes.len(),
        NUM_ANCHORS * BOX_DIMS
    );
    ensure!(
        raw_scores.len() >= NUM_ANCHORS,
        "short score tensor: got {}, expected {}",
        raw_scores.len(),
        NUM_ANCHORS
    );

    let scale = INPUT_SIZE as f32;
    let mut detections = Vec::new();
    for i in 0..NUM_ANCHORS {
        let score = sigmoid(raw_scores[i]);
        if score < score_threshold {
            continue;
        }
        let off = i * BOX_DIMS;
        let cx = raw_boxes[off] / scale * anchors[[i, 2]] + anchors[[i, 0]];
        let cy = raw_boxes[off + 1] / scale * anchors[[i, 3]] + anchors[[i, 1]];
        let w = raw_boxes[off + 2] / scale * anchors[[i, 2]];
        let h = raw_boxes[off + 3] / scale * anchors[[i, 3]];
        detections.push(Detection {
            bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
            score,
        });
    }
    Ok(detections)
}

/// Detect faces in a frame; bboxes come back normalized to the frame.
pub fn detect_faces(
    session: &mut Session,
    anchors: &Array2<f32>,
    img: &DynamicImage,
    score_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<Detection>> {
    let target_size = INPUT_SIZE as u32;
    let (orig_width, orig_height) = img.dimensions();

    // Letterbox to a square canvas to avoid distortion
    let max_dim = orig_width.max(orig_height);
    let scale = target_size as f32 / max_dim as f32;
    let new_width = (orig_width as f32 * scale) as u32;
    let new_height = (orig_height as f32 * scale) as u32;

    let resized = img.resize_exact(new_width, new_height, image::imageops::FilterType::Triangle);
    let mut canvas = DynamicImage::new_rgb8(target_size, target_size);
    let offset_x = (target_size - new_width) / 2;
    let offset_y = (target_size - new_height) / 2;
    image::imageops::overlay(&mut canvas, &resized, offset_x as i64, offset_y as i64);
    let canvas_rgb = canvas.to_rgb8();

    // NHWC input in [-1, 1]
    let input_data: Vec<f32> = canvas_rgb
        .as_raw()
        .iter()
        .map(|&v| v as f32 / 127.5 - 1.0)
        .collect();
    let input_array = Array4::from_shape_vec(
        (1, target_size as usize, target_size as usize, 3),
        input_data,
    )?;
    let input_tensor = Value::from_array(input_array)?;

    let outputs = session.run(ort::inputs![input_tensor])?;

    // Identify the two output tensors by their innermost dimension
    let mut boxes: Option<Vec<f32>> = None;
    let mut scores: Option<Vec<f32>> = None;
    for (_name, output) in outputs.iter() {
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        match dims.last().copied() {
            Some(16) => boxes = Some(data.to_vec()),
            Some(1) => scores = Some(data.to_vec()),
            _ => {}
        }
    }
    let boxes = boxes.context("detector output missing box regressors")?;
    let scores = scores.context("detector output missing scores")?;

    let raw = decode_detections(&boxes, &scores, anchors, score_threshold)?;

    // Undo the letterbox: canvas-normalized -> frame-normalized
    let mut detections: Vec<Detection> = raw
        .into_iter()
        .map(|d| {
            let x_px = (d.bbox[0] * target_size as f32 - offset_x as f32) / scale;
            let y_px = (d.bbox[1] * target_size as f32 - offset_y as f32) / scale;
            let w_px = d.bbox[2] * target_size as f32 / scale;
            let h_px = d.bbox[3] * target_size as f32 / scale;
            Detection {
                bbox: [
                    x_px / orig_width as f32,
                    y_px / orig_height as f32,
                    w_px / orig_width as f32,
                    h_px / orig_height as f32,
                ],
                score: d.score,
            }
        })
        .collect();

    if nms_threshold < 1.0 {
        detections = nms(&detections, nms_threshold);
    }

    Ok(detections)
}

/// Apply non-maximum suppression to remove overlapping detections
pub fn nms(detections: &[Detection], iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return vec![];
    }

    let mut sorted = detections.to_vec();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; sorted.len()];

    for i in 0..sorted.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(sorted[i].clone());

        for j in (i + 1)..sorted.len() {
            if suppressed[j] {
                continue;
            }
            let iou = compute_iou(&sorted[i].bbox, &sorted[j].bbox);
            if iou > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let y2 = (a[1] + a[3]).min(b[1] + b[3]);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) * (y2 - y1);
    let area_a = a[2] * a[3];
    let area_b = b[2] * b[3];
    inter / (area_a + area_b - inter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_anchor_table() {
        let anchors = generate_anchors();
        assert_eq!(anchors.shape(), &[NUM_ANCHORS, 4]);

        // First anchor sits at the center of the first stride-8 cell
        assert!((anchors[[0, 0]] - 0.5 / 16.0).abs() < 1e-6);
        assert!((anchors[[0, 1]] - 0.5 / 16.0).abs() < 1e-6);

        // Stride-16 block starts after 16*16*2 entries, centered in an 8x8 grid
        let first_coarse = 16 * 16 * 2;
        assert!((anchors[[first_coarse, 0]] - 0.5 / 8.0).abs() < 1e-6);

        // All centers stay inside the unit square
        for i in 0..NUM_ANCHORS {
            assert!(anchors[[i, 0]] > 0.0 && anchors[[i, 0]] < 1.0);
            assert!(anchors[[i, 1]] > 0.0 && anchors[[i, 1]] < 1.0);
        }
    }

    #[test]
    fn test_decode_single_detection() {
        let anchors = generate_anchors();

        let mut raw_boxes = vec![0.0f32; NUM_ANCHORS * BOX_DIMS];
        let mut raw_scores = vec![-20.0f32; NUM_ANCHORS];

        // One confident detection on anchor 0: a 32px box offset (8, 4) from
        // the anchor center.
        raw_scores[0] = 5.0;
        raw_boxes[0] = 8.0;
        raw_boxes[1] = 4.0;
        raw_boxes[2] = 32.0;
        raw_boxes[3] = 32.0;

        let detections = decode_detections(&raw_boxes, &raw_scores, &anchors, 0.5).unwrap();
        assert_eq!(detections.len(), 1);

        let det = &detections[0];
        let anchor_cx = 0.5 / 16.0;
        let cx = 8.0 / 128.0 + anchor_cx;
        let cy = 4.0 / 128.0 + anchor_cx;
        let w = 32.0 / 128.0;
        assert!((det.bbox[0] - (cx - w / 2.0)).abs() < 1e-5);
        assert!((det.bbox[1] - (cy - w / 2.0)).abs() < 1e-5);
        assert!((det.bbox[2] - w).abs() < 1e-5);
        assert!((det.bbox[3] - w).abs() < 1e-5);
        assert!(det.score > 0.99);
    }

    #[test]
    fn test_iou() {
        let a = [0.1, 0.1, 0.2, 0.2];
        let b = [0.15, 0.15, 0.2, 0.2];
        let iou = compute_iou(&a, &b);
        assert!(iou > 0.0 && iou < 1.0);

        // No overlap
        let c = [0.8, 0.8, 0.1, 0.1];
        assert_eq!(compute_iou(&a, &c), 0.0);
    }

    #[test]
    fn test_nms() {
        let detections = vec![
            Detection {
                bbox: [0.1, 0.1, 0.2, 0.2],
                score: 0.9,
            },
            Detection {
                bbox: [0.12, 0.12, 0.2, 0.2],
                score: 0.8,
            },
            Detection {
                bbox: [0.6, 0.6, 0.2, 0.2],
                score: 0.85,
            },
        ];

        let result = nms(&detections, 0.3);
        assert_eq!(result.len(), 2); // Should keep first and third
    }
}
