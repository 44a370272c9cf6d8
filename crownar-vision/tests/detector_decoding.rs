/// Exercise the detector decode path on synthetic tensors: anchor layout,
/// thresholding, and suppression of overlapping candidates.
use anyhow::Result;
use crownar_vision::detect::{
    decode_detections, generate_anchors, nms, Detection, NUM_ANCHORS,
};

#[test]
fn test_threshold_filters_everything_below_confidence() -> Result<()> {
    let anchors = generate_anchors();
    let raw_boxes = vec![0.0f32; NUM_ANCHORS * 16];
    // Logit 0.0 -> score 0.5, right at the default detection confidence
    let raw_scores = vec![0.0f32; NUM_ANCHORS];

    let kept = decode_detections(&raw_boxes, &raw_scores, &anchors, 0.6)?;
    assert!(kept.is_empty());

    let kept = decode_detections(&raw_boxes, &raw_scores, &anchors, 0.5)?;
    assert_eq!(kept.len(), NUM_ANCHORS);
    Ok(())
}

#[test]
fn test_boxes_center_on_their_anchor() -> Result<()> {
    let anchors = generate_anchors();
    let mut raw_boxes = vec![0.0f32; NUM_ANCHORS * 16];
    let mut raw_scores = vec![-20.0f32; NUM_ANCHORS];

    // Zero deltas with a confident score: box centers on the anchor itself
    let idx = 137;
    raw_scores[idx] = 8.0;
    raw_boxes[idx * 16 + 2] = 64.0; // half the input extent
    raw_boxes[idx * 16 + 3] = 64.0;

    let kept = decode_detections(&raw_boxes, &raw_scores, &anchors, 0.5)?;
    assert_eq!(kept.len(), 1);
    let det = &kept[0];
    let cx = det.bbox[0] + det.bbox[2] / 2.0;
    let cy = det.bbox[1] + det.bbox[3] / 2.0;
    assert!((cx - anchors[[idx, 0]]).abs() < 1e-5);
    assert!((cy - anchors[[idx, 1]]).abs() < 1e-5);
    assert!((det.bbox[2] - 0.5).abs() < 1e-5);
    Ok(())
}

#[test]
fn test_nms_collapses_one_face_to_one_detection() {
    // Several anchors fire on the same face; suppression keeps the best
    let cluster: Vec<Detection> = (0..5)
        .map(|i| Detection {
            bbox: [
                0.3 + i as f32 * 0.005,
                0.3 + i as f32 * 0.005,
                0.2,
                0.2,
            ],
            score: 0.9 - i as f32 * 0.02,
        })
        .collect();

    let kept = nms(&cluster, 0.3);
    assert_eq!(kept.len(), 1);
    assert!((kept[0].score - 0.9).abs() < 1e-6);
}
