use std::path::PathBuf;

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::Array2;
use ort::session::Session;

use crate::face::{Landmark, LandmarkSet};
use crate::{detect, mesh, model};

/// Filesystem locations of the ONNX models.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub landmarks: PathBuf,
    /// Attention-refined landmark model, selected by `refine_landmarks`.
    pub landmarks_refined: PathBuf,
}

/// Tracker configuration, mirroring the upstream face-mesh options.
#[derive(Debug, Clone, Copy)]
pub struct TrackerOptions {
    pub max_faces: usize,
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            max_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

/// Square frame region (pixels) the landmark model runs on.
#[derive(Debug, Clone, Copy)]
struct Region {
    x: f32,
    y: f32,
    size: f32,
}

const REGION_PADDING: f32 = 0.25;
const DETECT_NMS_THRESHOLD: f32 = 0.3;

/// Full pipeline: detect a face, then track it frame to frame with the
/// landmark model.
///
/// While a face is tracked, the detector stays idle and the mesh model runs
/// on a region derived from the previous frame's landmarks; when the
/// presence score falls below the tracking confidence, detection starts
/// over.
pub struct Pipeline {
    detector: Session,
    landmarks: Session,
    anchors: Array2<f32>,
    options: TrackerOptions,
    region: Option<Region>,
}

impl Pipeline {
    pub fn new(paths: &ModelPaths, options: TrackerOptions) -> Result<Self> {
        let landmark_path = if options.refine_landmarks {
            &paths.landmarks_refined
        } else {
            &paths.landmarks
        };
        Ok(Self {
            detector: model::load_session(&paths.detector).context("loading face detector")?,
            landmarks: model::load_session(landmark_path).context("loading landmark model")?,
            anchors: detect::generate_anchors(),
            options,
            region: None,
        })
    }

    /// Process one frame: returns frame-normalized landmarks for the tracked
    /// face, or None when no face is present. A no-face frame is a normal
    /// condition, not an error.
    pub fn process_frame(&mut self, img: &DynamicImage) -> Result<Option<LandmarkSet>> {
        if let Some(region) = self.region {
            if let Some(set) = self
                .run_landmarks(img, region, self.options.min_tracking_confidence)
                .context("tracking face")?
            {
                self.region = Some(region_from_landmarks(&set, img));
                return Ok(Some(set));
            }
            log::debug!("tracking lost, falling back to detection");
            self.region = None;
        }

        let mut detections = detect::detect_faces(
            &mut self.detector,
            &self.anchors,
            img,
            self.options.min_detection_confidence,
            DETECT_NMS_THRESHOLD,
        )
        .context("detecting faces")?;
        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        detections.truncate(self.options.max_faces);

        let Some(best) = detections.first() else {
            return Ok(None);
        };

        let region = region_from_bbox(best.bbox, img);
        match self
            .run_landmarks(img, region, self.options.min_detection_confidence)
            .context("locating landmarks")?
        {
            Some(set) => {
                self.region = Some(region_from_landmarks(&set, img));
                Ok(Some(set))
            }
            None => Ok(None),
        }
    }

    fn run_landmarks(
        &mut self,
        img: &DynamicImage,
        region: Region,
        min_score: f32,
    ) -> Result<Option<LandmarkSet>> {
        let (frame_w, frame_h) = img.dimensions();
        let crop = img.crop_imm(
            region.x as u32,
            region.y as u32,
            (region.size as u32).max(1),
            (region.size as u32).max(1),
        );

        let raw = mesh::infer_mesh(&mut self.landmarks, &crop)?;
        if raw.score < min_score {
            return Ok(None);
        }

        // Crop-normalized -> frame-normalized; depth scales with face size
        let points: Vec<Landmark> = raw
            .landmarks
            .chunks_exact(3)
            .map(|p| Landmark {
                x: (region.x + p[0] * region.size) / frame_w as f32,
                y: (region.y + p[1] * region.size) / frame_h as f32,
                z: p[2] * region.size / frame_w as f32,
            })
            .collect();

        LandmarkSet::from_points(points, raw.score).map(Some)
    }
}

/// Expand a detection bbox into a padded square crop region.
fn region_from_bbox(bbox: [f32; 4], img: &DynamicImage) -> Region {
    let (frame_w, frame_h) = img.dimensions();
    let cx = (bbox[0] + bbox[2] / 2.0) * frame_w as f32;
    let cy = (bbox[1] + bbox[3] / 2.0) * frame_h as f32;
    let extent = (bbox[2] * frame_w as f32).max(bbox[3] * frame_h as f32);
    square_region(cx, cy, extent, frame_w as f32, frame_h as f32)
}

fn region_from_landmarks(set: &LandmarkSet, img: &DynamicImage) -> Region {
    region_from_bbox(set.bounding_box(), img)
}

fn square_region(cx: f32, cy: f32, extent: f32, frame_w: f32, frame_h: f32) -> Region {
    let size = (extent * (1.0 + 2.0 * REGION_PADDING))
        .min(frame_w)
        .min(frame_h)
        .max(1.0);
    let x = (cx - size / 2.0).clamp(0.0, frame_w - size);
    let y = (cy - size / 2.0).clamp(0.0, frame_h - size);
    Region { x, y, size }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_is_padded_and_centered() {
        let img = DynamicImage::new_rgb8(640, 480);
        let r = region_from_bbox([0.4, 0.4, 0.2, 0.2], &img);
        // 128px wide, 96px tall -> extent 128, padded by 25% per side
        assert!((r.size - 192.0).abs() < 1e-3);
        assert!((r.x - 224.0).abs() < 1e-3);
        assert!((r.y - 144.0).abs() < 1e-3);
    }

    #[test]
    fn test_region_stays_inside_frame() {
        let img = DynamicImage::new_rgb8(640, 480);

        let r = region_from_bbox([0.0, 0.0, 0.2, 0.2], &img);
        assert!(r.x >= 0.0 && r.y >= 0.0);

        let r = region_from_bbox([0.0, 0.0, 1.0, 1.0], &img);
        assert!(r.size <= 480.0);
        assert!(r.y + r.size <= 480.0 + 1e-3);
    }
}
