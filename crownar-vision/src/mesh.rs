//! Face-mesh landmark model post-processing.
//!
//! The mesh model runs on a 192x192 face crop and outputs:
//! - landmarks: [1, 1, 1, 3*N] - N points as (x, y, z) in crop pixels
//! - face flag: [1, 1, 1, 1] - raw presence logit
//!
//! Coordinates are divided by the input size into crop-normalized units; the
//! flag goes through a sigmoid to become a presence score.

use anyhow::{ensure, Context, Result};
use image::DynamicImage;
use ndarray::Array4;
use ort::{session::Session, value::Value};

use crate::detect::sigmoid;
use crate::face::MESH_LANDMARK_COUNT;

pub const INPUT_SIZE: usize = 192;

/// Mesh model output: crop-normalized (x, y, z) triples plus presence score.
#[derive(Debug, Clone)]
pub struct RawMesh {
    pub landmarks: Vec<f32>,
    pub score: f32,
}

/// Normalize a raw landmark tensor and presence logit.
pub fn decode_mesh(raw_landmarks: &[f32], raw_score: f32) -> Result<RawMesh> {
    ensure!(
        raw_landmarks.len() % 3 == 0,
        "landmark tensor length {} is not a multiple of 3",
        raw_landmarks.len()
    );
    ensure!(
        raw_landmarks.len() / 3 >= MESH_LANDMARK_COUNT,
        "landmark tensor holds {} points, need at least {}",
        raw_landmarks.len() / 3,
        MESH_LANDMARK_COUNT
    );

    let landmarks = raw_landmarks
        .iter()
        .map(|v| v / INPUT_SIZE as f32)
        .collect();

    Ok(RawMesh {
        landmarks,
        score: sigmoid(raw_score),
    })
}

/// Run the mesh model on a face crop.
pub fn infer_mesh(session: &mut Session, crop: &DynamicImage) -> Result<RawMesh> {
    let size = INPUT_SIZE as u32;
    let crop_rgb = crop
        .resize_exact(size, size, image::imageops::FilterType::Triangle)
        .to_rgb8();

    // NHWC input in [0, 1]
    let input_data: Vec<f32> = crop_rgb.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
    let input_array = Array4::from_shape_vec((1, size as usize, size as usize, 3), input_data)?;
    let input_tensor = Value::from_array(input_array)?;

    let outputs = session.run(ort::inputs![input_tensor])?;

    // The landmark tensor is the large one; the presence flag is a scalar
    let mut landmarks: Option<Vec<f32>> = None;
    let mut score: Option<f32> = None;
    for (_name, output) in outputs.iter() {
        let (_shape, data) = output.try_extract_tensor::<f32>()?;
        if data.len() >= MESH_LANDMARK_COUNT * 3 {
            landmarks = Some(data.to_vec());
        } else if data.len() == 1 {
            score = Some(data[0]);
        }
    }
    let landmarks = landmarks.context("mesh output missing landmark tensor")?;
    let score = score.context("mesh output missing face flag")?;

    decode_mesh(&landmarks, score)
}
