use std::path::Path;

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};

/// Build an inference session from an ONNX model on disk.
///
/// Models are distributed separately from the binary; the app config names
/// their locations.
pub fn load_session(path: &Path) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(path)
        .with_context(|| format!("loading model {}", path.display()))
}
