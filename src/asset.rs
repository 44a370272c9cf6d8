//! Crown model loading.
//!
//! The crown is a glTF binary loaded off the render thread; the view polls
//! the channel each frame and the scene treats "not yet loaded" as a valid
//! state.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::{ensure, Context, Result};
use glam::{Mat4, Vec3};

/// One sub-mesh of the crown, positions baked into model space.
pub struct CrownMesh {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub base_color: [f32; 4],
}

/// Loaded crown model. Every sub-mesh renders double-sided.
pub struct CrownModel {
    pub meshes: Vec<CrownMesh>,
}

pub fn load_crown(path: &Path) -> Result<CrownModel> {
    let (document, buffers, _images) =
        gltf::import(path).with_context(|| format!("importing {}", path.display()))?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .context("model has no scene")?;

    let mut meshes = Vec::new();
    for node in scene.nodes() {
        collect_meshes(&node, Mat4::IDENTITY, &buffers, &mut meshes);
    }
    ensure!(!meshes.is_empty(), "model has no meshes");

    log::info!(
        "loaded crown: {} sub-meshes, {} triangles",
        meshes.len(),
        meshes.iter().map(|m| m.triangles.len()).sum::<usize>()
    );
    Ok(CrownModel { meshes })
}

fn collect_meshes(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<CrownMesh>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(position_iter) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<Vec3> = position_iter
                .map(|p| world.transform_point3(Vec3::from_array(p)))
                .collect();

            let indices: Vec<u32> = match reader.read_indices() {
                Some(idx) => idx.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let triangles = indices
                .chunks_exact(3)
                .map(|c| [c[0], c[1], c[2]])
                .collect();

            let base_color = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_factor();

            out.push(CrownMesh {
                positions,
                triangles,
                base_color,
            });
        }
    }

    for child in node.children() {
        collect_meshes(&child, world, buffers, out);
    }
}

/// Load the crown in the background; the view polls the receiver each frame.
pub fn spawn_loader(path: PathBuf) -> Receiver<Result<CrownModel>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(load_crown(&path));
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_reports_missing_file() {
        let rx = spawn_loader(PathBuf::from("/nonexistent/crown.glb"));
        let result = rx.recv().expect("loader thread should answer");
        assert!(result.is_err());
    }
}
