//! Overlay scene state: the crown model (once loaded), the sparkle field,
//! and the tilak marker.
//!
//! Single-writer: transforms are only touched from the per-frame result
//! handling, and the render that consumes them follows immediately on the
//! same thread.

use glam::Vec3;
use rand::Rng;

use crate::asset::CrownModel;
use crate::transform::{OverlayPose, Transform, SPARKLE_YAW_STEP};

pub const SPARKLE_COUNT: usize = 30;
pub const SPARKLE_COLOR: [u8; 3] = [0xff, 0xd7, 0x00];
pub const SPARKLE_SIZE: f32 = 0.08;
pub const TILAK_COLOR: [u8; 3] = [0xff, 0x00, 0x00];
pub const TILAK_RADIUS: f32 = 0.05;

pub struct Crown {
    pub model: CrownModel,
    pub transform: Transform,
}

/// Gold points scattered in a unit-ish cube, re-anchored above the crown
/// each frame and slowly spun by the idle yaw.
pub struct SparkleField {
    pub points: Vec<Vec3>,
    pub transform: Transform,
}

pub struct Tilak {
    pub transform: Transform,
}

pub struct Scene {
    pub crown: Option<Crown>,
    pub sparkles: SparkleField,
    pub tilak: Tilak,
}

impl Scene {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let points = (0..SPARKLE_COUNT)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                )
            })
            .collect();
        Self {
            crown: None,
            sparkles: SparkleField {
                points,
                transform: Transform::default(),
            },
            tilak: Tilak {
                transform: Transform::default(),
            },
        }
    }

    /// The crown joins the scene once its asset load completes.
    pub fn set_crown(&mut self, model: CrownModel) {
        self.crown = Some(Crown {
            model,
            transform: Transform::default(),
        });
    }

    pub fn crown_loaded(&self) -> bool {
        self.crown.is_some()
    }

    /// Write a mapped pose into the overlay transforms and advance the
    /// sparkle idle yaw by its fixed step.
    pub fn apply(&mut self, pose: &OverlayPose) {
        if let Some(crown) = &mut self.crown {
            crown.transform = pose.crown;
        }
        self.tilak.transform = pose.tilak;
        self.sparkles.transform.position = pose.sparkle_anchor;
        self.sparkles.transform.rotation.y += SPARKLE_YAW_STEP;
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::map_landmarks;
    use crownar_vision::face::{Landmark, LandmarkSet, MESH_LANDMARK_COUNT};

    fn any_pose() -> OverlayPose {
        let mut points = vec![Landmark { x: 0.5, y: 0.5, z: 0.0 }; MESH_LANDMARK_COUNT];
        points[33] = Landmark { x: 0.3, y: 0.5, z: 0.0 };
        points[263] = Landmark { x: 0.7, y: 0.5, z: 0.0 };
        let set = LandmarkSet::from_points(points, 0.9).unwrap();
        map_landmarks(&set)
    }

    #[test]
    fn test_sparkle_field_shape() {
        let scene = Scene::new();
        assert_eq!(scene.sparkles.points.len(), SPARKLE_COUNT);
        for p in &scene.sparkles.points {
            assert!(p.x.abs() <= 1.0 && p.y.abs() <= 1.0 && p.z.abs() <= 1.0);
        }
        assert!(!scene.crown_loaded());
    }

    #[test]
    fn test_apply_advances_sparkle_yaw_only() {
        let mut scene = Scene::new();
        scene.set_crown(CrownModel { meshes: vec![] });
        let pose = any_pose();

        scene.apply(&pose);
        let crown_after_one = scene.crown.as_ref().unwrap().transform;
        let tilak_after_one = scene.tilak.transform;
        let yaw_after_one = scene.sparkles.transform.rotation.y;

        // Re-applying the identical pose changes nothing but the idle yaw
        scene.apply(&pose);
        assert_eq!(scene.crown.as_ref().unwrap().transform, crown_after_one);
        assert_eq!(scene.tilak.transform, tilak_after_one);
        assert!(
            (scene.sparkles.transform.rotation.y - (yaw_after_one + SPARKLE_YAW_STEP)).abs()
                < 1e-6
        );
    }

    #[test]
    fn test_pose_lands_on_objects() {
        let mut scene = Scene::new();
        scene.set_crown(CrownModel { meshes: vec![] });
        let pose = any_pose();
        scene.apply(&pose);

        assert_eq!(scene.crown.as_ref().unwrap().transform, pose.crown);
        assert_eq!(scene.tilak.transform, pose.tilak);
        assert_eq!(scene.sparkles.transform.position, pose.sparkle_anchor);
    }
}
