//! Landmark-to-overlay mapping.
//!
//! The constants here are empirically calibrated for the reference camera
//! and view setup and are preserved verbatim; they are not derived from any
//! geometric principle.

use crownar_vision::LandmarkSet;
use glam::Vec3;

/// Position, Euler rotation (radians) and scale of one overlay object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Idle rotation of the sparkle field, radians per applied pose.
pub const SPARKLE_YAW_STEP: f32 = 0.02;

/// Vertical offset of the sparkle field above the crown.
const SPARKLE_LIFT: f32 = 0.5;

/// Mapped transforms for one frame: crown, tilak, and the point the sparkle
/// field hovers at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayPose {
    pub crown: Transform,
    pub tilak: Transform,
    pub sparkle_anchor: Vec3,
}

/// Map one landmark set to overlay transforms.
///
/// Pure: identical input yields identical output. Degenerate input (eye
/// corners coincident) collapses the scales to zero without failing; callers
/// skip the call entirely when no face was detected.
pub fn map_landmarks(lm: &LandmarkSet) -> OverlayPose {
    let forehead = lm.forehead();
    let left_eye = lm.left_eye_outer();
    let right_eye = lm.right_eye_outer();
    let nose = lm.nose_tip();
    let glabella = lm.glabella();

    // Horizontal eye-corner distance stands in for head size
    let head_width = (right_eye.x - left_eye.x).abs();

    let x = (forehead.x - 0.5) * 8.0;
    let y = -(forehead.y - 0.5) * 1.0 + 1.5;
    let z = -forehead.z * 10.0;

    // Roll from the eye-line slope, pitch from the nose-forehead drop
    let tilt = (right_eye.y - left_eye.y).atan2(right_eye.x - left_eye.x);
    let pitch = (nose.y - forehead.y) * 2.0;

    let crown = Transform {
        position: Vec3::new(x, y, z),
        rotation: Vec3::new(pitch, 0.0, tilt),
        scale: Vec3::splat(head_width * 3.0),
    };

    let tilak = Transform {
        position: Vec3::new(
            (glabella.x - 0.5) * 8.0,
            -(glabella.y - 0.5) * 6.0,
            -glabella.z * 10.0 + 0.2,
        ),
        rotation: Vec3::ZERO,
        scale: Vec3::splat(head_width * 2.0),
    };

    OverlayPose {
        crown,
        tilak,
        sparkle_anchor: Vec3::new(x, y + SPARKLE_LIFT, z),
    }
}
