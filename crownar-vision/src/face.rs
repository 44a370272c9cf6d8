use anyhow::{ensure, Result};

/// A single tracked facial reference point.
///
/// x and y are normalized to [0, 1] relative to the frame; z is a relative
/// depth in the same horizontal units (negative values are closer to the
/// camera).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Minimum number of points in a well-formed face-mesh landmark set.
pub const MESH_LANDMARK_COUNT: usize = 468;

// Semantic indices into the face-mesh topology.
pub const FOREHEAD: usize = 10;
pub const LEFT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_OUTER: usize = 263;
pub const NOSE_TIP: usize = 1;
pub const GLABELLA: usize = 168;

/// The full landmark collection returned for one detected face in one frame.
///
/// Immutable once built; replaced wholesale each detection cycle.
#[derive(Debug, Clone)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
    score: f32,
}

impl LandmarkSet {
    pub fn from_points(points: Vec<Landmark>, score: f32) -> Result<Self> {
        ensure!(
            points.len() >= MESH_LANDMARK_COUNT,
            "landmark set too small: got {} points, need at least {}",
            points.len(),
            MESH_LANDMARK_COUNT
        );
        Ok(Self { points, score })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Face-presence score of the mesh model, in [0, 1].
    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    pub fn forehead(&self) -> Landmark {
        self.points[FOREHEAD]
    }

    pub fn left_eye_outer(&self) -> Landmark {
        self.points[LEFT_EYE_OUTER]
    }

    pub fn right_eye_outer(&self) -> Landmark {
        self.points[RIGHT_EYE_OUTER]
    }

    pub fn nose_tip(&self) -> Landmark {
        self.points[NOSE_TIP]
    }

    pub fn glabella(&self) -> Landmark {
        self.points[GLABELLA]
    }

    /// Axis-aligned bounding box of all points, normalized (x, y, w, h).
    pub fn bounding_box(&self) -> [f32; 4] {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        [min_x, min_y, max_x - min_x, max_y - min_y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_set() -> LandmarkSet {
        let points = vec![Landmark { x: 0.5, y: 0.5, z: 0.0 }; MESH_LANDMARK_COUNT];
        LandmarkSet::from_points(points, 0.9).unwrap()
    }

    #[test]
    fn test_rejects_short_set() {
        let points = vec![Landmark { x: 0.0, y: 0.0, z: 0.0 }; 10];
        assert!(LandmarkSet::from_points(points, 0.9).is_err());
    }

    #[test]
    fn test_semantic_accessors() {
        let mut points = vec![Landmark { x: 0.0, y: 0.0, z: 0.0 }; MESH_LANDMARK_COUNT];
        points[FOREHEAD] = Landmark { x: 0.5, y: 0.4, z: 0.0 };
        points[LEFT_EYE_OUTER] = Landmark { x: 0.3, y: 0.5, z: 0.0 };
        points[RIGHT_EYE_OUTER] = Landmark { x: 0.7, y: 0.5, z: 0.0 };
        points[NOSE_TIP] = Landmark { x: 0.5, y: 0.6, z: 0.0 };
        points[GLABELLA] = Landmark { x: 0.5, y: 0.45, z: 0.0 };
        let set = LandmarkSet::from_points(points, 0.8).unwrap();

        assert_eq!(set.forehead().y, 0.4);
        assert_eq!(set.left_eye_outer().x, 0.3);
        assert_eq!(set.right_eye_outer().x, 0.7);
        assert_eq!(set.nose_tip().y, 0.6);
        assert_eq!(set.glabella().y, 0.45);
    }

    #[test]
    fn test_bounding_box() {
        let mut points = vec![Landmark { x: 0.5, y: 0.5, z: 0.0 }; MESH_LANDMARK_COUNT];
        points[0] = Landmark { x: 0.2, y: 0.3, z: 0.0 };
        points[1] = Landmark { x: 0.8, y: 0.7, z: 0.0 };
        let set = LandmarkSet::from_points(points, 0.9).unwrap();
        let bbox = set.bounding_box();
        assert!((bbox[0] - 0.2).abs() < 1e-6);
        assert!((bbox[1] - 0.3).abs() < 1e-6);
        assert!((bbox[2] - 0.6).abs() < 1e-6);
        assert!((bbox[3] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_box_is_zero_sized() {
        let set = flat_set();
        let bbox = set.bounding_box();
        assert_eq!(bbox[2], 0.0);
        assert_eq!(bbox[3], 0.0);
    }
}
