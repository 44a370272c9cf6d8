pub mod asset;
pub mod config;
pub mod display;
pub mod render;
pub mod scene;
pub mod transform;
pub mod view;

// Re-export vision types for convenience
pub use crownar_vision::{Landmark, LandmarkSet, ModelPaths, Pipeline, TrackerOptions};

pub use transform::{map_landmarks, OverlayPose, Transform};
