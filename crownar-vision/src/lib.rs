pub mod detect;
pub mod face;
pub mod mesh;
pub mod model;
pub mod pipeline;
pub mod video;

// Re-export commonly used types
pub use face::{Landmark, LandmarkSet};
pub use pipeline::{ModelPaths, Pipeline, TrackerOptions};
pub use video::Camera;
