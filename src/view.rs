//! The filter view: camera, tracker, scene and window wired into one loop.

use std::sync::mpsc::{Receiver, TryRecvError};

use anyhow::Result;
use image::DynamicImage;

use crownar_vision::{Camera, LandmarkSet, ModelPaths, Pipeline, TrackerOptions};

use crate::asset::{self, CrownModel};
use crate::config::Config;
use crate::display::DisplayWindow;
use crate::render::{composite_mirrored, Renderer};
use crate::scene::Scene;
use crate::transform::map_landmarks;

/// What the window title tells the user about the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Starting,
    Ready,
    TrackerUnavailable,
    CrownLoadFailed,
}

impl Status {
    pub fn message(&self) -> &'static str {
        match self {
            Status::Starting => "Starting...",
            Status::Ready => "Ready",
            Status::TrackerUnavailable => "Face tracker unavailable",
            Status::CrownLoadFailed => "Crown model failed to load",
        }
    }

    /// Crown arrival only promotes a view that is still starting; returns
    /// whether the status changed.
    pub fn on_crown_loaded(&mut self) -> bool {
        if *self == Status::Starting {
            *self = Status::Ready;
            return true;
        }
        false
    }

    pub fn on_crown_failed(&mut self) -> bool {
        if *self != Status::CrownLoadFailed {
            *self = Status::CrownLoadFailed;
            return true;
        }
        false
    }
}

/// Push one frame's tracking result into the scene. The pose is mapped and
/// applied only when a face is present and the crown is loaded; otherwise
/// every transform keeps its previous value. Returns whether a pose was
/// applied.
pub fn apply_result(scene: &mut Scene, landmarks: Option<&LandmarkSet>) -> bool {
    let Some(set) = landmarks else {
        return false;
    };
    if !scene.crown_loaded() {
        return false;
    }
    let pose = map_landmarks(set);
    scene.apply(&pose);
    true
}

pub struct FilterView {
    camera: Camera,
    pipeline: Pipeline,
    scene: Scene,
    renderer: Renderer,
    window: DisplayWindow,
    status: Status,
    crown_rx: Option<Receiver<Result<CrownModel>>>,
}

impl FilterView {
    /// Set up the whole view. A missing camera or tracker model is reported
    /// and yields None instead of an error: there is nothing to retry, the
    /// caller should exit cleanly.
    pub fn open(cfg: &Config) -> Result<Option<Self>> {
        let paths = ModelPaths {
            detector: cfg.detector_model.clone(),
            landmarks: cfg.landmark_model.clone(),
            landmarks_refined: cfg.landmark_model_refined.clone(),
        };
        let options = TrackerOptions {
            refine_landmarks: cfg.refine_landmarks,
            min_detection_confidence: cfg.min_detection_confidence,
            min_tracking_confidence: cfg.min_tracking_confidence,
            ..TrackerOptions::default()
        };

        let pipeline = match Pipeline::new(&paths, options) {
            Ok(p) => p,
            Err(err) => {
                log::error!("{:#}", err);
                println!("{}", Status::TrackerUnavailable.message());
                return Ok(None);
            }
        };
        let camera = match Camera::open(&cfg.camera, cfg.frame_width, cfg.frame_height) {
            Ok(c) => c,
            Err(err) => {
                log::error!("{:#}", err);
                println!("{}", Status::TrackerUnavailable.message());
                return Ok(None);
            }
        };

        let (width, height) = camera.dimensions();
        let status = Status::Starting;
        let window = DisplayWindow::new(status.message(), width, height)?;

        Ok(Some(Self {
            camera,
            pipeline,
            scene: Scene::new(),
            renderer: Renderer::with_size(width, height),
            window,
            status,
            crown_rx: Some(asset::spawn_loader(cfg.crown_asset.clone())),
        }))
    }

    pub fn run(&mut self) -> Result<()> {
        while self.window.is_open() {
            self.poll_crown();

            let frame = self.camera.frame()?;
            let dynamic = DynamicImage::ImageRgb8(frame);
            let landmarks = self.pipeline.process_frame(&dynamic)?;
            apply_result(&mut self.scene, landmarks.as_ref());

            let overlay = self.renderer.render(&self.scene);
            let composed = composite_mirrored(&dynamic.into_rgb8(), &overlay);
            self.window.present(composed.as_raw())?;
        }
        Ok(())
    }

    /// Hand a finished crown load to the scene, at most once.
    fn poll_crown(&mut self) {
        let Some(rx) = &self.crown_rx else {
            return;
        };
        let changed = match rx.try_recv() {
            Ok(Ok(model)) => {
                self.scene.set_crown(model);
                self.crown_rx = None;
                self.status.on_crown_loaded()
            }
            Ok(Err(err)) => {
                log::error!("crown load failed: {:#}", err);
                self.crown_rx = None;
                self.status.on_crown_failed()
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                log::error!("crown loader vanished without a result");
                self.crown_rx = None;
                self.status.on_crown_failed()
            }
        };
        if changed {
            self.window.set_title(self.status.message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crownar_vision::face::{Landmark, MESH_LANDMARK_COUNT};

    fn face() -> LandmarkSet {
        let mut points = vec![Landmark { x: 0.5, y: 0.5, z: 0.0 }; MESH_LANDMARK_COUNT];
        points[33] = Landmark { x: 0.3, y: 0.5, z: 0.0 };
        points[263] = Landmark { x: 0.7, y: 0.5, z: 0.0 };
        LandmarkSet::from_points(points, 0.9).unwrap()
    }

    #[test]
    fn test_status_promotes_starting_once() {
        let mut status = Status::Starting;
        assert!(status.on_crown_loaded());
        assert_eq!(status, Status::Ready);
        assert!(!status.on_crown_loaded());
    }

    #[test]
    fn test_crown_failure_sticks() {
        let mut status = Status::Starting;
        assert!(status.on_crown_failed());
        assert_eq!(status, Status::CrownLoadFailed);
        // A late successful poll must not override the failure message
        assert!(!status.on_crown_loaded());
        assert_eq!(status, Status::CrownLoadFailed);
    }

    #[test]
    fn test_no_face_leaves_scene_untouched() {
        let mut scene = Scene::new();
        scene.set_crown(CrownModel { meshes: vec![] });
        assert!(apply_result(&mut scene, Some(&face())));
        let crown = scene.crown.as_ref().unwrap().transform;
        let yaw = scene.sparkles.transform.rotation.y;

        assert!(!apply_result(&mut scene, None));
        assert_eq!(scene.crown.as_ref().unwrap().transform, crown);
        assert_eq!(scene.sparkles.transform.rotation.y, yaw);
    }

    #[test]
    fn test_face_without_crown_applies_nothing() {
        let mut scene = Scene::new();
        assert!(!apply_result(&mut scene, Some(&face())));
        assert_eq!(scene.tilak.transform, Default::default());
    }
}
