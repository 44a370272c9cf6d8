//! Software renderer for the overlay scene.
//!
//! Fixed-size RGBA canvas with a transparent background: the crown mesh is
//! depth-buffered and flat-shaded, sparkles blend additively, the tilak is
//! an unlit disc. The composited result is mirrored horizontally so the
//! overlay matches a selfie-view camera feed.

use glam::{EulerRot, Mat4, Quat, Vec3};
use image::{Rgb, RgbImage, Rgba, RgbaImage};

use crate::scene::{
    Crown, Scene, SparkleField, Tilak, SPARKLE_COLOR, SPARKLE_SIZE, TILAK_COLOR, TILAK_RADIUS,
};
use crate::transform::Transform;

pub const SURFACE_WIDTH: u32 = 640;
pub const SURFACE_HEIGHT: u32 = 480;

const FOV_Y_DEGREES: f32 = 63.0;
const NEAR: f32 = 0.1;
const CAMERA_Z: f32 = 5.0;

// Flat Lambert weights; the light sits up and behind the camera
const LIGHT_POSITION: Vec3 = Vec3::new(0.0, 5.0, 5.0);
const AMBIENT_WEIGHT: f32 = 0.4;
const DIFFUSE_WEIGHT: f32 = 0.6;

/// World-space model matrix for a scale/Euler-rotation/translation transform.
pub fn model_matrix(t: &Transform) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        t.scale,
        Quat::from_euler(EulerRot::XYZ, t.rotation.x, t.rotation.y, t.rotation.z),
        t.position,
    )
}

pub struct Renderer {
    width: u32,
    height: u32,
    focal: f32,
    depth: Vec<f32>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::with_size(SURFACE_WIDTH, SURFACE_HEIGHT)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        let focal = (height as f32 / 2.0) / (FOV_Y_DEGREES.to_radians() / 2.0).tan();
        Self {
            width,
            height,
            focal,
            depth: vec![f32::INFINITY; (width * height) as usize],
        }
    }

    /// Render the scene onto a fresh transparent canvas.
    pub fn render(&mut self, scene: &Scene) -> RgbaImage {
        let mut canvas = RgbaImage::new(self.width, self.height);
        self.depth.fill(f32::INFINITY);

        if let Some(crown) = &scene.crown {
            self.draw_crown(&mut canvas, crown);
        }
        self.draw_tilak(&mut canvas, &scene.tilak);
        // Additive, drawn last so the glow sits on top
        self.draw_sparkles(&mut canvas, &scene.sparkles);
        canvas
    }

    /// World space to view space; the camera sits at z = 5 looking down -z.
    fn view_point(&self, p: Vec3) -> Vec3 {
        Vec3::new(p.x, p.y, p.z - CAMERA_Z)
    }

    /// Project a view-space point to (screen x, screen y, depth); None when
    /// behind the near plane.
    fn project(&self, v: Vec3) -> Option<(f32, f32, f32)> {
        if v.z >= -NEAR {
            return None;
        }
        let inv = -1.0 / v.z;
        let sx = self.width as f32 / 2.0 + v.x * self.focal * inv;
        let sy = self.height as f32 / 2.0 - v.y * self.focal * inv;
        Some((sx, sy, -v.z))
    }

    fn draw_crown(&mut self, canvas: &mut RgbaImage, crown: &Crown) {
        let model = model_matrix(&crown.transform);
        let light = LIGHT_POSITION.normalize();

        for mesh in &crown.model.meshes {
            let world: Vec<Vec3> = mesh
                .positions
                .iter()
                .map(|&p| model.transform_point3(p))
                .collect();

            for tri in &mesh.triangles {
                let [a, b, c] = [
                    world[tri[0] as usize],
                    world[tri[1] as usize],
                    world[tri[2] as usize],
                ];

                let (Some(p0), Some(p1), Some(p2)) = (
                    self.project(self.view_point(a)),
                    self.project(self.view_point(b)),
                    self.project(self.view_point(c)),
                ) else {
                    continue;
                };

                // Flat shade from the face normal; both sides lit the same
                // since the material is double-sided
                let normal = (b - a).cross(c - a).normalize_or_zero();
                let ndotl = normal.dot(light).abs();
                let shade = (AMBIENT_WEIGHT + DIFFUSE_WEIGHT * ndotl).min(1.0);
                let color = Rgba([
                    (mesh.base_color[0] * shade * 255.0) as u8,
                    (mesh.base_color[1] * shade * 255.0) as u8,
                    (mesh.base_color[2] * shade * 255.0) as u8,
                    (mesh.base_color[3] * 255.0) as u8,
                ]);

                self.fill_triangle(canvas, p0, p1, p2, color);
            }
        }
    }

    fn fill_triangle(
        &mut self,
        canvas: &mut RgbaImage,
        p0: (f32, f32, f32),
        p1: (f32, f32, f32),
        p2: (f32, f32, f32),
        color: Rgba<u8>,
    ) {
        let area = (p1.0 - p0.0) * (p2.1 - p0.1) - (p1.1 - p0.1) * (p2.0 - p0.0);
        if area.abs() < f32::EPSILON {
            return;
        }

        let min_x = p0.0.min(p1.0).min(p2.0).floor().max(0.0) as u32;
        let max_x = (p0.0.max(p1.0).max(p2.0).ceil() as i64).clamp(0, self.width as i64 - 1) as u32;
        let min_y = p0.1.min(p1.1).min(p2.1).floor().max(0.0) as u32;
        let max_y =
            (p0.1.max(p1.1).max(p2.1).ceil() as i64).clamp(0, self.height as i64 - 1) as u32;
        if min_x > max_x || min_y > max_y {
            return;
        }

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;
                let w0 = (p2.0 - p1.0) * (py - p1.1) - (p2.1 - p1.1) * (px - p1.0);
                let w1 = (p0.0 - p2.0) * (py - p2.1) - (p0.1 - p2.1) * (px - p2.0);
                let w2 = (p1.0 - p0.0) * (py - p0.1) - (p1.1 - p0.1) * (px - p0.0);

                // No backface culling: accept either winding
                let inside = if area > 0.0 {
                    w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
                } else {
                    w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0
                };
                if !inside {
                    continue;
                }

                let (b0, b1, b2) = (w0 / area, w1 / area, w2 / area);
                let depth = b0 * p0.2 + b1 * p1.2 + b2 * p2.2;
                let idx = (y * self.width + x) as usize;
                if depth < self.depth[idx] {
                    self.depth[idx] = depth;
                    canvas.put_pixel(x, y, color);
                }
            }
        }
    }

    fn draw_sparkles(&mut self, canvas: &mut RgbaImage, sparkles: &SparkleField) {
        let model = model_matrix(&sparkles.transform);
        for &point in &sparkles.points {
            let world = model.transform_point3(point);
            let Some((sx, sy, depth)) = self.project(self.view_point(world)) else {
                continue;
            };
            let radius = 0.5 * SPARKLE_SIZE * self.focal / depth;
            self.additive_disc(canvas, sx, sy, radius.max(1.0), SPARKLE_COLOR);
        }
    }

    fn draw_tilak(&mut self, canvas: &mut RgbaImage, tilak: &Tilak) {
        let Some((sx, sy, depth)) = self.project(self.view_point(tilak.transform.position)) else {
            return;
        };
        let radius = TILAK_RADIUS * tilak.transform.scale.x * self.focal / depth;
        if radius <= 0.0 {
            return;
        }
        self.solid_disc(canvas, sx, sy, radius, depth, TILAK_COLOR);
    }

    fn solid_disc(
        &mut self,
        canvas: &mut RgbaImage,
        cx: f32,
        cy: f32,
        radius: f32,
        depth: f32,
        color: [u8; 3],
    ) {
        for_disc_pixels(cx, cy, radius, self.width, self.height, |x, y| {
            let idx = (y * self.width + x) as usize;
            if depth < self.depth[idx] {
                self.depth[idx] = depth;
                canvas.put_pixel(x, y, Rgba([color[0], color[1], color[2], 255]));
            }
        });
    }

    fn additive_disc(
        &mut self,
        canvas: &mut RgbaImage,
        cx: f32,
        cy: f32,
        radius: f32,
        color: [u8; 3],
    ) {
        for_disc_pixels(cx, cy, radius, self.width, self.height, |x, y| {
            let p = canvas.get_pixel_mut(x, y);
            p.0 = [
                p.0[0].saturating_add(color[0]),
                p.0[1].saturating_add(color[1]),
                p.0[2].saturating_add(color[2]),
                255,
            ];
        });
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn for_disc_pixels(
    cx: f32,
    cy: f32,
    radius: f32,
    width: u32,
    height: u32,
    mut f: impl FnMut(u32, u32),
) {
    let min_x = (cx - radius).floor().max(0.0) as u32;
    let max_x = ((cx + radius).ceil() as i64).clamp(0, width as i64 - 1) as u32;
    let min_y = (cy - radius).floor().max(0.0) as u32;
    let max_y = ((cy + radius).ceil() as i64).clamp(0, height as i64 - 1) as u32;
    if min_x > max_x || min_y > max_y {
        return;
    }
    let r2 = radius * radius;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                f(x, y);
            }
        }
    }
}

/// Composite the overlay alpha-over the camera frame, mirrored horizontally
/// for selfie view. Both images must share dimensions.
pub fn composite_mirrored(frame: &RgbImage, overlay: &RgbaImage) -> RgbImage {
    let (w, h) = frame.dimensions();
    debug_assert_eq!(overlay.dimensions(), (w, h));

    let mut out = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let o = overlay.get_pixel(x, y);
            let f = frame.get_pixel(x, y);
            let alpha = o.0[3] as f32 / 255.0;
            let blend = |ov: u8, fr: u8| (ov as f32 * alpha + fr as f32 * (1.0 - alpha)) as u8;
            out.put_pixel(
                w - 1 - x,
                y,
                Rgb([
                    blend(o.0[0], f.0[0]),
                    blend(o.0[1], f.0[1]),
                    blend(o.0[2], f.0[2]),
                ]),
            );
        }
    }
    out
}
