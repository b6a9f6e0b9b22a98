use glam::{Mat4, Vec2, Vec3, Vec4};

use super::picking::{Aabb, Ray};
use crate::error::InitError;

/// Bounding rectangle of the viewport element in page coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    /// Viewport anchored at the page origin
    pub fn sized(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn validate(&self) -> Result<(), InitError> {
        if self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite() {
            Ok(())
        } else {
            Err(InitError::InvalidViewport {
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.left + self.width * 0.5, self.top + self.height * 0.5)
    }

    /// Page coordinates → normalized device coordinates (y up, [-1, 1])
    pub fn to_ndc(&self, screen: Vec2) -> Vec2 {
        Vec2::new(
            ((screen.x - self.left) / self.width) * 2.0 - 1.0,
            -((screen.y - self.top) / self.height) * 2.0 + 1.0,
        )
    }
}

/// Perspective camera looking at a target point
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view (radians)
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(5.0, -5.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            fov: 60.0_f32.to_radians(),
            near: 0.01,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            eye,
            target,
            up,
            ..Default::default()
        }
    }

    /// View matrix (world -> camera)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Projection matrix (camera -> clip)
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Cast a ray from a page position through the viewport into the scene
    pub fn screen_ray(&self, screen: Vec2, viewport: &ViewportRect) -> Ray {
        let ndc = viewport.to_ndc(screen);

        let vp_inv = self.view_projection(viewport.aspect()).inverse();

        let near_world = vp_inv * Vec4::new(ndc.x, ndc.y, -1.0, 1.0);
        let far_world = vp_inv * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);

        let near = near_world.truncate() / near_world.w;
        let far = far_world.truncate() / far_world.w;

        Ray {
            origin: self.eye,
            direction: (far - near).normalize_or_zero(),
        }
    }

    /// Frame a bounding box: target its center and back off along the
    /// current view direction until the largest extent fits the field of view.
    pub fn fit_to_bounds(&mut self, bounds: &Aabb, offset: f32) {
        let center = bounds.center();
        let max_size = bounds.size().max_element().max(1e-3);
        let fit_distance = (max_size * 0.5) / (self.fov * 0.5).tan() * offset;

        let mut dir = (self.eye - self.target).normalize_or_zero();
        if dir == Vec3::ZERO {
            dir = Vec3::new(1.0, -1.0, 1.0).normalize();
        }

        self.target = center;
        self.eye = center + dir * fit_distance;
        self.near = (fit_distance / 100.0).max(1e-3);
        self.far = fit_distance * 100.0;
    }
}
