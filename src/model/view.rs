//! Camera and cursor inputs of a frame.

use glamx::{Mat4, Vec2, Vec3, Vec4};

/// A viewport rectangle, in pixels, origin at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Viewport {
    /// A viewport starting at the origin.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    /// Packs the viewport as `(x, y, width, height)`.
    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.x, self.y, self.width, self.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::new(800.0, 600.0)
    }
}

/// View and projection matrices plus the viewport they render to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewCamera {
    /// World space to camera space.
    pub view: Mat4,
    /// Camera space to clip space.
    pub projection: Mat4,
    /// Target rectangle in pixels.
    pub viewport: Viewport,
}

impl ViewCamera {
    /// Creates a camera from its matrices.
    pub fn new(view: Mat4, projection: Mat4, viewport: Viewport) -> Self {
        Self {
            view,
            projection,
            viewport,
        }
    }

    /// A perspective camera at `eye` looking at `target`.
    ///
    /// # Arguments
    /// * `fovy` - Vertical field of view, in radians
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fovy: f32, viewport: Viewport) -> Self {
        let aspect = viewport.width / viewport.height.max(1.0);
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            projection: Mat4::perspective_rh(fovy, aspect, 0.1, 1000.0),
            viewport,
        }
    }

    /// The combined projection and view transformation.
    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for ViewCamera {
    fn default() -> Self {
        ViewCamera::look_at(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            Vec3::Y,
            std::f32::consts::FRAC_PI_4,
            Viewport::default(),
        )
    }
}

/// Cursor position plus the hit-test radius around it.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CursorInput {
    /// Cursor position in pixels, origin at the top-left corner.
    pub position: Vec2,
    /// Pick radius in pixels. Uses the configured default if `None`.
    pub radius: Option<f32>,
}

impl CursorInput {
    /// A cursor at `position` using the default radius.
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            radius: None,
        }
    }

    /// Overrides the pick radius.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = Some(radius);
        self
    }
}

impl Default for CursorInput {
    fn default() -> Self {
        // Far outside of any viewport until the first cursor event.
        CursorInput::at(Vec2::splat(-1.0e6))
    }
}
