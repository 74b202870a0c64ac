//! Screen-space math shared by the software backend and mirrored in `picking.wgsl`.

use crate::buffer::{ElementIndex, Face, ScreenPoint, NO_HIT};
use glamx::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

/// Projects a world-space point to viewport pixels.
///
/// Points with `w <= 0` are behind the camera and get [`ScreenPoint::INVALID`].
#[inline]
pub fn project_point(view_projection: &Mat4, viewport: Vec4, point: Vec3) -> ScreenPoint {
    let clip = *view_projection * point.extend(1.0);
    if clip.w <= 0.0 {
        return ScreenPoint::INVALID;
    }

    let ndc = clip.xyz() / clip.w;
    ScreenPoint::new(
        viewport.x + (ndc.x * 0.5 + 0.5) * viewport.z,
        viewport.y + (0.5 - ndc.y * 0.5) * viewport.w,
        ndc.z,
    )
}

/// Relative tolerance of the winding test, against the magnitude of the shoelace terms.
pub const WINDING_EPSILON: f32 = 1.0e-5;

/// Twice the signed area of a screen-space polygon, with the sum of the
/// absolute values of its shoelace terms.
///
/// Screen y points down, so front faces (counter-clockwise in NDC) are negative.
pub fn signed_area(polygon: &[ScreenPoint]) -> (f32, f32) {
    let mut sum = 0.0;
    let mut magnitude = 0.0;
    let mut prev = match polygon.last() {
        Some(p) => p,
        None => return (0.0, 0.0),
    };
    for p in polygon {
        let (a, b) = (prev.x() * p.y(), p.x() * prev.y());
        sum += a - b;
        magnitude += a.abs() + b.abs();
        prev = p;
    }
    (sum, magnitude)
}

/// Is a projected polygon facing away from the camera?
///
/// Polygons whose area vanishes up to rounding face neither way.
#[inline]
pub fn is_back_facing(polygon: &[ScreenPoint]) -> bool {
    let (sum, magnitude) = signed_area(polygon);
    sum > WINDING_EPSILON * magnitude
}

/// Distance from `p` to the segment `[a, b]` and the parameter of the closest point.
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> (f32, f32) {
    let ab = b - a;
    let len2 = ab.length_squared();
    let t = if len2 > 0.0 {
        ((p - a).dot(ab) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((a + ab * t - p).length(), t)
}

/// Even-odd ray casting test.
pub fn point_in_polygon(p: Vec2, polygon: &[ScreenPoint]) -> bool {
    let mut inside = false;
    let mut j = match polygon.len() {
        0 => return false,
        n => n - 1,
    };
    for i in 0..polygon.len() {
        let (pi, pj) = (&polygon[i], &polygon[j]);
        if (pi.y() > p.y) != (pj.y() > p.y)
            && p.x < (pj.x() - pi.x()) * (p.y - pi.y()) / (pj.y() - pi.y()) + pi.x()
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Depth of a polygon under `p`, interpolated inside the first fan triangle containing it.
///
/// Falls back to the mean vertex depth when no triangle contains `p` numerically.
pub fn polygon_depth_at(p: Vec2, polygon: &[ScreenPoint]) -> f32 {
    if polygon.is_empty() {
        return f32::MAX;
    }

    let a = &polygon[0];
    for k in 1..polygon.len().saturating_sub(1) {
        let (b, c) = (&polygon[k], &polygon[k + 1]);
        let den = (b.y() - c.y()) * (a.x() - c.x()) + (c.x() - b.x()) * (a.y() - c.y());
        if den == 0.0 {
            continue;
        }
        let wa = ((b.y() - c.y()) * (p.x - c.x()) + (c.x() - b.x()) * (p.y - c.y())) / den;
        let wb = ((c.y() - a.y()) * (p.x - c.x()) + (a.x() - c.x()) * (p.y - c.y())) / den;
        let wc = 1.0 - wa - wb;
        if wa >= 0.0 && wb >= 0.0 && wc >= 0.0 {
            return wa * a.depth() + wb * b.depth() + wc * c.depth();
        }
    }

    polygon.iter().map(|q| q.depth()).sum::<f32>() / polygon.len() as f32
}

/// Collects the projected polygon of `face` into `out`.
///
/// Returns `false` if an index is out of bounds or a vertex is behind the camera.
pub fn gather_polygon(
    face: &Face,
    indices: &[u32],
    screen: &[ScreenPoint],
    out: &mut Vec<ScreenPoint>,
) -> bool {
    out.clear();
    for k in 0..face.vertex_count {
        let point = indices
            .get(face.polygon_slot(k) as usize)
            .and_then(|v| screen.get(*v as usize));
        match point {
            Some(p) if p.is_valid() => out.push(*p),
            _ => return false,
        }
    }
    true
}

/// Nearest candidate found so far: smallest depth, then smallest index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// NDC depth of the candidate.
    pub depth: f32,
    /// Global index of the candidate, [`NO_HIT`] if none.
    pub index: ElementIndex,
}

impl Default for Candidate {
    fn default() -> Self {
        Candidate::NONE
    }
}

impl Candidate {
    /// No candidate.
    pub const NONE: Candidate = Candidate {
        depth: f32::MAX,
        index: NO_HIT,
    };

    /// Does `(depth, index)` beat this candidate?
    #[inline]
    pub fn is_beaten_by(&self, depth: f32, index: ElementIndex) -> bool {
        depth < self.depth || (depth == self.depth && index < self.index)
    }

    /// Keeps the better of this candidate and `(depth, index)`.
    #[inline]
    pub fn offer(&mut self, depth: f32, index: ElementIndex) {
        if self.is_beaten_by(depth, index) {
            *self = Candidate { depth, index };
        }
    }

    /// The index, if any candidate was offered.
    #[inline]
    pub fn hit(&self) -> Option<ElementIndex> {
        (self.index != NO_HIT).then_some(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(x: f32, y: f32) -> ScreenPoint {
        ScreenPoint::new(x, y, 0.5)
    }

    #[test]
    fn points_behind_the_camera_are_invalid() {
        let vp = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let viewport = Vec4::new(0.0, 0.0, 100.0, 100.0);
        assert!(!project_point(&vp, viewport, Vec3::new(0.0, 0.0, 1.0)).is_valid());

        let center = project_point(&vp, viewport, Vec3::new(0.0, 0.0, -5.0));
        assert!(center.is_valid());
        assert!((center.x() - 50.0).abs() < 1.0e-4);
        assert!((center.y() - 50.0).abs() < 1.0e-4);
    }

    #[test]
    fn screen_winding_detects_back_faces() {
        // Counter-clockwise on a y-up plane is clockwise on a y-down screen.
        let front = [sp(0.0, 10.0), sp(10.0, 10.0), sp(0.0, 0.0)];
        let back = [sp(0.0, 0.0), sp(10.0, 10.0), sp(0.0, 10.0)];
        assert!(!is_back_facing(&front));
        assert!(is_back_facing(&back));
    }

    #[test]
    fn folded_polygons_face_neither_way() {
        let (a, b, c) = (sp(13.7, 402.1), sp(613.3, 17.9), sp(251.9, 377.3));
        let folded = [a, a, b, a, c];
        assert!(!is_back_facing(&folded));
        assert!(!is_back_facing(&[a, b, a, b]));
        assert!(!is_back_facing(&[]));
    }

    #[test]
    fn segment_distance_clamps_to_end_points() {
        let (d, t) = point_segment_distance(Vec2::new(5.0, 3.0), Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert_eq!((d, t), (3.0, 0.5));
        let (d, t) = point_segment_distance(Vec2::new(-4.0, 3.0), Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert_eq!((d, t), (5.0, 0.0));
    }

    #[test]
    fn ray_casting_handles_concave_polygons() {
        let l_shape = [
            sp(0.0, 0.0),
            sp(10.0, 0.0),
            sp(10.0, 4.0),
            sp(4.0, 4.0),
            sp(4.0, 10.0),
            sp(0.0, 10.0),
        ];
        assert!(point_in_polygon(Vec2::new(2.0, 8.0), &l_shape));
        assert!(point_in_polygon(Vec2::new(8.0, 2.0), &l_shape));
        assert!(!point_in_polygon(Vec2::new(8.0, 8.0), &l_shape));
    }

    #[test]
    fn depth_is_interpolated_in_the_fan() {
        let tri = [
            ScreenPoint::new(0.0, 0.0, 0.0),
            ScreenPoint::new(10.0, 0.0, 1.0),
            ScreenPoint::new(0.0, 10.0, 0.0),
        ];
        let d = polygon_depth_at(Vec2::new(5.0, 0.0), &tri);
        assert!((d - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn candidates_prefer_depth_then_index() {
        let mut best = Candidate::NONE;
        assert_eq!(best.hit(), None);
        best.offer(0.5, 7);
        best.offer(0.5, 9);
        assert_eq!(best.hit(), Some(7));
        best.offer(0.2, 9);
        assert_eq!(best.hit(), Some(9));
    }
}
