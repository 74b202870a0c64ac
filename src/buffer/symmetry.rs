//! Symmetry plane used to build the mirror buffers.

use crate::buffer::Vertex;
use glamx::Vec3;

/// World axis orthogonal to the symmetry plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymmetryAxis {
    /// Plane `x = offset`.
    #[default]
    X,
    /// Plane `y = offset`.
    Y,
    /// Plane `z = offset`.
    Z,
}

/// An axis-aligned symmetry plane.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymmetryPlane {
    /// Axis orthogonal to the plane.
    pub axis: SymmetryAxis,
    /// Position of the plane along `axis`.
    pub offset: f32,
}

impl SymmetryPlane {
    /// Creates a plane orthogonal to `axis` at `offset`.
    pub fn new(axis: SymmetryAxis, offset: f32) -> Self {
        Self { axis, offset }
    }

    /// Reflects a point across the plane.
    #[inline]
    pub fn reflect_point(&self, p: Vec3) -> Vec3 {
        let mut p = p;
        match self.axis {
            SymmetryAxis::X => p.x = 2.0 * self.offset - p.x,
            SymmetryAxis::Y => p.y = 2.0 * self.offset - p.y,
            SymmetryAxis::Z => p.z = 2.0 * self.offset - p.z,
        }
        p
    }

    /// Reflects a direction across the plane.
    #[inline]
    pub fn reflect_vector(&self, v: Vec3) -> Vec3 {
        let mut v = v;
        match self.axis {
            SymmetryAxis::X => v.x = -v.x,
            SymmetryAxis::Y => v.y = -v.y,
            SymmetryAxis::Z => v.z = -v.z,
        }
        v
    }

    /// Rewrites `mirror[range]` as the reflection of `source[range]`.
    ///
    /// `mirror` is resized to the length of `source` first.
    pub fn mirror_vertices(
        &self,
        source: &[Vertex],
        mirror: &mut Vec<Vertex>,
        range: std::ops::Range<usize>,
    ) {
        mirror.resize(source.len(), Vertex::default());
        for (dst, src) in mirror[range.clone()].iter_mut().zip(&source[range]) {
            *dst = Vertex {
                position: self.reflect_point(src.position()).to_array(),
                normal: self
                    .reflect_vector(Vec3::from_array(src.normal))
                    .to_array(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_is_an_involution() {
        let plane = SymmetryPlane::new(SymmetryAxis::Y, 0.5);
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(plane.reflect_point(p), Vec3::new(1.0, -1.0, 3.0));
        assert_eq!(plane.reflect_point(plane.reflect_point(p)), p);
    }

    #[test]
    fn mirror_only_rewrites_the_range() {
        let plane = SymmetryPlane::new(SymmetryAxis::X, 0.0);
        let source = vec![Vertex::at(Vec3::X), Vertex::at(Vec3::new(2.0, 0.0, 0.0))];
        let mut mirror = Vec::new();
        plane.mirror_vertices(&source, &mut mirror, 1..2);
        assert_eq!(mirror[0], Vertex::default());
        assert_eq!(mirror[1].position, [-2.0, 0.0, 0.0]);
    }
}
