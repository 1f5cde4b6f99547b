// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Projector volumes
//!
//! A projector is a unit cube (`[-0.5, 0.5]³`) in its own local space,
//! placed in the world by a position, rotation and non-uniform scale.
//! Decal UVs are the local x/y coordinates shifted into `[0, 1]`; local z is
//! the projection depth.

use crate::bounds::Aabb;
use crate::error::{Error, Result};
use nalgebra::{Isometry3, Matrix4, Point3, Translation3, UnitQuaternion, Vector3};

/// Scale components below this magnitude make the volume degenerate
const MIN_SCALE: f32 = 1e-6;

/// Plane definition for half-space tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Point on the plane
    pub point: Point3<f32>,
    /// Outward normal (normalized)
    pub normal: Vector3<f32>,
}

impl Plane {
    /// Create a new plane
    pub fn new(point: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self {
            point,
            normal: normal.normalize(),
        }
    }

    /// Signed distance from point to plane.
    /// Positive = outside, zero or negative = inside
    #[inline]
    pub fn signed_distance(&self, point: &Point3<f32>) -> f32 {
        (point - self.point).dot(&self.normal)
    }

    /// Check if point lies in the inside (negative) half-space
    #[inline]
    pub fn is_inside(&self, point: &Point3<f32>) -> bool {
        self.signed_distance(point) <= 0.0
    }
}

/// Position, orientation and non-uniform scale of a projector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Point3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Placement {
    pub fn new(position: Point3<f32>, rotation: UnitQuaternion<f32>, scale: Vector3<f32>) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Axis-aligned placement
    pub fn axis_aligned(position: Point3<f32>, scale: Vector3<f32>) -> Self {
        Self::new(position, UnitQuaternion::identity(), scale)
    }

    /// Local-to-world matrix: translate * rotate * scale
    pub fn to_matrix(&self) -> Matrix4<f32> {
        let isometry = Isometry3::from_parts(Translation3::from(self.position.coords), self.rotation);
        isometry.to_homogeneous() * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|c| c.is_finite())
            && self.rotation.coords.iter().all(|c| c.is_finite())
            && self.scale.iter().all(|c| c.is_finite())
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::axis_aligned(Point3::origin(), Vector3::new(1.0, 1.0, 1.0))
    }
}

/// Oriented projection volume with its six world-space clip planes
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectorVolume {
    placement: Placement,
    local_to_world: Matrix4<f32>,
    world_to_local: Matrix4<f32>,
    planes: [Plane; 6],
}

impl ProjectorVolume {
    /// Build the volume for a placement.
    ///
    /// Fails for non-finite placements and for scales that collapse the cube.
    pub fn new(placement: Placement) -> Result<Self> {
        if !placement.is_finite() {
            return Err(Error::InvalidProjector(
                "placement contains non-finite values".to_string(),
            ));
        }
        if placement.scale.iter().any(|s| s.abs() < MIN_SCALE) {
            return Err(Error::InvalidProjector(format!(
                "scale {:?} collapses the projection volume",
                placement.scale
            )));
        }

        let local_to_world = placement.to_matrix();
        let world_to_local = local_to_world
            .try_inverse()
            .ok_or_else(|| Error::InvalidProjector("placement is not invertible".to_string()))?;

        // Normals transform by the inverse transpose of the linear part
        let normal_matrix = world_to_local.fixed_view::<3, 3>(0, 0).transpose();
        let face = |local_normal: Vector3<f32>| {
            let point = local_to_world.transform_point(&Point3::from(local_normal * 0.5));
            Plane::new(point, normal_matrix * local_normal)
        };

        let planes = [
            face(Vector3::x()),
            face(-Vector3::x()),
            face(Vector3::y()),
            face(-Vector3::y()),
            face(Vector3::z()),
            face(-Vector3::z()),
        ];

        Ok(Self {
            placement,
            local_to_world,
            world_to_local,
            planes,
        })
    }

    #[inline]
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    #[inline]
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    #[inline]
    pub fn local_to_world(&self) -> &Matrix4<f32> {
        &self.local_to_world
    }

    #[inline]
    pub fn world_to_local(&self) -> &Matrix4<f32> {
        &self.world_to_local
    }

    /// Transform a world-space point into projector-local space
    #[inline]
    pub fn to_local(&self, world: &Point3<f32>) -> Point3<f32> {
        self.world_to_local.transform_point(world)
    }

    /// Decal UV of a world-space point
    #[inline]
    pub fn project_uv(&self, world: &Point3<f32>) -> (f32, f32) {
        let local = self.to_local(world);
        (local.x + 0.5, local.y + 0.5)
    }

    /// Strict containment: inside all six half-spaces
    pub fn contains(&self, world: &Point3<f32>) -> bool {
        self.planes.iter().all(|plane| plane.is_inside(world))
    }

    /// World-space bounds of the volume
    pub fn world_bounds(&self) -> Aabb {
        Aabb::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5))
            .transformed(&self.local_to_world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_unit_cube_containment() {
        let volume = ProjectorVolume::new(Placement::default()).unwrap();
        assert!(volume.contains(&Point3::origin()));
        assert!(volume.contains(&Point3::new(0.5, 0.5, 0.5)));
        assert!(!volume.contains(&Point3::new(0.6, 0.0, 0.0)));
        assert!(!volume.contains(&Point3::new(0.0, 0.0, -0.51)));
    }

    #[test]
    fn test_planes_point_outward() {
        let volume = ProjectorVolume::new(Placement::default()).unwrap();
        for plane in volume.planes() {
            assert!(plane.signed_distance(&Point3::origin()) < 0.0);
            assert!(plane.signed_distance(&Point3::from(plane.normal * 2.0)) > 0.0);
        }
    }

    #[test]
    fn test_scaled_and_rotated_volume() {
        // 4 units wide along local x, rotated so local x maps to world y
        let placement = Placement::new(
            Point3::new(10.0, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
            Vector3::new(4.0, 1.0, 1.0),
        );
        let volume = ProjectorVolume::new(placement).unwrap();

        assert!(volume.contains(&Point3::new(10.0, 1.9, 0.0)));
        assert!(!volume.contains(&Point3::new(11.9, 0.0, 0.0)));

        let (u, v) = volume.project_uv(&Point3::new(10.0, 2.0, 0.0));
        assert_relative_eq!(u, 1.0, epsilon = 1e-5);
        assert_relative_eq!(v, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_project_uv_center() {
        let volume = ProjectorVolume::new(Placement::default()).unwrap();
        let (u, v) = volume.project_uv(&Point3::new(-0.25, 0.25, 0.1));
        assert_relative_eq!(u, 0.25);
        assert_relative_eq!(v, 0.75);
    }

    #[test]
    fn test_degenerate_scale_rejected() {
        let placement = Placement::axis_aligned(Point3::origin(), Vector3::new(1.0, 0.0, 1.0));
        assert!(matches!(
            ProjectorVolume::new(placement),
            Err(Error::InvalidProjector(_))
        ));

        let placement = Placement::axis_aligned(Point3::new(f32::NAN, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        assert!(ProjectorVolume::new(placement).is_err());
    }

    #[test]
    fn test_world_bounds() {
        let placement = Placement::axis_aligned(Point3::new(1.0, 2.0, 3.0), Vector3::new(2.0, 2.0, 2.0));
        let bounds = ProjectorVolume::new(placement).unwrap().world_bounds();
        assert_relative_eq!(bounds.min.x, 0.0);
        assert_relative_eq!(bounds.max.z, 4.0);
    }
}
