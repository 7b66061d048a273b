//! Math utilities and types
//!
//! Provides the fundamental math types used by the scene graph.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Local placement of a scene node: position, orientation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position relative to the parent
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Full transformation matrix including scale
    pub fn to_matrix(&self) -> Mat4 {
        self.rigid_matrix() * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Translation and rotation only.
    ///
    /// Scale is carried separately down the hierarchy, so parent-to-child
    /// composition uses this matrix.
    pub fn rigid_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position) * self.rotation.to_homogeneous()
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Point3) -> Point3 {
        self.to_matrix().transform_point(&point)
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_identity_matrix() {
        assert_relative_eq!(Transform::identity().to_matrix(), Mat4::identity(), epsilon = EPSILON);
    }

    #[test]
    fn test_rigid_matrix_ignores_scale() {
        let mut transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        transform.scale = Vec3::new(4.0, 4.0, 4.0);

        let origin = transform.rigid_matrix().transform_point(&Point3::origin());
        assert_relative_eq!(origin, Point3::new(1.0, 2.0, 3.0), epsilon = EPSILON);

        let unit = transform.rigid_matrix().transform_vector(&Vec3::x());
        assert_relative_eq!(unit, Vec3::x(), epsilon = EPSILON);
    }

    #[test]
    fn test_to_matrix_applies_scale_before_rotation() {
        let rotation = Quat::from_axis_angle(&Vec3::z_axis(), constants::HALF_PI);
        let mut transform = Transform::from_position_rotation(Vec3::zeros(), rotation);
        transform.scale = Vec3::new(2.0, 1.0, 1.0);

        let point = transform.transform_point(Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(point, Point3::new(0.0, 2.0, 0.0), epsilon = EPSILON);
    }
}
