use glam::{Mat4, Vec3};

/// Composes translate, then scale, then X/Y/Z euler rotations, matching the
/// order entity transforms are built in throughout the scene.
pub fn compose(position: Vec3, scale: Vec3, rotation: Vec3) -> Mat4 {
    Mat4::from_translation(position)
        * Mat4::from_scale(scale)
        * Mat4::from_rotation_x(rotation.x)
        * Mat4::from_rotation_y(rotation.y)
        * Mat4::from_rotation_z(rotation.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_untransformed() {
        let m = compose(Vec3::ZERO, Vec3::ONE, Vec3::ZERO);
        assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn translation_applies_after_scale() {
        let m = compose(Vec3::new(5.0, 0.0, 0.0), Vec3::splat(2.0), Vec3::ZERO);
        let p = m.transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.abs_diff_eq(Vec3::new(7.0, 0.0, 0.0), 1e-6));
    }
}
