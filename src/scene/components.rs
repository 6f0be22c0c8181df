use glam::{Mat4, Vec3};

use crate::renderer::material::Material;
use crate::renderer::mesh::Mesh;
use crate::renderer::program::Program;
use crate::scene::{transform, Handle};

/// One mesh plus the material applied to each of its submeshes.
/// `materials[i]` applies to submesh `i`; a model with fewer materials than
/// submeshes falls back to the default material for the remainder.
pub struct Model {
    pub mesh: Handle<Mesh>,
    pub materials: Vec<Handle<Material>>,
}

/// A drawable instance of a model. `uniform_offset`/`uniform_size` are not
/// persistent state: the packer rewrites them every frame to say where this
/// entity's block currently lives in the frame uniform buffer.
pub struct Entity {
    pub model: Handle<Model>,
    pub program: Handle<Program>,
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Vec3,
    pub uniform_offset: u32,
    pub uniform_size: u32,
}

impl Entity {
    pub fn new(
        model: Handle<Model>,
        program: Handle<Program>,
        position: Vec3,
        scale: Vec3,
        rotation: Vec3,
    ) -> Self {
        Self {
            model,
            program,
            position,
            scale,
            rotation,
            uniform_offset: 0,
            uniform_size: 0,
        }
    }

    pub fn transform(&self) -> Mat4 {
        transform::compose(self.position, self.scale, self.rotation)
    }
}

/// Variant payload per light type.
#[derive(Clone, Copy, Debug)]
pub enum LightKind {
    Directional { direction: Vec3 },
    Point { center: Vec3, range: f32 },
}

/// A scene light. Carries the same per-frame uniform range cache as
/// [`Entity`].
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub uniform_offset: u32,
    pub uniform_size: u32,
}

impl Light {
    pub fn directional(color: Vec3, direction: Vec3) -> Self {
        Self {
            kind: LightKind::Directional { direction },
            color,
            uniform_offset: 0,
            uniform_size: 0,
        }
    }

    pub fn point(color: Vec3, center: Vec3, range: f32) -> Self {
        Self {
            kind: LightKind::Point { center, range },
            color,
            uniform_offset: 0,
            uniform_size: 0,
        }
    }

    /// Transform placing the unit light-volume sphere at the light's
    /// position, scaled to its range. Identity for directional lights.
    pub fn volume_transform(&self) -> Mat4 {
        match self.kind {
            LightKind::Directional { .. } => Mat4::IDENTITY,
            LightKind::Point { center, range } => {
                Mat4::from_translation(center) * Mat4::from_scale(Vec3::splat(range))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_light_volume_covers_its_range() {
        let light = Light::point(Vec3::ONE, Vec3::new(2.0, 0.0, 0.0), 10.0);
        let m = light.volume_transform();
        let surface = m.transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!(surface.abs_diff_eq(Vec3::new(12.0, 0.0, 0.0), 1e-6));
    }
}
