use bitflags::bitflags;
use glam::Vec3;

use crate::renderer::texture::Texture;
use crate::scene::Handle;

bitflags! {
    /// Shading features a material enables; packed into the per-entity
    /// uniform block as 0/1 words for the geometry shader.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MaterialFeatures: u32 {
        const NORMAL_MAP = 1 << 0;
        const RELIEF_MAP = 1 << 1;
    }
}

/// Surface description. Texture slots are optional; an absent slot falls
/// back to the flat-white default at draw time, which is the common case.
pub struct Material {
    pub name: String,
    pub albedo: Vec3,
    pub emissive: Vec3,
    pub smoothness: f32,
    pub albedo_texture: Option<Handle<Texture>>,
    pub emissive_texture: Option<Handle<Texture>>,
    pub specular_texture: Option<Handle<Texture>>,
    pub normals_texture: Option<Handle<Texture>>,
    pub bump_texture: Option<Handle<Texture>>,
}

impl Material {
    pub fn plain(name: &str) -> Self {
        Self {
            name: name.to_string(),
            albedo: Vec3::ONE,
            emissive: Vec3::ZERO,
            smoothness: 0.0,
            albedo_texture: None,
            emissive_texture: None,
            specular_texture: None,
            normals_texture: None,
            bump_texture: None,
        }
    }

    pub fn features(&self) -> MaterialFeatures {
        let mut features = MaterialFeatures::empty();
        if self.normals_texture.is_some() {
            features |= MaterialFeatures::NORMAL_MAP;
        }
        if self.bump_texture.is_some() {
            features |= MaterialFeatures::RELIEF_MAP;
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_follow_texture_slots() {
        let mut material = Material::plain("test");
        assert_eq!(material.features(), MaterialFeatures::empty());

        material.normals_texture = Some(Handle::new(0));
        assert_eq!(material.features(), MaterialFeatures::NORMAL_MAP);

        material.bump_texture = Some(Handle::new(1));
        assert!(material.features().contains(MaterialFeatures::RELIEF_MAP));
    }
}
