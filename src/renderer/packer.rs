use glam::{Mat4, Vec2, Vec3};

use crate::renderer::linear::LinearWriter;
use crate::renderer::material::{Material, MaterialFeatures};
use crate::scene::{Entity, Light, LightKind, Model, Pool};

/// Frame-start inputs the packer serializes into the global block.
pub struct FrameGlobals {
    pub camera_position: Vec3,
    pub viewport: Vec2,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    pub view_proj: Mat4,
}

pub struct PackedFrame {
    /// Byte length of the global block, starting at offset 0. This is the
    /// binding range for the pass-global uniform slot.
    pub globals_size: u32,
}

/// Serializes the frame's uniform data: the global block first, then one
/// block per entity and per light in registry order. Each block starts on a
/// multiple of `alignment` (the device's minimum uniform-offset alignment)
/// and its range is recorded back onto the entity/light for the draw passes
/// to bind. Runs exactly once per frame, strictly before any draw call.
pub fn pack_frame(
    writer: &mut LinearWriter,
    alignment: u32,
    globals: &FrameGlobals,
    entities: &mut [Entity],
    lights: &mut [Light],
    models: &Pool<Model>,
    materials: &Pool<Material>,
) -> PackedFrame {
    writer.push_vec3(globals.camera_position);
    writer.push_vec3(Vec3::new(
        globals.viewport.x,
        globals.viewport.y,
        globals.aspect_ratio,
    ));
    writer.push_f32(globals.near);
    writer.push_f32(globals.far);
    let globals_size = writer.head();

    for entity in entities.iter_mut() {
        writer.align_to(alignment);
        entity.uniform_offset = writer.head();

        let model_matrix = entity.transform();
        writer.push_mat4(model_matrix);
        writer.push_mat4(globals.view_proj * model_matrix);

        let features = entity_features(models, materials, entity);
        writer.push_u32(features.contains(MaterialFeatures::NORMAL_MAP) as u32);
        writer.push_u32(features.contains(MaterialFeatures::RELIEF_MAP) as u32);

        entity.uniform_size = writer.head() - entity.uniform_offset;
    }

    for light in lights.iter_mut() {
        writer.align_to(alignment);
        light.uniform_offset = writer.head();

        writer.push_vec3(light.color);
        match light.kind {
            LightKind::Directional { direction } => {
                writer.push_vec3(direction.normalize_or_zero());
            }
            LightKind::Point { center, range } => {
                writer.push_vec3(center);
                writer.push_f32(range);
                let volume = light.volume_transform();
                writer.push_mat4(volume);
                writer.push_mat4(globals.view_proj * volume);
            }
        }

        light.uniform_size = writer.head() - light.uniform_offset;
    }

    PackedFrame { globals_size }
}

/// Union of the feature flags across the entity's submesh materials.
fn entity_features(
    models: &Pool<Model>,
    materials: &Pool<Material>,
    entity: &Entity,
) -> MaterialFeatures {
    let Some(model) = models.get(entity.model) else {
        return MaterialFeatures::empty();
    };
    model
        .materials
        .iter()
        .filter_map(|&handle| materials.get(handle))
        .fold(MaterialFeatures::empty(), |acc, material| {
            acc | material.features()
        })
}
