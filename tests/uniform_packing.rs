//! Frame uniform packing layout tests.
//!
//! Conventions used in this codebase:
//! - One linear write pass per frame: globals first, then one block per
//!   entity and per light, in registry order.
//! - Every block after the globals starts on a multiple of the device's
//!   uniform offset alignment (256 here, the common desktop value).
//! - Scalars pack with 4-byte alignment, vec3/vec4/mat4 with 16-byte.

use glam::{Mat4, Vec2, Vec3};
use wgpu_deferred::renderer::linear::LinearWriter;
use wgpu_deferred::renderer::material::Material;
use wgpu_deferred::renderer::packer::{pack_frame, FrameGlobals};
use wgpu_deferred::scene::{Entity, Handle, Light, Model, Pool};

const ALIGNMENT: u32 = 256;

fn test_globals() -> FrameGlobals {
    FrameGlobals {
        camera_position: Vec3::new(1.0, 2.0, 3.0),
        viewport: Vec2::new(1280.0, 720.0),
        aspect_ratio: 1280.0 / 720.0,
        near: 0.1,
        far: 1000.0,
        view_proj: Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 1000.0)
            * Mat4::look_at_rh(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y),
    }
}

fn test_registry() -> (Pool<Model>, Pool<Material>) {
    let mut materials = Pool::new();
    let material = materials.insert(Material::plain("Plain"));
    let mut models = Pool::new();
    models.insert(Model {
        mesh: Handle::new(0),
        materials: vec![material],
    });
    (models, materials)
}

fn test_entity(position: Vec3) -> Entity {
    Entity::new(
        Handle::new(0),
        Handle::new(0),
        position,
        Vec3::ONE,
        Vec3::ZERO,
    )
}

#[test]
fn globals_block_is_36_bytes_at_offset_zero() {
    let mut writer = LinearWriter::new(65536);
    let (models, materials) = test_registry();
    let packed = pack_frame(
        &mut writer,
        ALIGNMENT,
        &test_globals(),
        &mut [],
        &mut [],
        &models,
        &materials,
    );
    // vec3 (12) + pad (4) + vec3 (12) + f32 + f32
    assert_eq!(packed.globals_size, 36);
    assert_eq!(writer.head(), 36);

    let floats: &[f32] = bytemuck::cast_slice(&writer.bytes()[0..36]);
    assert_eq!(&floats[0..3], &[1.0, 2.0, 3.0]);
    assert_eq!(&floats[4..7], &[1280.0, 720.0, 1280.0 / 720.0]);
    assert_eq!(floats[7], 0.1);
    assert_eq!(floats[8], 1000.0);
}

#[test]
fn entity_blocks_start_aligned_and_span_136_bytes() {
    let mut writer = LinearWriter::new(65536);
    let (models, materials) = test_registry();
    let mut entities = vec![
        test_entity(Vec3::new(4.0, 0.0, 0.0)),
        test_entity(Vec3::new(0.0, 4.0, 0.0)),
    ];
    pack_frame(
        &mut writer,
        ALIGNMENT,
        &test_globals(),
        &mut entities,
        &mut [],
        &models,
        &materials,
    );

    // First block lands on the first alignment boundary after the globals.
    assert_eq!(entities[0].uniform_offset, 256);
    // mat4 + mat4 + 2 u32 flags
    assert_eq!(entities[0].uniform_size, 136);
    assert_eq!(entities[1].uniform_offset, 512);
    assert_eq!(entities[1].uniform_size, 136);
}

#[test]
fn entity_block_holds_model_then_mvp_then_flags() {
    let mut writer = LinearWriter::new(65536);
    let (models, materials) = test_registry();
    let globals = test_globals();
    let mut entities = vec![test_entity(Vec3::new(4.0, -1.0, 2.0))];
    pack_frame(
        &mut writer,
        ALIGNMENT,
        &globals,
        &mut entities,
        &mut [],
        &models,
        &materials,
    );

    let base = entities[0].uniform_offset as usize;
    let model_matrix = entities[0].transform();

    let stored_model: &[f32] = bytemuck::cast_slice(&writer.bytes()[base..base + 64]);
    assert_eq!(stored_model, &model_matrix.to_cols_array());

    let stored_mvp: &[f32] = bytemuck::cast_slice(&writer.bytes()[base + 64..base + 128]);
    assert_eq!(stored_mvp, &(globals.view_proj * model_matrix).to_cols_array());

    // No texture slots on the plain material, both feature flags off.
    let flags: &[u32] = bytemuck::cast_slice(&writer.bytes()[base + 128..base + 136]);
    assert_eq!(flags, &[0, 0]);
}

#[test]
fn light_blocks_follow_entities_with_variant_sizes() {
    let mut writer = LinearWriter::new(65536);
    let (models, materials) = test_registry();
    let mut entities = vec![
        test_entity(Vec3::ZERO),
        test_entity(Vec3::new(1.0, 0.0, 0.0)),
    ];
    let mut lights = vec![
        Light::directional(Vec3::ONE, Vec3::new(0.0, -1.0, 0.0)),
        Light::point(Vec3::new(1.0, 0.5, 0.2), Vec3::new(2.0, 3.0, 4.0), 12.0),
    ];
    pack_frame(
        &mut writer,
        ALIGNMENT,
        &test_globals(),
        &mut entities,
        &mut lights,
        &models,
        &materials,
    );

    // color vec3 + direction vec3
    assert_eq!(lights[0].uniform_offset, 768);
    assert_eq!(lights[0].uniform_size, 28);
    // color vec3 + center vec3 + range + volume mat4 + volume mvp mat4
    assert_eq!(lights[1].uniform_offset, 1024);
    assert_eq!(lights[1].uniform_size, 160);
}

#[test]
fn point_light_block_carries_volume_and_volume_mvp() {
    let mut writer = LinearWriter::new(65536);
    let (models, materials) = test_registry();
    let globals = test_globals();
    let center = Vec3::new(-3.0, 1.0, 5.0);
    let range = 9.0;
    let mut lights = vec![Light::point(Vec3::ONE, center, range)];
    pack_frame(
        &mut writer,
        ALIGNMENT,
        &globals,
        &mut [],
        &mut lights,
        &models,
        &materials,
    );

    let base = lights[0].uniform_offset as usize;
    let floats: &[f32] = bytemuck::cast_slice(&writer.bytes()[base..base + 160]);
    assert_eq!(&floats[0..3], &[1.0, 1.0, 1.0]);
    assert_eq!(&floats[4..7], &center.to_array());
    assert_eq!(floats[7], range);

    let volume = Mat4::from_translation(center) * Mat4::from_scale(Vec3::splat(range));
    assert_eq!(&floats[8..24], &volume.to_cols_array());
    assert_eq!(&floats[24..40], &(globals.view_proj * volume).to_cols_array());
}

#[test]
fn blocks_never_overlap() {
    let mut writer = LinearWriter::new(65536);
    let (models, materials) = test_registry();
    let mut entities: Vec<Entity> = (0..10)
        .map(|i| test_entity(Vec3::new(i as f32, 0.0, 0.0)))
        .collect();
    let mut lights = vec![
        Light::point(Vec3::ONE, Vec3::ZERO, 5.0),
        Light::directional(Vec3::ONE, Vec3::NEG_Y),
        Light::point(Vec3::ONE, Vec3::X, 3.0),
    ];
    pack_frame(
        &mut writer,
        ALIGNMENT,
        &test_globals(),
        &mut entities,
        &mut lights,
        &models,
        &materials,
    );

    let mut ranges: Vec<(u32, u32)> = vec![(0, 36)];
    ranges.extend(entities.iter().map(|e| (e.uniform_offset, e.uniform_size)));
    ranges.extend(lights.iter().map(|l| (l.uniform_offset, l.uniform_size)));

    for window in ranges.windows(2) {
        let (offset_a, size_a) = window[0];
        let (offset_b, _) = window[1];
        assert!(offset_a + size_a <= offset_b, "{window:?} overlaps");
        assert_eq!(offset_b % ALIGNMENT, 0);
    }
}

#[test]
fn repacking_a_frame_reuses_the_buffer_from_the_start() {
    let mut writer = LinearWriter::new(65536);
    let (models, materials) = test_registry();
    let mut entities = vec![test_entity(Vec3::ZERO)];

    pack_frame(
        &mut writer,
        ALIGNMENT,
        &test_globals(),
        &mut entities,
        &mut [],
        &models,
        &materials,
    );
    let first_head = writer.head();

    writer.reset();
    pack_frame(
        &mut writer,
        ALIGNMENT,
        &test_globals(),
        &mut entities,
        &mut [],
        &models,
        &materials,
    );
    assert_eq!(writer.head(), first_head);
    assert_eq!(entities[0].uniform_offset, 256);
}
