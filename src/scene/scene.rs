use anyhow::Result;
use glam::Vec3;

use crate::renderer::display::DisplayMode;
use crate::renderer::material::Material;
use crate::renderer::mesh::Mesh;
use crate::renderer::primitives;
use crate::renderer::program::{
    self, Program, ProgramRole, BLIT_SHADER, DIRECTIONAL_LIGHT_SHADER, GEOMETRY_SHADER,
    POINT_LIGHT_SHADER,
};
use crate::renderer::texture::Texture;
use crate::scene::{Camera, Entity, Handle, Light, LightKind, Model, Pool};

/// Handles to the resources every scene carries: the built-in programs,
/// the lighting-pass geometry and the fallback texture/material.
pub struct Builtins {
    pub geometry_program: Handle<Program>,
    pub directional_program: Handle<Program>,
    pub point_program: Handle<Program>,
    pub blit_program: Handle<Program>,
    pub screen_quad: Handle<Mesh>,
    pub light_sphere: Handle<Mesh>,
    pub white_texture: Handle<Texture>,
    pub black_texture: Handle<Texture>,
    pub default_material: Handle<Material>,
}

/// Everything drawable plus the camera and display mode. All resource
/// pools are append-only; handles never dangle within a run.
pub struct Scene {
    pub textures: Pool<Texture>,
    pub materials: Pool<Material>,
    pub meshes: Pool<Mesh>,
    pub models: Pool<Model>,
    pub programs: Pool<Program>,
    pub entities: Vec<Entity>,
    pub lights: Vec<Light>,
    pub camera: Camera,
    pub display_mode: DisplayMode,
    pub builtins: Builtins,
    time: f32,
}

impl Scene {
    /// Empty scene with the built-in resources registered.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Self> {
        let mut textures = Pool::new();
        let mut materials = Pool::new();
        let mut meshes = Pool::new();
        let mut programs = Pool::new();

        let geometry_program = programs.insert(Program::new(
            device,
            "Geometry",
            GEOMETRY_SHADER,
            program::geometry_inputs(),
            ProgramRole::Geometry,
        ));
        let directional_program = programs.insert(Program::new(
            device,
            "DirectionalLight",
            DIRECTIONAL_LIGHT_SHADER,
            program::screen_quad_inputs(),
            ProgramRole::DirectionalLight,
        ));
        let point_program = programs.insert(Program::new(
            device,
            "PointLight",
            POINT_LIGHT_SHADER,
            program::light_volume_inputs(),
            ProgramRole::PointLight,
        ));
        let blit_program = programs.insert(Program::new(
            device,
            "Blit",
            BLIT_SHADER,
            program::screen_quad_inputs(),
            ProgramRole::Blit,
        ));

        let screen_quad = meshes.insert(Mesh::new(
            device,
            "ScreenQuad",
            vec![primitives::screen_quad()],
        )?);
        let light_sphere = meshes.insert(Mesh::new(
            device,
            "LightSphere",
            vec![primitives::light_sphere()],
        )?);

        let white_texture = textures.insert(Texture::white(device, queue));
        let black_texture = textures.insert(Texture::black(device, queue));
        let default_material = materials.insert(Material::plain("Default"));

        Ok(Self {
            textures,
            materials,
            meshes,
            models: Pool::new(),
            programs,
            entities: Vec::new(),
            lights: Vec::new(),
            camera: Camera::default(),
            display_mode: DisplayMode::default(),
            builtins: Builtins {
                geometry_program,
                directional_program,
                point_program,
                blit_program,
                screen_quad,
                light_sphere,
                white_texture,
                black_texture,
                default_material,
            },
            time: 0.0,
        })
    }

    /// Demo content: a floor plane, a ring of spheres and a mixed light
    /// rig with an orbiting point light.
    pub fn demo(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Self> {
        let mut scene = Self::new(device, queue)?;

        let mut floor_material = Material::plain("Floor");
        floor_material.albedo = Vec3::new(0.55, 0.55, 0.6);
        floor_material.albedo_texture =
            Some(scene.solid_texture(device, queue, "FloorAlbedo", floor_material.albedo));
        let floor_material = scene.materials.insert(floor_material);

        let floor_mesh =
            scene
                .meshes
                .insert(Mesh::new(device, "Floor", vec![primitives::plane(25.0)])?);
        let floor_model = scene.models.insert(Model {
            mesh: floor_mesh,
            materials: vec![floor_material],
        });
        scene.entities.push(Entity::new(
            floor_model,
            scene.builtins.geometry_program,
            Vec3::new(0.0, -4.0, 0.0),
            Vec3::ONE,
            Vec3::ZERO,
        ));

        let sphere_mesh =
            scene
                .meshes
                .insert(Mesh::new(device, "Sphere", vec![primitives::sphere()])?);
        let palette = [
            Vec3::new(0.9, 0.3, 0.25),
            Vec3::new(0.28, 0.7, 0.35),
            Vec3::new(0.25, 0.45, 0.9),
            Vec3::new(0.9, 0.75, 0.2),
            Vec3::new(0.7, 0.35, 0.85),
        ];
        for (i, albedo) in palette.into_iter().enumerate() {
            let mut material = Material::plain(&format!("Sphere{i}"));
            material.albedo = albedo;
            material.smoothness = 0.2 * i as f32;
            material.albedo_texture =
                Some(scene.solid_texture(device, queue, &format!("Sphere{i}Albedo"), albedo));
            let material = scene.materials.insert(material);
            let model = scene.models.insert(Model {
                mesh: sphere_mesh,
                materials: vec![material],
            });

            let angle = i as f32 / palette.len() as f32 * std::f32::consts::TAU;
            scene.entities.push(Entity::new(
                model,
                scene.builtins.geometry_program,
                Vec3::new(angle.cos() * 7.0, -2.0, angle.sin() * 7.0),
                Vec3::splat(2.0),
                Vec3::ZERO,
            ));
        }

        scene.lights.push(Light::directional(
            Vec3::new(0.25, 0.25, 0.3),
            Vec3::new(-1.0, -1.0, -0.5),
        ));
        scene.lights.push(Light::point(
            Vec3::new(1.0, 0.85, 0.6),
            Vec3::new(0.0, 2.0, 0.0),
            18.0,
        ));
        scene.lights.push(Light::point(
            Vec3::new(0.4, 0.5, 1.0),
            Vec3::new(-9.0, 0.0, -6.0),
            14.0,
        ));

        scene.camera.eye = Vec3::new(0.0, 5.0, 20.0);
        scene.camera.target = Vec3::new(0.0, -1.0, 0.0);

        Ok(scene)
    }

    /// Advances the demo animation: the camera orbits the scene slowly
    /// and the first point light circles the center.
    pub fn update(&mut self, dt: f32) {
        self.time += dt;

        let camera_angle = self.time * 0.1;
        let radius = 20.0;
        self.camera.eye = Vec3::new(
            camera_angle.sin() * radius,
            self.camera.eye.y,
            camera_angle.cos() * radius,
        );

        let light_angle = self.time * 0.6;
        if let Some(light) = self
            .lights
            .iter_mut()
            .find(|l| matches!(l.kind, LightKind::Point { .. }))
        {
            if let LightKind::Point { center, .. } = &mut light.kind {
                center.x = light_angle.cos() * 8.0;
                center.z = light_angle.sin() * 8.0;
            }
        }
    }

    /// A 1x1 texture of `color`, for plain-colored materials. Albedo
    /// always reaches the geometry shader through the texture slot.
    pub fn solid_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        color: Vec3,
    ) -> Handle<Texture> {
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let rgba = [to_byte(color.x), to_byte(color.y), to_byte(color.z), 255];
        self.textures.insert(Texture::from_rgba8(
            device,
            queue,
            &rgba,
            1,
            1,
            Some(label),
        ))
    }

    /// Material for submesh `index` of `model`, falling back to the
    /// default when the model lists fewer materials than submeshes.
    pub fn submesh_material(&self, model: &Model, index: usize) -> Handle<Material> {
        model
            .materials
            .get(index)
            .copied()
            .unwrap_or(self.builtins.default_material)
    }
}
