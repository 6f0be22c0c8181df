use std::collections::HashMap;
use std::num::NonZeroU64;

use anyhow::{Context, Result};
use glam::Vec2;
use winit::dpi::PhysicalSize;

use crate::renderer::binding::{self, BindingEnv};
use crate::renderer::context::RenderContext;
use crate::renderer::display::{plan_lighting, LightVolume, LightingPlan};
use crate::renderer::gbuffer::{GBuffer, GBufferChannel, DEPTH_FORMAT, GBUFFER_FORMAT};
use crate::renderer::linear::LinearBuffer;
use crate::renderer::material::Material;
use crate::renderer::mesh::{Mesh, Submesh};
use crate::renderer::packer::{pack_frame, FrameGlobals};
use crate::renderer::program::Program;
use crate::renderer::texture::Texture;
use crate::scene::{Handle, Pool, Scene};

// Binding ranges as the shaders declare them. The packed blocks are
// smaller (36, 136 and at most 160 bytes); the bound range is the shader
// struct size, rounded up to 16.
pub const GLOBALS_BINDING_SIZE: u64 = 48;
pub const ENTITY_BINDING_SIZE: u64 = 144;
pub const LIGHT_BINDING_SIZE: u64 = 160;

/// The deferred renderer: geometry pass into the G-buffer, then either
/// additive light accumulation or a raw-attachment blit onto the surface.
pub struct DeferredRenderer {
    gbuffer: GBuffer,
    uniforms: LinearBuffer,

    material_layout: wgpu::BindGroupLayout,
    gbuffer_layout: wgpu::BindGroupLayout,
    blit_layout: wgpu::BindGroupLayout,

    geometry_pipeline_layout: wgpu::PipelineLayout,
    lighting_pipeline_layout: wgpu::PipelineLayout,
    blit_pipeline_layout: wgpu::PipelineLayout,

    frame_group: wgpu::BindGroup,
    entity_group: wgpu::BindGroup,
    light_group: wgpu::BindGroup,
    gbuffer_group: wgpu::BindGroup,
    blit_groups: Vec<(GBufferChannel, wgpu::BindGroup)>,
    material_groups: HashMap<usize, wgpu::BindGroup>,

    material_sampler: wgpu::Sampler,
    gbuffer_sampler: wgpu::Sampler,
}

impl DeferredRenderer {
    pub fn new(ctx: &RenderContext) -> Result<Self> {
        let device = &ctx.device;
        let gbuffer = GBuffer::new(device, ctx.config.width, ctx.config.height)?;
        let uniforms = LinearBuffer::new(device, ctx.max_uniform_buffer_size);

        let frame_layout = uniform_layout(device, "FrameLayout", GLOBALS_BINDING_SIZE, false);
        let entity_layout = uniform_layout(device, "EntityLayout", ENTITY_BINDING_SIZE, true);
        let light_layout = uniform_layout(device, "LightLayout", LIGHT_BINDING_SIZE, true);
        let material_layout = Self::material_layout(device);
        let gbuffer_layout = Self::gbuffer_layout(device);
        let blit_layout = Self::blit_layout(device);

        let geometry_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("GeometryPipelineLayout"),
                bind_group_layouts: &[&frame_layout, &entity_layout, &material_layout],
                push_constant_ranges: &[],
            });
        let lighting_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("LightingPipelineLayout"),
                bind_group_layouts: &[&frame_layout, &gbuffer_layout, &light_layout],
                push_constant_ranges: &[],
            });
        let blit_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("BlitPipelineLayout"),
                bind_group_layouts: &[&blit_layout],
                push_constant_ranges: &[],
            });

        let frame_group = uniform_group(
            device,
            "FrameGroup",
            &frame_layout,
            uniforms.buffer(),
            GLOBALS_BINDING_SIZE,
        );
        let entity_group = uniform_group(
            device,
            "EntityGroup",
            &entity_layout,
            uniforms.buffer(),
            ENTITY_BINDING_SIZE,
        );
        let light_group = uniform_group(
            device,
            "LightGroup",
            &light_layout,
            uniforms.buffer(),
            LIGHT_BINDING_SIZE,
        );

        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("MaterialSampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let gbuffer_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("GBufferSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let gbuffer_group =
            Self::build_gbuffer_group(device, &gbuffer_layout, &gbuffer, &gbuffer_sampler);
        let blit_groups =
            Self::build_blit_groups(device, &blit_layout, &gbuffer, &gbuffer_sampler);

        Ok(Self {
            gbuffer,
            uniforms,
            material_layout,
            gbuffer_layout,
            blit_layout,
            geometry_pipeline_layout,
            lighting_pipeline_layout,
            blit_pipeline_layout,
            frame_group,
            entity_group,
            light_group,
            gbuffer_group,
            blit_groups,
            material_groups: HashMap::new(),
            material_sampler,
            gbuffer_sampler,
        })
    }

    fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let texture = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("MaterialLayout"),
            entries: &[
                texture(0), // albedo
                texture(1), // emissive
                texture(2), // specular
                texture(3), // normals
                texture(4), // bump
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    fn gbuffer_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let texture = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GBufferLayout"),
            entries: &[
                texture(0), // albedo
                texture(1), // normals
                texture(2), // positions
                texture(3), // view depth
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    fn blit_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("BlitLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    fn build_gbuffer_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        gbuffer: &GBuffer,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GBufferGroup"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&gbuffer.albedo),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&gbuffer.normals),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&gbuffer.positions),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&gbuffer.depth),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn build_blit_groups(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        gbuffer: &GBuffer,
        sampler: &wgpu::Sampler,
    ) -> Vec<(GBufferChannel, wgpu::BindGroup)> {
        crate::renderer::gbuffer::GBUFFER_CHANNELS
            .iter()
            .map(|&channel| {
                let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("BlitGroup"),
                    layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(
                                gbuffer.channel_view(channel),
                            ),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                    ],
                });
                (channel, group)
            })
            .collect()
    }

    /// Recreates the G-buffer and every bind group that references its
    /// attachment views.
    pub fn resize(&mut self, ctx: &RenderContext) -> Result<()> {
        self.gbuffer = GBuffer::new(&ctx.device, ctx.config.width, ctx.config.height)?;
        self.gbuffer_group = Self::build_gbuffer_group(
            &ctx.device,
            &self.gbuffer_layout,
            &self.gbuffer,
            &self.gbuffer_sampler,
        );
        self.blit_groups = Self::build_blit_groups(
            &ctx.device,
            &self.blit_layout,
            &self.gbuffer,
            &self.gbuffer_sampler,
        );
        Ok(())
    }

    pub fn render(&mut self, ctx: &mut RenderContext, scene: &mut Scene) -> Result<()> {
        let size = PhysicalSize::new(ctx.config.width, ctx.config.height);
        let aspect = size.width as f32 / size.height.max(1) as f32;

        let globals = FrameGlobals {
            camera_position: scene.camera.position(),
            viewport: Vec2::new(size.width as f32, size.height as f32),
            aspect_ratio: aspect,
            near: scene.camera.near,
            far: scene.camera.far,
            view_proj: scene.camera.view_proj(aspect),
        };

        // Single uniform write pass, strictly before any draw below.
        let writer = self.uniforms.begin_write();
        pack_frame(
            writer,
            ctx.uniform_offset_alignment,
            &globals,
            &mut scene.entities,
            &mut scene.lights,
            &scene.models,
            &scene.materials,
        );
        self.uniforms.end_write(&ctx.queue);

        self.ensure_bindings(ctx, scene)?;
        self.ensure_material_groups(&ctx.device, scene);

        let frame = match ctx.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                ctx.surface.configure(&ctx.device, &ctx.config);
                return Ok(());
            }
            Err(err) => return Err(err).context("acquiring surface frame"),
        };
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("FrameEncoder"),
            });

        self.geometry_pass(&mut encoder, scene);
        let plan = plan_lighting(scene.display_mode, &scene.lights);
        self.lighting_pass(&mut encoder, scene, &surface_view, &plan)?;

        ctx.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Walks every (submesh, program) pair the frame will draw and makes
    /// sure its pipeline is in the binding cache.
    fn ensure_bindings(&self, ctx: &RenderContext, scene: &mut Scene) -> Result<()> {
        let env = BindingEnv {
            device: &ctx.device,
            geometry_layout: &self.geometry_pipeline_layout,
            lighting_layout: &self.lighting_pipeline_layout,
            blit_layout: &self.blit_pipeline_layout,
            gbuffer_format: GBUFFER_FORMAT,
            depth_format: DEPTH_FORMAT,
            surface_format: ctx.config.format,
        };

        let Scene {
            ref mut meshes,
            ref models,
            ref programs,
            ref entities,
            ref builtins,
            ..
        } = *scene;

        for entity in entities {
            let model = models
                .get(entity.model)
                .context("entity references a missing model")?;
            ensure_mesh_binding(&env, meshes, programs, model.mesh, entity.program)?;
        }

        ensure_mesh_binding(
            &env,
            meshes,
            programs,
            builtins.screen_quad,
            builtins.directional_program,
        )?;
        ensure_mesh_binding(
            &env,
            meshes,
            programs,
            builtins.screen_quad,
            builtins.blit_program,
        )?;
        ensure_mesh_binding(
            &env,
            meshes,
            programs,
            builtins.light_sphere,
            builtins.point_program,
        )?;
        Ok(())
    }

    /// Bind groups for every material the frame's entities reference.
    /// Cached per material handle; materials are immutable once inserted.
    fn ensure_material_groups(&mut self, device: &wgpu::Device, scene: &Scene) {
        let mut wanted: Vec<Handle<Material>> = vec![scene.builtins.default_material];
        for entity in &scene.entities {
            if let Some(model) = scene.models.get(entity.model) {
                let submeshes = scene
                    .meshes
                    .get(model.mesh)
                    .map(|mesh| mesh.submeshes.len())
                    .unwrap_or(0);
                for index in 0..submeshes {
                    wanted.push(scene.submesh_material(model, index));
                }
            }
        }

        for handle in wanted {
            if self.material_groups.contains_key(&handle.index()) {
                continue;
            }
            let Some(material) = scene.materials.get(handle) else {
                continue;
            };
            let fallback = |handle: Handle<Texture>| scene.textures.get(handle).map(|t| &t.view);
            let (Some(white), Some(black)) = (
                fallback(scene.builtins.white_texture),
                fallback(scene.builtins.black_texture),
            ) else {
                continue;
            };
            let slot = |slot: Option<Handle<Texture>>, default| {
                slot.and_then(|h| scene.textures.get(h))
                    .map(|t| &t.view)
                    .unwrap_or(default)
            };
            let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&material.name),
                layout: &self.material_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(slot(
                            material.albedo_texture,
                            white,
                        )),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(slot(
                            material.emissive_texture,
                            black,
                        )),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(slot(
                            material.specular_texture,
                            white,
                        )),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(slot(
                            material.normals_texture,
                            white,
                        )),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(slot(
                            material.bump_texture,
                            white,
                        )),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::Sampler(&self.material_sampler),
                    },
                ],
            });
            self.material_groups.insert(handle.index(), group);
        }
    }

    fn geometry_pass(&self, encoder: &mut wgpu::CommandEncoder, scene: &Scene) {
        let clear = |view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("GeometryPass"),
            color_attachments: &[
                clear(&self.gbuffer.albedo),
                clear(&self.gbuffer.normals),
                clear(&self.gbuffer.positions),
                clear(&self.gbuffer.depth),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.gbuffer.depth_stencil,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_bind_group(0, &self.frame_group, &[]);

        for entity in &scene.entities {
            let Some(model) = scene.models.get(entity.model) else {
                continue;
            };
            let Some(mesh) = scene.meshes.get(model.mesh) else {
                continue;
            };

            pass.set_bind_group(1, &self.entity_group, &[entity.uniform_offset]);

            for (index, submesh) in mesh.submeshes.iter().enumerate() {
                let Some(binding) = submesh.find_binding(entity.program) else {
                    continue;
                };
                let material = scene.submesh_material(model, index);
                let Some(material_group) = self.material_groups.get(&material.index()) else {
                    continue;
                };

                pass.set_pipeline(&submesh.bindings[binding].pipeline);
                pass.set_bind_group(2, material_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(submesh.vertex_offset..));
                pass.set_index_buffer(
                    mesh.index_buffer.slice(submesh.index_offset..),
                    wgpu::IndexFormat::Uint32,
                );
                pass.draw_indexed(0..submesh.index_count, 0, 0..1);
            }
        }
    }

    fn lighting_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        surface_view: &wgpu::TextureView,
        plan: &LightingPlan,
    ) -> Result<()> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("LightingPass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: surface_view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let quad = scene
            .meshes
            .get(scene.builtins.screen_quad)
            .context("screen quad mesh missing")?;
        let quad_submesh = &quad.submeshes[0];

        if let Some(channel) = plan.blit {
            let binding = quad_submesh
                .find_binding(scene.builtins.blit_program)
                .context("blit pipeline missing from the binding cache")?;
            let group = self
                .blit_groups
                .iter()
                .find(|(c, _)| *c == channel)
                .map(|(_, g)| g)
                .context("blit bind group missing")?;

            pass.set_pipeline(&quad_submesh.bindings[binding].pipeline);
            pass.set_bind_group(0, group, &[]);
            draw_submesh(&mut pass, quad, quad_submesh);
            return Ok(());
        }

        pass.set_bind_group(0, &self.frame_group, &[]);
        pass.set_bind_group(1, &self.gbuffer_group, &[]);

        let sphere = scene
            .meshes
            .get(scene.builtins.light_sphere)
            .context("light sphere mesh missing")?;
        let sphere_submesh = &sphere.submeshes[0];

        for draw in &plan.draws {
            let light = &scene.lights[draw.light_index];
            let (mesh, submesh, program) = match draw.volume {
                LightVolume::ScreenQuad => {
                    (quad, quad_submesh, scene.builtins.directional_program)
                }
                LightVolume::Sphere => (sphere, sphere_submesh, scene.builtins.point_program),
            };
            let binding = submesh
                .find_binding(program)
                .context("light pipeline missing from the binding cache")?;

            pass.set_pipeline(&submesh.bindings[binding].pipeline);
            pass.set_bind_group(2, &self.light_group, &[light.uniform_offset]);
            draw_submesh(&mut pass, mesh, submesh);
        }

        Ok(())
    }
}

fn draw_submesh(pass: &mut wgpu::RenderPass<'_>, mesh: &Mesh, submesh: &Submesh) {
    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(submesh.vertex_offset..));
    pass.set_index_buffer(
        mesh.index_buffer.slice(submesh.index_offset..),
        wgpu::IndexFormat::Uint32,
    );
    pass.draw_indexed(0..submesh.index_count, 0, 0..1);
}

fn ensure_mesh_binding(
    env: &BindingEnv<'_>,
    meshes: &mut Pool<Mesh>,
    programs: &Pool<Program>,
    mesh: Handle<Mesh>,
    program_handle: Handle<Program>,
) -> Result<()> {
    let program = programs
        .get(program_handle)
        .context("missing program for binding")?;
    let mesh = meshes.get_mut(mesh).context("missing mesh for binding")?;
    for submesh in &mut mesh.submeshes {
        binding::find_or_build_binding(env, submesh, program_handle, program)?;
    }
    Ok(())
}

fn uniform_layout(
    device: &wgpu::Device,
    label: &str,
    size: u64,
    dynamic: bool,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: dynamic,
                min_binding_size: NonZeroU64::new(size),
            },
            count: None,
        }],
    })
}

fn uniform_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    size: u64,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(size),
            }),
        }],
    })
}
