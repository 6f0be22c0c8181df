use anyhow::{bail, Context, Result};

use crate::renderer::mesh::{Submesh, SubmeshBinding, VertexBufferLayout};
use crate::renderer::pipeline_builder::PipelineBuilder;
use crate::renderer::program::{Program, ProgramRole, ShaderAttribute};
use crate::scene::Handle;

/// Lighting accumulation adds each light's contribution on top of the
/// previous ones (`SrcAlpha`, `One`).
pub const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Everything pipeline construction needs besides the submesh and program.
pub struct BindingEnv<'a> {
    pub device: &'a wgpu::Device,
    pub geometry_layout: &'a wgpu::PipelineLayout,
    pub lighting_layout: &'a wgpu::PipelineLayout,
    pub blit_layout: &'a wgpu::PipelineLayout,
    pub gbuffer_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    pub surface_format: wgpu::TextureFormat,
}

pub fn vertex_format(components: u32) -> Result<wgpu::VertexFormat> {
    Ok(match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        4 => wgpu::VertexFormat::Float32x4,
        other => bail!("unsupported component count {other}"),
    })
}

/// Walks the program's declared inputs and resolves each against the
/// submesh layout by location. Every declared location must be satisfied;
/// a miss is a mesh/program pairing bug, not a skippable attribute.
pub fn resolve_attributes(
    inputs: &[ShaderAttribute],
    layout: &VertexBufferLayout,
) -> Result<Vec<wgpu::VertexAttribute>> {
    let mut resolved = Vec::with_capacity(inputs.len());
    for input in inputs {
        let attr = layout
            .attributes
            .iter()
            .find(|a| a.location == input.location)
            .with_context(|| {
                format!(
                    "shader attribute at location {} has no match in the vertex layout",
                    input.location
                )
            })?;
        resolved.push(wgpu::VertexAttribute {
            format: vertex_format(attr.components)?,
            offset: attr.offset as u64,
            shader_location: attr.location,
        });
    }
    Ok(resolved)
}

/// Returns the index of the binding for (submesh, program), building and
/// caching it on a miss. Bindings are appended and never evicted; lookup is
/// a linear scan, intentionally, given the handful of programs per mesh.
pub fn find_or_build_binding(
    env: &BindingEnv<'_>,
    submesh: &mut Submesh,
    handle: Handle<Program>,
    program: &Program,
) -> Result<usize> {
    if let Some(index) = submesh.find_binding(handle) {
        return Ok(index);
    }

    let attributes = resolve_attributes(&program.vertex_inputs, &submesh.layout)
        .with_context(|| format!("building vertex binding for program {:?}", program.name))?;
    let pipeline = build_pipeline(env, program, &attributes, submesh.layout.stride);

    submesh.bindings.push(SubmeshBinding {
        program: handle,
        pipeline,
    });
    Ok(submesh.bindings.len() - 1)
}

fn build_pipeline(
    env: &BindingEnv<'_>,
    program: &Program,
    attributes: &[wgpu::VertexAttribute],
    stride: u32,
) -> wgpu::RenderPipeline {
    let vertex_layout = wgpu::VertexBufferLayout {
        array_stride: stride as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    };

    match program.role {
        ProgramRole::Geometry => {
            PipelineBuilder::new(env.device, env.geometry_layout, &program.module)
                .with_label(&program.name)
                .with_vertex_buffer(vertex_layout)
                .with_color_target(env.gbuffer_format, Some(wgpu::BlendState::ALPHA_BLENDING))
                .with_color_target(env.gbuffer_format, Some(wgpu::BlendState::ALPHA_BLENDING))
                .with_color_target(env.gbuffer_format, Some(wgpu::BlendState::ALPHA_BLENDING))
                .with_color_target(env.gbuffer_format, Some(wgpu::BlendState::ALPHA_BLENDING))
                .with_depth_stencil(env.depth_format, true, wgpu::CompareFunction::LessEqual)
                .build()
        }
        ProgramRole::DirectionalLight | ProgramRole::PointLight => {
            PipelineBuilder::new(env.device, env.lighting_layout, &program.module)
                .with_label(&program.name)
                .with_vertex_buffer(vertex_layout)
                .with_color_target(env.surface_format, Some(ADDITIVE_BLENDING))
                .with_no_culling()
                .build()
        }
        ProgramRole::Blit => PipelineBuilder::new(env.device, env.blit_layout, &program.module)
            .with_label(&program.name)
            .with_vertex_buffer(vertex_layout)
            .with_color_target(env.surface_format, Some(wgpu::BlendState::REPLACE))
            .with_no_culling()
            .build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::mesh::VertexBufferAttribute;

    fn layout_012() -> VertexBufferLayout {
        VertexBufferLayout {
            attributes: vec![
                VertexBufferAttribute {
                    location: 0,
                    components: 3,
                    offset: 0,
                },
                VertexBufferAttribute {
                    location: 1,
                    components: 3,
                    offset: 12,
                },
                VertexBufferAttribute {
                    location: 2,
                    components: 2,
                    offset: 24,
                },
            ],
            stride: 32,
        }
    }

    fn inputs(locations: &[u32]) -> Vec<ShaderAttribute> {
        locations
            .iter()
            .map(|&location| ShaderAttribute {
                location,
                components: if location == 2 { 2 } else { 3 },
            })
            .collect()
    }

    #[test]
    fn resolves_matching_locations_with_layout_offsets() {
        let resolved = resolve_attributes(&inputs(&[0, 1, 2]), &layout_012()).unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].offset, 0);
        assert_eq!(resolved[1].offset, 12);
        assert_eq!(resolved[2].offset, 24);
        assert_eq!(resolved[1].shader_location, 1);
        assert_eq!(resolved[2].format, wgpu::VertexFormat::Float32x2);
    }

    #[test]
    fn missing_location_is_an_error_naming_it() {
        let err = resolve_attributes(&inputs(&[0, 3]), &layout_012()).unwrap_err();
        assert!(err.to_string().contains("location 3"), "{err}");
    }

    #[test]
    fn shader_may_use_a_subset_of_the_layout() {
        let resolved = resolve_attributes(&inputs(&[0]), &layout_012()).unwrap();
        assert_eq!(resolved.len(), 1);
    }
}
