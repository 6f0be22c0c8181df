use anyhow::{ensure, Result};
use wgpu::util::DeviceExt;

use crate::renderer::program::Program;
use crate::scene::Handle;

/// One vertex attribute as stored in a submesh's vertex region.
/// `offset` is relative to the submesh's own region, not the mesh buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexBufferAttribute {
    pub location: u32,
    pub components: u32,
    pub offset: u32,
}

/// Ordered attribute list plus stride for one submesh's interleaved
/// float vertex data.
#[derive(Clone, Debug, Default)]
pub struct VertexBufferLayout {
    pub attributes: Vec<VertexBufferAttribute>,
    pub stride: u32,
}

impl VertexBufferLayout {
    pub fn validate(&self) -> Result<()> {
        for attr in &self.attributes {
            ensure!(
                (1..=4).contains(&attr.components),
                "attribute at location {} has {} components (expected 1-4)",
                attr.location,
                attr.components
            );
            ensure!(
                attr.offset + attr.components * 4 <= self.stride,
                "attribute at location {} (offset {}, {} components) overruns stride {}",
                attr.location,
                attr.offset,
                attr.components,
                self.stride
            );
        }
        Ok(())
    }
}

/// A pipeline built for one (submesh, program) pair, cached on the submesh.
pub struct SubmeshBinding {
    pub program: Handle<Program>,
    pub pipeline: wgpu::RenderPipeline,
}

pub struct Submesh {
    pub layout: VertexBufferLayout,
    /// Byte offset of this submesh's vertex region in the shared vertex buffer.
    pub vertex_offset: u64,
    /// Byte offset of this submesh's indices in the shared index buffer.
    pub index_offset: u64,
    pub index_count: u32,
    /// Append-only binding cache, keyed by program handle, never evicted.
    pub bindings: Vec<SubmeshBinding>,
}

impl Submesh {
    /// Linear scan over the cached bindings; first match wins.
    pub fn find_binding(&self, program: Handle<Program>) -> Option<usize> {
        self.bindings.iter().position(|b| b.program == program)
    }
}

/// CPU-side description of one submesh before upload.
pub struct SubmeshData {
    pub layout: VertexBufferLayout,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

/// One vertex buffer and one index buffer shared by all submeshes.
pub struct Mesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub submeshes: Vec<Submesh>,
}

impl Mesh {
    /// Concatenates the submesh regions into shared buffers, recording each
    /// submesh's byte offsets.
    pub fn new(device: &wgpu::Device, label: &str, parts: Vec<SubmeshData>) -> Result<Self> {
        ensure!(!parts.is_empty(), "mesh {label:?} has no submeshes");

        let mut vertex_data: Vec<f32> = Vec::new();
        let mut index_data: Vec<u32> = Vec::new();
        let mut submeshes = Vec::with_capacity(parts.len());

        for part in &parts {
            part.layout.validate()?;
            let vertex_offset = (vertex_data.len() * 4) as u64;
            let index_offset = (index_data.len() * 4) as u64;
            vertex_data.extend_from_slice(&part.vertices);
            index_data.extend_from_slice(&part.indices);
            submeshes.push(Submesh {
                layout: part.layout.clone(),
                vertex_offset,
                index_offset,
                index_count: part.indices.len() as u32,
                bindings: Vec::new(),
            });
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&vertex_data),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&index_data),
            usage: wgpu::BufferUsages::INDEX,
        });

        Ok(Self {
            vertex_buffer,
            index_buffer,
            submeshes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_rejects_attribute_past_stride() {
        let layout = VertexBufferLayout {
            attributes: vec![VertexBufferAttribute {
                location: 0,
                components: 3,
                offset: 8,
            }],
            stride: 12,
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn layout_accepts_tight_packing() {
        let layout = VertexBufferLayout {
            attributes: vec![
                VertexBufferAttribute {
                    location: 0,
                    components: 3,
                    offset: 0,
                },
                VertexBufferAttribute {
                    location: 1,
                    components: 2,
                    offset: 12,
                },
            ],
            stride: 20,
        };
        assert!(layout.validate().is_ok());
    }
}
