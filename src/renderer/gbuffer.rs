use anyhow::{ensure, Result};

pub const GBUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// The geometry-pass attachments the lighting pass can sample.
/// `Depth` is the shader-written view-depth color target, not the
/// depth-stencil attachment itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GBufferChannel {
    Albedo,
    Normals,
    Positions,
    Depth,
}

pub const GBUFFER_CHANNELS: [GBufferChannel; 4] = [
    GBufferChannel::Albedo,
    GBufferChannel::Normals,
    GBufferChannel::Positions,
    GBufferChannel::Depth,
];

/// Multi-attachment render target for the geometry pass: albedo, normals,
/// world positions and view depth, plus the depth-stencil attachment.
/// Recreated on resize; formats never change within a run.
pub struct GBuffer {
    pub albedo: wgpu::TextureView,
    pub normals: wgpu::TextureView,
    pub positions: wgpu::TextureView,
    pub depth: wgpu::TextureView,
    pub depth_stencil: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GBuffer {
    /// Builds the target, validating each attachment up front. An invalid
    /// target is a fatal startup error naming the offending attachment.
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self> {
        let limit = device.limits().max_texture_dimension_2d;
        for name in ["albedo", "normals", "positions", "depth", "depth-stencil"] {
            ensure!(
                width > 0 && height > 0,
                "incomplete render target: attachment {name:?} has zero extent ({width}x{height})"
            );
            ensure!(
                width <= limit && height <= limit,
                "incomplete render target: attachment {name:?} ({width}x{height}) exceeds the \
                 device's maximum texture dimension {limit}"
            );
        }

        let color = |label: &str| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: GBUFFER_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        };

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("GBufferDepthStencil"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Ok(Self {
            albedo: color("GBufferAlbedo"),
            normals: color("GBufferNormals"),
            positions: color("GBufferPositions"),
            depth: color("GBufferDepth"),
            depth_stencil: depth_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            width,
            height,
        })
    }

    pub fn channel_view(&self, channel: GBufferChannel) -> &wgpu::TextureView {
        match channel {
            GBufferChannel::Albedo => &self.albedo,
            GBufferChannel::Normals => &self.normals,
            GBufferChannel::Positions => &self.positions,
            GBufferChannel::Depth => &self.depth,
        }
    }
}
