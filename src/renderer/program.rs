/// One vertex input the shader declares: attribute location plus the
/// component count it expects there.
#[derive(Clone, Copy, Debug)]
pub struct ShaderAttribute {
    pub location: u32,
    pub components: u32,
}

/// Which stage of the deferred pipeline a program serves. The role decides
/// the pipeline layout, color targets and blend state its bindings get.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramRole {
    /// Writes the G-buffer attachments.
    Geometry,
    /// Full-screen accumulation pass sampling the G-buffer.
    DirectionalLight,
    /// Light-volume accumulation pass sampling the G-buffer.
    PointLight,
    /// Presents a single attachment via a textured quad.
    Blit,
}

/// A compiled shader program plus the vertex-input layout it advertises.
pub struct Program {
    pub module: wgpu::ShaderModule,
    pub name: String,
    pub vertex_inputs: Vec<ShaderAttribute>,
    pub role: ProgramRole,
}

impl Program {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        source: &str,
        vertex_inputs: Vec<ShaderAttribute>,
        role: ProgramRole,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        Self {
            module,
            name: name.to_string(),
            vertex_inputs,
            role,
        }
    }
}

pub const GEOMETRY_SHADER: &str = include_str!("../shader/geometry.wgsl");
pub const DIRECTIONAL_LIGHT_SHADER: &str = include_str!("../shader/directional_light.wgsl");
pub const POINT_LIGHT_SHADER: &str = include_str!("../shader/point_light.wgsl");
pub const BLIT_SHADER: &str = include_str!("../shader/blit.wgsl");

/// Input layouts the built-in programs advertise. Locations follow the
/// primitive/loader convention: 0 position, 1 normal, 2 uv, 3 tangent,
/// 4 bitangent.
pub fn geometry_inputs() -> Vec<ShaderAttribute> {
    vec![
        ShaderAttribute { location: 0, components: 3 },
        ShaderAttribute { location: 1, components: 3 },
        ShaderAttribute { location: 2, components: 2 },
        ShaderAttribute { location: 3, components: 3 },
        ShaderAttribute { location: 4, components: 3 },
    ]
}

pub fn screen_quad_inputs() -> Vec<ShaderAttribute> {
    vec![
        ShaderAttribute { location: 0, components: 3 },
        ShaderAttribute { location: 1, components: 2 },
    ]
}

pub fn light_volume_inputs() -> Vec<ShaderAttribute> {
    vec![ShaderAttribute { location: 0, components: 3 }]
}
