pub mod binding;
pub mod context;
pub mod deferred;
pub mod display;
pub mod gbuffer;
pub mod linear;
pub mod material;
pub mod mesh;
pub mod packer;
pub mod pipeline_builder;
pub mod primitives;
pub mod program;
pub mod texture;

pub use context::RenderContext;
pub use deferred::DeferredRenderer;
pub use display::DisplayMode;
pub use gbuffer::{GBuffer, GBufferChannel};
pub use linear::{LinearBuffer, LinearWriter};
pub use material::{Material, MaterialFeatures};
pub use mesh::Mesh;
pub use program::{Program, ProgramRole};
pub use texture::Texture;
