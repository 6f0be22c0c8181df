pub mod camera;
pub mod components;
pub mod handle;
pub mod loader;
pub mod scene;
pub mod transform;

pub use camera::Camera;
pub use components::{Entity, Light, LightKind, Model};
pub use handle::{Handle, Pool};
pub use scene::{Builtins, Scene};
