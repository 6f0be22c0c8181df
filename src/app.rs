use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::renderer::{DeferredRenderer, DisplayMode, RenderContext};
use crate::scene::{loader, Scene};
use crate::settings::RenderSettings;

pub struct App {
    settings: RenderSettings,
    window: Option<Arc<Window>>,
    window_id: Option<WindowId>,
    context: Option<RenderContext>,
    renderer: Option<DeferredRenderer>,
    scene: Option<Scene>,
    last_frame: Instant,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            window: None,
            window_id: None,
            context: None,
            renderer: None,
            scene: None,
            last_frame: Instant::now(),
        }
    }

    fn display_mode_for_key(key: &Key) -> Option<DisplayMode> {
        match key {
            Key::Character(c) => match c.as_str() {
                "1" => Some(DisplayMode::Color),
                "2" => Some(DisplayMode::Albedo),
                "3" => Some(DisplayMode::Normals),
                "4" => Some(DisplayMode::Positions),
                "5" => Some(DisplayMode::Depth),
                _ => None,
            },
            _ => None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("deferred renderer")
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.settings.resolution.width,
                self.settings.resolution.height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .expect("create window"),
        );
        let id = window.id();

        let context = pollster::block_on(RenderContext::new(window.clone(), &self.settings))
            .expect("create render context");
        let renderer = DeferredRenderer::new(&context).expect("create renderer");
        let mut scene =
            Scene::demo(&context.device, &context.queue).expect("build demo scene");

        if let Some(path) = &self.settings.model {
            match loader::load_gltf(&context.device, &context.queue, &mut scene, path) {
                Ok(model) => {
                    use glam::Vec3;
                    scene.entities.push(crate::scene::Entity::new(
                        model,
                        scene.builtins.geometry_program,
                        Vec3::ZERO,
                        Vec3::splat(self.settings.model_scale),
                        Vec3::ZERO,
                    ));
                }
                Err(err) => log::error!("Failed to load model {path:?}: {err:#}"),
            }
        }

        self.window = Some(window);
        self.window_id = Some(id);
        self.context = Some(context);
        self.renderer = Some(renderer);
        self.scene = Some(scene);
        self.last_frame = Instant::now();

        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if Some(id) != self.window_id {
            return;
        }

        let (Some(context), Some(renderer), Some(scene)) = (
            self.context.as_mut(),
            self.renderer.as_mut(),
            self.scene.as_mut(),
        ) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                context.resize(size);
                if let Err(err) = renderer.resize(context) {
                    log::error!("Resize failed: {err:#}");
                    event_loop.exit();
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(w) = &self.window {
                    context.resize(w.inner_size());
                    if let Err(err) = renderer.resize(context) {
                        log::error!("Resize failed: {err:#}");
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame).as_secs_f32();
                self.last_frame = now;

                scene.update(dt);
                if let Err(err) = renderer.render(context, scene) {
                    log::error!("Render failed: {err:#}");
                    event_loop.exit();
                }

                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if logical_key == Key::Named(NamedKey::Escape) {
                    event_loop.exit();
                } else if let Some(mode) = Self::display_mode_for_key(&logical_key) {
                    log::info!("Display mode: {mode:?}");
                    scene.display_mode = mode;
                }
            }
            _ => {}
        }
    }
}
