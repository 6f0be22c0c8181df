use crate::renderer::gbuffer::GBufferChannel;
use crate::scene::{Light, LightKind};

/// What the lighting pass presents. `Color` is the composited lit result;
/// the others show one raw geometry-pass attachment. Written by input
/// handling between frames, read once at pass dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayMode {
    #[default]
    Color,
    Albedo,
    Normals,
    Positions,
    Depth,
}

impl DisplayMode {
    /// The raw attachment to present, or `None` for the composited result.
    pub fn channel(self) -> Option<GBufferChannel> {
        match self {
            DisplayMode::Color => None,
            DisplayMode::Albedo => Some(GBufferChannel::Albedo),
            DisplayMode::Normals => Some(GBufferChannel::Normals),
            DisplayMode::Positions => Some(GBufferChannel::Positions),
            DisplayMode::Depth => Some(GBufferChannel::Depth),
        }
    }
}

/// Geometry the lighting pass draws for one light.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightVolume {
    /// Directional lights cover every pixel.
    ScreenQuad,
    /// Point lights cover their bounding sphere.
    Sphere,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightDraw {
    pub light_index: usize,
    pub volume: LightVolume,
}

/// Per-frame decision for the lighting pass: either a list of additive
/// light draws, or a single raw-attachment blit with no accumulation.
#[derive(Debug, PartialEq, Eq)]
pub struct LightingPlan {
    pub draws: Vec<LightDraw>,
    pub blit: Option<GBufferChannel>,
}

pub fn plan_lighting(mode: DisplayMode, lights: &[Light]) -> LightingPlan {
    if let Some(channel) = mode.channel() {
        return LightingPlan {
            draws: Vec::new(),
            blit: Some(channel),
        };
    }

    let draws = lights
        .iter()
        .enumerate()
        .map(|(light_index, light)| LightDraw {
            light_index,
            volume: match light.kind {
                LightKind::Directional { .. } => LightVolume::ScreenQuad,
                LightKind::Point { .. } => LightVolume::Sphere,
            },
        })
        .collect();

    LightingPlan { draws, blit: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sample_lights() -> Vec<Light> {
        vec![
            Light::directional(Vec3::ONE, Vec3::new(1.0, 1.0, 1.0)),
            Light::point(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0), 10.0),
        ]
    }

    #[test]
    fn color_mode_draws_every_light_with_its_volume() {
        let plan = plan_lighting(DisplayMode::Color, &sample_lights());
        assert_eq!(plan.blit, None);
        assert_eq!(plan.draws.len(), 2);
        assert_eq!(plan.draws[0].volume, LightVolume::ScreenQuad);
        assert_eq!(plan.draws[1].volume, LightVolume::Sphere);
    }

    #[test]
    fn raw_modes_blit_one_channel_and_skip_accumulation() {
        let plan = plan_lighting(DisplayMode::Albedo, &sample_lights());
        assert!(plan.draws.is_empty());
        assert_eq!(plan.blit, Some(GBufferChannel::Albedo));

        let plan = plan_lighting(DisplayMode::Depth, &sample_lights());
        assert!(plan.draws.is_empty());
        assert_eq!(plan.blit, Some(GBufferChannel::Depth));
    }

    #[test]
    fn color_mode_with_no_lights_draws_nothing() {
        let plan = plan_lighting(DisplayMode::Color, &[]);
        assert!(plan.draws.is_empty());
        assert_eq!(plan.blit, None);
    }
}
