use crate::config::ViewerOptions;
use crate::render::{EnvironmentCatalog, ToneMapping};
use crate::scene::{Color, TextureEncoding};
use std::collections::BTreeMap;
use std::f32::consts::PI;

/// Name of the controller-driven camera in [`ViewState::camera`].
pub const DEFAULT_CAMERA: &str = "[default]";

const ASSET_GENERATOR_ENVIRONMENT: &str = "footprint-court";

/// Single source of truth for everything the display reconciles against.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// Environment catalog id.
    pub environment: String,
    pub background: bool,
    pub playback_speed: f32,
    /// Enabled flag per animation clip name.
    pub action_states: BTreeMap<String, bool>,
    pub camera: String,
    pub wireframe: bool,
    pub skeleton: bool,
    pub grid: bool,

    pub punctual_lights: bool,
    /// Exposure in stops; the renderer gets `2^exposure`.
    pub exposure: f32,
    pub tone_mapping: ToneMapping,
    pub texture_encoding: TextureEncoding,
    pub ambient_intensity: f32,
    pub ambient_color: Color,
    pub direct_intensity: f32,
    pub direct_color: Color,
    pub bg_color: Color,
    pub bg_color1: Color,
    pub bg_color2: Color,
}

impl ViewState {
    pub fn from_options(options: &ViewerOptions, catalog: &EnvironmentCatalog) -> Self {
        let environment = if options.is_asset_generator()
            && catalog.find(ASSET_GENERATOR_ENVIRONMENT).is_some()
        {
            ASSET_GENERATOR_ENVIRONMENT.to_string()
        } else {
            catalog.default_id()
        };
        Self {
            environment,
            background: false,
            playback_speed: 1.0,
            action_states: BTreeMap::new(),
            camera: DEFAULT_CAMERA.to_string(),
            wireframe: false,
            skeleton: false,
            grid: options.grid,
            punctual_lights: true,
            exposure: 0.0,
            tone_mapping: ToneMapping::Linear,
            texture_encoding: TextureEncoding::Srgb,
            ambient_intensity: 0.3,
            ambient_color: Color::WHITE,
            direct_intensity: 0.8 * PI,
            direct_color: Color::WHITE,
            bg_color: options.bg_color.unwrap_or(Color::WHITE),
            bg_color1: options.bg_color1.unwrap_or(Color::WHITE),
            bg_color2: options.bg_color2.unwrap_or(Color(0xF6F5F5)),
        }
    }

    pub fn exposure_factor(&self) -> f32 {
        2f32.powf(self.exposure)
    }

    pub(crate) fn lights_changed(&self, other: &ViewState) -> bool {
        self.punctual_lights != other.punctual_lights
            || self.exposure != other.exposure
            || self.tone_mapping != other.tone_mapping
            || self.ambient_intensity != other.ambient_intensity
            || self.ambient_color != other.ambient_color
            || self.direct_intensity != other.direct_intensity
            || self.direct_color != other.direct_color
    }

    pub(crate) fn background_changed(&self, other: &ViewState) -> bool {
        self.bg_color != other.bg_color
            || self.bg_color1 != other.bg_color1
            || self.bg_color2 != other.bg_color2
    }

    pub(crate) fn display_changed(&self, other: &ViewState) -> bool {
        self.wireframe != other.wireframe
            || self.skeleton != other.skeleton
            || self.grid != other.grid
    }
}

#[cfg(test)]
mod tests {
    use super::{ViewState, DEFAULT_CAMERA};
    use crate::config::{Preset, ViewerOptions};
    use crate::render::EnvironmentCatalog;
    use crate::scene::Color;

    #[test]
    fn defaults_follow_options() {
        let options = ViewerOptions {
            grid: true,
            bg_color1: Some(Color(0x101010)),
            ..ViewerOptions::default()
        };
        let state = ViewState::from_options(&options, &EnvironmentCatalog::builtin());
        assert_eq!(state.environment, "neutral");
        assert_eq!(state.camera, DEFAULT_CAMERA);
        assert!(state.grid);
        assert_eq!(state.bg_color, Color::WHITE);
        assert_eq!(state.bg_color1, Color(0x101010));
        assert_eq!(state.bg_color2, Color(0xF6F5F5));
        assert_eq!(state.exposure_factor(), 1.0);
        assert!((state.direct_intensity - 2.513_274).abs() < 1e-4);
    }

    #[test]
    fn asset_generator_prefers_footprint_court() {
        let options = ViewerOptions {
            preset: Some(Preset::AssetGenerator),
            ..ViewerOptions::default()
        };
        let state = ViewState::from_options(&options, &EnvironmentCatalog::builtin());
        assert_eq!(state.environment, "footprint-court");

        let reduced = EnvironmentCatalog::new(EnvironmentCatalog::builtin().entries()[..2].to_vec());
        assert_eq!(ViewState::from_options(&options, &reduced).environment, "neutral");
    }
}
