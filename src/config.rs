use crate::error::ConfigError;
use crate::render::{EnvironmentCatalog, EnvironmentEntry};
use crate::scene::Color;
use std::path::Path;

/// Alternate defaults profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Preset {
    #[serde(rename = "assetgenerator")]
    AssetGenerator,
}

/// How loaded content is moved relative to its bounding-box center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recentering {
    /// Translate by `-center`, so the content sits on the origin.
    #[default]
    Origin,
    /// `position += position - center`, matching earlier releases pixel for pixel.
    Legacy,
}

/// Options the host passes at construction.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerOptions {
    /// Asset shown as soon as the shell is created.
    pub model: Option<String>,
    pub preset: Option<Preset>,
    pub grid: bool,
    pub bg_color: Option<Color>,
    pub bg_color1: Option<Color>,
    pub bg_color2: Option<Color>,
    /// Fixed default camera position; the camera then looks at the origin.
    pub camera_position: Option<[f32; 3]>,
    pub vignette: bool,
    pub recentering: Recentering,
    /// Replaces the built-in environment catalog.
    pub environments: Option<Vec<EnvironmentEntry>>,
}

impl ViewerOptions {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn is_asset_generator(&self) -> bool {
        self.preset == Some(Preset::AssetGenerator)
    }

    pub fn catalog(&self) -> EnvironmentCatalog {
        match &self.environments {
            Some(entries) => EnvironmentCatalog::new(entries.clone()),
            None => EnvironmentCatalog::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Preset, Recentering, ViewerOptions};
    use crate::error::ConfigError;
    use crate::scene::Color;

    #[test]
    fn parses_camel_case_options() {
        let options: ViewerOptions = serde_json::from_str(
            r##"{
                "model": "models/duck.glb",
                "preset": "assetgenerator",
                "grid": true,
                "bgColor": 1193046,
                "bgColor2": "#F6F5F5",
                "cameraPosition": [1, 2, 3],
                "vignette": true,
                "recentering": "legacy",
                "environments": [{ "id": "", "name": "None" }]
            }"##,
        )
        .unwrap();
        assert_eq!(options.model.as_deref(), Some("models/duck.glb"));
        assert_eq!(options.preset, Some(Preset::AssetGenerator));
        assert!(options.is_asset_generator());
        assert_eq!(options.bg_color, Some(Color(0x123456)));
        assert_eq!(options.bg_color1, None);
        assert_eq!(options.bg_color2, Some(Color(0xF6F5F5)));
        assert_eq!(options.camera_position, Some([1.0, 2.0, 3.0]));
        assert_eq!(options.recentering, Recentering::Legacy);
        assert_eq!(options.catalog().entries().len(), 1);
    }

    #[test]
    fn empty_object_gives_defaults() {
        let options: ViewerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ViewerOptions::default());
        assert_eq!(options.recentering, Recentering::Origin);
        assert_eq!(options.catalog().entries().len(), 4);
    }

    #[test]
    fn file_errors_are_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        assert!(matches!(
            ViewerOptions::from_json_file(&path),
            Err(ConfigError::Io { .. })
        ));
        std::fs::write(&path, "{ \"grid\": \"yes\" }").unwrap();
        assert!(matches!(
            ViewerOptions::from_json_file(&path),
            Err(ConfigError::Json { .. })
        ));
        std::fs::write(&path, "{ \"grid\": true }").unwrap();
        assert!(ViewerOptions::from_json_file(&path).unwrap().grid);
    }
}
