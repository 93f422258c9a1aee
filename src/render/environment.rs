use crate::assets::{FetchError, Fetcher};
use glam::Vec3;
use std::collections::HashMap;
use std::f32::consts::PI;
use std::rc::Rc;
use std::sync::Arc;

/// Catalog id meaning "no environment lighting".
pub const NO_ENVIRONMENT: &str = "";
/// Catalog id of the procedural studio room.
pub const NEUTRAL_ENVIRONMENT: &str = "neutral";

const ROOM_WIDTH: usize = 64;
const ROOM_HEIGHT: usize = 32;
const MAX_LEVELS: usize = 8;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnvironmentEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

impl EnvironmentEntry {
    pub fn new(id: &str, name: &str, path: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            path: path.map(str::to_string),
        }
    }
}

/// Ordered list of selectable environments.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EnvironmentCatalog {
    entries: Vec<EnvironmentEntry>,
}

impl Default for EnvironmentCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EnvironmentCatalog {
    pub fn new(entries: Vec<EnvironmentEntry>) -> Self {
        Self { entries }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            EnvironmentEntry::new(NO_ENVIRONMENT, "None", None),
            EnvironmentEntry::new(NEUTRAL_ENVIRONMENT, "Neutral", None),
            EnvironmentEntry::new(
                "venice-sunset",
                "Venice Sunset",
                Some("assets/environment/venice_sunset_1k.hdr"),
            ),
            EnvironmentEntry::new(
                "footprint-court",
                "Footprint Court (HDR Labs)",
                Some("assets/environment/footprint_court_2k.hdr"),
            ),
        ])
    }

    pub fn entries(&self) -> &[EnvironmentEntry] {
        &self.entries
    }

    pub fn find(&self, id: &str) -> Option<&EnvironmentEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Second entry of the catalog, the first one being "none".
    pub fn default_id(&self) -> String {
        self.entries
            .get(1)
            .or_else(|| self.entries.first())
            .map(|entry| entry.id.clone())
            .unwrap_or_else(|| NO_ENVIRONMENT.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("unknown environment '{0}'")]
    Unknown(String),
    #[error("environment '{0}' has no texture path")]
    MissingPath(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to decode environment {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// One level of the pre-filtered chain, equirectangular RGB radiance.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentLevel {
    pub width: usize,
    pub height: usize,
    pub texels: Vec<[f32; 3]>,
}

/// Pre-filtered lighting environment; level 0 is sharp, each next level is blurrier.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentMap {
    pub id: String,
    pub levels: Vec<EnvironmentLevel>,
}

impl EnvironmentMap {
    pub fn from_equirect(id: &str, width: usize, height: usize, texels: Vec<[f32; 3]>) -> Self {
        Self {
            id: id.to_string(),
            levels: prefilter(EnvironmentLevel {
                width,
                height,
                texels,
            }),
        }
    }

    pub fn width(&self) -> usize {
        self.levels.first().map_or(0, |level| level.width)
    }

    pub fn height(&self) -> usize {
        self.levels.first().map_or(0, |level| level.height)
    }

    /// Average radiance of the most blurred level.
    pub fn irradiance(&self) -> [f32; 3] {
        self.levels
            .last()
            .map(|level| average(&level.texels))
            .unwrap_or([0.0; 3])
    }
}

/// Lazily built environments keyed by catalog id.
pub struct EnvironmentCache {
    fetcher: Rc<dyn Fetcher>,
    neutral: Option<Arc<EnvironmentMap>>,
    maps: HashMap<String, Arc<EnvironmentMap>>,
}

impl EnvironmentCache {
    pub fn new(fetcher: Rc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            neutral: None,
            maps: HashMap::new(),
        }
    }

    pub fn is_cached(&self, id: &str) -> bool {
        self.maps.contains_key(id)
    }

    /// `Ok(None)` means the entry asks for no environment at all.
    pub fn lookup(
        &mut self,
        entry: &EnvironmentEntry,
    ) -> Result<Option<Arc<EnvironmentMap>>, EnvironmentError> {
        match entry.id.as_str() {
            NO_ENVIRONMENT => Ok(None),
            NEUTRAL_ENVIRONMENT => Ok(Some(self.neutral())),
            id => {
                if let Some(map) = self.maps.get(id) {
                    return Ok(Some(map.clone()));
                }
                let path = entry
                    .path
                    .as_deref()
                    .ok_or_else(|| EnvironmentError::MissingPath(id.to_string()))?;
                let bytes = self.fetcher.fetch(path)?;
                let map = Arc::new(decode_equirect(id, path, &bytes)?);
                log::info!(
                    "Environment '{}' ready: {}x{}, {} levels",
                    id,
                    map.width(),
                    map.height(),
                    map.levels.len()
                );
                self.maps.insert(id.to_string(), map.clone());
                Ok(Some(map))
            }
        }
    }

    fn neutral(&mut self) -> Arc<EnvironmentMap> {
        self.neutral
            .get_or_insert_with(|| Arc::new(room_environment()))
            .clone()
    }
}

fn decode_equirect(id: &str, path: &str, bytes: &[u8]) -> Result<EnvironmentMap, EnvironmentError> {
    let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Hdr)
        .map_err(|source| EnvironmentError::Decode {
            path: path.to_string(),
            source,
        })?
        .to_rgb32f();
    let (width, height) = (image.width() as usize, image.height() as usize);
    let texels = image.pixels().map(|pixel| pixel.0).collect();
    Ok(EnvironmentMap::from_equirect(id, width, height, texels))
}

/// Box-filtered chain down to 1x1, capped at `MAX_LEVELS`.
fn prefilter(base: EnvironmentLevel) -> Vec<EnvironmentLevel> {
    let mut levels = vec![base];
    while levels.len() < MAX_LEVELS {
        let Some(previous) = levels.last() else {
            break;
        };
        if previous.width <= 1 && previous.height <= 1 {
            break;
        }
        let width = (previous.width / 2).max(1);
        let height = (previous.height / 2).max(1);
        let mut texels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let mut sum = [0.0f32; 3];
                let mut count = 0.0;
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let sx = (x * 2 + dx).min(previous.width - 1);
                    let sy = (y * 2 + dy).min(previous.height - 1);
                    let texel = previous.texels[sy * previous.width + sx];
                    sum[0] += texel[0];
                    sum[1] += texel[1];
                    sum[2] += texel[2];
                    count += 1.0;
                }
                texels.push([sum[0] / count, sum[1] / count, sum[2] / count]);
            }
        }
        levels.push(EnvironmentLevel {
            width,
            height,
            texels,
        });
    }
    levels
}

fn average(texels: &[[f32; 3]]) -> [f32; 3] {
    if texels.is_empty() {
        return [0.0; 3];
    }
    let mut sum = [0.0f32; 3];
    for texel in texels {
        sum[0] += texel[0];
        sum[1] += texel[1];
        sum[2] += texel[2];
    }
    let count = texels.len() as f32;
    [sum[0] / count, sum[1] / count, sum[2] / count]
}

/// Neutral studio room: grey walls, darker floor and a handful of soft area lights.
fn room_environment() -> EnvironmentMap {
    // (direction, angular radius, radiance)
    const PANELS: [([f32; 3], f32, f32); 6] = [
        ([0.0, 1.0, 0.0], 0.35, 12.0),
        ([-0.7, 0.5, 0.5], 0.25, 8.0),
        ([0.7, 0.5, -0.5], 0.25, 8.0),
        ([0.0, 0.3, -1.0], 0.3, 6.0),
        ([1.0, 0.2, 0.6], 0.2, 5.0),
        ([-1.0, 0.4, -0.4], 0.2, 5.0),
    ];
    let mut texels = Vec::with_capacity(ROOM_WIDTH * ROOM_HEIGHT);
    for y in 0..ROOM_HEIGHT {
        let polar = (y as f32 + 0.5) / ROOM_HEIGHT as f32 * PI;
        for x in 0..ROOM_WIDTH {
            let azimuth = (x as f32 + 0.5) / ROOM_WIDTH as f32 * 2.0 * PI - PI;
            let direction = Vec3::new(
                polar.sin() * azimuth.cos(),
                polar.cos(),
                polar.sin() * azimuth.sin(),
            );
            let mut radiance = if direction.y < -0.2 { 0.35 } else { 0.5 };
            for (panel, radius, intensity) in PANELS {
                if direction.angle_between(Vec3::from_array(panel).normalize()) < radius {
                    radiance += intensity;
                }
            }
            texels.push([radiance; 3]);
        }
    }
    EnvironmentMap::from_equirect(NEUTRAL_ENVIRONMENT, ROOM_WIDTH, ROOM_HEIGHT, texels)
}

#[cfg(test)]
mod tests {
    use super::{EnvironmentCache, EnvironmentCatalog, EnvironmentEntry, EnvironmentError};
    use crate::testing::MemoryFetcher;
    use std::rc::Rc;

    /// 2x2 Radiance file; widths under 8 are stored as flat RGBE.
    fn tiny_hdr() -> Vec<u8> {
        let mut bytes = b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y 2 +X 2\n".to_vec();
        for _ in 0..4 {
            bytes.extend_from_slice(&[128, 128, 128, 129]);
        }
        bytes
    }

    #[test]
    fn sentinels_never_fetch() {
        let fetcher = Rc::new(MemoryFetcher::default());
        let mut cache = EnvironmentCache::new(fetcher.clone());
        let catalog = EnvironmentCatalog::builtin();

        let none = cache.lookup(catalog.find("").unwrap()).unwrap();
        assert!(none.is_none());
        let neutral = cache.lookup(catalog.find("neutral").unwrap()).unwrap().unwrap();
        assert_eq!(neutral.id, "neutral");
        assert!(neutral.levels.len() > 1);
        assert!(neutral.irradiance()[0] > 0.5);
        assert!(fetcher.requests().is_empty());
        assert_eq!(catalog.default_id(), "neutral");
    }

    #[test]
    fn hdr_environment_is_fetched_once_and_cached() {
        let fetcher = Rc::new(MemoryFetcher::default());
        fetcher.insert("env/studio.hdr", tiny_hdr());
        let mut cache = EnvironmentCache::new(fetcher.clone());
        let entry = EnvironmentEntry::new("studio", "Studio", Some("env/studio.hdr"));

        let first = cache.lookup(&entry).unwrap().unwrap();
        let second = cache.lookup(&entry).unwrap().unwrap();
        assert_eq!(first.width(), 2);
        assert_eq!(first.height(), 2);
        assert_eq!(first.levels.len(), 2);
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.requests(), vec!["env/studio.hdr".to_string()]);
    }

    #[test]
    fn failed_lookup_is_not_cached() {
        let fetcher = Rc::new(MemoryFetcher::default());
        let mut cache = EnvironmentCache::new(fetcher.clone());
        let entry = EnvironmentEntry::new("studio", "Studio", Some("env/missing.hdr"));

        assert!(matches!(cache.lookup(&entry), Err(EnvironmentError::Fetch(_))));
        assert!(!cache.is_cached("studio"));

        fetcher.insert("env/missing.hdr", b"not an hdr".to_vec());
        assert!(matches!(
            cache.lookup(&entry),
            Err(EnvironmentError::Decode { .. })
        ));

        let no_path = EnvironmentEntry::new("bare", "Bare", None);
        assert!(matches!(
            cache.lookup(&no_path),
            Err(EnvironmentError::MissingPath(_))
        ));
    }
}
