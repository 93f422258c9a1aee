use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identity of a geometry upload on the renderer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(u64);

impl GeometryId {
    pub fn next() -> Self {
        Self(next_resource_id())
    }
}

/// Identity of a texture upload on the renderer side. Shared by every material using it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(u64);

impl TextureId {
    pub fn next() -> Self {
        Self(next_resource_id())
    }
}

/// GPU-side resource that must be released when content is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResource {
    Geometry(GeometryId),
    Texture(TextureId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum TextureEncoding {
    #[default]
    #[serde(rename = "sRGB")]
    Srgb,
    #[serde(rename = "Linear")]
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub id: TextureId,
    pub name: Option<String>,
    /// Reference the image was loaded from, as written in the document.
    pub uri: String,
    pub mime_type: Option<String>,
    pub data: Arc<[u8]>,
    pub encoding: TextureEncoding,
    /// Bumped whenever the texture must be uploaded again.
    pub version: u32,
}

impl Texture {
    pub fn file_name(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or(&self.uri)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureMaps {
    pub base_color: Option<Texture>,
    pub emissive: Option<Texture>,
    pub normal: Option<Texture>,
    pub metallic_roughness: Option<Texture>,
    pub occlusion: Option<Texture>,
}

impl TextureMaps {
    pub fn iter(&self) -> impl Iterator<Item = &Texture> {
        [
            self.base_color.as_ref(),
            self.emissive.as_ref(),
            self.normal.as_ref(),
            self.metallic_roughness.as_ref(),
            self.occlusion.as_ref(),
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub transparent: bool,
    pub depth_write: bool,
    pub wireframe: bool,
    pub double_sided: bool,
    pub maps: TextureMaps,
    /// Bumped whenever the material program must be rebuilt.
    pub version: u32,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transparent: false,
            depth_write: true,
            wireframe: false,
            double_sided: false,
            maps: TextureMaps::default(),
            version: 0,
        }
    }

    pub fn needs_update(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Applies `encoding` to the color and emissive maps. Returns whether any map changed.
    pub fn set_color_encoding(&mut self, encoding: TextureEncoding) -> bool {
        let mut touched = false;
        for texture in [&mut self.maps.base_color, &mut self.maps.emissive]
            .into_iter()
            .flatten()
        {
            texture.encoding = encoding;
            texture.version = texture.version.wrapping_add(1);
            touched = true;
        }
        if touched {
            self.needs_update();
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::{Material, Texture, TextureEncoding, TextureId};
    use std::sync::Arc;

    fn texture(uri: &str) -> Texture {
        Texture {
            id: TextureId::next(),
            name: None,
            uri: uri.to_string(),
            mime_type: None,
            data: Arc::from(vec![0u8; 4]),
            encoding: TextureEncoding::Linear,
            version: 0,
        }
    }

    #[test]
    fn color_encoding_only_touches_color_and_emissive_maps() {
        let mut material = Material::new("mat");
        material.maps.base_color = Some(texture("textures/albedo.png"));
        material.maps.normal = Some(texture("textures/normal.png"));

        assert!(material.set_color_encoding(TextureEncoding::Srgb));
        assert_eq!(material.version, 1);
        assert_eq!(
            material.maps.base_color.as_ref().unwrap().encoding,
            TextureEncoding::Srgb
        );
        assert_eq!(
            material.maps.normal.as_ref().unwrap().encoding,
            TextureEncoding::Linear
        );
        assert_eq!(material.maps.iter().count(), 2);
        assert_eq!(material.maps.base_color.as_ref().unwrap().file_name(), "albedo.png");
    }

    #[test]
    fn material_without_color_maps_is_left_alone() {
        let mut material = Material::new("plain");
        assert!(!material.set_color_encoding(TextureEncoding::Linear));
        assert_eq!(material.version, 0);
    }
}
