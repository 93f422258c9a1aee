//! Embeddable glTF model viewer.
//!
//! A [`app::ViewerShell`] takes "show this asset" calls from a host, drives the
//! [`loader::SceneLoader`] with a per-load [`assets::ResourceResolver`], and hands
//! the decoded scene to a [`viewer::Viewer`], which frames it, keeps the live
//! scene graph in line with its [`viewer::ViewState`] and renders it each frame.

pub mod app;
pub mod assets;
pub mod config;
pub mod error;
pub mod loader;
pub mod render;
pub mod scene;
pub mod viewer;

pub use config::{Preset, Recentering, ViewerOptions};
pub use error::{ConfigError, LoadError};

#[cfg(test)]
pub(crate) mod testing {
    use crate::assets::{FetchError, FetchErrorKind, Fetcher, ObjectUrlStore};
    use base64::Engine as _;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Fetcher over an in-memory file table that records every request.
    #[derive(Default)]
    pub struct MemoryFetcher {
        files: RefCell<HashMap<String, Arc<[u8]>>>,
        requests: RefCell<Vec<String>>,
        handles: Option<ObjectUrlStore>,
    }

    impl MemoryFetcher {
        pub fn with_handles(handles: ObjectUrlStore) -> Self {
            Self {
                handles: Some(handles),
                ..Self::default()
            }
        }

        pub fn insert(&self, url: &str, bytes: Vec<u8>) {
            self.files.borrow_mut().insert(url.to_string(), Arc::from(bytes));
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.borrow().clone()
        }
    }

    impl Fetcher for MemoryFetcher {
        fn fetch(&self, url: &str) -> Result<Arc<[u8]>, FetchError> {
            self.requests.borrow_mut().push(url.to_string());
            if ObjectUrlStore::is_object_url(url) {
                return self
                    .handles
                    .as_ref()
                    .and_then(|handles| handles.get(url))
                    .ok_or_else(|| FetchError::new(url, FetchErrorKind::RevokedHandle));
            }
            if url.starts_with("data:") {
                return crate::assets::decode_data_uri(url)
                    .map(Arc::from)
                    .ok_or_else(|| FetchError::new(url, FetchErrorKind::InvalidDataUri));
            }
            self.files
                .borrow()
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::new(url, FetchErrorKind::NotFound))
        }
    }

    /// Small glTF document: a one-triangle mesh plus optional extras.
    ///
    /// Buffer layout: positions (3 x vec3) at 0, clip times (2 x f32) at 36,
    /// translations (2 x vec3) at 44; 68 bytes in total.
    pub struct GltfFixture {
        pub scenes: usize,
        pub clips: Vec<&'static str>,
        pub texture: bool,
        pub blend: bool,
        pub camera: bool,
        pub lights: bool,
        pub skin: bool,
        /// External buffer reference instead of an embedded `data:` URI.
        pub buffer_uri: Option<&'static str>,
    }

    impl Default for GltfFixture {
        fn default() -> Self {
            Self {
                scenes: 1,
                clips: Vec::new(),
                texture: false,
                blend: false,
                camera: false,
                lights: false,
                skin: false,
                buffer_uri: None,
            }
        }
    }

    impl GltfFixture {
        pub fn buffer() -> Vec<u8> {
            let floats: [f32; 17] = [
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, // positions
                0.0, 1.0, // times
                0.0, 0.0, 0.0, 2.0, 0.0, 0.0, // translations
            ];
            floats.iter().flat_map(|value| value.to_le_bytes()).collect()
        }

        pub fn json(&self) -> String {
            let buffer_uri = match self.buffer_uri {
                Some(uri) => uri.to_string(),
                None => format!(
                    "data:application/octet-stream;base64,{}",
                    base64::engine::general_purpose::STANDARD.encode(Self::buffer())
                ),
            };

            let mut material = json!({ "name": "Surface" });
            if self.texture {
                material["pbrMetallicRoughness"] = json!({ "baseColorTexture": { "index": 0 } });
            }
            if self.blend {
                material["alphaMode"] = json!("BLEND");
            }

            let mut body = json!({ "name": "Body", "mesh": 0 });
            if self.skin {
                body["skin"] = json!(0);
            }
            let mut camera = json!({ "name": "Closeup", "translation": [0.0, 0.5, 3.0] });
            if self.camera {
                camera["camera"] = json!(0);
            }
            let mut lamp = json!({ "name": "Lamp", "translation": [0.0, 4.0, 0.0] });
            if self.lights {
                lamp["extensions"] = json!({ "KHR_lights_punctual": { "light": 0 } });
            }

            let animations: Vec<Value> = self
                .clips
                .iter()
                .map(|name| {
                    json!({
                        "name": name,
                        "channels": [{ "sampler": 0, "target": { "node": 0, "path": "translation" } }],
                        "samplers": [{ "input": 1, "output": 2, "interpolation": "LINEAR" }]
                    })
                })
                .collect();
            let scenes: Vec<Value> = (0..self.scenes)
                .map(|index| json!({ "name": format!("Scene{}", index), "nodes": [0, 1, 2, 3] }))
                .collect();

            let mut document = json!({
                "asset": { "version": "2.0" },
                "scenes": scenes,
                "nodes": [body, { "name": "Joint" }, camera, lamp],
                "meshes": [{
                    "name": "Triangle",
                    "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }]
                }],
                "materials": [material],
                "buffers": [{ "byteLength": 68, "uri": buffer_uri }],
                "bufferViews": [
                    { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                    { "buffer": 0, "byteOffset": 36, "byteLength": 8 },
                    { "buffer": 0, "byteOffset": 44, "byteLength": 24 }
                ],
                "accessors": [
                    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
                    { "bufferView": 1, "componentType": 5126, "count": 2, "type": "SCALAR",
                      "min": [0.0], "max": [1.0] },
                    { "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3" }
                ]
            });
            if self.scenes > 0 {
                document["scene"] = json!(0);
            }
            if !animations.is_empty() {
                document["animations"] = json!(animations);
            }
            if self.texture {
                document["images"] = json!([{ "uri": "tex.png" }]);
                document["textures"] = json!([{ "source": 0 }]);
            }
            if self.camera {
                document["cameras"] = json!([{
                    "type": "perspective",
                    "perspective": { "yfov": 0.8, "znear": 0.1 }
                }]);
            }
            if self.skin {
                document["skins"] = json!([{ "joints": [1] }]);
            }
            if self.lights {
                document["extensionsUsed"] = json!(["KHR_lights_punctual"]);
                document["extensions"] = json!({
                    "KHR_lights_punctual": {
                        "lights": [{ "type": "point", "color": [1.0, 0.9, 0.8], "intensity": 2.0 }]
                    }
                });
            }
            document.to_string()
        }
    }
}
