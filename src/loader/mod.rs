mod gltf;

pub use self::gltf::GltfDecoder;

use crate::assets::{
    extract_url_base, FetchError, Fetcher, ObjectUrlStore, ResourceBundle, ResourceResolver,
};
use crate::error::LoadError;
use crate::scene::{AnimationClip, SceneGraph};
use std::rc::Rc;
use std::sync::Arc;

/// Callbacks a decoder uses for every resource it side-loads.
pub trait ResourceHooks {
    /// Rewrites a resource reference into the URL to fetch.
    fn resolve_url(&mut self, url: &str, path: Option<&str>) -> String;
    fn fetch(&mut self, url: &str) -> Result<Arc<[u8]>, FetchError>;
}

/// Turns a root document URL into scene graphs and animation clips.
pub trait ModelDecoder {
    fn decode(&self, url: &str, hooks: &mut dyn ResourceHooks)
        -> Result<DecodedDocument, LoadError>;
}

/// Everything a decoder produced for one document.
#[derive(Debug)]
pub struct DecodedDocument {
    pub scenes: Vec<SceneGraph>,
    pub default_scene: Option<usize>,
    pub animations: Vec<AnimationClip>,
    /// Parsed document for introspection.
    pub raw: serde_json::Value,
}

/// The scene picked out of a decoded document, ready for composition.
#[derive(Debug)]
pub struct DecodedScene {
    pub scene: SceneGraph,
    pub clips: Vec<AnimationClip>,
    pub raw: Arc<serde_json::Value>,
    pub scene_count: usize,
}

struct LoadContext<'a> {
    resolver: ResourceResolver<'a>,
    fetcher: &'a dyn Fetcher,
}

impl ResourceHooks for LoadContext<'_> {
    fn resolve_url(&mut self, url: &str, path: Option<&str>) -> String {
        self.resolver.resolve(url, path)
    }

    fn fetch(&mut self, url: &str) -> Result<Arc<[u8]>, FetchError> {
        self.fetcher.fetch(url)
    }
}

/// Drives a [`ModelDecoder`] with a resolver scoped to a single load.
pub struct SceneLoader {
    decoder: Box<dyn ModelDecoder>,
    fetcher: Rc<dyn Fetcher>,
    handles: ObjectUrlStore,
}

impl SceneLoader {
    pub fn new(
        decoder: Box<dyn ModelDecoder>,
        fetcher: Rc<dyn Fetcher>,
        handles: ObjectUrlStore,
    ) -> Self {
        Self {
            decoder,
            fetcher,
            handles,
        }
    }

    pub fn handles(&self) -> &ObjectUrlStore {
        &self.handles
    }

    /// Decodes `url` and picks its default scene (or the first one).
    ///
    /// Handles minted for bundle entries are revoked before this returns, on
    /// success and on failure alike.
    pub fn load(
        &self,
        url: &str,
        root_path: &str,
        bundle: &ResourceBundle,
    ) -> Result<DecodedScene, LoadError> {
        let base_url = extract_url_base(url);
        let mut context = LoadContext {
            resolver: ResourceResolver::new(&base_url, root_path, bundle, self.handles.clone()),
            fetcher: self.fetcher.as_ref(),
        };
        log::info!("Loading {}", url);
        let decoded = self.decoder.decode(url, &mut context);
        let released = context.resolver.release();
        log::debug!("Released {} bundle handles for {}", released, url);
        select_scene(decoded?)
    }
}

fn select_scene(mut document: DecodedDocument) -> Result<DecodedScene, LoadError> {
    let scene_count = document.scenes.len();
    if scene_count == 0 {
        return Err(LoadError::NoRenderableScene);
    }
    let index = document
        .default_scene
        .filter(|index| *index < scene_count)
        .unwrap_or(0);
    let scene = document.scenes.swap_remove(index);
    Ok(DecodedScene {
        scene,
        clips: document.animations,
        raw: Arc::new(document.raw),
        scene_count,
    })
}

#[cfg(test)]
mod tests {
    use super::{DecodedDocument, GltfDecoder, ModelDecoder, ResourceHooks, SceneLoader};
    use crate::assets::{ObjectUrlStore, ResourceBundle};
    use crate::error::LoadError;
    use crate::scene::SceneGraph;
    use crate::testing::{GltfFixture, MemoryFetcher};
    use std::rc::Rc;

    struct FixedDecoder(fn() -> Result<DecodedDocument, LoadError>);

    impl ModelDecoder for FixedDecoder {
        fn decode(
            &self,
            _url: &str,
            hooks: &mut dyn ResourceHooks,
        ) -> Result<DecodedDocument, LoadError> {
            hooks.resolve_url("tex.png", None);
            (self.0)()
        }
    }

    fn loader(fetcher: Rc<MemoryFetcher>, handles: ObjectUrlStore) -> SceneLoader {
        SceneLoader::new(Box::new(GltfDecoder::new()), fetcher, handles)
    }

    #[test]
    fn one_scene_two_clips() {
        let handles = ObjectUrlStore::new();
        let fetcher = Rc::new(MemoryFetcher::with_handles(handles.clone()));
        let fixture = GltfFixture {
            clips: vec!["Walk", "Run"],
            ..GltfFixture::default()
        };
        fetcher.insert("models/box.gltf", fixture.json().into_bytes());

        let decoded = loader(fetcher, handles)
            .load("models/box.gltf", "", &ResourceBundle::new())
            .unwrap();
        assert_eq!(decoded.scene_count, 1);
        let names: Vec<_> = decoded.clips.iter().map(|clip| clip.name.as_str()).collect();
        assert_eq!(names, vec!["Walk", "Run"]);
        assert_eq!(decoded.raw["asset"]["version"], "2.0");
    }

    #[test]
    fn zero_scenes_is_not_renderable() {
        let handles = ObjectUrlStore::new();
        let fetcher = Rc::new(MemoryFetcher::with_handles(handles.clone()));
        let fixture = GltfFixture {
            scenes: 0,
            ..GltfFixture::default()
        };
        fetcher.insert("empty.gltf", fixture.json().into_bytes());

        let err = loader(fetcher, handles)
            .load("empty.gltf", "", &ResourceBundle::new())
            .unwrap_err();
        assert!(matches!(err, LoadError::NoRenderableScene));
    }

    #[test]
    fn default_scene_index_is_honoured() {
        let mut first = SceneGraph::new("first");
        first.add(first.root(), crate::scene::Node::group("a"));
        let document = DecodedDocument {
            scenes: vec![first, SceneGraph::new("second")],
            default_scene: Some(1),
            animations: Vec::new(),
            raw: serde_json::Value::Null,
        };
        let selected = super::select_scene(document).unwrap();
        assert_eq!(selected.scene.get(selected.scene.root()).unwrap().name, "second");
        assert_eq!(selected.scene_count, 2);
    }

    #[test]
    fn handles_are_released_on_failure_too() {
        let handles = ObjectUrlStore::new();
        let fetcher = Rc::new(MemoryFetcher::with_handles(handles.clone()));
        let mut bundle = ResourceBundle::new();
        bundle.insert("tex.png", b"png".to_vec());
        let loader = SceneLoader::new(
            Box::new(FixedDecoder(|| Err(LoadError::NoRenderableScene))),
            fetcher,
            handles.clone(),
        );

        for _ in 0..3 {
            assert!(loader.load("model.gltf", "", &bundle).is_err());
        }
        assert_eq!(handles.created_count(), 3);
        assert_eq!(handles.revoked_count(), 3);
        assert_eq!(handles.live_count(), 0);
    }
}
