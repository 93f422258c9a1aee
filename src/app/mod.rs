//! Host widget shell: wires a [`Viewer`] into a host container and turns load
//! failures into user-facing notifications.

mod host;
mod timing;

pub use host::{HeadlessHost, HostContainer};
pub use timing::FrameTiming;

use crate::assets::{AssetRef, ResourceBundle};
use crate::config::ViewerOptions;
use crate::render::Renderer;
use crate::viewer::{LoadOutcome, LoadedModel, Viewer, ViewerServices};
use std::error::Error;
use std::sync::Arc;

type LoadObserver = Box<dyn FnMut(&LoadedModel)>;

pub struct ViewerShell<R: Renderer, H: HostContainer> {
    viewer: Viewer<R>,
    host: H,
    observers: Vec<LoadObserver>,
    last_loaded: Option<Arc<LoadedModel>>,
}

impl<R: Renderer, H: HostContainer> ViewerShell<R, H> {
    /// Creates the viewer sized to the host and shows `options.model` if set.
    pub fn new(renderer: R, host: H, options: ViewerOptions, services: ViewerServices) -> Self {
        let initial = options.model.clone();
        let viewer = Viewer::new(
            renderer,
            options,
            host.parent_size(),
            host.pixel_ratio(),
            services,
        );
        let mut shell = Self {
            viewer,
            host,
            observers: Vec::new(),
            last_loaded: None,
        };
        if let Some(model) = initial {
            shell.view(AssetRef::Url(model), "", &ResourceBundle::new());
        }
        shell
    }

    pub fn viewer(&self) -> &Viewer<R> {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut Viewer<R> {
        &mut self.viewer
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Most recent successful load, for introspection.
    pub fn last_loaded(&self) -> Option<&Arc<LoadedModel>> {
        self.last_loaded.as_ref()
    }

    /// Registers a callback run after every successful load.
    pub fn on_load(&mut self, observer: impl FnMut(&LoadedModel) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Shows an asset. In-memory assets get a temporary `blob:` handle for the
    /// duration of the load. Failures are reported through the host and leave
    /// the viewer empty but usable.
    pub fn view(
        &mut self,
        asset: AssetRef,
        root_path: &str,
        bundle: &ResourceBundle,
    ) -> Option<Arc<LoadedModel>> {
        self.viewer.clear();
        self.host.set_spinner_visible(true);

        let mut blob_handle = None;
        let url = match asset {
            AssetRef::Url(url) => url,
            AssetRef::Blob(bytes) => {
                let handle = self.viewer.object_urls().create(bytes);
                let url = handle.as_str().to_string();
                blob_handle = Some(handle);
                url
            }
        };
        log::debug!("Showing {} with {} bundle entries", url, bundle.len());
        let result = self.viewer.load(&url, root_path, bundle);
        drop(blob_handle);
        self.host.set_spinner_visible(false);

        match result {
            Ok(LoadOutcome::Loaded(model)) => {
                for observer in &mut self.observers {
                    observer(&model);
                }
                self.last_loaded = Some(model.clone());
                Some(model)
            }
            Ok(LoadOutcome::Superseded) => None,
            Err(err) => {
                log::error!("Failed to load {}: {}", url, err);
                let mut source = err.source();
                while let Some(cause) = source {
                    log::error!("  caused by: {}", cause);
                    source = cause.source();
                }
                self.host.alert(&err.user_message());
                None
            }
        }
    }

    /// Enters or leaves fullscreen and resizes for the new mode.
    pub fn toggle_fullscreen(&mut self) {
        let switched = if self.host.fullscreen_active() {
            self.host.exit_fullscreen()
        } else {
            self.host.request_fullscreen()
        };
        if !switched {
            log::warn!("Fullscreen is not available in this host");
            return;
        }
        self.fullscreen_changed();
    }

    /// Host notification that the fullscreen mode changed, by us or by the user.
    pub fn fullscreen_changed(&mut self) {
        self.viewer.fullscreen_changed(self.host.fullscreen_active());
        self.resize();
    }

    pub fn resize(&mut self) {
        self.viewer
            .resize(self.host.parent_size(), self.host.viewport_size());
    }

    /// Render loop tick; `time_ms` is a monotonically increasing timestamp.
    pub fn animate(&mut self, time_ms: f64) {
        self.viewer.animate(time_ms);
    }
}
