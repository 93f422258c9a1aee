/// What the viewer needs from the element or window it is embedded in.
pub trait HostContainer {
    /// Size of the container's parent, used while not fullscreen.
    fn parent_size(&self) -> (u32, u32);
    fn viewport_size(&self) -> (u32, u32);
    fn pixel_ratio(&self) -> f32;

    fn fullscreen_active(&self) -> bool;
    /// Returns false when the host has no fullscreen capability.
    fn request_fullscreen(&mut self) -> bool;
    fn exit_fullscreen(&mut self) -> bool;

    fn set_spinner_visible(&mut self, visible: bool);
    /// Blocking user notification.
    fn alert(&mut self, message: &str);
}

/// Host without a screen: fixed sizes, fullscreen simulated, notifications recorded.
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    pub parent: (u32, u32),
    pub viewport: (u32, u32),
    pub pixel_ratio: f32,
    pub fullscreen: bool,
    pub spinner_visible: bool,
    pub spinner_shown: u32,
    pub alerts: Vec<String>,
}

impl HeadlessHost {
    pub fn new(parent: (u32, u32)) -> Self {
        Self {
            parent,
            viewport: parent,
            pixel_ratio: 1.0,
            fullscreen: false,
            spinner_visible: false,
            spinner_shown: 0,
            alerts: Vec::new(),
        }
    }
}

impl HostContainer for HeadlessHost {
    fn parent_size(&self) -> (u32, u32) {
        self.parent
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn fullscreen_active(&self) -> bool {
        self.fullscreen
    }

    fn request_fullscreen(&mut self) -> bool {
        self.fullscreen = true;
        true
    }

    fn exit_fullscreen(&mut self) -> bool {
        self.fullscreen = false;
        true
    }

    fn set_spinner_visible(&mut self, visible: bool) {
        if visible && !self.spinner_visible {
            self.spinner_shown += 1;
        }
        self.spinner_visible = visible;
    }

    fn alert(&mut self, message: &str) {
        log::warn!("{}", message);
        self.alerts.push(message.to_string());
    }
}
