use crate::scene::{NodeId, SceneGraph};
use glam::Vec3;

/// Duration of camera transitions.
pub const TRANSITION_MS: f64 = 400.0;

/// Cubic ease-in-out over `t` in `[0, 1]`.
pub fn cubic_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0) * 2.0;
    if t < 1.0 {
        0.5 * t * t * t
    } else {
        let t = t - 2.0;
        0.5 * (t * t * t + 2.0)
    }
}

/// Eases the translation of one node between two positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    target: NodeId,
    from: Vec3,
    to: Vec3,
    duration_ms: f64,
    started_ms: Option<f64>,
}

impl Tween {
    pub fn new(target: NodeId, from: Vec3, to: Vec3, duration_ms: f64) -> Self {
        Self {
            target,
            from,
            to,
            duration_ms,
            started_ms: None,
        }
    }

    /// Applies the value for `now_ms`; the clock starts on the first call.
    /// Returns true once the end value has been written.
    fn update(&mut self, now_ms: f64, graph: &mut SceneGraph) -> bool {
        let started = *self.started_ms.get_or_insert(now_ms);
        let progress = if self.duration_ms > 0.0 {
            ((now_ms - started) / self.duration_ms).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };
        if let Some(node) = graph.get_mut(self.target) {
            node.transform.translation = self.from.lerp(self.to, cubic_in_out(progress));
        }
        progress >= 1.0
    }
}

#[derive(Debug, Default)]
pub struct TweenGroup {
    tweens: Vec<Tween>,
}

impl TweenGroup {
    pub fn add(&mut self, tween: Tween) {
        self.tweens.push(tween);
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn clear(&mut self) {
        self.tweens.clear();
    }

    /// Advances every tween and drops the finished ones, returning how many finished.
    pub fn update(&mut self, now_ms: f64, graph: &mut SceneGraph) -> usize {
        let before = self.tweens.len();
        self.tweens.retain_mut(|tween| !tween.update(now_ms, graph));
        before - self.tweens.len()
    }
}
