use super::{NodeId, SceneGraph};
use glam::{Quat, Vec3};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CLIP_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a clip. Clones share it; clips with equal names do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Keyframes {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(values) | Keyframes::Scale(values) => values.len(),
            Keyframes::Rotation(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One animated property of one node, addressed by the node's index in the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub target: usize,
    pub times: Vec<f32>,
    pub values: Keyframes,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    id: ClipId,
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|channel| channel.times.last().copied())
            .fold(0.0_f32, f32::max);
        Self {
            id: ClipId(NEXT_CLIP_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            duration,
            channels,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }
}

/// Renames clips sharing a name to `name_1`, `name_2`, ... so names stay one-to-one
/// with clips. The first clip keeps its name.
pub fn dedupe_clip_names(clips: &mut [AnimationClip]) {
    let mut taken: HashSet<String> = HashSet::with_capacity(clips.len());
    let mut duplicates = Vec::new();
    for (index, clip) in clips.iter().enumerate() {
        if !taken.insert(clip.name.clone()) {
            duplicates.push(index);
        }
    }
    for index in duplicates {
        let base = clips[index].name.clone();
        let renamed = (1..)
            .map(|suffix| format!("{}_{}", base, suffix))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or(base);
        log::debug!("Clip '{}' renamed to '{}'", clips[index].name, renamed);
        taken.insert(renamed.clone());
        clips[index].name = renamed;
    }
}

#[derive(Debug, Clone)]
pub struct ClipAction {
    clip: AnimationClip,
    time: f32,
    playing: bool,
}

impl ClipAction {
    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_running(&self) -> bool {
        self.playing
    }

    pub fn reset(&mut self) -> &mut Self {
        self.time = 0.0;
        self
    }

    pub fn play(&mut self) -> &mut Self {
        self.playing = true;
        self
    }

    pub fn stop(&mut self) -> &mut Self {
        self.playing = false;
        self.time = 0.0;
        self
    }
}

/// Plays clips against the nodes below one root of a scene graph.
#[derive(Debug)]
pub struct AnimationMixer {
    root: NodeId,
    bindings: HashMap<usize, NodeId>,
    actions: Vec<ClipAction>,
    time_scale: f32,
}

impl AnimationMixer {
    pub fn new(graph: &SceneGraph, root: NodeId) -> Self {
        let mut bindings = HashMap::new();
        graph.traverse(root, |id, node| {
            if let Some(index) = node.source_index {
                bindings.entry(index).or_insert(id);
            }
        });
        Self {
            root,
            bindings,
            actions: Vec::new(),
            time_scale: 1.0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale;
    }

    /// Returns the action for `clip`, creating a stopped one on first use.
    pub fn clip_action(&mut self, clip: &AnimationClip) -> &mut ClipAction {
        let index = match self
            .actions
            .iter()
            .position(|action| action.clip.id == clip.id)
        {
            Some(index) => index,
            None => {
                self.actions.push(ClipAction {
                    clip: clip.clone(),
                    time: 0.0,
                    playing: false,
                });
                self.actions.len() - 1
            }
        };
        &mut self.actions[index]
    }

    pub fn action_mut(&mut self, name: &str) -> Option<&mut ClipAction> {
        self.actions
            .iter_mut()
            .find(|action| action.clip.name == name)
    }

    pub fn actions(&self) -> &[ClipAction] {
        &self.actions
    }

    pub fn stop_all_action(&mut self) {
        for action in &mut self.actions {
            action.stop();
        }
    }

    /// Advances running actions by `dt` seconds and writes the sampled poses into `graph`.
    pub fn update(&mut self, dt: f32, graph: &mut SceneGraph) {
        let step = dt * self.time_scale;
        for action in self.actions.iter_mut().filter(|action| action.playing) {
            let duration = action.clip.duration;
            action.time = if duration > 0.0 {
                (action.time + step).rem_euclid(duration)
            } else {
                0.0
            };
            for channel in &action.clip.channels {
                let Some(node) = self
                    .bindings
                    .get(&channel.target)
                    .and_then(|id| graph.get_mut(*id))
                else {
                    continue;
                };
                apply_channel(channel, action.time, &mut node.transform);
            }
        }
    }
}

fn apply_channel(channel: &Channel, time: f32, transform: &mut super::Transform) {
    if channel.times.is_empty() || channel.values.len() != channel.times.len() {
        return;
    }
    let (from, to, factor) = sample_index(&channel.times, time);
    let factor = match channel.interpolation {
        Interpolation::Step => 0.0,
        Interpolation::Linear => factor,
    };
    match &channel.values {
        Keyframes::Translation(values) => {
            transform.translation = values[from].lerp(values[to], factor);
        }
        Keyframes::Scale(values) => {
            transform.scale = values[from].lerp(values[to], factor);
        }
        Keyframes::Rotation(values) => {
            transform.rotation = values[from].slerp(values[to], factor).normalize();
        }
    }
}

/// Keyframe pair surrounding `time` and the blend factor between them.
fn sample_index(times: &[f32], time: f32) -> (usize, usize, f32) {
    let last = times.len() - 1;
    let next = times.partition_point(|key| *key <= time);
    if next == 0 {
        return (0, 0, 0.0);
    }
    if next > last {
        return (last, last, 0.0);
    }
    let previous = next - 1;
    let span = times[next] - times[previous];
    let factor = if span > 0.0 {
        (time - times[previous]) / span
    } else {
        0.0
    };
    (previous, next, factor)
}

#[cfg(test)]
mod tests {
    use super::{
        dedupe_clip_names, sample_index, AnimationClip, AnimationMixer, Channel, Interpolation,
        Keyframes,
    };
    use crate::scene::{Node, SceneGraph};
    use glam::{Quat, Vec3};

    fn graph_with_target() -> (SceneGraph, crate::scene::NodeId) {
        let mut graph = SceneGraph::new("root");
        let mut node = Node::group("animated");
        node.source_index = Some(3);
        let id = graph.add(graph.root(), node);
        (graph, id)
    }

    fn slide(interpolation: Interpolation) -> AnimationClip {
        AnimationClip::new(
            "slide",
            vec![Channel {
                target: 3,
                times: vec![0.0, 2.0],
                values: Keyframes::Translation(vec![Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)]),
                interpolation,
            }],
        )
    }

    #[test]
    fn same_named_clips_get_separate_actions() {
        let (graph, _) = graph_with_target();
        let mut mixer = AnimationMixer::new(&graph, graph.root());
        let first = slide(Interpolation::Linear);
        let second = slide(Interpolation::Step);
        mixer.clip_action(&first).play();
        mixer.clip_action(&second).play();
        mixer.clip_action(&first.clone()).play();
        assert_eq!(mixer.actions().len(), 2);
        assert!(mixer.actions().iter().all(|action| action.is_running()));
    }

    #[test]
    fn duplicate_clip_names_get_suffixes() {
        let mut clips = vec![
            AnimationClip::new("Take", Vec::new()),
            AnimationClip::new("Take_1", Vec::new()),
            AnimationClip::new("Take", Vec::new()),
            AnimationClip::new("Take", Vec::new()),
            AnimationClip::new("Run", Vec::new()),
        ];
        dedupe_clip_names(&mut clips);
        let names: Vec<_> = clips.iter().map(|clip| clip.name.as_str()).collect();
        assert_eq!(names, vec!["Take", "Take_1", "Take_2", "Take_3", "Run"]);
    }

    #[test]
    fn sample_index_clamps_outside_the_key_range() {
        let times = [0.5, 1.0, 2.0];
        assert_eq!(sample_index(&times, 0.0), (0, 0, 0.0));
        assert_eq!(sample_index(&times, 5.0), (2, 2, 0.0));
        let (from, to, factor) = sample_index(&times, 1.5);
        assert_eq!((from, to), (1, 2));
        assert!((factor - 0.5).abs() < 1e-6);
    }

    #[test]
    fn linear_channel_interpolates_translation() {
        let (mut graph, id) = graph_with_target();
        let mut mixer = AnimationMixer::new(&graph, graph.root());
        let clip = slide(Interpolation::Linear);
        mixer.clip_action(&clip).reset().play();
        mixer.update(0.5, &mut graph);
        let translation = graph.get(id).unwrap().transform.translation;
        assert!((translation.x - 1.0).abs() < 1e-5);
        assert_eq!(clip.duration, 2.0);
    }

    #[test]
    fn step_channel_holds_previous_key_and_time_wraps() {
        let (mut graph, id) = graph_with_target();
        let mut mixer = AnimationMixer::new(&graph, graph.root());
        let clip = slide(Interpolation::Step);
        mixer.clip_action(&clip).play();
        mixer.update(1.5, &mut graph);
        assert_eq!(graph.get(id).unwrap().transform.translation, Vec3::ZERO);

        mixer.update(1.0, &mut graph);
        let action = mixer.action_mut("slide").unwrap();
        assert!((action.time() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn time_scale_and_stopped_actions() {
        let (mut graph, id) = graph_with_target();
        let mut mixer = AnimationMixer::new(&graph, graph.root());
        let clip = AnimationClip::new(
            "spin",
            vec![Channel {
                target: 3,
                times: vec![0.0, 1.0],
                values: Keyframes::Rotation(vec![
                    Quat::IDENTITY,
                    Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
                ]),
                interpolation: Interpolation::Linear,
            }],
        );
        mixer.clip_action(&clip).play();
        mixer.set_time_scale(0.0);
        mixer.update(0.5, &mut graph);
        let rotation = graph.get(id).unwrap().transform.rotation;
        assert!(rotation.angle_between(Quat::IDENTITY) < 1e-4);

        mixer.set_time_scale(1.0);
        mixer.stop_all_action();
        mixer.update(0.5, &mut graph);
        assert!(!mixer.actions()[0].is_running());
        let rotation = graph.get(id).unwrap().transform.rotation;
        assert!(rotation.angle_between(Quat::IDENTITY) < 1e-4);
    }
}
