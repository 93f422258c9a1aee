use super::{Aabb, Helper, Node, NodeKind};
use glam::Mat4;
use std::collections::HashMap;

/// Stable handle of a node inside one [`SceneGraph`]. A slot's generation is bumped
/// when its node is removed, so handles to removed nodes never resolve again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena of nodes forming a tree under a single root. Removed slots are reused
/// under a new generation.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    len: usize,
}

impl SceneGraph {
    pub fn new(root_name: &str) -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node::group(root_name)),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            len: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Inserts `node` as the last child of `parent`. Unknown parents fall back to the root.
    pub fn add(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let parent = if self.contains(parent) {
            parent
        } else {
            log::warn!("add: parent {:?} is not in the graph, using root", parent);
            self.root
        };
        node.parent = Some(parent);
        node.children.clear();
        let id = self.reserve();
        self.slots[id.index()].node = Some(node);
        self.len += 1;
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.push(id);
        }
        id
    }

    /// Removes `id` and its whole subtree, returning the removed nodes in pre-order.
    /// The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> Vec<Node> {
        if id == self.root || !self.contains(id) {
            return Vec::new();
        }
        self.detach(id);
        let order = self.descendants(id);
        let mut removed = Vec::with_capacity(order.len());
        for node_id in order {
            let slot = &mut self.slots[node_id.index()];
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(node_id.index);
                self.len -= 1;
                removed.push(node);
            }
        }
        removed
    }

    fn detach(&mut self, id: NodeId) {
        let parent = self.get(id).and_then(|node| node.parent);
        if let Some(parent) = parent.and_then(|parent| self.get_mut(parent)) {
            parent.children.retain(|child| *child != id);
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
        }
    }

    fn reserve(&mut self) -> NodeId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        NodeId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Pre-order list of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.get(current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn traverse(&self, id: NodeId, mut visit: impl FnMut(NodeId, &Node)) {
        for node_id in self.descendants(id) {
            if let Some(node) = self.get(node_id) {
                visit(node_id, node);
            }
        }
    }

    pub fn traverse_mut(&mut self, id: NodeId, mut visit: impl FnMut(NodeId, &mut Node)) {
        for node_id in self.descendants(id) {
            if let Some(node) = self.get_mut(node_id) {
                visit(node_id, node);
            }
        }
    }

    /// First node below `id` (inclusive) matching `predicate`, in pre-order.
    pub fn find(&self, id: NodeId, predicate: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|node_id| self.get(*node_id).is_some_and(&predicate))
    }

    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|node| node.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.get(parent).and_then(|node| node.parent);
        }
        depth
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.get(node_id) else {
                break;
            };
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// World-space bounds of every mesh at or below `id`.
    pub fn bounding_box(&self, id: NodeId) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.traverse(id, |node_id, node| {
            if let Some(mesh) = node.mesh() {
                bounds.union(&mesh.geometry.bounds.transformed(&self.world_matrix(node_id)));
            }
        });
        bounds
    }

    /// Moves every node of `other` under `parent`, returning the new id of its root.
    /// Node references inside `other` (children, skins, skeleton helpers) are remapped.
    pub fn attach(&mut self, parent: NodeId, mut other: SceneGraph) -> NodeId {
        let parent = if self.contains(parent) { parent } else { self.root };
        let order = other.descendants(other.root);
        let mut remap: HashMap<NodeId, NodeId> = HashMap::with_capacity(order.len());
        for old in &order {
            remap.insert(*old, self.reserve());
        }
        for old in order {
            let Some(mut node) = other.slots[old.index()].node.take() else {
                continue;
            };
            node.parent = node.parent.and_then(|id| remap.get(&id).copied());
            node.children = node
                .children
                .iter()
                .filter_map(|child| remap.get(child).copied())
                .collect();
            remap_kind(&mut node.kind, &remap);
            self.slots[remap[&old].index()].node = Some(node);
            self.len += 1;
        }
        let root = remap[&other.root];
        if let Some(node) = self.get_mut(root) {
            node.parent = Some(parent);
        }
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.push(root);
        }
        root
    }
}

fn remap_kind(kind: &mut NodeKind, remap: &HashMap<NodeId, NodeId>) {
    match kind {
        NodeKind::Mesh(mesh) => {
            if let Some(skin) = &mut mesh.skin {
                skin.joints = skin
                    .joints
                    .iter()
                    .filter_map(|joint| remap.get(joint).copied())
                    .collect();
            }
        }
        NodeKind::Helper(Helper::Skeleton { root, .. }) => {
            if let Some(mapped) = remap.get(root) {
                *root = *mapped;
            }
        }
        _ => {}
    }
}
