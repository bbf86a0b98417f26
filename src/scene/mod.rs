//! Scene graph and frame driver.
//!
//! Evaluation for a frame is a fixed two-pass order: pass 1 advances every
//! controller (mutating node transforms and properties) and then refreshes
//! world transforms parents-before-children; pass 2 deforms skinned meshes
//! from the bone transforms pass 1 produced. Everything is synchronous and
//! single-threaded; stopping the clock is simply not calling
//! [`Scene::advance`].

pub mod mesh;
pub mod node;
pub mod transform;

use log::warn;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::animation::{Controller, SequencePlayer};

pub use mesh::{BoundingSphere, Mesh};
pub use node::{Appearance, Node};
pub use transform::Trs;

new_key_type! {
    /// Handle of a [`Node`] in the scene's node pool.
    pub struct NodeHandle;
    /// Handle of a [`Mesh`] in the scene's mesh pool.
    pub struct MeshKey;
}

/// The live scene: node hierarchy, meshes, controllers and the sequence
/// player.
#[derive(Debug, Default)]
pub struct Scene {
    pub nodes: SlotMap<NodeHandle, Node>,
    pub root_nodes: Vec<NodeHandle>,
    pub meshes: SlotMap<MeshKey, Mesh>,

    /// Controllers declared directly by the asset.
    pub controllers: Vec<Controller>,
    /// Sequence registry and the current clip's controllers.
    pub player: SequencePlayer,

    /// Hosts can disable runtime skinning; meshes then keep their
    /// bind-pose buffers and move rigidly with their node.
    pub skinning_enabled: bool,

    // Name -> first node carrying it, built as nodes are added
    name_index: FxHashMap<String, NodeHandle>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            skinning_enabled: true,
            ..Self::default()
        }
    }

    /// Adds a root node.
    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        let name = node.name.clone();
        let handle = self.nodes.insert(node);
        self.root_nodes.push(handle);
        if !name.is_empty() {
            self.name_index.entry(name).or_insert(handle);
        }
        handle
    }

    /// Adds a node under `parent`.
    pub fn add_node_to(&mut self, node: Node, parent: NodeHandle) -> NodeHandle {
        let handle = self.add_node(node);
        self.attach(handle, parent);
        handle
    }

    /// Re-parents `child` under `parent`, keeping both ends in sync.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) {
        if child == parent {
            return;
        }
        if let Some(node) = self.nodes.get_mut(child) {
            if let Some(old_parent) = node.parent.take() {
                if let Some(old) = self.nodes.get_mut(old_parent) {
                    old.children.retain(|&c| c != child);
                }
            }
        } else {
            return;
        }
        self.root_nodes.retain(|&r| r != child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
    }

    #[inline]
    #[must_use]
    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    #[inline]
    #[must_use]
    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    /// Precomputed name lookup; the first node added under a name wins.
    #[must_use]
    pub fn find_node(&self, name: &str) -> Option<NodeHandle> {
        self.name_index.get(name).copied()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshKey {
        self.meshes.insert(mesh)
    }

    pub fn add_controller(&mut self, controller: Controller) {
        self.controllers.push(controller);
    }

    /// Rebuilds every asset-declared controller from its source record,
    /// after the underlying asset data changed.
    pub fn rebuild_controllers(&mut self) {
        let mut controllers = std::mem::take(&mut self.controllers);
        for controller in &mut controllers {
            controller.rebuild(self);
        }
        self.controllers = controllers;
    }

    /// Selects the current sequence; see [`SequencePlayer::set_sequence`].
    pub fn set_sequence(&mut self, name: &str) {
        let mut player = std::mem::take(&mut self.player);
        player.set_sequence(name, self);
        self.player = player;
    }

    /// Advances the whole scene to `scene_time`.
    pub fn advance(&mut self, scene_time: f32) {
        // Pass 1: controllers write property state. Controllers are taken
        // out for the walk so they can borrow the scene mutably.
        let mut controllers = std::mem::take(&mut self.controllers);
        for controller in &mut controllers {
            controller.advance(self, scene_time);
        }
        self.controllers = controllers;

        let mut player = std::mem::take(&mut self.player);
        player.advance(self, scene_time);
        self.player = player;

        // Bone nodes are controller targets too, so the hierarchy must be
        // final before any skin reads a bone transform.
        self.update_world_transforms();

        // Pass 2: skins.
        self.update_skins();
    }

    /// Recomputes world transforms, parents strictly before children.
    pub fn update_world_transforms(&mut self) {
        let mut stack: Vec<(NodeHandle, Trs)> = self
            .root_nodes
            .iter()
            .rev()
            .map(|&root| (root, Trs::IDENTITY))
            .collect();

        while let Some((handle, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(handle) else {
                continue;
            };
            let world = parent_world.compose(&node.transform);
            node.world = world;
            for i in (0..node.children.len()).rev() {
                let child = node.children[i];
                stack.push((child, world));
            }
        }
    }

    /// Runs the skin pipeline for every skinned mesh. Meshes without
    /// weights (or with skinning disabled) keep their bind-pose buffers
    /// and are positioned by their node transform alone.
    pub fn update_skins(&mut self) {
        if !self.skinning_enabled {
            return;
        }

        let bound: Vec<(MeshKey, Trs)> = self
            .nodes
            .values()
            .filter_map(|node| node.mesh.map(|mesh| (mesh, node.world)))
            .collect();

        for (mesh_key, geometry_world) in bound {
            let Some(mesh) = self.meshes.get(mesh_key) else {
                continue;
            };
            let Some(skin) = mesh.skin.as_ref() else {
                continue;
            };

            let inverse = geometry_world.inverse();
            let transforms: Vec<Trs> = skin
                .bones
                .iter()
                .enumerate()
                .map(|(i, &bone)| {
                    let bone_world = match self.nodes.get(bone) {
                        Some(node) => node.world,
                        None => {
                            warn!("skin of `{}`: bone {i} is gone, using identity", mesh.name);
                            Trs::IDENTITY
                        }
                    };
                    let bind = skin.skin_to_bone.get(i).copied().unwrap_or(Trs::IDENTITY);
                    inverse.compose(&bone_world).compose(&bind)
                })
                .collect();

            if let Some(mesh) = self.meshes.get_mut(mesh_key) {
                mesh.apply_skin(&transforms);
            }
        }
    }
}
