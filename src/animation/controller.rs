//! Time-driven controllers.
//!
//! A controller binds one or more target nodes to one interpolator and
//! advances them every frame. Rebuilding from the source record replaces
//! the owned interpolator wholesale; nothing dangles across asset-change
//! notifications.

use std::sync::Arc;

use log::warn;
use smallvec::SmallVec;

use crate::animation::interpolator::Interpolator;
use crate::animation::timing::{ControllerFlags, TimeMapping};
use crate::scene::{NodeHandle, Scene};
use crate::source::Record;

/// Observable controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No resolved targets; advancing is a no-op.
    Unbound,
    /// Bound but flagged inactive; targets show their baseline state.
    Inactive,
    /// Bound and animating.
    Active,
}

/// A controller driving the properties of its target nodes from one
/// interpolator. With more than one target the same mapped time fans out
/// to all of them.
#[derive(Debug)]
pub struct Controller {
    source: Arc<Record>,
    targets: SmallVec<[NodeHandle; 1]>,
    pub timing: TimeMapping,
    active: bool,
    was_active: bool,
    interpolator: Option<Interpolator>,
    /// Placement node for particle controllers; defaults to the target.
    emitter: Option<NodeHandle>,
}

impl Controller {
    /// Builds a controller from its record and resolves its named targets
    /// against the scene. Names absent from the scene are skipped without
    /// diagnostics: sequences and controller sets are routinely authored
    /// against a superset of nodes.
    #[must_use]
    pub fn from_record(source: Arc<Record>, scene: &Scene) -> Self {
        let mut controller = Self {
            source,
            targets: SmallVec::new(),
            timing: TimeMapping::default(),
            active: false,
            was_active: false,
            interpolator: None,
            emitter: None,
        };
        controller.rebuild(scene);
        controller
    }

    /// A controller with explicit timing and interpolator, bound later.
    /// Sequence playback builds its controllers this way.
    #[must_use]
    pub fn with_parts(
        source: Arc<Record>,
        timing: TimeMapping,
        interpolator: Interpolator,
    ) -> Self {
        Self {
            source,
            targets: SmallVec::new(),
            timing,
            active: true,
            was_active: false,
            interpolator: Some(interpolator),
            emitter: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        if self.targets.is_empty() {
            ControllerState::Unbound
        } else if self.active {
            ControllerState::Active
        } else {
            ControllerState::Inactive
        }
    }

    #[inline]
    #[must_use]
    pub fn targets(&self) -> &[NodeHandle] {
        &self.targets
    }

    /// Replaces the bound target set.
    pub fn bind(&mut self, targets: impl IntoIterator<Item = NodeHandle>) {
        self.targets = targets.into_iter().collect();
    }

    /// Flips the activity flag. Deactivating reverts targets on the next
    /// [`Controller::advance`].
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Overrides the emitter placement node (particle controllers).
    pub fn set_emitter(&mut self, emitter: Option<NodeHandle>) {
        self.emitter = emitter;
    }

    /// Re-reads timing, flags, targets and data from the source record,
    /// replacing the owned interpolator. Called after the underlying
    /// asset data changes.
    pub fn rebuild(&mut self, scene: &Scene) {
        self.timing = TimeMapping::from_record(&self.source);
        let flags =
            ControllerFlags::from_bits_retain(self.source.uint("Flags").unwrap_or(0) as u16);
        self.active = flags.is_active();

        self.targets = self
            .source
            .texts("Targets")
            .iter()
            .filter_map(|name| scene.find_node(name))
            .collect();
        self.emitter = self
            .source
            .text("Emitter")
            .and_then(|name| scene.find_node(name));

        self.interpolator = match self.source.child("Data") {
            Some(data) => match Interpolator::from_record(data) {
                Ok(interpolator) => Some(interpolator),
                Err(err) => {
                    warn!("controller data rejected: {err}");
                    None
                }
            },
            None => None,
        };
    }

    /// Advances to `scene_time`, evaluating the interpolator at the
    /// mapped local time and writing into every target. On the
    /// active→inactive edge, targets re-derive their baseline from their
    /// own source records.
    pub fn advance(&mut self, scene: &mut Scene, scene_time: f32) {
        if self.targets.is_empty() {
            return;
        }

        if !self.active {
            if self.was_active {
                for &target in &self.targets {
                    if let Some(node) = scene.nodes.get_mut(target) {
                        node.revert_to_baseline();
                    }
                }
                self.was_active = false;
            }
            return;
        }
        self.was_active = true;

        let local = self.timing.map(scene_time);
        let Some(interpolator) = self.interpolator.as_mut() else {
            return;
        };

        match interpolator {
            Interpolator::Particle(sim) => {
                for &target in &self.targets {
                    let Some(target_node) = scene.nodes.get(target) else {
                        continue;
                    };
                    let target_world = *target_node.world();
                    let target_visible = target_node.visible;
                    let Some(mesh_key) = target_node.mesh else {
                        continue;
                    };
                    let emitter_node = self.emitter.and_then(|handle| scene.nodes.get(handle));
                    let emitter_world = emitter_node.map_or(target_world, |node| *node.world());
                    let visible = emitter_node.map_or(target_visible, |node| node.visible);
                    let Some(mesh) = scene.meshes.get_mut(mesh_key) else {
                        continue;
                    };
                    sim.update(local, &emitter_world, &target_world, visible, mesh);
                }
            }
            other => {
                for &target in &self.targets {
                    if let Some(node) = scene.nodes.get_mut(target) {
                        other.apply(local, node);
                    }
                }
            }
        }
    }
}
