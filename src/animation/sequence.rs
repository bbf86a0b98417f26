//! Named animation clips and sequence switching.
//!
//! A sequence is a time-bounded clip binding interpolator data to scene
//! targets by name. Exactly one sequence is current at a time; switching
//! rebinds a fresh controller set against the live scene. Per-entry
//! failures never abort a switch: a target name missing from the scene is
//! expected (sequences are authored against a superset of nodes) and is
//! skipped without even a diagnostic, while malformed entries are skipped
//! with one.

use std::sync::Arc;

use log::{debug, warn};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::animation::controller::Controller;
use crate::animation::interpolator::Interpolator;
use crate::animation::timing::TimeMapping;
use crate::scene::{NodeHandle, Scene};
use crate::source::Record;

/// One entry of a sequence: interpolator data plus the names of the nodes
/// it drives. More than one name fans the same animation out to every
/// resolved target.
#[derive(Debug, Clone)]
pub struct SequenceBinding {
    record: Arc<Record>,
    pub targets: Vec<String>,
    pub emitter: Option<String>,
    pub data: Option<Arc<Record>>,
}

impl SequenceBinding {
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        let record = Arc::new(rec.clone());
        Self {
            targets: record.texts("Targets").to_vec(),
            emitter: record.text("Emitter").map(str::to_string),
            data: record.child("Data").cloned().map(Arc::new),
            record,
        }
    }
}

/// A named animation clip.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub name: String,
    pub timing: TimeMapping,
    pub bindings: Vec<SequenceBinding>,
}

impl Sequence {
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        Self {
            name: rec.text("Name").unwrap_or_default().to_string(),
            timing: TimeMapping::from_record(rec),
            bindings: rec
                .children("Bindings")
                .iter()
                .map(SequenceBinding::from_record)
                .collect(),
        }
    }
}

/// Owns the sequence registry and the controllers of the current clip.
#[derive(Debug, Default)]
pub struct SequencePlayer {
    sequences: FxHashMap<String, Sequence>,
    current: Option<String>,
    controllers: Vec<Controller>,
}

impl SequencePlayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sequence(&mut self, sequence: Sequence) {
        self.sequences.insert(sequence.name.clone(), sequence);
    }

    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    /// Selects the current sequence, replacing the previous controller
    /// set. Bindings resolve per-entry; a bad entry skips, the rest bind.
    pub fn set_sequence(&mut self, name: &str, scene: &Scene) {
        let Some(sequence) = self.sequences.get(name) else {
            debug!("sequence `{name}` is not registered");
            return;
        };
        self.current = Some(name.to_string());
        self.controllers.clear();

        for binding in &sequence.bindings {
            let Some(data) = &binding.data else {
                warn!(
                    "sequence `{name}`: binding for {:?} has no interpolator data, skipping",
                    binding.targets,
                );
                continue;
            };
            let interpolator = match Interpolator::from_record(data) {
                Ok(interpolator) => interpolator,
                Err(err) => {
                    warn!("sequence `{name}`: binding rejected ({err}), skipping");
                    continue;
                }
            };

            // Names absent from this scene are expected; no diagnostic.
            let resolved: SmallVec<[NodeHandle; 1]> = binding
                .targets
                .iter()
                .filter_map(|target| scene.find_node(target))
                .collect();
            if resolved.is_empty() {
                continue;
            }

            let mut controller =
                Controller::with_parts(binding.record.clone(), sequence.timing, interpolator);
            controller.bind(resolved);
            controller.set_emitter(
                binding
                    .emitter
                    .as_deref()
                    .and_then(|emitter| scene.find_node(emitter)),
            );
            self.controllers.push(controller);
        }
    }

    /// Advances the current sequence's controllers (frame pass 1).
    pub fn advance(&mut self, scene: &mut Scene, scene_time: f32) {
        for controller in &mut self.controllers {
            controller.advance(scene, scene_time);
        }
    }
}
