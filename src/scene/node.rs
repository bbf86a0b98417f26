use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::scene::{MeshKey, NodeHandle};
use crate::scene::transform::Trs;
use crate::source::Record;

/// Animatable surface properties of a node.
///
/// Controllers write decoded values straight into these fields; the
/// rendering boundary reads them once per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Appearance {
    pub color: Vec3,
    pub alpha: f32,
    pub uv_offset: Vec2,
    pub uv_scale: Vec2,
    pub uv_rotation: f32,
    /// Current flip-book frame index.
    pub frame: usize,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            alpha: 1.0,
            uv_offset: Vec2::ZERO,
            uv_scale: Vec2::ONE,
            uv_rotation: 0.0,
            frame: 0,
        }
    }
}

impl Appearance {
    /// Reads the baseline appearance out of a node record; absent fields
    /// take their defaults.
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        let default = Self::default();
        Self {
            color: rec.vec3("Color").unwrap_or(default.color),
            alpha: rec.float("Alpha").unwrap_or(default.alpha),
            uv_offset: rec.vec2("UV Offset").unwrap_or(default.uv_offset),
            uv_scale: rec.vec2("UV Scale").unwrap_or(default.uv_scale),
            uv_rotation: rec.float("UV Rotation").unwrap_or(default.uv_rotation),
            frame: rec.uint("Frame").unwrap_or(0) as usize,
        }
    }
}

/// A scene node: hierarchy links, the local transform, and the properties
/// animation controllers target.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    /// Local transform, the write target of transform controllers.
    pub transform: Trs,
    /// World transform, derived each frame (parents before children).
    pub(crate) world: Trs,

    pub visible: bool,
    pub appearance: Appearance,

    /// Mesh driven by this node, if any.
    pub mesh: Option<MeshKey>,

    /// The asset record this node was built from. Controllers re-derive
    /// baseline state from it when they deactivate; it is never written.
    pub source: Option<Arc<Record>>,
}

impl Node {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            transform: Trs::IDENTITY,
            world: Trs::IDENTITY,
            visible: true,
            appearance: Appearance::default(),
            mesh: None,
            source: None,
        }
    }

    /// Builds a node from its asset record, reading name, baseline
    /// transform, visibility and appearance, and keeping the record
    /// attached for later baseline reverts.
    #[must_use]
    pub fn from_record(rec: Arc<Record>) -> Self {
        let mut node = Self::new(rec.text("Name").unwrap_or_default());
        node.transform = Trs::from_record(&rec);
        node.visible = rec.boolean("Visible").unwrap_or(true);
        node.appearance = Appearance::from_record(&rec);
        node.source = Some(rec);
        node
    }

    /// Resets every animatable property to the baseline recorded in the
    /// node's source record. Nodes without a source reset to defaults.
    pub fn revert_to_baseline(&mut self) {
        match self.source.as_deref() {
            Some(rec) => {
                self.transform = Trs::from_record(rec);
                self.visible = rec.boolean("Visible").unwrap_or(true);
                self.appearance = Appearance::from_record(rec);
            }
            None => {
                self.transform = Trs::IDENTITY;
                self.visible = true;
                self.appearance = Appearance::default();
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    /// World transform as of the last hierarchy update.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &Trs {
        &self.world
    }
}
