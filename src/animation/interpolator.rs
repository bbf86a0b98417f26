//! Typed interpolators.
//!
//! One interpolator per target-property kind. Each wraps keyed curves (or
//! a B-spline transform) and knows which field of the target node its
//! decoded value lands in. The kind set is closed, so dispatch is a plain
//! `match` rather than a trait object.

use glam::{Quat, Vec3, Vec4};

use crate::curve::{KeyedCurve, SplineTransform};
use crate::errors::{Result, SinewError};
use crate::particles::ParticleSim;
use crate::scene::node::Node;
use crate::source::Record;

/// Texture-coordinate channel a [`TextureTransformInterp`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexChannel {
    TranslateU,
    TranslateV,
    Rotate,
    ScaleU,
    ScaleV,
}

impl TexChannel {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::TranslateV,
            2 => Self::Rotate,
            3 => Self::ScaleU,
            4 => Self::ScaleV,
            _ => Self::TranslateU,
        }
    }
}

/// Transform channels, either explicit keys or a shared B-spline buffer.
#[derive(Debug, Clone)]
pub enum TransformSource {
    Keyed {
        translation: KeyedCurve<Vec3>,
        rotation: KeyedCurve<Quat>,
        scale: KeyedCurve<f32>,
    },
    Spline(SplineTransform),
}

#[derive(Debug, Clone)]
pub struct TransformInterp {
    source: TransformSource,
}

impl TransformInterp {
    #[must_use]
    pub fn keyed(
        translation: KeyedCurve<Vec3>,
        rotation: KeyedCurve<Quat>,
        scale: KeyedCurve<f32>,
    ) -> Self {
        Self {
            source: TransformSource::Keyed {
                translation,
                rotation,
                scale,
            },
        }
    }

    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        Self {
            source: TransformSource::Keyed {
                translation: rec
                    .child("Translations")
                    .map(KeyedCurve::from_record)
                    .unwrap_or_default(),
                rotation: rec
                    .child("Rotations")
                    .map(KeyedCurve::from_record)
                    .unwrap_or_default(),
                scale: rec
                    .child("Scales")
                    .map(KeyedCurve::from_record)
                    .unwrap_or_default(),
            },
        }
    }

    #[must_use]
    pub fn spline(spline: SplineTransform) -> Self {
        Self {
            source: TransformSource::Spline(spline),
        }
    }

    /// Writes whichever channels have data; channels without keys leave
    /// the node's transform untouched.
    pub fn apply(&mut self, time: f32, node: &mut Node) {
        match &mut self.source {
            TransformSource::Keyed {
                translation,
                rotation,
                scale,
            } => {
                if let Some(value) = translation.interpolate(time) {
                    node.transform.translation = value;
                }
                if let Some(value) = rotation.interpolate(time) {
                    node.transform.rotation = value;
                }
                if let Some(value) = scale.interpolate(time) {
                    node.transform.scale = value;
                }
            }
            TransformSource::Spline(spline) => {
                if let Some(value) = spline.sample_translation(time) {
                    node.transform.translation = value;
                }
                if let Some(value) = spline.sample_rotation(time) {
                    node.transform.rotation = value;
                }
                if let Some(value) = spline.sample_scale(time) {
                    node.transform.scale = value;
                }
            }
        }
    }
}

/// Color keys come in opaque and alpha-carrying flavors.
#[derive(Debug, Clone)]
pub enum ColorCurve {
    Rgb(KeyedCurve<Vec3>),
    Rgba(KeyedCurve<Vec4>),
}

#[derive(Debug, Clone)]
pub struct ColorInterp {
    curve: ColorCurve,
}

impl ColorInterp {
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        // The value array's element type decides the flavor
        let curve = if rec.color4s("Value").is_some() {
            ColorCurve::Rgba(KeyedCurve::from_record(rec))
        } else {
            ColorCurve::Rgb(KeyedCurve::from_record(rec))
        };
        Self { curve }
    }

    pub fn apply(&mut self, time: f32, node: &mut Node) {
        match &mut self.curve {
            ColorCurve::Rgb(curve) => {
                if let Some(value) = curve.interpolate(time) {
                    node.appearance.color = value;
                }
            }
            ColorCurve::Rgba(curve) => {
                if let Some(value) = curve.interpolate(time) {
                    node.appearance.color = value.truncate();
                    node.appearance.alpha = value.w;
                }
            }
        }
    }
}

/// Flip-book frame selection: explicit float keys, or uniform stepping at
/// `delta` seconds per frame.
#[derive(Debug, Clone)]
pub enum FlipSource {
    Keyed(KeyedCurve<f32>),
    Uniform { delta: f32, frame_count: usize },
}

#[derive(Debug, Clone)]
pub struct TextureFlipInterp {
    source: FlipSource,
}

impl TextureFlipInterp {
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        let delta = rec.float("Delta").unwrap_or(0.0);
        let source = if delta > 0.0 {
            FlipSource::Uniform {
                delta,
                frame_count: rec.uint("Frame Count").unwrap_or(0) as usize,
            }
        } else {
            FlipSource::Keyed(KeyedCurve::from_record(rec))
        };
        Self { source }
    }

    pub fn apply(&mut self, time: f32, node: &mut Node) {
        match &mut self.source {
            FlipSource::Keyed(curve) => {
                if let Some(value) = curve.interpolate(time) {
                    node.appearance.frame = value.max(0.0) as usize;
                }
            }
            FlipSource::Uniform { delta, frame_count } => {
                let frame = (time.max(0.0) / *delta) as usize;
                node.appearance.frame = if *frame_count > 0 {
                    frame.min(*frame_count - 1)
                } else {
                    frame
                };
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureTransformInterp {
    channel: TexChannel,
    curve: KeyedCurve<f32>,
}

impl TextureTransformInterp {
    #[must_use]
    pub fn new(channel: TexChannel, curve: KeyedCurve<f32>) -> Self {
        Self { channel, curve }
    }

    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        Self {
            channel: TexChannel::from_raw(rec.uint("Channel").unwrap_or(0)),
            curve: KeyedCurve::from_record(rec),
        }
    }

    pub fn apply(&mut self, time: f32, node: &mut Node) {
        let Some(value) = self.curve.interpolate(time) else {
            return;
        };
        let appearance = &mut node.appearance;
        match self.channel {
            TexChannel::TranslateU => appearance.uv_offset.x = value,
            TexChannel::TranslateV => appearance.uv_offset.y = value,
            TexChannel::Rotate => appearance.uv_rotation = value,
            TexChannel::ScaleU => appearance.uv_scale.x = value,
            TexChannel::ScaleV => appearance.uv_scale.y = value,
        }
    }
}

/// The closed set of property-kind interpolators.
#[derive(Debug)]
pub enum Interpolator {
    Transform(TransformInterp),
    Float(KeyedCurve<f32>),
    Color(ColorInterp),
    Visibility(KeyedCurve<bool>),
    TextureFlip(TextureFlipInterp),
    TextureTransform(TextureTransformInterp),
    Particle(Box<ParticleSim>),
}

impl Interpolator {
    /// Builds the interpolator matching a data record's kind.
    pub fn from_record(rec: &Record) -> Result<Self> {
        match rec.kind() {
            "TransformData" => Ok(Self::Transform(TransformInterp::from_record(rec))),
            "SplineTransformData" => Ok(Self::Transform(TransformInterp::spline(
                SplineTransform::from_record(rec)?,
            ))),
            "FloatData" => Ok(Self::Float(KeyedCurve::from_record(rec))),
            "ColorData" => Ok(Self::Color(ColorInterp::from_record(rec))),
            "BoolData" => Ok(Self::Visibility(KeyedCurve::from_record(rec))),
            "FlipData" => Ok(Self::TextureFlip(TextureFlipInterp::from_record(rec))),
            "UVData" => Ok(Self::TextureTransform(TextureTransformInterp::from_record(
                rec,
            ))),
            "EmitterData" => Ok(Self::Particle(Box::new(ParticleSim::from_record(rec)?))),
            other => Err(SinewError::UnknownKind(other.to_string())),
        }
    }

    /// Evaluates at controller-local `time` and writes into the node.
    ///
    /// The `Particle` variant needs world transforms and the target mesh;
    /// the controller drives it separately and this is a no-op for it.
    pub fn apply(&mut self, time: f32, node: &mut Node) {
        match self {
            Self::Transform(interp) => interp.apply(time, node),
            Self::Float(curve) => {
                if let Some(value) = curve.interpolate(time) {
                    node.appearance.alpha = value;
                }
            }
            Self::Color(interp) => interp.apply(time, node),
            Self::Visibility(curve) => {
                if let Some(value) = curve.interpolate(time) {
                    node.visible = value;
                }
            }
            Self::TextureFlip(interp) => interp.apply(time, node),
            Self::TextureTransform(interp) => interp.apply(time, node),
            Self::Particle(_) => {}
        }
    }

    #[must_use]
    pub fn as_particle_mut(&mut self) -> Option<&mut ParticleSim> {
        match self {
            Self::Particle(sim) => Some(sim),
            _ => None,
        }
    }
}
