#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod animation;
pub mod curve;
pub mod errors;
pub mod particles;
pub mod scene;
pub mod skinning;
pub mod source;

pub use animation::{
    Controller, ControllerState, Extrapolation, Interpolator, Sequence, SequencePlayer,
    TimeMapping,
};
pub use curve::{Interpolation, Key, KeyedCurve, SplineTransform};
pub use errors::{Result, SinewError};
pub use particles::{EmitterSettings, GravityField, ParticleSim};
pub use scene::{Appearance, BoundingSphere, Mesh, MeshKey, Node, NodeHandle, Scene, Trs};
pub use skinning::{Skin, SkinPartition, SkinWeights};
pub use source::{Record, Value};
