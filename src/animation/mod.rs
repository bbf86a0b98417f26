pub mod controller;
pub mod interpolator;
pub mod sequence;
pub mod timing;

pub use controller::{Controller, ControllerState};
pub use interpolator::{
    ColorInterp, Interpolator, TexChannel, TextureFlipInterp, TextureTransformInterp,
    TransformInterp,
};
pub use sequence::{Sequence, SequenceBinding, SequencePlayer};
pub use timing::{ControllerFlags, Extrapolation, TimeMapping};
