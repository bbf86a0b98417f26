pub mod bspline;
pub mod keyed;
pub mod values;

pub use bspline::{SplineChannel, SplineTransform, DEGREE};
pub use keyed::{CurveCursor, Interpolation, Key, KeyedCurve};
pub use values::Keyable;
