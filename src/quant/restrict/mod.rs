//! Value restriction engine
//!
//! Restricts learned values (typically scales) to floats, integers or powers
//! of two. Each strategy exposes an init-time mapping for floats and tensors,
//! runtime transform units, and its own forward transform;
//! [`RestrictClampValue`] adds an optional floor in front.

mod clamp;
mod function;
mod value;

pub use clamp::RestrictClampValue;
pub use function::{FloatToIntImplType, TransformUnit};
pub use value::{RestrictValue, RestrictValueType};
