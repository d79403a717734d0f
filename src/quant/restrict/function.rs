//! Reusable forward-transform units
//!
//! A [`TransformUnit`] is what a restriction strategy hands out from
//! `restrict_init_module` and friends: a stateless elementwise transform that
//! can be applied on every forward pass.

use serde::{Deserialize, Serialize};

use crate::autograd::{self, Tensor};

/// Float-to-integer conversion used by integer-valued restrictions
///
/// Every variant has a straight-through gradient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FloatToIntImplType {
    /// Round half to even
    #[default]
    Round,
    Ceil,
    Floor,
    /// Truncate toward zero
    RoundToZero,
}

impl FloatToIntImplType {
    /// Apply the conversion to a tensor
    pub fn apply(self, x: &Tensor) -> Tensor {
        match self {
            FloatToIntImplType::Round => autograd::round_ste(x),
            FloatToIntImplType::Ceil => autograd::ceil_ste(x),
            FloatToIntImplType::Floor => autograd::floor_ste(x),
            FloatToIntImplType::RoundToZero => autograd::round_to_zero_ste(x),
        }
    }

    /// Apply the conversion to a single value
    pub fn apply_scalar(self, x: f32) -> f32 {
        match self {
            FloatToIntImplType::Round => x.round_ties_even(),
            FloatToIntImplType::Ceil => x.ceil(),
            FloatToIntImplType::Floor => x.floor(),
            FloatToIntImplType::RoundToZero => x.trunc(),
        }
    }
}

/// Stateless elementwise transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransformUnit {
    Identity,
    /// `log2(x)`
    LogTwo,
    /// `log2(x)`, overwriting its input when applied in place
    InplaceLogTwo,
    /// `2^x`
    PowerOfTwo,
    FloatToInt(FloatToIntImplType),
    /// `max(x, floor)` with a straight-through gradient
    ClampMin(f32),
}

impl TransformUnit {
    /// Apply the transform, leaving the input untouched
    pub fn forward(&self, x: &Tensor) -> Tensor {
        match self {
            TransformUnit::Identity => autograd::identity(x),
            TransformUnit::LogTwo | TransformUnit::InplaceLogTwo => autograd::log2(x),
            TransformUnit::PowerOfTwo => autograd::pow2(x),
            TransformUnit::FloatToInt(kind) => kind.apply(x),
            TransformUnit::ClampMin(floor) => autograd::clamp_min_ste(x, *floor),
        }
    }

    /// Apply the transform to `x`, reusing its storage when the unit allows it
    pub fn forward_inplace(&self, x: &mut Tensor) {
        match self {
            TransformUnit::Identity => {}
            TransformUnit::InplaceLogTwo => autograd::log2_inplace(x),
            _ => *x = self.forward(x),
        }
    }

    /// Whether `forward_inplace` mutates the input buffer
    pub fn is_inplace(&self) -> bool {
        matches!(self, TransformUnit::InplaceLogTwo)
    }
}
