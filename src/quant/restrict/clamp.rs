//! Minimum clamp composed with a restriction strategy

use super::function::TransformUnit;
use super::value::RestrictValue;
use crate::autograd::Tensor;

/// Optional floor followed by an optional restriction
///
/// The floor is expressed in the strategy's internal domain: with a log2
/// strategy a `scaling_min_val` of 0.01 clamps at `log2(0.01)`.
#[derive(Clone, Debug, PartialEq)]
pub struct RestrictClampValue {
    clamp_min: TransformUnit,
    restrict: Option<RestrictValue>,
}

impl RestrictClampValue {
    /// Create the composition. A floor of `None` or `0.0` disables clamping.
    pub fn new(scaling_min_val: Option<f32>, restrict: Option<RestrictValue>) -> Self {
        let clamp_min = match scaling_min_val {
            Some(min_val) if min_val != 0.0 => {
                let floor = restrict.map_or(min_val, |r| r.restrict_init_float(min_val));
                TransformUnit::ClampMin(floor)
            }
            _ => TransformUnit::Identity,
        };
        Self {
            clamp_min,
            restrict,
        }
    }

    /// Floor in the restricted domain, if any
    pub fn floor(&self) -> Option<f32> {
        match self.clamp_min {
            TransformUnit::ClampMin(floor) => Some(floor),
            _ => None,
        }
    }

    pub fn restrict(&self) -> Option<&RestrictValue> {
        self.restrict.as_ref()
    }

    /// Clamp, then restrict
    pub fn forward(&self, x: &Tensor) -> Tensor {
        let x = self.clamp_min.forward(x);
        match &self.restrict {
            Some(restrict) => restrict.forward(&x),
            None => x,
        }
    }
}

impl Default for RestrictClampValue {
    fn default() -> Self {
        Self::new(None, None)
    }
}
