//! Restriction strategies
//!
//! A strategy maps a scale (or any other positive quantity) into the domain it
//! is learned in and back:
//!
//! | Strategy   | init (float/tensor) | runtime forward      |
//! |------------|---------------------|----------------------|
//! | Float      | `x`                 | `x`                  |
//! | LogFloat   | `log2(x)`           | `2^x`                |
//! | Int        | `x`                 | `float_to_int(x)`    |
//! | PowerOfTwo | `log2(x)`           | `2^float_to_int(x)`  |
//!
//! The init-time maps and the unit returned by `restrict_init_module` always
//! agree (identity or `log2`), so a value initialized from a float and one
//! recomputed from raw statistics on every pass land in the same domain.

use serde::{Deserialize, Serialize};

use super::function::{FloatToIntImplType, TransformUnit};
use crate::autograd::{self, Tensor};

/// Serializable selector for a [`RestrictValue`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestrictValueType {
    /// Unrestricted floating point
    #[default]
    Fp,
    /// Floating point learned in the log2 domain
    Log2Fp,
    /// Integer values
    Int,
    /// Powers of two learned as integer exponents
    PowerOfTwo,
}

impl RestrictValueType {
    /// Whether values are learned as log2 exponents
    pub fn is_log_domain(self) -> bool {
        matches!(self, RestrictValueType::Log2Fp | RestrictValueType::PowerOfTwo)
    }
}

/// Value restriction strategy
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RestrictValue {
    Float,
    LogFloat,
    Int { float_to_int: FloatToIntImplType },
    PowerOfTwo { float_to_int: FloatToIntImplType },
}

impl RestrictValue {
    /// Integer restriction with round-half-to-even
    pub fn int() -> Self {
        RestrictValue::Int {
            float_to_int: FloatToIntImplType::Round,
        }
    }

    /// Power-of-two restriction with round-half-to-even on the exponent
    pub fn power_of_two() -> Self {
        RestrictValue::PowerOfTwo {
            float_to_int: FloatToIntImplType::Round,
        }
    }

    /// Build a strategy from its serializable selector
    ///
    /// `float_to_int` is ignored by the strategies that never round.
    pub fn from_type(kind: RestrictValueType, float_to_int: FloatToIntImplType) -> Self {
        match kind {
            RestrictValueType::Fp => RestrictValue::Float,
            RestrictValueType::Log2Fp => RestrictValue::LogFloat,
            RestrictValueType::Int => RestrictValue::Int { float_to_int },
            RestrictValueType::PowerOfTwo => RestrictValue::PowerOfTwo { float_to_int },
        }
    }

    /// Selector for this strategy
    pub fn kind(&self) -> RestrictValueType {
        match self {
            RestrictValue::Float => RestrictValueType::Fp,
            RestrictValue::LogFloat => RestrictValueType::Log2Fp,
            RestrictValue::Int { .. } => RestrictValueType::Int,
            RestrictValue::PowerOfTwo { .. } => RestrictValueType::PowerOfTwo,
        }
    }

    /// Map a plain scalar (e.g. a user supplied initial scale) into the
    /// strategy's internal domain
    pub fn restrict_init_float(&self, x: f32) -> f32 {
        if self.kind().is_log_domain() {
            x.log2()
        } else {
            x
        }
    }

    /// Elementwise counterpart of [`restrict_init_float`](Self::restrict_init_float)
    pub fn restrict_init_tensor(&self, x: &Tensor) -> Tensor {
        if self.kind().is_log_domain() {
            autograd::log2(x)
        } else {
            autograd::identity(x)
        }
    }

    /// Unit recomputing the init mapping from an unconstrained value on every pass
    pub fn restrict_init_module(&self) -> TransformUnit {
        if self.kind().is_log_domain() {
            TransformUnit::LogTwo
        } else {
            TransformUnit::Identity
        }
    }

    /// As [`restrict_init_module`](Self::restrict_init_module), but the unit may
    /// overwrite its input
    pub fn restrict_init_inplace_module(&self) -> TransformUnit {
        if self.kind().is_log_domain() {
            TransformUnit::InplaceLogTwo
        } else {
            TransformUnit::Identity
        }
    }

    /// Runtime transform from the internal domain back to restricted values
    pub fn forward(&self, x: &Tensor) -> Tensor {
        match self {
            RestrictValue::Float => autograd::identity(x),
            RestrictValue::LogFloat => autograd::pow2(x),
            RestrictValue::Int { float_to_int } => float_to_int.apply(x),
            RestrictValue::PowerOfTwo { float_to_int } => autograd::pow2(&float_to_int.apply(x)),
        }
    }
}

impl From<RestrictValueType> for RestrictValue {
    fn from(kind: RestrictValueType) -> Self {
        RestrictValue::from_type(kind, FloatToIntImplType::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn all_strategies() -> [RestrictValue; 4] {
        [
            RestrictValue::Float,
            RestrictValue::LogFloat,
            RestrictValue::int(),
            RestrictValue::power_of_two(),
        ]
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(200))]

        /// init_tensor agrees pointwise with init_float
        #[test]
        fn prop_init_tensor_matches_init_float(x in 1e-4f32..1e4) {
            for strategy in all_strategies() {
                let t = strategy.restrict_init_tensor(&Tensor::from_vec(vec![x], false));
                prop_assert_eq!(t.data()[0], strategy.restrict_init_float(x));
            }
        }

        /// init_module computes the same mapping as init_float
        #[test]
        fn prop_init_module_matches_init_float(x in 1e-4f32..1e4) {
            for strategy in all_strategies() {
                let input = Tensor::from_vec(vec![x], false);
                let unit = strategy.restrict_init_module();
                let mut inplace = input.clone();
                strategy.restrict_init_inplace_module().forward_inplace(&mut inplace);

                prop_assert_eq!(unit.forward(&input).data()[0], strategy.restrict_init_float(x));
                prop_assert_eq!(inplace.data()[0], strategy.restrict_init_float(x));
            }
        }

        /// PowerOfTwo always produces an exact power of two
        #[test]
        fn prop_power_of_two_output_is_power_of_two(x in 1e-3f32..1e3) {
            let strategy = RestrictValue::power_of_two();
            let init = strategy.restrict_init_float(x);
            let out = strategy.forward(&Tensor::scalar(init, false)).data()[0];
            let exp = out.log2();
            prop_assert_eq!(exp, exp.round());
            // within a factor sqrt(2) of the input
            prop_assert!(out / x <= std::f32::consts::SQRT_2 * 1.0001);
            prop_assert!(x / out <= std::f32::consts::SQRT_2 * 1.0001);
        }
    }

    #[test]
    fn test_log_domain_round_trip_for_powers_of_two() {
        for strategy in [RestrictValue::LogFloat, RestrictValue::power_of_two()] {
            for x in [0.125f32, 0.5, 1.0, 2.0, 64.0] {
                let init = strategy.restrict_init_float(x);
                let out = strategy.forward(&Tensor::scalar(init, false));
                assert_abs_diff_eq!(out.data()[0], x, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_log_float_round_trip_generic_value() {
        let strategy = RestrictValue::LogFloat;
        let init = strategy.restrict_init_float(0.3);
        let out = strategy.forward(&Tensor::scalar(init, false));
        assert_abs_diff_eq!(out.data()[0], 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_power_of_two_rounding_rule() {
        // log2(3) = 1.585 -> 2, log2(5) = 2.32 -> 2
        let strategy = RestrictValue::power_of_two();
        let x = Tensor::from_vec(vec![3.0f32.log2(), 5.0f32.log2()], false);
        assert_eq!(strategy.forward(&x).data().to_vec(), vec![4.0, 4.0]);

        let floor = RestrictValue::PowerOfTwo {
            float_to_int: FloatToIntImplType::Floor,
        };
        assert_eq!(floor.forward(&x).data().to_vec(), vec![2.0, 4.0]);

        let ceil = RestrictValue::PowerOfTwo {
            float_to_int: FloatToIntImplType::Ceil,
        };
        assert_eq!(ceil.forward(&x).data().to_vec(), vec![4.0, 8.0]);
    }

    #[test]
    fn test_int_forward_rounds() {
        let strategy = RestrictValue::int();
        assert_eq!(strategy.restrict_init_float(2.7), 2.7);
        let out = strategy.forward(&Tensor::from_vec(vec![2.7, -1.2], false));
        assert_eq!(out.data().to_vec(), vec![3.0, -1.0]);
    }

    #[test]
    fn test_float_is_identity_everywhere() {
        let strategy = RestrictValue::Float;
        let x = Tensor::from_vec(vec![0.1, 7.0], false);
        assert_eq!(strategy.restrict_init_float(0.1), 0.1);
        assert_eq!(strategy.forward(&x).data(), x.data());
        assert_eq!(strategy.restrict_init_module(), TransformUnit::Identity);
        assert_eq!(strategy.restrict_init_inplace_module(), TransformUnit::Identity);
    }

    #[test]
    fn test_init_modules_per_strategy() {
        assert_eq!(RestrictValue::LogFloat.restrict_init_module(), TransformUnit::LogTwo);
        assert_eq!(
            RestrictValue::power_of_two().restrict_init_inplace_module(),
            TransformUnit::InplaceLogTwo
        );
        assert_eq!(RestrictValue::int().restrict_init_module(), TransformUnit::Identity);
    }

    #[test]
    fn test_from_type_round_trips_kind() {
        for kind in [
            RestrictValueType::Fp,
            RestrictValueType::Log2Fp,
            RestrictValueType::Int,
            RestrictValueType::PowerOfTwo,
        ] {
            assert_eq!(RestrictValue::from(kind).kind(), kind);
        }
        let floor = RestrictValue::from_type(RestrictValueType::Int, FloatToIntImplType::Floor);
        assert_eq!(
            floor,
            RestrictValue::Int {
                float_to_int: FloatToIntImplType::Floor
            }
        );
    }

    #[test]
    fn test_power_of_two_gradient_is_straight_through() {
        // d/dx 2^round(x) under STE = 2^round(x) ln 2
        let param = Tensor::from_vec(vec![2.3], true);
        let mut out = RestrictValue::power_of_two().forward(&param);
        crate::autograd::backward(&mut out, None);
        assert_abs_diff_eq!(
            param.grad().unwrap()[0],
            4.0 * std::f32::consts::LN_2,
            epsilon = 1e-5
        );
    }
}
