//! Integration tests for value restriction.
//!
//! Exercises the restriction strategies through the public API, alone and
//! composed with a minimum clamp, including gradient flow through the STE.

use approx::assert_abs_diff_eq;
use proptest::prelude::*;
use qdq_restrict::autograd::{backward, Tensor};
use qdq_restrict::quant::{
    FloatToIntImplType, RestrictClampValue, RestrictValue, RestrictValueType,
};

fn strategies() -> Vec<RestrictValue> {
    vec![
        RestrictValue::Float,
        RestrictValue::LogFloat,
        RestrictValue::int(),
        RestrictValue::power_of_two(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_init_tensor_agrees_with_init_float(x in 1e-3f32..1e3) {
        for strategy in strategies() {
            let t = strategy.restrict_init_tensor(&Tensor::from_vec(vec![x], false));
            prop_assert_eq!(t.data()[0], strategy.restrict_init_float(x));
        }
    }

    #[test]
    fn prop_power_of_two_round_trip(exp in -12i32..12) {
        let x = 2f32.powi(exp);
        for strategy in [RestrictValue::LogFloat, RestrictValue::power_of_two()] {
            let init = Tensor::scalar(strategy.restrict_init_float(x), false);
            let back = strategy.forward(&init).data()[0];
            prop_assert!((back - x).abs() <= x * 1e-6);
        }
    }

    #[test]
    fn prop_power_of_two_nearest_in_log_domain(x in 1e-3f32..1e3) {
        let strategy = RestrictValue::power_of_two();
        let init = Tensor::scalar(strategy.restrict_init_float(x), false);
        let back = strategy.forward(&init).data()[0];
        prop_assert_eq!(back, 2f32.powf(x.log2().round_ties_even()));
    }
}

#[test]
fn test_floor_rounding_rule_picks_power_below() {
    let strategy = RestrictValue::from_type(RestrictValueType::PowerOfTwo, FloatToIntImplType::Floor);
    let init = Tensor::scalar(strategy.restrict_init_float(0.3), false);
    assert_abs_diff_eq!(strategy.forward(&init).data()[0], 0.25);

    let strategy = RestrictValue::from_type(RestrictValueType::PowerOfTwo, FloatToIntImplType::Ceil);
    let init = Tensor::scalar(strategy.restrict_init_float(0.3), false);
    assert_abs_diff_eq!(strategy.forward(&init).data()[0], 0.5);
}

#[test]
fn test_log_float_clamp_floor() {
    let clamp = RestrictClampValue::new(Some(0.01), Some(RestrictValue::LogFloat));
    assert_abs_diff_eq!(clamp.floor().unwrap(), 0.01f32.log2());

    // 0.001 enters in the log domain and is clamped to log2(0.01)
    let x = Tensor::scalar(0.001f32.log2(), false);
    let out = clamp.forward(&x);
    assert_abs_diff_eq!(out.data()[0], 0.01, epsilon = 1e-6);
}

#[test]
fn test_clamp_never_below_floor() {
    let clamp = RestrictClampValue::new(Some(0.01), Some(RestrictValue::LogFloat));
    let x = Tensor::from_vec(vec![-30.0, -10.0, -6.0, 0.0, 3.0], false);
    for &v in clamp.forward(&x).data() {
        assert!(v >= 0.01 * (1.0 - 1e-6));
    }
}

#[test]
fn test_zero_min_val_disables_clamp() {
    let clamp = RestrictClampValue::new(Some(0.0), Some(RestrictValue::Float));
    assert!(clamp.floor().is_none());
    let out = clamp.forward(&Tensor::from_vec(vec![-1.0], false));
    assert_eq!(out.data()[0], -1.0);
}

#[test]
fn test_gradient_passes_through_rounding() {
    let strategy = RestrictValue::int();
    let x = Tensor::from_vec(vec![1.4, 2.6], true);
    let mut y = strategy.forward(&x);
    assert_eq!(y.data().to_vec(), vec![1.0, 3.0]);

    backward(&mut y, None);

    let grad = x.grad().expect("should have grad");
    assert_eq!(grad.to_vec(), vec![1.0, 1.0]);
}

#[test]
fn test_power_of_two_gradient_scales_by_output() {
    let strategy = RestrictValue::power_of_two();
    let x = Tensor::from_vec(vec![-1.4, 2.2], true);
    let mut y = strategy.forward(&x);
    assert_eq!(y.data().to_vec(), vec![0.5, 4.0]);

    backward(&mut y, None);

    // d(2^round(x))/dx with STE on round = 2^round(x) * ln 2
    let grad = x.grad().expect("should have grad");
    assert_abs_diff_eq!(grad[0], 0.5 * std::f32::consts::LN_2, epsilon = 1e-6);
    assert_abs_diff_eq!(grad[1], 4.0 * std::f32::consts::LN_2, epsilon = 1e-6);
}
