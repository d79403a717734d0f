//! Fake Quantization for Quantization-Aware Training (QAT)
//!
//! Fake quantization simulates the effects of quantization during training:
//! - Forward: quantize → dequantize (simulates quantization noise)
//! - Backward: Straight-Through Estimator (STE) passes gradients to the input
//!   unchanged; the scale gets the LSQ gradient `∂y/∂s = round(x/s) - x/s`
//!   inside the integer range and `qmin`/`qmax` where the value is clipped
//!
//! The scale comes from a [`ScalingImpl`], so it can be learned in a restricted
//! domain (log2, power of two) or derived from runtime statistics.

use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

use super::quant_tensor::QuantTensor;
use super::scaling::{ParameterScaling, ScalingImpl};
use crate::autograd::BackwardOp;
use crate::config::ValidationError;
use crate::error::Result;
use crate::Tensor;

/// Fake quantization configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FakeQuantConfig {
    /// Number of bits for quantization (e.g., 4, 8)
    pub bit_width: u32,
    /// Whether the integer range includes negative values
    pub signed: bool,
    /// Drop the most negative (signed) or the largest (unsigned) level
    pub narrow_range: bool,
}

impl FakeQuantConfig {
    /// Signed, narrow range config
    ///
    /// # Arguments
    /// * `bits` - Number of bits (4-bit: qmin=-7, qmax=7; 8-bit: qmin=-127, qmax=127)
    pub fn symmetric(bits: u32) -> Self {
        Self {
            bit_width: bits,
            signed: true,
            narrow_range: true,
        }
    }

    /// Unsigned full range config
    ///
    /// # Arguments
    /// * `bits` - Number of bits (4-bit: qmin=0, qmax=15; 8-bit: qmin=0, qmax=255)
    pub fn unsigned(bits: u32) -> Self {
        Self {
            bit_width: bits,
            signed: false,
            narrow_range: false,
        }
    }

    /// 4-bit symmetric quantization
    pub fn q4_symmetric() -> Self {
        Self::symmetric(4)
    }

    /// 8-bit symmetric quantization
    pub fn q8_symmetric() -> Self {
        Self::symmetric(8)
    }

    /// Bit width must be in 2..=16
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if !(2..=16).contains(&self.bit_width) {
            return Err(ValidationError::InvalidBitWidth(self.bit_width));
        }
        Ok(())
    }

    /// Integer range as i64; the bit width is taken in 1..=32 so that
    /// `qmin <= qmax` holds for any config
    fn range(&self) -> (i64, i64) {
        let bits = self.bit_width.clamp(1, 32);
        let half = 1i64 << (bits - 1);
        let full = 1i64 << bits;
        match (self.signed, self.narrow_range) {
            (true, true) => (-(half - 1), half - 1),
            (true, false) => (-half, half - 1),
            (false, true) => (0, full - 2),
            (false, false) => (0, full - 1),
        }
    }

    /// Smallest integer level
    pub fn qmin(&self) -> i32 {
        self.range().0.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    /// Largest integer level
    pub fn qmax(&self) -> i32 {
        self.range().1.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }
}

impl Default for FakeQuantConfig {
    fn default() -> Self {
        Self::q8_symmetric()
    }
}

/// Fake quantization operation with Straight-Through Estimator (STE)
#[derive(Clone, Debug)]
pub struct FakeQuantize {
    /// Quantization configuration
    pub config: FakeQuantConfig,
    scaling: ScalingImpl,
}

impl FakeQuantize {
    /// Create new fake quantization operation
    pub fn new(config: FakeQuantConfig, scaling: ScalingImpl) -> Self {
        Self { config, scaling }
    }

    /// 4-bit symmetric quantization with an unrestricted learned scale of 1.0
    pub fn q4() -> Self {
        Self::new(
            FakeQuantConfig::q4_symmetric(),
            ScalingImpl::Parameter(ParameterScaling::new(1.0, None, None)),
        )
    }

    /// 8-bit symmetric quantization with an unrestricted learned scale of 1.0
    pub fn q8() -> Self {
        Self::new(
            FakeQuantConfig::q8_symmetric(),
            ScalingImpl::Parameter(ParameterScaling::new(1.0, None, None)),
        )
    }

    /// Re-initialize a learned scale from data (abs-max calibration)
    ///
    /// scale = max(|min|, |max|) / qmax, passed through the scaling's
    /// restriction. Statistics-based scalings ignore calibration.
    pub fn calibrate(&mut self, data: &[f32]) {
        if data.is_empty() {
            return;
        }
        self.calibrate_max_abs(max_abs(data.iter()));
    }

    fn calibrate_max_abs(&mut self, max_abs: f32) {
        // Prevent division by zero
        let scale = (max_abs / self.config.qmax() as f32).max(1e-10);

        match &mut self.scaling {
            ScalingImpl::Parameter(p) => p.reinit(scale),
            _ => debug!(scale, "calibration ignored by statistics-based scaling"),
        }
    }

    /// Forward pass: fake quantize (quantize → dequantize)
    ///
    /// A per-channel scale broadcasts along its first non-unit dimension. The
    /// output stays on the tape of both the input and the scale.
    pub fn forward(&mut self, input: &Tensor) -> Result<QuantTensor> {
        let scale = self.scaling.forward(input);
        let axis = scale.broadcast_axis();
        let scales = input.expand_along(&scale, axis)?;
        let (qmin, qmax) = (self.config.qmin() as f32, self.config.qmax() as f32);

        let mut scale_local_grad = Array1::zeros(input.len());
        let data: Vec<f32> = input
            .data()
            .iter()
            .zip(scales.iter())
            .zip(scale_local_grad.iter_mut())
            .map(|((&x, &s), ds)| {
                let ratio = x / s;
                let q = ratio.round_ties_even().clamp(qmin, qmax);
                *ds = if ratio < qmin || ratio > qmax { q } else { q - ratio };
                q * s
            })
            .collect();

        let requires_grad = input.requires_grad() || scale.requires_grad();
        let mut value = Tensor::from_vec(data, requires_grad).with_shape_of(input);
        if requires_grad {
            value.set_backward_op(Rc::new(FakeQuantBackward {
                input: input.clone(),
                scale: scale.clone(),
                axis,
                scale_local_grad,
                result_grad: value.grad_cell(),
            }));
        }

        Ok(QuantTensor::new(
            value,
            scale.detach(),
            self.config.bit_width,
            self.config.signed,
        ))
    }

    /// Calibrate from the input, then fake quantize
    ///
    /// Calibrates on every call; use [`Self::forward`] once the scale is set.
    pub fn forward_with_calibration(&mut self, input: &Tensor) -> Result<QuantTensor> {
        if !input.is_empty() {
            self.calibrate_max_abs(max_abs(input.data().iter()));
        }
        self.forward(input)
    }

    pub fn scaling(&self) -> &ScalingImpl {
        &self.scaling
    }

    pub fn scaling_mut(&mut self) -> &mut ScalingImpl {
        &mut self.scaling
    }

    /// Get number of quantization levels
    pub fn num_levels(&self) -> usize {
        let (qmin, qmax) = self.config.range();
        (qmax - qmin + 1) as usize
    }
}

fn max_abs<'a>(values: impl Iterator<Item = &'a f32>) -> f32 {
    values.fold(0.0f32, |acc, v| acc.max(v.abs()))
}

/// STE to the input, LSQ gradient to the scale
struct FakeQuantBackward {
    input: Tensor,
    scale: Tensor,
    axis: Option<usize>,
    scale_local_grad: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for FakeQuantBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.input.requires_grad() {
                self.input.accumulate_grad(grad.clone());
            }
            if self.scale.requires_grad() {
                let mut grad_scale = Array1::zeros(self.scale.len());
                for (i, (g, ds)) in grad.iter().zip(self.scale_local_grad.iter()).enumerate() {
                    let channel = self.axis.map_or(0, |axis| self.input.axis_index(axis, i));
                    grad_scale[channel] += g * ds;
                }
                self.scale.accumulate_grad(grad_scale);
            }

            if let Some(op) = self.input.backward_op() {
                op.backward();
            }
            if let Some(op) = self.scale.backward_op() {
                op.backward();
            }
        }
    }
}

/// Convenience function for fake quantization forward pass
///
/// Calibrates an unrestricted scale from the input. `bits` must be in 2..=16.
pub fn fake_quantize(input: &Tensor, bits: u32, signed: bool) -> Result<QuantTensor> {
    let config = if signed {
        FakeQuantConfig::symmetric(bits)
    } else {
        FakeQuantConfig::unsigned(bits)
    };
    config.validate()?;
    let mut fq = FakeQuantize::new(
        config,
        ScalingImpl::Parameter(ParameterScaling::new(1.0, None, None)),
    );
    fq.forward_with_calibration(input)
}
