//! Configuration schema for quantized layers

use serde::{Deserialize, Serialize};

use crate::quant::{ActKind, FloatToIntImplType, RestrictValueType};

/// A set of quantized activation layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdqConfig {
    pub layers: Vec<LayerSpec>,
}

/// One quantized activation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Layer name, used in export errors and logs
    pub name: String,

    /// Activation between input and output quantization
    #[serde(default)]
    pub act: ActKind,

    /// Optional input quantizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_quant: Option<QuantSpec>,

    /// Output quantizer
    pub output_quant: QuantSpec,

    /// Return a quantized tensor (and export a trailing QuantizeLinear)
    #[serde(default)]
    pub return_quant_tensor: bool,

    /// Cache input metadata and outputs on every forward pass
    #[serde(default = "default_true")]
    pub cache_inference: bool,
}

/// Where a quantizer's scale comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalingImplType {
    /// Learned parameter
    #[default]
    Parameter,
    /// Abs-max of every input
    Stats,
    /// Abs-max statistics during warm-up, then a frozen parameter
    RuntimeStats,
}

/// Quantizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantSpec {
    /// Quantization bits
    #[serde(default = "default_bit_width")]
    pub bit_width: u32,

    #[serde(default = "default_true")]
    pub signed: bool,

    #[serde(default)]
    pub narrow_range: bool,

    /// Domain the scale is learned in
    #[serde(default)]
    pub restrict_value_type: RestrictValueType,

    /// Rounding used by integer restrictions
    #[serde(default)]
    pub float_to_int_impl_type: FloatToIntImplType,

    #[serde(default)]
    pub scaling_impl_type: ScalingImplType,

    /// Initial scale for parameter scaling
    #[serde(default = "default_scaling_init")]
    pub scaling_init: f32,

    /// Lower bound on the scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_min_val: Option<f32>,

    /// Warm-up steps for runtime statistics
    #[serde(default = "default_collect_stats_steps")]
    pub collect_stats_steps: usize,
}

impl Default for QuantSpec {
    fn default() -> Self {
        Self {
            bit_width: default_bit_width(),
            signed: true,
            narrow_range: false,
            restrict_value_type: RestrictValueType::default(),
            float_to_int_impl_type: FloatToIntImplType::default(),
            scaling_impl_type: ScalingImplType::default(),
            scaling_init: default_scaling_init(),
            scaling_min_val: None,
            collect_stats_steps: default_collect_stats_steps(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_bit_width() -> u32 {
    8
}

fn default_scaling_init() -> f32 {
    1.0
}

fn default_collect_stats_steps() -> usize {
    30
}
