//! Quantization-aware training primitives
//!
//! - Value restriction of learned scales (float, log2, integer, power of two)
//! - Scale implementations built on it (parameter, statistics, runtime statistics)
//! - Fake quantization with STE for QAT
//! - A quantized activation layer that caches the statistics needed for export

mod fake_quantize;
mod layer;
mod quant_tensor;
pub mod restrict;
mod scaling;

pub use fake_quantize::{fake_quantize, FakeQuantConfig, FakeQuantize};
pub use layer::{ActKind, CachedInput, QuantActivation, QuantLayerStats, QuantLayerStatsBuilder};
pub use quant_tensor::QuantTensor;
pub use restrict::{
    FloatToIntImplType, RestrictClampValue, RestrictValue, RestrictValueType, TransformUnit,
};
pub use scaling::{ParameterScaling, RuntimeStatsScaling, ScalingImpl, StatsScaling};
