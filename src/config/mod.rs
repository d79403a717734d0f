//! Declarative YAML configuration of quantized layers
//!
//! # Example
//!
//! ```yaml
//! layers:
//!   - name: act1
//!     act: relu
//!     return_quant_tensor: true
//!     output_quant:
//!       bit_width: 8
//!       signed: false
//!       restrict_value_type: power_of_two
//!       scaling_impl_type: runtime_stats
//!       scaling_min_val: 0.0001
//!       collect_stats_steps: 30
//! ```

mod builder;
mod loader;
mod schema;
mod validate;

#[cfg(test)]
mod tests;

pub use builder::{build_fake_quantize, build_layer, build_layers};
pub use loader::load_config;
pub use schema::{LayerSpec, QdqConfig, QuantSpec, ScalingImplType};
pub use validate::{validate_config, validate_quant_spec, ValidationError};
