//! # qdq-restrict: value restriction and QDQ export for quantized layers
//!
//! Learned quantization scales are kept in a restricted domain (plain float,
//! log2 float, integer, power of two) with straight-through gradients, and
//! quantized layers are exported as their float op wrapped in
//! `QuantizeLinear` / `DequantizeLinear` operators.
//!
//! ## Architecture
//!
//! - **autograd**: Tape-based automatic differentiation and STE primitives
//! - **quant**: Restriction strategies, scaling, fake quantization, quantized layers
//! - **export**: Symbolic export handlers and the QDQ operator record
//! - **config**: Declarative YAML configuration of quantized layers

pub mod autograd;
pub mod config;
pub mod export;
pub mod quant;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Tensor};
pub use error::{Error, Result};
pub use export::{QdqGraph, QuantActHandler, QuantLayerHandler, QuantWrapperHandler, ZeroPoint};
pub use quant::{QuantActivation, QuantLayerStats, QuantTensor, RestrictClampValue, RestrictValue};
