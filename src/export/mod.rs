//! QDQ export of quantized layers
//!
//! Each quantized layer is replaced by its floating point op wrapped in
//! `DequantizeLinear` / `QuantizeLinear` operators carrying the cached scale,
//! a zero point of 0 and the per-channel axis.

mod function;
mod graph;
mod handler;
mod handlers;

pub use function::{dequantize_linear, quantize_linear, ZeroPoint};
pub use graph::{QdqGraph, QdqNode, QdqParams};
pub use handler::{
    quant_axis, quant_zero_point, validate_8b_bit_width, QdqKwargs, QuantLayerHandler,
    QuantWrapperHandler, SymbolicKwargs, SymbolicOp, EXPORT_BIT_WIDTH,
};
pub use handlers::{export_activation, ActOp, ActOpKwargs, LayerExport, QuantActHandler};
