//! Quantize / dequantize operators of the exported graph
//!
//! `Quantize(x, scale, zero_point, axis)` and `Dequantize(q, scale, zero_point, axis)`
//! with the usual linear semantics. `axis == None` means a per-tensor scale;
//! otherwise the scale holds one value per index along `axis`.

use serde::{Deserialize, Serialize};

use super::graph::{QdqGraph, QdqNode, QdqParams};
use crate::autograd::Tensor;
use crate::error::Result;

/// Zero point of an exported quantize/dequantize pair
///
/// Only symmetric schemes are exported, so the value is always 0; the
/// variant fixes the integer type of the quantized tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroPoint {
    I8(i8),
    U8(u8),
}

impl ZeroPoint {
    pub fn value(self) -> i32 {
        match self {
            ZeroPoint::I8(v) => v as i32,
            ZeroPoint::U8(v) => v as i32,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, ZeroPoint::I8(_))
    }

    /// Representable integer range of the quantized type
    pub fn range(self) -> (f32, f32) {
        match self {
            ZeroPoint::I8(_) => (i8::MIN as f32, i8::MAX as f32),
            ZeroPoint::U8(_) => (u8::MIN as f32, u8::MAX as f32),
        }
    }
}

/// `clamp(round(x / scale) + zero_point)`, rounding half to even
pub fn quantize_linear(
    graph: &mut QdqGraph,
    x: &Tensor,
    scale: &Tensor,
    zero_point: ZeroPoint,
    axis: Option<usize>,
) -> Result<Tensor> {
    let scales = x.expand_along(scale, axis)?;
    let zp = zero_point.value() as f32;
    let (lo, hi) = zero_point.range();

    let data: Vec<f32> = x
        .data()
        .iter()
        .zip(scales.iter())
        .map(|(&v, &s)| ((v / s).round_ties_even() + zp).clamp(lo, hi))
        .collect();

    graph.push(QdqNode::Quantize {
        params: QdqParams::new(scale, zero_point, axis),
        input_shape: x.shape().to_vec(),
    });
    Ok(Tensor::from_vec(data, false).with_shape_of(x))
}

/// `(q - zero_point) * scale`
pub fn dequantize_linear(
    graph: &mut QdqGraph,
    q: &Tensor,
    scale: &Tensor,
    zero_point: ZeroPoint,
    axis: Option<usize>,
) -> Result<Tensor> {
    let scales = q.expand_along(scale, axis)?;
    let zp = zero_point.value() as f32;

    let data = (q.data() - zp) * &scales;

    graph.push(QdqNode::Dequantize {
        params: QdqParams::new(scale, zero_point, axis),
        input_shape: q.shape().to_vec(),
    });
    Ok(Tensor::new(data, false).with_shape_of(q))
}
