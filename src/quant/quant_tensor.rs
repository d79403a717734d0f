//! Tensor values paired with their quantization metadata

use crate::autograd::Tensor;
use crate::error::{Error, Result};

/// Dequantized values together with the scale, bit width and signedness they
/// were quantized with. The zero point is always 0.
#[derive(Clone, Debug)]
pub struct QuantTensor {
    pub value: Tensor,
    pub scale: Option<Tensor>,
    pub bit_width: Option<u32>,
    pub signed: bool,
}

impl QuantTensor {
    pub fn new(value: Tensor, scale: Tensor, bit_width: u32, signed: bool) -> Self {
        Self {
            value,
            scale: Some(scale),
            bit_width: Some(bit_width),
            signed,
        }
    }

    /// Wrap a plain float tensor without quantization metadata
    pub fn from_float(value: Tensor) -> Self {
        Self {
            value,
            scale: None,
            bit_width: None,
            signed: true,
        }
    }

    /// Whether scale and bit width are known
    pub fn is_quantized(&self) -> bool {
        self.scale.is_some() && self.bit_width.is_some()
    }

    /// Integer representation `round(value / scale)`
    pub fn int_values(&self) -> Result<Tensor> {
        let scale = self.scale.as_ref().ok_or(Error::MissingScale("quant tensor"))?;
        let scales = self.value.expand_along(scale, scale.broadcast_axis())?;
        let ints = (self.value.data() / &scales).mapv(f32::round_ties_even);
        Ok(Tensor::new(ints, false).with_shape_of(&self.value))
    }
}
