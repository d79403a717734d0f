//! Symbolic export handlers
//!
//! A handler turns the cached statistics of one quantized layer into the
//! scale / zero point / axis arguments of the QDQ operators around it, then
//! replays the layer as `input stage -> op stage -> output stage`.

use tracing::{debug, warn};

use super::function::{dequantize_linear, quantize_linear, ZeroPoint};
use super::graph::QdqGraph;
use crate::autograd::Tensor;
use crate::error::{Error, Result};
use crate::quant::QuantLayerStats;

/// The only bit width supported by the exported operators
pub const EXPORT_BIT_WIDTH: u32 = 8;

/// Check that a bit width is present and equal to 8
pub fn validate_8b_bit_width(bit_width: Option<&Tensor>) -> Result<u32> {
    let bit_width = bit_width
        .and_then(Tensor::item)
        .ok_or(Error::MissingBitWidth)?;
    let bit_width = bit_width as u32;
    if bit_width != EXPORT_BIT_WIDTH {
        warn!(bit_width, "rejecting bit width for QDQ export");
        return Err(Error::UnsupportedBitWidth(bit_width));
    }
    Ok(bit_width)
}

/// Axis a scale broadcasts along: the first dimension whose size is not 1
///
/// Only one axis is honored; a scale with several non-unit dimensions
/// broadcasts along the first of them.
pub fn quant_axis(scale: &Tensor) -> Option<usize> {
    scale.broadcast_axis()
}

/// Zero point of a symmetric scheme, typed by signedness
pub fn quant_zero_point(signed: bool) -> ZeroPoint {
    if signed {
        ZeroPoint::I8(0)
    } else {
        ZeroPoint::U8(0)
    }
}

/// Arguments of one quantize or dequantize operator, in call order
#[derive(Clone, Debug)]
pub struct QdqKwargs {
    pub scale: Tensor,
    pub zero_point: ZeroPoint,
    pub axis: Option<usize>,
}

impl QdqKwargs {
    pub fn new(scale: &Tensor, zero_point: ZeroPoint) -> Self {
        Self {
            scale: scale.detach(),
            zero_point,
            axis: quant_axis(scale),
        }
    }

    pub fn quantize(&self, graph: &mut QdqGraph, x: &Tensor) -> Result<Tensor> {
        quantize_linear(graph, x, &self.scale, self.zero_point, self.axis)
    }

    pub fn dequantize(&self, graph: &mut QdqGraph, q: &Tensor) -> Result<Tensor> {
        dequantize_linear(graph, q, &self.scale, self.zero_point, self.axis)
    }
}

/// Everything a wrapper handler computes ahead of symbolic execution
#[derive(Clone, Debug)]
pub struct SymbolicKwargs<K> {
    pub op: K,
    pub input_dequant: Option<QdqKwargs>,
    pub output_quant: Option<QdqKwargs>,
}

/// Export handler of a single quantized layer
///
/// Stats-derived helpers have default implementations; a handler supplies
/// the three execution stages and, when it has any, its op arguments.
pub trait QuantLayerHandler {
    /// Arguments of the wrapped operator
    type OpKwargs;

    fn op_symbolic_kwargs(&self, _stats: &QuantLayerStats) -> Result<Self::OpKwargs> {
        Err(Error::NotImplemented("op_symbolic_kwargs"))
    }

    fn quant_input_zero_point(&self, stats: &QuantLayerStats) -> ZeroPoint {
        quant_zero_point(stats.is_quant_input_signed())
    }

    fn quant_weight_zero_point(&self, stats: &QuantLayerStats) -> ZeroPoint {
        quant_zero_point(stats.is_quant_weight_signed())
    }

    fn quant_output_zero_point(&self, stats: &QuantLayerStats) -> ZeroPoint {
        quant_zero_point(stats.is_quant_output_signed())
    }

    /// Shape of the cached output; requires a caching forward pass
    fn quant_output_shape<'a>(&self, stats: &'a QuantLayerStats) -> Result<&'a [usize]> {
        stats
            .cached_out()
            .map(Tensor::shape)
            .ok_or_else(|| Error::CachingRequired(stats.name().to_string()))
    }

    fn output_quant_symbolic_kwargs(&self, stats: &QuantLayerStats) -> Result<QdqKwargs> {
        let scale = stats
            .quant_output_scale()
            .ok_or(Error::MissingScale("output"))?;
        Ok(QdqKwargs::new(scale, self.quant_output_zero_point(stats)))
    }

    fn output_dequant_symbolic_kwargs(&self, stats: &QuantLayerStats) -> Result<QdqKwargs> {
        self.output_quant_symbolic_kwargs(stats)
    }

    /// Present only when the layer quantizes its input
    fn input_quant_symbolic_kwargs(&self, stats: &QuantLayerStats) -> Result<Option<QdqKwargs>> {
        if !stats.is_input_quant_enabled() {
            return Ok(None);
        }
        let scale = stats
            .quant_input_scale()
            .ok_or(Error::MissingScale("input"))?;
        Ok(Some(QdqKwargs::new(scale, self.quant_input_zero_point(stats))))
    }

    /// Present only when the cached input carries a scale
    ///
    /// # Panics
    ///
    /// If the cached input was not quantized to 8 bits.
    fn input_dequant_symbolic_kwargs(&self, stats: &QuantLayerStats) -> Option<QdqKwargs> {
        let cached = stats.cached_inp()?;
        let scale = cached.scale.as_ref()?;
        assert_eq!(
            cached.bit_width,
            Some(EXPORT_BIT_WIDTH),
            "cached input of {} is not 8 bit",
            stats.name()
        );
        Some(QdqKwargs::new(scale, quant_zero_point(cached.signed)))
    }

    fn input_symbolic_execution(&self, graph: &mut QdqGraph, inp: &Tensor) -> Result<Tensor>;

    fn op_symbolic_execution(&self, graph: &mut QdqGraph, inp: &Tensor) -> Result<Tensor>;

    fn output_symbolic_execution(&self, graph: &mut QdqGraph, out: &Tensor) -> Result<Tensor>;

    fn symbolic_execution(&self, graph: &mut QdqGraph, inp: &Tensor) -> Result<Tensor> {
        let inp = self.input_symbolic_execution(graph, inp)?;
        let out = self.op_symbolic_execution(graph, &inp)?;
        self.output_symbolic_execution(graph, &out)
    }
}

/// Floating point operator wrapped by a [`QuantWrapperHandler`]
pub trait SymbolicOp {
    type Kwargs: Clone + std::fmt::Debug;

    fn symbolic_kwargs(&self, stats: &QuantLayerStats) -> Result<Self::Kwargs>;

    fn execute(&self, graph: &mut QdqGraph, kwargs: &Self::Kwargs, inp: &Tensor)
        -> Result<Tensor>;
}

/// Handler for layers that wrap a floating point op between a dequantized
/// input and an optionally quantized output
#[derive(Clone, Debug)]
pub struct QuantWrapperHandler<O: SymbolicOp> {
    op: O,
    symbolic_kwargs: Option<SymbolicKwargs<O::Kwargs>>,
}

impl<O: SymbolicOp> QuantWrapperHandler<O> {
    pub fn new(op: O) -> Self {
        Self {
            op,
            symbolic_kwargs: None,
        }
    }

    pub fn op(&self) -> &O {
        &self.op
    }

    /// Kwargs written by [`Self::prepare_for_symbolic_execution`]
    pub fn symbolic_kwargs(&self) -> Option<&SymbolicKwargs<O::Kwargs>> {
        self.symbolic_kwargs.as_ref()
    }

    /// Input and output must both be 8 bit
    pub fn validate(&self, stats: &QuantLayerStats) -> Result<()> {
        validate_8b_bit_width(stats.quant_input_bit_width())?;
        validate_8b_bit_width(stats.quant_output_bit_width())?;
        Ok(())
    }

    pub fn prepare_for_symbolic_execution(&mut self, stats: &QuantLayerStats) -> Result<()> {
        self.validate(stats)?;
        let op = self.op_symbolic_kwargs(stats)?;
        let input_dequant = self.input_dequant_symbolic_kwargs(stats);
        let output_quant = if stats.return_quant_tensor() {
            Some(self.output_quant_symbolic_kwargs(stats)?)
        } else {
            None
        };

        debug!(
            layer = stats.name(),
            input_dequant = input_dequant.is_some(),
            output_quant = output_quant.is_some(),
            "prepared for symbolic execution"
        );
        self.symbolic_kwargs = Some(SymbolicKwargs {
            op,
            input_dequant,
            output_quant,
        });
        Ok(())
    }

    fn prepared(&self) -> Result<&SymbolicKwargs<O::Kwargs>> {
        self.symbolic_kwargs.as_ref().ok_or(Error::NotPrepared)
    }
}

impl<O: SymbolicOp> QuantLayerHandler for QuantWrapperHandler<O> {
    type OpKwargs = O::Kwargs;

    fn op_symbolic_kwargs(&self, stats: &QuantLayerStats) -> Result<O::Kwargs> {
        self.op.symbolic_kwargs(stats)
    }

    /// Dequantize with the cached input kwargs; a float input passes through
    fn input_symbolic_execution(&self, graph: &mut QdqGraph, inp: &Tensor) -> Result<Tensor> {
        match &self.prepared()?.input_dequant {
            Some(kwargs) => kwargs.dequantize(graph, inp),
            None => Ok(inp.clone()),
        }
    }

    fn op_symbolic_execution(&self, graph: &mut QdqGraph, inp: &Tensor) -> Result<Tensor> {
        let kwargs = &self.prepared()?.op;
        self.op.execute(graph, kwargs, inp)
    }

    fn output_symbolic_execution(&self, graph: &mut QdqGraph, out: &Tensor) -> Result<Tensor> {
        match &self.prepared()?.output_quant {
            Some(kwargs) => kwargs.quantize(graph, out),
            None => Ok(out.clone()),
        }
    }
}
