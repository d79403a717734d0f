//! Quantized activation layer and the statistics it caches for export
//!
//! A caching forward pass records the quantization metadata of the input and
//! the output tensor; [`QuantActivation::stats`] freezes everything the export
//! handlers need into an immutable [`QuantLayerStats`] snapshot.

use serde::{Deserialize, Serialize};

use super::fake_quantize::FakeQuantize;
use super::quant_tensor::QuantTensor;
use crate::autograd::{self, Tensor};
use crate::error::Result;

/// Quantization metadata of the last input seen by a layer
#[derive(Clone, Debug)]
pub struct CachedInput {
    pub scale: Option<Tensor>,
    pub bit_width: Option<u32>,
    pub signed: bool,
}

impl From<&QuantTensor> for CachedInput {
    fn from(qt: &QuantTensor) -> Self {
        Self {
            scale: qt.scale.as_ref().map(Tensor::detach),
            bit_width: qt.bit_width,
            signed: qt.signed,
        }
    }
}

/// Read-only snapshot of a quantized layer's cached runtime statistics
#[derive(Clone, Debug, Default)]
pub struct QuantLayerStats {
    name: String,
    input_bit_width: Option<Tensor>,
    weight_bit_width: Option<Tensor>,
    output_bit_width: Option<Tensor>,
    input_scale: Option<Tensor>,
    weight_scale: Option<Tensor>,
    output_scale: Option<Tensor>,
    input_signed: bool,
    weight_signed: bool,
    output_signed: bool,
    input_quant_enabled: bool,
    return_quant_tensor: bool,
    cached_inp: Option<CachedInput>,
    cached_out: Option<Tensor>,
}

impl QuantLayerStats {
    pub fn builder(name: impl Into<String>) -> QuantLayerStatsBuilder {
        QuantLayerStatsBuilder {
            stats: QuantLayerStats {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quant_input_bit_width(&self) -> Option<&Tensor> {
        self.input_bit_width.as_ref()
    }

    pub fn quant_weight_bit_width(&self) -> Option<&Tensor> {
        self.weight_bit_width.as_ref()
    }

    pub fn quant_output_bit_width(&self) -> Option<&Tensor> {
        self.output_bit_width.as_ref()
    }

    pub fn quant_input_scale(&self) -> Option<&Tensor> {
        self.input_scale.as_ref()
    }

    pub fn quant_weight_scale(&self) -> Option<&Tensor> {
        self.weight_scale.as_ref()
    }

    pub fn quant_output_scale(&self) -> Option<&Tensor> {
        self.output_scale.as_ref()
    }

    pub fn is_quant_input_signed(&self) -> bool {
        self.input_signed
    }

    pub fn is_quant_weight_signed(&self) -> bool {
        self.weight_signed
    }

    pub fn is_quant_output_signed(&self) -> bool {
        self.output_signed
    }

    pub fn is_input_quant_enabled(&self) -> bool {
        self.input_quant_enabled
    }

    pub fn return_quant_tensor(&self) -> bool {
        self.return_quant_tensor
    }

    pub fn cached_inp(&self) -> Option<&CachedInput> {
        self.cached_inp.as_ref()
    }

    pub fn cached_out(&self) -> Option<&Tensor> {
        self.cached_out.as_ref()
    }
}

/// Builder for [`QuantLayerStats`], for layers populated outside this crate
#[derive(Debug)]
pub struct QuantLayerStatsBuilder {
    stats: QuantLayerStats,
}

impl QuantLayerStatsBuilder {
    pub fn input_quant(mut self, scale: Tensor, bit_width: u32, signed: bool) -> Self {
        self.stats.input_scale = Some(scale);
        self.stats.input_bit_width = Some(Tensor::scalar(bit_width as f32, false));
        self.stats.input_signed = signed;
        self.stats.input_quant_enabled = true;
        self
    }

    /// Record the input bit width without enabling input quantization
    pub fn input_bit_width(mut self, bit_width: u32) -> Self {
        self.stats.input_bit_width = Some(Tensor::scalar(bit_width as f32, false));
        self
    }

    pub fn weight_quant(mut self, scale: Tensor, bit_width: u32, signed: bool) -> Self {
        self.stats.weight_scale = Some(scale);
        self.stats.weight_bit_width = Some(Tensor::scalar(bit_width as f32, false));
        self.stats.weight_signed = signed;
        self
    }

    pub fn output_quant(mut self, scale: Tensor, bit_width: u32, signed: bool) -> Self {
        self.stats.output_scale = Some(scale);
        self.stats.output_bit_width = Some(Tensor::scalar(bit_width as f32, false));
        self.stats.output_signed = signed;
        self
    }

    pub fn return_quant_tensor(mut self, enabled: bool) -> Self {
        self.stats.return_quant_tensor = enabled;
        self
    }

    pub fn cached_inp(mut self, cached: CachedInput) -> Self {
        self.stats.cached_inp = Some(cached);
        self
    }

    pub fn cached_out(mut self, out: Tensor) -> Self {
        self.stats.cached_out = Some(out);
        self
    }

    pub fn build(self) -> QuantLayerStats {
        self.stats
    }
}

/// Activation applied between input and output quantization
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActKind {
    #[default]
    Identity,
    Relu,
}

impl ActKind {
    pub fn apply(self, x: &Tensor) -> Tensor {
        match self {
            ActKind::Identity => autograd::identity(x),
            ActKind::Relu => autograd::relu(x),
        }
    }
}

/// Quantized activation: optional input quantizer, activation, output quantizer
#[derive(Clone, Debug)]
pub struct QuantActivation {
    name: String,
    act: ActKind,
    input_quant: Option<FakeQuantize>,
    output_quant: FakeQuantize,
    return_quant_tensor: bool,
    cache_inference_quant_inp: bool,
    cache_inference_quant_out: bool,
    cached_inp: Option<CachedInput>,
    cached_out: Option<Tensor>,
    last_input_scale: Option<Tensor>,
    last_output_scale: Option<Tensor>,
}

impl QuantActivation {
    pub fn new(name: impl Into<String>, act: ActKind, output_quant: FakeQuantize) -> Self {
        Self {
            name: name.into(),
            act,
            input_quant: None,
            output_quant,
            return_quant_tensor: false,
            cache_inference_quant_inp: false,
            cache_inference_quant_out: false,
            cached_inp: None,
            cached_out: None,
            last_input_scale: None,
            last_output_scale: None,
        }
    }

    pub fn with_input_quant(mut self, input_quant: FakeQuantize) -> Self {
        self.input_quant = Some(input_quant);
        self
    }

    pub fn with_return_quant_tensor(mut self, enabled: bool) -> Self {
        self.return_quant_tensor = enabled;
        self
    }

    /// Enable caching of input metadata and output tensors on every forward pass
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.cache_inference_quant_inp = enabled;
        self.cache_inference_quant_out = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn act(&self) -> ActKind {
        self.act
    }

    pub fn forward(&mut self, inp: &QuantTensor) -> Result<QuantTensor> {
        if self.cache_inference_quant_inp {
            self.cached_inp = Some(CachedInput::from(inp));
        }

        let x = match &mut self.input_quant {
            Some(quant) => {
                let qx = quant.forward(&inp.value)?;
                self.last_input_scale = qx.scale.clone();
                qx.value
            }
            None => inp.value.clone(),
        };

        let y = self.act.apply(&x);
        let out = self.output_quant.forward(&y)?;
        self.last_output_scale = out.scale.clone();

        if self.cache_inference_quant_out {
            self.cached_out = Some(out.value.detach());
        }

        if self.return_quant_tensor {
            Ok(out)
        } else {
            Ok(QuantTensor::from_float(out.value))
        }
    }

    /// Snapshot of everything cached so far
    ///
    /// Without an input quantizer, the input bit width, scale and signedness
    /// are those of the cached input.
    pub fn stats(&self) -> QuantLayerStats {
        let bit_width = |bits: u32| Tensor::scalar(bits as f32, false);
        let (input_bit_width, input_scale, input_signed) = match &self.input_quant {
            Some(quant) => (
                Some(bit_width(quant.config.bit_width)),
                self.last_input_scale.clone(),
                quant.config.signed,
            ),
            None => match &self.cached_inp {
                Some(cached) => (
                    cached.bit_width.map(bit_width),
                    cached.scale.clone(),
                    cached.signed,
                ),
                None => (None, None, false),
            },
        };

        QuantLayerStats {
            name: self.name.clone(),
            input_bit_width,
            weight_bit_width: None,
            output_bit_width: Some(bit_width(self.output_quant.config.bit_width)),
            input_scale,
            weight_scale: None,
            output_scale: self.last_output_scale.clone(),
            input_signed,
            weight_signed: false,
            output_signed: self.output_quant.config.signed,
            input_quant_enabled: self.input_quant.is_some(),
            return_quant_tensor: self.return_quant_tensor,
            cached_inp: self.cached_inp.clone(),
            cached_out: self.cached_out.clone(),
        }
    }
}
