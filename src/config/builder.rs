//! Build quantizers and layers from configuration

use tracing::debug;

use super::schema::{LayerSpec, QdqConfig, QuantSpec, ScalingImplType};
use crate::error::Result;
use crate::quant::{
    FakeQuantConfig, FakeQuantize, ParameterScaling, QuantActivation, RestrictValue,
    RuntimeStatsScaling, ScalingImpl, StatsScaling,
};

/// Build a fake quantizer from its configuration
///
/// Statistics-based scalings divide the abs-max by the largest integer level.
pub fn build_fake_quantize(spec: &QuantSpec) -> Result<FakeQuantize> {
    spec.validate()?;

    let config = FakeQuantConfig {
        bit_width: spec.bit_width,
        signed: spec.signed,
        narrow_range: spec.narrow_range,
    };
    let restrict = Some(RestrictValue::from_type(
        spec.restrict_value_type,
        spec.float_to_int_impl_type,
    ));
    let qmax = config.qmax() as f32;

    let scaling = match spec.scaling_impl_type {
        ScalingImplType::Parameter => ScalingImpl::Parameter(ParameterScaling::new(
            spec.scaling_init,
            restrict,
            spec.scaling_min_val,
        )),
        ScalingImplType::Stats => ScalingImpl::Stats(
            StatsScaling::new(restrict, spec.scaling_min_val).with_scaling_factor(qmax),
        ),
        ScalingImplType::RuntimeStats => ScalingImpl::RuntimeStats(
            RuntimeStatsScaling::new(spec.collect_stats_steps, restrict, spec.scaling_min_val)
                .with_scaling_factor(qmax),
        ),
    };

    Ok(FakeQuantize::new(config, scaling))
}

/// Build a quantized activation layer
pub fn build_layer(spec: &LayerSpec) -> Result<QuantActivation> {
    let output_quant = build_fake_quantize(&spec.output_quant)?;
    let mut layer = QuantActivation::new(spec.name.clone(), spec.act, output_quant)
        .with_return_quant_tensor(spec.return_quant_tensor)
        .with_caching(spec.cache_inference);
    if let Some(input_quant) = &spec.input_quant {
        layer = layer.with_input_quant(build_fake_quantize(input_quant)?);
    }

    debug!(
        layer = %spec.name,
        act = ?spec.act,
        input_quant = spec.input_quant.is_some(),
        "built quantized layer"
    );
    Ok(layer)
}

/// Build every layer of a configuration, in order
pub fn build_layers(config: &QdqConfig) -> Result<Vec<QuantActivation>> {
    config.layers.iter().map(build_layer).collect()
}
