//! Configuration validation

use std::collections::HashSet;

use super::schema::{QdqConfig, QuantSpec, ScalingImplType};

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid bit width: {0} (must be in 2..=16)")]
    InvalidBitWidth(u32),

    #[error("Invalid scaling init: {0} (must be > 0.0 for log2 restrictions)")]
    InvalidScalingInit(f32),

    #[error("Invalid scaling min val: {0} (must be >= 0.0)")]
    InvalidScalingMinVal(f32),

    #[error("Invalid collect stats steps: {0} (must be > 0)")]
    InvalidCollectStatsSteps(usize),

    #[error("Config has no layers")]
    NoLayers,

    #[error("Layer name cannot be empty")]
    EmptyLayerName,

    #[error("Duplicate layer name: {0}")]
    DuplicateLayerName(String),
}

/// Validate a quantizer configuration
///
/// Checks:
/// - Bit width is in 2..=16
/// - Log2-domain restrictions start from a positive scale
/// - The scale floor is non-negative
/// - Runtime statistics collect for at least one step
pub fn validate_quant_spec(spec: &QuantSpec) -> Result<(), ValidationError> {
    if !(2..=16).contains(&spec.bit_width) {
        return Err(ValidationError::InvalidBitWidth(spec.bit_width));
    }

    if spec.scaling_impl_type == ScalingImplType::Parameter
        && spec.restrict_value_type.is_log_domain()
        && spec.scaling_init <= 0.0
    {
        return Err(ValidationError::InvalidScalingInit(spec.scaling_init));
    }

    if let Some(min_val) = spec.scaling_min_val {
        if min_val < 0.0 {
            return Err(ValidationError::InvalidScalingMinVal(min_val));
        }
    }

    if spec.scaling_impl_type == ScalingImplType::RuntimeStats && spec.collect_stats_steps == 0 {
        return Err(ValidationError::InvalidCollectStatsSteps(0));
    }

    Ok(())
}

/// Validate a layer set: unique non-empty names, valid quantizers
pub fn validate_config(config: &QdqConfig) -> Result<(), ValidationError> {
    if config.layers.is_empty() {
        return Err(ValidationError::NoLayers);
    }

    let mut seen = HashSet::new();
    for layer in &config.layers {
        if layer.name.is_empty() {
            return Err(ValidationError::EmptyLayerName);
        }
        if !seen.insert(layer.name.as_str()) {
            return Err(ValidationError::DuplicateLayerName(layer.name.clone()));
        }
        if let Some(input_quant) = &layer.input_quant {
            validate_quant_spec(input_quant)?;
        }
        validate_quant_spec(&layer.output_quant)?;
    }

    Ok(())
}

impl QuantSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_quant_spec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LayerSpec;
    use crate::quant::RestrictValueType;

    fn layer(name: &str) -> LayerSpec {
        LayerSpec {
            name: name.to_string(),
            act: Default::default(),
            input_quant: None,
            output_quant: QuantSpec::default(),
            return_quant_tensor: false,
            cache_inference: true,
        }
    }

    #[test]
    fn test_default_spec_is_valid() {
        assert!(QuantSpec::default().validate().is_ok());
    }

    #[test]
    fn test_bit_width_range() {
        for bit_width in [1, 17, 32] {
            let spec = QuantSpec {
                bit_width,
                ..Default::default()
            };
            assert!(matches!(
                spec.validate(),
                Err(ValidationError::InvalidBitWidth(b)) if b == bit_width
            ));
        }
        let spec = QuantSpec {
            bit_width: 4,
            ..Default::default()
        };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_log_domain_needs_positive_init() {
        let spec = QuantSpec {
            restrict_value_type: RestrictValueType::PowerOfTwo,
            scaling_init: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            spec.validate(),
            Err(ValidationError::InvalidScalingInit(_))
        ));

        // Unrestricted scales may start anywhere
        let spec = QuantSpec {
            scaling_init: 0.0,
            ..Default::default()
        };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_negative_min_val() {
        let spec = QuantSpec {
            scaling_min_val: Some(-0.1),
            ..Default::default()
        };
        assert!(matches!(
            spec.validate(),
            Err(ValidationError::InvalidScalingMinVal(_))
        ));
    }

    #[test]
    fn test_runtime_stats_steps() {
        let spec = QuantSpec {
            scaling_impl_type: ScalingImplType::RuntimeStats,
            collect_stats_steps: 0,
            ..Default::default()
        };
        assert!(matches!(
            spec.validate(),
            Err(ValidationError::InvalidCollectStatsSteps(0))
        ));
    }

    #[test]
    fn test_layer_names() {
        let empty = QdqConfig { layers: vec![] };
        assert!(matches!(validate_config(&empty), Err(ValidationError::NoLayers)));

        let unnamed = QdqConfig {
            layers: vec![layer("")],
        };
        assert!(matches!(
            validate_config(&unnamed),
            Err(ValidationError::EmptyLayerName)
        ));

        let dup = QdqConfig {
            layers: vec![layer("act"), layer("act")],
        };
        assert!(matches!(
            validate_config(&dup),
            Err(ValidationError::DuplicateLayerName(name)) if name == "act"
        ));

        let ok = QdqConfig {
            layers: vec![layer("a"), layer("b")],
        };
        assert!(validate_config(&ok).is_ok());
    }
}
