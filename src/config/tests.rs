//! Integration tests for config module

use super::*;
use crate::error::Error;
use crate::quant::{ActKind, FloatToIntImplType, RestrictValueType};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_end_to_end_config_loading() {
    let yaml = r#"
layers:
  - name: act1
    act: relu
    return_quant_tensor: true
    input_quant:
      restrict_value_type: log2_fp
      scaling_init: 0.5
    output_quant:
      bit_width: 8
      signed: false
      restrict_value_type: power_of_two
      float_to_int_impl_type: ceil
      scaling_impl_type: runtime_stats
      scaling_min_val: 0.0001
      collect_stats_steps: 10
  - name: act2
    output_quant:
      scaling_impl_type: stats
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(yaml.as_bytes()).unwrap();

    let config = load_config(temp_file.path()).unwrap();

    assert_eq!(config.layers.len(), 2);
    let act1 = &config.layers[0];
    assert_eq!(act1.act, ActKind::Relu);
    assert!(act1.return_quant_tensor);
    assert!(act1.cache_inference);
    assert_eq!(
        act1.input_quant.as_ref().unwrap().restrict_value_type,
        RestrictValueType::Log2Fp
    );
    assert_eq!(act1.output_quant.float_to_int_impl_type, FloatToIntImplType::Ceil);
    assert_eq!(act1.output_quant.scaling_impl_type, ScalingImplType::RuntimeStats);
    assert_eq!(act1.output_quant.collect_stats_steps, 10);

    let act2 = &config.layers[1];
    assert_eq!(act2.act, ActKind::Identity);
    assert_eq!(act2.output_quant.bit_width, 8);
    assert!(act2.output_quant.signed);

    let layers = build_layers(&config).unwrap();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[1].name(), "act2");
}

#[test]
fn test_minimal_quant_spec() {
    let spec = QuantSpec::from_yaml("bit_width: 4").unwrap();
    assert_eq!(spec.bit_width, 4);
    assert_eq!(spec.restrict_value_type, RestrictValueType::Fp);
    assert_eq!(spec.scaling_impl_type, ScalingImplType::Parameter);
    assert_eq!(spec.scaling_init, 1.0);
    assert!(spec.scaling_min_val.is_none());
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let err = QuantSpec::from_yaml("bit_width: 64").unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::InvalidBitWidth(64))
    ));
}

#[test]
fn test_unknown_restriction_is_parse_error() {
    let err = QuantSpec::from_yaml("restrict_value_type: log10").unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/qdq.yaml").unwrap_err();
    assert!(matches!(err, Error::ConfigError(msg) if msg.contains("Failed to read")));
}

#[test]
fn test_yaml_round_trip() {
    let yaml = r#"
layers:
  - name: id
    output_quant:
      restrict_value_type: power_of_two
      scaling_init: 0.25
"#;
    let config = QdqConfig::from_yaml(yaml).unwrap();
    let reparsed = QdqConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();

    assert_eq!(reparsed.layers[0].output_quant, config.layers[0].output_quant);
    assert_eq!(reparsed.layers[0].name, "id");
}
