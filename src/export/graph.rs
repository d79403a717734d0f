//! Ordered record of the operators emitted by symbolic execution

use serde::{Deserialize, Serialize};

use super::function::ZeroPoint;
use crate::autograd::Tensor;
use crate::error::{Error, Result};

/// Scale, zero point and axis of one quantize/dequantize node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QdqParams {
    pub scale: Vec<f32>,
    pub scale_shape: Vec<usize>,
    pub zero_point: ZeroPoint,
    pub axis: Option<usize>,
}

impl QdqParams {
    pub fn new(scale: &Tensor, zero_point: ZeroPoint, axis: Option<usize>) -> Self {
        Self {
            scale: scale.data().to_vec(),
            scale_shape: scale.shape().to_vec(),
            zero_point,
            axis,
        }
    }
}

/// One exported operator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QdqNode {
    Quantize {
        params: QdqParams,
        input_shape: Vec<usize>,
    },
    Dequantize {
        params: QdqParams,
        input_shape: Vec<usize>,
    },
    /// The wrapped floating point computation
    Op {
        op_type: String,
        input_shape: Vec<usize>,
    },
}

impl QdqNode {
    pub fn op_type(&self) -> &str {
        match self {
            QdqNode::Quantize { .. } => "QuantizeLinear",
            QdqNode::Dequantize { .. } => "DequantizeLinear",
            QdqNode::Op { op_type, .. } => op_type,
        }
    }
}

/// Operators in emission order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QdqGraph {
    nodes: Vec<QdqNode>,
}

impl QdqGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: QdqNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[QdqNode] {
        &self.nodes
    }

    pub fn op_types(&self) -> Vec<&str> {
        self.nodes.iter().map(QdqNode::op_type).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_layout() {
        let mut graph = QdqGraph::new();
        graph.push(QdqNode::Dequantize {
            params: QdqParams::new(&Tensor::scalar(0.5, false), ZeroPoint::U8(0), None),
            input_shape: vec![4],
        });
        graph.push(QdqNode::Op {
            op_type: "Relu".to_string(),
            input_shape: vec![4],
        });

        let json = graph.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["nodes"][0]["op"], "dequantize");
        assert_eq!(value["nodes"][0]["params"]["zero_point"]["u8"], 0);
        assert!(value["nodes"][0]["params"]["axis"].is_null());
        assert_eq!(value["nodes"][1]["op_type"], "Relu");

        assert_eq!(QdqGraph::from_json(&json).unwrap(), graph);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            QdqGraph::from_json("{\"nodes\": 3}"),
            Err(Error::Serialization(_))
        ));
    }
}
