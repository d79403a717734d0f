//! Handlers for the quantized activations in [`crate::quant::layer`]

use serde::{Deserialize, Serialize};

use super::graph::{QdqGraph, QdqNode};
use super::handler::{QuantLayerHandler, QuantWrapperHandler, SymbolicOp};
use crate::autograd::Tensor;
use crate::error::{Error, Result};
use crate::quant::{ActKind, QuantActivation, QuantLayerStats};

/// Arguments of an exported activation node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActOpKwargs {
    pub op_type: String,
}

/// Elementwise activation replayed between the QDQ stages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActOp {
    kind: ActKind,
}

impl ActOp {
    pub fn new(kind: ActKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ActKind {
        self.kind
    }

    fn op_type(&self) -> &'static str {
        match self.kind {
            ActKind::Identity => "Identity",
            ActKind::Relu => "Relu",
        }
    }
}

impl SymbolicOp for ActOp {
    type Kwargs = ActOpKwargs;

    fn symbolic_kwargs(&self, _stats: &QuantLayerStats) -> Result<ActOpKwargs> {
        Ok(ActOpKwargs {
            op_type: self.op_type().to_string(),
        })
    }

    fn execute(&self, graph: &mut QdqGraph, kwargs: &ActOpKwargs, inp: &Tensor) -> Result<Tensor> {
        graph.push(QdqNode::Op {
            op_type: kwargs.op_type.clone(),
            input_shape: inp.shape().to_vec(),
        });
        Ok(self.kind.apply(&inp.detach()).detach())
    }
}

/// Wrapper handler of a quantized activation
pub type QuantActHandler = QuantWrapperHandler<ActOp>;

impl QuantActHandler {
    pub fn relu() -> Self {
        QuantWrapperHandler::new(ActOp::new(ActKind::Relu))
    }

    pub fn identity() -> Self {
        QuantWrapperHandler::new(ActOp::new(ActKind::Identity))
    }

    pub fn for_layer(layer: &QuantActivation) -> Self {
        QuantWrapperHandler::new(ActOp::new(layer.act()))
    }
}

/// Result of exporting one layer
#[derive(Clone, Debug)]
pub struct LayerExport {
    pub output: Tensor,
    pub graph: QdqGraph,
}

/// Export a quantized activation after a caching forward pass
///
/// Fails if the layer has not cached its output or if the replayed output
/// does not have the cached shape.
pub fn export_activation(layer: &QuantActivation, inp: &Tensor) -> Result<LayerExport> {
    let stats = layer.stats();
    let mut handler = QuantActHandler::for_layer(layer);
    let expected = handler.quant_output_shape(&stats)?.to_vec();
    handler.prepare_for_symbolic_execution(&stats)?;

    let mut graph = QdqGraph::new();
    let output = handler.symbolic_execution(&mut graph, inp)?;
    if output.shape() != expected.as_slice() {
        return Err(Error::ShapeMismatch {
            expected,
            got: output.shape().to_vec(),
        });
    }
    Ok(LayerExport { output, graph })
}
