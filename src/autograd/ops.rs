//! Autograd operations with backward passes
//!
//! Besides `relu` for quantized activations, this module holds the elementwise
//! primitives the value-restriction engine is built from: straight-through
//! rounding and clamping, `log2` (also in place) and power-of-two reconstruction.

use super::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// ReLU activation
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad).with_shape_of(a);

    if requires_grad {
        // ∂L/∂a = ∂L/∂out * (a > 0)
        let backward_op = Rc::new(LocalGradBackward {
            a: a.clone(),
            local_grad: a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 }),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

// ============================================================================
// Restriction primitives
// ============================================================================

/// Identity transform (a tape-preserving clone)
pub fn identity(a: &Tensor) -> Tensor {
    a.clone()
}

/// Round half to even with a straight-through gradient
pub fn round_ste(a: &Tensor) -> Tensor {
    ste_map(a, f32::round_ties_even)
}

/// Ceil with a straight-through gradient
pub fn ceil_ste(a: &Tensor) -> Tensor {
    ste_map(a, f32::ceil)
}

/// Floor with a straight-through gradient
pub fn floor_ste(a: &Tensor) -> Tensor {
    ste_map(a, f32::floor)
}

/// Truncation toward zero with a straight-through gradient
pub fn round_to_zero_ste(a: &Tensor) -> Tensor {
    ste_map(a, f32::trunc)
}

/// Clamp from below at `min_val`; the gradient passes through unchanged,
/// including for clamped elements.
pub fn clamp_min_ste(a: &Tensor, min_val: f32) -> Tensor {
    ste_map(a, |x| x.max(min_val))
}

/// Apply `f` elementwise in the forward pass and the identity in the backward pass
fn ste_map(a: &Tensor, f: impl Fn(f32) -> f32) -> Tensor {
    let data = a.data().mapv(f);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad).with_shape_of(a);

    if requires_grad {
        let backward_op = Rc::new(SteBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SteBackward {
    a: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for SteBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            // STE: ∂L/∂a = ∂L/∂out
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

/// Base-2 logarithm
///
/// The domain is not checked: non-positive inputs yield `-inf` or NaN.
pub fn log2(a: &Tensor) -> Tensor {
    let data = a.data().mapv(f32::log2);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad).with_shape_of(a);

    if requires_grad {
        let backward_op = Rc::new(LocalGradBackward {
            a: a.clone(),
            local_grad: log2_local_grad(a.data()),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

/// Base-2 logarithm computed in place
///
/// After the call `a` holds `log2(a)` and is the output node of the tape:
/// gradients flowing into it reach the tensor `a` was before the call.
pub fn log2_inplace(a: &mut Tensor) {
    let requires_grad = a.requires_grad();
    let input = requires_grad.then(|| a.clone());
    let local_grad = requires_grad.then(|| log2_local_grad(a.data()));

    a.data_mut().mapv_inplace(f32::log2);

    if let (Some(input), Some(local_grad)) = (input, local_grad) {
        a.fresh_grad_cell();
        let backward_op = Rc::new(LocalGradBackward {
            a: input,
            local_grad,
            result_grad: a.grad_cell(),
        });
        a.set_backward_op(backward_op);
    }
}

fn log2_local_grad(x: &Array1<f32>) -> Array1<f32> {
    // ∂log2(x)/∂x = 1 / (x ln 2)
    x.mapv(|v| 1.0 / (v * std::f32::consts::LN_2))
}

/// Power-of-two reconstruction: `2^a`
pub fn pow2(a: &Tensor) -> Tensor {
    let data = a.data().mapv(f32::exp2);
    let requires_grad = a.requires_grad();

    // ∂2^x/∂x = 2^x ln 2
    let local_grad = requires_grad.then(|| &data * std::f32::consts::LN_2);
    let mut result = Tensor::new(data, requires_grad).with_shape_of(a);

    if let Some(local_grad) = local_grad {
        let backward_op = Rc::new(LocalGradBackward {
            a: a.clone(),
            local_grad,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

/// Backward pass for elementwise ops whose derivative is known at forward time
struct LocalGradBackward {
    a: Tensor,
    local_grad: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for LocalGradBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad * &self.local_grad);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}
