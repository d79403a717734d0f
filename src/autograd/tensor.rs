//! Tensor type with gradient tracking

use super::BackwardOp;
use crate::error::{Error, Result};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Tensor with automatic differentiation support
///
/// Data is stored flat in row-major order; `shape` is the logical layout used
/// for per-channel broadcasting. A tensor built from a vector has shape `[len]`.
#[derive(Clone)]
pub struct Tensor {
    data: Array1<f32>,
    shape: Vec<usize>,
    grad: Rc<RefCell<Option<Array1<f32>>>>,
    backward_op: Option<Rc<dyn BackwardOp>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a new tensor with data
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        let shape = vec![data.len()];
        Self {
            data,
            shape,
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad,
        }
    }

    /// Create a tensor from a vector
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Create a zero-dimensional tensor holding one value
    pub fn scalar(value: f32, requires_grad: bool) -> Self {
        let mut t = Self::from_vec(vec![value], requires_grad);
        t.shape = Vec::new();
        t
    }

    /// Create a tensor filled with zeros
    pub fn zeros(size: usize, requires_grad: bool) -> Self {
        Self::new(Array1::zeros(size), requires_grad)
    }

    /// Create a tensor filled with ones
    pub fn ones(size: usize, requires_grad: bool) -> Self {
        Self::new(Array1::ones(size), requires_grad)
    }

    /// Reinterpret the flat data under a new logical shape
    pub fn reshape(mut self, shape: &[usize]) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel != self.data.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.data.len()],
                got: shape.to_vec(),
            });
        }
        self.shape = shape.to_vec();
        Ok(self)
    }

    /// Copy the logical shape of `other` (same element count)
    pub(crate) fn with_shape_of(mut self, other: &Tensor) -> Self {
        debug_assert_eq!(self.data.len(), other.data.len());
        self.shape = other.shape.clone();
        self
    }

    /// Logical shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Value of a single-element tensor
    pub fn item(&self) -> Option<f32> {
        if self.data.len() == 1 {
            Some(self.data[0])
        } else {
            None
        }
    }

    /// Index along `axis` of the element stored at flat position `flat`
    pub fn axis_index(&self, axis: usize, flat: usize) -> usize {
        let inner: usize = self.shape[axis + 1..].iter().product();
        (flat / inner) % self.shape[axis]
    }

    /// First dimension whose size is not 1, i.e. the axis a per-channel
    /// parameter broadcasts along. `None` when every dimension is 1.
    pub fn broadcast_axis(&self) -> Option<usize> {
        self.shape.iter().position(|&d| d != 1)
    }

    /// Expand `param` to one value per element of `self`.
    ///
    /// With `axis == None` the first value of `param` is used everywhere;
    /// otherwise `param` holds one value per index along `axis`.
    pub fn expand_along(&self, param: &Tensor, axis: Option<usize>) -> Result<Array1<f32>> {
        let mismatch = || Error::ShapeMismatch {
            expected: self.shape.clone(),
            got: param.shape.clone(),
        };
        match axis {
            None => {
                let value = param.data.get(0).copied().ok_or_else(mismatch)?;
                Ok(Array1::from_elem(self.len(), value))
            }
            Some(axis) => {
                if self.shape.get(axis) != Some(&param.len()) {
                    return Err(mismatch());
                }
                Ok((0..self.len())
                    .map(|i| param.data[self.axis_index(axis, i)])
                    .collect())
            }
        }
    }

    /// Copy of this tensor cut off from the tape
    pub fn detach(&self) -> Self {
        Self::new(self.data.clone(), false).with_shape_of(self)
    }

    /// Get reference to data
    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    /// Get mutable reference to data
    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        &mut self.data
    }

    /// Get gradient (if computed)
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Set gradient
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Accumulate gradient (for when tensor is used multiple times)
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut grad_ref = self.grad.borrow_mut();
        if let Some(existing) = grad_ref.as_mut() {
            *existing = &*existing + &grad;
        } else {
            *grad_ref = Some(grad);
        }
    }

    /// Zero out gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Check if requires gradient
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Get reference to gradient cell (for backward operations)
    pub fn grad_cell(&self) -> Rc<RefCell<Option<Array1<f32>>>> {
        self.grad.clone()
    }

    /// Give this tensor a fresh gradient cell, turning it into a new tape node.
    ///
    /// Clones taken before the call keep the old cell.
    pub(crate) fn fresh_grad_cell(&mut self) {
        self.grad = Rc::new(RefCell::new(None));
    }

    /// Set backward operation
    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    /// Get backward operation
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }

    /// Get size
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("data", &self.data)
            .field("shape", &self.shape)
            .field("grad", &self.grad.borrow())
            .field("requires_grad", &self.requires_grad)
            .finish()
    }
}
