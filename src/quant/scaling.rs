//! Scale computation on top of the value restriction engine
//!
//! - [`ParameterScaling`]: a learned scale stored in the restricted domain
//! - [`StatsScaling`]: a scale recomputed from the abs-max of every input
//! - [`RuntimeStatsScaling`]: statistics for a warm-up period, then a learned
//!   parameter initialized from them

use tracing::debug;

use super::restrict::{RestrictClampValue, RestrictValue, TransformUnit};
use crate::autograd::Tensor;

/// Learned scale parameter
///
/// The parameter holds `restrict_init(scale)`; every forward pass maps it back
/// through the clamp and the restriction, so gradients reach the stored value.
#[derive(Clone, Debug)]
pub struct ParameterScaling {
    value: Tensor,
    restrict: Option<RestrictValue>,
    restrict_clamp: RestrictClampValue,
}

impl ParameterScaling {
    /// Create from a scalar initial scale
    pub fn new(
        scaling_init: f32,
        restrict: Option<RestrictValue>,
        scaling_min_val: Option<f32>,
    ) -> Self {
        Self {
            value: Tensor::scalar(init_value(restrict.as_ref(), scaling_init), true),
            restrict,
            restrict_clamp: RestrictClampValue::new(scaling_min_val, restrict),
        }
    }

    /// Create from a tensor of initial scales (e.g. one per channel)
    pub fn from_tensor(
        scaling_init: &Tensor,
        restrict: Option<RestrictValue>,
        scaling_min_val: Option<f32>,
    ) -> Self {
        let init = match &restrict {
            Some(r) => r.restrict_init_tensor(scaling_init),
            None => scaling_init.clone(),
        };
        // A fresh leaf: the init computation is not part of the tape
        let value = Tensor::new(init.data().clone(), true).with_shape_of(scaling_init);
        Self {
            value,
            restrict,
            restrict_clamp: RestrictClampValue::new(scaling_min_val, restrict),
        }
    }

    /// Re-initialize the parameter from a new scale, keeping its shape
    pub fn reinit(&mut self, scaling_init: f32) {
        let init = init_value(self.restrict.as_ref(), scaling_init);
        self.value.data_mut().fill(init);
        self.value.zero_grad();
    }

    /// Underlying parameter in the restricted domain
    pub fn value(&self) -> &Tensor {
        &self.value
    }

    /// Mutable access for optimizers
    pub fn value_mut(&mut self) -> &mut Tensor {
        &mut self.value
    }

    /// Current scale
    pub fn forward(&self) -> Tensor {
        self.restrict_clamp.forward(&self.value)
    }
}

fn init_value(restrict: Option<&RestrictValue>, x: f32) -> f32 {
    restrict.map_or(x, |r| r.restrict_init_float(x))
}

/// Floor on a statistic so an all-zero input never reaches log2 as 0
const MIN_STAT: f32 = 1e-10;

fn abs_max(x: &Tensor) -> f32 {
    x.data().iter().fold(0.0f32, |acc, v| acc.max(v.abs()))
}

/// Scale derived from the abs-max of each input
#[derive(Clone, Debug)]
pub struct StatsScaling {
    restrict_preprocess: TransformUnit,
    restrict_clamp: RestrictClampValue,
    /// Divides the statistic, e.g. the largest representable integer
    scaling_factor: f32,
}

impl StatsScaling {
    pub fn new(restrict: Option<RestrictValue>, scaling_min_val: Option<f32>) -> Self {
        Self {
            restrict_preprocess: restrict
                .map_or(TransformUnit::Identity, |r| r.restrict_init_module()),
            restrict_clamp: RestrictClampValue::new(scaling_min_val, restrict),
            scaling_factor: 1.0,
        }
    }

    /// Divide the statistic by `factor` before restriction
    pub fn with_scaling_factor(mut self, factor: f32) -> Self {
        self.scaling_factor = factor;
        self
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        let stat = (abs_max(x) / self.scaling_factor).max(MIN_STAT);
        let stat = Tensor::scalar(stat, false);
        let stat = self.restrict_preprocess.forward(&stat);
        self.restrict_clamp.forward(&stat)
    }
}

/// Statistics-driven warm-up followed by a learned parameter
///
/// For the first `collect_stats_steps` calls the scale comes from the current
/// input and a cumulative average of the statistic is kept. On the last
/// collection step the average is converted (in place) into the restricted
/// domain and frozen as the parameter used from then on.
#[derive(Clone, Debug)]
pub struct RuntimeStatsScaling {
    collect_stats_steps: usize,
    counter: usize,
    buffer: Option<f32>,
    value: Option<Tensor>,
    scaling_factor: f32,
    restrict_preprocess: TransformUnit,
    restrict_inplace_preprocess: TransformUnit,
    restrict_clamp: RestrictClampValue,
}

impl RuntimeStatsScaling {
    pub fn new(
        collect_stats_steps: usize,
        restrict: Option<RestrictValue>,
        scaling_min_val: Option<f32>,
    ) -> Self {
        Self {
            collect_stats_steps,
            counter: 0,
            buffer: None,
            value: None,
            scaling_factor: 1.0,
            restrict_preprocess: restrict
                .map_or(TransformUnit::Identity, |r| r.restrict_init_module()),
            restrict_inplace_preprocess: restrict
                .map_or(TransformUnit::Identity, |r| r.restrict_init_inplace_module()),
            restrict_clamp: RestrictClampValue::new(scaling_min_val, restrict),
        }
    }

    /// Divide the statistic by `factor` before restriction
    pub fn with_scaling_factor(mut self, factor: f32) -> Self {
        self.scaling_factor = factor;
        self
    }

    /// Whether statistics collection is over
    pub fn is_frozen(&self) -> bool {
        self.value.is_some()
    }

    /// Learned parameter, once frozen
    pub fn value(&self) -> Option<&Tensor> {
        self.value.as_ref()
    }

    /// Running average of the statistic
    pub fn running_stat(&self) -> Option<f32> {
        self.buffer
    }

    pub fn forward(&mut self, x: &Tensor) -> Tensor {
        if let Some(value) = &self.value {
            return self.restrict_clamp.forward(value);
        }

        let stat = (abs_max(x) / self.scaling_factor).max(MIN_STAT);
        let n = self.counter as f32;
        let running = self.buffer.map_or(stat, |b| (b * n + stat) / (n + 1.0));
        self.buffer = Some(running);
        self.counter += 1;

        if self.counter >= self.collect_stats_steps {
            let mut frozen = Tensor::scalar(running, false);
            self.restrict_inplace_preprocess.forward_inplace(&mut frozen);
            debug!(
                steps = self.counter,
                running_stat = running,
                "runtime stats collected, freezing scale parameter"
            );
            self.value = Some(Tensor::new(frozen.data().clone(), true).with_shape_of(&frozen));
        }

        let stat = self.restrict_preprocess.forward(&Tensor::scalar(stat, false));
        self.restrict_clamp.forward(&stat)
    }
}

/// Scale implementation used by a quantizer
#[derive(Clone, Debug)]
pub enum ScalingImpl {
    Parameter(ParameterScaling),
    Stats(StatsScaling),
    RuntimeStats(RuntimeStatsScaling),
}

impl ScalingImpl {
    /// Scale for input `x`
    pub fn forward(&mut self, x: &Tensor) -> Tensor {
        match self {
            ScalingImpl::Parameter(p) => p.forward(),
            ScalingImpl::Stats(s) => s.forward(x),
            ScalingImpl::RuntimeStats(r) => r.forward(x),
        }
    }
}
