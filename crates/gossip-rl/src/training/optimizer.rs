//! Adam and gradient clipping over [`Mlp`] parameters.

use crate::policy::{Gradients, Mlp};
use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};

/// Adam optimizer state for one network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Adam {
    pub learning_rate: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    step: u64,
    /// First and second moment estimates, shaped like the layers
    m: Vec<(Array2<f32>, Array1<f32>)>,
    v: Vec<(Array2<f32>, Array1<f32>)>,
}

impl Adam {
    pub fn new(mlp: &Mlp, learning_rate: f32, eps: f32) -> Self {
        let zeros = Gradients::zeros_like(mlp).layers;
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps,
            step: 0,
            m: zeros.clone(),
            v: zeros,
        }
    }

    /// Number of updates applied so far
    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Apply one update to `mlp`
    pub fn step(&mut self, mlp: &mut Mlp, grads: &Gradients) {
        self.step += 1;
        let bias1 = 1.0 - self.beta1.powi(self.step as i32);
        let bias2 = 1.0 - self.beta2.powi(self.step as i32);
        let step_size = self.learning_rate / bias1;
        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.eps);

        let update = |p: f32, m: &mut f32, v: &mut f32, g: f32| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            p - step_size * *m / ((*v / bias2).sqrt() + eps)
        };

        for (((layer, (gw, gb)), (mw, mb)), (vw, vb)) in mlp
            .layers_mut()
            .iter_mut()
            .zip(&grads.layers)
            .zip(&mut self.m)
            .zip(&mut self.v)
        {
            Zip::from(&mut layer.weights)
                .and(gw)
                .and(mw)
                .and(vw)
                .for_each(|p, &g, m, v| *p = update(*p, m, v, g));
            Zip::from(&mut layer.biases)
                .and(gb)
                .and(mb)
                .and(vb)
                .for_each(|p, &g, m, v| *p = update(*p, m, v, g));
        }
    }
}

/// Scale all gradients together so their global L2 norm is at most
/// `max_norm`. Returns the norm before clipping.
pub fn clip_grad_norm(grads: &mut [&mut Gradients], max_norm: f32) -> f32 {
    let global_norm = grads.iter().map(|g| g.squared_norm()).sum::<f32>().sqrt();
    if global_norm > max_norm {
        let clip_coef = max_norm / (global_norm + 1e-6);
        for g in grads.iter_mut() {
            g.scale(clip_coef);
        }
    }
    global_norm
}
