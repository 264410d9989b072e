use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};

use crate::modules::prelu::{PRelu, PReluConfig};

/// Conditions the adjacency tensor on per-pedestrian category encodings.
///
/// Features and adjacency are first re-weighted through learned per-time-step
/// linear layers. The one-hot matrix is broadcast to every node pair (row-wise
/// and column-wise) and concatenated into a symmetric pairwise category
/// feature, projected to one relation per time step, concatenated with the
/// re-weighted adjacency along the relation axis and fused back down to the
/// original relation count.
#[derive(Module, Debug)]
pub struct ClassConditioner<B: Backend> {
    feature_norm: Linear<B>,
    feature_act: PRelu<B>,
    adjacency_norm: Linear<B>,
    adjacency_act: PRelu<B>,
    pair_proj: Linear<B>,
    pair_act: PRelu<B>,
    fuse_proj: Linear<B>,
    fuse_act: PRelu<B>,
}

impl<B: Backend> ClassConditioner<B> {
    /// `v`: `(N, C, T, V)`, `a`: `(T, V, V)`, `classes`: `(V, H)` one-hot.
    pub fn forward(
        &self,
        v: Tensor<B, 4>,
        a: Tensor<B, 3>,
        classes: Tensor<B, 2>,
    ) -> (Tensor<B, 4>, Tensor<B, 3>) {
        let nodes = a.dims()[1];

        let v = v.swap_dims(2, 3);
        let v = self.feature_act.forward(self.feature_norm.forward(v));
        let v = v.swap_dims(2, 3);

        // [T, V, V] -> [V, V, T] so the linear layers act on the time axis.
        let a = a.swap_dims(0, 1).swap_dims(1, 2);
        let a = self.adjacency_act.forward(self.adjacency_norm.forward(a));
        let a = a.swap_dims(0, 2).swap_dims(1, 2);

        // Pairwise category feature: entry (i, j) is [classes[i], classes[j]].
        let rows = classes.clone().unsqueeze_dim::<3>(1).repeat(1, nodes);
        let cols = classes.unsqueeze::<3>().repeat(0, nodes);
        let pairs = Tensor::cat(vec![rows, cols], 2);

        let c = self.pair_act.forward(self.pair_proj.forward(pairs));
        let c = c.swap_dims(0, 2).swap_dims(1, 2);

        let fused = Tensor::cat(vec![a, c], 0);
        let fused = fused.swap_dims(0, 1).swap_dims(1, 2);
        let fused = self.fuse_act.forward(self.fuse_proj.forward(fused));
        let a = fused.swap_dims(0, 2).swap_dims(1, 2);

        (v, a)
    }
}

#[derive(Config, Debug)]
pub struct ClassConditionerConfig {
    seq_len: usize,
    hot_enc_length: usize,
}

impl ClassConditionerConfig {
    pub fn init<B: Backend>(&self) -> ClassConditioner<B> {
        ClassConditioner {
            feature_norm: LinearConfig::new(self.seq_len, self.seq_len).init(),
            feature_act: PReluConfig::new().init(),
            adjacency_norm: LinearConfig::new(self.seq_len, self.seq_len).init(),
            adjacency_act: PReluConfig::new().init(),
            pair_proj: LinearConfig::new(2 * self.hot_enc_length, self.seq_len).init(),
            pair_act: PReluConfig::new().init(),
            fuse_proj: LinearConfig::new(2 * self.seq_len, self.seq_len).init(),
            fuse_act: PReluConfig::new().init(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Data, Shape};

    type TestBackend = burn::backend::NdArray<f32>;

    #[test]
    fn preserves_feature_and_adjacency_shapes() {
        let conditioner = ClassConditionerConfig::new(8, 2).init::<TestBackend>();
        let v = Tensor::zeros([1, 2, 8, 5]);
        let a = Tensor::ones([8, 5, 5]);
        let classes: Tensor<TestBackend, 2> = Tensor::from_data(
            Data::new(
                vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0],
                Shape::new([5, 2]),
            )
            .convert(),
        );

        let (v, a) = conditioner.forward(v, a, classes);
        assert_eq!(v.dims(), [1, 2, 8, 5]);
        assert_eq!(a.dims(), [8, 5, 5]);
    }
}
