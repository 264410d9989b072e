use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::{backend::Backend, Tensor};

/// The basic module for applying a graph convolution.
///
/// A learned transform produces `out_channels` feature maps per relation at
/// each time step (1-wide along the node axis; a wider temporal kernel is
/// allowed for multi-frame smoothing), then node features are mixed across
/// the graph by contracting against the adjacency tensor.
///
/// Shapes:
/// - input features `(N, in_channels, T, V)`
/// - adjacency `(K, V, V)` where `K == kernel_size`
/// - output features `(N, out_channels, T, V)`, adjacency passed through
///   unchanged.
#[derive(Module, Debug)]
pub struct GraphConv<B: Backend> {
    kernel_size: usize,
    conv: Conv2d<B>,
}

impl<B: Backend> GraphConv<B> {
    pub fn forward(&self, x: Tensor<B, 4>, a: Tensor<B, 3>) -> (Tensor<B, 4>, Tensor<B, 3>) {
        assert_eq!(
            a.dims()[0],
            self.kernel_size,
            "adjacency relation count must equal the graph kernel size"
        );

        let x = self.conv.forward(x);
        let [batch, channels, time, nodes] = x.dims();
        let per_relation = channels / self.kernel_size;

        // out[n, c, t, w] = sum_k sum_v x[n, k, c, t, v] * a[k, v, w],
        // expressed as a batched matmul over the flattened (c, t) axes.
        let x = x.reshape([batch, self.kernel_size, per_relation * time, nodes]);
        let a_batched: Tensor<B, 4> = a.clone().unsqueeze::<4>().repeat(0, batch);
        let x = x.matmul(a_batched);
        let x = x.sum_dim(1);
        let x = x.reshape([batch, per_relation, time, nodes]);

        (x, a)
    }
}

#[derive(Config, Debug)]
pub struct GraphConvConfig {
    in_channels: usize,
    out_channels: usize,
    /// Number of adjacency relations contracted per application.
    kernel_size: usize,

    #[config(default = 1)]
    t_kernel_size: usize,

    #[config(default = 1)]
    t_stride: usize,

    #[config(default = 0)]
    t_padding: usize,

    #[config(default = 1)]
    t_dilation: usize,

    #[config(default = true)]
    bias: bool,
}

impl GraphConvConfig {
    pub fn init<B: Backend>(&self) -> GraphConv<B> {
        let conv = Conv2dConfig::new(
            [self.in_channels, self.out_channels * self.kernel_size],
            [self.t_kernel_size, 1],
        )
        .with_stride([self.t_stride, 1])
        .with_padding(PaddingConfig2d::Explicit(self.t_padding, 0))
        .with_dilation([self.t_dilation, 1])
        .with_bias(self.bias)
        .init();

        GraphConv {
            kernel_size: self.kernel_size,
            conv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Data, Shape};

    type TestBackend = burn::backend::NdArray<f32>;

    fn identity_stack(relations: usize, nodes: usize) -> Tensor<TestBackend, 3> {
        let mut values = vec![0.0f32; relations * nodes * nodes];
        for k in 0..relations {
            for v in 0..nodes {
                values[k * nodes * nodes + v * nodes + v] = 1.0;
            }
        }
        Tensor::from_data(Data::new(values, Shape::new([relations, nodes, nodes])).convert())
    }

    #[test]
    fn preserves_time_and_node_dims() {
        let gcn = GraphConvConfig::new(2, 4, 3).init::<TestBackend>();
        let x = Tensor::zeros([1, 2, 8, 10]);
        let (out, a) = gcn.forward(x, identity_stack(3, 10));
        assert_eq!(out.dims(), [1, 4, 8, 10]);
        assert_eq!(a.dims(), [3, 10, 10]);
    }

    #[test]
    fn zero_input_without_bias_is_zero() {
        let gcn = GraphConvConfig::new(2, 4, 3)
            .with_bias(false)
            .init::<TestBackend>();
        let x = Tensor::zeros([1, 2, 8, 10]);
        let (out, _) = gcn.forward(x, identity_stack(3, 10));
        for value in out.into_data().value {
            assert_eq!(value, 0.0);
        }
    }

    /// With an identity slice per relation there is no cross-node mixing:
    /// zero inputs map to the learned bias alone, constant over time and
    /// node axes.
    #[test]
    fn zero_input_with_identity_adjacency_yields_bias_only() {
        let gcn = GraphConvConfig::new(2, 4, 3).init::<TestBackend>();
        let x = Tensor::zeros([1, 2, 8, 10]);
        let (out, _) = gcn.forward(x, identity_stack(3, 10));

        let [_, channels, time, nodes] = out.dims();
        let values = out.into_data().value;
        for c in 0..channels {
            let reference = values[c * time * nodes];
            for i in 0..time * nodes {
                assert!((values[c * time * nodes + i] - reference).abs() < 1e-6);
            }
        }
    }

    #[test]
    #[should_panic(expected = "relation count")]
    fn relation_count_mismatch_fails_fast() {
        let gcn = GraphConvConfig::new(2, 4, 3).init::<TestBackend>();
        let x = Tensor::zeros([1, 2, 8, 10]);
        gcn.forward(x, identity_stack(2, 10));
    }
}
