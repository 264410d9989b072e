use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, PaddingConfig2d};
use burn::tensor::{backend::Backend, Tensor};

use crate::modules::prelu::{PRelu, PReluConfig};

use super::graph_conv::{GraphConv, GraphConvConfig};

/// How the residual branch is formed, decided once at construction.
enum ResidualStrategy {
    Zero,
    Identity,
    LearnedProjection,
}

/// Applies a spatial-temporal graph convolution over an input graph sequence:
/// graph convolution, then batch norm, activation, temporal convolution,
/// batch norm and dropout, plus a residual path.
///
/// Shapes:
/// - input features `(N, in_channels, T, V)`
/// - adjacency `(K, V, V)` where `K == kernel_size[1]`
/// - output features `(N, out_channels, T_out, V)` with `T_out == T` unless
///   the temporal stride exceeds one.
#[derive(Module, Debug)]
pub struct SpatioTemporalBlock<B: Backend> {
    use_mdn: bool,
    residual: bool,
    gcn: GraphConv<B>,
    tcn_norm_in: BatchNorm<B, 2>,
    tcn_act: PRelu<B>,
    tcn_conv: Conv2d<B>,
    tcn_norm_out: BatchNorm<B, 2>,
    tcn_dropout: Dropout,
    residual_conv: Option<Conv2d<B>>,
    residual_norm: Option<BatchNorm<B, 2>>,
    out_act: PRelu<B>,
}

impl<B: Backend> SpatioTemporalBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>, a: Tensor<B, 3>) -> (Tensor<B, 4>, Tensor<B, 3>) {
        let res = if !self.residual {
            None
        } else {
            match (&self.residual_conv, &self.residual_norm) {
                (Some(conv), Some(norm)) => Some(norm.forward(conv.forward(x.clone()))),
                _ => Some(x.clone()),
            }
        };

        let (x, a) = self.gcn.forward(x, a);

        let x = self.tcn_norm_in.forward(x);
        let x = self.tcn_act.forward(x);
        let x = self.tcn_conv.forward(x);
        let x = self.tcn_norm_out.forward(x);
        let x = self.tcn_dropout.forward(x);

        let x = match res {
            Some(res) => x + res,
            None => x,
        };

        // A mixture-density head downstream expects unnormalized outputs.
        let x = if self.use_mdn { x } else { self.out_act.forward(x) };

        (x, a)
    }
}

#[derive(Config, Debug)]
pub struct SpatioTemporalBlockConfig {
    in_channels: usize,
    out_channels: usize,
    /// `[temporal kernel, graph kernel]`; the temporal kernel must be odd so
    /// symmetric padding preserves the sequence length at stride one.
    kernel_size: [usize; 2],

    #[config(default = false)]
    use_mdn: bool,

    #[config(default = 1)]
    stride: usize,

    #[config(default = 0.0)]
    dropout: f64,

    #[config(default = true)]
    residual: bool,
}

impl SpatioTemporalBlockConfig {
    pub fn init<B: Backend>(&self) -> SpatioTemporalBlock<B> {
        let [t_kernel, graph_kernel] = self.kernel_size;
        assert!(t_kernel % 2 == 1, "temporal kernel size must be odd");
        let padding = (t_kernel - 1) / 2;

        let gcn = GraphConvConfig::new(self.in_channels, self.out_channels, graph_kernel).init();

        let tcn_conv = Conv2dConfig::new([self.out_channels, self.out_channels], [t_kernel, 1])
            .with_stride([self.stride, 1])
            .with_padding(PaddingConfig2d::Explicit(padding, 0))
            .init();

        let strategy = if !self.residual {
            ResidualStrategy::Zero
        } else if self.in_channels == self.out_channels && self.stride == 1 {
            ResidualStrategy::Identity
        } else {
            ResidualStrategy::LearnedProjection
        };

        let (residual_conv, residual_norm) = match strategy {
            ResidualStrategy::LearnedProjection => (
                Some(
                    Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1])
                        .with_stride([self.stride, 1])
                        .init(),
                ),
                Some(BatchNormConfig::new(self.out_channels).init()),
            ),
            _ => (None, None),
        };

        SpatioTemporalBlock {
            use_mdn: self.use_mdn,
            residual: self.residual,
            gcn,
            tcn_norm_in: BatchNormConfig::new(self.out_channels).init(),
            tcn_act: PReluConfig::new().init(),
            tcn_conv,
            tcn_norm_out: BatchNormConfig::new(self.out_channels).init(),
            tcn_dropout: DropoutConfig::new(self.dropout).init(),
            residual_conv,
            residual_norm,
            out_act: PReluConfig::new().init(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Data, Shape};

    type TestBackend = burn::backend::NdArray<f32>;

    fn adjacency(relations: usize, nodes: usize) -> Tensor<TestBackend, 3> {
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
        let block = SpatioTemporalBlockConfig::new(2, 4, [3, 3]).init::<TestBackend>();
        let x = Tensor::zeros([1, 2, 8, 10]);
        let (out, a) = block.forward(x, adjacency(3, 10));
        assert_eq!(out.dims(), [1, 4, 8, 10]);
        assert_eq!(a.dims(), [3, 10, 10]);
    }

    #[test]
    fn strided_block_halves_time_via_learned_projection() {
        let block = SpatioTemporalBlockConfig::new(2, 4, [3, 3])
            .with_stride(2)
            .init::<TestBackend>();
        let x = Tensor::zeros([1, 2, 8, 10]);
        let (out, _) = block.forward(x, adjacency(3, 10));
        assert_eq!(out.dims(), [1, 4, 4, 10]);
    }

    #[test]
    fn runs_without_residual() {
        let block = SpatioTemporalBlockConfig::new(2, 2, [3, 3])
            .with_residual(false)
            .init::<TestBackend>();
        let x = Tensor::zeros([1, 2, 8, 10]);
        let (out, _) = block.forward(x, adjacency(3, 10));
        assert_eq!(out.dims(), [1, 2, 8, 10]);
    }

    #[test]
    fn residual_strategy_is_resolved_at_construction() {
        let identity = SpatioTemporalBlockConfig::new(4, 4, [3, 3]).init::<TestBackend>();
        assert!(identity.residual);
        assert!(identity.residual_conv.is_none());

        let projected = SpatioTemporalBlockConfig::new(2, 4, [3, 3]).init::<TestBackend>();
        assert!(projected.residual_conv.is_some());

        let disabled = SpatioTemporalBlockConfig::new(4, 4, [3, 3])
            .with_residual(false)
            .init::<TestBackend>();
        assert!(!disabled.residual);
        assert!(disabled.residual_conv.is_none());
    }

    #[test]
    #[should_panic(expected = "must be odd")]
    fn even_temporal_kernel_is_rejected() {
        let _ = SpatioTemporalBlockConfig::new(2, 4, [4, 3]).init::<TestBackend>();
    }
}
