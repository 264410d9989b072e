use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::{backend::Backend, Tensor};

use crate::modules::prelu::{PRelu, PReluConfig};

use super::block::{SpatioTemporalBlock, SpatioTemporalBlockConfig};
use super::conditioner::{ClassConditioner, ClassConditionerConfig};

/// Spatio-temporal graph convolutional predictor for pedestrian trajectories.
///
/// A fixed stage sequence: optional class-conditioned adjacency modulation,
/// N spatio-temporal blocks, a node/time axis swap, temporal projection
/// layers expanding the observed length to the prediction horizon (the first
/// with a plain activation, the middle ones residual, the last bare), and the
/// axis swap back.
#[derive(Module, Debug)]
pub struct SocialStgcn<B: Backend> {
    conditioner: Option<ClassConditioner<B>>,
    st_blocks: Vec<SpatioTemporalBlock<B>>,
    time_proj_in: Conv2d<B>,
    time_proj_in_act: PRelu<B>,
    time_proj_hidden: Vec<Conv2d<B>>,
    time_proj_hidden_acts: Vec<PRelu<B>>,
    time_proj_out: Conv2d<B>,
}

impl<B: Backend> SocialStgcn<B> {
    /// `v`: `(N, input_feat, T_obs, V)`, `a`: `(T_obs, V, V)`, `classes`:
    /// `(V, H)` one-hot, required exactly when class conditioning is enabled.
    ///
    /// Returns `(N, output_feat, T_pred, V)` predictions and the possibly
    /// modulated adjacency. The forward pass is a pure function of inputs
    /// and parameters; shape or relation-count mismatches panic.
    pub fn forward(
        &self,
        v: Tensor<B, 4>,
        a: Tensor<B, 3>,
        classes: Option<Tensor<B, 2>>,
    ) -> (Tensor<B, 4>, Tensor<B, 3>) {
        let (mut v, mut a) = match &self.conditioner {
            Some(conditioner) => conditioner.forward(v, a, classes.unwrap()),
            None => (v, a),
        };

        for block in &self.st_blocks {
            let (next_v, next_a) = block.forward(v, a);
            v = next_v;
            a = next_a;
        }

        let v = v.swap_dims(1, 2);
        let mut v = self.time_proj_in_act.forward(self.time_proj_in.forward(v));
        for (conv, act) in self
            .time_proj_hidden
            .iter()
            .zip(self.time_proj_hidden_acts.iter())
        {
            v = act.forward(conv.forward(v.clone())) + v;
        }
        let v = self.time_proj_out.forward(v);

        (v.swap_dims(1, 2), a)
    }
}

#[derive(Config, Debug)]
pub struct SocialStgcnConfig {
    /// Number of stacked spatio-temporal blocks.
    #[config(default = 1)]
    n_stgcn: usize,

    /// Number of temporal projection layers (first + residual middles + final).
    #[config(default = 5)]
    n_txpcnn: usize,

    #[config(default = 2)]
    input_feat: usize,

    /// Output parameter channels; five for a bivariate mixture-density head.
    #[config(default = 5)]
    output_feat: usize,

    /// Observed window length; also the graph kernel size, since the
    /// adjacency carries one relation per observed time step.
    #[config(default = 8)]
    seq_len: usize,

    /// Prediction horizon length.
    #[config(default = 12)]
    pred_seq_len: usize,

    /// Temporal kernel size of each block; must be odd.
    #[config(default = 3)]
    kernel_size: usize,

    /// Width of the per-pedestrian category one-hot encoding.
    #[config(default = 1)]
    hot_enc_length: usize,

    /// Enables class-conditioned adjacency modulation.
    #[config(default = false)]
    class_conditioning: bool,
}

impl SocialStgcnConfig {
    pub fn init<B: Backend>(&self) -> SocialStgcn<B> {
        let conditioner = if self.class_conditioning {
            Some(ClassConditionerConfig::new(self.seq_len, self.hot_enc_length).init())
        } else {
            None
        };

        let mut st_blocks = vec![SpatioTemporalBlockConfig::new(
            self.input_feat,
            self.output_feat,
            [self.kernel_size, self.seq_len],
        )
        .init()];
        for _ in 1..self.n_stgcn {
            st_blocks.push(
                SpatioTemporalBlockConfig::new(
                    self.output_feat,
                    self.output_feat,
                    [self.kernel_size, self.seq_len],
                )
                .init(),
            );
        }

        let time_proj = |input: usize, output: usize| {
            Conv2dConfig::new([input, output], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init()
        };

        let hidden = self.n_txpcnn.saturating_sub(2);
        let time_proj_hidden = (0..hidden)
            .map(|_| time_proj(self.pred_seq_len, self.pred_seq_len))
            .collect();
        let time_proj_hidden_acts = (0..hidden).map(|_| PReluConfig::new().init()).collect();

        SocialStgcn {
            conditioner,
            st_blocks,
            time_proj_in: time_proj(self.seq_len, self.pred_seq_len),
            time_proj_in_act: PReluConfig::new().init(),
            time_proj_hidden,
            time_proj_hidden_acts,
            time_proj_out: time_proj(self.pred_seq_len, self.pred_seq_len),
        }
    }
}
