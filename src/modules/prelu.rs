use burn::config::Config;
use burn::module::{Module, Param};
use burn::tensor::{backend::Backend, Tensor};

/// Parametric ReLU with a single learned slope for the negative range.
#[derive(Module, Debug)]
pub struct PRelu<B: Backend> {
    alpha: Param<Tensor<B, 1>>,
}

impl<B: Backend> PRelu<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let alpha: Tensor<B, D> = self.alpha.val().unsqueeze();
        let mask = x.clone().lower_elem(0.0);
        let scaled = x.clone() * alpha;

        x.mask_where(mask, scaled)
    }
}

#[derive(Config, Debug)]
pub struct PReluConfig {
    #[config(default = 0.25)]
    alpha: f64,
}

impl PReluConfig {
    pub fn init<B: Backend>(&self) -> PRelu<B> {
        let alpha = Tensor::ones([1]) * self.alpha as f32;

        PRelu {
            alpha: Param::from(alpha),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Data, Shape};

    type TestBackend = burn::backend::NdArray<f32>;

    #[test]
    fn keeps_positive_scales_negative() {
        let prelu = PReluConfig::new().init::<TestBackend>();
        let input: Tensor<TestBackend, 1> = Tensor::from_data(
            Data::new(vec![2.0, -4.0, 0.0], Shape::new([3])).convert(),
        );
        let output = prelu.forward(input).into_data().value;
        assert_eq!(output, vec![2.0, -1.0, 0.0]);
    }
}
