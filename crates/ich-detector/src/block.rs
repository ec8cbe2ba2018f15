use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d, Relu};
use burn::prelude::{Backend, Config, Device, Module, Tensor};
use burn::tensor::activation::sigmoid;

/// conv3x3 -> bn -> relu -> maxpool /2
#[derive(Debug, Module)]
pub struct ConvBlock<B: Backend> {
	pub(crate) conv: Conv2d<B>,
	pub(crate) bn: BatchNorm<B, 2>,
	pub(crate) relu: Relu,
	pub(crate) pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
	pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		let x = self.conv.forward(input);
		let x = self.bn.forward(x);
		let x = self.relu.forward(x);

		self.pool.forward(x)
	}
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
	in_channels: usize,
	out_channels: usize,
}

impl ConvBlockConfig {
	pub fn init<B: Backend>(&self, device: &Device<B>) -> ConvBlock<B> {
		ConvBlock {
			conv: Conv2dConfig::new([self.in_channels, self.out_channels], [3, 3])
				.with_padding(PaddingConfig2d::Same)
				.init(device),
			bn: BatchNormConfig::new(self.out_channels).init(device),
			relu: Relu::new(),
			pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
		}
	}
}

/// Spatial attention: a 1x1 conv scores every position, the sigmoid of that
/// score gates all channels at the position.
#[derive(Debug, Module)]
pub struct SpatialAttention<B: Backend> {
	pub(crate) score: Conv2d<B>,
}

impl<B: Backend> SpatialAttention<B> {
	pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		let [batch_size, channels, height, width] = input.dims();

		// [B, 1, H, W]
		let mask = sigmoid(self.score.forward(input.clone()));
		let mask = mask.expand([batch_size, channels, height, width]);

		input * mask
	}
}

#[derive(Config, Debug)]
pub struct SpatialAttentionConfig {
	channels: usize,
}

impl SpatialAttentionConfig {
	pub fn init<B: Backend>(&self, device: &Device<B>) -> SpatialAttention<B> {
		SpatialAttention {
			score: Conv2dConfig::new([self.channels, 1], [1, 1]).init(device),
		}
	}
}
