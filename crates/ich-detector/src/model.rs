use crate::block::{ConvBlock, ConvBlockConfig, SpatialAttention, SpatialAttentionConfig};
use burn::config::Config;
use burn::module::Module;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::softmax;

/// CNN with a spatial attention stage ahead of the classifier head.
///
/// Takes a `[B, 3, H, W]` batch scaled to `[0, 1]` and returns
/// `[B, num_classes]` logits. The global pool makes the head independent of
/// the input side length, the checkpoints are trained on 128x128.
#[derive(Debug, Module)]
pub struct IchModel<B: Backend> {
	block1: ConvBlock<B>,
	block2: ConvBlock<B>,
	block3: ConvBlock<B>,
	attention: SpatialAttention<B>,
	pool: AdaptiveAvgPool2d,
	fc1: Linear<B>,
	activation: Relu,
	dropout: Dropout,
	fc2: Linear<B>,
}

impl<B: Backend> IchModel<B> {
	pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
		// 3x128x128 -> 32x64x64 -> 64x32x32 -> 128x16x16
		let x = self.block1.forward(images);
		let x = self.block2.forward(x);
		let x = self.block3.forward(x);

		let x = self.attention.forward(x);

		// [B, C, 1, 1] -> [B, C]
		let x = self.pool.forward(x);
		let x = x.flatten(1, 3);

		let x = self.fc1.forward(x);
		let x = self.activation.forward(x);
		let x = self.dropout.forward(x);

		self.fc2.forward(x)
	}

	/// Softmax over the class axis of [`forward`](Self::forward).
	pub fn forward_probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
		softmax(self.forward(images), 1)
	}

	/// Width of the final layer, read from the loaded weights rather than the config.
	pub fn num_outputs(&self) -> usize {
		let [_, d_output] = self.fc2.weight.val().dims();
		d_output
	}
}

#[derive(Debug, Config)]
pub struct IchModelConfig {
	pub num_classes: usize,
	#[config(default = 32)]
	pub base_channels: usize,
	#[config(default = 128)]
	pub hidden_size: usize,
	#[config(default = 0.5)]
	pub dropout: f64,
}

impl IchModelConfig {
	pub fn init<B: Backend>(&self, device: &B::Device) -> IchModel<B> {
		let c = self.base_channels;

		IchModel {
			block1: ConvBlockConfig::new(3, c).init(device),
			block2: ConvBlockConfig::new(c, c * 2).init(device),
			block3: ConvBlockConfig::new(c * 2, c * 4).init(device),
			attention: SpatialAttentionConfig::new(c * 4).init(device),
			pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
			fc1: LinearConfig::new(c * 4, self.hidden_size).init(device),
			activation: Relu::new(),
			dropout: DropoutConfig::new(self.dropout).init(),
			fc2: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
		}
	}
}
