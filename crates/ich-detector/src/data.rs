use crate::error::IchError;
use burn::prelude::{Backend, Device, Tensor, TensorData};
use image::{imageops, DynamicImage, RgbImage};
use std::path::Path;

pub fn open_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage, IchError> {
	let bytes = std::fs::read(path)?;
	decode_image(&bytes)
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, IchError> {
	Ok(image::load_from_memory(bytes)?)
}

/// RGB8 copy of `image`, resized to `side` x `side` with nearest neighbour.
pub fn resized_rgb(image: &DynamicImage, side: u32) -> RgbImage {
	let rgb = image.to_rgb8();
	if rgb.dimensions() == (side, side) {
		return rgb;
	}

	imageops::resize(&rgb, side, side, imageops::FilterType::Nearest)
}

/// Pixels in R, G, B, R, G, B, ... order scaled from [0, 255] to [0, 1].
pub fn normalized_pixels(image: RgbImage) -> Vec<f32> {
	image.into_raw().into_iter().map(|x| (x as f32) / 255.0).collect()
}

/// Single-image batch `[1, 3, side, side]` ready for the model.
pub fn to_batch<B: Backend>(image: &DynamicImage, side: u32, device: &Device<B>) -> Tensor<B, 4> {
	let pixels = normalized_pixels(resized_rgb(image, side));
	let side = side as usize;

	let data = TensorData::new(pixels, [side, side, 3]).convert::<B::FloatElem>();

	// [H, W, C] -> [C, H, W] -> [1, C, H, W]
	Tensor::<B, 3>::from_data(data, device)
		.permute([2, 0, 1])
		.unsqueeze::<4>()
}
