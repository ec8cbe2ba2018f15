use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IchError {
	#[error("Model artifact not found in {0}")]
	ArtifactNotFound(PathBuf),
	#[error("Invalid model config: {0}")]
	InvalidConfig(String),
	#[error("Label map has {labels} entries but the model outputs {outputs} classes")]
	LabelMismatch { labels: usize, outputs: usize },
	#[error("Could not load model weights: {0}")]
	ModelLoad(String),
	#[error("Sample image not found at {0}")]
	SampleNotFound(PathBuf),
	#[error("Unsupported image type {0:?}, expected JPG, JPEG or PNG")]
	UnsupportedExtension(String),
	#[error("Could not decode image")]
	Decode(#[from] image::ImageError),
	#[error("Model output could not be read: {0}")]
	InvalidOutput(String),
	#[error("Std IO error")]
	StdIoError(#[from] std::io::Error),
}

impl IchError {
	/// Whether the error only affects the current request.
	pub fn is_recoverable(&self) -> bool {
		matches!(
			self,
			IchError::SampleNotFound(_)
				| IchError::UnsupportedExtension(_)
				| IchError::Decode(_)
				| IchError::InvalidOutput(_)
				| IchError::StdIoError(_)
		)
	}
}
