use crate::error::IchError;
use crate::model::IchModelConfig;
use burn::config::Config;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const MPK_RECORD: &str = "model.mpk";
pub const PYTORCH_RECORD: &str = "model.pt";

/// Everything needed to rebuild the network and name its outputs.
/// Labels are indexed by the model's output column.
#[derive(Debug, Config)]
pub struct IchConfig {
	pub model: IchModelConfig,
	pub labels: Vec<String>,
	pub positive_labels: Vec<String>,
	#[config(default = 128)]
	pub image_size: u32,
}

impl IchConfig {
	/// Two-class haemorrhage detector: index 0 is "No ICH", index 1 is "ICH".
	pub fn ich() -> Self {
		Self::new(
			IchModelConfig::new(2),
			vec!["No ICH".to_string(), "ICH".to_string()],
			vec!["ICH".to_string()],
		)
	}

	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, IchError> {
		let path = path.as_ref();
		if !path.exists() {
			return Err(IchError::ArtifactNotFound(path.to_path_buf()));
		}

		let config = Self::load(path)
			.map_err(|err| IchError::InvalidConfig(format!("{}: {err:?}", path.display())))?;
		config.validate()?;

		Ok(config)
	}

	pub fn validate(&self) -> Result<(), IchError> {
		if self.labels.len() < 2 {
			return Err(IchError::InvalidConfig(format!(
				"expected at least two labels, got {}",
				self.labels.len()
			)));
		}

		if self.labels.len() != self.model.num_classes {
			return Err(IchError::LabelMismatch {
				labels: self.labels.len(),
				outputs: self.model.num_classes,
			});
		}

		if let Some(unknown) = self.positive_labels.iter().find(|l| !self.labels.contains(l)) {
			return Err(IchError::InvalidConfig(format!("positive label {unknown:?} is not in the label map")));
		}

		if self.image_size == 0 {
			return Err(IchError::InvalidConfig("image_size must be non-zero".to_string()));
		}

		Ok(())
	}

	pub fn label(&self, index: usize) -> Option<&str> {
		self.labels.get(index).map(String::as_str)
	}

	pub fn is_positive(&self, label: &str) -> bool {
		self.positive_labels.iter().any(|l| l == label)
	}
}

/// Weights formats an artifact directory can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
	/// burn's named MessagePack, full precision
	NamedMpk,
	/// PyTorch state dict, imported through burn-import
	PyTorch,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
	pub config: PathBuf,
	pub record: PathBuf,
	pub format: RecordFormat,
}

impl ArtifactPaths {
	/// Locates `config.json` and the weights record in `artifact_dir`.
	/// A burn record wins over a PyTorch one when both are present.
	pub fn resolve<P: AsRef<Path>>(artifact_dir: P) -> Result<Self, IchError> {
		let dir = artifact_dir.as_ref();
		if !dir.is_dir() {
			return Err(IchError::ArtifactNotFound(dir.to_path_buf()));
		}

		let config = dir.join(CONFIG_FILE);
		if !config.exists() {
			return Err(IchError::ArtifactNotFound(config));
		}

		let mpk = dir.join(MPK_RECORD);
		let pytorch = dir.join(PYTORCH_RECORD);
		let (record, format) = if mpk.exists() {
			(mpk, RecordFormat::NamedMpk)
		} else if pytorch.exists() {
			(pytorch, RecordFormat::PyTorch)
		} else {
			return Err(IchError::ArtifactNotFound(mpk));
		};

		Ok(Self { config, record, format })
	}
}
