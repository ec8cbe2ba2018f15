use crate::config::{ArtifactPaths, IchConfig, RecordFormat};
use crate::data;
use crate::error::IchError;
use crate::model::{IchModel, IchModelRecord};
use burn::module::Module;
use burn::prelude::{Backend, Device};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use image::DynamicImage;
use log::{debug, info};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
	pub class_index: usize,
	pub label: String,
	/// Probability of `label`, in [0, 1].
	pub confidence: f32,
	/// Full softmax output, indexed like the label map.
	pub probabilities: Vec<f32>,
}

impl Prediction {
	pub fn confidence_percent(&self) -> String {
		format!("{:.2}%", self.confidence * 100.0)
	}
}

/// Loaded model plus the label map it was validated against.
///
/// Built once at startup and never mutated afterwards, every `predict_*`
/// call only reads it.
pub struct Predictor<B: Backend> {
	model: IchModel<B>,
	config: IchConfig,
	device: Device<B>,
}

impl<B: Backend> Predictor<B> {
	pub fn load<P: AsRef<Path>>(artifact_dir: P, device: Device<B>) -> Result<Self, IchError> {
		let paths = ArtifactPaths::resolve(&artifact_dir)?;
		info!("Loading model artifact from {:?}", artifact_dir.as_ref());

		let config = IchConfig::from_file(&paths.config)?;
		let model = config.model.init::<B>(&device);

		let model = match paths.format {
			RecordFormat::NamedMpk => {
				let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
				model
					.load_file(paths.record.clone(), &recorder, &device)
					.map_err(|err| IchError::ModelLoad(format!("{}: {err:?}", paths.record.display())))?
			}
			RecordFormat::PyTorch => {
				let record = Self::load_pytorch_record(&paths, &device)?;
				model.load_record(record)
			}
		};

		Self::new(model, config, device)
	}

	fn load_pytorch_record(paths: &ArtifactPaths, device: &Device<B>) -> Result<IchModelRecord<B>, IchError> {
		let load_args = LoadArgs::new(paths.record.clone());

		PyTorchFileRecorder::<FullPrecisionSettings>::new()
			.load(load_args, device)
			.map_err(|err| IchError::ModelLoad(format!("{}: {err:?}", paths.record.display())))
	}

	/// Pairs an in-memory model with its config, checking that the final
	/// layer's width matches the label map.
	pub fn new(model: IchModel<B>, config: IchConfig, device: Device<B>) -> Result<Self, IchError> {
		config.validate()?;

		let outputs = model.num_outputs();
		if outputs != config.labels.len() {
			return Err(IchError::LabelMismatch {
				labels: config.labels.len(),
				outputs,
			});
		}

		info!("Model ready: {} classes {:?}, {}px input", outputs, config.labels, config.image_size);

		Ok(Self { model, config, device })
	}

	pub fn config(&self) -> &IchConfig {
		&self.config
	}

	pub fn predict_path<P: AsRef<Path>>(&self, path: P) -> Result<Prediction, IchError> {
		debug!("Predicting {:?}", path.as_ref());
		let image = data::open_image(path)?;
		self.predict_image(&image)
	}

	pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction, IchError> {
		let image = data::decode_image(bytes)?;
		self.predict_image(&image)
	}

	pub fn predict_image(&self, image: &DynamicImage) -> Result<Prediction, IchError> {
		let batch = data::to_batch::<B>(image, self.config.image_size, &self.device);

		let probabilities = self
			.model
			.forward_probabilities(batch)
			.into_data()
			.convert::<f32>()
			.to_vec::<f32>()
			.map_err(|err| IchError::InvalidOutput(format!("{err:?}")))?;

		let (class_index, confidence) = select_class(&probabilities)
			.ok_or_else(|| IchError::InvalidOutput("no finite probability".to_string()))?;
		let label = self
			.config
			.label(class_index)
			.ok_or(IchError::LabelMismatch {
				labels: self.config.labels.len(),
				outputs: probabilities.len(),
			})?
			.to_string();

		debug!("Predicted {} ({:.4}) from {:?}", label, confidence, probabilities);

		Ok(Prediction {
			class_index,
			label,
			confidence,
			probabilities,
		})
	}
}

/// Arg-max over `probabilities`. Ties go to the lowest index, NaN never wins.
pub fn select_class(probabilities: &[f32]) -> Option<(usize, f32)> {
	let mut best: Option<(usize, f32)> = None;

	for (index, &p) in probabilities.iter().enumerate() {
		if p.is_nan() {
			continue;
		}
		if best.map_or(true, |(_, top)| p > top) {
			best = Some((index, p));
		}
	}

	best
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{CONFIG_FILE, MPK_RECORD};
	use crate::model::IchModelConfig;
	use burn::backend::NdArray;
	use burn::config::Config;
	use image::{ImageFormat, Rgb, RgbImage};
	use rand::Rng;
	use std::io::Cursor;

	type TestBackend = NdArray;

	fn small_config() -> IchConfig {
		let mut config = IchConfig::ich();
		config.model = IchModelConfig::new(2).with_base_channels(4).with_hidden_size(8);
		config
	}

	fn write_artifact(dir: &Path, config: &IchConfig) {
		let device = Default::default();
		let model = config.model.init::<TestBackend>(&device);

		config.save(dir.join(CONFIG_FILE)).unwrap();
		model
			.save_file(dir.join(MPK_RECORD), &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
			.unwrap();
	}

	fn png_bytes(image: RgbImage) -> Vec<u8> {
		let mut bytes = Vec::new();
		DynamicImage::ImageRgb8(image)
			.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
			.unwrap();
		bytes
	}

	fn noise_image(width: u32, height: u32) -> RgbImage {
		let mut rng = rand::thread_rng();
		RgbImage::from_fn(width, height, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]))
	}

	fn loaded_predictor(dir: &Path) -> Predictor<TestBackend> {
		Predictor::<TestBackend>::load(dir, Default::default()).unwrap()
	}

	#[test]
	fn select_class_picks_the_largest() {
		assert_eq!(select_class(&[0.2, 0.8]), Some((1, 0.8)));
		assert_eq!(select_class(&[0.9, 0.1]), Some((0, 0.9)));
	}

	#[test]
	fn select_class_ties_go_to_lowest_index() {
		assert_eq!(select_class(&[0.5, 0.5]), Some((0, 0.5)));
		assert_eq!(select_class(&[0.1, 0.45, 0.45]), Some((1, 0.45)));
	}

	#[test]
	fn select_class_skips_nan() {
		assert_eq!(select_class(&[f32::NAN, 0.3]), Some((1, 0.3)));
		assert_eq!(select_class(&[0.3, f32::NAN]), Some((0, 0.3)));
		assert_eq!(select_class(&[]), None);
	}

	#[test]
	fn confidence_is_rendered_as_percentage() {
		let prediction = Prediction {
			class_index: 1,
			label: "ICH".to_string(),
			confidence: 0.9375,
			probabilities: vec![0.0625, 0.9375],
		};

		assert_eq!(prediction.confidence_percent(), "93.75%");
	}

	#[test]
	fn black_image_runs_the_full_pipeline() {
		let dir = tempfile::tempdir().unwrap();
		write_artifact(dir.path(), &small_config());
		let predictor = loaded_predictor(dir.path());

		let prediction = predictor.predict_bytes(&png_bytes(RgbImage::new(128, 128))).unwrap();

		assert!(["No ICH", "ICH"].contains(&prediction.label.as_str()));
		assert!((0.0..=1.0).contains(&prediction.confidence));
		assert_eq!(prediction.probabilities.len(), 2);
		assert_eq!(prediction.probabilities[prediction.class_index], prediction.confidence);
		assert!((prediction.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-5);
	}

	#[test]
	fn same_bytes_give_the_same_prediction() {
		let dir = tempfile::tempdir().unwrap();
		write_artifact(dir.path(), &small_config());
		let predictor = loaded_predictor(dir.path());
		let bytes = png_bytes(noise_image(200, 150));

		let first = predictor.predict_bytes(&bytes).unwrap();
		let second = predictor.predict_bytes(&bytes).unwrap();

		assert_eq!(first, second);
	}

	#[test]
	fn reloading_the_artifact_predicts_identically() {
		let dir = tempfile::tempdir().unwrap();
		write_artifact(dir.path(), &small_config());
		let image = DynamicImage::ImageRgb8(noise_image(128, 128));

		let first = loaded_predictor(dir.path()).predict_image(&image).unwrap();
		let second = loaded_predictor(dir.path()).predict_image(&image).unwrap();

		assert_eq!(first, second);
	}

	#[test]
	fn path_and_bytes_agree() {
		let dir = tempfile::tempdir().unwrap();
		write_artifact(dir.path(), &small_config());
		let predictor = loaded_predictor(dir.path());
		let bytes = png_bytes(noise_image(64, 64));
		let path = dir.path().join("scan.png");
		std::fs::write(&path, &bytes).unwrap();

		assert_eq!(predictor.predict_path(&path).unwrap(), predictor.predict_bytes(&bytes).unwrap());
	}

	#[test]
	fn undecodable_input_is_an_error_not_a_panic() {
		let dir = tempfile::tempdir().unwrap();
		write_artifact(dir.path(), &small_config());
		let predictor = loaded_predictor(dir.path());

		let result = predictor.predict_bytes(b"\x89PNG but truncated");

		assert!(matches!(result, Err(IchError::Decode(_))));
		// the predictor keeps serving afterwards
		assert!(predictor.predict_bytes(&png_bytes(RgbImage::new(16, 16))).is_ok());
	}

	#[test]
	fn missing_artifact_fails_to_load() {
		let dir = tempfile::tempdir().unwrap();

		let result = Predictor::<TestBackend>::load(dir.path().join("artifacts"), Default::default());

		assert!(matches!(result, Err(IchError::ArtifactNotFound(_))));
	}

	#[test]
	fn corrupt_record_fails_to_load() {
		let dir = tempfile::tempdir().unwrap();
		small_config().save(dir.path().join(CONFIG_FILE)).unwrap();
		std::fs::write(dir.path().join(MPK_RECORD), b"not a record").unwrap();

		let result = Predictor::<TestBackend>::load(dir.path(), Default::default());

		assert!(matches!(result, Err(IchError::ModelLoad(_))));
	}

	#[test]
	fn model_width_must_match_labels() {
		let device = Default::default();
		let model = IchModelConfig::new(3)
			.with_base_channels(4)
			.with_hidden_size(8)
			.init::<TestBackend>(&device);

		let result = Predictor::new(model, small_config(), device);

		match result {
			Err(IchError::LabelMismatch { labels, outputs }) => {
				assert_eq!(labels, 2);
				assert_eq!(outputs, 3);
			}
			Err(other) => panic!("expected a label mismatch, got {other:?}"),
			Ok(_) => panic!("expected a label mismatch"),
		}
	}
}
