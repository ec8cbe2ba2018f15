use crate::data;
use crate::error::IchError;
use image::DynamicImage;
use log::{debug, warn};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
pub const DEFAULT_UPLOAD_DIR: &str = "./upload_image";
pub const DEFAULT_SAMPLE: &str = "./upload_image/ich.png";

/// Rejects anything that is not a JPG, JPEG or PNG file name.
pub fn check_extension(file_name: &str) -> Result<(), IchError> {
	let extension = Path::new(file_name)
		.extension()
		.and_then(|ext| ext.to_str())
		.map(str::to_ascii_lowercase)
		.unwrap_or_default();

	if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
		Ok(())
	} else {
		warn!("Rejected upload {:?}", file_name);
		Err(IchError::UnsupportedExtension(extension))
	}
}

pub fn resolve_sample<P: AsRef<Path>>(path: P) -> Result<PathBuf, IchError> {
	let path = path.as_ref();
	if path.is_file() {
		Ok(path.to_path_buf())
	} else {
		Err(IchError::SampleNotFound(path.to_path_buf()))
	}
}

/// Scratch directory uploads are written to before prediction.
#[derive(Debug, Clone)]
pub struct UploadStore {
	dir: PathBuf,
}

impl UploadStore {
	pub fn new<P: AsRef<Path>>(dir: P) -> Self {
		Self { dir: dir.as_ref().to_path_buf() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Writes `bytes` under the final component of `file_name`, so a name like
	/// `../scan.png` still lands inside the store.
	pub fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, IchError> {
		check_extension(file_name)?;

		let base_name = Path::new(file_name)
			.file_name()
			.ok_or_else(|| IchError::UnsupportedExtension(String::new()))?;

		if !self.dir.exists() {
			create_dir_all(&self.dir)?;
		}

		let path = self.dir.join(base_name);
		std::fs::write(&path, bytes)?;
		debug!("Saved upload to {:?}", path);

		Ok(path)
	}
}

pub enum ImageSource {
	Upload { file_name: String, bytes: Vec<u8> },
	Sample(PathBuf),
}

/// An image that passed staging: on disk, decoded, ready for preview and prediction.
pub struct StagedImage {
	pub path: PathBuf,
	pub display_name: String,
	pub image: DynamicImage,
}

impl StagedImage {
	pub fn size(&self) -> (u32, u32) {
		(self.image.width(), self.image.height())
	}
}

impl ImageSource {
	pub fn stage(self, store: &UploadStore) -> Result<StagedImage, IchError> {
		let (path, display_name) = match self {
			ImageSource::Upload { file_name, bytes } => {
				let path = store.save(&file_name, &bytes)?;
				let display_name = path
					.file_name()
					.map(|name| name.to_string_lossy().into_owned())
					.unwrap_or(file_name);
				(path, display_name)
			}
			ImageSource::Sample(path) => {
				let path = resolve_sample(path)?;
				let file = path
					.file_name()
					.map(|name| name.to_string_lossy().into_owned())
					.unwrap_or_default();
				(path, format!("Sample: {file}"))
			}
		};

		let image = data::open_image(&path)?;

		Ok(StagedImage { path, display_name, image })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::{ImageFormat, RgbImage};
	use std::io::Cursor;

	fn png_bytes() -> Vec<u8> {
		let mut bytes = Vec::new();
		DynamicImage::ImageRgb8(RgbImage::new(40, 30))
			.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
			.unwrap();
		bytes
	}

	#[test]
	fn allowed_extensions_pass() {
		for name in ["scan.jpg", "scan.jpeg", "scan.png", "SCAN.PNG", "brain.Jpg"] {
			assert!(check_extension(name).is_ok(), "{name} should be accepted");
		}
	}

	#[test]
	fn other_extensions_are_rejected() {
		assert!(matches!(check_extension("scan.bmp"), Err(IchError::UnsupportedExtension(ext)) if ext == "bmp"));
		assert!(check_extension("scan.gif").is_err());
		assert!(check_extension("scan").is_err());
		assert!(check_extension("png").is_err());
	}

	#[test]
	fn bmp_upload_never_touches_disk() {
		let dir = tempfile::tempdir().unwrap();
		let store = UploadStore::new(dir.path().join("uploads"));

		let source = ImageSource::Upload {
			file_name: "scan.bmp".to_string(),
			bytes: png_bytes(),
		};

		assert!(matches!(source.stage(&store), Err(IchError::UnsupportedExtension(_))));
		assert!(!store.dir().exists());
	}

	#[test]
	fn upload_is_saved_and_decoded() {
		let dir = tempfile::tempdir().unwrap();
		let store = UploadStore::new(dir.path().join("uploads"));

		let staged = ImageSource::Upload {
			file_name: "scan.png".to_string(),
			bytes: png_bytes(),
		}
		.stage(&store)
		.unwrap();

		assert_eq!(staged.path, dir.path().join("uploads").join("scan.png"));
		assert_eq!(staged.display_name, "scan.png");
		assert_eq!(staged.size(), (40, 30));
		assert!(staged.path.exists());
	}

	#[test]
	fn upload_name_cannot_escape_the_store() {
		let dir = tempfile::tempdir().unwrap();
		let store = UploadStore::new(dir.path().join("uploads"));

		let path = store.save("../../scan.png", &png_bytes()).unwrap();

		assert_eq!(path, dir.path().join("uploads").join("scan.png"));
	}

	#[test]
	fn undecodable_upload_is_a_decode_error() {
		let dir = tempfile::tempdir().unwrap();
		let store = UploadStore::new(dir.path());

		let source = ImageSource::Upload {
			file_name: "scan.jpg".to_string(),
			bytes: b"plain text pretending to be a jpeg".to_vec(),
		};

		assert!(matches!(source.stage(&store), Err(IchError::Decode(_))));
	}

	#[test]
	fn missing_sample_is_reported() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("ich.png");

		let result = ImageSource::Sample(missing.clone()).stage(&UploadStore::new(dir.path()));

		match result {
			Err(IchError::SampleNotFound(path)) => assert_eq!(path, missing),
			Err(other) => panic!("expected SampleNotFound, got {other:?}"),
			Ok(_) => panic!("expected SampleNotFound"),
		}
	}

	#[test]
	fn sample_gets_a_prefixed_name() {
		let dir = tempfile::tempdir().unwrap();
		let sample = dir.path().join("ich.png");
		std::fs::write(&sample, png_bytes()).unwrap();

		let staged = ImageSource::Sample(sample.clone()).stage(&UploadStore::new(dir.path())).unwrap();

		assert_eq!(staged.display_name, "Sample: ich.png");
		assert_eq!(staged.path, sample);
	}
}
