use crate::error::IchError;
use crate::infer::{Prediction, Predictor};
use crate::ui;
use crate::upload::{ImageSource, StagedImage, UploadStore};
use burn::prelude::Backend;
use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions};
use eframe::{App, Frame};
use log::{debug, error, info, warn};
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DisplayMode {
    Basic,
    Detailed,
}

/// Result of the last request, kept until the next one replaces it.
pub struct Outcome {
    pub display_name: String,
    pub size: (u32, u32),
    pub preview: TextureHandle,
    pub prediction: Prediction,
}

pub struct IchApp<B: Backend> {
    // --- Core State ---
    pub predictor: Predictor<B>,
    pub store: UploadStore,
    pub sample_path: PathBuf,

    // --- UI State ---
    pub display_mode: DisplayMode,
    pub show_confidence: bool,
    /// Path typed into the upload field.
    pub upload_path: String,
    pub outcome: Option<Outcome>,
    pub error: Option<String>,
}

impl<B: Backend> IchApp<B> {
    pub fn new(predictor: Predictor<B>, store: UploadStore, sample_path: PathBuf) -> Self {
        Self {
            predictor,
            store,
            sample_path,
            display_mode: DisplayMode::Basic,
            show_confidence: true,
            upload_path: String::new(),
            outcome: None,
            error: None,
        }
    }

    /// Stages, previews and classifies one image. Any failure is kept as a
    /// message for the central panel, the app stays up.
    pub fn submit(&mut self, ctx: &egui::Context, source: ImageSource) {
        match self.run(ctx, source) {
            Ok(outcome) => {
                info!(
                    "{}: {} ({})",
                    outcome.display_name,
                    outcome.prediction.label,
                    outcome.prediction.confidence_percent()
                );
                self.outcome = Some(outcome);
                self.error = None;
            }
            Err(err) => {
                if err.is_recoverable() {
                    warn!("Request failed: {err}");
                } else {
                    error!("Request failed: {err}");
                }
                self.outcome = None;
                self.error = Some(user_message(&err));
            }
        }
    }

    fn run(&self, ctx: &egui::Context, source: ImageSource) -> Result<Outcome, IchError> {
        let staged = source.stage(&self.store)?;
        debug!("Staged {:?}", staged.path);
        let prediction = self.predictor.predict_image(&staged.image)?;

        Ok(Outcome {
            display_name: staged.display_name.clone(),
            size: staged.size(),
            preview: load_preview(ctx, &staged),
            prediction,
        })
    }

    pub fn submit_sample(&mut self, ctx: &egui::Context) {
        let source = ImageSource::Sample(self.sample_path.clone());
        self.submit(ctx, source);
    }

    /// Reads the file named in the upload field and submits it as an upload.
    pub fn submit_upload_path(&mut self, ctx: &egui::Context) {
        let path = PathBuf::from(self.upload_path.trim());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        match std::fs::read(&path) {
            Ok(bytes) => self.submit(ctx, ImageSource::Upload { file_name, bytes }),
            Err(err) => {
                warn!("Could not read {:?}: {err}", path);
                self.outcome = None;
                self.error = Some(format!("Could not read {}: {err}", path.display()));
            }
        }
    }

    /// Files dropped onto the window are treated like uploads.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());

        if let Some(file) = dropped.into_iter().next() {
            let bytes = match (&file.bytes, &file.path) {
                (Some(bytes), _) => Ok(bytes.to_vec()),
                (None, Some(path)) => std::fs::read(path),
                (None, None) => return,
            };

            let file_name = match &file.path {
                Some(path) => path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                None => file.name.clone(),
            };

            match bytes {
                Ok(bytes) => self.submit(ctx, ImageSource::Upload { file_name, bytes }),
                Err(err) => self.error = Some(format!("Could not read {file_name}: {err}")),
            }
        }
    }
}

impl<B: Backend> App for IchApp<B> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.handle_dropped_files(ctx);

        ui::draw_side_panel(self, ctx);
        ui::draw_central_panel(self, ctx);
    }
}

fn load_preview(ctx: &egui::Context, staged: &StagedImage) -> TextureHandle {
    let rgba = staged.image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let image = ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());

    ctx.load_texture("preview", image, TextureOptions::LINEAR)
}

/// Text shown in the window for a failed request.
pub fn user_message(err: &IchError) -> String {
    match err {
        IchError::SampleNotFound(path) => format!(
            "Sample image not found. Please ensure '{}' exists.",
            path.display()
        ),
        IchError::UnsupportedExtension(_) => {
            "Unsupported file type. Please upload a JPG, JPEG or PNG image.".to_string()
        }
        IchError::Decode(_) => "The file could not be read as an image.".to_string(),
        other => other.to_string(),
    }
}
