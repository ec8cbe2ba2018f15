use crate::app::IchApp;
use crate::infer::Predictor;
use crate::upload::{ImageSource, UploadStore, DEFAULT_SAMPLE, DEFAULT_UPLOAD_DIR};
use anyhow::{anyhow, Context};
use burn_tch::{LibTorch, LibTorchDevice};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::time::SystemTime;

mod app;
mod block;
mod config;
mod data;
mod error;
mod infer;
mod model;
mod ui;
mod upload;

#[derive(Parser, Debug)]
#[command(version, about = "Intracranial hemorrhage detection from MRI scans")]
struct Args {
    /// Directory holding config.json and model.mpk (or model.pt)
    #[arg(short, long, default_value = "./artifacts")]
    artifacts: PathBuf,

    /// Image used by "Use Sample Image Instead"
    #[arg(long, default_value = DEFAULT_SAMPLE)]
    sample: PathBuf,

    /// Scratch directory uploads are written to
    #[arg(long, default_value = DEFAULT_UPLOAD_DIR)]
    upload_dir: PathBuf,

    /// Run on the first CUDA device when one is available
    #[arg(long)]
    cuda: bool,

    /// Classify this image, print the result and exit instead of opening the window
    #[arg(short, long)]
    image: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("Could not initialise logging")?;

    let args = Args::parse();
    let device = select_device(args.cuda);

    let time = SystemTime::now();
    let predictor = Predictor::<LibTorch>::load(&args.artifacts, device)
        .inspect_err(|err| error!("Cannot serve predictions: {err}"))
        .with_context(|| format!("Failed to load model artifact from {}", args.artifacts.display()))?;
    info!("Model loaded in {}ms", time.elapsed().map(|d| d.as_millis()).unwrap_or_default());

    let store = UploadStore::new(&args.upload_dir);
    info!("Uploads are written to {:?}", store.dir());

    match args.image {
        Some(path) => predict_once(&predictor, &store, path),
        None => run_shell(predictor, store, args.sample),
    }
}

fn select_device(cuda: bool) -> LibTorchDevice {
    if !cuda {
        return LibTorchDevice::Cpu;
    }

    if tch::utils::has_cuda() {
        info!("Using CUDA device 0");
        LibTorchDevice::Cuda(0)
    } else {
        warn!("Could not detect valid CUDA configuration, falling back to CPU");
        LibTorchDevice::Cpu
    }
}

/// Classifies one image through the same staging as the window and prints
/// `label<TAB>confidence`.
fn predict_once(predictor: &Predictor<LibTorch>, store: &UploadStore, path: PathBuf) -> anyhow::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} is not a file", path.display()))?;
    let bytes = std::fs::read(&path).with_context(|| format!("Could not read {}", path.display()))?;

    let staged = ImageSource::Upload { file_name, bytes }.stage(store)?;
    let prediction = predictor.predict_image(&staged.image)?;

    println!("{}\t{}", prediction.label, prediction.confidence_percent());
    Ok(())
}

fn run_shell(predictor: Predictor<LibTorch>, store: UploadStore, sample: PathBuf) -> anyhow::Result<()> {
    let native_options = eframe::NativeOptions::default();

    eframe::run_native(
        "ICH Detection",
        native_options,
        Box::new(|_cc| Ok(Box::new(IchApp::new(predictor, store, sample)))),
    )
    .map_err(|err| anyhow!("Interactive shell failed: {err}"))
}
