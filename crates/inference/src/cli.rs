use clap::Parser;
use std::path::PathBuf;

/// Reads a base64 image (raw or `{"image": ...}`) on stdin and prints one
/// JSON line with face-mask detections on stdout.
#[derive(Parser, Debug)]
#[command(name = "mask-detector", version, about)]
pub struct Args {
    /// Model artifact to load instead of MODEL_PATH / best.onnx next to the binary
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Load the model and report whether it is usable, without reading stdin
    #[arg(long)]
    pub health: bool,
}
