use clap::Parser;
use inference::{
    InferenceConfig, InferenceService, ModelHandle, cli::Args, logging::setup_logging,
    serialization::write_json_line,
};
use std::io;

#[cfg(feature = "ort-backend")]
use inference::backend::ort::OrtBackend as Backend;

#[cfg(not(feature = "ort-backend"))]
compile_error!("The 'ort-backend' feature must be enabled to build the mask-detector binary");

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = InferenceConfig::from_env();
    if let Some(model) = args.model {
        config = config.with_model_path(model);
    }

    setup_logging(&config);

    tracing::debug!(
        config = ?config,
        "Loaded configuration"
    );

    let model = ModelHandle::<Backend>::new(config.model_path.clone(), config.backend_options());
    let mut service = InferenceService::new(model, &config);

    if args.health {
        let report = service.health();
        write_json_line(io::stdout().lock(), &report)?;
        return Ok(());
    }

    service.run(io::stdin().lock(), io::stdout().lock())?;
    Ok(())
}
