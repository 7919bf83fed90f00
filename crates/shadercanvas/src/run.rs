use anyhow::Result;
use renderer::Renderer;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.to_config();
    if let Some(path) = &config.shader_path {
        tracing::debug!(path = %path.display(), "using fragment shader file");
    } else {
        tracing::debug!("no shader file given; using the built-in gradient");
    }
    Renderer::new(config).run()
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
