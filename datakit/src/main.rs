use std::process::ExitCode;

use anyhow::Result;
use log::info;

use datakit::{commands, Config};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let config_path = Config::default_path();
    let (config, source) = Config::load_with_source(&config_path);
    common::setup_logging(&config.log_level)?;
    source.log(&config_path);
    info!(
        "datakit started, config {}, max concurrency {}",
        config_path.display(),
        config.scheduler.max_concurrency
    );

    let prompt = commands::prompt(&config);
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let outcome = prompt.run(input, &mut output).await?;

    Ok(ExitCode::from(outcome.exit_code()))
}
