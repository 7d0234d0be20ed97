// src/main.rs

use clap::Parser;
use color_eyre::eyre::{bail, Result, WrapErr};
use dfinger::app::App;
use dfinger::cli::Cli;
use dfinger::core::targets::{normalize, parse_ports, read_target_file};
use dfinger::ui::{print_summary, Presenter};
use dfinger::logging;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::initialize_logging(cli.verbose)?;

    let config = cli.to_config();
    let ports = parse_ports(cli.port_spec()).wrap_err("invalid port specification")?;

    let raw_targets = match (&cli.addr, &cli.file) {
        (Some(addr), _) => vec![addr.clone()],
        (None, Some(file)) => read_target_file(file)
            .wrap_err_with(|| format!("cannot read target file {}", file.display()))?,
        (None, None) => bail!("either --addr or --file is required"),
    };

    let (endpoints, rejected) = normalize(raw_targets.iter().map(String::as_str), &ports);
    if !rejected.is_empty() {
        warn!(rejected = rejected.len(), "Some targets were skipped.");
    }
    if endpoints.is_empty() {
        bail!("no valid targets");
    }
    info!(endpoints = endpoints.len(), ports = ports.len(), "Targets normalized.");

    let app = App::from_config(config).wrap_err("startup failed")?;
    let presenter = Presenter::new(app.config().output_file.as_deref(), app.config().json_output)
        .wrap_err("cannot open result file")?;

    let summary = app.run(endpoints, Arc::new(presenter)).await;
    print_summary(&summary);
    Ok(())
}
