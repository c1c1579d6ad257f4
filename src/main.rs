use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use novel_index::cli::{Cli, Command};
use novel_index::config::Config;
use novel_index::pipeline::Pipeline;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    novel_index::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Normalize(args) => {
            for candidate in novel_index::normalize::normalize(&args.title) {
                println!("{candidate}");
            }
        }
        Command::Run(args) => {
            let pipeline = load_pipeline(cli.config.as_deref())?;
            let summary = pipeline.run(&args.origin).await.context("run")?;
            let json = serde_json::to_string_pretty(&summary).context("encode summary")?;
            println!("{json}");
            if !summary.success {
                anyhow::bail!(
                    "run {} finished with {} failed chapter(s)",
                    summary.run_id,
                    summary.failed
                );
            }
        }
        Command::Preview => {
            let pipeline = load_pipeline(cli.config.as_deref())?;
            for row in pipeline.preview().await.context("preview")? {
                let line = serde_json::to_string(&row).context("encode preview row")?;
                println!("{line}");
            }
        }
    }

    Ok(())
}

fn load_pipeline(path: Option<&std::path::Path>) -> anyhow::Result<Pipeline> {
    let config = Config::load(path).context("load config")?;
    Pipeline::from_config(config)
}
