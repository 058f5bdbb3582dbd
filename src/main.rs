use anyhow::Result;
use attention_transformer::{cli::Cli, infra::logging};
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Flushes run.log when dropped at the end of main.
    let _log_guard = logging::init(cli.log_dir().as_deref())?;

    cli.run()
}
