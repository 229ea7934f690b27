#[cfg(not(unix))]
compile_error!("Only unix is currently supported");

use clap::Parser;
use milter_alias::{MilterAlias, Settings, cli};
use milter_alias_common::{internal, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let config_path = cli::find_config_file(args.config.as_deref())?;
    let settings = Settings::load(&config_path)?.with_overrides(&args);
    settings.validate()?;

    logging::init(logging::effective_level(settings.log.level));

    internal!(
        level = INFO,
        "Loaded {}: {settings:?}",
        config_path.display()
    );

    MilterAlias::new(settings).run().await
}
