//! Configuration initialization and hierarchy management

use crate::adapters::TomlConfigAdapter;
use crate::adapters::toml_config::AppConfig;
use crate::cli::Cli;
use crate::error::ClipMarkResult;

/// Resolve the configuration following precedence: CLI > Env > File > Defaults
pub fn initialize_configuration(cli: &Cli) -> ClipMarkResult<TomlConfigAdapter> {
    initialize_with_env(cli, |key| std::env::var(key).ok())
}

/// [`initialize_configuration`] with an explicit environment lookup
pub fn initialize_with_env(
    cli: &Cli,
    env: impl Fn(&str) -> Option<String>,
) -> ClipMarkResult<TomlConfigAdapter> {
    let mut adapter = TomlConfigAdapter::new();

    let explicit = cli.config.clone().or_else(|| env(crate::adapters::toml_config::CONFIG_ENV).map(Into::into));
    if let Some(path) = TomlConfigAdapter::locate(explicit.as_deref()) {
        adapter.load_file(&path)?;
    }

    adapter.apply_env_from(&env)?;
    apply_cli_overrides(adapter.config_mut(), cli);
    adapter.config().validate()?;
    Ok(adapter)
}

fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(ffmpeg) = &cli.ffmpeg {
        config.encoder.ffmpeg_path = ffmpeg.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
}
