use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use clap::Parser;
use milter_alias_common::{config::Socket, logging::LogLevel};

pub const CONFIG_ENV: &str = "MILTER_ALIAS_CONFIG";

const DEFAULT_CONFIG_PATHS: [&str; 2] = [
    "./milter-alias.config.ron",
    "/etc/milter-alias/milter-alias.config.ron",
];

/// Adds every member of a mailing list as a recipient when the list itself
/// sends mail.
#[derive(Debug, Parser)]
#[command(name = "milter-alias", version, about)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level, a syslog severity name or number
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Where to write the process id
    #[arg(short, long, value_name = "FILE")]
    pub pid_file: Option<PathBuf>,

    /// Milter socket, e.g. unix:/run/milter-alias/milter-alias.sock or inet:8890@127.0.0.1
    #[arg(short, long, value_name = "SOCKET")]
    pub socket: Option<Socket>,
}

/// Find the configuration file using the following precedence:
/// 1. `--config`
/// 2. `MILTER_ALIAS_CONFIG` environment variable
/// 3. ./milter-alias.config.ron (current working directory)
/// 4. /etc/milter-alias/milter-alias.config.ron (system-wide config)
///
/// # Errors
///
/// If an explicitly named file does not exist, or none of the defaults do.
pub fn find_config_file(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    let defaults = DEFAULT_CONFIG_PATHS.map(PathBuf::from);
    locate(explicit, std::env::var_os(CONFIG_ENV), &defaults)
}

fn locate(
    explicit: Option<&Path>,
    from_env: Option<OsString>,
    defaults: &[PathBuf],
) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("Configuration file {} does not exist", path.display());
    }

    if let Some(env_path) = from_env {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    if let Some(path) = defaults.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = defaults
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - --config\n  - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "()").unwrap();
        path
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_explicit_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = touch(dir.path(), "explicit.ron");
        let env = touch(dir.path(), "env.ron");
        let default = touch(dir.path(), "default.ron");

        let found = locate(Some(explicit.as_path()), Some(env.into()), &[default]).unwrap();
        assert_eq!(found, explicit);
    }

    #[test]
    fn test_env_before_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let env = touch(dir.path(), "env.ron");
        let default = touch(dir.path(), "default.ron");

        let found = locate(None, Some(env.clone().into()), &[default]).unwrap();
        assert_eq!(found, env);
    }

    #[test]
    fn test_first_existing_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ron");
        let present = touch(dir.path(), "present.ron");

        let found = locate(None, None, &[missing, present.clone()]).unwrap();
        assert_eq!(found, present);
    }

    #[test]
    fn test_missing_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ron");

        assert!(locate(Some(missing.as_path()), None, &[]).is_err());
        assert!(locate(None, Some(missing.clone().into()), &[]).is_err());

        let err = locate(None, None, &[missing]).unwrap_err();
        assert!(err.to_string().contains("missing.ron"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["milter-alias", "-l", "loud"]).is_err());
        assert!(Cli::try_parse_from(["milter-alias", "-s", "tcp:25"]).is_err());
    }
}
