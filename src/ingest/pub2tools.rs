//! Invocation of the external Pub2Tools CLI.
//!
//! Pub2Tools is the upstream discovery engine; when no local input file is
//! supplied, the run command shells out to it for the requested date window
//! and loads the `to_biotools.json` it produces.

use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::config::Pub2ToolsConfig;
use crate::entities::candidate::Candidate;
use crate::error::AnnotateError;

pub const PUB2TOOLS_CLI_ENV: &str = "PUB2TOOLS_CLI";

/// Resolve the Pub2Tools command line: explicit config first, then the
/// `PUB2TOOLS_CLI` env var.
pub fn resolve_cli(config: &Pub2ToolsConfig) -> Option<String> {
    config
        .p2t_cli
        .clone()
        .filter(|cli| !cli.trim().is_empty())
        .or_else(|| std::env::var(PUB2TOOLS_CLI_ENV).ok())
        .filter(|cli| !cli.trim().is_empty())
}

/// Run Pub2Tools `-all` for the date window and load its candidate export.
pub async fn fetch_via_cli(
    config: &Pub2ToolsConfig,
    from: OffsetDateTime,
    to: OffsetDateTime,
    out_dir: &Path,
) -> Result<Vec<Candidate>, AnnotateError> {
    let Some(cli) = resolve_cli(config) else {
        return Err(AnnotateError::InvalidArgument(
            "Pub2Tools CLI not found. Install pub2tools or set PUB2TOOLS_CLI.".to_string(),
        ));
    };
    let Some(parts) = shlex::split(&cli) else {
        return Err(AnnotateError::InvalidArgument(format!(
            "Unparseable Pub2Tools command line: {cli}"
        )));
    };
    let Some((program, leading_args)) = parts.split_first() else {
        return Err(AnnotateError::InvalidArgument(
            "Empty Pub2Tools command line".to_string(),
        ));
    };

    std::fs::create_dir_all(out_dir)?;

    let mut args: Vec<String> = leading_args.to_vec();
    args.push("-all".to_string());
    args.push(out_dir.display().to_string());
    args.extend([
        "--from".to_string(),
        from.date().to_string(),
        "--to".to_string(),
        to.date().to_string(),
        "--edam".to_string(),
        config.edam_owl.clone(),
        "--idf".to_string(),
        config.idf.clone(),
        "--idf-stemmed".to_string(),
        config.idf_stemmed.clone(),
    ]);
    if let Some(restriction) = config
        .custom_restriction
        .as_deref()
        .filter(|r| !r.trim().is_empty())
    {
        args.extend(["--custom-restriction".to_string(), restriction.to_string()]);
    }
    if config.disable_tool_restriction {
        args.push("--disable-tool-restriction".to_string());
    }
    args.extend([
        "--timeout".to_string(),
        config.timeout.to_string(),
        "--retryLimit".to_string(),
        config.retry_limit.to_string(),
        "--fetcher-threads".to_string(),
        config.fetcher_threads.to_string(),
    ]);

    info!(program = %program, ?args, "FETCH running Pub2Tools");
    let output = tokio::process::Command::new(program)
        .args(&args)
        .output()
        .await
        .map_err(|err| {
            AnnotateError::InvalidArgument(format!("Failed to launch Pub2Tools: {err}"))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AnnotateError::InvalidArgument(format!(
            "Pub2Tools exited with {}: {}",
            output.status,
            crate::utils::text::truncate_error(&stderr, 300)
        )));
    }

    let export = export_path(out_dir);
    if !export.exists() {
        warn!(path = %export.display(), "Pub2Tools ran but produced no to_biotools.json");
        return Ok(Vec::new());
    }
    Ok(super::load_candidates(&export))
}

pub fn export_path(out_dir: &Path) -> PathBuf {
    out_dir.join("to_biotools.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_cli_prefers_config_value() {
        let mut config = Pub2ToolsConfig::default();
        assert!(resolve_cli(&config).is_none() || std::env::var(PUB2TOOLS_CLI_ENV).is_ok());
        config.p2t_cli = Some("java -jar pub2tools.jar".to_string());
        assert_eq!(
            resolve_cli(&config).as_deref(),
            Some("java -jar pub2tools.jar")
        );
    }

    #[tokio::test]
    async fn fetch_without_cli_is_a_typed_error() {
        let config = Pub2ToolsConfig::default();
        if std::env::var(PUB2TOOLS_CLI_ENV).is_ok() {
            return;
        }
        let now = OffsetDateTime::now_utc();
        let err = fetch_via_cli(&config, now, now, Path::new("/tmp/p2t-none"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Pub2Tools CLI not found"));
    }
}
