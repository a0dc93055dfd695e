use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use crate::{github::DEFAULT_API_BASE, types::QuerySpec};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

pub const MAX_CONCURRENT_ENV_VAR: &str = "PRMAN_MAX_CONCURRENT";
pub const TIMEOUT_ENV_VAR: &str = "PRMAN_TIMEOUT_SECS";
pub const API_URL_ENV_VAR: &str = "GITHUB_API_URL";

const DEFAULT_MAX_CONCURRENT: usize = 20;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// When to emit ANSI colours.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Colour only when stdout is a terminal and NO_COLOR is unset
    #[default]
    Auto,
    Always,
    Never,
}

/// How the report is presented and how findings affect the exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub color: ColorMode,
    pub fail_on_findings: bool,
    pub debug: bool,
}

#[derive(Parser, Debug)]
#[command(
    name = "prman",
    about = "Summarise the merge, approval and CI state of every GitHub PR matching a search"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// GitHub search filter; 'is:pr' is prepended
    #[arg(value_name = "SEARCH")]
    search: String,

    /// Maximum PRs fetched at once [env: PRMAN_MAX_CONCURRENT] [default: 20]
    #[arg(long, value_name = "NUM")]
    max_concurrent: Option<usize>,

    /// Per-PR fetch timeout in seconds [env: PRMAN_TIMEOUT_SECS] [default: 60]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// GitHub REST API base URL [env: GITHUB_API_URL] [default: https://api.github.com]
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Colourise output
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,

    /// Exit with status 3 when any PR needs attention
    #[arg(long)]
    fail_on_findings: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Resolves a setting from the flag, then the environment, then the default.
fn resolve<T, E>(flag: Option<T>, env: E, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    E: Fn() -> Option<(&'static str, String)>,
{
    if let Some(value) = flag {
        return Ok(value);
    }
    match env() {
        Some((name, raw)) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {name}: '{raw}'")),
        None => Ok(default),
    }
}

fn env_lookup(name: &'static str) -> impl Fn() -> Option<(&'static str, String)> {
    move || std::env::var(name).ok().map(|value| (name, value))
}

/// Prefixes the user's filter so only pull requests match.
pub fn format_search_query(search: &str) -> String {
    format!("is:pr {}", search.trim())
}

fn build_query_from_cli(cli: CliArgs) -> Result<(QuerySpec, ReportOptions)> {
    if cli.search.trim().is_empty() {
        anyhow::bail!("Search filter must not be empty");
    }

    let max_concurrent = resolve(
        cli.max_concurrent,
        env_lookup(MAX_CONCURRENT_ENV_VAR),
        DEFAULT_MAX_CONCURRENT,
    )?;
    if max_concurrent == 0 {
        anyhow::bail!("Maximum concurrency must be at least 1");
    }

    let timeout_secs = resolve(cli.timeout, env_lookup(TIMEOUT_ENV_VAR), DEFAULT_TIMEOUT_SECS)?;
    if timeout_secs == 0 {
        anyhow::bail!("Timeout must be at least 1 second");
    }

    let api_base = resolve(
        cli.api_url,
        env_lookup(API_URL_ENV_VAR),
        DEFAULT_API_BASE.to_string(),
    )?;
    url::Url::parse(&api_base)
        .with_context(|| format!("Invalid API base URL: '{api_base}'"))?;

    let spec = QuerySpec {
        query: format_search_query(&cli.search),
        api_base: api_base.trim_end_matches('/').to_string(),
        max_concurrent,
        task_timeout: Duration::from_secs(timeout_secs),
    };
    let options = ReportOptions {
        color: cli.color,
        fail_on_findings: cli.fail_on_findings,
        debug: cli.debug,
    };

    Ok((spec, options))
}

/// Parses command-line arguments into a query specification and report
/// options.
///
/// Flags win over environment variables, which win over built-in defaults.
pub fn parse_args<I, T>(args: I) -> Result<(QuerySpec, ReportOptions)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_query_from_cli(cli)
}
