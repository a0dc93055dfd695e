use std::{
    io::{IsTerminal, Write},
    process::ExitCode,
    sync::Arc,
};

use prman::{
    ColorMode, GitHub, display_report, fetch_pull_requests, github::get_github_token, is_finding,
    parse_args,
};
use tracing::info;

const EXIT_FINDINGS: u8 = 3;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default = if debug { "prman=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let (spec, options) = match parse_args(std::env::args_os()) {
        Ok(result) => result,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };
    init_tracing(options.debug);

    let forge = Arc::new(GitHub::connect(get_github_token()?, &spec.api_base)?);
    let result = fetch_pull_requests(&spec, forge).await?;
    info!(pulls = result.pulls.len(), api_calls = result.api_calls, "fetch complete");

    let mut stdout = std::io::stdout().lock();
    display_report(&result, use_color(options.color), &mut stdout)?;
    stdout.flush()?;

    if options.fail_on_findings && result.pulls.iter().any(is_finding) {
        return Ok(ExitCode::from(EXIT_FINDINGS));
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
