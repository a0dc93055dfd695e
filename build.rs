//! Embeds a human-readable version string for `prman --version`.
//!
//! The string is `{CARGO_PKG_VERSION} ({git version}) {rustc --version}`.
//! The git version is `git describe --tags --always --dirty` when the
//! checkout carries a tag, otherwise `v{version}-{timestamp}-{commit}`
//! with a `+dirty` suffix for uncommitted changes. Clean checkouts use
//! the commit time so rebuilding the same commit gives the same string.

use std::{env, process::Command};

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock"] {
        println!("cargo:rerun-if-changed={path}");
    }

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", build_info());
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn git(args: &[&str]) -> Option<String> {
    run("git", args)
}

/// None outside a git checkout. `.cargo-ok` is written by
/// `cargo install --git` and does not count.
fn is_dirty() -> Option<bool> {
    git(&["status", "--porcelain"]).map(|status| {
        status
            .lines()
            .filter_map(|line| line.get(3..))
            .any(|path| path != ".cargo-ok")
    })
    .or_else(|| git(&["rev-parse", "--git-dir"]).map(|_| false))
}

fn commit_timestamp() -> Option<String> {
    let seconds = git(&["log", "-1", "--format=%ct"])?.parse::<i64>().ok()?;
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

fn pseudo_version() -> String {
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let commit = git(&["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let dirty = is_dirty();

    let timestamp = match dirty {
        Some(false) => commit_timestamp(),
        _ => None,
    }
    .unwrap_or_else(|| Utc::now().format(TIMESTAMP_FORMAT).to_string());
    let suffix = if dirty == Some(true) { "+dirty" } else { "" };

    format!("v{version}-{timestamp}-{commit}{suffix}")
}

fn git_version() -> String {
    match git(&["describe", "--tags", "--always", "--dirty"]) {
        // A bare hash means no tag is reachable.
        Some(desc) if desc.contains('v') || desc.contains("-g") => desc,
        _ => pseudo_version(),
    }
}

fn build_info() -> String {
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let mut parts = vec![version, format!("({})", git_version())];
    parts.extend(run("rustc", &["--version"]));
    parts.join(" ")
}
