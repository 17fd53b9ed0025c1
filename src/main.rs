// roster-extract: dump a profile's followers or following list as JSON.
//
// Uses the persistent browser profile so a session logged in once (run with
// --headed and sign in by hand) is reused on later runs.

use std::io::Write;
use std::ops::ControlFlow;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use roster_extract::{ListKind, ListScraper, Progress, launch_browser, load_yaml_config, normalize};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ListArg {
    Followers,
    Following,
}

impl From<ListArg> for ListKind {
    fn from(arg: ListArg) -> Self {
        match arg {
            ListArg::Followers => ListKind::Followers,
            ListArg::Following => ListKind::Following,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "roster-extract", version, about = "Extract a complete follower or following list")]
struct Cli {
    /// Profile whose list is extracted
    #[arg(long)]
    user: String,

    /// Which list to extract
    #[arg(long, value_enum, default_value = "followers")]
    list: ListArg,

    /// YAML config file (defaults to <config dir>/roster-extract/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long, conflicts_with = "headed")]
    headless: bool,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Browser profile directory to reuse
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    /// Write the JSON result here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_yaml_config(cli.config.as_deref())?;
    if cli.headless {
        config.browser.headless = true;
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if cli.profile_dir.is_some() {
        config.browser.profile_dir = cli.profile_dir.clone();
    }
    config.validate()?;

    let user = normalize(&cli.user)
        .with_context(|| format!("'{}' is not a valid profile name", cli.user))?;
    let kind = ListKind::from(cli.list);

    let browser = launch_browser(&config.browser).await?;
    info!("Browser profile: {}", browser.profile_dir().display());
    let page = browser.current_page().await?;
    let scraper = ListScraper::new(page, &config, user);

    let sink = |progress: &Progress| {
        if progress.current % 100 == 0 && progress.current > 0 {
            info!(
                "{} {}: {}/{}",
                progress.phase, kind, progress.current, progress.expected
            );
        }
        ControlFlow::Continue(())
    };
    let outcome = scraper.scrape(kind, &sink).await;
    browser.shutdown().await;
    let result = outcome?;

    info!(
        "{} {} collected ({:.1}% of {}), {}",
        result.len(),
        kind,
        result.completeness * 100.0,
        result.expected_total,
        result.termination_reason
    );

    let json = serde_json::to_string_pretty(&result)?;
    match &cli.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}
