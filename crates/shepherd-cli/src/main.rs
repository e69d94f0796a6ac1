//! deployment-shepherd: pick the deployment slot for a CI build
//!
//! Probes every slot, applies the slot policy and prints the chosen slot id
//! on stdout so the pipeline can deploy there. Logs and errors go to stderr.
//!
//! ## Exit codes
//!
//! - `0`: slot chosen (or `--help` / `--version`)
//! - `-2`: invalid arguments, reported before any network call
//! - `-1`: the run itself failed

use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use shepherd_core::{
    find_deployment_slot, ProbeConfig, ShepherdConfig, ShepherdError, SlotId, SlotLayout,
    UrlTemplate, DEFAULT_SLOT_COUNT, DEFAULT_SLOT_PREFIX,
};
use shepherd_github::{
    DryRunOracle, GitHubClient, GitHubConfig, PullRequestOracle, DEFAULT_API_URL,
};
use tracing::{debug, Level};

const EXIT_USAGE: i32 = -2;
const EXIT_FAILURE: i32 = -1;

#[derive(Parser, Debug)]
#[command(name = "deployment-shepherd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pick the deployment slot for a branch build", long_about = None)]
struct Cli {
    /// Slot host template; {0} is replaced by the slot id
    /// (e.g. mywebsite-{0}.azurewebsites.net)
    #[arg(short = 'u', long, env = "SHEPHERD_BASE_URL", value_parser = NonEmptyStringValueParser::new())]
    base_url: String,

    /// Branch being deployed (e.g. pull/42/merge)
    #[arg(short = 'b', long, env = "SHEPHERD_BRANCH", value_parser = NonEmptyStringValueParser::new())]
    branch_name: String,

    /// Dry run with debug logging: comments are logged, not posted
    #[arg(short, long)]
    debug: bool,

    /// Repository owner on GitHub
    #[arg(short, long, env = "SHEPHERD_OWNER", value_parser = NonEmptyStringValueParser::new())]
    owner: String,

    /// Repository name on GitHub
    #[arg(short, long, env = "SHEPHERD_REPOSITORY", value_parser = NonEmptyStringValueParser::new())]
    repository: String,

    /// GitHub access token
    #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true, value_parser = NonEmptyStringValueParser::new())]
    token: String,

    /// Number of deployment slots
    #[arg(long, env = "SHEPHERD_SLOTS", default_value_t = DEFAULT_SLOT_COUNT as u16, value_parser = clap::value_parser!(u16).range(1..))]
    slots: u16,

    /// Slot name prefix; slots are <prefix>1 through <prefix>N
    #[arg(long, env = "SHEPHERD_SLOT_PREFIX", default_value = DEFAULT_SLOT_PREFIX)]
    slot_prefix: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    github_api_url: String,

    /// Per-request timeout in seconds, for slot probes and GitHub calls
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            process::exit(if err.use_stderr() { EXIT_USAGE } else { 0 });
        }
    };

    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    shepherd_core::init_tracing(cli.json, level);

    let (config, oracle) = match prepare(&cli) {
        Ok(prepared) => prepared,
        Err(e) => {
            let err = clap::Error::raw(ErrorKind::ValueValidation, format!("{:#}\n", e))
                .format(&mut Cli::command());
            let _ = err.print();
            process::exit(EXIT_USAGE);
        }
    };

    match run(&config, oracle.as_ref(), &cli.branch_name).await {
        Ok(slot) => println!("{}", slot),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(exit_code(&e));
        }
    }
}

/// Configuration problems found during the run still count as usage errors.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ShepherdError>() {
        Some(e) if e.is_config() => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

/// Turn arguments into run configuration and an oracle. No network access.
fn prepare(cli: &Cli) -> Result<(ShepherdConfig, Box<dyn PullRequestOracle>)> {
    let timeout = Duration::from_secs(cli.timeout_secs);

    let template = UrlTemplate::parse(&cli.base_url).context("Invalid --base-url")?;
    let layout = SlotLayout::numbered(template, &cli.slot_prefix, usize::from(cli.slots))
        .context("Invalid slot layout")?;
    let probe = ProbeConfig {
        request_timeout: timeout,
        ..ProbeConfig::default()
    };
    let config = ShepherdConfig::new(layout).with_probe(probe);

    let github = GitHubConfig::new(&cli.owner, &cli.repository, &cli.token)
        .with_api_url(&cli.github_api_url)
        .with_timeout(timeout);
    let client = GitHubClient::new(github).context("Invalid GitHub settings")?;

    let oracle: Box<dyn PullRequestOracle> = if cli.debug {
        debug!(repo = %client.repo(), "Dry run: pull request comments will only be logged");
        Box::new(DryRunOracle::new(client))
    } else {
        Box::new(client)
    };

    Ok((config, oracle))
}

async fn run(
    config: &ShepherdConfig,
    oracle: &dyn PullRequestOracle,
    branch_name: &str,
) -> Result<SlotId> {
    let decision = find_deployment_slot(config, oracle, branch_name)
        .await
        .with_context(|| format!("Failed to find a deployment slot for '{}'", branch_name))?;

    debug!(
        slot = %decision.slot_id,
        tier = %decision.tier,
        comments = decision.comments.len(),
        "Deployment slot chosen"
    );
    Ok(decision.slot_id)
}
