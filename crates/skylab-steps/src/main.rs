//! skylab-runner - executes a build plan against the provider API.

use std::path::PathBuf;

use clap::Parser;

use skylab_api::{ApiClient, Credentials};
use skylab_steps::{Plan, StepContext, StepRunner};

/// Run a skylab build plan: a JSON list of environment, container, and
/// network steps executed in order, stopping at the first failure.
#[derive(Parser, Debug)]
#[command(name = "skylab-runner")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Provider API base URL.
    #[arg(long, env = "SKYLAB_BASE_URL", default_value = "https://cloud.skytap.com")]
    base_url: String,

    /// Provider user id for Basic auth.
    #[arg(long, env = "SKYLAB_USER_ID")]
    user_id: String,

    /// Provider auth key for Basic auth.
    #[arg(long, env = "SKYLAB_AUTH_KEY", hide_env_values = true)]
    auth_key: String,

    /// Directory bare descriptor filenames are resolved against.
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Path to the plan file.
    plan: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let credentials = Credentials::new(&args.user_id, &args.auth_key);
    let base_url = args.base_url.trim_end_matches('/').to_string();
    let client = ApiClient::new(base_url, &credentials);
    let ctx = StepContext::new(client, args.workspace);

    let plan = Plan::from_file(&args.plan)?;
    let runner = StepRunner::new(ctx);
    if !runner.run(&plan).await {
        // The host pipeline treats a non-zero exit as a failed build step.
        std::process::exit(1);
    }
    Ok(())
}
