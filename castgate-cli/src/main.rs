use anyhow::{anyhow, Context, Result};
use castgate_core::neynar::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use castgate_core::{
    CastHash, CastReference, CheckMode, Fid, NeynarClient, SocialGraph, VerificationOutcome,
    VerificationPolicy,
};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

/// castgate: check Farcaster like / recast / follow conditions from the terminal
#[derive(Parser, Debug)]
#[command(name = "castgate")]
#[command(about = "Check like, recast and follow conditions against Neynar", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log HTTP and policy activity to stderr
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full verification for a user
    Verify(VerifyArgs),
    /// List who liked and recasted the cast
    Reactions(ConnectionArgs),
    /// Check whether a user follows the target
    Following(FollowingArgs),
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// Neynar API key (if not provided, will use NEYNAR_API_KEY environment variable)
    #[arg(long, env = "NEYNAR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Cast that must be liked and recasted
    #[arg(long, env = "CAST_HASH")]
    cast_hash: CastHash,

    /// Account that must be followed
    #[arg(long, env = "TARGET_FID")]
    target_fid: Fid,

    #[arg(long, env = "NEYNAR_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Fid of the user to verify
    fid: Fid,

    /// Issue the reaction and follow lookups at the same time
    #[arg(long)]
    concurrent: bool,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Args, Debug)]
struct FollowingArgs {
    /// Fid of the would-be follower
    fid: Fid,

    #[command(flatten)]
    connection: ConnectionArgs,
}

impl ConnectionArgs {
    fn client(&self) -> Result<NeynarClient> {
        let api_key = self
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow!("Neynar API key required: pass --api-key or set NEYNAR_API_KEY")
            })?;

        NeynarClient::new(
            api_key,
            &self.base_url,
            Duration::from_secs(self.timeout_secs),
        )
    }

    fn cast(&self) -> CastReference {
        CastReference::new(self.cast_hash.clone(), self.target_fid)
    }
}

fn describe(outcome: VerificationOutcome) -> &'static str {
    match outcome {
        VerificationOutcome::Accepted => "all conditions met",
        VerificationOutcome::AuthMissing => "no fid given",
        VerificationOutcome::ReactionMissing => "has not both liked and recasted the cast",
        VerificationOutcome::NotFollowing => "does not follow the target",
        VerificationOutcome::TransientError => "Neynar lookup failed; see logs",
    }
}

fn sorted(fids: impl IntoIterator<Item = Fid>) -> Vec<String> {
    let mut fids: Vec<Fid> = fids.into_iter().collect();
    fids.sort();
    fids.iter().map(Fid::to_string).collect()
}

async fn run_verify(args: VerifyArgs) -> Result<bool> {
    let client = args.connection.client()?;
    let mode = if args.concurrent {
        CheckMode::Concurrent
    } else {
        CheckMode::Sequential
    };
    let policy = VerificationPolicy::new(Arc::new(client), args.connection.cast(), mode);

    let outcome = policy.evaluate(Some(args.fid)).await;
    println!("fid {}: {} ({})", args.fid, outcome, describe(outcome));
    Ok(outcome.is_accepted())
}

async fn run_reactions(args: ConnectionArgs) -> Result<bool> {
    let client = args.client()?;
    let reactions = client
        .reactions(&args.cast_hash)
        .await
        .context("Failed to fetch reactions")?;

    println!("Cast {}", args.cast_hash);
    println!(
        "  likes ({}): {}",
        reactions.likers.len(),
        sorted(reactions.likers.iter().copied()).join(", ")
    );
    println!(
        "  recasts ({}): {}",
        reactions.recasters.len(),
        sorted(reactions.recasters.iter().copied()).join(", ")
    );
    let both = reactions.likers.intersection(&reactions.recasters).copied();
    println!("  liked and recasted: {}", sorted(both).join(", "));
    Ok(true)
}

async fn run_following(args: FollowingArgs) -> Result<bool> {
    let client = args.connection.client()?;
    let target = args.connection.target_fid;
    let follows = client
        .is_following(args.fid, target)
        .await
        .context("Failed to fetch following list")?;

    println!(
        "fid {} {} fid {}",
        args.fid,
        if follows { "follows" } else { "does not follow" },
        target
    );
    Ok(follows)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let passed = match cli.command {
        Commands::Verify(args) => run_verify(args).await?,
        Commands::Reactions(args) => run_reactions(args).await?,
        Commands::Following(args) => run_following(args).await?,
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
