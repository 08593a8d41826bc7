use std::path::Path;

use argh::FromArgs;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use chord_progress_share::{AdminAction, Catalog, Config, Result, logging};

/// Moderate submitted chord progressions
#[derive(FromArgs)]
struct Args {
    /// admin password
    #[argh(option)]
    password: String,

    /// path to a YAML config file
    #[argh(option)]
    config: Option<String>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Pending(PendingArgs),
    Diff(DiffArgs),
    Review(ReviewArgs),
    Blocked(BlockedArgs),
    Block(BlockArgs),
    Unblock(UnblockArgs),
    Feedbacks(FeedbacksArgs),
}

/// List submissions awaiting review, oldest first
#[derive(FromArgs)]
#[argh(subcommand, name = "pending")]
struct PendingArgs {}

/// Show a pending edit next to the progression it replaces
#[derive(FromArgs)]
#[argh(subcommand, name = "diff")]
struct DiffArgs {
    /// pending progression id
    #[argh(positional)]
    id: Uuid,
}

/// Approve or reject a pending submission
#[derive(FromArgs)]
#[argh(subcommand, name = "review")]
struct ReviewArgs {
    /// pending progression id
    #[argh(positional)]
    id: Uuid,

    /// approve or reject
    #[argh(positional)]
    action: AdminAction,
}

/// List blocked IP addresses
#[derive(FromArgs)]
#[argh(subcommand, name = "blocked")]
struct BlockedArgs {}

/// Block submissions from an IP address
#[derive(FromArgs)]
#[argh(subcommand, name = "block")]
struct BlockArgs {
    /// IP address
    #[argh(positional)]
    ip: String,

    /// why the address is blocked
    #[argh(option)]
    reason: Option<String>,
}

/// Remove a block-list entry
#[derive(FromArgs)]
#[argh(subcommand, name = "unblock")]
struct UnblockArgs {
    /// block-list entry id
    #[argh(positional)]
    id: Uuid,
}

/// List feedback messages, newest first
#[derive(FromArgs)]
#[argh(subcommand, name = "feedbacks")]
struct FeedbacksArgs {}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = Config::load(args.config.as_deref().map(Path::new))?;
    config.verify_admin(&args.password)?;

    let path = &config.catalog_path;
    let mut catalog = Catalog::load(path)?;

    match args.command {
        Command::Pending(_) => print_json(&catalog.pending()),
        Command::Diff(a) => print_json(&catalog.diff(a.id)?),
        Command::Review(a) => {
            catalog.process(a.id, a.action)?;
            catalog.save(path)?;
            let message = match a.action {
                AdminAction::Approve => "approved",
                AdminAction::Reject => "rejected",
            };
            print_json(&json!({ "id": a.id, "result": message }))
        }
        Command::Blocked(_) => print_json(&catalog.blocked_ips()),
        Command::Block(a) => {
            let blocked = catalog.block_ip(&a.ip, a.reason.as_deref())?;
            catalog.save(path)?;
            print_json(&blocked)
        }
        Command::Unblock(a) => {
            let removed = catalog.unblock_ip(a.id)?;
            catalog.save(path)?;
            print_json(&removed)
        }
        Command::Feedbacks(_) => print_json(&catalog.feedbacks()),
    }
}

fn main() {
    logging::init_logging();
    let args: Args = argh::from_env();

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
