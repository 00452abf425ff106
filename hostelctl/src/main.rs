use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::{account, requests, Backend, Context};

#[derive(Parser)]
#[command(name = "hostelctl", version, about = "Hostel outing and home-visit passes")]
struct Cli {
    /// Where requests and user tables live
    #[arg(long, global = true, env = "HOSTEL_BACKEND", value_enum, default_value = "file")]
    backend: Backend,

    /// JSON file used by the file backend
    #[arg(long, global = true, env = "HOSTEL_STORE", default_value = ".hostel/store.json")]
    store: String,

    /// Where the logged-in session is kept
    #[arg(long, global = true, env = "HOSTEL_SESSION", default_value = ".hostel/session.json")]
    session: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load students, wardens and HODs from a YAML file into the store
    Seed(account::SeedArgs),
    /// Log in as a student, warden or HOD
    Login(account::LoginArgs),
    /// Forget the saved session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Submit a pass request (students)
    Submit(requests::SubmitArgs),
    /// List the requests visible to the logged-in user
    List(requests::ListArgs),
    /// Approve one request
    Approve {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Decline one request
    Decline {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Approve every request waiting on you
    ApproveAll,
    /// Decline every request waiting on you
    DeclineAll {
        #[arg(long)]
        reason: Option<String>,
    },
    /// Withdraw one of your pending requests
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Hard-delete requests past the retention window
    Sweep,
    /// Stream request changes as JSON lines
    Watch(requests::WatchArgs),
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let ctx = Context::new(cli.backend, cli.store.into(), cli.session.into());

    match cli.cmd {
        Commands::Seed(args) => account::seed(&ctx, args).await,
        Commands::Login(args) => account::login(&ctx, args).await,
        Commands::Logout => account::logout(&ctx),
        Commands::Whoami => account::whoami(&ctx),
        Commands::Submit(args) => requests::submit(&ctx, args).await,
        Commands::List(args) => requests::list(&ctx, args).await,
        Commands::Approve { id } => requests::approve(&ctx, &id).await,
        Commands::Decline { id, reason } => requests::decline(&ctx, &id, reason).await,
        Commands::ApproveAll => requests::approve_all(&ctx).await,
        Commands::DeclineAll { reason } => requests::decline_all(&ctx, reason).await,
        Commands::Delete { id } => requests::delete(&ctx, &id).await,
        Commands::Sweep => requests::sweep(&ctx).await,
        Commands::Watch(args) => requests::watch(&ctx, args).await,
    }
}
