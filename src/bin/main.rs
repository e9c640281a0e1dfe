use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "reelbase-server")]
#[command(about = "Movie catalog REST server", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "reelbase.yaml")]
    config: String,

    /// Enable debug logging for this crate.
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account in the configured database.
    CreateAccount {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
        /// Grant catalog write access.
        #[arg(long)]
        staff: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.debug {
        "reelbase=debug,tower_http=debug"
    } else {
        "reelbase=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match args.command {
        Some(Command::CreateAccount {
            username,
            password,
            email,
            staff,
        }) => reelbase::create_account(
            &args.config,
            reelbase::AccountArgs {
                username,
                password,
                email,
                is_staff: staff,
            },
        )
        .await
        .map(|account| {
            println!("Created account {} (id {})", account.username, account.id);
        }),
        None => reelbase::run(&args.config, args.debug).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
