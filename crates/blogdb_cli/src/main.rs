//! blogdb CLI
//!
//! Command-line interface over the blog data-access layer.

use blogdb_core::repo::now_epoch_ms;
use blogdb_core::store::migrations::current_user_version;
use blogdb_core::{
    default_log_level, init_logging, load_config, open_store_with, BlogService, CallContext,
    Pagination, Predicate, SqliteStore, StoreConfig, User, UserRepository, Visibility,
};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;

mod report;
mod seed;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "blogdb")]
#[command(about = "blogdb - blog data-access toolkit", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite file; overrides `database_path` from the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or migrate the database
    Init,
    /// Import jsonplaceholder-shaped JSON files
    Seed(seed::SeedArgs),
    /// List users as JSON lines
    Users(UsersArgs),
    /// Print one user with address and company
    User { id: i64 },
    /// Soft-delete one user
    DeleteUser { id: i64 },
    /// Soft-delete one user with its posts and comments
    RetireUser { id: i64 },
    /// Run a named report and print JSON lines
    Report(report::ReportArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Seed(_) => "seed",
            Self::Users(_) => "users",
            Self::User { .. } => "user",
            Self::DeleteUser { .. } => "delete_user",
            Self::RetireUser { .. } => "retire_user",
            Self::Report(_) => "report",
        }
    }
}

#[derive(Debug, Args)]
struct UsersArgs {
    /// Include soft-deleted users
    #[arg(long)]
    include_deleted: bool,

    #[arg(long)]
    limit: Option<u32>,

    #[arg(long, default_value_t = 0)]
    offset: u32,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = resolve_config(&cli)?;
    if let Some(log_dir) = &config.log_dir {
        let level = config.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, std::env::current_dir()?.join(log_dir))?;
    }

    let store = open_store_with(&config)?;
    info!(
        "event=cli_command module=cli status=start command={}",
        cli.command.name()
    );

    match cli.command {
        Commands::Init => {
            let version = current_user_version(store.connection())?;
            println!("schema_version={version}");
            Ok(())
        }
        Commands::Seed(args) => seed::execute(&store, &config, args),
        Commands::Users(args) => list_users(&store, &config.call_context(), args),
        Commands::User { id } => {
            let details = UserRepository::new(&store).get_details(&config.call_context(), id)?;
            print_json(&details)
        }
        Commands::DeleteUser { id } => {
            UserRepository::new(&store).users().soft_delete(
                &config.call_context(),
                id,
                now_epoch_ms(),
            )?;
            println!("deleted user {id}");
            Ok(())
        }
        Commands::RetireUser { id } => {
            let summary = BlogService::new(&store).retire_user(&config.call_context(), id)?;
            print_json(&summary)
        }
        Commands::Report(args) => report::execute(&store, &config.call_context(), args),
    }
}

fn resolve_config(cli: &Cli) -> CliResult<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => StoreConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.database_path = Some(db.clone());
    }
    config.validate()?;
    Ok(config)
}

fn list_users(store: &SqliteStore, ctx: &CallContext, args: UsersArgs) -> CliResult<()> {
    let visibility = if args.include_deleted {
        Visibility::IncludeDeleted
    } else {
        Visibility::LiveOnly
    };
    let page = Pagination {
        limit: args.limit,
        offset: args.offset,
    };
    let users: Vec<User> = UserRepository::new(store)
        .users()
        .list_with(ctx, Predicate::True, page, visibility)?;
    for user in &users {
        print_json(user)?;
    }
    Ok(())
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
