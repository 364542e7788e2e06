use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use portfolio::db::{connection::connect_sqlite, migrate};
use portfolio::money::format_cents;
use portfolio::plans::{
    self,
    config::{PlanCatalog, load_plans_path, load_plans_str},
    sync::{SyncOptions, sync_plans},
};
use portfolio::subscription;
use portfolio::types::Role;
use portfolio::users::{self, NewUserInput};
use shared_utils::env::get_env_var;

#[derive(Parser)]
#[command(version, about = "Property portfolio admin CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending migrations to DATABASE_URL.
    Migrate,
    Plans(PlansCmd),
    /// Quote a subscription price.
    Price {
        #[arg(long)]
        plan: String,
        #[arg(long)]
        properties: i64,
        /// Plan catalog TOML; the built-in catalog is used otherwise.
        #[arg(long, value_name = "FILE")]
        file: Option<String>,
    },
    Users(UsersCmd),
    Subscriptions(SubscriptionsCmd),
}

#[derive(Args)]
struct PlansCmd {
    #[command(subcommand)]
    sub: PlansSub,
}

#[derive(Subcommand)]
enum PlansSub {
    /// Upsert the plan catalog from a TOML file.
    Sync {
        #[arg(long, value_name = "FILE")]
        file: String,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        prune: bool,
    },
    /// Print the plans stored in the database.
    List,
}

#[derive(Args)]
struct UsersCmd {
    #[command(subcommand)]
    sub: UsersSub,
}

#[derive(Subcommand)]
enum UsersSub {
    /// Create an account (any role, including admin) and print its token.
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "owner")]
        role: Role,
    },
}

#[derive(Args)]
struct SubscriptionsCmd {
    #[command(subcommand)]
    sub: SubscriptionsSub,
}

#[derive(Subcommand)]
enum SubscriptionsSub {
    /// Recompute property count and price for a user's subscription.
    Resync {
        #[arg(long)]
        user: i32,
    },
}

fn open_db() -> Result<diesel::SqliteConnection> {
    let db_url = get_env_var("DATABASE_URL")?;
    migrate::run_all(&db_url)?;
    connect_sqlite(&db_url)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Migrate => {
            let db_url = get_env_var("DATABASE_URL")?;
            migrate::run_all(&db_url)?;
            println!("migrations up to date");
        }
        Cmd::Plans(PlansCmd {
            sub: PlansSub::Sync { file, dry_run, prune },
        }) => {
            let cat = load_plans_path(&file)?;
            let mut conn = open_db()?;
            let diff = sync_plans(&mut conn, &cat, SyncOptions { dry_run, prune })?;
            if dry_run {
                println!("(dry run)");
            }
            print!("{diff}");
            if diff.is_noop() && diff.retained_in_use.is_empty() {
                println!();
            }
        }
        Cmd::Plans(PlansCmd { sub: PlansSub::List }) => {
            let mut conn = open_db()?;
            for p in plans::list(&mut conn)? {
                let max = p
                    .max_properties
                    .map_or_else(|| "unlimited".to_string(), |m| m.to_string());
                println!(
                    "{:<14} {:<16} {:>9} + {:>7}/property  max {max}",
                    p.code,
                    p.name,
                    format_cents(p.base_price_cents),
                    format_cents(p.price_per_property_cents)
                );
            }
        }
        Cmd::Price { plan, properties, file } => {
            let cat: PlanCatalog = match file {
                Some(path) => load_plans_path(path)?,
                None => load_plans_str(plans::DEFAULT_PLANS_TOML)?,
            };
            let code = plan.trim().to_lowercase();
            let row = cat
                .to_rows()?
                .into_iter()
                .find(|p| p.code == code)
                .with_context(|| format!("unknown plan '{code}'"))?;
            let q = subscription::quote_for(&row, properties);
            println!("{}", serde_json::to_string_pretty(&q)?);
        }
        Cmd::Users(UsersCmd {
            sub: UsersSub::Add { email, name, role },
        }) => {
            let mut conn = open_db()?;
            let (user, token) = users::create(&mut conn, &NewUserInput { email, name, role }, true)?;
            eprintln!("created user {} ({}, {})", user.id, user.email, user.role);
            println!("{token}");
        }
        Cmd::Subscriptions(SubscriptionsCmd {
            sub: SubscriptionsSub::Resync { user },
        }) => {
            let mut conn = open_db()?;
            match subscription::resync(&mut conn, user)? {
                Some(sub) => println!(
                    "subscription {}: {} properties, {}",
                    sub.id,
                    sub.property_count,
                    format_cents(sub.current_price_cents)
                ),
                None => println!("user {user} has no subscription"),
            }
        }
    }

    Ok(())
}
