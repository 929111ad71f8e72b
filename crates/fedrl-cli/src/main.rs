//! fedrl CLI: the federated-learning dashboard in a terminal.

mod render;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use fedrl_client::ApiClient;
use fedrl_core::models::{filter_by_id, performance_stats, ControlAction};
use fedrl_core::{logging, qtable, ClientConfig, FedrlError};

#[derive(Parser)]
#[command(
    name = "fedrl",
    about = "🚗 fedrl: federated RL dashboard for the terminal",
    version,
    author
)]
struct Cli {
    /// YAML config file (default: <config dir>/fedrl/config.yaml)
    #[arg(long, global = true, env = "FEDRL_CONFIG")]
    config: Option<PathBuf>,
    /// API root, e.g. https://host/api/v1/
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Where the session cookies are stored
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,
    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        email: String,
        #[arg(long, env = "FEDRL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an admin account, then log in with it
    Register {
        email: String,
        full_name: String,
        #[arg(long, env = "FEDRL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session (the backend is not contacted)
    Logout,
    /// Show the logged-in user, refreshing the session if needed
    Whoami,
    /// List federated runs
    Runs,
    /// List client training events
    Events,
    /// List Q-tables submitted by clients
    ClientTables {
        /// Print the raw JSON payload
        #[arg(long)]
        json: bool,
    },
    /// List aggregated Q-tables, or show one as a grid
    GlobalTables {
        /// Case-insensitive filter on table id
        #[arg(long, short)]
        search: Option<String>,
        /// Show this table's decoded grid
        #[arg(long)]
        id: Option<String>,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// List test results
    TestResults,
    /// Show dashboard counters
    Summary,
    /// Aggregate client Q-tables into a new global table
    Aggregate {
        /// Runs to include (default: backend decides)
        run_ids: Vec<String>,
    },
    /// Re-evaluate the performance of all global tables
    Evaluate,
    /// Start or stop training and testing
    Control {
        #[arg(value_enum)]
        action: ControlArg,
    },
    /// Decode a wire Q-table JSON file offline ("-" reads stdin)
    Decode {
        input: PathBuf,
        /// Print the decoded form as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ControlArg {
    StartTraining,
    StopTraining,
    StartTest,
    GlobalAvailable,
}

impl From<ControlArg> for ControlAction {
    fn from(arg: ControlArg) -> Self {
        match arg {
            ControlArg::StartTraining => ControlAction::StartTraining,
            ControlArg::StopTraining => ControlAction::StopTraining,
            ControlArg::StartTest => ControlAction::StartTest,
            ControlArg::GlobalAvailable => ControlAction::GlobalAvailable,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.base_url {
        config = config.with_base_url(url);
    }
    if let Some(path) = cli.session_file {
        config = config.with_session_file(path);
    }
    if let Some(path) = cli.log_file {
        config.log.file = Some(path);
    }
    config.validate()?;

    // Keep the guard alive until exit so file logs are flushed.
    let _log_guard = logging::init(&config.log)?;

    if let Commands::Decode { input, json } = &cli.command {
        return cmd_decode(input, *json);
    }

    let client = ApiClient::open(config)?;
    debug!(base_url = %client.config().base_url, "Client ready");
    let outcome = run(&client, cli.command).await;
    client.dispose().await?;

    if let Err(e) = &outcome {
        if e.downcast_ref::<FedrlError>().is_some_and(FedrlError::is_auth_failure) {
            eprintln!("✗ {}", e);
            eprintln!("  Run `fedrl login <email>` to sign in again.");
        }
    }
    outcome
}

async fn run(client: &ApiClient, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => cmd_login(client, &email, &password).await,
        Commands::Register {
            email,
            full_name,
            password,
        } => cmd_register(client, &email, &full_name, &password).await,
        Commands::Logout => {
            client.logout().await?;
            println!("✓ Logged out");
            Ok(())
        }
        Commands::Whoami => cmd_whoami(client).await,
        Commands::Runs => {
            let runs = client.runs().await?;
            if runs.is_empty() {
                println!("No federated runs found");
            } else {
                println!("{}", render::runs(&runs));
            }
            Ok(())
        }
        Commands::Events => {
            let events = client.events().await?;
            if events.is_empty() {
                println!("No events found");
            } else {
                println!("{}", render::events(&events));
            }
            Ok(())
        }
        Commands::ClientTables { json } => {
            let tables = client.client_qtables().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else if tables.is_empty() {
                println!("No client Q-tables found");
            } else {
                println!("{}", render::client_tables(&tables));
            }
            Ok(())
        }
        Commands::GlobalTables { search, id, json } => {
            cmd_global_tables(client, search.as_deref(), id.as_deref(), json).await
        }
        Commands::TestResults => {
            let results = client.test_results().await?;
            if results.is_empty() {
                println!("No test results found");
            } else {
                println!("{}", render::test_results(&results));
            }
            Ok(())
        }
        Commands::Summary => {
            let counts = client.summary_counts().await?;
            println!("{}", render::summary(&counts));
            Ok(())
        }
        Commands::Aggregate { run_ids } => {
            let spinner = spinner("Aggregating client Q-tables...");
            let reply = client.aggregate(&run_ids).await;
            spinner.finish_and_clear();
            let reply = reply?;
            println!("✓ Aggregation requested");
            print_reply(&reply)
        }
        Commands::Evaluate => {
            let spinner = spinner("Evaluating global Q-tables...");
            let reply = client.evaluate_global_qtables().await;
            spinner.finish_and_clear();
            print_reply(&reply?)?;
            cmd_global_tables(client, None, None, false).await
        }
        Commands::Control { action } => {
            let action = ControlAction::from(action);
            let spinner = spinner(&format!("Sending {}...", action));
            let reply = client.control(action).await;
            spinner.finish_and_clear();
            let reply = reply?;
            println!("✓ {} accepted", action);
            print_reply(&reply)
        }
        Commands::Decode { input, json } => cmd_decode(&input, json),
    }
}

// ─── Command implementations ──────────────────────────────────────────────────

async fn cmd_login(client: &ApiClient, email: &str, password: &str) -> Result<()> {
    client.login(email, password).await?;
    println!("✓ Login successful");
    print_identity(client).await;
    Ok(())
}

async fn cmd_register(client: &ApiClient, email: &str, full_name: &str, password: &str) -> Result<()> {
    let created = client.register(email, full_name, password).await?;
    println!("✓ Account created for {} <{}>", created.user.full_name, created.user.email);
    print_identity(client).await;
    Ok(())
}

async fn cmd_whoami(client: &ApiClient) -> Result<()> {
    client.restore_session().await?;
    print_identity(client).await;
    Ok(())
}

async fn print_identity(client: &ApiClient) {
    let session = client.session();
    let session = session.lock().await;
    if !session.is_logged_in() {
        println!("Not logged in");
        return;
    }
    let user = session.user_summary();
    println!("User:    {}", user.username.as_deref().unwrap_or("-"));
    println!(
        "User ID: {}",
        user.user_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
    );
}

async fn cmd_global_tables(
    client: &ApiClient,
    search: Option<&str>,
    id: Option<&str>,
    json: bool,
) -> Result<()> {
    let tables = client.global_qtables().await?;

    if let Some(id) = id {
        let Some(table) = tables.iter().find(|t| t.id == id) else {
            anyhow::bail!("Global Q-table not found: {}", id);
        };
        let decoded = qtable::decode_value(&table.q_table);
        if json {
            println!("{}", serde_json::to_string_pretty(&decoded)?);
            return Ok(());
        }
        println!("Global Q-table: {}", table.id);
        println!("Performance:    {:.1}", table.performance_score);
        if decoded.is_empty() {
            println!("No Q-table data");
        } else {
            println!("{}", render::qtable_grid(&decoded));
        }
        return Ok(());
    }

    let shown = filter_by_id(&tables, search.unwrap_or(""));
    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }
    if shown.is_empty() {
        println!("No global Q-tables found");
        return Ok(());
    }

    let (best, avg) = performance_stats(&tables);
    println!("{}", render::global_tables(&shown));
    println!("Tables: {}   Best: {:.1}   Average: {:.1}", tables.len(), best, avg);
    Ok(())
}

fn cmd_decode(input: &Path, json: bool) -> Result<()> {
    let text = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
        std::fs::read_to_string(input)?
    };

    let decoded = qtable::decode_str(&text);
    debug!(
        states = decoded.states.len(),
        actions = decoded.actions.len(),
        "Decoded Q-table"
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&decoded)?);
    } else if decoded.is_empty() {
        println!("No Q-table data (empty or malformed input)");
    } else {
        println!(
            "{} states × {} actions × {} sub-actions",
            decoded.states.len(),
            decoded.actions.len(),
            decoded.sub_actions.len()
        );
        println!("{}", render::qtable_grid(&decoded));
    }
    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn print_reply(reply: &serde_json::Value) -> Result<()> {
    if !reply.is_null() {
        println!("{}", serde_json::to_string_pretty(reply)?);
    }
    Ok(())
}
