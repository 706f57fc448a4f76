use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use futures::future::BoxFuture;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use navgraph_core::config::AppConfig;
use navgraph_core::error::Result as NavResult;
use navgraph_core::graph::{Action, Verification};
use navgraph_core::traits::{DeviceDriver, DeviceHandle, GraphSource, Verifier};
use navgraph_core::types::DriverResponse;

use navgraph_engine::condition::{evaluate, ConditionValue, ValueKind};
use navgraph_engine::{build_index, find_path, JsonFileGraphSource, Navigator};

const DEFAULT_CONFIG: &str = "navgraph.toml";

#[derive(Parser)]
#[command(name = "navgraph", version, about = "Navigate device UIs modelled as graphs")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG, env = "NAVGRAPH_CONFIG")]
    config: PathBuf,

    /// Override the graph directory from the config
    #[arg(long)]
    graphs: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a tree for structural problems
    Validate {
        /// Tree id (file stem under the graph directory)
        tree: String,
    },
    /// Print the shortest path between two nodes
    Path {
        tree: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Walk a tree without a device, logging every action
    Walk {
        tree: String,
        /// Target node
        #[arg(long)]
        to: String,
        /// Node to start from (default: the tree's start node)
        #[arg(long)]
        from: Option<String>,
        /// Device id used for the session lock
        #[arg(long, default_value = "dry-run")]
        device: String,
    },
    /// List the operators a value kind supports
    Operators {
        /// integer, text, list or map
        kind: String,
    },
    /// Evaluate a condition between two JSON values
    Eval {
        /// Left operand as JSON (e.g. 5, "abc", [1,2], {"k":1})
        left: String,
        /// Operator name (e.g. ">=", contains, index_of_key)
        operator: String,
        /// Right operand as JSON
        right: String,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Driver that accepts every action and only logs it.
struct DryRunDriver;

impl DeviceDriver for DryRunDriver {
    fn run<'a>(&'a self, action: &'a Action) -> BoxFuture<'a, NavResult<DriverResponse>> {
        Box::pin(async move {
            let command = action.describe();
            info!(action = %command, "dry-run");
            Ok(DriverResponse::ok(command))
        })
    }
}

/// Verifier that confirms every check.
struct AcceptingVerifier;

impl Verifier for AcceptingVerifier {
    fn verify<'a>(&'a self, verification: &'a Verification) -> BoxFuture<'a, NavResult<DriverResponse>> {
        Box::pin(async move {
            info!(verification = %verification.command, "dry-run verify");
            Ok(DriverResponse::ok("assumed"))
        })
    }
}

/// Load `path`, falling back to defaults only when the default config file
/// is absent. An explicit path that does not exist is an error.
fn resolve_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        Ok(AppConfig::load(path)?)
    } else if path == Path::new(DEFAULT_CONFIG) {
        Ok(AppConfig::default())
    } else {
        anyhow::bail!("config file not found: {}", path.display());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("navgraph=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "navgraph", &mut std::io::stdout());
        return Ok(());
    }

    let config = resolve_config(&cli.config)?;

    let graph_dir = cli.graphs.clone().unwrap_or_else(|| config.graph_dir());
    let source = Arc::new(JsonFileGraphSource::new(graph_dir));

    match cli.command {
        Commands::Validate { tree } => {
            let navigator = Navigator::from_config(source, &config);
            let report = navigator.validate_graph(&tree).await?;
            if report.is_valid() {
                println!("{tree}: ok");
            } else {
                println!("{tree}: {} problem(s)", report.violations.len());
                for message in report.messages() {
                    println!("  - {message}");
                }
                std::process::exit(1);
            }
        }
        Commands::Path { tree, from, to } => {
            let graph = source.load(&tree).await?;
            let index = build_index(&graph)?;
            let path = find_path(&index, &from, &to)?;
            if path.is_empty() {
                println!("{from} is already {to}");
            }
            for (i, step) in path.iter().enumerate() {
                println!(
                    "{:>3}. {} -> {}  via {}/{}",
                    i + 1,
                    step.from,
                    step.to,
                    step.edge_id,
                    step.action_set_id
                );
            }
        }
        Commands::Walk {
            tree,
            to,
            from,
            device,
        } => {
            let navigator = Navigator::from_config(source, &config);
            let owner = format!("cli-{}", uuid::Uuid::new_v4());
            let handle = DeviceHandle::new(Arc::new(DryRunDriver), Arc::new(AcceptingVerifier));
            let ticket = navigator.acquire_session(&device, &tree, &owner, handle).await?;
            if let Some(node) = from {
                navigator.set_position(&ticket, &node)?;
            }

            let result = navigator.navigate(&ticket, &to).await;
            if let Err(e) = navigator.release_session(&ticket) {
                warn!(error = %e, "Failed to release session");
            }
            let trace = result?;
            println!("{}", serde_json::to_string_pretty(&trace)?);
            if !trace.succeeded {
                std::process::exit(1);
            }
        }
        Commands::Operators { kind } => {
            let kind = ValueKind::parse(&kind).ok_or_else(|| {
                anyhow::anyhow!("unknown kind '{kind}' (expected integer, text, list or map)")
            })?;
            for op in Navigator::list_supported_operators(kind) {
                println!("{:<18} {}", op.name, op.label);
            }
        }
        Commands::Eval {
            left,
            operator,
            right,
        } => {
            let left = ConditionValue::try_from(serde_json::from_str::<serde_json::Value>(&left)?)?;
            let right = ConditionValue::try_from(serde_json::from_str::<serde_json::Value>(&right)?)?;
            let result = evaluate(&left, &right, &operator)?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } => {} // handled before config loading
    }

    Ok(())
}
