use anyhow::{anyhow, bail, Context, Result};
use cgtree_core::config::LogConfig;
use cgtree_core::{CgroupRoot, CgroupTree, Config, NodeId, VERSION};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cgtree")]
#[command(version = VERSION)]
#[command(about = "Inspect and manage the cgroup hierarchy", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/cgtree/config.toml")]
    config: PathBuf,

    /// Override the cgroup mount point from the configuration
    #[arg(long, env = "CGTREE_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether cgroups are mounted
    Check,

    /// Print the hierarchy below a cgroup
    Tree {
        /// Logical cgroup name (default: root)
        name: Option<String>,
    },

    /// Export a cgroup subtree as JSON
    Export {
        /// Logical cgroup name (default: root)
        name: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a cgroup, including missing parents
    Create { name: String },

    /// Delete a cgroup and everything below it
    Delete { name: String },

    /// List the tasks of a cgroup
    Tasks { name: String },

    /// Move a process into a cgroup
    Attach { name: String, pid: u32 },

    /// Read a control file
    Get { name: String, setting: String },

    /// Write a control file
    Set {
        name: String,
        setting: String,
        value: String,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, loaded) = load_config(&cli.config)?;
    if let Some(root) = cli.root {
        config.cgroup.root_path = root;
    }
    config
        .validate()
        .context("Configuration validation failed")?;

    let _guard = init_logging(&config.logging)?;
    if loaded {
        debug!("Configuration loaded from {:?}", cli.config);
    } else {
        warn!("Configuration file not found: {:?}, using defaults", cli.config);
    }

    match cli.command {
        Commands::Check => run_check(&config),
        Commands::Tree { name } => run_tree(&config, name.as_deref()),
        Commands::Export { name, output } => run_export(&config, name.as_deref(), output),
        Commands::Create { name } => {
            let mut tree = open_tree(&config)?;
            let id = tree.create_cgroup(tree.root(), &name)?;
            println!("{} {}", "Created".green(), absname(&tree, id));
            Ok(())
        }
        Commands::Delete { name } => {
            let mut tree = open_tree(&config)?;
            tree.delete_cgroup(tree.root(), &name)?;
            println!("{} {}", "Deleted".green(), name);
            Ok(())
        }
        Commands::Tasks { name } => {
            let tree = open_tree(&config)?;
            let id = resolve(&tree, Some(name.as_str()))?;
            for task in tree.get_tasks(id)? {
                println!("{}", task);
            }
            Ok(())
        }
        Commands::Attach { name, pid } => {
            let tree = open_tree(&config)?;
            let id = resolve(&tree, Some(name.as_str()))?;
            tree.append_task(id, pid)?;
            println!("{} {} to {}", "Attached".green(), pid, absname(&tree, id));
            Ok(())
        }
        Commands::Get { name, setting } => {
            let tree = open_tree(&config)?;
            let id = resolve(&tree, Some(name.as_str()))?;
            let setting = tree
                .get_setting(id, &setting)
                .ok_or_else(|| anyhow!("Setting {} not found in {}", setting, absname(&tree, id)))?;
            print!("{}", setting.get()?);
            Ok(())
        }
        Commands::Set {
            name,
            setting,
            value,
        } => {
            let tree = open_tree(&config)?;
            let id = resolve(&tree, Some(name.as_str()))?;
            tree.set_setting(id, &setting, &value)?;
            info!("Set {} in {}", setting, absname(&tree, id));
            Ok(())
        }
        Commands::GenerateConfig { output } => {
            Config::default()
                .save_to_file(&output)
                .with_context(|| format!("Failed to save configuration file {:?}", output))?;
            println!("{} {:?}", "Configuration written to".green(), output);
            Ok(())
        }
    }
}

fn run_check(config: &Config) -> Result<()> {
    let root = &config.cgroup.root_path;
    report_check(CgroupRoot::cgroup_enabled_at(root), root)
}

/// Print the outcome of a mount check; an unmounted hierarchy is an error
fn report_check(available: bool, root: &Path) -> Result<()> {
    if available {
        println!("{} {:?}", "✅ cgroups available at".green(), root);
        Ok(())
    } else {
        println!("{}", "❌ cgroups are not mounted".red());
        bail!("cgroups are not mounted at {:?}", root)
    }
}

fn run_tree(config: &Config, name: Option<&str>) -> Result<()> {
    let tree = open_tree(config)?;
    let id = resolve(&tree, name)?;
    print_node(&tree, id, 0);
    Ok(())
}

fn run_export(config: &Config, name: Option<&str>, output: Option<PathBuf>) -> Result<()> {
    let tree = open_tree(config)?;
    let id = resolve(&tree, name)?;
    let json = tree.export_to_json_string(id, config.export.indent)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write export file {:?}", path))?;
            info!("Exported {} to {:?}", absname(&tree, id), path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn print_node(tree: &CgroupTree, id: NodeId, depth: usize) {
    let Some(node) = tree.node(id) else {
        return;
    };

    let label = if node.name().is_empty() {
        node.absname()
    } else {
        node.name()
    };
    println!(
        "{}{} {}",
        "  ".repeat(depth),
        label.cyan().bold(),
        format!("({} settings)", node.setting_names().len()).dimmed()
    );

    for child in tree.children(id) {
        print_node(tree, child, depth + 1);
    }
}

fn open_tree(config: &Config) -> Result<CgroupTree> {
    CgroupTree::with_absname(&config.cgroup.root_name, &config.cgroup.root_path)
        .with_context(|| format!("Failed to scan {:?}", config.cgroup.root_path))
}

fn resolve(tree: &CgroupTree, name: Option<&str>) -> Result<NodeId> {
    match name {
        None => Ok(tree.root()),
        Some(name) => tree
            .get_cgroup_by_name(tree.root(), name)
            .ok_or_else(|| anyhow!("Cgroup not found: {}", name)),
    }
}

fn absname(tree: &CgroupTree, id: NodeId) -> String {
    tree.node(id)
        .map(|node| node.absname().to_string())
        .unwrap_or_default()
}

/// Load configuration from file or use defaults
fn load_config(path: &Path) -> Result<(Config, bool)> {
    if path.exists() {
        let config = Config::load_from_file(path)
            .with_context(|| format!("Failed to load configuration file {:?}", path))?;
        Ok((config, true))
    } else {
        Ok((Config::default(), false))
    }
}

/// Initialize logging to stderr, plus a daily log file when configured
fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {:?}", dir))?;
            let file_appender = tracing_appender::rolling::daily(dir, "cgtree.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .with(filter)
        .init();

    if let Some(dir) = &config.log_dir {
        debug!("Logging to {:?}", dir);
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_check() {
        let root = Path::new("/sys/fs/cgroup");
        assert!(report_check(true, root).is_ok());

        let err = report_check(false, root).unwrap_err();
        assert!(err.to_string().contains("not mounted"));
    }

    #[test]
    fn test_run_check_on_existing_directory() {
        let mut config = Config::default();
        config.cgroup.root_path = std::env::temp_dir();
        assert!(run_check(&config).is_ok());
    }
}
