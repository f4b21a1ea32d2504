//! CLI entry point for `rstunpack`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

use rstunpack::config::{self, Config};
use rstunpack::model::attachment::AttachmentKind;
use rstunpack::unpack::{policy, Unpacker};

/// Highest player number a game can have.
const MAX_PLAYERS: u16 = 11;

#[derive(Parser)]
#[command(
    name = "rstunpack",
    version,
    about = "Extract files embedded in VGA Planets result and util-data files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List attachments found in a game directory
    List {
        /// Directory containing player<N>.rst / util<N>.dat
        dir: PathBuf,
        /// Player numbers to scan (default: all)
        #[arg(short, long = "player", value_name = "N")]
        players: Vec<u16>,
        #[arg(long)]
        json: bool,
    },
    /// Save attachments found in a game directory
    Unpack {
        /// Directory containing player<N>.rst / util<N>.dat
        dir: PathBuf,
        /// Player numbers to scan (default: all)
        #[arg(short, long = "player", value_name = "N")]
        players: Vec<u16>,
        /// Directory to save into (default: the game directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Select every attachment except critical files
        #[arg(long)]
        all: bool,
        /// Select every attachment of this kind
        #[arg(long, value_enum, value_name = "KIND")]
        accept: Vec<KindArg>,
        /// Deselect every attachment of this kind
        #[arg(long, value_enum, value_name = "KIND")]
        reject: Vec<KindArg>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Normal,
    Config,
    RaceNames,
    Critical,
}

impl From<KindArg> for AttachmentKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Normal => AttachmentKind::NormalFile,
            KindArg::Config => AttachmentKind::ConfigurationFile,
            KindArg::RaceNames => AttachmentKind::RaceNameFile,
            KindArg::Critical => AttachmentKind::CriticalFile,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::List { dir, players, json } => cmd_list(&dir, &players, json),
        Commands::Unpack {
            dir,
            players,
            output,
            all,
            accept,
            reject,
        } => {
            let target = output.unwrap_or_else(|| dir.clone());
            let selection = Selection {
                all,
                accept: accept.into_iter().map(AttachmentKind::from).collect(),
                reject: reject.into_iter().map(AttachmentKind::from).collect(),
            };
            cmd_unpack(config, &dir, &players, &target, &selection)
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "rstunpack.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "rstunpack", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Scan `dir` for the given players (all players if none given).
fn scan(dir: &Path, players: &[u16]) -> anyhow::Result<Unpacker> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }
    let mut unpacker = Unpacker::new();
    if players.is_empty() {
        for player in 1..=MAX_PLAYERS {
            unpacker.load_directory(dir, player);
        }
    } else {
        for &player in players {
            unpacker.load_directory(dir, player);
        }
    }
    Ok(unpacker)
}

/// List attachments.
fn cmd_list(dir: &Path, players: &[u16], json: bool) -> anyhow::Result<()> {
    let unpacker = scan(dir, players)?;
    if json {
        print_attachments_json(&unpacker)
    } else {
        print_attachments_table(&unpacker);
        Ok(())
    }
}

/// Explicit selection given on the command line.
struct Selection {
    all: bool,
    accept: Vec<AttachmentKind>,
    reject: Vec<AttachmentKind>,
}

impl Selection {
    fn is_explicit(&self) -> bool {
        self.all || !self.accept.is_empty() || !self.reject.is_empty()
    }

    fn apply(&self, unpacker: &mut Unpacker) {
        if self.all {
            unpacker.select_all_attachments(true);
            unpacker.select_attachments_by_kind(AttachmentKind::CriticalFile, false);
        }
        for &kind in &self.accept {
            unpacker.select_attachments_by_kind(kind, true);
        }
        for &kind in &self.reject {
            unpacker.select_attachments_by_kind(kind, false);
        }
    }
}

/// Scan, select, and save attachments.
fn cmd_unpack(
    mut config: Config,
    dir: &Path,
    players: &[u16],
    target: &Path,
    selection: &Selection,
) -> anyhow::Result<()> {
    if !target.is_dir() {
        anyhow::bail!("Not a directory: {}", target.display());
    }

    let mut unpacker = scan(dir, players)?;
    if unpacker.num_attachments() == 0 {
        println!("  No attachments found.");
        return Ok(());
    }

    let proceed = policy::check_new_attachments(&config.unpack, &mut unpacker);
    if !proceed && !selection.is_explicit() {
        print_attachments_table(&unpacker);
        println!("  Selection required: rerun with --all, --accept KIND or --reject KIND.");
        return Ok(());
    }
    selection.apply(&mut unpacker);

    unpacker.drop_unchanged_files(target);
    unpacker.drop_unselected_attachments();
    let count = unpacker.num_attachments();
    let saved = unpacker.save_files(target);
    policy::mark_attachments_processed(&mut config.unpack, &unpacker);
    if let Err(e) = config::save_config(&config) {
        tracing::warn!(error = %e, "Could not save configuration");
    }

    if !saved {
        anyhow::bail!("Some attachments could not be saved to {}", target.display());
    }
    println!("  Saved {count} attachment(s) to {}", target.display());
    Ok(())
}

/// Print attachments as a human-readable table.
fn print_attachments_table(unpacker: &Unpacker) {
    use humansize::{format_size, BINARY};

    println!();
    match unpacker.timestamp() {
        Some(ts) => println!("  {} attachment(s), turn of {ts}", unpacker.num_attachments()),
        None => println!("  {} attachment(s)", unpacker.num_attachments()),
    }
    println!();

    if unpacker.num_attachments() == 0 {
        return;
    }

    println!("  {:<3} {:<20} {:<14} {:>10}", "", "Name", "Kind", "Size");
    println!("  {}", "-".repeat(50));
    for a in unpacker.attachments() {
        let mark = if a.is_enabled() { "[x]" } else { "[ ]" };
        println!(
            "  {:<3} {:<20} {:<14} {:>10}",
            mark,
            a.name(),
            a.kind().label(),
            format_size(a.size(), BINARY)
        );
    }
    println!();
}

/// Print attachments as JSON.
fn print_attachments_json(unpacker: &Unpacker) -> anyhow::Result<()> {
    let items: Vec<serde_json::Value> = unpacker
        .attachments()
        .map(|a| {
            serde_json::json!({
                "name": a.name(),
                "kind": a.kind(),
                "size": a.size(),
                "selected": a.is_enabled(),
            })
        })
        .collect();

    let listing = serde_json::json!({
        "timestamp": unpacker.timestamp().map(|t| t.to_string()),
        "attachments": items,
    });

    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
