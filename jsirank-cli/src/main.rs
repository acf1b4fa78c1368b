mod config;
mod oracle;
mod output;

use clap::Parser;
use jsirank_core::{
    AdaptiveSort, CoinFlipOnError, ComparisonOracle, FitOptions, PivotStrategy, RankingTracker, UpdateCallback,
};
use std::collections::HashMap;
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::JsirankConfig;
use crate::oracle::{InteractiveOracle, SimulatedOracle};

pub fn bail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[derive(Parser)]
#[command(name = "jsirank", version, about = "Rank items with as few pairwise comparisons as possible")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sort a list of items by pairwise comparison and fit Bradley-Terry strengths
    Rank(RankArgs),
    /// Create a default config file at ~/.config/jsirank/config.toml
    Init,
}

#[derive(Parser)]
struct RankArgs {
    /// File with one item per line, or a JSON array of strings
    #[arg(long)]
    items: Option<PathBuf>,

    /// Inline item (repeatable)
    #[arg(long = "item")]
    inline_items: Vec<String>,

    /// Who answers comparisons: "interactive" or "simulated"
    #[arg(long)]
    oracle: Option<String>,

    /// Simulated oracle: TOML or JSON map of item → true strength (missing items get 1.0)
    #[arg(long)]
    strengths: Option<PathBuf>,

    /// Simulated oracle: 0.0 follows the strengths exactly, 1.0 is pure chance
    #[arg(long)]
    noise: Option<f64>,

    /// Seed for the simulated oracle and random pivots
    #[arg(long)]
    seed: Option<u64>,

    /// Pivot choice: "first" or "random"
    #[arg(long)]
    pivot: Option<String>,

    /// Ghost-player regularization strength for the fit (0.0 disables it)
    #[arg(long)]
    regularization: Option<f64>,

    /// Output JSON instead of table
    #[arg(long)]
    json: bool,

    /// Show progress during execution
    #[arg(short, long)]
    verbose: bool,

    /// Path to config file (default: ~/.config/jsirank/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OracleKind {
    Interactive,
    Simulated,
}

fn parse_oracle_kind(value: Option<&str>) -> OracleKind {
    match value {
        Some("interactive") | None => OracleKind::Interactive,
        Some("simulated") => OracleKind::Simulated,
        Some(other) => bail(format!("Unknown oracle \"{other}\". Use \"interactive\" or \"simulated\".")),
    }
}

fn parse_pivot(value: Option<&str>, seed: Option<u64>) -> PivotStrategy {
    match value {
        Some("first") | None => PivotStrategy::First,
        Some("random") => PivotStrategy::Random { seed },
        Some(other) => bail(format!("Unknown pivot \"{other}\". Use \"first\" or \"random\".")),
    }
}

/// Parse a string as either a JSON array of strings or plain text (one item per line).
fn parse_items_from_str(content: &str) -> Vec<String> {
    let trimmed = content.trim();
    if trimmed.starts_with('[') {
        // Try JSON array
        let items: Vec<String> = serde_json::from_str(trimmed)
            .unwrap_or_else(|e| bail(format!("File looks like JSON but failed to parse: {e}")));
        items.into_iter().filter(|s| !s.trim().is_empty()).collect()
    } else {
        // Plain text, one item per line
        trimmed
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Load items from all sources: --items file, --item inline args, or stdin.
fn load_items(args: &RankArgs) -> Vec<String> {
    let mut items = Vec::new();

    // From file (auto-detects JSON array vs one-per-line)
    if let Some(ref path) = args.items {
        let content = std::fs::read_to_string(path)
            .unwrap_or_else(|e| bail(format!("Failed to read items file {}: {e}", path.display())));
        items = parse_items_from_str(&content);
    }

    // From inline --item flags
    items.extend(args.inline_items.iter().cloned());

    // From stdin (only if no file and no inline items)
    if items.is_empty() {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            bail("No items provided. Use --items <file>, --item <name>, or pipe items via stdin.");
        }
        let content: String = stdin.lock().lines()
            .map(|l| l.unwrap_or_else(|e| bail(format!("Failed to read from stdin: {e}"))))
            .collect::<Vec<_>>()
            .join("\n");
        items = parse_items_from_str(&content);
    }

    if items.len() < 2 {
        bail(format!("Need at least 2 items to rank, got {}", items.len()));
    }
    items
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rank(args) => run_rank(args),
        Commands::Init => {
            let path = config::default_config_path()
                .unwrap_or_else(|| bail("HOME environment variable not set"));
            config::write_template(&path).unwrap_or_else(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => bail(format!("Config file already exists at {}", path.display())),
                _ => bail(format!("Failed to write config to {}: {e}", path.display())),
            });
            println!("Created config at {}", path.display());
            println!("Edit it to set your default oracle, pivot, etc.");
        }
    }
}

/// Run the adaptive sort with `oracle`, recording into `tracker`.
fn sort_with<O: ComparisonOracle<String>>(
    oracle: O,
    pivot: PivotStrategy,
    items: &[String],
    tracker: &RankingTracker<String>,
) -> Vec<String> {
    let mut sorter = AdaptiveSort::with_pivot_strategy(oracle, pivot);
    sorter
        .sort(items, &mut &*tracker)
        .unwrap_or_else(|e| bail(format!("Sort failed: {e}")))
}

fn run_rank(args: RankArgs) {
    init_tracing(args.verbose);

    // Load config file, merge with CLI args (CLI wins)
    let file_settings = match args.config.clone().or_else(config::default_config_path) {
        Some(path) => JsirankConfig::from_file(&path).unwrap_or_else(|e| bail(e)),
        None => JsirankConfig::default(),
    };
    let settings = file_settings.overridden_by(JsirankConfig {
        oracle: args.oracle.clone(),
        noise_level: args.noise,
        seed: args.seed,
        pivot: args.pivot.clone(),
        regularization: args.regularization,
    });

    let oracle_kind = parse_oracle_kind(settings.oracle.as_deref());
    let seed = settings.seed;
    let pivot = parse_pivot(settings.pivot.as_deref(), seed);
    let noise = settings.noise_level.unwrap_or(0.0);
    if !(0.0..=1.0).contains(&noise) {
        bail(format!("--noise must be between 0.0 and 1.0, got {noise}"));
    }
    let regularization = settings.regularization.unwrap_or(0.0);
    if !(regularization >= 0.0 && regularization.is_finite()) {
        bail(format!("--regularization must be a non-negative number, got {regularization}"));
    }

    if oracle_kind == OracleKind::Interactive && args.items.is_none() && args.inline_items.is_empty() {
        bail("The interactive oracle reads answers from stdin. Pass items with --items <file> or --item <name>.");
    }

    let items = load_items(&args);
    let tracker = RankingTracker::with_options(&items, FitOptions { regularization_strength: regularization })
        .unwrap_or_else(|e| bail(e));
    tracker.add_update_callback(UpdateCallback::with_count(|count| {
        debug!(comparisons = count, "Comparison recorded");
    }));

    info!(
        items = items.len(),
        oracle = ?oracle_kind,
        pivot = ?pivot,
        "Ranking started"
    );

    let sort_order = match oracle_kind {
        OracleKind::Simulated => {
            let strengths = match args.strengths {
                Some(ref path) => oracle::load_strengths(path),
                None => HashMap::new(),
            };
            if strengths.is_empty() {
                eprintln!("Warning: no strengths given, every item has strength 1.0 and the outcome is pure chance.");
            }
            sort_with(SimulatedOracle::new(strengths, noise, seed), pivot, &items, &tracker)
        }
        OracleKind::Interactive => {
            if !io::stdin().is_terminal() {
                bail("The interactive oracle needs a terminal on stdin.");
            }
            let human = InteractiveOracle::new(io::stdin().lock(), io::stderr());
            let oracle: CoinFlipOnError<_, String> = match seed {
                Some(seed) => CoinFlipOnError::seeded(human, seed),
                None => CoinFlipOnError::new(human),
            };
            sort_with(oracle, pivot, &items, &tracker)
        }
    };

    let stats = tracker.get_ranking_statistics();
    info!(
        comparisons = stats.comparison_count,
        confidence = stats.ranking_confidence,
        fitted = stats.model_fitted,
        "Ranking finished"
    );

    if args.json {
        output::print_json(&stats, &sort_order);
    } else {
        output::print_table(&stats, &sort_order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items_lines_and_json() {
        assert_eq!(parse_items_from_str("a\n\n  b \n"), vec!["a", "b"]);
        assert_eq!(parse_items_from_str(r#"["x", " ", "y"]"#), vec!["x", "y"]);
    }

    #[test]
    fn test_parse_pivot_and_oracle() {
        assert_eq!(parse_pivot(None, Some(3)), PivotStrategy::First);
        assert_eq!(parse_pivot(Some("random"), Some(3)), PivotStrategy::Random { seed: Some(3) });
        assert_eq!(parse_oracle_kind(Some("simulated")), OracleKind::Simulated);
        assert_eq!(parse_oracle_kind(None), OracleKind::Interactive);
    }

    #[test]
    fn test_simulated_sort_records_into_tracker() {
        let items: Vec<String> = ["kick", "snare", "hat", "tom"].iter().map(|s| s.to_string()).collect();
        let strengths: HashMap<String, f64> =
            items.iter().cloned().zip([8.0, 4.0, 2.0, 1.0]).collect();
        let tracker = RankingTracker::new(&items).unwrap();

        let sorted = sort_with(SimulatedOracle::new(strengths, 0.0, Some(1)), PivotStrategy::First, &items, &tracker);

        assert_eq!(sorted.len(), 4);
        assert!(tracker.get_comparison_count() >= 3);
        let stats = tracker.get_ranking_statistics();
        assert_eq!(stats.records.iter().map(|(_, r)| r.total()).sum::<usize>(), 2 * stats.comparison_count);
    }
}
