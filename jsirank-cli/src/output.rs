/// Output formatting: terminal table and JSON.
use jsirank_core::{softmax_strengths, RankingStatistics, WinLoss};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Serialize, Debug)]
struct JsonRankedItem {
    rank: usize,
    name: String,
    strength: Option<f64>,
    share: Option<f64>,
    wins: usize,
    losses: usize,
}

#[derive(Serialize, Debug)]
struct JsonOutput {
    items: Vec<JsonRankedItem>,
    sort_order: Vec<String>,
    total_comparisons: usize,
    confidence: f64,
    model_fitted: bool,
}

fn build_output(stats: &RankingStatistics<String>, sort_order: &[String]) -> JsonOutput {
    let records: HashMap<&str, WinLoss> = stats.records.iter().map(|(name, r)| (name.as_str(), *r)).collect();
    let (strengths, shares): (HashMap<&str, f64>, HashMap<&str, f64>) = match &stats.strengths {
        Some(pairs) => {
            let values: Vec<f64> = pairs.iter().map(|(_, s)| *s).collect();
            let shares = softmax_strengths(&values, 1.0);
            (
                pairs.iter().map(|(name, s)| (name.as_str(), *s)).collect(),
                pairs.iter().map(|(name, _)| name.as_str()).zip(shares).collect(),
            )
        }
        None => (HashMap::new(), HashMap::new()),
    };

    let items = stats
        .ranking
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let record = records.get(name.as_str()).copied().unwrap_or_default();
            JsonRankedItem {
                rank: i + 1,
                name: name.clone(),
                strength: strengths.get(name.as_str()).copied(),
                share: shares.get(name.as_str()).copied(),
                wins: record.wins,
                losses: record.losses,
            }
        })
        .collect();

    JsonOutput {
        items,
        sort_order: sort_order.to_vec(),
        total_comparisons: stats.comparison_count,
        confidence: stats.ranking_confidence,
        model_fitted: stats.model_fitted,
    }
}

/// Print results as a formatted terminal table.
pub fn print_table(stats: &RankingStatistics<String>, sort_order: &[String]) {
    let output = build_output(stats, sort_order);

    // Find the widest item name for padding
    let name_width = output.items.iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(4)
        .max(4); // at least "Item"

    // Header
    println!(" # | {:<name_width$} | Strength |  Share | Wins | Losses", "Item");
    println!("---|-{}-|----------|--------|------|-------", "-".repeat(name_width));

    // Rows
    for r in &output.items {
        let strength = r.strength.map_or_else(|| "-".to_string(), |s| format!("{s:.4}"));
        let share = r.share.map_or_else(|| "-".to_string(), |s| format!("{:.1}%", s * 100.0));
        println!(
            "{:>2} | {:<name_width$} | {:>8} | {:>6} | {:>4} | {:>6}",
            r.rank, r.name, strength, share, r.wins, r.losses,
        );
    }

    println!("\nSort order: {}", output.sort_order.join(" > "));
    println!(
        "{} items ranked with {} comparisons (confidence {:.2}{})",
        output.items.len(),
        output.total_comparisons,
        output.confidence,
        if output.model_fitted { "" } else { ", ranked by win rate" },
    );
}

/// Print results as JSON.
pub fn print_json(stats: &RankingStatistics<String>, sort_order: &[String]) {
    let output = build_output(stats, sort_order);
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{json}"),
        Err(e) => crate::bail(format!("Failed to serialize results: {e}")),
    }
}
