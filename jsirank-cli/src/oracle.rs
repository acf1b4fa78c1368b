/// Terminal-side comparison oracles: a simulated one for demos and a human one.
use jsirank_core::{ComparisonOracle, FallibleOracle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::bail;

/// Strength assumed for items missing from the strengths file.
pub const DEFAULT_STRENGTH: f64 = 1.0;

/// Decides by Bradley-Terry probability from known strengths, blended with a coin flip.
///
/// `noise_level` 0.0 follows the strengths exactly, 1.0 is pure chance.
pub struct SimulatedOracle {
    strengths: HashMap<String, f64>,
    noise_level: f64,
    rng: StdRng,
}

impl SimulatedOracle {
    pub fn new(strengths: HashMap<String, f64>, noise_level: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        SimulatedOracle {
            strengths,
            noise_level: noise_level.clamp(0.0, 1.0),
            rng,
        }
    }

    fn strength(&self, item: &str) -> f64 {
        self.strengths.get(item).copied().unwrap_or(DEFAULT_STRENGTH)
    }

    /// Probability that `item_a` wins, after noise.
    pub fn win_probability(&self, item_a: &str, item_b: &str) -> f64 {
        let (s_a, s_b) = (self.strength(item_a), self.strength(item_b));
        let p = s_a / (s_a + s_b);
        (1.0 - self.noise_level) * p + self.noise_level * 0.5
    }
}

impl ComparisonOracle<String> for SimulatedOracle {
    fn compare(&mut self, item_a: &String, item_b: &String) -> bool {
        let p = self.win_probability(item_a, item_b);
        self.rng.random::<f64>() < p
    }
}

/// Asks a person which of two items is better, reading `1` or `2`.
pub struct InteractiveOracle<R, W> {
    input: R,
    output: W,
    asked: usize,
}

impl<R: BufRead, W: Write> InteractiveOracle<R, W> {
    pub fn new(input: R, output: W) -> Self {
        InteractiveOracle { input, output, asked: 0 }
    }
}

impl<R: BufRead, W: Write> FallibleOracle<String> for InteractiveOracle<R, W> {
    type Error = io::Error;

    fn try_compare(&mut self, item_a: &String, item_b: &String) -> Result<bool, io::Error> {
        self.asked += 1;
        loop {
            write!(
                self.output,
                "[{}] Which is better? (1) {item_a} or (2) {item_b} [1/2]: ",
                self.asked
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
            }
            match line.trim() {
                "1" => return Ok(true),
                "2" => return Ok(false),
                _ => writeln!(self.output, "Please enter 1 or 2")?,
            }
        }
    }
}

/// Parse a strengths map from JSON (`{"a": 2.0}`) or TOML (`a = 2.0`).
pub fn parse_strengths(content: &str) -> Result<HashMap<String, f64>, String> {
    let trimmed = content.trim();
    let strengths: HashMap<String, f64> = if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON strengths: {e}"))?
    } else {
        toml::from_str(trimmed).map_err(|e| format!("invalid TOML strengths: {e}"))?
    };

    if let Some((item, s)) = strengths.iter().find(|(_, s)| !(s.is_finite() && **s > 0.0)) {
        return Err(format!("strength for \"{item}\" must be a positive number, got {s}"));
    }
    Ok(strengths)
}

pub fn load_strengths(path: &Path) -> HashMap<String, f64> {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| bail(format!("Failed to read strengths file {}: {e}", path.display())));
    parse_strengths(&content).unwrap_or_else(|e| bail(format!("{}: {e}", path.display())))
}
