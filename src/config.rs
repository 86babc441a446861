use serde::{Deserialize, Serialize};

use crate::scripting::{DEFAULT_RHAI_MAX_CALL_LEVELS, DEFAULT_TICK_BUDGET};
use crate::skin::Skin;

pub const DEFAULT_STEP_SPEED_MS: u64 = 150;
/// Upper bound on the frame step; keeps replay timestamps far from overflow.
pub const MAX_STEP_SPEED_MS: u64 = 60_000;

fn default_tick_budget() -> u64 {
    DEFAULT_TICK_BUDGET
}

fn default_step_speed_ms() -> u64 {
    DEFAULT_STEP_SPEED_MS
}

fn default_max_call_levels() -> usize {
    DEFAULT_RHAI_MAX_CALL_LEVELS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MazeConfig {
    #[serde(default = "default_tick_budget")]
    pub tick_budget: u64,
    /// Milliseconds per animation frame; one record takes five.
    #[serde(default = "default_step_speed_ms")]
    pub step_speed_ms: u64,
    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,
    #[serde(default)]
    pub skin: Skin,
    /// Fixed seed for crash animations. Random when unset.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            tick_budget: DEFAULT_TICK_BUDGET,
            step_speed_ms: DEFAULT_STEP_SPEED_MS,
            max_call_levels: DEFAULT_RHAI_MAX_CALL_LEVELS,
            skin: Skin::default(),
            rng_seed: None,
        }
    }
}

impl MazeConfig {
    /// `maze.json` (or `$MAZE_CONFIG`), then environment overrides.
    /// A missing file means defaults; an unreadable or malformed one is an error.
    pub fn load() -> Result<Self, String> {
        let path = std::env::var("MAZE_CONFIG")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "maze.json".to_string());
        let mut config = Self::load_file(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_file(path: &str) -> Result<Self, String> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MazeConfig::default()),
            Err(e) => return Err(format!("Failed to read config {}: {}", path, e)),
        };
        let config = serde_json::from_str::<MazeConfig>(&contents)
            .map_err(|e| format!("Failed to parse config {}: {}", path, e))?;
        eprintln!("[Maze] Loaded config from {}", path);
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(budget) = env_parse::<u64>(&lookup, "MAZE_TICK_BUDGET") {
            self.tick_budget = budget;
        }
        if let Some(speed) = env_parse::<u64>(&lookup, "MAZE_STEP_SPEED_MS") {
            self.step_speed_ms = speed;
        }
        if let Some(levels) = env_parse::<usize>(&lookup, "MAZE_RHAI_MAX_CALL_LEVELS") {
            self.max_call_levels = levels;
        }
        self.tick_budget = self.tick_budget.max(100);
        self.step_speed_ms = self.step_speed_ms.clamp(1, MAX_STEP_SPEED_MS);
        self.max_call_levels = self.max_call_levels.max(8);
    }
}

fn env_parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse::<T>().ok())
}
