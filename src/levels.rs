use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::maze::{Direction, Grid};

pub const BUILTIN_LEVEL_COUNT: usize = 10;

/// Optional level pack embedded at build time (see build.rs).
const EMBEDDED_LEVELS_JSON: &str =
    include_str!(concat!(env!("OUT_DIR"), "/maze_embedded_levels.json"));

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelDef {
    pub name: String,
    #[serde(default)]
    pub start_direction: Direction,
    pub rows: Vec<Vec<u8>>,
}

#[derive(Clone, Debug)]
pub struct Level {
    pub name: String,
    pub grid: Arc<Grid>,
    pub start_direction: Direction,
}

impl Level {
    pub fn from_def(def: LevelDef) -> Result<Self, String> {
        let grid = Grid::from_rows(&def.rows).map_err(|e| format!("Level '{}': {}", def.name, e))?;
        Ok(Self {
            name: def.name,
            grid: Arc::new(grid),
            start_direction: def.start_direction,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let def: LevelDef = serde_json::from_str(json).map_err(|e| e.to_string())?;
        Self::from_def(def)
    }

    pub fn load_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read maze file {}: {}", path, e))?;
        Self::from_json(&contents)
    }
}

// Square codes: 0 wall, 1 open, 2 start, 3 finish.
const LEVEL_1: &[&[u8]] = &[
    &[0, 0, 0, 0, 0, 0, 0],
    &[0, 1, 1, 1, 1, 1, 0],
    &[0, 1, 1, 1, 1, 1, 0],
    &[0, 1, 1, 1, 1, 1, 0],
    &[0, 1, 2, 3, 1, 3, 0],
    &[0, 1, 1, 1, 1, 1, 0],
    &[0, 0, 0, 0, 0, 0, 0],
];

const LEVEL_2: &[&[u8]] = &[
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 1, 3, 0, 0, 0],
    &[0, 0, 2, 1, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
];

const LEVEL_3: &[&[u8]] = &[
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 2, 1, 1, 1, 1, 3, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
];

// The path runs past both the start and the goal.
const LEVEL_4: &[&[u8]] = &[
    &[0, 0, 0, 0, 0, 0, 0, 1],
    &[0, 0, 0, 0, 0, 0, 1, 1],
    &[0, 0, 0, 0, 0, 3, 1, 0],
    &[0, 0, 0, 0, 1, 1, 0, 0],
    &[0, 0, 0, 1, 1, 0, 0, 0],
    &[0, 0, 1, 1, 0, 0, 0, 0],
    &[0, 2, 1, 0, 0, 0, 0, 0],
    &[1, 1, 0, 0, 0, 0, 0, 0],
];

const LEVEL_5: &[&[u8]] = &[
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 3, 0, 0],
    &[0, 0, 0, 0, 0, 1, 0, 0],
    &[0, 0, 0, 0, 0, 1, 0, 0],
    &[0, 0, 0, 0, 0, 1, 0, 0],
    &[0, 0, 0, 0, 0, 1, 0, 0],
    &[0, 0, 0, 2, 1, 1, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
];

const LEVEL_6: &[&[u8]] = &[
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 1, 1, 1, 1, 1, 0, 0],
    &[0, 1, 0, 0, 0, 1, 0, 0],
    &[0, 1, 1, 3, 0, 1, 0, 0],
    &[0, 0, 0, 0, 0, 1, 0, 0],
    &[0, 2, 1, 1, 1, 1, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
];

const LEVEL_7: &[&[u8]] = &[
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 1, 1, 0],
    &[0, 2, 1, 1, 1, 1, 0, 0],
    &[0, 0, 0, 0, 0, 1, 1, 0],
    &[0, 1, 1, 3, 0, 1, 0, 0],
    &[0, 1, 0, 1, 0, 1, 0, 0],
    &[0, 1, 1, 1, 1, 1, 1, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
];

const LEVEL_8: &[&[u8]] = &[
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 1, 1, 1, 1, 0, 0, 0],
    &[0, 1, 0, 0, 1, 1, 0, 0],
    &[0, 1, 1, 1, 0, 1, 0, 0],
    &[0, 0, 0, 1, 0, 1, 0, 0],
    &[0, 2, 1, 1, 0, 3, 0, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
];

const LEVEL_9: &[&[u8]] = &[
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 1, 1, 1, 1, 1, 0, 0],
    &[0, 0, 1, 0, 0, 0, 0, 0],
    &[3, 1, 1, 1, 1, 1, 1, 0],
    &[0, 1, 0, 1, 0, 1, 1, 0],
    &[1, 1, 1, 1, 1, 0, 1, 0],
    &[0, 1, 0, 1, 0, 2, 1, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
];

const LEVEL_10: &[&[u8]] = &[
    &[0, 0, 0, 0, 0, 0, 0, 0],
    &[0, 1, 1, 0, 3, 0, 1, 0],
    &[0, 1, 1, 0, 1, 1, 1, 0],
    &[0, 1, 0, 1, 0, 1, 0, 0],
    &[0, 1, 1, 1, 1, 1, 1, 0],
    &[0, 0, 0, 1, 0, 0, 1, 0],
    &[0, 2, 1, 1, 1, 0, 1, 0],
    &[0, 0, 0, 0, 0, 0, 0, 0],
];

const BUILTIN_MAPS: [&[&[u8]]; BUILTIN_LEVEL_COUNT] = [
    LEVEL_1, LEVEL_2, LEVEL_3, LEVEL_4, LEVEL_5, LEVEL_6, LEVEL_7, LEVEL_8, LEVEL_9, LEVEL_10,
];

/// One of the shipped levels, numbered from 1.
pub fn builtin(number: usize) -> Result<Level, String> {
    let map = number
        .checked_sub(1)
        .and_then(|idx| BUILTIN_MAPS.get(idx))
        .ok_or_else(|| {
            format!(
                "No built-in level {} (expected 1..={})",
                number, BUILTIN_LEVEL_COUNT
            )
        })?;
    Level::from_def(LevelDef {
        name: format!("Level {}", number),
        start_direction: Direction::East,
        rows: map.iter().map(|row| row.to_vec()).collect(),
    })
}

pub fn embedded() -> Result<Vec<LevelDef>, String> {
    serde_json::from_str(EMBEDDED_LEVELS_JSON)
        .map_err(|e| format!("Embedded level pack is invalid: {}", e))
}

/// Built-in levels first, then any embedded pack entries.
pub fn by_number(number: usize) -> Result<Level, String> {
    if number <= BUILTIN_LEVEL_COUNT {
        return builtin(number);
    }
    let pack = embedded()?;
    let def = pack
        .get(number - BUILTIN_LEVEL_COUNT - 1)
        .cloned()
        .ok_or_else(|| {
            format!(
                "No level {} (have {} levels)",
                number,
                BUILTIN_LEVEL_COUNT + pack.len()
            )
        })?;
    Level::from_def(def)
}
