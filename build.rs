use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

/// Each pack entry needs a `name` and a rectangular `rows` matrix of square codes.
fn check_level_pack(content: &str) -> Result<(), String> {
    let pack: Value = serde_json::from_str(content).map_err(|e| format!("not valid JSON: {e}"))?;
    let levels = pack.as_array().ok_or("expected a JSON array of levels")?;
    for (index, level) in levels.iter().enumerate() {
        let label = level
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("level #{index} has no string `name`"))?;
        let rows = level
            .get("rows")
            .and_then(Value::as_array)
            .filter(|rows| !rows.is_empty())
            .ok_or_else(|| format!("level '{label}' has no `rows`"))?;
        let mut width = None;
        for row in rows {
            let cells = row
                .as_array()
                .ok_or_else(|| format!("level '{label}' has a row that is not an array"))?;
            if cells.iter().any(|c| c.as_u64().map_or(true, |code| code > 3)) {
                return Err(format!("level '{label}' has a square code outside 0..=3"));
            }
            if *width.get_or_insert(cells.len()) != cells.len() {
                return Err(format!("level '{label}' is not rectangular"));
            }
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-env-changed=MAZE_EMBED_LEVELS_PATH");
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let out_path = Path::new(&out_dir).join("maze_embedded_levels.json");

    let content = match env::var("MAZE_EMBED_LEVELS_PATH") {
        Ok(path) => {
            println!("cargo:rerun-if-changed={path}");
            let content = fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("cannot read level pack {path}: {e}"));
            if let Err(e) = check_level_pack(&content) {
                panic!("level pack {path} rejected: {e}");
            }
            content
        }
        Err(_) => "[]".to_string(),
    };

    fs::write(out_path, content).expect("failed to write embedded level pack");
}
