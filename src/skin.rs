use serde::{Deserialize, Serialize};

/// How the agent reacts to running into a wall.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashType {
    /// Bounce against the wall twice.
    #[default]
    Stop,
    Spin,
    /// Spin away while accelerating downwards.
    Fall,
}

fn default_look_colour() -> String {
    "#000".to_string()
}

fn default_win_sound() -> Vec<String> {
    vec!["maze/win.mp3".to_string(), "maze/win.ogg".to_string()]
}

fn default_crash_sound() -> Vec<String> {
    vec![
        "maze/fail_pegman.mp3".to_string(),
        "maze/fail_pegman.ogg".to_string(),
    ]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    pub name: String,
    #[serde(default)]
    pub crash_type: CrashType,
    #[serde(default = "default_look_colour")]
    pub look_colour: String,
    #[serde(default = "default_win_sound")]
    pub win_sound: Vec<String>,
    #[serde(default = "default_crash_sound")]
    pub crash_sound: Vec<String>,
}

impl Default for Skin {
    fn default() -> Self {
        Self {
            name: "xiaoc".to_string(),
            crash_type: CrashType::Stop,
            look_colour: default_look_colour(),
            win_sound: default_win_sound(),
            crash_sound: default_crash_sound(),
        }
    }
}

impl Skin {
    pub fn load_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read skin {}: {}", path, e))?;
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse skin {}: {}", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_skin_json_fills_defaults() {
        let skin: Skin = serde_json::from_str(r#"{"name":"astro","crash_type":"fall"}"#).unwrap();
        assert_eq!(skin.crash_type, CrashType::Fall);
        assert_eq!(skin.look_colour, "#000");
        assert_eq!(skin.win_sound.len(), 2);
        assert_eq!(Skin::default().crash_type, CrashType::Stop);
    }
}
