use bevy::log::{debug, info};
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Position};

use crate::maze::Direction;
use crate::scripting::js_compat::transpile_block_js_to_rhai;
use crate::scripting::{MazeHost, ScriptRuntime, ScriptSignal, DEFAULT_RHAI_MAX_CALL_LEVELS};

const BLOCKED_TOKEN: &str = "__maze_blocked";
const TIMEOUT_TOKEN: &str = "__maze_timeout";

const CAPABILITIES: [(&str, &str, Direction); 4] = [
    ("moveNorth", "isPathNorth", Direction::North),
    ("moveEast", "isPathEast", Direction::East),
    ("moveSouth", "isPathSouth", Direction::South),
    ("moveWest", "isPathWest", Direction::West),
];

/// Rhai sandbox. One interpreter operation is one tick.
#[derive(Clone, Debug)]
pub struct RhaiRuntime {
    pub max_call_levels: usize,
}

impl Default for RhaiRuntime {
    fn default() -> Self {
        Self {
            max_call_levels: DEFAULT_RHAI_MAX_CALL_LEVELS,
        }
    }
}

impl RhaiRuntime {
    pub fn new(max_call_levels: usize) -> Self {
        Self {
            max_call_levels: max_call_levels.max(8),
        }
    }

    fn make_engine(&self, host: &MazeHost, tick_budget: u64) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_call_levels(self.max_call_levels);
        engine.disable_symbol("eval");
        engine.on_print(|text| info!("[Maze script] {}", text));
        engine.on_debug(|text, _source, pos| debug!("[Maze script] {} @ {}", text, pos));

        let budget_host = host.clone();
        engine.on_progress(move |ticks| {
            if ticks > tick_budget {
                budget_host.halt(ScriptSignal::Timeout);
                Some(Dynamic::from(TIMEOUT_TOKEN.to_string()))
            } else {
                None
            }
        });

        register_capabilities(&mut engine, host);
        engine
    }
}

impl ScriptRuntime for RhaiRuntime {
    fn name(&self) -> &'static str {
        "rhai"
    }

    fn execute(&self, program: &str, host: &MazeHost, tick_budget: u64) -> Result<(), ScriptSignal> {
        let engine = self.make_engine(host, tick_budget);
        let source = transpile_block_js_to_rhai(program).unwrap_or_else(|| program.to_string());
        let ast = engine
            .compile(&source)
            .map_err(|e| ScriptSignal::Other(format!("Script failed to compile: {}", e)))?;
        engine
            .run_ast(&ast)
            .map_err(|err| classify_error(*err))
    }
}

fn register_capabilities(engine: &mut Engine, host: &MazeHost) {
    let h = host.clone();
    engine.register_fn("notDone", move || to_rhai(h.not_done()));

    for (move_name, look_name, direction) in CAPABILITIES {
        let h = host.clone();
        engine.register_fn(move_name, move |block_id: ImmutableString| {
            to_rhai(h.move_agent(direction, Some(block_id.as_str())))
        });
        let h = host.clone();
        engine.register_fn(move_name, move || to_rhai(h.move_agent(direction, None)));

        let h = host.clone();
        engine.register_fn(look_name, move |block_id: ImmutableString| {
            to_rhai(h.is_path(direction, Some(block_id.as_str())))
        });
        let h = host.clone();
        engine.register_fn(look_name, move || to_rhai(h.is_path(direction, None)));
    }
}

/// Capability failures become `ErrorTerminated`, which `try`/`catch` cannot intercept.
fn to_rhai<T>(result: Result<T, ScriptSignal>) -> Result<T, Box<EvalAltResult>> {
    result.map_err(|signal| {
        let token = match signal {
            ScriptSignal::Blocked => BLOCKED_TOKEN.to_string(),
            ScriptSignal::Timeout => TIMEOUT_TOKEN.to_string(),
            ScriptSignal::Other(message) => message,
        };
        Box::new(EvalAltResult::ErrorTerminated(
            Dynamic::from(token),
            Position::NONE,
        ))
    })
}

fn classify_error(err: EvalAltResult) -> ScriptSignal {
    match err {
        EvalAltResult::ErrorTerminated(token, _) => {
            let token = token.try_cast::<ImmutableString>();
            match token.as_ref().map(|t| t.as_str()) {
                Some(BLOCKED_TOKEN) => ScriptSignal::Blocked,
                Some(TIMEOUT_TOKEN) => ScriptSignal::Timeout,
                Some(other) => ScriptSignal::Other(other.to_string()),
                None => ScriptSignal::Other("Script terminated".to_string()),
            }
        }
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => classify_error(*inner),
        other => ScriptSignal::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_log::CommandKind;
    use crate::levels;
    use crate::maze::{Cell, WorldModel};

    fn run(program: &str, budget: u64) -> (Result<(), ScriptSignal>, MazeHost) {
        let level = levels::builtin(1).unwrap();
        let host = MazeHost::new(WorldModel::new(level.grid, level.start_direction));
        let result = RhaiRuntime::default().execute(program, &host, budget);
        (result, host)
    }

    #[test]
    fn rhai_program_drives_the_host() {
        let (result, host) = run(r#"moveEast("b1"); moveEast();"#, 10_000);
        assert_eq!(result, Ok(()));
        assert_eq!(host.world().pose().cell, Cell::new(4, 4));
        assert_eq!(host.recorded_calls(), 2);
    }

    #[test]
    fn blocked_move_terminates_even_inside_try_catch() {
        let program = r#"
try {
    moveNorth(); moveNorth(); moveNorth(); moveNorth();
} catch (err) {
    moveSouth();
}
moveSouth();
"#;
        let (result, host) = run(program, 10_000);
        assert_eq!(result, Err(ScriptSignal::Blocked));
        assert_eq!(host.world().pose().cell, Cell::new(2, 1));
        let (_, log) = host.into_parts();
        assert_eq!(log.kinds().last(), Some(&CommandKind::FailForward));
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn blocked_move_inside_script_function_is_still_blocked() {
        let program = r#"
fn run_west() { moveWest(); moveWest(); }
run_west();
"#;
        let (result, _) = run(program, 10_000);
        assert_eq!(result, Err(ScriptSignal::Blocked));
    }

    #[test]
    fn endless_loop_hits_the_tick_budget() {
        let (result, host) = run("let x = 0; loop { x += 1; }", 500);
        assert_eq!(result, Err(ScriptSignal::Timeout));
        assert_eq!(host.halted(), Some(ScriptSignal::Timeout));
    }

    #[test]
    fn while_not_done_stops_after_last_finish() {
        let program = "while notDone() { moveEast(); }";
        let (result, host) = run(program, 10_000);
        assert_eq!(result, Ok(()));
        assert_eq!(host.world().pose().cell, Cell::new(5, 4));
        assert_eq!(host.recorded_calls(), 3);
    }

    #[test]
    fn syntax_errors_are_reported_as_other() {
        let (result, _) = run("moveEast(", 10_000);
        assert!(matches!(result, Err(ScriptSignal::Other(msg)) if msg.contains("compile")));
    }

    #[test]
    fn eval_is_not_available_to_programs() {
        let (result, host) = run(r#"eval("moveEast()");"#, 10_000);
        assert!(matches!(result, Err(ScriptSignal::Other(_))));
        assert_eq!(host.recorded_calls(), 0);
    }

    #[test]
    fn block_generated_javascript_runs() {
        let program = "moveEast('a#1');\nif (isPathNorth('b')) {\n  moveNorth('c');\n}\n";
        let (result, host) = run(program, 10_000);
        assert_eq!(result, Ok(()));
        assert_eq!(host.world().pose().cell, Cell::new(3, 3));
        let (_, log) = host.into_parts();
        assert_eq!(log.iter().next().and_then(|r| r.block_id.as_deref()), Some("a#1"));
    }
}
