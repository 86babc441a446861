use bevy::log::{error, info};
use serde::Serialize;

use crate::command_log::{CommandKind, CommandLog};
use crate::levels::Level;
use crate::maze::WorldModel;
use crate::scripting::{MazeHost, ScriptRuntime, ScriptSignal};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ExecutionError {
    Blocked,
    Other(String),
}

/// Classification of one run, fixed before replay starts.
///
/// Execution never yields `Success` or `Failure`: a clean run is `Unset`,
/// and victory is only discovered by replay when the last finish marker is
/// consumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Unset,
    Success,
    Failure,
    Timeout,
    Error(ExecutionError),
}

impl ExecutionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionOutcome::Unset => "unset",
            ExecutionOutcome::Success => "success",
            ExecutionOutcome::Failure => "failure",
            ExecutionOutcome::Timeout => "timeout",
            ExecutionOutcome::Error(ExecutionError::Blocked) => "error (blocked)",
            ExecutionOutcome::Error(ExecutionError::Other(_)) => "error",
        }
    }
}

pub struct ExecutionReport {
    pub outcome: ExecutionOutcome,
    pub log: CommandLog,
    /// Logical world as the program left it.
    pub world: WorldModel,
    pub recorded_calls: usize,
}

pub struct ExecutionDriver {
    runtime: Box<dyn ScriptRuntime>,
    tick_budget: u64,
}

impl ExecutionDriver {
    pub fn new(runtime: Box<dyn ScriptRuntime>, tick_budget: u64) -> Self {
        Self {
            runtime,
            tick_budget: tick_budget.max(1),
        }
    }

    pub fn tick_budget(&self) -> u64 {
        self.tick_budget
    }

    pub fn runtime_name(&self) -> &'static str {
        self.runtime.name()
    }

    /// Run `program` against a fresh world for `level` and build its transcript.
    pub fn run(&self, level: &Level, program: &str) -> ExecutionReport {
        let host = MazeHost::new(WorldModel::new(level.grid.clone(), level.start_direction));
        let result = self.runtime.execute(program, &host, self.tick_budget);

        // The host latch is authoritative; a script may have swallowed the error.
        let signal = host.halted().or_else(|| result.err());
        let outcome = match signal {
            None => ExecutionOutcome::Unset,
            Some(ScriptSignal::Timeout) => ExecutionOutcome::Timeout,
            Some(ScriptSignal::Blocked) => ExecutionOutcome::Error(ExecutionError::Blocked),
            Some(ScriptSignal::Other(message)) => {
                error!(
                    "[Maze exec] {} program on '{}' terminated abnormally: {}",
                    self.runtime.name(),
                    level.name,
                    message
                );
                ExecutionOutcome::Error(ExecutionError::Other(message))
            }
        };

        let recorded_calls = host.recorded_calls();
        let (world, mut log) = host.into_parts();
        log.record(CommandKind::Check, None);

        info!(
            "[Maze exec] '{}' finished: outcome={} records={} remaining_finishes={}",
            level.name,
            outcome.label(),
            log.len(),
            world.remaining_finish_count()
        );

        ExecutionReport {
            outcome,
            log,
            world,
            recorded_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels;
    use crate::maze::{Cell, Direction};
    use crate::scripting::{RhaiRuntime, DEFAULT_TICK_BUDGET};

    /// Plays a fixed list of moves, one tick each.
    struct ScriptedRuntime {
        moves: Vec<Direction>,
        swallow_errors: bool,
    }

    impl ScriptRuntime for ScriptedRuntime {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn execute(&self, _program: &str, host: &MazeHost, tick_budget: u64) -> Result<(), ScriptSignal> {
            for (tick, direction) in self.moves.iter().enumerate() {
                if tick as u64 >= tick_budget {
                    host.halt(ScriptSignal::Timeout);
                    return Err(ScriptSignal::Timeout);
                }
                let moved = host.move_agent(*direction, None);
                if !self.swallow_errors {
                    moved?;
                }
            }
            Ok(())
        }
    }

    fn scripted(moves: Vec<Direction>, swallow_errors: bool, budget: u64) -> ExecutionDriver {
        ExecutionDriver::new(
            Box::new(ScriptedRuntime {
                moves,
                swallow_errors,
            }),
            budget,
        )
    }

    fn rhai_driver(budget: u64) -> ExecutionDriver {
        ExecutionDriver::new(Box::new(RhaiRuntime::default()), budget)
    }

    #[test]
    fn two_moves_east_on_level_one() {
        let level = levels::builtin(1).unwrap();
        let report = rhai_driver(DEFAULT_TICK_BUDGET).run(&level, "moveEast('a');\nmoveEast('b');\n");
        assert_eq!(report.outcome, ExecutionOutcome::Unset);
        assert_eq!(
            report.log.kinds(),
            vec![
                CommandKind::MoveTo { direction: Direction::East },
                CommandKind::MoveTo { direction: Direction::East },
                CommandKind::Check,
            ]
        );
        assert_eq!(report.world.pose().cell, Cell::new(4, 4));
    }

    #[test]
    fn move_into_edge_wall_is_blocked() {
        let level = levels::builtin(3).unwrap();
        let report = rhai_driver(DEFAULT_TICK_BUDGET).run(&level, "moveWest();");
        assert_eq!(report.outcome, ExecutionOutcome::Error(ExecutionError::Blocked));
        assert_eq!(
            report.log.kinds(),
            vec![CommandKind::FailForward, CommandKind::Check]
        );
        assert_eq!(report.world.pose().cell, level.grid.start());
    }

    #[test]
    fn every_blocked_direction_leaves_pose_unchanged() {
        let level = levels::builtin(3).unwrap();
        for (name, direction) in [
            ("moveNorth()", Direction::North),
            ("moveSouth()", Direction::South),
            ("moveWest()", Direction::West),
        ] {
            let report = rhai_driver(DEFAULT_TICK_BUDGET).run(&level, name);
            assert!(!report.world.is_path(direction));
            assert_eq!(report.outcome, ExecutionOutcome::Error(ExecutionError::Blocked));
            assert_eq!(report.world.pose().cell, level.grid.start());
        }
    }

    #[test]
    fn unconditional_loop_times_out() {
        let level = levels::builtin(1).unwrap();
        let report = rhai_driver(DEFAULT_TICK_BUDGET).run(&level, "while (true) { let a = 1; }");
        assert_eq!(report.outcome, ExecutionOutcome::Timeout);
        assert_eq!(report.log.kinds(), vec![CommandKind::Check]);
    }

    #[test]
    fn compile_errors_are_classified_as_other() {
        let level = levels::builtin(1).unwrap();
        let report = rhai_driver(DEFAULT_TICK_BUDGET).run(&level, "moveEast(;");
        assert!(matches!(
            report.outcome,
            ExecutionOutcome::Error(ExecutionError::Other(_))
        ));
        assert_eq!(report.log.kinds(), vec![CommandKind::Check]);
    }

    #[test]
    fn completed_run_stays_unset_even_when_solved() {
        let level = levels::builtin(1).unwrap();
        let report = rhai_driver(DEFAULT_TICK_BUDGET).run(&level, "while notDone() { moveEast(); }");
        assert_eq!(report.outcome, ExecutionOutcome::Unset);
        assert!(report.world.all_finishes_consumed());
    }

    #[test]
    fn log_length_matches_recording_calls_plus_check() {
        let level = levels::builtin(1).unwrap();
        let program = r#"
moveNorth();
if isPathEast() { moveEast(); }
if notDone() { moveSouth(); }
moveWest();
"#;
        let report = rhai_driver(DEFAULT_TICK_BUDGET).run(&level, program);
        assert_eq!(report.outcome, ExecutionOutcome::Unset);
        assert_eq!(report.recorded_calls, 5);
        assert_eq!(report.log.len(), report.recorded_calls + 1);
    }

    #[test]
    fn swallowed_blocked_signal_still_counts_as_error() {
        let level = levels::builtin(3).unwrap();
        let driver = scripted(vec![Direction::North, Direction::East], true, 100);
        let report = driver.run(&level, "");
        assert_eq!(report.outcome, ExecutionOutcome::Error(ExecutionError::Blocked));
        assert_eq!(
            report.log.kinds(),
            vec![CommandKind::FailForward, CommandKind::Check]
        );
    }

    #[test]
    fn scripted_runtime_respects_budget() {
        let level = levels::builtin(3).unwrap();
        let driver = scripted(vec![Direction::East; 4], false, 2);
        let report = driver.run(&level, "");
        assert_eq!(report.outcome, ExecutionOutcome::Timeout);
        assert_eq!(report.log.len(), 3);
        assert_eq!(report.world.pose().cell, Cell::new(3, 4));
    }
}
