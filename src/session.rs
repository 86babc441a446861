use bevy::log::info;
use bevy::prelude::Resource;

use crate::config::MazeConfig;
use crate::execution::{ExecutionDriver, ExecutionOutcome};
use crate::levels::Level;
use crate::replay::{Directive, ReplayScheduler};
use crate::scripting::{RhaiRuntime, ScriptRuntime};

/// One level, its execution driver and the replay of the latest run.
///
/// A fresh script engine is built for every run, so the session itself holds
/// no interpreter state between runs.
#[derive(Resource)]
pub struct MazeSession {
    level: Level,
    driver: ExecutionDriver,
    replay: ReplayScheduler,
    last_outcome: Option<ExecutionOutcome>,
    last_transcript: Option<serde_json::Value>,
}

impl MazeSession {
    pub fn new(level: Level, config: &MazeConfig) -> Self {
        Self::with_runtime(level, Box::new(RhaiRuntime::new(config.max_call_levels)), config)
    }

    pub fn with_runtime(level: Level, runtime: Box<dyn ScriptRuntime>, config: &MazeConfig) -> Self {
        let replay = ReplayScheduler::new(&level, config.step_speed_ms, &config.skin, config.rng_seed);
        Self {
            driver: ExecutionDriver::new(runtime, config.tick_budget),
            replay,
            level,
            last_outcome: None,
            last_transcript: None,
        }
    }

    /// First presentation of the level, with the opening turn.
    pub fn open(&mut self) -> Vec<Directive> {
        info!("[Maze] opened '{}'", self.level.name);
        self.replay.reset(true)
    }

    /// Execute `program` to completion, then reset the board and arm replay.
    /// Returns the redraw directives for the reset.
    pub fn run(&mut self, program: &str) -> Vec<Directive> {
        let report = self.driver.run(&self.level, program);
        self.last_outcome = Some(report.outcome);
        self.last_transcript = Some(report.log.to_json());
        let redraw = self.replay.reset(false);
        self.replay.start(report.log);
        redraw
    }

    pub fn reset(&mut self) -> Vec<Directive> {
        self.replay.reset(false)
    }

    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<Directive> {
        self.replay.advance(elapsed_ms)
    }

    pub fn is_idle(&self) -> bool {
        self.replay.is_idle()
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn replay(&self) -> &ReplayScheduler {
        &self.replay
    }

    pub fn last_outcome(&self) -> Option<&ExecutionOutcome> {
        self.last_outcome.as_ref()
    }

    /// JSON transcript of the latest run, as it stood before replay.
    pub fn last_transcript(&self) -> Option<&serde_json::Value> {
        self.last_transcript.as_ref()
    }

    pub fn driver(&self) -> &ExecutionDriver {
        &self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionError;
    use crate::levels;

    fn session(level: usize) -> MazeSession {
        let config = MazeConfig {
            rng_seed: Some(3),
            ..MazeConfig::default()
        };
        MazeSession::new(levels::builtin(level).unwrap(), &config)
    }

    fn drain(session: &mut MazeSession) -> Vec<Directive> {
        let mut out = Vec::new();
        while !session.is_idle() {
            out.extend(session.advance(50));
        }
        out
    }

    #[test]
    fn run_then_replay_reaches_one_of_two_finishes() {
        let mut session = session(1);
        session.open();
        session.run("moveEast(); moveEast();");
        assert_eq!(session.last_outcome(), Some(&ExecutionOutcome::Unset));
        drain(&mut session);
        assert_eq!(session.replay().remaining_finish_count(), 1);

        let transcript = session.last_transcript().unwrap();
        assert_eq!(transcript.as_array().map(Vec::len), Some(3));
        assert_eq!(transcript[2]["type"], "check");
    }

    #[test]
    fn rerun_discards_the_previous_replay() {
        let mut session = session(1);
        session.run("while notDone() { moveEast(); }");
        session.advance(1_000);

        session.run("moveNorth();");
        assert_eq!(session.replay().remaining_finish_count(), 2);
        let directives = drain(&mut session);
        assert!(!directives.contains(&Directive::Victory));
        assert_eq!(session.replay().display_pose().cell, crate::maze::Cell::new(2, 3));
    }

    #[test]
    fn blocked_run_is_reported_and_still_replayed() {
        let mut session = session(3);
        session.run("moveWest();");
        assert_eq!(
            session.last_outcome(),
            Some(&ExecutionOutcome::Error(ExecutionError::Blocked))
        );
        assert!(!session.is_idle());
        drain(&mut session);
        assert!(session.reset().contains(&Directive::HideLookSensor));
    }
}
