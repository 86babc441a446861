use std::cell::RefCell;
use std::rc::Rc;

use bevy::log::debug;

use crate::command_log::{CommandKind, CommandLog};
use crate::maze::{Direction, WorldModel};
use crate::scripting::ScriptSignal;

#[derive(Clone)]
struct HostState {
    world: WorldModel,
    log: CommandLog,
    halted: Option<ScriptSignal>,
    recorded_calls: usize,
}

/// Capability surface handed to the sandbox for one run.
///
/// Every capability appends at most one record. A blocked move latches the
/// host: later calls fail with the same signal and record nothing, so a
/// script cannot keep going after it crashed.
#[derive(Clone)]
pub struct MazeHost {
    state: Rc<RefCell<HostState>>,
}

impl MazeHost {
    pub fn new(world: WorldModel) -> Self {
        Self {
            state: Rc::new(RefCell::new(HostState {
                world,
                log: CommandLog::new(),
                halted: None,
                recorded_calls: 0,
            })),
        }
    }

    /// `notDone()`: whether any finish is still unconsumed in the logical world.
    pub fn not_done(&self) -> Result<bool, ScriptSignal> {
        let state = self.state.borrow();
        if let Some(signal) = &state.halted {
            return Err(signal.clone());
        }
        Ok(!state.world.all_finishes_consumed())
    }

    /// `moveNorth|East|South|West(blockId)`.
    pub fn move_agent(&self, direction: Direction, block_id: Option<&str>) -> Result<(), ScriptSignal> {
        let mut state = self.state.borrow_mut();
        if let Some(signal) = &state.halted {
            return Err(signal.clone());
        }
        state.recorded_calls += 1;
        match state.world.move_agent(direction) {
            Ok(_) => {
                state.log.record(CommandKind::MoveTo { direction }, block_id);
                state.world.check_finish();
                Ok(())
            }
            Err(reason) => {
                debug!("[Maze exec] {}", reason);
                state.log.record(CommandKind::FailForward, block_id);
                state.halted = Some(ScriptSignal::Blocked);
                Err(ScriptSignal::Blocked)
            }
        }
    }

    /// `isPathNorth|East|South|West(blockId)`.
    pub fn is_path(&self, direction: Direction, block_id: Option<&str>) -> Result<bool, ScriptSignal> {
        let mut state = self.state.borrow_mut();
        if let Some(signal) = &state.halted {
            return Err(signal.clone());
        }
        state.recorded_calls += 1;
        state.log.record(CommandKind::LookAt { direction }, block_id);
        Ok(state.world.is_path(direction))
    }

    /// Latch an abnormal termination raised outside a capability call.
    /// The first signal wins.
    pub fn halt(&self, signal: ScriptSignal) {
        let mut state = self.state.borrow_mut();
        if state.halted.is_none() {
            state.halted = Some(signal);
        }
    }

    pub fn halted(&self) -> Option<ScriptSignal> {
        self.state.borrow().halted.clone()
    }

    /// Capability calls that appended a record.
    pub fn recorded_calls(&self) -> usize {
        self.state.borrow().recorded_calls
    }

    pub fn world(&self) -> WorldModel {
        self.state.borrow().world.clone()
    }

    pub fn into_parts(self) -> (WorldModel, CommandLog) {
        let state = Rc::try_unwrap(self.state)
            .map(RefCell::into_inner)
            .unwrap_or_else(|shared| shared.borrow().clone());
        (state.world, state.log)
    }
}
