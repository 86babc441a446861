use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};
use serde::Serialize;

use crate::command_log::{CommandKind, CommandLog};
use crate::config::MAX_STEP_SPEED_MS;
use crate::levels::Level;
use crate::maze::{constrain_direction16, AgentPose, Direction, FinishSet, Grid};
use crate::skin::{CrashType, Skin};

/// Waves drawn by the look sensor.
pub const LOOK_WAVES: usize = 3;
/// Delay between `start` and the first record.
pub const FIRST_RECORD_DELAY_MS: u64 = 100;
const OPENING_STEP_SPEED_MS: u64 = 100;
const CRASH_FRAMES: u64 = 100;
const CUE_VOLUME: f32 = 0.5;
const FALL_ACCELERATION: f32 = 0.01;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Win,
    Fail,
}

/// Display instruction for whatever draws the maze.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Directive {
    /// Position in cells (fractional while animating).
    ShowAgent {
        x: f32,
        y: f32,
        direction16: u8,
        angle: f32,
    },
    FinishMarker {
        index: usize,
        x: i32,
        y: i32,
        consumed: bool,
    },
    /// Sensor anchor in cells, rotation in degrees.
    LookSensor {
        direction: Direction,
        x: f32,
        y: f32,
        rotation: f32,
        colour: String,
    },
    LookWave {
        wave: usize,
        visible: bool,
    },
    HideLookSensor,
    /// `sources` are alternative encodings of the same cue.
    PlaySound {
        cue: SoundCue,
        volume: f32,
        sources: Vec<String>,
    },
    Highlight(Option<String>),
    Victory,
    PersistSuccess,
}

enum FrameAction {
    Emit(Directive),
    NextRecord,
}

struct PendingFrame {
    generation: u64,
    action: FrameAction,
}

/// Plays a [`CommandLog`] back as timed [`Directive`]s.
///
/// Time only moves through [`ReplayScheduler::advance`]. Every record is
/// handled by its own frame, which arms the next one `5 × step_speed` later.
/// Finish markers are re-evaluated against the display pose here; the
/// logical world used during execution is never consulted.
pub struct ReplayScheduler {
    grid: Arc<Grid>,
    start_direction: Direction,
    display: AgentPose,
    finishes: FinishSet,
    log: CommandLog,
    frames: BTreeMap<(u64, u64), PendingFrame>,
    next_seq: u64,
    generation: u64,
    now_ms: u64,
    step_speed_ms: u64,
    skin: Skin,
    records_played: usize,
    rng: SmallRng,
    victory_played: bool,
}

impl ReplayScheduler {
    pub fn new(level: &Level, step_speed_ms: u64, skin: &Skin, rng_seed: Option<u64>) -> Self {
        let rng = match rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        debug!("[Maze replay] using skin '{}'", skin.name);
        Self {
            grid: level.grid.clone(),
            start_direction: level.start_direction,
            display: AgentPose::new(level.grid.start(), level.start_direction),
            finishes: FinishSet::new(level.grid.finishes()),
            log: CommandLog::new(),
            frames: BTreeMap::new(),
            next_seq: 0,
            generation: 0,
            now_ms: 0,
            step_speed_ms: step_speed_ms.clamp(1, MAX_STEP_SPEED_MS),
            skin: skin.clone(),
            records_played: 0,
            rng,
            victory_played: false,
        }
    }

    /// Cancel everything pending and put the board back to its start state.
    /// Returns the directives that redraw it.
    pub fn reset(&mut self, opening: bool) -> Vec<Directive> {
        self.generation += 1;
        self.frames.clear();
        self.log = CommandLog::new();
        self.display = AgentPose::new(self.grid.start(), self.start_direction);
        self.finishes.reset();
        self.victory_played = false;
        self.records_played = 0;

        let mut out = vec![Directive::HideLookSensor];
        for (index, cell) in self.finishes.cells().iter().enumerate() {
            out.push(Directive::FinishMarker {
                index,
                x: cell.x,
                y: cell.y,
                consumed: false,
            });
        }

        let x = self.display.cell.x as f32;
        let y = self.display.cell.y as f32;
        if opening {
            // Face one quarter-turn clockwise, then swing back.
            let turned = self.start_direction.turn(1).as_direction16() as f32;
            out.push(show_agent(x, y, turned, 0.0));
            self.schedule_motion(
                self.now_ms.saturating_add(OPENING_STEP_SPEED_MS * 5),
                OPENING_STEP_SPEED_MS,
                (x, y, turned),
                (x, y, turned - 4.0),
            );
        } else {
            out.push(show_agent(x, y, self.start_direction.as_direction16() as f32, 0.0));
        }

        debug!(
            "[Maze replay] reset (opening={}) generation={}",
            opening, self.generation
        );
        out
    }

    /// Take ownership of a run's transcript and arm its first record.
    pub fn start(&mut self, log: CommandLog) {
        debug!("[Maze replay] starting replay of {} records", log.len());
        self.log = log;
        self.schedule(
            self.now_ms.saturating_add(FIRST_RECORD_DELAY_MS),
            FrameAction::NextRecord,
        );
    }

    /// Move the replay clock forward and collect every directive that fell due.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<Directive> {
        self.now_ms = self.now_ms.saturating_add(elapsed_ms);
        let mut out = Vec::new();
        while let Some(entry) = self.frames.first_entry() {
            if entry.key().0 > self.now_ms {
                break;
            }
            let ((at, _), frame) = entry.remove_entry();
            if frame.generation != self.generation {
                continue;
            }
            match frame.action {
                FrameAction::Emit(directive) => out.push(directive),
                FrameAction::NextRecord => self.play_next_record(at, &mut out),
            }
        }
        out
    }

    pub fn is_idle(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn display_pose(&self) -> AgentPose {
        self.display
    }

    pub fn remaining_finish_count(&self) -> usize {
        self.finishes.remaining()
    }

    pub fn all_finishes_consumed(&self) -> bool {
        self.finishes.all_consumed()
    }

    pub fn finish_queued(&self) -> bool {
        self.log.finish_queued()
    }

    pub fn victory_played(&self) -> bool {
        self.victory_played
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records taken off the transcript since the last reset.
    pub fn records_played(&self) -> usize {
        self.records_played
    }

    pub fn step_speed_ms(&self) -> u64 {
        self.step_speed_ms
    }

    fn schedule(&mut self, at_ms: u64, action: FrameAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frames.insert(
            (at_ms, seq),
            PendingFrame {
                generation: self.generation,
                action,
            },
        );
    }

    fn emit_at(&mut self, at_ms: u64, directive: Directive) {
        self.schedule(at_ms, FrameAction::Emit(directive));
    }

    fn play_next_record(&mut self, t: u64, out: &mut Vec<Directive>) {
        let Some(record) = self.log.pop_front() else {
            out.push(Directive::Highlight(None));
            debug!("[Maze replay] transcript exhausted");
            return;
        };
        self.records_played += 1;
        out.push(Directive::Highlight(record.block_id.clone()));

        if let Some(index) = self.finishes.consume_at(self.display.cell) {
            let cell = self.display.cell;
            debug!(
                "[Maze replay] finish {} reached, {} remaining",
                index,
                self.finishes.remaining()
            );
            out.push(Directive::FinishMarker {
                index,
                x: cell.x,
                y: cell.y,
                consumed: true,
            });
        }

        let s = self.step_speed_ms;
        match record.kind {
            CommandKind::MoveTo { direction } => {
                let from = self.display.cell;
                let to = from.step(direction);
                let facing = self.display.facing.as_direction16() as f32;
                self.schedule_motion(
                    t,
                    s,
                    (from.x as f32, from.y as f32, facing),
                    (to.x as f32, to.y as f32, facing),
                );
                self.display.cell = to;
            }
            CommandKind::LookAt { direction } => self.schedule_look(t, direction, out),
            CommandKind::FailForward => self.schedule_crash(t, true),
            CommandKind::FailBackward => self.schedule_crash(t, false),
            CommandKind::Check => {}
            CommandKind::Finish => {
                if !self.victory_played {
                    self.victory_played = true;
                    info!("[Maze replay] all finishes reached");
                    out.push(self.sound(SoundCue::Win));
                    out.push(Directive::Victory);
                    out.push(Directive::PersistSuccess);
                }
            }
        }

        if self.finishes.all_consumed() && self.log.queue_finish() {
            debug!("[Maze replay] queued finish record");
        }

        self.schedule(t.saturating_add(s * 5), FrameAction::NextRecord);
    }

    /// Four frames from `start` to `end`, each `(x, y, direction16)`.
    fn schedule_motion(&mut self, t: u64, step: u64, start: (f32, f32, f32), end: (f32, f32, f32)) {
        let delta = (
            (end.0 - start.0) / 4.0,
            (end.1 - start.1) / 4.0,
            (end.2 - start.2) / 4.0,
        );
        for i in 1..=4u64 {
            let k = i as f32;
            let directive = show_agent(
                start.0 + delta.0 * k,
                start.1 + delta.1 * k,
                start.2 + delta.2 * k,
                0.0,
            );
            self.emit_at(t.saturating_add(step * (i - 1)), directive);
        }
    }

    fn schedule_look(&mut self, t: u64, direction: Direction, out: &mut Vec<Directive>) {
        let cell = self.display.cell;
        let (ox, oy) = match direction {
            Direction::North => (0.5, 0.0),
            Direction::East => (1.0, 0.5),
            Direction::South => (0.5, 1.0),
            Direction::West => (0.0, 0.5),
        };
        out.push(Directive::LookSensor {
            direction,
            x: cell.x as f32 + ox,
            y: cell.y as f32 + oy,
            rotation: (direction.index() * 90 - 45) as f32,
            colour: self.skin.look_colour.clone(),
        });
        let s = self.step_speed_ms;
        for wave in 0..LOOK_WAVES {
            let shown = t.saturating_add(s * wave as u64);
            self.emit_at(shown, Directive::LookWave { wave, visible: true });
            self.emit_at(shown.saturating_add(s * 2), Directive::LookWave { wave, visible: false });
        }
    }

    fn schedule_crash(&mut self, t: u64, forward: bool) {
        let (mut dx, mut dy) = {
            let (x, y) = self.display.facing.delta();
            (x as f32, y as f32)
        };
        if !forward {
            dx = -dx;
            dy = -dy;
        }
        let x = self.display.cell.x as f32;
        let y = self.display.cell.y as f32;
        let facing = self.display.facing.as_direction16() as f32;
        let s = self.step_speed_ms;
        let fail = self.sound(SoundCue::Fail);
        let crash_type = self.skin.crash_type;

        match crash_type {
            CrashType::Stop => {
                let (bx, by) = (x + dx / 4.0, y + dy / 4.0);
                self.emit_at(t, show_agent(bx, by, facing, 0.0));
                self.emit_at(t, fail.clone());
                self.emit_at(t.saturating_add(s), show_agent(x, y, facing, 0.0));
                self.emit_at(t.saturating_add(s * 2), show_agent(bx, by, facing, 0.0));
                self.emit_at(t.saturating_add(s * 2), fail);
                self.emit_at(t.saturating_add(s * 3), show_agent(x, y, facing, 0.0));
            }
            CrashType::Spin | CrashType::Fall => {
                let delta_z = (self.rng.gen::<f32>() - 0.5) * 10.0;
                let delta_d = (self.rng.gen::<f32>() - 0.5) / 2.0;
                dx = (dx + (self.rng.gen::<f32>() - 0.5) / 4.0) / 8.0;
                dy = (dy + (self.rng.gen::<f32>() - 0.5) / 4.0) / 8.0;
                let acceleration = if crash_type == CrashType::Fall {
                    FALL_ACCELERATION
                } else {
                    0.0
                };
                self.emit_at(t.saturating_add(s * 2), fail);
                for n in 1..CRASH_FRAMES {
                    let k = n as f32;
                    let fall_dy = dy + acceleration * (k - 1.0);
                    let directive = show_agent(x + dx * k, y + fall_dy * k, facing + delta_d * k, delta_z * k);
                    self.emit_at(t.saturating_add(s * n / 2), directive);
                }
            }
        }
    }
}

impl ReplayScheduler {
    /// `cue` with the skin's sources for it.
    fn sound(&self, cue: SoundCue) -> Directive {
        let sources = match cue {
            SoundCue::Win => &self.skin.win_sound,
            SoundCue::Fail => &self.skin.crash_sound,
        };
        Directive::PlaySound {
            cue,
            volume: CUE_VOLUME,
            sources: sources.clone(),
        }
    }
}

fn show_agent(x: f32, y: f32, direction16: f32, angle: f32) -> Directive {
    Directive::ShowAgent {
        x,
        y,
        direction16: constrain_direction16(direction16),
        angle,
    }
}
