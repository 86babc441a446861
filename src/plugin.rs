use std::time::Duration;

use bevy::prelude::*;

use crate::replay::Directive;
use crate::session::MazeSession;

/// Runs maze programs and streams their replay as [`PresentationDirective`]s.
/// Expects a [`MazeSession`] resource.
pub struct MazePlugin;

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct MazeSystems;

impl Plugin for MazePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<RunProgram>()
            .add_event::<ResetMaze>()
            .add_event::<PresentationDirective>()
            .insert_resource(ReplayClock::default())
            .add_systems(Startup, open_session)
            .add_systems(
                Update,
                (handle_maze_requests, advance_replay, log_directives)
                    .chain()
                    .in_set(MazeSystems),
            );
    }
}

#[derive(Event, Clone, Debug)]
pub struct RunProgram {
    pub program: String,
}

#[derive(Event, Clone, Copy, Debug, Default)]
pub struct ResetMaze;

#[derive(Event, Clone, Debug, PartialEq)]
pub struct PresentationDirective(pub Directive);

/// Sub-millisecond time not yet handed to the replay.
#[derive(Resource, Default)]
pub struct ReplayClock {
    carry: Duration,
}

impl ReplayClock {
    fn take_whole_millis(&mut self, delta: Duration) -> u64 {
        self.carry += delta;
        let millis = self.carry.as_millis() as u64;
        self.carry -= Duration::from_millis(millis);
        millis
    }
}

fn open_session(
    session: Option<ResMut<MazeSession>>,
    mut directives: EventWriter<PresentationDirective>,
) {
    let Some(mut session) = session else {
        warn!("[Maze] MazePlugin added without a MazeSession resource");
        return;
    };
    directives.send_batch(session.open().into_iter().map(PresentationDirective));
}

fn handle_maze_requests(
    mut runs: EventReader<RunProgram>,
    mut resets: EventReader<ResetMaze>,
    session: Option<ResMut<MazeSession>>,
    mut directives: EventWriter<PresentationDirective>,
) {
    let Some(mut session) = session else {
        runs.clear();
        resets.clear();
        return;
    };
    for _ in resets.read() {
        directives.send_batch(session.reset().into_iter().map(PresentationDirective));
    }
    // Only the latest request matters; each run restarts the replay anyway.
    if let Some(request) = runs.read().last() {
        let redraw = session.run(&request.program);
        if let Some(outcome) = session.last_outcome() {
            info!("[Maze] run finished with outcome {}", outcome.label());
        }
        directives.send_batch(redraw.into_iter().map(PresentationDirective));
    }
}

fn advance_replay(
    time: Res<Time>,
    mut clock: ResMut<ReplayClock>,
    session: Option<ResMut<MazeSession>>,
    mut directives: EventWriter<PresentationDirective>,
) {
    let Some(mut session) = session else {
        return;
    };
    let elapsed_ms = clock.take_whole_millis(time.delta());
    if elapsed_ms == 0 || session.is_idle() {
        return;
    }
    directives.send_batch(
        session
            .advance(elapsed_ms)
            .into_iter()
            .map(PresentationDirective),
    );
}

fn log_directives(mut directives: EventReader<PresentationDirective>) {
    for PresentationDirective(directive) in directives.read() {
        match directive {
            Directive::Victory | Directive::PersistSuccess => {
                info!("[Maze replay] {:?}", directive)
            }
            _ => debug!("[Maze replay] {:?}", directive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::time::TimeUpdateStrategy;

    use crate::config::MazeConfig;
    use crate::execution::ExecutionOutcome;
    use crate::levels;

    #[derive(Resource, Default)]
    struct Captured(Vec<Directive>);

    fn capture(mut events: EventReader<PresentationDirective>, mut captured: ResMut<Captured>) {
        captured
            .0
            .extend(events.read().map(|PresentationDirective(d)| d.clone()));
    }

    fn maze_app(level: usize) -> App {
        let config = MazeConfig {
            rng_seed: Some(11),
            ..MazeConfig::default()
        };
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(50)))
            .insert_resource(MazeSession::new(levels::builtin(level).unwrap(), &config))
            .insert_resource(Captured::default())
            .add_plugins(MazePlugin)
            .add_systems(Update, capture.after(log_directives));
        app
    }

    fn pump_until_idle(app: &mut App) {
        for _ in 0..2_000 {
            app.update();
            if app.world().resource::<MazeSession>().is_idle() {
                return;
            }
        }
        panic!("replay never went idle");
    }

    #[test]
    fn run_request_replays_to_victory() {
        let mut app = maze_app(1);
        app.update();
        app.world_mut().send_event(RunProgram {
            program: "while notDone() { moveEast(); }".to_string(),
        });
        pump_until_idle(&mut app);

        let session = app.world().resource::<MazeSession>();
        assert_eq!(session.last_outcome(), Some(&ExecutionOutcome::Unset));
        assert!(session.replay().all_finishes_consumed());

        let captured = &app.world().resource::<Captured>().0;
        assert_eq!(captured.iter().filter(|d| **d == Directive::Victory).count(), 1);
        assert_eq!(captured.last(), Some(&Directive::Highlight(None)));
    }

    #[test]
    fn reset_request_stops_the_replay() {
        let mut app = maze_app(1);
        app.update();
        app.world_mut().send_event(RunProgram {
            program: "moveEast(); moveEast(); moveEast();".to_string(),
        });
        for _ in 0..5 {
            app.update();
        }
        assert!(!app.world().resource::<MazeSession>().is_idle());

        app.world_mut().send_event(ResetMaze);
        app.update();
        let session = app.world().resource::<MazeSession>();
        assert!(session.is_idle());
        assert_eq!(session.replay().remaining_finish_count(), 2);
    }

    #[test]
    fn replay_clock_carries_fractional_milliseconds() {
        let mut clock = ReplayClock::default();
        assert_eq!(clock.take_whole_millis(Duration::from_micros(16_600)), 16);
        assert_eq!(clock.take_whole_millis(Duration::from_micros(16_600)), 17);
        assert_eq!(clock.take_whole_millis(Duration::from_micros(700)), 0);
    }
}
