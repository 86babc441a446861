use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;

use maze_runner::config::MazeConfig;
use maze_runner::levels::{self, Level};
use maze_runner::plugin::{MazePlugin, MazeSystems, RunProgram};
use maze_runner::session::MazeSession;
use maze_runner::skin::Skin;

const USAGE: &str =
    "usage: maze-runner [--level N | --maze FILE] [--skin FILE] [--transcript] PROGRAM_FILE";

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    level: Option<usize>,
    maze: Option<String>,
    skin: Option<String>,
    transcript: bool,
    program: String,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();
    let mut program = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--level" => {
                let value = iter.next().ok_or("--level needs a number")?;
                let number = value
                    .parse::<usize>()
                    .map_err(|_| format!("invalid level number '{}'", value))?;
                cli.level = Some(number);
            }
            "--maze" => cli.maze = Some(iter.next().ok_or("--maze needs a file")?.clone()),
            "--skin" => cli.skin = Some(iter.next().ok_or("--skin needs a file")?.clone()),
            "--transcript" => cli.transcript = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            path => {
                if program.replace(path.to_string()).is_some() {
                    return Err("only one program file may be given".to_string());
                }
            }
        }
    }
    if cli.level.is_some() && cli.maze.is_some() {
        return Err("--level and --maze are mutually exclusive".to_string());
    }
    cli.program = program.ok_or("missing program file")?;
    Ok(cli)
}

#[derive(Resource)]
struct ProgramSource(String);

#[derive(Resource)]
struct PrintTranscript(bool);

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("[Maze] {}", e);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };
    if let Err(e) = run(cli) {
        eprintln!("[Maze] {}", e);
        std::process::exit(1);
    }
}

fn run(cli: CliArgs) -> Result<(), String> {
    let mut config = MazeConfig::load()?;
    if let Some(path) = &cli.skin {
        config.skin = Skin::load_file(path)?;
    }
    let level = match &cli.maze {
        Some(path) => Level::load_file(path)?,
        None => levels::by_number(cli.level.unwrap_or(1))?,
    };
    let program = std::fs::read_to_string(&cli.program)
        .map_err(|e| format!("Failed to read program {}: {}", cli.program, e))?;

    let mut app = App::new();
    app.add_plugins(
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
            1.0 / 60.0,
        ))),
    )
    .add_plugins(LogPlugin::default())
    .insert_resource(MazeSession::new(level, &config))
    .insert_resource(ProgramSource(program))
    .insert_resource(PrintTranscript(cli.transcript))
    .add_plugins(MazePlugin)
    .add_systems(Startup, submit_program)
    .add_systems(Update, (report_outcome, exit_when_idle).chain().after(MazeSystems));

    app.run();
    Ok(())
}

fn submit_program(program: Res<ProgramSource>, mut runs: EventWriter<RunProgram>) {
    runs.send(RunProgram {
        program: program.0.clone(),
    });
}

fn report_outcome(
    session: Res<MazeSession>,
    transcript: Res<PrintTranscript>,
    mut reported: Local<bool>,
) {
    if *reported {
        return;
    }
    let Some(outcome) = session.last_outcome() else {
        return;
    };
    *reported = true;
    println!("outcome: {}", outcome.label());
    if transcript.0 {
        if let Some(log) = session.last_transcript() {
            match serde_json::to_string_pretty(log) {
                Ok(text) => println!("{}", text),
                Err(e) => warn!("[Maze] Failed to render transcript: {}", e),
            }
        }
    }
}

fn exit_when_idle(session: Res<MazeSession>, mut exit: EventWriter<AppExit>) {
    if session.last_outcome().is_some() && session.is_idle() {
        let replay = session.replay();
        info!(
            "[Maze] replay finished: {} of {} finishes reached",
            session.level().grid.finishes().len() - replay.remaining_finish_count(),
            session.level().grid.finishes().len()
        );
        exit.send(AppExit::Success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_level_and_flags() {
        let cli = parse_args(&args(&["--level", "3", "--transcript", "prog.rhai"])).unwrap();
        assert_eq!(cli.level, Some(3));
        assert!(cli.transcript);
        assert_eq!(cli.program, "prog.rhai");
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["--level", "x", "p"])).is_err());
        assert!(parse_args(&args(&["--level", "1", "--maze", "m.json", "p"])).is_err());
        assert!(parse_args(&args(&["--bogus", "p"])).is_err());
        assert!(parse_args(&args(&["a", "b"])).is_err());
    }
}
