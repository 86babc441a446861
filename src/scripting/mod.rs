pub mod host;
pub(crate) mod js_compat;
pub mod runtime;

pub const DEFAULT_TICK_BUDGET: u64 = 10_000;
pub const DEFAULT_RHAI_MAX_CALL_LEVELS: usize = 64;

pub use host::MazeHost;
pub use runtime::RhaiRuntime;

/// Abnormal termination of a sandboxed program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptSignal {
    /// A move ran into a wall or off the grid.
    Blocked,
    /// The tick budget ran out.
    Timeout,
    Other(String),
}

impl std::fmt::Display for ScriptSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptSignal::Blocked => write!(f, "blocked move"),
            ScriptSignal::Timeout => write!(f, "tick budget exhausted"),
            ScriptSignal::Other(message) => write!(f, "{}", message),
        }
    }
}

/// Sandboxed interpreter the execution driver runs programs on.
pub trait ScriptRuntime: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run `program` to completion against `host`, stopping after `tick_budget` ticks.
    fn execute(&self, program: &str, host: &MazeHost, tick_budget: u64) -> Result<(), ScriptSignal>;
}
