pub mod command_log;
pub mod config;
pub mod execution;
pub mod levels;
pub mod maze;
pub mod plugin;
pub mod replay;
pub mod scripting;
pub mod session;
pub mod skin;
