pub mod chromium;
pub mod cli;
pub mod drive;
pub mod interactive;
pub mod load_config;

pub use cli::{run, Cli};
