pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod index;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod schema;
pub mod source;
pub mod ui;
pub mod validate;
pub mod writer;

pub use cli::{Cli, Commands};
pub use config::AnalysisConfig;
pub use error::AnalysisError;
pub use ui::{ConsoleUi, Phase, SilentUi, Ui};
