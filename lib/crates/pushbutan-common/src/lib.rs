pub mod config;
pub mod types;

pub use config::ToolboxServerConfig;
pub use types::*;
