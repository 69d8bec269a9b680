pub mod config;
pub mod context;
pub mod error;
pub mod error_utils;
pub mod placeholder;
pub mod replacer;
pub mod types;

pub use config::AppConfig;
pub use context::CycleContext;
pub use error::*;
pub use error_utils::*;
pub use replacer::Replacer;
pub use types::*;

pub type Result<T> = std::result::Result<T, CoreError>;
