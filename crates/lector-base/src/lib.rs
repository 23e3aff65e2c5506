pub mod logging;
pub mod vec2;

pub use logging::{
    FileLogger, StdoutLogger, init_file_logger, init_stdout_logger, level_from_env,
};
pub use vec2::Vec2;

// Re-export log crate so downstream crates can use lector_base::log::*
pub use log;
