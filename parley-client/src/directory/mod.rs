mod directory_config;
mod session_directory;

pub use directory_config::*;
pub use session_directory::*;
