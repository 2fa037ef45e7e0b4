pub mod config;
pub mod error;
pub mod file;
pub mod listing;
pub mod profile;
pub mod resolve;
pub mod signal;
pub mod static_file_server;
pub mod traits;

pub use config::{HeaderOption, HeaderSet, ServerConfig};
pub use error::ServeError;
pub use static_file_server::{
    RunningServer, ShutdownHandle, StaticFileServer, start, start_with,
};
