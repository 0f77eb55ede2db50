pub mod config;
pub mod security;
pub mod server;

pub use config::ViewerConfig;
pub use server::{bind, router, BoundViewer, ViewerError};
