//! `docrag-server` exposes the docrag pipeline over HTTP: multipart uploads
//! are stored, extracted and indexed, and questions are answered from the
//! indexed corpus.

pub mod config;
pub mod protocol;
pub mod server;
pub mod upload;

pub use config::Settings;
pub use server::{ApiError, AppState, app_router, run_server};
