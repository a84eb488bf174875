pub mod auth;
pub mod server;

pub use server::{AppState, app, run};
