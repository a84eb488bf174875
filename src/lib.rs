pub mod agent;
pub mod chat;
pub mod config;
pub mod fs_util;
pub mod gateway;
pub mod memory;
pub mod persona;
pub mod secrets;
pub mod store;
pub mod types;
