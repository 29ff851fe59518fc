pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod flash;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod store;
