mod accounts;
pub mod config;

pub use config::Config;
