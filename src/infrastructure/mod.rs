pub mod adapters;
pub mod certificates;
pub mod config;
pub mod crypto;
