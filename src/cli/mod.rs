pub mod config_cmd;
pub mod container;
pub mod service;
pub mod terraform;
