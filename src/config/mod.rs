//! Configuration module for Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use trawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawl.toml")).unwrap();
//! println!("Crawl pool size: {}", config.pools.crawl);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ChunkingConfig, Config, LimitConfig, OutputConfig, PoolConfig, ProxyConfig, SearchConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_file_hash, load_config, load_config_with_hash};
