//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./scripthost.toml or ./.scripthost/config.toml
//! 2. User config: ~/.scripthost/config.toml
//! 3. Built-in defaults

use crate::{HostConfig, env};
use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<HostConfig> {
        let current_dir = std_env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::discover_config_in(&current_dir)
    }

    /// Discover configuration starting from a specific directory
    pub fn discover_config_in(dir: &Path) -> Result<HostConfig> {
        if let Some(config_path) = Self::find_config_file_in(dir) {
            info!("Loading configuration from: {:?}", config_path);
            return HostConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(HostConfig::default())
    }

    /// Load an explicit config file, or fall back to discovery
    pub fn load(config_override: Option<&Path>) -> Result<HostConfig> {
        match config_override {
            Some(path) => HostConfig::from_toml_file(path),
            None => Self::discover_config(),
        }
    }

    pub fn find_config_file_in(dir: &Path) -> Option<PathBuf> {
        for candidate in Self::get_config_candidates(dir) {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Configuration file candidates in priority order
    fn get_config_candidates(dir: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![
            env::root_config_file_path(dir),
            env::local_config_file_path(dir),
        ];

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::local_config_file_path(&home_dir));
        }

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let current_dir = std_env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let candidates = Self::get_config_candidates(&current_dir);
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "EXISTS"
                } else {
                    "NOT A FILE"
                }
            } else {
                "NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file_in(&current_dir) {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }
    }
}
