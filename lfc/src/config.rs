//! External configuration surface, names preserved for compatibility with
//! the option table this crate descends from.

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;

/// Default values for every configuration option, mirroring the table in
/// the external interfaces section of the design.
pub mod defaults {
    pub const DEFAULT_MAX_FILE_CACHE_SIZE_MB: u64 = 0;
    pub const DEFAULT_MAX_INMEM_CACHE_SIZE_MB: u64 = 128;
    pub const DEFAULT_FILE_CACHE_SIZE_LIMIT_MB: u64 = 0;
    pub const DEFAULT_FREE_MEMORY_WATERMARK_MB: u64 = 0;
    pub const DEFAULT_STRIPE_SIZE: u32 = 32768;
    pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 60;
    pub const DEFAULT_FLUSH_OUTPUT_AFTER: u32 = 8;
    pub const DEFAULT_READAHEAD_BUFFER_SIZE: u32 = 128;

    pub const READAHEAD_BUFFER_SIZE_MIN: u32 = 16;
    pub const READAHEAD_BUFFER_SIZE_MAX: u32 = 1024;
}

/// Configuration for the [`crate::cache::LocalFileCache`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_file_cache_size_mb: u64,
    pub max_inmem_cache_size_mb: u64,
    pub file_cache_size_limit_mb: u64,
    pub free_memory_watermark_mb: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_file_cache_size_mb: defaults::DEFAULT_MAX_FILE_CACHE_SIZE_MB,
            max_inmem_cache_size_mb: defaults::DEFAULT_MAX_INMEM_CACHE_SIZE_MB,
            file_cache_size_limit_mb: defaults::DEFAULT_FILE_CACHE_SIZE_LIMIT_MB,
            free_memory_watermark_mb: defaults::DEFAULT_FREE_MEMORY_WATERMARK_MB,
        }
    }
}

impl CacheConfig {
    /// Enforces the size relationships the option table documents:
    /// `file_cache_size_limit ≤ max_file_cache_size ≤ max_inmem_cache_size`.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_file_cache_size_mb <= self.max_inmem_cache_size_mb,
            "max_file_cache_size ({}) exceeds max_inmem_cache_size ({})",
            self.max_file_cache_size_mb,
            self.max_inmem_cache_size_mb
        );
        ensure!(
            self.file_cache_size_limit_mb <= self.max_file_cache_size_mb,
            "file_cache_size_limit ({}) exceeds max_file_cache_size ({})",
            self.file_cache_size_limit_mb,
            self.max_file_cache_size_mb
        );
        Ok(())
    }
}

/// Configuration for the [`crate::shard::ShardClient`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShardClientConfig {
    pub pageserver_connstring: String,
    pub tenant_id: String,
    pub timeline_id: String,
    pub stripe_size: u32,
    pub max_reconnect_attempts: u32,
    pub flush_output_after: u32,
    pub readahead_buffer_size: u32,
}

impl Default for ShardClientConfig {
    fn default() -> Self {
        ShardClientConfig {
            pageserver_connstring: String::new(),
            tenant_id: String::new(),
            timeline_id: String::new(),
            stripe_size: defaults::DEFAULT_STRIPE_SIZE,
            max_reconnect_attempts: defaults::DEFAULT_MAX_RECONNECT_ATTEMPTS,
            flush_output_after: defaults::DEFAULT_FLUSH_OUTPUT_AFTER,
            readahead_buffer_size: defaults::DEFAULT_READAHEAD_BUFFER_SIZE,
        }
    }
}

impl ShardClientConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.tenant_id.is_empty() {
            hex::decode(&self.tenant_id).context("tenant_id is not valid hex")?;
        }
        if !self.timeline_id.is_empty() {
            hex::decode(&self.timeline_id).context("timeline_id is not valid hex")?;
        }
        ensure!(self.stripe_size > 0, "stripe_size must be nonzero");
        ensure!(
            (defaults::READAHEAD_BUFFER_SIZE_MIN..=defaults::READAHEAD_BUFFER_SIZE_MAX)
                .contains(&self.readahead_buffer_size),
            "readahead_buffer_size ({}) out of range [{}, {}]",
            self.readahead_buffer_size,
            defaults::READAHEAD_BUFFER_SIZE_MIN,
            defaults::READAHEAD_BUFFER_SIZE_MAX
        );
        Ok(())
    }

    /// Splits `pageserver_connstring` on commas, matching `ParseShardMap` in
    /// the original page-store client: empty entries are rejected, the list
    /// must be nonempty once the string itself is nonempty.
    pub fn parse_shard_connstrings(&self) -> Result<Vec<String>> {
        if self.pageserver_connstring.is_empty() {
            return Ok(Vec::new());
        }
        let shards: Vec<String> = self
            .pageserver_connstring
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
        for (i, s) in shards.iter().enumerate() {
            if s.is_empty() {
                bail!("pageserver_connstring entry {i} is empty");
            }
        }
        Ok(shards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        CacheConfig::default().validate().unwrap();
        ShardClientConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_limit_above_max() {
        let cfg = CacheConfig {
            max_file_cache_size_mb: 64,
            max_inmem_cache_size_mb: 128,
            file_cache_size_limit_mb: 128,
            ..CacheConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_max_above_inmem() {
        let cfg = CacheConfig {
            max_file_cache_size_mb: 256,
            max_inmem_cache_size_mb: 128,
            file_cache_size_limit_mb: 0,
            ..CacheConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_hex_tenant_id() {
        let cfg = ShardClientConfig {
            tenant_id: "not-hex".to_string(),
            ..ShardClientConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn splits_connstrings() {
        let cfg = ShardClientConfig {
            pageserver_connstring: "host1:1234,host2:1234".to_string(),
            ..ShardClientConfig::default()
        };
        let shards = cfg.parse_shard_connstrings().unwrap();
        assert_eq!(shards, vec!["host1:1234".to_string(), "host2:1234".to_string()]);
    }
}
