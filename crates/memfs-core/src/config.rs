// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration for a memfs volume

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Resource limits enforced by the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FsLimits {
    /// Upper bound on simultaneously open descriptors
    pub max_open_files: usize,
    /// Symlink hops allowed during a single resolution before `ELOOP`
    pub max_symlink_hops: u32,
    /// Largest length in bytes a write or truncate may grow a file to
    pub max_file_size: u64,
}

impl Default for FsLimits {
    fn default() -> Self {
        Self {
            max_open_files: 65_536,
            max_symlink_hops: 40,
            max_file_size: 2 << 30,
        }
    }
}

/// Mode bits applied to new inodes when the caller gives none
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DefaultModes {
    pub file: u32,
    pub directory: u32,
}

impl Default for DefaultModes {
    fn default() -> Self {
        Self {
            file: 0o666,
            directory: 0o777,
        }
    }
}

/// Temporary directory name generation (`mkdtemp`)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TempPolicy {
    /// Number of random characters appended to the prefix
    pub suffix_len: usize,
    /// Collisions tolerated before giving up with `EEXIST`
    pub max_attempts: u32,
}

impl Default for TempPolicy {
    fn default() -> Self {
        Self {
            suffix_len: 6,
            max_attempts: 100,
        }
    }
}

/// Volume configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FsConfig {
    pub limits: FsLimits,
    pub modes: DefaultModes,
    pub temp: TempPolicy,
    /// First inode id handed out by a freshly created store
    pub inode_id_base: u64,
}

impl FsConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: FsConfig =
            toml::from_str(input).context("failed to parse memfs configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.limits.max_open_files == 0 {
            bail!("limits.max-open-files must be greater than zero");
        }
        if self.limits.max_symlink_hops == 0 {
            bail!("limits.max-symlink-hops must be greater than zero");
        }
        if self.limits.max_file_size == 0 {
            bail!("limits.max-file-size must be greater than zero");
        }
        if self.temp.suffix_len == 0 {
            bail!("temp.suffix-len must be greater than zero");
        }
        if self.temp.max_attempts == 0 {
            bail!("temp.max-attempts must be greater than zero");
        }
        Ok(())
    }

    /// Raise zero limits to one so a config built in code stays usable
    pub(crate) fn normalized(mut self) -> Self {
        self.limits.max_open_files = self.limits.max_open_files.max(1);
        self.limits.max_symlink_hops = self.limits.max_symlink_hops.max(1);
        self.limits.max_file_size = self.limits.max_file_size.max(1);
        self.temp.suffix_len = self.temp.suffix_len.max(1);
        self.temp.max_attempts = self.temp.max_attempts.max(1);
        self
    }

    pub(crate) fn first_inode_id(&self) -> u64 {
        self.inode_id_base.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FsConfig::default();
        assert_eq!(config.limits.max_symlink_hops, 40);
        assert_eq!(config.modes.file, 0o666);
        assert_eq!(config.temp.suffix_len, 6);
        assert_eq!(config.limits.max_file_size, 2 << 30);
        assert_eq!(config.first_inode_id(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FsConfig::from_toml_str(
            r#"
            inode-id-base = 1000

            [limits]
            max-open-files = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.inode_id_base, 1000);
        assert_eq!(config.limits.max_open_files, 8);
        assert_eq!(config.limits.max_symlink_hops, 40);
        assert_eq!(config.modes.directory, 0o777);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let err = FsConfig::from_toml_str("[limits]\nmax-symlink-hops = 0\n").unwrap_err();
        assert!(err.to_string().contains("max-symlink-hops"));
        assert!(FsConfig::from_toml_str("[temp]\nsuffix-len = 'x'\n").is_err());
        let err = FsConfig::from_toml_str("[limits]\nmax-file-size = 0\n").unwrap_err();
        assert!(err.to_string().contains("max-file-size"));
    }

    #[test]
    fn test_normalized_raises_zero_limits() {
        let mut config = FsConfig::default();
        config.temp.max_attempts = 0;
        config.limits.max_file_size = 0;
        let config = config.normalized();
        assert_eq!(config.temp.max_attempts, 1);
        assert_eq!(config.limits.max_file_size, 1);
        assert!(config.validate().is_ok());
        assert_eq!(FsConfig::default().normalized(), FsConfig::default());
    }
}
