//! Compose file layering per profile
//!
//! The base file always comes first; `docker-compose.<profile>.yml` follows
//! when it exists. docker compose merges strictly by `-f` order, so later
//! files override earlier ones field by field.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

/// Ordered compose files for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayeredComposeSet {
    files: Vec<PathBuf>,
    profile: Option<String>,
    override_found: bool,
}

impl LayeredComposeSet {
    /// Files in precedence order (base first)
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn base(&self) -> &Path {
        &self.files[0]
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Profile that was asked for but matched no override file
    ///
    /// Usually an operator typo rather than intent, so callers warn on it.
    pub fn unmatched_profile(&self) -> Option<&str> {
        match self.profile {
            Some(ref profile) if !self.override_found => Some(profile),
            _ => None,
        }
    }
}

/// Computes the [`LayeredComposeSet`] for a requested profile
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    base_file: PathBuf,
}

impl ProfileResolver {
    pub fn new(base_file: impl Into<PathBuf>) -> Self {
        Self {
            base_file: base_file.into(),
        }
    }

    /// `docker-compose.yml` + `dev` -> `docker-compose.dev.yml`, next to the base
    pub fn override_path(&self, profile: &str) -> PathBuf {
        let stem = self
            .base_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "docker-compose".to_string());
        let name = match self.base_file.extension() {
            Some(ext) => format!("{}.{}.{}", stem, profile, ext.to_string_lossy()),
            None => format!("{}.{}", stem, profile),
        };
        self.base_file.with_file_name(name)
    }

    /// Resolve the ordered file set for `profile`
    ///
    /// A missing base file is an error; a missing override is not.
    pub fn resolve(&self, profile: Option<&str>) -> Result<LayeredComposeSet, ConfigError> {
        if !self.base_file.is_file() {
            return Err(ConfigError::FileNotFound {
                path: self.base_file.clone(),
            });
        }

        let profile = profile.map(str::trim).filter(|p| !p.is_empty());
        if let Some(profile) = profile {
            validate_profile_name(profile)?;
        }

        let mut files = vec![self.base_file.clone()];
        let mut override_found = false;

        if let Some(profile) = profile {
            let candidate = self.override_path(profile);
            if candidate.is_file() {
                debug!("Profile '{}' layers {}", profile, candidate.display());
                files.push(candidate);
                override_found = true;
            } else {
                debug!(
                    "Profile '{}' has no override file at {}",
                    profile,
                    candidate.display()
                );
            }
        }

        Ok(LayeredComposeSet {
            files,
            profile: profile.map(str::to_string),
            override_found,
        })
    }
}

/// Profile names become part of a file name, so keep them to `[A-Za-z0-9_-]`
fn validate_profile_name(profile: &str) -> Result<(), ConfigError> {
    let valid = profile
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: "profile".to_string(),
            value: profile.to_string(),
        })
    }
}
