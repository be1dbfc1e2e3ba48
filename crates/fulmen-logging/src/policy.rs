//! Policy document loading and enforcement.
//!
//! Grounded on `xchecker-gate/src/policy.rs`'s policy-file idiom: search
//! order for locating an unspecified policy file, and a permissive/strict
//! validation pass. Adapted from TOML to YAML per the data format this
//! runtime standardizes on elsewhere (schemas, catalogs).

use std::path::{Path, PathBuf};

use fulmen_error::{Error, ErrorCode};
use serde::{Deserialize, Serialize};

use crate::logger::Profile;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredProfileRule {
    pub app_type: String,
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentRule {
    pub environment: String,
    pub profiles: Vec<Profile>,
}

/// `{allowedProfiles, requiredProfiles?, environmentRules?}` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    #[serde(default)]
    pub allowed_profiles: Vec<Profile>,
    #[serde(default)]
    pub required_profiles: Vec<RequiredProfileRule>,
    #[serde(default)]
    pub environment_rules: Vec<EnvironmentRule>,
}

/// Raised when a profile/environment/app-type combination violates the
/// loaded policy.
#[derive(Debug)]
pub struct PolicyError {
    pub message: String,
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PolicyError {}

/// Search order for locating a policy file when one isn't passed
/// explicitly: `./.fulmen/policy.yaml`, then a repo root found by walking
/// up for `.git`, then `~/.config/fulmen/policy.yaml`.
pub fn resolve_policy_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, Error> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::new(ErrorCode::FileNotFound, format!("policy file not found: {}", path.display())));
    }

    let cwd = std::env::current_dir()
        .map_err(|e| Error::new(ErrorCode::OperationFailed, format!("failed to get current directory: {e}")))?;
    let local = cwd.join(".fulmen").join("policy.yaml");
    if local.exists() {
        return Ok(Some(local));
    }

    if let Some(root) = find_repo_root(&cwd) {
        let repo_policy = root.join(".fulmen").join("policy.yaml");
        if repo_policy.exists() {
            return Ok(Some(repo_policy));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("fulmen").join("policy.yaml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    for _ in 0..10 {
        if current.join(".git").exists() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
    None
}

pub fn load_policy_from_path(path: &Path) -> Result<PolicyDocument, Error> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::new(ErrorCode::FileNotFound, format!("failed to read policy file {}: {e}", path.display())))?;
    let policy: PolicyDocument = serde_yaml::from_str(&content)
        .map_err(|e| Error::new(ErrorCode::ConfigInvalid, format!("failed to parse policy YAML: {e}")))?;
    Ok(policy)
}

impl PolicyDocument {
    /// `{profile}` is permitted iff it's in `allowed_profiles` AND (no
    /// applicable environment rule OR it's in that rule) AND (no
    /// applicable app-type rule OR it's in that rule).
    pub fn validate(&self, profile: Profile, environment: Option<&str>, app_type: Option<&str>) -> Result<(), PolicyError> {
        if !self.allowed_profiles.contains(&profile) {
            return Err(PolicyError {
                message: format!(
                    "profile {profile:?} is not in the allowed set {:?}",
                    self.allowed_profiles
                ),
            });
        }
        if let Some(env) = environment {
            if let Some(rule) = self.environment_rules.iter().find(|r| r.environment == env) {
                if !rule.profiles.contains(&profile) {
                    return Err(PolicyError {
                        message: format!(
                            "profile {profile:?} is not permitted in environment '{env}'; allowed: {:?}",
                            rule.profiles
                        ),
                    });
                }
            }
        }
        if let Some(app) = app_type {
            if let Some(rule) = self.required_profiles.iter().find(|r| r.app_type == app) {
                if !rule.profiles.contains(&profile) {
                    return Err(PolicyError {
                        message: format!(
                            "profile {profile:?} does not satisfy app-type '{app}''s required set {:?}",
                            rule.profiles
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns the single strictest profile required for `(app_type,
    /// environment)`: the narrowest intersection of the app-type rule and
    /// the environment rule, falling back to the app-type rule alone, then
    /// erroring for an unknown app-type.
    pub fn required_profile(&self, app_type: &str, environment: Option<&str>) -> Result<Profile, PolicyError> {
        let app_rule = self
            .required_profiles
            .iter()
            .find(|r| r.app_type == app_type)
            .ok_or_else(|| PolicyError { message: format!("unknown app type '{app_type}'") })?;

        let candidates: Vec<Profile> = match environment.and_then(|env| self.environment_rules.iter().find(|r| r.environment == env)) {
            Some(env_rule) => app_rule.profiles.iter().filter(|p| env_rule.profiles.contains(p)).copied().collect(),
            None => app_rule.profiles.clone(),
        };

        candidates
            .into_iter()
            .max_by_key(|p| profile_strictness(*p))
            .ok_or_else(|| PolicyError {
                message: format!("no profile satisfies both app type '{app_type}' and the environment rule"),
            })
    }
}

fn profile_strictness(profile: Profile) -> u8 {
    match profile {
        Profile::Simple => 0,
        Profile::Structured => 1,
        Profile::Custom => 2,
        Profile::Enterprise => 3,
    }
}
