//! Role/path/method authorization loaded from a YAML policy file.
//!
//! ```yaml
//! anonymous_role: unauthorized
//! rules:
//!   - role: user
//!     path: /v1/business/*
//!     methods: [GET]
//! ```
//!
//! Path patterns match segment by segment: `:name` matches exactly one
//! segment, a trailing `*` matches the rest of the path (including nothing).
//! A method of `*` matches any method. Rules granted to the anonymous role
//! apply to every caller.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read policy file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse policy: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Policy has no rules")]
    Empty,
}

pub const DEFAULT_ANONYMOUS_ROLE: &str = "unauthorized";

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyRule {
    pub role: String,
    pub path: String,
    #[serde(default = "any_method")]
    pub methods: Vec<String>,
}

fn any_method() -> Vec<String> {
    vec!["*".to_string()]
}

impl PolicyRule {
    fn allows(&self, roles: [&str; 2], path: &str, method: &str) -> bool {
        roles.contains(&self.role.as_str())
            && self.methods.iter().any(|m| m == "*" || m.eq_ignore_ascii_case(method))
            && key_match(path, &self.path)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicySet {
    #[serde(default = "default_anonymous_role")]
    pub anonymous_role: String,
    pub rules: Vec<PolicyRule>,
}

fn default_anonymous_role() -> String {
    DEFAULT_ANONYMOUS_ROLE.to_string()
}

impl PolicySet {
    pub fn from_yaml(source: &str) -> Result<Self, PolicyError> {
        let set: PolicySet = serde_yaml::from_str(source)?;
        if set.rules.is_empty() {
            return Err(PolicyError::Empty);
        }
        Ok(set)
    }
}

/// Shared enforcer. Swapped wholesale on reload, so readers never observe a
/// half-loaded rule set.
pub struct PolicyEnforcer {
    source: Option<PathBuf>,
    policy: RwLock<PolicySet>,
}

impl PolicyEnforcer {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref().to_path_buf();
        let policy = read_policy(&path).await?;
        info!("Loaded {} policy rules from {}", policy.rules.len(), path.display());
        Ok(Self { source: Some(path), policy: RwLock::new(policy) })
    }

    pub fn from_set(policy: PolicySet) -> Self {
        Self { source: None, policy: RwLock::new(policy) }
    }

    pub async fn anonymous_role(&self) -> String {
        self.policy.read().await.anonymous_role.clone()
    }

    pub async fn enforce(&self, role: &str, path: &str, method: &str) -> bool {
        let policy = self.policy.read().await;
        let roles = [role, policy.anonymous_role.as_str()];
        let allowed = policy.rules.iter().any(|rule| rule.allows(roles, path, method));
        debug!(role, path, method, allowed, "policy decision");
        allowed
    }

    /// Re-read the policy file. On failure the current rules stay in force.
    pub async fn reload(&self) -> Result<usize, PolicyError> {
        let Some(path) = &self.source else {
            return Ok(self.policy.read().await.rules.len());
        };
        let policy = read_policy(path).await?;
        let count = policy.rules.len();
        *self.policy.write().await = policy;
        info!("Reloaded {} policy rules from {}", count, path.display());
        Ok(count)
    }
}

async fn read_policy(path: &Path) -> Result<PolicySet, PolicyError> {
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PolicyError::Io { path: path.to_path_buf(), source })?;
    PolicySet::from_yaml(&source)
}

/// Segment-wise path match with `:param` and trailing `*` wildcards.
pub fn key_match(path: &str, pattern: &str) -> bool {
    let mut path_segments = path.trim_end_matches('/').split('/');
    let mut pattern_segments = pattern.trim_end_matches('/').split('/');

    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (Some("*"), _) => return pattern_segments.next().is_none(),
            (Some(p), Some(s)) if p.starts_with(':') && !s.is_empty() => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"
rules:
  - role: unauthorized
    path: /v1/auth/login
    methods: [POST]
  - role: user
    path: /v1/business/*
    methods: [GET]
  - role: admin
    path: /v1/user/:id
    methods: [GET, DELETE]
  - role: superadmin
    path: /*
"#;

    #[test]
    fn key_match_wildcards() {
        assert!(key_match("/v1/business/list", "/v1/business/*"));
        assert!(key_match("/v1/business", "/v1/business/*"));
        assert!(key_match("/v1/user/42", "/v1/user/:id"));
        assert!(!key_match("/v1/user/42/extra", "/v1/user/:id"));
        assert!(!key_match("/v1/users", "/v1/user/*"));
        assert!(key_match("/healthz", "/healthz"));
        assert!(key_match("/anything/at/all", "/*"));
    }

    #[tokio::test]
    async fn enforces_role_path_and_method() {
        let enforcer = PolicyEnforcer::from_set(PolicySet::from_yaml(POLICY).unwrap());
        assert_eq!(enforcer.anonymous_role().await, "unauthorized");

        assert!(enforcer.enforce("unauthorized", "/v1/auth/login", "POST").await);
        assert!(!enforcer.enforce("unauthorized", "/v1/business/list", "GET").await);
        assert!(enforcer.enforce("user", "/v1/business/list", "GET").await);
        assert!(enforcer.enforce("user", "/v1/auth/login", "POST").await);
        assert!(!enforcer.enforce("user", "/v1/business", "POST").await);
        assert!(enforcer.enforce("admin", "/v1/user/7", "delete").await);
        assert!(enforcer.enforce("superadmin", "/v1/session/list", "PATCH").await);
    }

    #[test]
    fn empty_policy_is_rejected() {
        assert!(matches!(PolicySet::from_yaml("rules: []"), Err(PolicyError::Empty)));
    }

    #[tokio::test]
    async fn reload_keeps_rules_when_file_breaks() {
        let dir = std::env::temp_dir().join(format!("policy-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("policy.yaml");
        std::fs::write(&path, POLICY).unwrap();

        let enforcer = PolicyEnforcer::load(&path).await.unwrap();
        std::fs::write(&path, "rules: [").unwrap();
        assert!(enforcer.reload().await.is_err());
        assert!(enforcer.enforce("user", "/v1/business/list", "GET").await);

        std::fs::write(&path, "rules:\n  - role: user\n    path: /v1/session/*\n").unwrap();
        assert_eq!(enforcer.reload().await.unwrap(), 1);
        assert!(!enforcer.enforce("user", "/v1/business/list", "GET").await);

        std::fs::remove_dir_all(&dir).ok();
    }
}
