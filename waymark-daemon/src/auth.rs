//! Operator authorization for socket commands that touch the map.

use std::collections::BTreeSet;

use waymark_core::config::OperatorConfig;

pub const PERMISSION_DENIED: &str = "You don't have permission to use this command.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorPolicy {
    permission: String,
    granted: BTreeSet<String>,
}

impl OperatorPolicy {
    pub fn new(permission: impl Into<String>, granted: impl IntoIterator<Item = String>) -> Self {
        Self {
            permission: permission.into(),
            granted: granted.into_iter().collect(),
        }
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }

    /// `Ok(actor)` when `actor` holds the permission, otherwise the denial
    /// text shown to the operator.
    pub fn authorize<'a>(&self, actor: Option<&'a str>) -> Result<&'a str, &'static str> {
        match actor.map(str::trim) {
            Some(actor) if !actor.is_empty() && self.granted.contains(actor) => Ok(actor),
            _ => Err(PERMISSION_DENIED),
        }
    }
}

impl From<&OperatorConfig> for OperatorPolicy {
    fn from(config: &OperatorConfig) -> Self {
        Self::new(config.permission.clone(), config.granted.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_granted_actors_pass() {
        let policy = OperatorPolicy::new("waystonewarps.map.reload", ["alice".to_string()]);
        assert_eq!(policy.authorize(Some("alice")), Ok("alice"));
        assert_eq!(policy.authorize(Some(" alice ")), Ok("alice"));
        assert_eq!(policy.authorize(Some("mallory")), Err(PERMISSION_DENIED));
        assert_eq!(policy.authorize(Some("")), Err(PERMISSION_DENIED));
        assert_eq!(policy.authorize(None), Err(PERMISSION_DENIED));
    }

    #[test]
    fn built_from_operator_config() {
        let mut config = OperatorConfig::default();
        config.granted.insert("bob".into());
        let policy = OperatorPolicy::from(&config);
        assert_eq!(policy.permission(), "waystonewarps.map.reload");
        assert!(policy.authorize(Some("bob")).is_ok());
    }
}
