use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::scope::AccessScope;

#[derive(Deserialize)]
struct RolesFile {
    #[serde(default)]
    admins: Vec<AccessScope>,
}

/// Administrator access scopes loaded from the roles file.
#[derive(Debug, Clone, Default)]
pub struct RoleDirectory {
    admins: Vec<AccessScope>,
}

impl RoleDirectory {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read roles file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid roles file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let file: RolesFile = serde_json::from_str(raw)?;
        Ok(Self {
            admins: file.admins,
        })
    }

    pub fn find(&self, admin_id: &str) -> Option<&AccessScope> {
        self.admins.iter().find(|admin| admin.id() == admin_id)
    }

    pub fn all(&self) -> &[AccessScope] {
        &self.admins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeKind;

    const ROLES: &str = r#"{
        "admins": [
            {"admin_id":"A001","name":"Priya Shah","scope_type":"grade","scope_values":["8"]},
            {"admin_id":"A002","name":"Marcus Cole","scope_type":"class","scope_values":["8A","9B"]},
            {"admin_id":"A003","name":"Dana Ruiz","scope_type":"region","scope_values":["North"]}
        ]
    }"#;

    #[test]
    fn finds_admins_by_id() {
        let roles = RoleDirectory::from_json(ROLES).unwrap();
        assert_eq!(roles.all().len(), 3);

        let admin = roles.find("A002").unwrap();
        assert_eq!(admin.kind(), ScopeKind::Class);
        assert!(admin.permits("9B"));
        assert!(roles.find("A404").is_none());
    }

    #[test]
    fn rejects_admins_without_scope_values() {
        let raw = r#"{"admins":[{"admin_id":"A9","name":"Empty","scope_type":"class","scope_values":[]}]}"#;
        assert!(RoleDirectory::from_json(raw).is_err());
    }
}
