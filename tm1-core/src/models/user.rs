//! Active user model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A security group reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    /// Group name.
    pub name: String,
}

/// The user behind the current session, from `GET /ActiveUser?$expand=Groups`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActiveUser {
    /// Login name.
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub friendly_name: Option<String>,
    /// Whether the account is enabled.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Server-side user type (`Admin`, `DataAdmin`, `User`, ...), when reported.
    #[serde(rename = "Type", default)]
    pub user_type: Option<String>,
    /// Group memberships.
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Any other properties the server returned.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl ActiveUser {
    fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g.name.eq_ignore_ascii_case(group))
    }

    fn has_type(&self, user_type: &str) -> bool {
        self.user_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(user_type))
    }

    /// Full administrator.
    pub fn is_admin(&self) -> bool {
        self.in_group("ADMIN") || self.has_type("Admin")
    }

    /// Data administrator (admins included).
    pub fn is_data_admin(&self) -> bool {
        self.is_admin() || self.in_group("DataAdmin") || self.has_type("DataAdmin")
    }

    /// Security administrator (admins included).
    pub fn is_security_admin(&self) -> bool {
        self.is_admin() || self.in_group("SecurityAdmin") || self.has_type("SecurityAdmin")
    }

    /// Operations administrator (admins included).
    pub fn is_ops_admin(&self) -> bool {
        self.is_admin() || self.in_group("OperationsAdmin") || self.has_type("OperationsAdmin")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_active_user() {
        let json = r#"{
            "Name": "alice",
            "FriendlyName": "Alice",
            "Enabled": true,
            "Type": "User",
            "Groups": [{"Name": "DataAdmin"}, {"Name": "Sales"}],
            "IsActive": true
        }"#;

        let user: ActiveUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.name, "alice");
        assert!(!user.is_admin());
        assert!(user.is_data_admin());
        assert!(!user.is_security_admin());
        assert_eq!(user.extensions.get("IsActive"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_admin_implies_all_roles() {
        let user = ActiveUser {
            name: "admin".into(),
            groups: vec![Group { name: "admin".into() }],
            ..Default::default()
        };
        assert!(user.is_admin());
        assert!(user.is_data_admin());
        assert!(user.is_security_admin());
        assert!(user.is_ops_admin());
    }
}
