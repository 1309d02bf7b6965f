//! The signed-in user and privilege checks.

use std::sync::Arc;

use tm1_core::{ActiveUser, CoreError};
use tm1_rest::{RestApi, RestApiExt, Result};

/// Reads `/ActiveUser`.
#[derive(Clone)]
pub struct UserService {
    rest: Arc<dyn RestApi>,
}

impl UserService {
    /// Creates the service.
    pub fn new(rest: Arc<dyn RestApi>) -> Self {
        Self { rest }
    }

    /// The user the session is signed in as, with groups.
    pub async fn active_user(&self) -> Result<ActiveUser> {
        self.rest.get_json("/ActiveUser?$expand=Groups").await
    }

    /// Fails unless the user is an administrator.
    pub async fn require_admin(&self) -> Result<()> {
        let user = self.active_user().await?;
        if user.is_admin() {
            Ok(())
        } else {
            Err(privilege_required(&user, "Admin"))
        }
    }

    /// Fails unless the user is a data administrator.
    pub async fn require_data_admin(&self) -> Result<()> {
        let user = self.active_user().await?;
        if user.is_data_admin() {
            Ok(())
        } else {
            Err(privilege_required(&user, "DataAdmin"))
        }
    }

    /// Fails unless the user is a security administrator.
    pub async fn require_security_admin(&self) -> Result<()> {
        let user = self.active_user().await?;
        if user.is_security_admin() {
            Ok(())
        } else {
            Err(privilege_required(&user, "SecurityAdmin"))
        }
    }

    /// Fails unless the user is an operations administrator.
    pub async fn require_ops_admin(&self) -> Result<()> {
        let user = self.active_user().await?;
        if user.is_ops_admin() {
            Ok(())
        } else {
            Err(privilege_required(&user, "OperationsAdmin"))
        }
    }
}

fn privilege_required(user: &ActiveUser, role: &str) -> tm1_rest::Tm1Error {
    CoreError::PrivilegeRequired(format!("{role} role required, {} does not have it", user.name))
        .into()
}
