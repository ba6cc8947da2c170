use std::collections::BTreeSet;

use tracing::debug;

use crate::host::IdentityDirectory;

pub const CHANNEL_ADMIN_ROLE: &str = "channel_admin";
pub const TEAM_ADMIN_ROLE: &str = "team_admin";
pub const SYSTEM_ADMIN_ROLE: &str = "system_admin";

const ADMIN_ROLES: [&str; 3] = [CHANNEL_ADMIN_ROLE, TEAM_ADMIN_ROLE, SYSTEM_ADMIN_ROLE];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: BTreeSet<String>,
}

impl RoleSet {
    pub fn parse(raw: &str) -> Self {
        Self { roles: raw.split_whitespace().map(str::to_owned).collect() }
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        ADMIN_ROLES.iter().any(|role| self.contains(role))
    }
}

/// A caller the directory cannot resolve is never an admin.
pub async fn is_admin(identity: &dyn IdentityDirectory, user_id: &str) -> bool {
    match identity.user(user_id).await {
        Ok(profile) => RoleSet::parse(&profile.roles).is_admin(),
        Err(error) => {
            debug!(
                event_name = "plugin.permissions.lookup_failed",
                user_id,
                error = %error,
                "caller lookup failed; treating as non-admin"
            );
            false
        }
    }
}
