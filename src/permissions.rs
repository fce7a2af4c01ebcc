//! Effective host permission of a user, computed from user group rights.

use crate::api::{UserGroupRecord, UserRecord};
use crate::core::Permission;
use std::collections::HashMap;

impl Permission {
    /// Maps a host group right code (`0` deny, `2` read, `3` read-write).
    pub fn from_code(code: &str) -> Permission {
        match code {
            "0" => Permission::Deny,
            "2" => Permission::Read,
            "3" => Permission::ReadWrite,
            _ => Permission::None,
        }
    }
}

/// Computes what `user` may do on a host belonging to `host_groups`.
///
/// Super admins may do everything. Otherwise the rights of every group the
/// user belongs to are combined per host group, where an explicit deny in
/// any group wins, and the host gets the best of its host groups.
pub fn host_permission(
    user: &UserRecord,
    user_groups: &[UserGroupRecord],
    host_groups: &[String],
) -> Permission {
    if user.is_super_admin() {
        return Permission::ReadWrite;
    }

    let mut per_group: HashMap<&str, Permission> = HashMap::new();
    let memberships = user_groups
        .iter()
        .filter(|g| user.usrgrps.iter().any(|m| m.usrgrpid == g.usrgrpid));
    for group in memberships {
        for right in &group.hostgroup_rights {
            let granted = Permission::from_code(&right.permission);
            per_group
                .entry(right.id.as_str())
                .and_modify(|current| *current = combine(*current, granted))
                .or_insert(granted);
        }
    }

    host_groups
        .iter()
        .filter_map(|id| per_group.get(id.as_str()).copied())
        .filter(|p| *p != Permission::Deny)
        .max()
        .unwrap_or(Permission::None)
}

fn combine(a: Permission, b: Permission) -> Permission {
    if a == Permission::Deny || b == Permission::Deny {
        Permission::Deny
    } else {
        a.max(b)
    }
}
