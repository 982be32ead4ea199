//! Flattening of raw access-control lists into a principal → level map.
//!
//! The platform returns ACL entries in two shapes: query responses nest the
//! level inside an `all_permissions` array, while grant echoes carry a flat
//! `permission_level` field. Both are modeled explicitly and flattened the
//! same way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fallback level when an entry carries neither shape.
pub const UNKNOWN_LEVEL: &str = "UNKNOWN";

/// Principal → permission level. BTreeMap so printed snapshots are
/// deterministic.
pub type PermissionMap = BTreeMap<String, String>;

/// One nested grant inside `all_permissions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_level: Option<String>,
}

/// One raw entry of an `access_control_list` array.
///
/// Group and service-principal grants come back without `user_name`; those
/// are skipped during flattening since the map is keyed by user principal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AclEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_permissions: Vec<PermissionGrant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_level: Option<String>,
}

impl AclEntry {
    /// The effective level: first nested grant, else the flat field, else
    /// [`UNKNOWN_LEVEL`].
    fn effective_level(&self) -> String {
        if let Some(first) = self.all_permissions.first() {
            return first
                .permission_level
                .clone()
                .unwrap_or_else(|| UNKNOWN_LEVEL.to_string());
        }
        self.permission_level
            .clone()
            .unwrap_or_else(|| UNKNOWN_LEVEL.to_string())
    }
}

/// Collapse raw entries into a principal → level map. Later entries for the
/// same principal overwrite earlier ones (map semantics, not append).
pub fn flatten(entries: &[AclEntry]) -> PermissionMap {
    let mut map = PermissionMap::new();
    for entry in entries {
        let Some(user) = entry.user_name.as_deref() else {
            tracing::debug!("skipping ACL entry without user_name");
            continue;
        };
        map.insert(user.to_string(), entry.effective_level());
    }
    map
}
