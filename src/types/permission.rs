use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const ADMIN: &str = "admin";
pub const CREATE: &str = "create";
pub const READ: &str = "read";
pub const UPDATE: &str = "update";
pub const DELETE: &str = "delete";

/// Permissions defined on every resource at creation time.
pub const STANDARD_PERMISSIONS: [&str; 5] = [ADMIN, CREATE, READ, UPDATE, DELETE];

const MAX_PERMISSION_NAME_LEN: usize = 64;

/// PermissionSet is the sorted, duplicate-free set of permission names a
/// holder has on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every standard permission.
    #[must_use]
    pub fn standard() -> Self {
        STANDARD_PERMISSIONS.iter().copied().collect()
    }

    /// Returns true if the set contains the named permission.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    /// Combines two permission sets.
    #[must_use]
    pub fn union(mut self, other: &PermissionSet) -> PermissionSet {
        self.0.extend(other.0.iter().cloned());
        self
    }

    /// Keeps only the names listed in `allowed`.
    #[must_use]
    pub fn intersect(self, allowed: &[String]) -> PermissionSet {
        PermissionSet(
            self.0
                .into_iter()
                .filter(|name| allowed.iter().any(|a| a == name))
                .collect(),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the permission names in sorted order.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().collect();
        write!(f, "{}", names.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for PermissionSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Checks that a permission name is non-empty, bounded, and made of
/// lowercase alphanumerics, hyphens, underscores, colons or periods.
pub fn validate_permission_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Permission name cannot be empty".to_string());
    }
    if name.len() > MAX_PERMISSION_NAME_LEN {
        return Err(format!(
            "Permission name cannot exceed {MAX_PERMISSION_NAME_LEN} characters"
        ));
    }
    let valid = |c: char| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | ':' | '.')
    };
    if !name.chars().all(valid) {
        return Err(format!("Invalid permission name: {name}"));
    }
    Ok(())
}
