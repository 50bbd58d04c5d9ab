use anyhow::Error;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewCatalog,
    ViewLessons,
    RequestEnrollment,
    TrackProgress,
    EditOwnProfile,

    ManageCourses,
    ManageLessons,
    ApproveAccounts,
    ApproveEnrollments,
    ManageAccounts,
    ViewStatistics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Admin,
}

static TEACHER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewCatalog);
    permissions.insert(Permission::ViewLessons);
    permissions.insert(Permission::RequestEnrollment);
    permissions.insert(Permission::TrackProgress);
    permissions.insert(Permission::EditOwnProfile);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(TEACHER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManageCourses);
    permissions.insert(Permission::ManageLessons);
    permissions.insert(Permission::ApproveAccounts);
    permissions.insert(Permission::ApproveEnrollments);
    permissions.insert(Permission::ManageAccounts);
    permissions.insert(Permission::ViewStatistics);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Teacher => &TEACHER_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// The one place the admin bypass is defined. Privileged roles are
    /// implicitly approved, never enrolled and never progress-tracked.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    /// Unknown stored roles fall back to the least privileged role.
    pub fn from_db(value: Option<&str>) -> Self {
        value
            .and_then(|s| s.parse().ok())
            .unwrap_or(Role::Teacher)
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
