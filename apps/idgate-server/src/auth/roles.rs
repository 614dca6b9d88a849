// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// ## Role Hierarchy
///
/// - `Admin` - Full access, including mass session invalidation
/// - `Operator` - Back-office staff
/// - `User` - Regular account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Back-office operator
    Operator,
    /// Regular user
    User,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::Operator, Role::Operator | Role::User) => true,
            (Role::User, Role::User) => true,
            _ => false,
        }
    }

    /// Map a stored role id to a role.
    pub fn from_id(id: i64) -> Option<Role> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Operator),
            3 => Some(Role::User),
            _ => None,
        }
    }

    /// Stored role id.
    pub fn id(&self) -> i64 {
        match self {
            Role::Admin => 1,
            Role::Operator => 2,
            Role::User => 3,
        }
    }
}

impl Default for Role {
    /// Least privilege.
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Operator => write!(f, "operator"),
            Role::User => write!(f, "user"),
        }
    }
}
