// src/models/user.rs

use serde::{Deserialize, Serialize};

/// Role carried in the caller's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "student" => Some(Role::Student),
            "instructor" => Some(Role::Instructor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Identity of whoever is invoking an operation.
/// Passed explicitly into every lifecycle and report call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: i64,
    pub role: Role,
}

impl Caller {
    pub fn student(id: i64) -> Self {
        Self { id, role: Role::Student }
    }

    pub fn instructor(id: i64) -> Self {
        Self { id, role: Role::Instructor }
    }

    /// Instructors and admins bypass ownership and grading-state checks.
    pub fn is_privileged(&self) -> bool {
        matches!(self.role, Role::Instructor | Role::Admin)
    }
}

/// Represents the 'students' table, as seen by this crate.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: i64,
    pub name: String,
}
