//! Authentication: password hashing, bearer tokens and the session extractors.
//!
//! A request carrying `Authorization: Bearer <access>` resolves to a [`Session`],
//! one variant per role. Handlers that only make sense for one role take
//! [`StudentSession`], [`StaffSession`] or [`AdminSession`] instead, which reject
//! the other roles with 403.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::lifecycle::Actor;
use crate::models::{Role, User};
use crate::{db, AppState};

pub mod password;
pub mod token;

pub use token::{Claims, TokenKeys, TokenKind};

/// An authenticated account, tagged by role.
#[derive(Debug, Clone)]
pub enum Session {
    Student(User),
    Staff(User),
    Admin(User),
}

impl Session {
    pub fn user(&self) -> &User {
        match self {
            Session::Student(u) | Session::Staff(u) | Session::Admin(u) => u,
        }
    }

    /// The same account as seen by the complaint lifecycle rules.
    pub fn actor(&self) -> Actor {
        match self {
            Session::Student(u) => Actor::Student(u.id),
            Session::Staff(u) => Actor::Staff(u.id),
            Session::Admin(u) => Actor::Admin(u.id),
        }
    }
}

impl From<User> for Session {
    fn from(user: User) -> Self {
        match user.role {
            Role::Student => Session::Student(user),
            Role::Staff => Session::Staff(user),
            Role::Admin => Session::Admin(user),
        }
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(AppError::Unauthorized)?;
        let claims = state.tokens.verify(token, TokenKind::Access)?;

        // Reload so that deactivation takes effect before the token expires.
        let user = db::accounts::find_by_id(&state.pool, claims.user_id()?)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::Unauthorized)?;

        Ok(Session::from(user))
    }
}

macro_rules! role_session {
    ($(#[$meta:meta])* $name:ident, $variant:ident, $denied:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(pub User);

        #[axum::async_trait]
        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
                match Session::from_request_parts(parts, state).await? {
                    Session::$variant(user) => Ok($name(user)),
                    _ => Err(AppError::forbidden($denied)),
                }
            }
        }
    };
}

role_session!(
    /// A signed-in student.
    StudentSession, Student, "Student access required"
);
role_session!(
    /// A signed-in staff member.
    StaffSession, Staff, "Staff access required"
);
role_session!(
    /// A signed-in admin.
    AdminSession, Admin, "Admin access required"
);

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::lifecycle::{self, LifecycleError};
    use crate::models::Complaint;

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            email: format!("u{id}@stayease.test"),
            full_name: "Test".into(),
            mobile_number: None,
            role,
            password_hash: String::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn session_follows_stored_role() {
        assert_eq!(Session::from(user(1, Role::Student)).actor(), Actor::Student(1));
        assert_eq!(Session::from(user(2, Role::Staff)).actor(), Actor::Staff(2));
        assert_eq!(Session::from(user(3, Role::Admin)).actor(), Actor::Admin(3));
    }

    #[test]
    fn student_session_is_no_chat_participant() {
        let mut c = Complaint::sample();
        c.status = crate::models::ComplaintStatus::InProgress;
        c.assigned_to = Some(2);
        c.escalated = true;
        c.escalated_by = Some(2);

        let student = Session::from(user(c.student_id, Role::Student));
        assert_eq!(
            lifecycle::chat(&c, student.actor(), Some("any news?")),
            Err(LifecycleError::NotParticipant)
        );
        let staff = Session::from(user(2, Role::Staff));
        assert!(lifecycle::chat(&c, staff.actor(), Some("on it")).is_ok());
    }
}
