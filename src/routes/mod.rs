// src/routes/mod.rs

use serde::{Deserialize, Deserializer};

use crate::auth::Session;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::lifecycle;
use crate::models::ChatMessage;
use crate::AppState;

pub mod accounts;
pub mod admin_complaints;
pub mod broadcasts;
pub mod complaints;
pub mod health;
pub mod inventory;
pub mod maintenance;
pub mod reports;
pub mod staff_complaints;
pub mod staffs;
pub mod students;
pub mod support;

// Compare-and-set guard: an UPDATE that matched no row lost a race.
pub(crate) fn ensure_applied(rows_affected: u64, err: impl Into<AppError>) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(err.into());
    }
    Ok(())
}

/// The row no longer matches the state the checks ran against.
pub(crate) fn stale() -> AppError {
    AppError::conflict("Complaint changed meanwhile, reload and retry")
}

/// Posts to an escalation chat as whoever holds `session` and returns the
/// updated history.
pub(crate) async fn reply_to_escalation(
    state: &AppState,
    session: &Session,
    complaint_id: i64,
    message: &str,
) -> AppResult<Vec<ChatMessage>> {
    let c = db::complaints::get(&state.pool, complaint_id).await?;
    let sender = lifecycle::chat(&c, session.actor(), Some(message))?;
    let rows = db::complaints::append_chat(&state.pool, complaint_id, session.user().id, sender, message).await?;
    ensure_applied(rows, stale())?;
    db::complaints::chat_history(&state.pool, complaint_id).await
}

/// Tells an explicit `null` (`Some(None)`) apart from a missing field (`None`).
/// Pair with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Trimmed, non-empty text or `None`.
pub(crate) fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Query-string filter value; blank and `All` mean "no filter".
pub(crate) fn filter_value(s: &Option<String>) -> Option<&str> {
    non_blank(s.as_deref()).filter(|s| !s.eq_ignore_ascii_case("all"))
}
