//! Complaint lifecycle rules.
//!
//! Every mutation of a complaint goes through one of the checks below before it
//! touches the database. The checks are pure: they look at a snapshot of the
//! complaint and the acting account and either allow the change or say why not.
//! The persistence layer then applies the change with a compare-and-set update
//! so a concurrent writer cannot slip past a check that already passed.
//!
//! ```text
//! Submitted ──assign──▶ In Progress ──resolve──▶ Resolved ──close──▶ Closed
//!                            │
//!                            └─ escalate (flag, opens chat)
//! ```

use thiserror::Error;

use crate::models::{ChatSender, Complaint, ComplaintStatus};

/// Who is acting on a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Student(i64),
    Staff(i64),
    Admin(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Complaint is closed and can no longer be changed")]
    Closed,
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ComplaintStatus,
        to: ComplaintStatus,
    },
    #[error("Priority is locked and cannot be changed")]
    PriorityLocked,
    #[error("Complaint already has an assigned staff member")]
    AlreadyAssigned,
    #[error("Complaint is not assigned to you")]
    NotAssignee,
    #[error("Resolution notes required")]
    MissingResolutionNotes,
    #[error("Escalation note is required")]
    MissingEscalationNote,
    #[error("Only complaints in progress can be escalated")]
    NotEscalatable,
    #[error("Complaint is already escalated")]
    AlreadyEscalated,
    #[error("Complaint is not escalated")]
    NotEscalated,
    #[error("Message is required")]
    EmptyMessage,
    #[error("Not a participant of this escalation")]
    NotParticipant,
    #[error("Cannot close complaint before student feedback")]
    RatingRequired,
    #[error("Complaint not eligible for rating")]
    NotRateable,
    #[error("Rating already submitted")]
    AlreadyRated,
    #[error("Rating must be between 1 and 5")]
    RatingOutOfRange,
    #[error("Complaint does not belong to you")]
    NotOwner,
}

pub type Check<T = ()> = Result<T, LifecycleError>;

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn ensure_open(c: &Complaint) -> Check {
    if c.status == ComplaintStatus::Closed {
        return Err(LifecycleError::Closed);
    }
    Ok(())
}

/// Validates a new complaint filed by a student.
pub fn submit(description: &str, hostel_id: &str) -> Check {
    if description.trim().is_empty() {
        return Err(LifecycleError::MissingField("description"));
    }
    if hostel_id.trim().is_empty() {
        return Err(LifecycleError::MissingField("hostel_id"));
    }
    Ok(())
}

/// Admin priority edit. The first success flips the latch for good.
pub fn set_priority(c: &Complaint) -> Check {
    ensure_open(c)?;
    if c.priority_locked {
        return Err(LifecycleError::PriorityLocked);
    }
    Ok(())
}

/// Admin assignment of a staff member. Returns the status the complaint moves to.
pub fn assign(c: &Complaint) -> Check<ComplaintStatus> {
    ensure_open(c)?;
    if c.assigned_to.is_some() {
        return Err(LifecycleError::AlreadyAssigned);
    }
    if c.status != ComplaintStatus::Submitted {
        return Err(LifecycleError::InvalidTransition {
            from: c.status,
            to: ComplaintStatus::InProgress,
        });
    }
    Ok(ComplaintStatus::InProgress)
}

/// Staff status update on a complaint assigned to them.
pub fn staff_update(c: &Complaint, staff_id: i64, to: ComplaintStatus, notes: Option<&str>) -> Check {
    ensure_open(c)?;
    if c.assigned_to != Some(staff_id) {
        return Err(LifecycleError::NotAssignee);
    }
    match (c.status, to) {
        (ComplaintStatus::Submitted, ComplaintStatus::InProgress) => Ok(()),
        (ComplaintStatus::InProgress, ComplaintStatus::Resolved) => {
            non_empty(notes).ok_or(LifecycleError::MissingResolutionNotes)?;
            Ok(())
        }
        (from, to) => Err(LifecycleError::InvalidTransition { from, to }),
    }
}

/// Admin closure. Requires a resolved complaint that the student has rated.
pub fn close(c: &Complaint, has_rating: bool) -> Check {
    ensure_open(c)?;
    if c.status != ComplaintStatus::Resolved {
        return Err(LifecycleError::InvalidTransition {
            from: c.status,
            to: ComplaintStatus::Closed,
        });
    }
    if !has_rating {
        return Err(LifecycleError::RatingRequired);
    }
    Ok(())
}

/// Admin status change outside the dedicated assign/close actions (bulk updates).
///
/// Only transitions an admin may perform on their own are allowed: starting work
/// on an already-assigned complaint and closing a rated one. Resolution stays a
/// staff action because it needs resolution notes.
pub fn admin_set_status(c: &Complaint, to: ComplaintStatus, has_rating: bool) -> Check {
    ensure_open(c)?;
    match (c.status, to) {
        (ComplaintStatus::Submitted, ComplaintStatus::InProgress) if c.assigned_to.is_some() => Ok(()),
        (ComplaintStatus::Resolved, ComplaintStatus::Closed) => close(c, has_rating),
        (from, to) => Err(LifecycleError::InvalidTransition { from, to }),
    }
}

/// Staff escalation to the admin pool.
pub fn escalate(c: &Complaint, staff_id: i64, note: Option<&str>) -> Check {
    ensure_open(c)?;
    if c.assigned_to != Some(staff_id) {
        return Err(LifecycleError::NotAssignee);
    }
    if c.status != ComplaintStatus::InProgress {
        return Err(LifecycleError::NotEscalatable);
    }
    if c.escalated {
        return Err(LifecycleError::AlreadyEscalated);
    }
    non_empty(note).ok_or(LifecycleError::MissingEscalationNote)?;
    Ok(())
}

/// Appending to the escalation chat. Returns which side the message is from.
pub fn chat(c: &Complaint, actor: Actor, message: Option<&str>) -> Check<ChatSender> {
    ensure_open(c)?;
    if !c.escalated {
        return Err(LifecycleError::NotEscalated);
    }
    let sender = match actor {
        Actor::Admin(_) => ChatSender::Admin,
        Actor::Staff(id) if c.escalated_by == Some(id) || c.assigned_to == Some(id) => ChatSender::Staff,
        Actor::Staff(_) | Actor::Student(_) => return Err(LifecycleError::NotParticipant),
    };
    non_empty(message).ok_or(LifecycleError::EmptyMessage)?;
    Ok(sender)
}

/// Student feedback on a resolved complaint.
pub fn rate(c: &Complaint, student_id: i64, has_rating: bool, stars: i64) -> Check {
    if c.student_id != student_id {
        return Err(LifecycleError::NotOwner);
    }
    if has_rating {
        return Err(LifecycleError::AlreadyRated);
    }
    if c.status != ComplaintStatus::Resolved {
        return Err(LifecycleError::NotRateable);
    }
    if !(1..=5).contains(&stars) {
        return Err(LifecycleError::RatingOutOfRange);
    }
    Ok(())
}

/// Removes repeated ids from a bulk request, keeping first-seen order.
pub fn dedupe_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complaint() -> Complaint {
        Complaint::sample()
    }

    fn in_progress(staff: i64) -> Complaint {
        Complaint {
            status: ComplaintStatus::InProgress,
            assigned_to: Some(staff),
            ..complaint()
        }
    }

    #[test]
    fn submission_requires_description_and_hostel() {
        assert_eq!(submit("  ", "A-204"), Err(LifecycleError::MissingField("description")));
        assert_eq!(submit("Leak", ""), Err(LifecycleError::MissingField("hostel_id")));
        assert!(submit("Leak", "A-204").is_ok());
    }

    #[test]
    fn priority_latch() {
        let mut c = complaint();
        assert!(set_priority(&c).is_ok());
        c.priority_locked = true;
        assert_eq!(set_priority(&c), Err(LifecycleError::PriorityLocked));
    }

    #[test]
    fn assign_only_unassigned_submitted() {
        assert_eq!(assign(&complaint()), Ok(ComplaintStatus::InProgress));
        assert_eq!(assign(&in_progress(5)), Err(LifecycleError::AlreadyAssigned));

        let orphan = Complaint { status: ComplaintStatus::Resolved, ..complaint() };
        assert!(matches!(assign(&orphan), Err(LifecycleError::InvalidTransition { .. })));
    }

    #[test]
    fn staff_resolution_requires_notes_and_assignment() {
        let c = in_progress(5);
        assert_eq!(
            staff_update(&c, 5, ComplaintStatus::Resolved, Some("   ")),
            Err(LifecycleError::MissingResolutionNotes)
        );
        assert_eq!(
            staff_update(&c, 6, ComplaintStatus::Resolved, Some("Fixed")),
            Err(LifecycleError::NotAssignee)
        );
        assert!(staff_update(&c, 5, ComplaintStatus::Resolved, Some("Fixed")).is_ok());
    }

    #[test]
    fn staff_cannot_skip_or_reverse() {
        let c = in_progress(5);
        assert!(matches!(
            staff_update(&c, 5, ComplaintStatus::Closed, None),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            staff_update(&c, 5, ComplaintStatus::Submitted, None),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn close_is_gated_on_rating() {
        let resolved = Complaint { status: ComplaintStatus::Resolved, ..in_progress(5) };
        assert_eq!(close(&resolved, false), Err(LifecycleError::RatingRequired));
        assert!(close(&resolved, true).is_ok());
        assert!(matches!(close(&in_progress(5), true), Err(LifecycleError::InvalidTransition { .. })));
    }

    #[test]
    fn closed_is_terminal() {
        let closed = Complaint { status: ComplaintStatus::Closed, escalated: true, ..in_progress(5) };
        assert_eq!(set_priority(&closed), Err(LifecycleError::Closed));
        assert_eq!(close(&closed, true), Err(LifecycleError::Closed));
        assert_eq!(chat(&closed, Actor::Admin(1), Some("hi")), Err(LifecycleError::Closed));
        assert_eq!(escalate(&closed, 5, Some("x")), Err(LifecycleError::Closed));
    }

    #[test]
    fn admin_bulk_status_rules() {
        let resolved = Complaint { status: ComplaintStatus::Resolved, ..in_progress(5) };
        assert!(admin_set_status(&resolved, ComplaintStatus::Closed, true).is_ok());
        assert_eq!(
            admin_set_status(&resolved, ComplaintStatus::Closed, false),
            Err(LifecycleError::RatingRequired)
        );
        assert!(matches!(
            admin_set_status(&in_progress(5), ComplaintStatus::Resolved, false),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            admin_set_status(&complaint(), ComplaintStatus::InProgress, false),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn escalation_rules() {
        let c = in_progress(5);
        assert_eq!(escalate(&c, 5, None), Err(LifecycleError::MissingEscalationNote));
        assert_eq!(escalate(&complaint(), 5, Some("x")), Err(LifecycleError::NotAssignee));
        assert!(escalate(&c, 5, Some("Needs plumber license")).is_ok());

        let escalated = Complaint { escalated: true, escalated_by: Some(5), ..c };
        assert_eq!(escalate(&escalated, 5, Some("again")), Err(LifecycleError::AlreadyEscalated));
    }

    #[test]
    fn chat_participants() {
        let c = in_progress(5);
        assert_eq!(chat(&c, Actor::Admin(1), Some("hi")), Err(LifecycleError::NotEscalated));

        let escalated = Complaint { escalated: true, escalated_by: Some(5), ..c };
        assert_eq!(chat(&escalated, Actor::Staff(5), Some("update")), Ok(ChatSender::Staff));
        assert_eq!(chat(&escalated, Actor::Admin(1), Some("ok")), Ok(ChatSender::Admin));
        assert_eq!(chat(&escalated, Actor::Staff(9), Some("me too")), Err(LifecycleError::NotParticipant));
        assert_eq!(chat(&escalated, Actor::Student(10), Some("?")), Err(LifecycleError::NotParticipant));
        assert_eq!(chat(&escalated, Actor::Admin(1), Some(" ")), Err(LifecycleError::EmptyMessage));
    }

    #[test]
    fn rating_rules() {
        let resolved = Complaint { status: ComplaintStatus::Resolved, ..in_progress(5) };
        assert!(rate(&resolved, 10, false, 4).is_ok());
        assert_eq!(rate(&resolved, 11, false, 4), Err(LifecycleError::NotOwner));
        assert_eq!(rate(&resolved, 10, true, 4), Err(LifecycleError::AlreadyRated));
        assert_eq!(rate(&resolved, 10, false, 6), Err(LifecycleError::RatingOutOfRange));
        assert_eq!(rate(&in_progress(5), 10, false, 3), Err(LifecycleError::NotRateable));
    }

    #[test]
    fn dedupe_keeps_first_seen_order() {
        assert_eq!(dedupe_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
