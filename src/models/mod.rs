// src/models/mod.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Returned when a string does not name any variant of a text-backed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares an enum stored as TEXT and sent over the wire as the same text.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($kind:literal) {
            $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        pub enum $name {
            $(
                #[serde(rename = $text $(, alias = $alias)*)]
                #[sqlx(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ───────────────────────────────────────
// Enumerations
// ───────────────────────────────────────
text_enum! {
    pub enum Role ("role") {
        Student => "student",
        Staff => "staff",
        Admin => "admin",
    }
}

text_enum! {
    /// Lifecycle state of a complaint. Escalation is a separate flag.
    pub enum ComplaintStatus ("status") {
        Submitted => "Submitted",
        InProgress => "In Progress",
        Resolved => "Resolved",
        Closed => "Closed",
    }
}

impl ComplaintStatus {
    /// Statuses during which a complaint counts as an active assignment.
    pub const ACTIVE: [ComplaintStatus; 2] = [ComplaintStatus::Submitted, ComplaintStatus::InProgress];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }
}

text_enum! {
    pub enum Priority ("priority") {
        Low => "Low",
        Medium => "Medium",
        High => "High",
    }
}

text_enum! {
    /// Shared by complaints, broadcasts and inventory items.
    pub enum Category ("category") {
        Electricity => "Electricity",
        Plumbing => "Plumbing",
        Furniture => "Furniture",
        Cleaning => "Cleaning",
        Water => "Water",
        Internet => "Internet",
        // Older clients send the combined labels.
        Food => "Food" | "Food/Mess" | "Food / Mess",
        Security => "Security",
        Noise => "Noise" | "Noise/Discipline" | "Noise / Discipline",
        Staff => "Staff" | "Staff/Management" | "Staff / Management",
        Medical => "Medical",
        Other => "Other",
    }
}

impl Category {
    pub const fn label(self) -> &'static str {
        match self {
            Category::Food => "Food / Mess",
            Category::Noise => "Noise / Discipline",
            Category::Staff => "Staff / Management",
            other => other.as_str(),
        }
    }
}

text_enum! {
    pub enum ChatSender ("sender") {
        Staff => "staff",
        Admin => "admin",
    }
}

text_enum! {
    pub enum Frequency ("frequency") {
        OneTime => "One-time",
        Daily => "Daily",
        Weekly => "Weekly",
        Monthly => "Monthly",
    }
}

text_enum! {
    pub enum MaintenanceLogStatus ("status") {
        Pending => "Pending",
        Approved => "Approved",
        Rejected => "Rejected",
    }
}

text_enum! {
    pub enum StockAction ("action") {
        Added => "ADDED",
        Used => "USED",
    }
}

text_enum! {
    pub enum TicketStatus ("status") {
        Open => "Open",
        InProgress => "In Progress",
        Resolved => "Resolved",
    }
}

text_enum! {
    pub enum TicketCategory ("category") {
        Account => "Account",
        Hostel => "Hostel",
        Complaint => "Complaint",
        Technical => "Technical",
        General => "General",
        Other => "Other",
    }
}

text_enum! {
    pub enum TicketSender ("sender") {
        Student => "student",
        Admin => "admin",
    }
}

// ───────────────────────────────────────
// Accounts
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub mobile_number: Option<String>,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct StudentProfile {
    #[serde(skip)]
    pub user_id: i64,
    pub department: Option<String>,
    pub year: Option<String>,
    pub hostel_name: Option<String>,
    pub block: Option<String>,
    pub room_number: Option<String>,
    pub profile_picture: Option<String>,
}

// ───────────────────────────────────────
// Complaints
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Complaint {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub department: Option<String>,
    pub year: Option<String>,
    pub hostel_id: String,
    #[serde(rename = "complaint_category")]
    pub category: Category,
    pub description: String,
    pub image: Option<String>,
    pub priority: Priority,
    pub priority_locked: bool,
    pub status: ComplaintStatus,
    pub assigned_to: Option<i64>,
    pub resolved_by: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub resolution_proof: Option<String>,
    pub escalated: bool,
    pub escalation_note: Option<String>,
    pub escalated_by: Option<i64>,
    pub escalated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub cleared_by_staff: bool,
    #[serde(skip)]
    pub cleared_by_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ComplaintRating {
    #[serde(skip)]
    pub complaint_id: i64,
    #[serde(skip)]
    pub student_id: i64,
    pub rating: i64,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

/// One entry of the complaint timeline.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ComplaintLog {
    pub id: i64,
    #[serde(skip)]
    pub complaint_id: i64,
    pub action: String,
    pub performed_by: Option<i64>,
    pub performed_by_name: Option<String>,
    pub notes: Option<String>,
    pub proof: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One escalation chat message, serialized in the shape the dashboards render.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatMessage {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub complaint_id: i64,
    #[serde(rename = "sender")]
    pub sender_name: String,
    #[serde(rename = "type")]
    pub sender_role: ChatSender,
    pub message: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
impl Complaint {
    /// A freshly filed complaint, for tests.
    pub(crate) fn sample() -> Self {
        Complaint {
            id: 1,
            student_id: 10,
            student_name: "Asha".into(),
            department: None,
            year: None,
            hostel_id: "A-204".into(),
            category: Category::Electricity,
            description: "Fan not working".into(),
            image: None,
            priority: Priority::Medium,
            priority_locked: false,
            status: ComplaintStatus::Submitted,
            assigned_to: None,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
            resolution_proof: None,
            escalated: false,
            escalation_note: None,
            escalated_by: None,
            escalated_at: None,
            cleared_by_staff: false,
            cleared_by_admin: false,
            created_at: Utc::now(),
        }
    }
}

/// A complaint as its student sees it. Escalation is between staff and admins,
/// so none of its fields are carried here.
#[derive(Debug, Clone, Serialize)]
pub struct StudentComplaint {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub department: Option<String>,
    pub year: Option<String>,
    pub hostel_id: String,
    #[serde(rename = "complaint_category")]
    pub category: Category,
    pub description: String,
    pub image: Option<String>,
    pub priority: Priority,
    pub priority_locked: bool,
    pub status: ComplaintStatus,
    pub assigned_to: Option<i64>,
    pub resolved_by: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub resolution_proof: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Complaint> for StudentComplaint {
    fn from(c: Complaint) -> Self {
        Self {
            id: c.id,
            student_id: c.student_id,
            student_name: c.student_name,
            department: c.department,
            year: c.year,
            hostel_id: c.hostel_id,
            category: c.category,
            description: c.description,
            image: c.image,
            priority: c.priority,
            priority_locked: c.priority_locked,
            status: c.status,
            assigned_to: c.assigned_to,
            resolved_by: c.resolved_by,
            resolved_at: c.resolved_at,
            resolution_notes: c.resolution_notes,
            resolution_proof: c.resolution_proof,
            created_at: c.created_at,
        }
    }
}

/// A complaint with the names and rating the list views show.
#[derive(Debug, Clone, Serialize)]
pub struct ComplaintView {
    #[serde(flatten)]
    pub complaint: Complaint,
    pub assigned_to_name: Option<String>,
    pub rating: Option<ComplaintRating>,
}

/// Full complaint record: view fields plus escalation chat and timeline.
#[derive(Debug, Clone, Serialize)]
pub struct ComplaintDetail {
    #[serde(flatten)]
    pub view: ComplaintView,
    pub resolved_by_name: Option<String>,
    pub escalated_by_name: Option<String>,
    pub chat_history: Vec<ChatMessage>,
    pub logs: Vec<ComplaintLog>,
}

// ───────────────────────────────────────
// Broadcasts
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Broadcast {
    pub id: i64,
    pub category: Category,
    pub title: String,
    pub message: String,
    pub expected_resolution_time: Option<String>,
    pub is_active: bool,
    pub start_time: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Inventory
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub category: Category,
    pub unit: String,
    pub total_quantity: i64,
    pub available_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryLog {
    pub id: i64,
    pub item_id: i64,
    pub user_id: Option<i64>,
    pub quantity_changed: i64,
    pub action: StockAction,
    pub related_complaint_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Maintenance
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MaintenanceTask {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub assigned_to: Option<i64>, // None = all staff
    pub next_due_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MaintenanceLog {
    pub id: i64,
    pub task_id: i64,
    pub completed_by: Option<i64>,
    pub completion_date: DateTime<Utc>,
    pub status: MaintenanceLogStatus,
    pub notes: Option<String>,
    pub proof_image: Option<String>,
    pub admin_comment: Option<String>,
}

// ───────────────────────────────────────
// Support
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupportTicket {
    pub id: i64,
    pub student_id: i64,
    pub category: TicketCategory,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupportMessage {
    pub id: i64,
    #[serde(skip)]
    pub ticket_id: i64,
    pub sender: TicketSender,
    pub message: String,
    pub is_read: bool,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// DTOs shared by several endpoints
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResp {
    pub message: String,
}

impl MessageResp {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Outcome of one id inside a bulk request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkItemResult {
    pub id: i64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BulkResult {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult>,
}

impl BulkResult {
    pub fn push_ok(&mut self, id: i64) {
        self.succeeded += 1;
        self.results.push(BulkItemResult { id, ok: true, error: None });
    }

    pub fn push_err(&mut self, id: i64, error: impl fmt::Display) {
        self.failed += 1;
        self.results.push(BulkItemResult { id, ok: false, error: Some(error.to_string()) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_matches_wire_format() {
        assert_eq!(ComplaintStatus::InProgress.as_str(), "In Progress");
        assert_eq!("In Progress".parse::<ComplaintStatus>(), Ok(ComplaintStatus::InProgress));
        assert_eq!(
            serde_json::to_value(ComplaintStatus::InProgress).unwrap(),
            serde_json::json!("In Progress")
        );
    }

    #[test]
    fn unknown_variant_is_reported_with_kind() {
        let err = "Urgent".parse::<Priority>().unwrap_err();
        assert_eq!(err.to_string(), "invalid priority 'Urgent'");
    }

    #[test]
    fn category_labels() {
        assert_eq!(Category::Food.label(), "Food / Mess");
        assert_eq!(Category::Water.label(), "Water");
        assert_eq!(Category::ALL.len(), 12);
    }

    #[test]
    fn category_accepts_combined_labels() {
        assert_eq!("Food/Mess".parse::<Category>(), Ok(Category::Food));
        assert_eq!("Noise / Discipline".parse::<Category>(), Ok(Category::Noise));
        assert_eq!(" Staff/Management ".parse::<Category>(), Ok(Category::Staff));
        for c in Category::ALL {
            assert_eq!(c.label().parse::<Category>(), Ok(*c));
        }
        let c: Category = serde_json::from_value(serde_json::json!("Food / Mess")).unwrap();
        assert_eq!(c, Category::Food);
        // stored and sent back under the canonical name
        assert_eq!(Category::Food.as_str(), "Food");
        assert!("Food/Drinks".parse::<Category>().is_err());
    }

    #[test]
    fn student_copy_drops_escalation_fields() {
        let mut c = Complaint::sample();
        c.escalated = true;
        c.escalation_note = Some("Needs plumber license".into());
        c.escalated_by = Some(5);
        let v = serde_json::to_value(StudentComplaint::from(c)).unwrap();
        for key in ["escalated", "escalation_note", "escalated_by", "escalated_at"] {
            assert!(v.get(key).is_none(), "{key} leaked");
        }
        assert_eq!(v["complaint_category"], "Electricity");
    }

    #[test]
    fn bulk_result_counts() {
        let mut r = BulkResult::default();
        r.push_ok(1);
        r.push_err(2, "Complaint not found");
        assert_eq!((r.succeeded, r.failed), (1, 1));
        assert_eq!(r.results[1].error.as_deref(), Some("Complaint not found"));
    }
}
