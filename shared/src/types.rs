use serde::{Deserialize, Serialize};

use crate::store::{keys, Key, Record};

/// RFC 3339 timestamp with fixed microsecond precision so that values sort
/// lexically in time order.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Instructors can publish only once an admin approves them.
    #[serde(default)]
    pub is_approved: bool,
    pub active_role: Role,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

impl Record for User {
    const ENTITY: &'static str = "user";

    fn key(&self) -> Key {
        keys::user(&self.user_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub wants_to_teach: bool,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

// ========== COURSE ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum CourseStatus {
    Draft,
    #[serde(rename = "Pending Review")]
    PendingReview,
    Published,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "Draft",
            CourseStatus::PendingReview => "Pending Review",
            CourseStatus::Published => "Published",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Course {
    pub course_id: String,
    pub instructor_id: String,
    pub title: String,
    /// Lower-cased copy of `title` for prefix search.
    pub title_lower: String,
    pub description: String,
    pub price_cents: i64,
    pub category: String,
    pub status: CourseStatus,
    pub thumbnail_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for Course {
    const ENTITY: &'static str = "course";

    fn key(&self) -> Key {
        keys::course(&self.course_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price_cents: i64,
    pub category: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModerateCourseRequest {
    pub status: CourseStatus,
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

// ========== SECTION / LECTURE ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Section {
    pub section_id: String,
    pub course_id: String,
    pub title: String,
    pub order: u32,
    pub created_at: String,
}

impl Record for Section {
    const ENTITY: &'static str = "section";

    fn key(&self) -> Key {
        keys::section(&self.course_id, &self.section_id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lecture {
    pub lecture_id: String,
    pub section_id: String,
    pub course_id: String,
    pub title: String,
    pub video_url: Option<String>,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub is_preview: bool,
    pub order: u32,
    pub created_at: String,
}

impl Record for Lecture {
    const ENTITY: &'static str = "lecture";

    fn key(&self) -> Key {
        keys::lecture(&self.course_id, &self.section_id, &self.lecture_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSectionRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLectureRequest {
    pub title: String,
    pub video_url: Option<String>,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub is_preview: bool,
}

/// A section with its lectures, both in display order.
#[derive(Debug, Serialize, Clone)]
pub struct SectionOutline {
    #[serde(flatten)]
    pub section: Section,
    pub lectures: Vec<Lecture>,
}

// ========== ENROLLMENT ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Enrollment {
    /// Always `{student_id}_{course_id}`.
    pub enrollment_id: String,
    pub student_id: String,
    pub course_id: String,
    pub progress: u8,
    #[serde(default)]
    pub completed_lessons: Vec<String>,
    pub last_lesson_id: Option<String>,
    pub enrolled_at: String,
    pub completed_at: Option<String>,
}

impl Record for Enrollment {
    const ENTITY: &'static str = "enrollment";

    fn key(&self) -> Key {
        keys::enrollment(&self.enrollment_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteLessonRequest {
    pub lecture_id: String,
}

// ========== PAYMENT ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Payment {
    pub payment_id: String,
    pub student_id: String,
    pub course_id: String,
    pub instructor_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub receipt_signature: Option<String>,
    pub created_at: String,
    pub refunded_at: Option<String>,
}

impl Record for Payment {
    const ENTITY: &'static str = "payment";

    fn key(&self) -> Key {
        keys::payment(&self.payment_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub course_id: String,
}

// ========== PAYOUT ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    EnAttente,
    Valide,
    Rejete,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::EnAttente => "en_attente",
            PayoutStatus::Valide => "valide",
            PayoutStatus::Rejete => "rejete",
        }
    }

    /// Pending and approved payouts are committed against the balance.
    pub fn is_committed(&self) -> bool {
        matches!(self, PayoutStatus::EnAttente | PayoutStatus::Valide)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Payout {
    pub payout_id: String,
    pub instructor_id: String,
    pub amount_cents: i64,
    pub status: PayoutStatus,
    pub method: Option<String>,
    pub note: Option<String>,
    pub requested_at: String,
    pub reviewed_at: Option<String>,
}

impl Record for Payout {
    const ENTITY: &'static str = "payout";

    fn key(&self) -> Key {
        keys::payout(&self.payout_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct PayoutRequest {
    pub amount_cents: i64,
    pub method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPayoutRequest {
    pub approve: bool,
    pub note: Option<String>,
}

// ========== REVIEW ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Review {
    /// Always `{course_id}_{student_id}`.
    pub review_id: String,
    pub course_id: String,
    pub student_id: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: String,
}

impl Record for Review {
    const ENTITY: &'static str = "review";

    fn key(&self) -> Key {
        keys::review(&self.review_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: u8,
    pub comment: Option<String>,
}

// ========== SUPPORT TICKET ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    General,
    Technical,
    Billing,
    Refund,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SupportTicket {
    pub ticket_id: String,
    pub user_id: String,
    pub subject: String,
    pub category: TicketCategory,
    pub course_id: Option<String>,
    pub status: TicketStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for SupportTicket {
    const ENTITY: &'static str = "ticket";

    fn key(&self) -> Key {
        keys::ticket(&self.ticket_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub category: TicketCategory,
    pub course_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct TicketStatusRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TicketMessage {
    pub message_id: String,
    pub ticket_id: String,
    /// Owner of the ticket, copied for live-update routing.
    pub ticket_owner_id: String,
    pub sender_id: String,
    pub body: String,
    pub created_at: String,
}

impl Record for TicketMessage {
    const ENTITY: &'static str = "ticket_message";

    fn key(&self) -> Key {
        keys::message(&keys::ticket_pk(&self.ticket_id), &self.created_at, &self.message_id)
    }
}

// ========== CHAT ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Chat {
    /// Sorted participant ids joined by `_`.
    pub chat_id: String,
    pub participants: Vec<String>,
    pub last_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for Chat {
    const ENTITY: &'static str = "chat";

    fn key(&self) -> Key {
        keys::chat(&self.chat_id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub message_id: String,
    pub chat_id: String,
    /// Copied from the chat so stream consumers can route without a lookup.
    pub participants: Vec<String>,
    pub sender_id: String,
    pub body: String,
    pub created_at: String,
}

impl Record for ChatMessage {
    const ENTITY: &'static str = "chat_message";

    fn key(&self) -> Key {
        keys::message(&keys::chat_pk(&self.chat_id), &self.created_at, &self.message_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenChatRequest {
    pub with_user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub body: String,
}
