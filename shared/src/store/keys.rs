use super::Key;

pub fn user(user_id: &str) -> Key {
    Key::single(format!("USER#{}", user_id))
}

pub fn course_pk(course_id: &str) -> String {
    format!("COURSE#{}", course_id)
}

pub fn course(course_id: &str) -> Key {
    Key::single(course_pk(course_id))
}

pub const SECTION_PREFIX: &str = "SECTION#";
pub const LECTURE_PREFIX: &str = "LECTURE#";

pub fn section(course_id: &str, section_id: &str) -> Key {
    Key::new(course_pk(course_id), format!("{}{}", SECTION_PREFIX, section_id))
}

/// Lectures sort under their section: `LECTURE#{section}#{lecture}`.
pub fn lecture(course_id: &str, section_id: &str, lecture_id: &str) -> Key {
    Key::new(
        course_pk(course_id),
        format!("{}{}#{}", LECTURE_PREFIX, section_id, lecture_id),
    )
}

pub fn section_lectures_prefix(section_id: &str) -> String {
    format!("{}{}#", LECTURE_PREFIX, section_id)
}

pub fn enrollment(enrollment_id: &str) -> Key {
    Key::single(format!("ENROLLMENT#{}", enrollment_id))
}

pub fn payment(payment_id: &str) -> Key {
    Key::single(format!("PAYMENT#{}", payment_id))
}

pub fn payout(payout_id: &str) -> Key {
    Key::single(format!("PAYOUT#{}", payout_id))
}

pub fn review(review_id: &str) -> Key {
    Key::single(format!("REVIEW#{}", review_id))
}

pub fn ticket_pk(ticket_id: &str) -> String {
    format!("TICKET#{}", ticket_id)
}

pub fn ticket(ticket_id: &str) -> Key {
    Key::single(ticket_pk(ticket_id))
}

pub fn chat_pk(chat_id: &str) -> String {
    format!("CHAT#{}", chat_id)
}

pub fn chat(chat_id: &str) -> Key {
    Key::single(chat_pk(chat_id))
}

pub const MESSAGE_PREFIX: &str = "MESSAGE#";

/// Messages sort by creation time under their thread.
pub fn message(thread_pk: &str, created_at: &str, message_id: &str) -> Key {
    Key::new(
        thread_pk,
        format!("{}{}#{}", MESSAGE_PREFIX, created_at, message_id),
    )
}

pub fn settings(name: &str) -> Key {
    Key::single(format!("SETTINGS#{}", name))
}

pub fn connection(connection_id: &str) -> Key {
    Key::single(format!("CONNECTION#{}", connection_id))
}
