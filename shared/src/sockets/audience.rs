//! Who receives a live update for a changed record.

use serde_json::Value;

use crate::store::Document;
use crate::types::CourseStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Users(Vec<String>),
    /// The listed users plus every connected admin.
    UsersAndAdmins(Vec<String>),
    Everyone,
    Nobody,
}

fn field(doc: &Document, name: &str) -> Option<String> {
    doc.get(name).and_then(Value::as_str).map(str::to_string)
}

fn string_list(doc: &Document, name: &str) -> Vec<String> {
    doc.get(name)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Map a changed record to the users who should hear about it.
pub fn audience_for(entity_type: &str, doc: &Document) -> Audience {
    match entity_type {
        "chat" | "chat_message" => Audience::Users(string_list(doc, "participants")),
        "ticket_message" => {
            Audience::UsersAndAdmins(field(doc, "ticket_owner_id").into_iter().collect())
        }
        "ticket" => Audience::UsersAndAdmins(field(doc, "user_id").into_iter().collect()),
        "enrollment" => Audience::Users(field(doc, "student_id").into_iter().collect()),
        "payout" => Audience::UsersAndAdmins(field(doc, "instructor_id").into_iter().collect()),
        "payment" => Audience::Users(
            ["student_id", "instructor_id"]
                .iter()
                .filter_map(|name| field(doc, name))
                .collect(),
        ),
        "course" if field(doc, "status").as_deref() == Some(CourseStatus::Published.as_str()) => {
            Audience::Everyone
        }
        // Unpublished courses stay with their author and the moderators.
        "course" => Audience::UsersAndAdmins(field(doc, "instructor_id").into_iter().collect()),
        _ => Audience::Nobody,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn chat_messages_go_to_participants() {
        let message = doc(json!({"participants": ["alice", "bob"], "body": "hi"}));
        assert_eq!(
            audience_for("chat_message", &message),
            Audience::Users(vec!["alice".into(), "bob".into()])
        );
    }

    #[test]
    fn ticket_messages_reach_owner_and_admins() {
        let message = doc(json!({"ticket_owner_id": "s1", "sender_id": "a1"}));
        assert_eq!(
            audience_for("ticket_message", &message),
            Audience::UsersAndAdmins(vec!["s1".into()])
        );
    }

    #[rstest]
    #[case("enrollment", json!({"student_id": "s1"}), Audience::Users(vec!["s1".into()]))]
    #[case("payout", json!({"instructor_id": "t1"}), Audience::UsersAndAdmins(vec!["t1".into()]))]
    #[case("course", json!({"instructor_id": "t1", "status": "Published"}), Audience::Everyone)]
    #[case("course", json!({"instructor_id": "t1", "status": "Draft"}), Audience::UsersAndAdmins(vec!["t1".into()]))]
    #[case("course", json!({"instructor_id": "t1", "status": "Pending Review"}), Audience::UsersAndAdmins(vec!["t1".into()]))]
    #[case("connection", json!({"user_id": "u"}), Audience::Nobody)]
    #[case("settings", json!({}), Audience::Nobody)]
    fn entity_audiences(#[case] entity: &str, #[case] value: Value, #[case] expected: Audience) {
        assert_eq!(audience_for(entity, &doc(value)), expected);
    }
}
