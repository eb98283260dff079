//! Caller identity and role guards.
//!
//! Tokens are validated by the API Gateway JWT authorizer before the Lambda
//! runs; here we only read the resulting `sub` claim. The `X-User-Id` header
//! is a local development fallback and is ignored unless the config allows it.

use lambda_http::{Request, RequestExt};

use crate::config::Config;
use crate::error::AppError;
use crate::store::{self, keys, DocumentStore};
use crate::types::{Role, User};

pub const USER_ID_HEADER: &str = "X-User-Id";

fn claim_sub(event: &Request) -> Option<String> {
    event
        .request_context_ref()
        .and_then(|ctx| ctx.authorizer())
        .and_then(|auth| auth.jwt.as_ref())
        .and_then(|jwt| jwt.claims.get("sub"))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// The authorizer `sub` claim, or the identity header when enabled and no
/// claim is present.
pub fn caller_id(event: &Request, config: &Config) -> Option<String> {
    claim_sub(event).or_else(|| {
        if !config.allow_user_id_header {
            return None;
        }
        event
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    })
}

pub fn require_caller_id(event: &Request, config: &Config) -> Result<String, AppError> {
    caller_id(event, config).ok_or(AppError::Unauthorized)
}

/// Load the caller's profile; callers without one cannot act.
pub async fn load_caller(store: &dyn DocumentStore, user_id: &str) -> Result<User, AppError> {
    store::load::<User>(store, &keys::user(user_id))
        .await?
        .ok_or_else(|| AppError::Forbidden("Create a profile first".to_string()))
}

pub fn is_admin(user: &User) -> bool {
    user.role == Role::Admin
}

pub fn require_admin(user: &User) -> Result<(), AppError> {
    if is_admin(user) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}

/// Approved instructors and admins may author courses.
pub fn can_teach(user: &User) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Instructor => user.is_approved,
        Role::Student => false,
    }
}

pub fn require_instructor(user: &User) -> Result<(), AppError> {
    if can_teach(user) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only approved instructors can do this".to_string(),
        ))
    }
}

pub fn ensure_owner_or_admin(user: &User, owner_id: &str) -> Result<(), AppError> {
    if user.user_id == owner_id || is_admin(user) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have access to this resource".to_string(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lambda_http::http::HeaderValue;
    use rstest::rstest;
    use serde_json::json;

    pub(crate) fn user(id: &str, role: Role, is_approved: bool) -> User {
        User {
            user_id: id.to_string(),
            name: format!("User {}", id),
            email: format!("{}@example.com", id),
            role,
            is_approved,
            active_role: Role::Student,
            bio: None,
            avatar_url: None,
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
        }
    }

    fn with_header(id: &'static str) -> Request {
        let mut request = Request::default();
        request
            .headers_mut()
            .insert(USER_ID_HEADER, HeaderValue::from_static(id));
        request
    }

    /// API Gateway v2 event whose JWT authorizer vouched for `sub`.
    fn authorized(sub: &str, header: Option<&str>) -> Request {
        let headers = header
            .map(|id| json!({ "x-user-id": id }))
            .unwrap_or_else(|| json!({}));
        let event = json!({
            "version": "2.0",
            "routeKey": "GET /users/me",
            "rawPath": "/users/me",
            "rawQueryString": "",
            "headers": headers,
            "requestContext": {
                "accountId": "123456789012",
                "apiId": "api",
                "domainName": "api.learnhub.test",
                "domainPrefix": "api",
                "http": {
                    "method": "GET",
                    "path": "/users/me",
                    "protocol": "HTTP/1.1",
                    "sourceIp": "127.0.0.1",
                    "userAgent": "test"
                },
                "requestId": "req-1",
                "routeKey": "GET /users/me",
                "stage": "$default",
                "time": "01/Jan/2024:00:00:00 +0000",
                "timeEpoch": 1704067200000i64,
                "authorizer": { "jwt": { "claims": { "sub": sub }, "scopes": null } }
            },
            "isBase64Encoded": false
        });
        lambda_http::request::from_str(&event.to_string()).unwrap()
    }

    #[test]
    fn header_used_only_when_enabled() {
        assert_eq!(
            caller_id(&with_header("u-42"), &Config::local()).as_deref(),
            Some("u-42")
        );
        assert_eq!(caller_id(&with_header("u-42"), &Config::default()), None);
    }

    #[test]
    fn authorizer_claim_wins_over_header() {
        let request = authorized("student-alice", Some("root-admin"));
        assert_eq!(
            caller_id(&request, &Config::local()).as_deref(),
            Some("student-alice")
        );
        assert_eq!(
            caller_id(&authorized("student-alice", None), &Config::default()).as_deref(),
            Some("student-alice")
        );
    }

    #[test]
    fn anonymous_request_is_unauthorized() {
        let request = Request::default();
        assert!(matches!(
            require_caller_id(&request, &Config::local()),
            Err(AppError::Unauthorized)
        ));
    }

    #[rstest]
    #[case(Role::Student, false, false)]
    #[case(Role::Instructor, false, false)]
    #[case(Role::Instructor, true, true)]
    #[case(Role::Admin, false, true)]
    fn teaching_requires_approval_or_admin(
        #[case] role: Role,
        #[case] approved: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(can_teach(&user("u", role, approved)), expected);
    }

    #[test]
    fn owners_and_admins_pass_ownership_check() {
        let owner = user("owner", Role::Instructor, true);
        let admin = user("root", Role::Admin, false);
        let other = user("other", Role::Instructor, true);
        assert!(ensure_owner_or_admin(&owner, "owner").is_ok());
        assert!(ensure_owner_or_admin(&admin, "owner").is_ok());
        assert!(ensure_owner_or_admin(&other, "owner").is_err());
    }
}
