use learnhub_shared::{
    auth, chats, courses, curriculum, dashboard, enrollments,
    error::AppError,
    payments::{self, PaymentGateway},
    payouts, refunds, response, revenue, reviews, settings,
    store::{self, keys},
    tickets,
    types::{
        CheckoutRequest, CompleteLessonRequest, CourseStatus, CreateCourseRequest,
        CreateLectureRequest, CreateReviewRequest, CreateSectionRequest, CreateTicketRequest,
        CreateUserRequest, MessageRequest, ModerateCourseRequest, OpenChatRequest, Payment,
        PayoutRequest, PayoutStatus, ReviewPayoutRequest, Role, SearchQuery, SetRoleRequest,
        SwitchRoleRequest, TicketStatus, TicketStatusRequest, UpdateCourseRequest,
        UpdateUserRequest, User,
    },
    users, AppState,
};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

type HandlerResult = Result<Response<Body>, AppError>;

/// Main Lambda handler - routes requests by the first path segment
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!("API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return Ok(response::preflight());
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let result = route(&event, &state, &method, &parts).await;
    Ok(result.unwrap_or_else(AppError::into_response))
}

async fn route(event: &Request, state: &AppState, method: &Method, parts: &[&str]) -> HandlerResult {
    if method != Method::GET {
        ensure_writable(event, state).await?;
    }

    match parts.first().copied() {
        Some("courses") => course_routes(event, state, method, parts).await,
        Some("checkout") => checkout_routes(event, state, method, parts).await,
        Some("users") => user_routes(event, state, method, parts).await,
        Some("instructor") => instructor_routes(event, state, method, parts).await,
        Some("tickets") => ticket_routes(event, state, method, parts).await,
        Some("chats") => chat_routes(event, state, method, parts).await,
        Some("settings") => match (method, parts) {
            (&Method::GET, ["settings", "platform"]) => {
                response::ok(&settings::platform_config(state.store()).await?)
            }
            _ => Ok(response::not_found()),
        },
        Some("admin") => admin_routes(event, state, method, parts).await,
        _ => Ok(response::not_found()),
    }
}

// ========== HELPERS ==========

fn body<T: DeserializeOwned>(event: &Request) -> Result<T, AppError> {
    Ok(serde_json::from_slice(event.body())?)
}

fn query(event: &Request, name: &str) -> Option<String> {
    event
        .query_string_parameters_ref()
        .and_then(|params| params.first(name))
        .map(str::to_string)
}

/// Parse a query parameter with the same names the JSON bodies use.
fn query_as<T: DeserializeOwned>(event: &Request, name: &str) -> Result<Option<T>, AppError> {
    query(event, name)
        .map(|raw| {
            serde_json::from_value(serde_json::Value::String(raw.clone()))
                .map_err(|_| AppError::BadRequest(format!("Invalid {}: {}", name, raw)))
        })
        .transpose()
}

async fn caller(event: &Request, state: &AppState) -> Result<User, AppError> {
    let user_id = auth::require_caller_id(event, &state.config)?;
    auth::load_caller(state.store(), &user_id).await
}

/// The caller's profile when the request is authenticated and one exists.
async fn optional_caller(event: &Request, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(user_id) = auth::caller_id(event, &state.config) else {
        return Ok(None);
    };
    match users::get_user(state.store(), &user_id).await {
        Ok(user) => Ok(Some(user)),
        Err(AppError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

async fn admin(event: &Request, state: &AppState) -> Result<User, AppError> {
    let user = caller(event, state).await?;
    auth::require_admin(&user)?;
    Ok(user)
}

/// Maintenance mode blocks writes from everyone but admins.
async fn ensure_writable(event: &Request, state: &AppState) -> Result<(), AppError> {
    if !settings::platform_config(state.store()).await?.maintenance_mode {
        return Ok(());
    }
    match optional_caller(event, state).await? {
        Some(user) if auth::is_admin(&user) => Ok(()),
        _ => Err(AppError::Unavailable(
            "The platform is under maintenance".to_string(),
        )),
    }
}

fn gateway(state: &AppState) -> PaymentGateway {
    PaymentGateway::new(state.config.payment_secret_key.clone())
}

// ========== COURSES ==========

async fn course_routes(event: &Request, state: &AppState, method: &Method, parts: &[&str]) -> HandlerResult {
    let store = state.store();
    match (method, parts) {
        (&Method::GET, ["courses"]) => {
            let search = SearchQuery {
                q: query(event, "q"),
                category: query(event, "category"),
                limit: query(event, "limit")
                    .map(|raw| {
                        raw.parse::<usize>()
                            .map_err(|_| AppError::BadRequest(format!("Invalid limit: {}", raw)))
                    })
                    .transpose()?,
            };
            response::ok(&courses::search_courses(store, &search).await?)
        }
        (&Method::POST, ["courses"]) => {
            let user = caller(event, state).await?;
            let req: CreateCourseRequest = body(event)?;
            response::created(&courses::create_course(store, &user, req).await?)
        }
        (&Method::GET, ["courses", course_id]) => {
            let viewer = optional_caller(event, state).await?;
            response::ok(&enrollments::course_detail(store, course_id, viewer.as_ref()).await?)
        }
        (&Method::PATCH, ["courses", course_id]) => {
            let user = caller(event, state).await?;
            let req: UpdateCourseRequest = body(event)?;
            response::ok(&courses::update_course(store, &user, course_id, req).await?)
        }
        (&Method::DELETE, ["courses", course_id]) => {
            let user = caller(event, state).await?;
            courses::delete_course(store, &user, course_id).await?;
            Ok(response::no_content())
        }
        (&Method::POST, ["courses", course_id, "submit"]) => {
            let user = caller(event, state).await?;
            response::ok(&courses::submit_for_review(store, &user, course_id).await?)
        }
        (&Method::POST, ["courses", course_id, "sections"]) => {
            let user = caller(event, state).await?;
            let req: CreateSectionRequest = body(event)?;
            response::created(&curriculum::add_section(store, &user, course_id, req).await?)
        }
        (&Method::DELETE, ["courses", course_id, "sections", section_id]) => {
            let user = caller(event, state).await?;
            curriculum::delete_section(store, &user, course_id, section_id).await?;
            Ok(response::no_content())
        }
        (&Method::POST, ["courses", course_id, "sections", section_id, "lectures"]) => {
            let user = caller(event, state).await?;
            let req: CreateLectureRequest = body(event)?;
            response::created(&curriculum::add_lecture(store, &user, course_id, section_id, req).await?)
        }
        (&Method::DELETE, ["courses", course_id, "sections", section_id, "lectures", lecture_id]) => {
            let user = caller(event, state).await?;
            curriculum::delete_lecture(store, &user, course_id, section_id, lecture_id).await?;
            Ok(response::no_content())
        }
        (&Method::POST, ["courses", course_id, "enroll"]) => {
            let user = caller(event, state).await?;
            let (enrollment, created) = enrollments::enroll_free(store, &user, course_id).await?;
            let status = if created { StatusCode::CREATED } else { StatusCode::OK };
            response::json(status, &enrollment)
        }
        (&Method::GET, ["courses", course_id, "progress"]) => {
            let user = caller(event, state).await?;
            response::ok(&enrollments::get_enrollment(store, &user.user_id, course_id).await?)
        }
        (&Method::POST, ["courses", course_id, "progress"]) => {
            let user = caller(event, state).await?;
            let req: CompleteLessonRequest = body(event)?;
            response::ok(
                &enrollments::complete_lesson(store, &user.user_id, course_id, &req.lecture_id).await?,
            )
        }
        (&Method::GET, ["courses", course_id, "students"]) => {
            let user = caller(event, state).await?;
            response::ok(&enrollments::course_students(store, &user, course_id).await?)
        }
        (&Method::GET, ["courses", course_id, "reviews"]) => {
            let list = reviews::list_course_reviews(store, course_id).await?;
            let summary = reviews::rating_summary(&list);
            response::ok(&serde_json::json!({ "reviews": list, "summary": summary }))
        }
        (&Method::POST, ["courses", course_id, "reviews"]) => {
            let user = caller(event, state).await?;
            let req: CreateReviewRequest = body(event)?;
            response::created(&reviews::submit_review(store, &user, course_id, req).await?)
        }
        (_, ["courses", ..]) => Ok(response::method_not_allowed()),
        _ => Ok(response::not_found()),
    }
}

async fn checkout_routes(event: &Request, state: &AppState, method: &Method, parts: &[&str]) -> HandlerResult {
    match (method, parts) {
        (&Method::POST, ["checkout"]) => {
            let user = caller(event, state).await?;
            let req: CheckoutRequest = body(event)?;
            let result = payments::checkout(
                state.store(),
                &gateway(state),
                &state.config.currency,
                &user,
                &req.course_id,
            )
            .await?;
            response::created(&result)
        }
        _ => Ok(response::method_not_allowed()),
    }
}

// ========== USERS ==========

async fn user_routes(event: &Request, state: &AppState, method: &Method, parts: &[&str]) -> HandlerResult {
    let store = state.store();
    let user_id = auth::require_caller_id(event, &state.config)?;

    match (method, parts) {
        (&Method::POST, ["users", "me"]) => {
            let req: CreateUserRequest = body(event)?;
            response::created(&users::create_profile(store, &user_id, req).await?)
        }
        (&Method::GET, ["users", "me"]) => response::ok(&users::get_user(store, &user_id).await?),
        (&Method::PATCH, ["users", "me"]) => {
            let req: UpdateUserRequest = body(event)?;
            response::ok(&users::update_profile(store, &user_id, req).await?)
        }
        (&Method::GET, ["users", "me", "roles"]) => {
            let user = auth::load_caller(store, &user_id).await?;
            response::ok(&users::available_roles(&user))
        }
        (&Method::POST, ["users", "me", "role"]) => {
            let req: SwitchRoleRequest = body(event)?;
            response::ok(&users::switch_role(store, &user_id, req.role).await?)
        }
        (&Method::POST, ["users", "me", "instructor-application"]) => {
            response::ok(&users::apply_as_instructor(store, &user_id).await?)
        }
        (&Method::GET, ["users", "me", "courses"]) => {
            response::ok(&enrollments::my_courses(store, &user_id).await?)
        }
        (&Method::GET, ["users", "me", "payments"]) => {
            response::ok(&payments::list_student_payments(store, &user_id).await?)
        }
        (&Method::GET, ["users", "me", "tickets"]) => {
            response::ok(&tickets::list_user_tickets(store, &user_id).await?)
        }
        (&Method::GET, ["users", "me", "chats"]) => {
            response::ok(&chats::list_user_chats(store, &user_id).await?)
        }
        (_, ["users", "me", ..]) => Ok(response::method_not_allowed()),
        _ => Ok(response::not_found()),
    }
}

// ========== INSTRUCTOR ==========

async fn instructor_routes(
    event: &Request,
    state: &AppState,
    method: &Method,
    parts: &[&str],
) -> HandlerResult {
    let store = state.store();
    let user = caller(event, state).await?;
    auth::require_instructor(&user)?;

    match (method, parts) {
        (&Method::GET, ["instructor", "courses"]) => {
            response::ok(&courses::list_instructor_courses(store, &user.user_id).await?)
        }
        (&Method::GET, ["instructor", "dashboard"]) => {
            response::ok(&dashboard::instructor_dashboard(store, &user.user_id).await?)
        }
        (&Method::GET, ["instructor", "revenue"]) => {
            response::ok(&revenue::instructor_revenue(store, &user.user_id).await?)
        }
        (&Method::GET, ["instructor", "payments"]) => {
            response::ok(&payments::list_instructor_payments(store, &user.user_id).await?)
        }
        (&Method::GET, ["instructor", "payouts"]) => {
            response::ok(&payouts::list_instructor_payouts(store, &user.user_id).await?)
        }
        (&Method::POST, ["instructor", "payouts"]) => {
            let req: PayoutRequest = body(event)?;
            response::created(&payouts::request_payout(store, &user, req).await?)
        }
        _ => Ok(response::not_found()),
    }
}

// ========== SUPPORT ==========

async fn ticket_routes(event: &Request, state: &AppState, method: &Method, parts: &[&str]) -> HandlerResult {
    let store = state.store();
    let user = caller(event, state).await?;

    match (method, parts) {
        (&Method::POST, ["tickets"]) => {
            let req: CreateTicketRequest = body(event)?;
            response::created(&tickets::open_ticket(store, &user, req).await?)
        }
        (&Method::GET, ["tickets", ticket_id]) => {
            response::ok(&tickets::get_ticket_thread(store, &user, ticket_id).await?)
        }
        (&Method::POST, ["tickets", ticket_id, "messages"]) => {
            let req: MessageRequest = body(event)?;
            response::created(&tickets::reply(store, &user, ticket_id, &req.body).await?)
        }
        _ => Ok(response::not_found()),
    }
}

async fn chat_routes(event: &Request, state: &AppState, method: &Method, parts: &[&str]) -> HandlerResult {
    let store = state.store();
    let user = caller(event, state).await?;

    match (method, parts) {
        (&Method::POST, ["chats"]) => {
            let req: OpenChatRequest = body(event)?;
            response::ok(&chats::open_chat(store, &user, &req.with_user_id).await?)
        }
        (&Method::GET, ["chats", chat_id]) => response::ok(&chats::get_chat(store, &user, chat_id).await?),
        (&Method::GET, ["chats", chat_id, "messages"]) => {
            response::ok(&chats::list_messages(store, &user, chat_id).await?)
        }
        (&Method::POST, ["chats", chat_id, "messages"]) => {
            let req: MessageRequest = body(event)?;
            response::created(&chats::send_message(store, &user, chat_id, &req.body).await?)
        }
        _ => Ok(response::not_found()),
    }
}

// ========== ADMIN ==========

async fn admin_routes(event: &Request, state: &AppState, method: &Method, parts: &[&str]) -> HandlerResult {
    let store = state.store();
    admin(event, state).await?;

    match (method, parts) {
        (&Method::GET, ["admin", "dashboard"]) => response::ok(&dashboard::platform_overview(store).await?),

        (&Method::GET, ["admin", "users"]) => {
            let role: Option<Role> = query_as(event, "role")?;
            response::ok(&users::list_users(store, role).await?)
        }
        (&Method::PUT, ["admin", "users", user_id, "role"]) => {
            let req: SetRoleRequest = body(event)?;
            response::ok(&users::set_role(store, user_id, req.role).await?)
        }
        (&Method::POST, ["admin", "users", user_id, "approve"]) => {
            response::ok(&users::approve_instructor(store, user_id).await?)
        }
        (&Method::DELETE, ["admin", "users", user_id]) => {
            let cognito = state
                .cognito_client
                .as_ref()
                .zip(state.config.cognito_user_pool_id.as_deref());
            users::delete_user(store, cognito, user_id).await?;
            Ok(response::no_content())
        }

        (&Method::GET, ["admin", "courses"]) => {
            let status: Option<CourseStatus> = query_as(event, "status")?;
            response::ok(&courses::list_courses(store, status).await?)
        }
        (&Method::PUT, ["admin", "courses", course_id, "status"]) => {
            let req: ModerateCourseRequest = body(event)?;
            response::ok(&courses::moderate_course(store, course_id, req.status).await?)
        }
        (&Method::DELETE, ["admin", "reviews", review_id]) => {
            reviews::delete_review(store, review_id).await?;
            Ok(response::no_content())
        }

        (&Method::GET, ["admin", "payments", payment_id]) => {
            let payment: Payment = store::load(store, &keys::payment(payment_id))
                .await?
                .ok_or_else(|| AppError::not_found("Payment"))?;
            let receipt_valid = gateway(state).verify(&payment);
            response::ok(&serde_json::json!({ "payment": payment, "receipt_valid": receipt_valid }))
        }
        (&Method::GET, ["admin", "payouts"]) => {
            let status: Option<PayoutStatus> = query_as(event, "status")?;
            response::ok(&payouts::list_payouts(store, status).await?)
        }
        (&Method::POST, ["admin", "payouts", payout_id, "review"]) => {
            let req: ReviewPayoutRequest = body(event)?;
            response::ok(&payouts::review_payout(store, payout_id, req).await?)
        }

        (&Method::GET, ["admin", "tickets"]) => {
            let status: Option<TicketStatus> = query_as(event, "status")?;
            response::ok(&tickets::list_all_tickets(store, status).await?)
        }
        (&Method::PUT, ["admin", "tickets", ticket_id, "status"]) => {
            let req: TicketStatusRequest = body(event)?;
            response::ok(&tickets::set_status(store, ticket_id, req.status).await?)
        }
        (&Method::POST, ["admin", "tickets", ticket_id, "refund"]) => {
            response::ok(&refunds::process_refund(store, ticket_id).await?)
        }

        (&Method::GET, ["admin", "settings"]) => response::ok(&settings::global_settings(store).await?),
        (&Method::PUT, ["admin", "settings"]) => {
            let req: settings::UpdateSettingsRequest = body(event)?;
            response::ok(&settings::update_global_settings(store, req).await?)
        }
        (&Method::GET, ["admin", "settings", "platform"]) => {
            response::ok(&settings::platform_config(store).await?)
        }
        (&Method::PUT, ["admin", "settings", "platform"]) => {
            let req: settings::UpdatePlatformConfigRequest = body(event)?;
            response::ok(&settings::update_platform_config(store, req).await?)
        }
        _ => Ok(response::not_found()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnhub_shared::config::Config;
    use lambda_http::http::HeaderValue;
    use std::collections::HashMap;

    fn request(method: Method, path: &str, user: Option<&'static str>, body: &str) -> Request {
        let mut req = Request::new(Body::from(body.to_string()));
        *req.method_mut() = method;
        *req.uri_mut() = path.parse().unwrap();
        if let Some(id) = user {
            req.headers_mut()
                .insert(auth::USER_ID_HEADER, HeaderValue::from_static(id));
        }
        req
    }

    async fn call(state: &Arc<AppState>, req: Request) -> (StatusCode, serde_json::Value) {
        let resp = function_handler(req, state.clone()).await.unwrap();
        let status = resp.status();
        let value = serde_json::from_slice(resp.body()).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    async fn signup(state: &Arc<AppState>, id: &'static str, wants_to_teach: bool) {
        let body = serde_json::json!({
            "name": id,
            "email": format!("{}@learnhub.test", id),
            "wants_to_teach": wants_to_teach,
        });
        let (status, _) = call(state, request(Method::POST, "/users/me", Some(id), &body.to_string())).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    async fn make_admin(state: &Arc<AppState>, id: &'static str) {
        signup(state, id, false).await;
        users::set_role(state.store(), id, Role::Admin).await.unwrap();
    }

    /// Instructor `t1` with a published course `course_id` holding one lecture.
    async fn published_course(state: &Arc<AppState>, price_cents: i64) -> String {
        signup(state, "t1", true).await;
        make_admin(state, "a1").await;
        let (status, _) = call(state, request(Method::POST, "/admin/users/t1/approve", Some("a1"), "")).await;
        assert_eq!(status, StatusCode::OK);

        let body = serde_json::json!({"title": "Rust 101", "price_cents": price_cents, "category": "dev"});
        let (_, course) = call(state, request(Method::POST, "/courses", Some("t1"), &body.to_string())).await;
        let course_id = course["course_id"].as_str().unwrap().to_string();

        let (_, section) = call(
            state,
            request(
                Method::POST,
                &format!("/courses/{}/sections", course_id),
                Some("t1"),
                r#"{"title":"Basics"}"#,
            ),
        )
        .await;
        let section_id = section["section_id"].as_str().unwrap();
        call(
            state,
            request(
                Method::POST,
                &format!("/courses/{}/sections/{}/lectures", course_id, section_id),
                Some("t1"),
                r#"{"title":"Hello","video_url":"https://cdn.test/hello.mp4"}"#,
            ),
        )
        .await;

        let (status, _) = call(
            state,
            request(Method::POST, &format!("/courses/{}/submit", course_id), Some("t1"), ""),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(
            state,
            request(
                Method::PUT,
                &format!("/admin/courses/{}/status", course_id),
                Some("a1"),
                r#"{"status":"Published"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        course_id
    }

    #[tokio::test]
    async fn preflight_and_unknown_routes() {
        let state = AppState::in_memory(Config::local());
        let (status, _) = call(&state, request(Method::OPTIONS, "/courses", None, "")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&state, request(Method::GET, "/projects", None, "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFound");
    }

    #[tokio::test]
    async fn profile_routes_need_identity() {
        let state = AppState::in_memory(Config::local());
        let (status, _) = call(&state, request(Method::GET, "/users/me", None, "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        signup(&state, "s1", false).await;
        let (status, body) = call(&state, request(Method::GET, "/users/me", Some("s1"), "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "student");

        let (status, _) = call(&state, request(Method::GET, "/admin/dashboard", Some("s1"), "")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn identity_header_ignored_when_deployed() {
        let state = AppState::in_memory(Config::default());
        users::create_profile(
            state.store(),
            "a1",
            serde_json::from_str(r#"{"name":"a1","email":"a1@learnhub.test"}"#).unwrap(),
        )
        .await
        .unwrap();
        users::set_role(state.store(), "a1", Role::Admin).await.unwrap();

        let (status, _) = call(&state, request(Method::GET, "/admin/dashboard", Some("a1"), "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn search_and_course_page_are_public() {
        let state = AppState::in_memory(Config::local());
        let course_id = published_course(&state, 0).await;

        let req = request(Method::GET, "/courses", None, "").with_query_string_parameters(
            HashMap::from([("q".to_string(), "rust".to_string())]),
        );
        let (status, found) = call(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (status, detail) =
            call(&state, request(Method::GET, &format!("/courses/{}", course_id), None, "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["enrolled"], false);
        assert!(detail["curriculum"][0]["lectures"][0]["video_url"].is_null());
    }

    #[tokio::test]
    async fn paid_course_goes_through_checkout() {
        let config = Config {
            payment_secret_key: Some("sk_test".to_string()),
            ..Config::local()
        };
        let state = AppState::in_memory(config);
        let course_id = published_course(&state, 4900).await;
        signup(&state, "s1", false).await;

        let (status, _) = call(
            &state,
            request(Method::POST, &format!("/courses/{}/enroll", course_id), Some("s1"), ""),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

        let body = serde_json::json!({ "course_id": course_id }).to_string();
        let (status, result) = call(&state, request(Method::POST, "/checkout", Some("s1"), &body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(result["payment"]["status"], "Completed");

        let (status, _) = call(&state, request(Method::POST, "/checkout", Some("s1"), &body)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, revenue) = call(&state, request(Method::GET, "/instructor/revenue", Some("t1"), "")).await;
        assert_eq!(revenue["gross_cents"], 4900);
    }

    #[tokio::test]
    async fn maintenance_blocks_writes_for_non_admins() {
        let state = AppState::in_memory(Config::local());
        make_admin(&state, "a1").await;
        signup(&state, "s1", false).await;

        let (status, _) = call(
            &state,
            request(Method::PUT, "/admin/settings/platform", Some("a1"), r#"{"maintenance_mode":true}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &state,
            request(Method::PATCH, "/users/me", Some("s1"), r#"{"name":"New"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Maintenance");

        let (status, _) = call(&state, request(Method::GET, "/users/me", Some("s1"), "")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_status_filter_is_a_bad_request() {
        let state = AppState::in_memory(Config::local());
        make_admin(&state, "a1").await;
        let req = request(Method::GET, "/admin/payouts", Some("a1"), "").with_query_string_parameters(
            HashMap::from([("status".to_string(), "maybe".to_string())]),
        );
        let (status, _) = call(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
