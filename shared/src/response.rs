use lambda_http::{
    http::{HeaderValue, StatusCode},
    Body, Response,
};
use serde::Serialize;

use crate::error::AppError;

pub const ALLOWED_METHODS: &str = "GET,POST,PUT,PATCH,DELETE,OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type,Authorization,X-User-Id";

pub(crate) fn with_headers(status: StatusCode, body: Body) -> Response<Body> {
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    let headers = resp.headers_mut();
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    resp
}

/// Serialize `value` as a JSON response with the CORS header.
pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, AppError> {
    let payload = serde_json::to_string(value)?;
    Ok(with_headers(status, payload.into()))
}

pub fn ok<T: Serialize>(value: &T) -> Result<Response<Body>, AppError> {
    json(StatusCode::OK, value)
}

pub fn created<T: Serialize>(value: &T) -> Result<Response<Body>, AppError> {
    json(StatusCode::CREATED, value)
}

pub fn no_content() -> Response<Body> {
    with_headers(StatusCode::NO_CONTENT, Body::Empty)
}

pub fn preflight() -> Response<Body> {
    let mut resp = with_headers(StatusCode::OK, Body::Empty);
    let headers = resp.headers_mut();
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    resp
}

pub fn not_found() -> Response<Body> {
    AppError::NotFound("Not found".to_string()).into_response()
}

pub fn method_not_allowed() -> Response<Body> {
    let body = serde_json::json!({"error": "MethodNotAllowed", "message": "Method not allowed"});
    with_headers(StatusCode::METHOD_NOT_ALLOWED, body.to_string().into())
}
