#![allow(non_snake_case)]

use crate::Uri;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

pub async fn handler404(path: Uri) -> (StatusCode, Json<Failure>) {
    (
        StatusCode::NOT_FOUND,
        Json(Failure::of(format!("Invalid path: {}", path))),
    )
}

#[derive(Debug, Clone)]
pub enum Maybe<T> {
    Nothing(Error),
    Fine(Success<T>),
    Made(Success<T>),
}

pub fn Fine<V>(v: V) -> Maybe<V>
where
    V: Serialize,
{
    Maybe::Fine(Success::of(v))
}

// same shape as `Fine`, answered with 201 instead of 200
pub fn Made<V>(v: V) -> Maybe<V>
where
    V: Serialize,
{
    Maybe::Made(Success::of(v))
}

pub fn Nothing<V>(err: Error) -> Maybe<V> {
    Maybe::Nothing(err)
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    data: V,
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    success: bool,
    error: String,
}

impl<T> IntoResponse for Maybe<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        match self {
            Maybe::Nothing(err) => err.into_response(),
            Maybe::Fine(success) => Json::into_response(Json(success)),
            Maybe::Made(success) => (StatusCode::CREATED, Json(success)).into_response(),
        }
    }
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            data: value,
        }
    }
}

impl Failure {
    pub fn of(error: String) -> Self {
        Self {
            success: false,
            error,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Error {
    InvalidPayload { message: String },
    AuthenticationFailure { message: String },
    InvalidToken,
    NotFound { message: String },
    AlreadyExists { message: String },
    InternalError { kind: &'static str, message: String },
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // internal details stay in the server log, clients get a generic message
        if let Error::InternalError { kind, ref message } = self {
            log::error!("{}: {}", kind, message);
        }
        (self.status(), Json(Failure::of(self.public_message()))).into_response()
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Error::AuthenticationFailure { .. } | Error::InvalidToken => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::AlreadyExists { .. } => StatusCode::CONFLICT,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            Error::InvalidPayload { message }
            | Error::AuthenticationFailure { message }
            | Error::NotFound { message }
            | Error::AlreadyExists { message } => message.clone(),
            Error::InvalidToken => "Invalid or expired token!".to_string(),
            Error::InternalError { .. } => "Internal server error".to_string(),
        }
    }

    pub fn invalid<S: Into<String>>(msg: S) -> Error {
        Error::InvalidPayload {
            message: msg.into(),
        }
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Error {
        Error::NotFound {
            message: msg.into(),
        }
    }

    pub fn internal<S: Into<String>>(kind: &'static str, msg: S) -> Error {
        Error::InternalError {
            kind,
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_their_status_codes() {
        assert_eq!(Error::invalid("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::AuthenticationFailure {
                message: "x".to_string()
            }
            .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(Error::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::AlreadyExists {
                message: "x".to_string()
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::internal("DatabaseError", "x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn success_envelope_wraps_data() {
        let value = serde_json::to_value(Success::of(serde_json::json!({"name": "Ann"}))).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["name"], "Ann");
    }

    #[test]
    fn failure_envelope_carries_the_message() {
        let value = serde_json::to_value(Failure::of("nope".to_string())).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "nope");
    }

    #[tokio::test]
    async fn internal_errors_never_leak_details() {
        let response =
            Error::internal("DatabaseError", "connection string with secrets").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn conflict_responses_use_409() {
        let response = Maybe::<()>::Nothing(Error::AlreadyExists {
            message: "Student already exists!".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
