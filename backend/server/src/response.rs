use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// `{ success: true, message, data }` with the status the handler picked.
pub struct Success<T> {
    status: StatusCode,
    message: &'static str,
    data: T,
}

#[derive(Serialize)]
struct SuccessBody<T> {
    success: bool,
    message: &'static str,
    data: T,
}

impl<T: Serialize> Success<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: "Success",
            data,
        }
    }

    pub fn created(data: T, message: &'static str) -> Self {
        Self {
            status: StatusCode::CREATED,
            message,
            data,
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = message;
        self
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        let body = SuccessBody {
            success: true,
            message: self.message,
            data: self.data,
        };

        (self.status, Json(body)).into_response()
    }
}
