use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::ApiError;
use crate::ApiResponse;

/// 200 with the standard envelope.
pub fn success_response<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

/// 201 with the standard envelope.
pub fn created_response<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// 200 with a message and no data payload.
pub fn message_response(message: &str) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::<()>::message(message)))
}

/// Runs derive-based validation and maps failures to a 400.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input
        .validate()
        .map_err(|e| ApiError::ValidationError(format_validation_errors(&e)))
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let detail = errs
                .iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| {
                    errs.first()
                        .map(|e| e.code.to_string())
                        .unwrap_or_else(|| "invalid".to_string())
                });
            format!("{}: {}", field, detail)
        })
        .collect();
    parts.sort();
    parts.join("; ")
}

/// Page-number pagination. Out-of-range values clamp instead of erroring.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    pub fn page(&self) -> u64 {
        self.page.max(1)
    }

    pub fn per_page(&self) -> u64 {
        self.per_page.clamp(1, 100)
    }
}

/// Paged collection wrapper used by every list endpoint.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, params: &PaginationParams) -> Self {
        Self {
            items,
            total,
            page: params.page(),
            per_page: params.per_page(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_out_of_range_values() {
        let p = PaginationParams {
            page: 0,
            per_page: 10_000,
        };
        assert_eq!(p.page(), 1);
        assert_eq!(p.per_page(), 100);

        let d = PaginationParams::default();
        assert_eq!(d.page(), 1);
        assert_eq!(d.per_page(), 20);
    }

    #[test]
    fn validation_errors_are_flattened() {
        #[derive(Validate)]
        struct Probe {
            #[validate(length(min = 3))]
            name: String,
        }

        let err = validate_input(&Probe {
            name: "ab".to_string(),
        })
        .unwrap_err();
        match err {
            ApiError::ValidationError(msg) => assert!(msg.contains("name")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
