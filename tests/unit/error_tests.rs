//! Unit tests for `AppError` display format and HTTP mapping.

use axum::http::StatusCode;
use devco::http::error::status_for;
use devco::AppError;

#[test]
fn display_carries_category_prefix() {
    let cases = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Validation("x".into()), "validation: x"),
        (AppError::NotFound("x".into()), "not found: x"),
        (AppError::Conflict("x".into()), "conflict: x"),
        (AppError::Launch("x".into()), "launch: x"),
        (AppError::Stop("x".into()), "stop: x"),
        (AppError::NoTarget("x".into()), "no target: x"),
        (AppError::Inspect("x".into()), "inspect: x"),
        (AppError::AddressNotFound("x".into()), "address not found: x"),
        (AppError::Git("x".into()), "git: x"),
        (AppError::Store("x".into()), "store: x"),
        (AppError::Io("x".into()), "io: x"),
        (AppError::Gateway("x".into()), "gateway: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
    assert!(AppError::ShuttingDown.to_string().starts_with("shutting down"));
}

#[test]
fn client_errors_are_400() {
    for err in [
        AppError::Validation("x".into()),
        AppError::NotFound("x".into()),
        AppError::Conflict("x".into()),
    ] {
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST, "{err}");
    }
}

#[test]
fn tool_and_store_errors_are_500() {
    for err in [
        AppError::Launch("x".into()),
        AppError::Stop("x".into()),
        AppError::NoTarget("x".into()),
        AppError::Inspect("x".into()),
        AppError::AddressNotFound("x".into()),
        AppError::Git("x".into()),
        AppError::Store("x".into()),
        AppError::Io("x".into()),
    ] {
        assert_eq!(status_for(&err), StatusCode::INTERNAL_SERVER_ERROR, "{err}");
    }
}

#[test]
fn gateway_and_shutdown_statuses() {
    assert_eq!(
        status_for(&AppError::Gateway("x".into())),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        status_for(&AppError::ShuttingDown),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[test]
fn external_tool_classification() {
    assert!(AppError::Launch("x".into()).is_external_tool());
    assert!(AppError::Git("x".into()).is_external_tool());
    assert!(!AppError::Store("x".into()).is_external_tool());
    assert!(!AppError::Conflict("x".into()).is_external_tool());
}

#[test]
fn io_error_converts_to_io_variant() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: AppError = io.into();
    assert_eq!(err.to_string(), "io: gone");
}

#[test]
fn json_error_converts_to_store_variant() {
    let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: AppError = json.into();
    assert!(matches!(err, AppError::Store(_)));
}
