//! Turning any failure into a short, stable reply that is safe to show.
//!
//! Raw error text never reaches the user; it goes to the log instead.

use switchboard_core::{AppError, ErrorCode, Interrupt, Platform, Response, ServiceError};

pub const MSG_TIMEOUT: &str = "The request timed out. Please try a simpler request.";
pub const MSG_CANCELLED: &str = "The operation was cancelled.";
pub const MSG_NO_API_KEY: &str =
    "The AI service is not configured. Please contact the administrator.";
pub const MSG_NOT_STARTED: &str = "The service is starting up. Please try again shortly.";
pub const MSG_NO_SESSION: &str = "Unable to create a session. Please try again.";
pub const MSG_UNEXPECTED: &str = "Sorry, something unexpected went wrong. Please try again.";

/// Map `err` to a user-facing response. `None` in, `None` out.
pub fn handle_error(err: Option<&anyhow::Error>, platform: &Platform) -> Option<Response> {
    let err = err?;

    if let Some(interrupt) = find::<Interrupt>(err) {
        return Some(match interrupt {
            Interrupt::DeadlineExceeded => Response::failure(MSG_TIMEOUT, ErrorCode::ToolTimeout),
            Interrupt::Cancelled => Response::failure(MSG_CANCELLED, ErrorCode::Internal),
        });
    }

    if let Some(sentinel) = find::<ServiceError>(err) {
        return Some(match sentinel {
            ServiceError::NoApiKey => Response::failure(MSG_NO_API_KEY, ErrorCode::ConfigNotFound),
            ServiceError::ClientNotStarted => {
                Response::failure(MSG_NOT_STARTED, ErrorCode::UpstreamConnection)
            }
            ServiceError::SessionNotCreated => {
                Response::failure(MSG_NO_SESSION, ErrorCode::UpstreamConnection)
            }
        });
    }

    if let Some(app) = find::<AppError>(err) {
        return Some(Response::failure(app_error_text(app), app.code()));
    }

    tracing::error!("Unhandled error on platform {}: {:#}", platform, err);
    Some(Response::failure(MSG_UNEXPECTED, ErrorCode::Internal))
}

fn app_error_text(err: &AppError) -> String {
    match err.code() {
        ErrorCode::ToolTimeout => {
            "The tool took too long to respond. Please try a simpler request.".to_string()
        }
        ErrorCode::ToolNotFound => "The requested tool is not available.".to_string(),
        ErrorCode::InvalidParams => format!("Invalid request: {}", err.message()),
        ErrorCode::UpstreamConnection => {
            "Unable to reach the AI service. Please try again later.".to_string()
        }
        ErrorCode::AuthFailed => "Authentication failed. Please check your credentials.".to_string(),
        ErrorCode::MessageDelivery => "Failed to deliver the message. Please try again.".to_string(),
        ErrorCode::ConfigNotFound => {
            "Configuration is missing. Please contact the administrator.".to_string()
        }
        other => other.user_message().to_string(),
    }
}

fn find<T>(err: &anyhow::Error) -> Option<&T>
where
    T: std::error::Error + Send + Sync + 'static,
{
    err.chain().find_map(|cause| cause.downcast_ref::<T>())
}
