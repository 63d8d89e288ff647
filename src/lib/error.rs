use jsonwebtoken::errors::{Error as JwtError};
use actix_web::{http::StatusCode, Error as ActixWebError, ResponseError, HttpResponse};
use actix_web_actors::ws::ProtocolError;
use actix::MailboxError;
use std::fmt::{Display, Formatter, Error as FmtError};
use serde::Serialize;

/// This is the global server error type implemented as a convenient wrapper around all kind of
/// errors we could encounter using external libraries.
///
/// Please, try to use this type of error instead of specific ones at least at the front-end of
/// the server, as it will be updated to handle more error cases as we add more libraries or more
/// crate-specific errors.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerError {
    ActixWebError(
        #[serde(skip_serializing)]
        ActixWebError
    ),
    ActixWSError(
        #[serde(skip_serializing)]
        ProtocolError
    ),
    JwtError(
        #[serde(skip_serializing)]
        JwtError
    ),
    InternalError(
        #[serde(rename(serialize = "reason"))]
        InternalError
    ),
    MailboxError(
        #[serde(skip_serializing)]
        MailboxError
    ),
}

impl From<ActixWebError> for ServerError {
    fn from(error:ActixWebError) -> Self { Self::ActixWebError(error) }
}

impl From<JwtError> for ServerError {
    fn from(error:JwtError) -> Self { Self::JwtError(error) }
}

impl From<InternalError> for ServerError {
    fn from(error:InternalError) -> Self { Self::InternalError(error) }
}

impl From<ProtocolError> for ServerError {
    fn from(error:ProtocolError) -> Self { Self::ActixWSError(error) }
}

impl From<MailboxError> for ServerError {
    fn from(error:MailboxError) -> Self { Self::MailboxError(error) }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for ServerError {}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        use InternalError::*;

        log::warn!("request failed: {:?}", self);
        match self {
            ServerError::ActixWebError(e) => e.as_response_error().status_code(),
            ServerError::JwtError(_) => StatusCode::UNAUTHORIZED,
            ServerError::InternalError(e) => match e {
                Unauthenticated => StatusCode::UNAUTHORIZED,
                Forbidden => StatusCode::FORBIDDEN,
                BadRequest(_) => StatusCode::BAD_REQUEST,
                GameUnknown | PlayerUnknown => StatusCode::NOT_FOUND,
                BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
            ServerError::ActixWSError(e) => e.status_code(),
            ServerError::MailboxError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(self)
    }
}

/// The core's own error kinds, as distinguished in the error handling design: `Auth` and
/// `Forbidden` close the socket, `BadRequest` drops the inbound action, `BackendUnavailable`
/// propagates so the caller can close the socket and let the client reconnect.
#[derive(Debug, Serialize)]
pub enum InternalError {
    /// The session was opened without a valid authenticated identity.
    Unauthenticated,
    /// The user tried to open a game session it does not own, or is fully disconnected from.
    Forbidden,
    /// An inbound action was missing a required field.
    BadRequest(&'static str),
    /// The requested game no longer exists in the engine.
    GameUnknown,
    /// The requested player is not currently attached to the server.
    PlayerUnknown,
    /// The keyed store or channel layer could not service the request.
    BackendUnavailable,
}
