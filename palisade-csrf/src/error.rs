use palisade_core::Error as CoreError;
use palisade_session::SessionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsrfError {
    #[error("Missing CSRF token")]
    MissingToken,

    /// The issuance middleware ran without a session bound to the request.
    #[error("No session bound to request; install SessionMiddleware before CsrfMiddleware")]
    MissingSession,

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Verification ran without issuance having published a token.
    #[error("No CSRF context bound to request; install CsrfMiddleware before CsrfValidator")]
    MissingContext,
}

pub type Result<T> = std::result::Result<T, CsrfError>;

impl From<CsrfError> for CoreError {
    fn from(err: CsrfError) -> Self {
        match err {
            CsrfError::MissingToken => CoreError::BadRequest("no CSRF token present".into()),
            CsrfError::Session(e) => e.into(),
            other @ (CsrfError::MissingSession | CsrfError::MissingContext) => {
                CoreError::Internal(other.to_string())
            }
        }
    }
}
