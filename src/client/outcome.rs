use super::errors::{ApiError, OutcomeClass};
use tracing::{debug, error, trace};
use url::form_urlencoded;

/// Where the client runtime goes when the user must log in.
pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str);
}

/// Result of running a call outcome through [`UnauthorizedHandler`].
#[derive(Debug, PartialEq, Eq)]
pub enum Handled<T> {
    Value(T),
    /// Navigation to the login entry point was triggered.
    Redirected(String),
    /// Cancelled by the caller. Nothing to do.
    Discarded,
    Faulted(ApiError),
}

/// Interprets resource-service outcomes uniformly.
pub struct UnauthorizedHandler<N> {
    login_path: String,
    navigator: N,
}

impl<N: Navigator> UnauthorizedHandler<N> {
    pub fn new(login_path: impl Into<String>, navigator: N) -> Self {
        Self {
            login_path: login_path.into(),
            navigator,
        }
    }

    #[must_use]
    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// `return_url` is where the user should land after logging in.
    pub fn handle<T>(&self, return_url: &str, outcome: Result<T, ApiError>) -> Handled<T> {
        let err = match outcome {
            Ok(value) => return Handled::Value(value),
            Err(err) => err,
        };

        match err.class() {
            OutcomeClass::ExpectedAuthorization => {
                let location = login_location(&self.login_path, return_url);
                debug!(%location, "authorization required: {err}");
                self.navigator.navigate(&location);
                Handled::Redirected(location)
            }
            OutcomeClass::Cancelled => {
                trace!("request cancelled");
                Handled::Discarded
            }
            OutcomeClass::ApplicationFault => {
                error!("{err}");
                Handled::Faulted(err)
            }
        }
    }
}

/// Login location carrying the page to come back to.
#[must_use]
pub fn login_location(login_path: &str, return_url: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("returnUrl", return_url)
        .finish();
    format!("{login_path}?{query}")
}
