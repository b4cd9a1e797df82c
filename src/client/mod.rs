//! Client runtime side of the identity bridge.
//!
//! Flow Overview:
//! 1) [`ClientIdentity::materialize`] takes the handed-off snapshot once.
//! 2) [`ResourceClient`] refuses to call the resource service while the
//!    identity is anonymous, otherwise sends with the shared cookie jar.
//! 3) [`UnauthorizedHandler`] turns the outcome into a value, a login
//!    redirect, a silent discard or a reported fault.

mod api;
mod config;
mod errors;
mod identity;
mod outcome;

pub use api::{session_jar, ResourceClient};
pub use config::{ClientConfig, DEFAULT_LOGIN_PATH, DEFAULT_TIMEOUT_MS};
pub use errors::{ApiError, OutcomeClass};
pub use identity::ClientIdentity;
pub use outcome::{login_location, Handled, Navigator, UnauthorizedHandler};
