use super::with_identity_args;
use crate::client::DEFAULT_LOGIN_PATH;
use clap::{Arg, Command};

pub const NAME: &str = "client";
pub const ARG_URL: &str = "url";
pub const ARG_API_URL: &str = "api-url";
pub const ARG_SESSION_TOKEN: &str = "session-token";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_TIMEOUT_MS: &str = "timeout-ms";
pub const ARG_VERIFYING_KEY: &str = "verifying-key";

#[must_use]
pub fn command() -> Command {
    let command = Command::new(NAME)
        .about("Hydrate a rendered page and call the resource API with its identity")
        .arg(
            Arg::new(ARG_URL)
                .long("url")
                .help("Page to hydrate, example: http://localhost:8080/")
                .env("IDBRIDGE_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_API_URL)
                .long("api-url")
                .help("Resource API base URL (default: origin of --url)")
                .env("IDBRIDGE_API_URL"),
        )
        .arg(
            Arg::new(ARG_SESSION_TOKEN)
                .long("session-token")
                .help("Session credential placed in the transport cookie jar")
                .env("IDBRIDGE_SESSION_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long("login-path")
                .help("Login entry point used when a call is not authorized")
                .default_value(DEFAULT_LOGIN_PATH)
                .env("IDBRIDGE_LOGIN_PATH"),
        )
        .arg(
            Arg::new(ARG_TIMEOUT_MS)
                .long("timeout-ms")
                .help("Request timeout in milliseconds")
                .default_value("10000")
                .env("IDBRIDGE_TIMEOUT_MS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_VERIFYING_KEY)
                .long("verifying-key")
                .help("Ed25519 public key (base64url) of the server; fetched from /v1/handoff/key when absent")
                .env("IDBRIDGE_VERIFYING_KEY"),
        );

    with_identity_args(command)
}
