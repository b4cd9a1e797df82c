use super::with_identity_args;
use clap::{Arg, ArgAction, Command};

pub const NAME: &str = "server";
pub const ARG_PORT: &str = "port";
pub const ARG_SESSIONS: &str = "sessions";
pub const ARG_SECURE_COOKIES: &str = "secure-cookies";
pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_HANDOFF_TTL: &str = "handoff-ttl";

#[must_use]
pub fn command() -> Command {
    let command = Command::new(NAME)
        .about("Serve the render pass and the sample resource API")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("IDBRIDGE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SESSIONS)
                .long("sessions")
                .help("JSON file with session tokens and their claims")
                .env("IDBRIDGE_SESSIONS"),
        )
        .arg(
            Arg::new(ARG_SECURE_COOKIES)
                .long("secure-cookies")
                .help("Mark session cookies as Secure")
                .env("IDBRIDGE_SECURE_COOKIES")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long("signing-key")
                .help("Ed25519 seed (32 bytes, base64url) that signs identity snapshots; random when absent")
                .env("IDBRIDGE_SIGNING_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_HANDOFF_TTL)
                .long("handoff-ttl")
                .help("Seconds a sealed identity snapshot stays valid")
                .default_value("60")
                .env("IDBRIDGE_HANDOFF_TTL")
                .value_parser(clap::value_parser!(u64).range(1..=600)),
        );

    with_identity_args(command)
}
