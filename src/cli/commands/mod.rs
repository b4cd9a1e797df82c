pub mod client;
pub mod logging;
pub mod server;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_POLICY: &str = "policy";
pub const ARG_REQUIRED_CLAIM: &str = "required-claim";
pub const ARG_OPTIONAL_CLAIM: &str = "optional-claim";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("idbridge")
        .about("Identity handoff between server render and client hydration")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(server::command())
        .subcommand(client::command());

    logging::with_args(command)
}

/// Snapshot schema and policy arguments shared by both sides of the bridge.
pub(crate) fn with_identity_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_POLICY)
                .long("policy")
                .help("Policy declaration NAME=TYPE:V1,V2[;TYPE2:V3] (repeatable)")
                .env("IDBRIDGE_POLICY")
                .value_delimiter(' ')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_REQUIRED_CLAIM)
                .long("required-claim")
                .help("Domain claim that must be present in the identity snapshot (repeatable)")
                .env("IDBRIDGE_REQUIRED_CLAIMS")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_OPTIONAL_CLAIM)
                .long("optional-claim")
                .help("Domain claim carried in the identity snapshot when present (repeatable)")
                .env("IDBRIDGE_OPTIONAL_CLAIMS")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
}
