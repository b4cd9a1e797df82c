use crate::cli::{
    actions::{client, server, Action},
    commands::{self, ARG_OPTIONAL_CLAIM, ARG_POLICY, ARG_REQUIRED_CLAIM},
};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((commands::server::NAME, sub)) => Ok(Action::Server(server_args(sub))),
        Some((commands::client::NAME, sub)) => Ok(Action::Client(client_args(sub)?)),
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}

fn server_args(matches: &ArgMatches) -> server::Args {
    server::Args {
        port: matches
            .get_one::<u16>(commands::server::ARG_PORT)
            .copied()
            .unwrap_or(8080),
        sessions: matches
            .get_one::<String>(commands::server::ARG_SESSIONS)
            .map(PathBuf::from),
        policies: values(matches, ARG_POLICY),
        required_claims: values(matches, ARG_REQUIRED_CLAIM),
        optional_claims: values(matches, ARG_OPTIONAL_CLAIM),
        secure_cookies: matches.get_flag(commands::server::ARG_SECURE_COOKIES),
        signing_key: matches
            .get_one::<String>(commands::server::ARG_SIGNING_KEY)
            .map(|seed| SecretString::from(seed.clone())),
        handoff_ttl: Duration::from_secs(
            matches
                .get_one::<u64>(commands::server::ARG_HANDOFF_TTL)
                .copied()
                .unwrap_or(60),
        ),
    }
}

fn client_args(matches: &ArgMatches) -> Result<client::Args> {
    use commands::client::{
        ARG_API_URL, ARG_LOGIN_PATH, ARG_SESSION_TOKEN, ARG_TIMEOUT_MS, ARG_URL, ARG_VERIFYING_KEY,
    };

    let url = matches
        .get_one::<String>(ARG_URL)
        .context("missing required argument: --url")?;
    let url = Url::parse(url).with_context(|| format!("invalid --url: {url}"))?;
    let api_url = matches
        .get_one::<String>(ARG_API_URL)
        .map(|value| Url::parse(value).with_context(|| format!("invalid --api-url: {value}")))
        .transpose()?;

    Ok(client::Args {
        url,
        api_url,
        session_token: matches
            .get_one::<String>(ARG_SESSION_TOKEN)
            .map(|token| SecretString::from(token.clone())),
        policies: values(matches, ARG_POLICY),
        required_claims: values(matches, ARG_REQUIRED_CLAIM),
        optional_claims: values(matches, ARG_OPTIONAL_CLAIM),
        login_path: matches
            .get_one::<String>(ARG_LOGIN_PATH)
            .cloned()
            .unwrap_or_else(|| crate::client::DEFAULT_LOGIN_PATH.to_string()),
        timeout: Duration::from_millis(
            matches
                .get_one::<u64>(ARG_TIMEOUT_MS)
                .copied()
                .unwrap_or(crate::client::DEFAULT_TIMEOUT_MS),
        ),
        verifying_key: matches.get_one::<String>(ARG_VERIFYING_KEY).cloned(),
    })
}

fn values(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn dispatches_server() -> Result<()> {
        temp_env::with_vars(
            [
                ("IDBRIDGE_SESSIONS", None::<&str>),
                ("IDBRIDGE_POLICY", None),
                ("IDBRIDGE_SIGNING_KEY", None),
                ("IDBRIDGE_HANDOFF_TTL", None),
            ],
            || -> Result<()> {
                let matches = commands::new().try_get_matches_from([
                    "idbridge",
                    "server",
                    "--sessions",
                    "/tmp/sessions.json",
                    "--policy",
                    "MyPolicy=employeeID:1,2,3",
                ])?;
                match handler(&matches)? {
                    Action::Server(args) => {
                        assert_eq!(args.sessions, Some(PathBuf::from("/tmp/sessions.json")));
                        assert_eq!(args.policies, vec!["MyPolicy=employeeID:1,2,3"]);
                        assert!(!args.secure_cookies);
                        assert!(args.signing_key.is_none());
                        assert_eq!(args.handoff_ttl, Duration::from_secs(60));
                    }
                    Action::Client(_) => return Err(anyhow!("expected server action")),
                }
                Ok(())
            },
        )
    }

    #[test]
    fn dispatches_client() -> Result<()> {
        temp_env::with_vars(
            [
                ("IDBRIDGE_API_URL", None::<&str>),
                ("IDBRIDGE_LOGIN_PATH", None),
                ("IDBRIDGE_VERIFYING_KEY", Some("a2V5")),
            ],
            || -> Result<()> {
                let matches = commands::new().try_get_matches_from([
                    "idbridge",
                    "client",
                    "--url",
                    "http://localhost:8080/",
                    "--session-token",
                    "t1",
                    "--timeout-ms",
                    "1500",
                ])?;
                match handler(&matches)? {
                    Action::Client(args) => {
                        assert_eq!(args.url.as_str(), "http://localhost:8080/");
                        assert!(args.api_url.is_none());
                        assert_eq!(
                            args.session_token.as_ref().map(|t| t.expose_secret().to_string()),
                            Some("t1".to_string())
                        );
                        assert_eq!(args.login_path, "/login");
                        assert_eq!(args.timeout, Duration::from_millis(1500));
                        assert_eq!(args.verifying_key.as_deref(), Some("a2V5"));
                    }
                    Action::Server(_) => return Err(anyhow!("expected client action")),
                }
                Ok(())
            },
        )
    }

    #[test]
    fn server_signing_key_and_ttl() -> Result<()> {
        temp_env::with_vars(
            [
                ("IDBRIDGE_SIGNING_KEY", Some("c2VlZA")),
                ("IDBRIDGE_HANDOFF_TTL", None::<&str>),
            ],
            || -> Result<()> {
                let matches = commands::new().try_get_matches_from([
                    "idbridge",
                    "server",
                    "--handoff-ttl",
                    "15",
                ])?;
                match handler(&matches)? {
                    Action::Server(args) => {
                        assert_eq!(
                            args.signing_key.as_ref().map(|k| k.expose_secret().to_string()),
                            Some("c2VlZA".to_string())
                        );
                        assert_eq!(args.handoff_ttl, Duration::from_secs(15));
                    }
                    Action::Client(_) => return Err(anyhow!("expected server action")),
                }
                assert!(commands::new()
                    .try_get_matches_from(["idbridge", "server", "--handoff-ttl", "601"])
                    .is_err());
                Ok(())
            },
        )
    }

    #[test]
    fn rejects_invalid_url() -> Result<()> {
        let matches =
            commands::new().try_get_matches_from(["idbridge", "client", "--url", "not a url"])?;
        assert!(handler(&matches).is_err());
        Ok(())
    }
}
