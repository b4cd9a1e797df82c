use super::handlers::{handoff_key, health, logout, me};
use utoipa::{
    openapi::{Contact, InfoBuilder, License, Tag},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        me::get_me,
        me::authorize,
        logout::logout,
        handoff_key::handoff_key
    ),
    components(schemas(
        health::Health,
        me::MeResponse,
        me::ClaimView,
        me::AuthorizeResponse,
        handoff_key::HandoffKey
    ))
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    // Use Cargo.toml metadata instead of the utoipa defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = cargo_license();
    doc.info = info;

    let mut me_tag = Tag::new("me");
    me_tag.description = Some("Resources authorized by the session credential".to_string());
    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Session lifecycle".to_string());
    let mut handoff_tag = Tag::new("handoff");
    handoff_tag.description = Some("Verification of sealed identity snapshots".to_string());
    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service health".to_string());
    doc.tags = Some(vec![me_tag, auth_tag, handoff_tag, health_tag]);

    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `:` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(':').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let mut contact = Contact::new();
    if let Some((name, rest)) = primary.split_once('<') {
        contact.name = optional_str(name.trim()).map(ToString::to_string);
        contact.email = optional_str(rest.trim_end_matches('>').trim()).map(ToString::to_string);
    } else {
        contact.name = Some(primary.to_string());
    }
    Some(contact)
}

fn cargo_license() -> Option<License> {
    optional_str(env!("CARGO_PKG_LICENSE")).map(License::new)
}

fn optional_str(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
