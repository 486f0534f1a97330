// HTTP header grammars
//
// Each header type parses from field-value text (optionally still carrying
// its `Field-Name:` prefix) and serializes back to wire format through
// `Display`.

pub mod authentication;
pub mod cache_control;
pub mod entity_tag;
pub mod mac;
pub mod oauth;
pub mod preference;
pub mod quality;
mod tokenizer;
pub mod web_link;

pub use authentication::{AuthParam, Authentication};
pub use cache_control::{CacheControl, CacheControlBuilder, CacheExtension};
pub use entity_tag::EntityTag;
pub use mac::{MacAlgorithm, MacAuth, MacCredentials};
pub use oauth::{OAuthCredentials, OAuthRequest, SignatureMethod};
pub use preference::Preference;
pub use quality::QualityItem;
pub use web_link::{LinkParam, WebLink};

/// Drop a leading `Name:` when it matches one of the expected field names
pub(crate) fn strip_field_name<'a>(value: &'a str, names: &[&str]) -> &'a str {
    let trimmed = value.trim();
    if let Some((name, rest)) = trimmed.split_once(':') {
        if names.iter().any(|n| n.eq_ignore_ascii_case(name.trim())) {
            return rest.trim();
        }
    }
    trimmed
}
