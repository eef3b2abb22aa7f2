//! Open and click tracking
//!
//! Both helpers return a new string and leave the rendered input untouched.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use constant_time_eq::constant_time_eq;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use reqwest::Url;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref HREF_REGEX: Regex = Regex::new(r#"(?i)href\s*=\s*"([^"]*)""#).unwrap();
    static ref BODY_CLOSE_REGEX: Regex = Regex::new(r"(?i)</body\s*>").unwrap();
}

/// Where tracking requests are sent and how click links are signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    /// Public base URL of the tracking endpoints
    pub base_url: String,

    /// Secret mixed into click signatures
    pub secret: String,
}

impl TrackingConfig {
    fn endpoint(&self, kind: &str, message_id: &str) -> String {
        format!(
            "{}/t/{kind}/{message_id}",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Signature for a click-through URL
    pub fn sign(&self, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(url.as_bytes());

        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    /// Checks a signature produced by [`TrackingConfig::sign`]
    pub fn verify(&self, url: &str, signature: &str) -> bool {
        constant_time_eq(self.sign(url).as_bytes(), signature.as_bytes())
    }
}

/// Appends a 1x1 open-tracking pixel before `</body>`, or at the end.
pub fn add_open_tracking(html: &str, message_id: &str, config: &TrackingConfig) -> String {
    let pixel = format!(
        r#"<img src="{}" width="1" height="1" alt="" style="display:none" />"#,
        config.endpoint("open", message_id)
    );

    match BODY_CLOSE_REGEX.find_iter(html).last() {
        Some(close) => format!("{}{pixel}{}", &html[..close.start()], &html[close.start()..]),
        None => format!("{html}{pixel}"),
    }
}

/// Routes `http(s)` links through the click endpoint.
///
/// Unsubscribe links and other schemes (`mailto:`, `tel:`, anchors) are left
/// alone.
pub fn add_click_tracking(html: &str, message_id: &str, config: &TrackingConfig) -> String {
    HREF_REGEX
        .replace_all(html, |caps: &Captures<'_>| {
            let link = &caps[1];

            match tracked_link(link, message_id, config) {
                Some(tracked) => format!(r#"href="{tracked}""#),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn tracked_link(link: &str, message_id: &str, config: &TrackingConfig) -> Option<String> {
    let lower = link.to_lowercase();

    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return None;
    }

    if lower.contains("unsubscribe") {
        return None;
    }

    let mut url = Url::parse(&config.endpoint("click", message_id)).ok()?;

    url.query_pairs_mut()
        .append_pair("url", link)
        .append_pair("sig", &config.sign(link));

    Some(url.to_string())
}
