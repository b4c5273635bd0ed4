//! Open Graph / Twitter Card injection into origin HTML.
//!
//! The origin page is treated as text, not parsed. Existing social tags are
//! removed with two line-oriented regexes and a fresh block is inserted right
//! after the first literal `<head>`.
//!
//! # Known limitations
//!
//! The strip patterns only match a `<meta` tag that sits on one line and is
//! closed with `/>`, with `property="og...` / `name="twitter...` somewhere
//! before that closer. Tags split over several lines, or closed with a bare
//! `>`, survive. An unrelated `<meta ... />` followed on the same line by an
//! `og:` tag is removed together with it, since the match is non-greedy only
//! towards the closer.
//!
//! Values are not HTML-escaped. Double quotes are dropped so they cannot end
//! the `content="..."` attribute early; nothing else is touched.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use crate::config::Config;
use crate::metadata::MetadataRecord;

/// `<meta ... property="og... />`, one line, shortest match.
static OG_META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta.*?property="og.*?/>"#).expect("og meta regex should compile")
});

/// `<meta ... name="twitter... />`, one line, shortest match.
static TWITTER_META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta.*?name="twitter.*?/>"#).expect("twitter meta regex should compile")
});

/// Insertion anchor. Case-sensitive and without attributes.
const HEAD_TAG: &str = "<head>";

/// Rendered for fields that have nothing to fall back on.
const MISSING: &str = "undefined";

/// Tag values derived from one metadata record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenGraphTags {
    pub title: String,
    pub description: String,
    /// Preview image with the gateway applied; may be empty.
    pub image: String,
    /// Used for the image tags when `image` is empty.
    pub image_backup: String,
    /// Canonical page URL on the public host.
    pub url: String,
}

impl OpenGraphTags {
    /// Derive tag values from a record and the URL the client asked for.
    pub fn from_record(record: &MetadataRecord, original_url: &Url, ipfs_gateway: &str) -> Self {
        let scheme = original_url.scheme();
        let host = original_url.host_str().unwrap_or_default();

        match record {
            MetadataRecord::Profile(profile) => {
                // An empty name is kept; only an absent one is `undefined`.
                let title = profile.name.as_deref().unwrap_or(MISSING);
                let icon = profile.icon();
                let image = non_empty(icon.as_deref()).unwrap_or_default();
                let address = profile.address.as_deref().unwrap_or(MISSING);

                Self {
                    title: clean(title),
                    description: clean(profile.description.as_deref().unwrap_or_default()),
                    image: clean(&gateway_url(image, ipfs_gateway)),
                    image_backup: String::new(),
                    url: format!("{scheme}://{host}/tz/{address}"),
                }
            }
            MetadataRecord::Content(token) => {
                let title = non_empty(token.title.as_deref()).unwrap_or(MISSING);
                let image = non_empty(token.display_uri.as_deref()).unwrap_or_default();
                let backup = non_empty(token.artifact_uri.as_deref()).unwrap_or_default();
                let id = token
                    .id
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| MISSING.to_string());

                Self {
                    title: clean(title),
                    description: clean(token.description.as_deref().unwrap_or_default()),
                    image: clean(&gateway_url(image, ipfs_gateway)),
                    image_backup: clean(&gateway_url(backup, ipfs_gateway)),
                    url: format!("{scheme}://{host}/objkt/{id}"),
                }
            }
        }
    }

    /// The image used in both image tags.
    pub fn effective_image(&self) -> &str {
        if self.image.is_empty() {
            &self.image_backup
        } else {
            &self.image
        }
    }

    /// Tag attribute, key and content, in emission order.
    pub fn entries<'a>(
        &'a self,
        twitter_creator: &'a str,
    ) -> [(&'static str, &'static str, &'a str); 10] {
        let image = self.effective_image();
        [
            ("property", "og:type", "website"),
            ("property", "og:title", self.title.as_str()),
            ("property", "og:description", self.description.as_str()),
            ("property", "og:image", image),
            ("property", "og:url", self.url.as_str()),
            ("name", "twitter:card", "summary_large_image"),
            ("name", "twitter:creator", twitter_creator),
            ("name", "twitter:title", self.title.as_str()),
            ("name", "twitter:description", self.description.as_str()),
            ("name", "twitter:image", image),
        ]
    }

    /// Render the block inserted after `<head>`.
    pub fn render(&self, twitter_creator: &str) -> String {
        let mut block = String::with_capacity(1024);
        block.push('\n');
        for (i, (attr, key, value)) in self.entries(twitter_creator).iter().enumerate() {
            // Blank line between the Open Graph and Twitter groups.
            if i == 5 {
                block.push('\n');
            }
            let _ = writeln!(block, "    <meta {attr}=\"{key}\" content=\"{value}\" />");
        }
        block.push_str("  ");
        block
    }
}

/// Remove every existing `og:*` and `twitter:*` meta tag.
pub fn strip_social_tags(html: &str) -> String {
    let without_og = OG_META_RE.replace_all(html, "");
    TWITTER_META_RE.replace_all(&without_og, "").into_owned()
}

/// Rewrite `html` so its only social tags are the ones derived from `record`.
///
/// Without a `<head>` to anchor on, only the stripping is applied. Running it
/// again over its own output yields the same tags as running it once.
pub fn inject(html: &str, record: &MetadataRecord, original_url: &Url, config: &Config) -> String {
    let stripped = strip_social_tags(html);

    if !stripped.contains(HEAD_TAG) {
        tracing::debug!(url = %original_url, "no <head> anchor, tags not injected");
        return stripped;
    }

    let tags = OpenGraphTags::from_record(record, original_url, &config.ipfs_gateway);
    let block = tags.render(&config.twitter_creator);

    stripped.replacen(HEAD_TAG, &format!("{HEAD_TAG}{block}"), 1)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Swap the first `ipfs://` for the gateway prefix.
fn gateway_url(uri: &str, ipfs_gateway: &str) -> String {
    uri.replacen("ipfs://", ipfs_gateway, 1)
}

fn clean(value: &str) -> String {
    value.replace('"', "")
}
