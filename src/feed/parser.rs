use chrono::{DateTime, Utc};
use feed_rs::parser;
use sha2::{Digest, Sha256};

use crate::storage::NewItem;

/// A feed document reduced to what the puller stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    /// Feed-level build time (`updated`, falling back to `published`)
    pub last_build: Option<DateTime<Utc>>,
    pub entries: Vec<ParsedEntry>,
}

/// One entry from a feed document. It has no feed ID yet; the puller
/// assigns it with [`ParsedEntry::into_item`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEntry {
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    pub content: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
}

impl ParsedEntry {
    pub fn into_item(self, feed_id: i64) -> NewItem {
        NewItem {
            feed_id,
            guid: self.guid,
            title: self.title,
            link: self.link,
            content: self.content,
            pub_date: self.pub_date,
        }
    }
}

pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, parser::ParseFeedError> {
    // Leave missing ids empty so generate_guid can fall back to the link
    let feed = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let pub_date = entry.published.or(entry.updated);
            let content = entry
                .content
                .and_then(|c| c.body)
                .filter(|body| !body.is_empty())
                .or_else(|| entry.summary.map(|s| s.content));
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            let guid = generate_guid(&entry.id, link.as_deref(), &title, pub_date);

            ParsedEntry {
                guid,
                title,
                link,
                content,
                pub_date,
            }
        })
        .collect();

    Ok(ParsedFeed {
        title: feed.title.map(|t| t.content),
        last_build: feed.updated.or(feed.published),
        entries,
    })
}

/// Entry ID, else the link, else a digest of the entry's identifying fields.
fn generate_guid(
    existing: &str,
    link: Option<&str>,
    title: &str,
    published: Option<DateTime<Utc>>,
) -> String {
    let trimmed = existing.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    if let Some(link) = link.map(str::trim).filter(|l| !l.is_empty()) {
        return link.to_string();
    }

    let input = format!(
        "{}|{}",
        title,
        published.map(|p| p.timestamp().to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
