//! RSS 2.0 and Atom feeds.
//!
//! Accelerator and news sites often announce new startups through a feed.
//! Each `<item>` / `<entry>` becomes one record: the title is the startup
//! name, the summary its description, categories become tags.

use super::SourceConfig;
use crate::models::RawDeal;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    guid: Option<TextNode>,
    #[serde(rename = "category", default)]
    categories: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<TextNode>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

/// Element whose text matters but which may carry attributes.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parse an RSS 2.0 or Atom document.
///
/// A document that is neither yields no records.
pub fn parse(body: &str, source: &SourceConfig) -> Vec<RawDeal> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let deals: Vec<RawDeal> = match quick_xml::de::from_str::<Rss>(body) {
        Ok(rss) => rss.channel.items.into_iter().map(|item| rss_item(item, source)).collect(),
        Err(rss_err) => match quick_xml::de::from_str::<AtomFeed>(body) {
            Ok(feed) => feed.entries.into_iter().map(|entry| atom_entry(entry, source)).collect(),
            Err(atom_err) => {
                error!(
                    source = %source.name,
                    rss_error = %rss_err,
                    atom_error = %atom_err,
                    "Source did not return a readable RSS or Atom feed"
                );
                return Vec::new();
            }
        },
    };

    info!(source = %source.name, count = deals.len(), "Parsed feed");
    deals
}

fn rss_item(item: RssItem, source: &SourceConfig) -> RawDeal {
    let tags = item.categories.into_iter().map(|c| c.value).collect();
    record(
        item.guid.map(|g| g.value),
        item.title,
        item.description,
        item.link,
        tags,
        source,
    )
}

fn atom_entry(entry: AtomEntry, source: &SourceConfig) -> RawDeal {
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .and_then(|l| l.href.clone());
    let description = entry.summary.or(entry.content).map(|node| node.value);
    let tags = entry
        .categories
        .into_iter()
        .map(|c| c.term.filter(|t| !t.trim().is_empty()).unwrap_or(c.value))
        .collect();

    record(entry.id, entry.title.map(|t| t.value), description, link, tags, source)
}

fn record(
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
    tags: Vec<String>,
    source: &SourceConfig,
) -> RawDeal {
    let mut deal = RawDeal::new();
    deal.insert("id".to_string(), Value::String(id.unwrap_or_default()));
    deal.insert("nombre".to_string(), Value::String(title.unwrap_or_default()));
    deal.insert(
        "descripcion".to_string(),
        Value::String(description.as_deref().map(strip_markup).unwrap_or_default()),
    );
    deal.insert("website".to_string(), Value::String(link.unwrap_or_default()));
    deal.insert(
        "tags".to_string(),
        Value::Array(tags.into_iter().map(Value::String).collect()),
    );
    deal.insert("fuente_datos".to_string(), Value::String(source.name.clone()));
    deal
}

/// Feed summaries frequently embed HTML; keep only the readable text.
fn strip_markup(text: &str) -> String {
    let fragment = Html::parse_fragment(text);
    fragment
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::ParserKind;
    use serde_json::json;

    fn source() -> SourceConfig {
        SourceConfig {
            key: "accelerator_feed".to_string(),
            name: "Accelerator Feed".to_string(),
            url: "https://accelerator.example/feed.xml".to_string(),
            parser: ParserKind::Rss,
            notes: None,
            selectors: None,
        }
    }

    #[test]
    fn test_parse_rss() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
            <rss version="2.0">
              <channel>
                <title>New cohort</title>
                <link>https://accelerator.example</link>
                <item>
                  <title>AquaGrow</title>
                  <link>https://aquagrow.example</link>
                  <description><![CDATA[<p>Precision <b>irrigation</b></p>]]></description>
                  <guid isPermaLink="false">cohort-7-1</guid>
                  <category>water</category>
                  <category>agtech</category>
                </item>
                <item>
                  <title>BioSuelo</title>
                </item>
              </channel>
            </rss>"#;

        let deals = parse(body, &source());
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[0]["id"], json!("cohort-7-1"));
        assert_eq!(deals[0]["nombre"], json!("AquaGrow"));
        assert_eq!(deals[0]["descripcion"], json!("Precision irrigation"));
        assert_eq!(deals[0]["website"], json!("https://aquagrow.example"));
        assert_eq!(deals[0]["tags"], json!(["water", "agtech"]));
        assert_eq!(deals[0]["fuente_datos"], json!("Accelerator Feed"));
        assert_eq!(deals[1]["nombre"], json!("BioSuelo"));
        assert_eq!(deals[1]["tags"], json!([]));
    }

    #[test]
    fn test_parse_atom() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
            <feed xmlns="http://www.w3.org/2005/Atom">
              <title>Portfolio</title>
              <entry>
                <id>urn:uuid:1234</id>
                <title type="text">Solar Loop</title>
                <link rel="self" href="https://portfolio.example/entries/1"/>
                <link rel="alternate" href="https://solarloop.example"/>
                <summary>Circular panel recycling</summary>
                <category term="energy"/>
              </entry>
            </feed>"#;

        let deals = parse(body, &source());
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0]["id"], json!("urn:uuid:1234"));
        assert_eq!(deals[0]["nombre"], json!("Solar Loop"));
        assert_eq!(deals[0]["website"], json!("https://solarloop.example"));
        assert_eq!(deals[0]["descripcion"], json!("Circular panel recycling"));
        assert_eq!(deals[0]["tags"], json!(["energy"]));
    }

    #[test]
    fn test_unreadable_feed_yields_nothing() {
        assert!(parse("", &source()).is_empty());
        assert!(parse("<rss><channel><item>", &source()).is_empty());
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<p>Hello <em>there</em></p>\n"), "Hello there");
        assert_eq!(strip_markup("plain text"), "plain text");
    }
}
