//! HTML directory pages.
//!
//! Some startup directories only publish an HTML listing. The page layout is
//! described per source with CSS selectors: one selector for the repeated
//! card element and one per output column, evaluated inside each card.
//!
//! ```yaml
//! selectors:
//!   item: ".startup-card"
//!   fields:
//!     nombre: "h3"
//!     descripcion: ".summary"
//!     website: "a.homepage"
//!     tags: ".tag"
//! ```

use super::SourceConfig;
use crate::models::{OUTPUT_FIELDS, RawDeal};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error, info};
use url::Url;

/// CSS selectors describing an HTML listing page.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HtmlSelectors {
    /// Selector matching one startup card.
    pub item: String,
    /// Output column name to selector, relative to the card.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl HtmlSelectors {
    /// Column names that are not part of the output schema.
    pub fn unknown_fields(&self) -> Vec<&str> {
        self.fields
            .keys()
            .map(String::as_str)
            .filter(|field| !OUTPUT_FIELDS.contains(field) || *field == "scraped_at")
            .collect()
    }

    /// Compile every selector, reporting the first one that does not parse.
    pub fn compile(&self) -> Result<CompiledSelectors, String> {
        let item = compile_one(&self.item)?;
        let fields = self
            .fields
            .iter()
            .map(|(field, css)| compile_one(css).map(|selector| (field.clone(), selector)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledSelectors { item, fields })
    }
}

/// Selectors ready to run against a document.
#[derive(Debug)]
pub struct CompiledSelectors {
    item: Selector,
    fields: Vec<(String, Selector)>,
}

fn compile_one(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector {css:?}: {e}"))
}

/// Parse an HTML listing using the source's selectors.
///
/// Cards without a `nombre` are dropped. A source without selectors, or
/// with a selector that does not compile, yields no records.
pub fn parse(body: &str, source: &SourceConfig) -> Vec<RawDeal> {
    let Some(selectors) = source.selectors.as_ref() else {
        error!(source = %source.name, "HTML source has no selectors configured");
        return Vec::new();
    };
    let compiled = match selectors.compile() {
        Ok(c) => c,
        Err(e) => {
            error!(source = %source.name, error = %e, "Could not compile selectors");
            return Vec::new();
        }
    };
    let base_url = Url::parse(&source.url).ok();

    let document = Html::parse_document(body);
    let mut deals = Vec::new();
    for card in document.select(&compiled.item) {
        let deal = extract_card(card, &compiled, base_url.as_ref(), source);
        let has_name = deal
            .get("nombre")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.is_empty());
        if has_name {
            deals.push(deal);
        } else {
            debug!(source = %source.name, "Skipping card without a name");
        }
    }

    info!(source = %source.name, count = deals.len(), "Parsed HTML listing");
    deals
}

fn extract_card(
    card: ElementRef<'_>,
    compiled: &CompiledSelectors,
    base_url: Option<&Url>,
    source: &SourceConfig,
) -> RawDeal {
    let mut deal = RawDeal::new();
    deal.insert("fuente_datos".to_string(), Value::String(source.name.clone()));

    for (field, selector) in &compiled.fields {
        let value = match field.as_str() {
            "tags" => Value::Array(
                card.select(selector)
                    .map(element_text)
                    .filter(|tag| !tag.is_empty())
                    .map(Value::String)
                    .collect(),
            ),
            "website" => Value::String(
                card.select(selector)
                    .next()
                    .map(|link| link_target(link, base_url))
                    .unwrap_or_default(),
            ),
            _ => Value::String(card.select(selector).next().map(element_text).unwrap_or_default()),
        };
        // A selector that misses must not erase the source-name default.
        if field == "fuente_datos" && value.as_str().is_some_and(str::is_empty) {
            continue;
        }
        deal.insert(field.clone(), value);
    }

    deal
}

/// Text content with whitespace runs collapsed to single spaces.
fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// `href` of the element resolved against the page URL, or its text when
/// there is no `href`.
fn link_target(element: ElementRef<'_>, base_url: Option<&Url>) -> String {
    match element.value().attr("href") {
        Some(href) => match base_url.map(|base| base.join(href)) {
            Some(Ok(resolved)) => resolved.to_string(),
            _ => href.trim().to_string(),
        },
        None => element_text(element),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::ParserKind;
    use serde_json::json;

    const PAGE: &str = r#"
        <html><body>
          <div class="startup-card">
            <h3>  AquaGrow
            </h3>
            <p class="summary">Precision   irrigation for <b>smallholders</b></p>
            <a class="homepage" href="/startups/aquagrow">Profile</a>
            <span class="tag">water</span><span class="tag"> agtech </span><span class="tag"> </span>
          </div>
          <div class="startup-card">
            <p class="summary">No name here</p>
          </div>
          <div class="startup-card">
            <h3>BioSuelo</h3>
            <a class="homepage" href="https://biosuelo.example/">Site</a>
          </div>
        </body></html>
    "#;

    fn source(selectors: Option<HtmlSelectors>) -> SourceConfig {
        SourceConfig {
            key: "directory".to_string(),
            name: "Startup Directory".to_string(),
            url: "https://directory.example/list".to_string(),
            parser: ParserKind::Html,
            notes: None,
            selectors,
        }
    }

    fn selectors() -> HtmlSelectors {
        HtmlSelectors {
            item: ".startup-card".to_string(),
            fields: BTreeMap::from([
                ("nombre".to_string(), "h3".to_string()),
                ("descripcion".to_string(), ".summary".to_string()),
                ("website".to_string(), "a.homepage".to_string()),
                ("tags".to_string(), ".tag".to_string()),
            ]),
        }
    }

    #[test]
    fn test_parse_cards() {
        let deals = parse(PAGE, &source(Some(selectors())));
        assert_eq!(deals.len(), 2);

        let first = &deals[0];
        assert_eq!(first["nombre"], json!("AquaGrow"));
        assert_eq!(first["descripcion"], json!("Precision irrigation for smallholders"));
        assert_eq!(first["website"], json!("https://directory.example/startups/aquagrow"));
        assert_eq!(first["tags"], json!(["water", "agtech"]));
        assert_eq!(first["fuente_datos"], json!("Startup Directory"));

        let second = &deals[1];
        assert_eq!(second["nombre"], json!("BioSuelo"));
        assert_eq!(second["website"], json!("https://biosuelo.example/"));
        assert_eq!(second["descripcion"], json!(""));
        assert_eq!(second["tags"], json!([]));
    }

    #[test]
    fn test_fuente_datos_selector_falls_back_to_source_name() {
        let sel = HtmlSelectors {
            item: ".card".to_string(),
            fields: BTreeMap::from([
                ("nombre".to_string(), "h3".to_string()),
                ("fuente_datos".to_string(), ".via".to_string()),
            ]),
        };
        let page = r#"
            <div class="card"><h3>AquaGrow</h3></div>
            <div class="card"><h3>BioSuelo</h3><span class="via">Partner List</span></div>
        "#;

        let deals = parse(page, &source(Some(sel)));
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[0]["fuente_datos"], json!("Startup Directory"));
        assert_eq!(deals[1]["fuente_datos"], json!("Partner List"));
    }

    #[test]
    fn test_missing_selectors_yield_nothing() {
        assert!(parse(PAGE, &source(None)).is_empty());
    }

    #[test]
    fn test_invalid_selector_yields_nothing() {
        let mut bad = selectors();
        bad.fields.insert("sector".to_string(), "div[[".to_string());
        assert!(bad.compile().is_err());
        assert!(parse(PAGE, &source(Some(bad))).is_empty());
    }

    #[test]
    fn test_unknown_fields() {
        let mut sel = selectors();
        sel.fields.insert("valuation".to_string(), ".v".to_string());
        sel.fields.insert("scraped_at".to_string(), ".t".to_string());
        assert_eq!(sel.unknown_fields(), vec!["scraped_at", "valuation"]);
    }
}
