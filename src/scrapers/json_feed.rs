//! JSON array feeds.
//!
//! The endpoint is expected to return a JSON array of objects. Each object
//! may use either the Spanish column names of the downstream sheet or the
//! common English ones (`name`, `description`, `url`, ...); both are mapped
//! onto the Spanish schema here so the rest of the pipeline sees one shape.

use super::SourceConfig;
use crate::models::RawDeal;
use crate::normalize::is_truthy;
use crate::utils::truncate_for_log;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

/// Output column and the keys it may be read from, in priority order.
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("id", &["id", "uuid"]),
    ("nombre", &["nombre", "name"]),
    ("sector", &["sector"]),
    ("sub_sector", &["sub_sector", "subsector"]),
    ("pais", &["pais", "country"]),
    ("estado", &["estado", "stage", "status"]),
    ("descripcion", &["descripcion", "description"]),
    ("website", &["website", "url"]),
    ("tags", &["tags", "labels"]),
    ("tecnologia_principal", &["tecnologia_principal", "primary_technology"]),
    ("eficiencia_hidrica", &["eficiencia_hidrica"]),
    ("tecnologias_regenerativas", &["tecnologias_regenerativas", "regenerative_tech"]),
    ("impacto_medioambiental", &["impacto_medioambiental", "environmental_impact"]),
    ("impacto_social", &["impacto_social", "social_impact"]),
    ("modelo_digital", &["modelo_digital", "digital_model"]),
    ("indicador_sostenibilidad", &["indicador_sostenibilidad", "sustainability_indicator"]),
];

/// Parse a JSON array of startup objects.
///
/// Empty bodies, invalid JSON and non-array payloads yield no records;
/// non-object array entries are skipped.
pub fn parse(body: &str, source: &SourceConfig) -> Vec<RawDeal> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let payload: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            error!(
                source = %source.name,
                error = %e,
                body_preview = %truncate_for_log(body, 200),
                "Source did not return valid JSON"
            );
            return Vec::new();
        }
    };

    let entries = match payload {
        Value::Array(entries) => entries,
        other => {
            warn!(source = %source.name, kind = json_kind(&other), "Source returned a non-list payload");
            return Vec::new();
        }
    };

    let deals: Vec<RawDeal> = entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(object) => Some(map_entry(object, source)),
            other => {
                debug!(source = %source.name, entry = %other, "Skipping non-object entry");
                None
            }
        })
        .collect();

    info!(source = %source.name, count = deals.len(), "Parsed JSON feed");
    deals
}

/// Map one feed object onto the Spanish schema.
fn map_entry(entry: &Map<String, Value>, source: &SourceConfig) -> RawDeal {
    let mut deal = RawDeal::new();

    for (field, keys) in FIELD_ALIASES {
        let default = if *field == "tags" {
            Value::Array(Vec::new())
        } else {
            Value::String(String::new())
        };
        let value = first_truthy(entry, keys).unwrap_or(default);
        deal.insert((*field).to_string(), value);
    }

    let fuente = first_truthy(entry, &["fuente_datos"])
        .unwrap_or_else(|| Value::String(source.name.clone()));
    deal.insert("fuente_datos".to_string(), fuente);

    deal
}

/// First value among `keys` that is truthy. `None` when every candidate is
/// falsy, so the column takes its empty default.
fn first_truthy(entry: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .find(|value| is_truthy(value))
        .cloned()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
