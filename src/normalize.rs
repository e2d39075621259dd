//! Normalisation of parsed records into the dealflow schema.
//!
//! Parsers hand over loosely typed maps; anything that is not the expected
//! shape collapses to an empty default so downstream sinks always see every
//! column.

use crate::models::{Deal, RawDeal};
use serde_json::Value;

/// Source name used when a record does not say where it came from.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Normalise a parsed record to a [`Deal`].
///
/// Text columns keep trimmed strings only; numbers, booleans, nulls and
/// nested values become `""`. `id` additionally accepts numbers. Tags go
/// through [`coerce_tags`].
pub fn normalise_deal(raw: &RawDeal, scraped_at: i64) -> Deal {
    let text = |key: &str| text_field(raw.get(key));

    let fuente_datos = match text("fuente_datos") {
        s if s.is_empty() => UNKNOWN_SOURCE.to_string(),
        s => s,
    };

    Deal {
        id: id_field(raw.get("id")),
        nombre: text("nombre"),
        sector: text("sector"),
        sub_sector: text("sub_sector"),
        pais: text("pais"),
        estado: text("estado"),
        descripcion: text("descripcion"),
        website: text("website"),
        tags: coerce_tags(raw.get("tags")),
        tecnologia_principal: text("tecnologia_principal"),
        eficiencia_hidrica: text("eficiencia_hidrica"),
        tecnologias_regenerativas: text("tecnologias_regenerativas"),
        impacto_medioambiental: text("impacto_medioambiental"),
        impacto_social: text("impacto_social"),
        modelo_digital: text("modelo_digital"),
        indicador_sostenibilidad: text("indicador_sostenibilidad"),
        fuente_datos,
        scraped_at,
    }
}

/// Convert the `tags` value into a list of trimmed, non-empty strings.
///
/// A comma separated string is split; arrays drop falsy items and stringify
/// the rest; any other truthy scalar becomes a single tag.
pub fn coerce_tags(value: Option<&Value>) -> Vec<String> {
    let Some(value) = value.filter(|v| is_truthy(v)) else {
        return Vec::new();
    };

    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter(|item| is_truthy(item))
            .map(scalar_text)
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        other => {
            let tag = scalar_text(other).trim().to_string();
            if tag.is_empty() { Vec::new() } else { vec![tag] }
        }
    }
}

/// Truthiness in the loose sense parsers rely on when picking between
/// aliased keys: null, false, zero and empty containers are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

fn id_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OUTPUT_FIELDS;
    use serde_json::json;

    fn raw(value: Value) -> RawDeal {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalise_deal_handles_non_string_values() {
        let raw = raw(json!({
            "nombre": null,
            "sector": 101,
            "descripcion": "   ",
            "impacto_social": false,
            "fuente_datos": null,
            "tags": ["Agtech", null, 42],
        }));

        let deal = normalise_deal(&raw, 0);

        assert_eq!(deal.nombre, "");
        assert_eq!(deal.sector, "");
        assert_eq!(deal.descripcion, "");
        assert_eq!(deal.impacto_social, "");
        assert_eq!(deal.fuente_datos, "unknown");
        assert_eq!(deal.tags, vec!["Agtech", "42"]);
    }

    #[test]
    fn test_normalise_deal_trims_text() {
        let raw = raw(json!({
            "id": "  abc-1 ",
            "nombre": "  AquaGrow\n",
            "pais": " Chile",
            "fuente_datos": " Sample Startup API ",
        }));

        let deal = normalise_deal(&raw, 1_700_000_000);

        assert_eq!(deal.id, "abc-1");
        assert_eq!(deal.nombre, "AquaGrow");
        assert_eq!(deal.pais, "Chile");
        assert_eq!(deal.fuente_datos, "Sample Startup API");
        assert_eq!(deal.scraped_at, 1_700_000_000);
    }

    #[test]
    fn test_normalise_deal_numeric_id() {
        let deal = normalise_deal(&raw(json!({ "id": 1234 })), 0);
        assert_eq!(deal.id, "1234");
    }

    #[test]
    fn test_empty_record_gets_defaults_for_every_column() {
        let deal = normalise_deal(&RawDeal::new(), 5);
        let value = serde_json::to_value(&deal).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), OUTPUT_FIELDS.len());
        for field in OUTPUT_FIELDS {
            let cell = &object[field];
            match field {
                "tags" => assert_eq!(cell, &json!([])),
                "scraped_at" => assert_eq!(cell, &json!(5)),
                "fuente_datos" => assert_eq!(cell, &json!("unknown")),
                _ => assert_eq!(cell, &json!(""), "field {field}"),
            }
        }
    }

    #[test]
    fn test_coerce_tags_from_comma_string() {
        let tags = coerce_tags(Some(&json!(" water, ,irrigation ,")));
        assert_eq!(tags, vec!["water", "irrigation"]);
    }

    #[test]
    fn test_coerce_tags_falsy_values() {
        assert!(coerce_tags(None).is_empty());
        assert!(coerce_tags(Some(&json!(null))).is_empty());
        assert!(coerce_tags(Some(&json!(""))).is_empty());
        assert!(coerce_tags(Some(&json!([]))).is_empty());
        assert!(coerce_tags(Some(&json!(0))).is_empty());
        assert!(coerce_tags(Some(&json!(false))).is_empty());
        assert!(coerce_tags(Some(&json!({}))).is_empty());
    }

    #[test]
    fn test_coerce_tags_array_drops_falsy_items() {
        let tags = coerce_tags(Some(&json!(["a", "", false, 0, " b ", true, 3.5])));
        assert_eq!(tags, vec!["a", "b", "true", "3.5"]);
    }

    #[test]
    fn test_coerce_tags_scalar() {
        assert_eq!(coerce_tags(Some(&json!(7))), vec!["7"]);
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!(-1)));
    }
}
