//! Data models for scraped and normalised dealflow records.
//!
//! - [`RawDeal`]: loosely typed record produced by a source parser
//! - [`Deal`]: normalised record following the dealflow sheet schema
//!
//! The schema uses the Spanish column names expected by the downstream
//! worksheet, so field names here mirror them one-to-one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A parsed but not yet normalised record.
///
/// Parsers fill whatever keys they can find; [`crate::normalize::normalise_deal`]
/// turns this into a [`Deal`] with every output column present.
pub type RawDeal = Map<String, Value>;

/// Output columns, in the order they are written to JSON and to the sheet.
pub const OUTPUT_FIELDS: [&str; 18] = [
    "id",
    "nombre",
    "sector",
    "sub_sector",
    "pais",
    "estado",
    "descripcion",
    "website",
    "tags",
    "tecnologia_principal",
    "eficiencia_hidrica",
    "tecnologias_regenerativas",
    "impacto_medioambiental",
    "impacto_social",
    "modelo_digital",
    "indicador_sostenibilidad",
    "fuente_datos",
    "scraped_at",
];

/// A normalised dealflow record.
///
/// Field declaration order matches [`OUTPUT_FIELDS`]; serde serialises
/// struct fields in declaration order, so JSON output keeps column order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Deal {
    /// Identifier assigned by the source, if any.
    pub id: String,
    /// Startup name.
    pub nombre: String,
    pub sector: String,
    pub sub_sector: String,
    /// Country.
    pub pais: String,
    /// Funding stage or status.
    pub estado: String,
    pub descripcion: String,
    pub website: String,
    pub tags: Vec<String>,
    pub tecnologia_principal: String,
    pub eficiencia_hidrica: String,
    pub tecnologias_regenerativas: String,
    pub impacto_medioambiental: String,
    pub impacto_social: String,
    pub modelo_digital: String,
    pub indicador_sostenibilidad: String,
    /// Name of the source the record came from; `"unknown"` when blank.
    pub fuente_datos: String,
    /// Unix timestamp (seconds) of normalisation.
    pub scraped_at: i64,
}

impl Deal {
    /// Value of a column as a worksheet cell.
    ///
    /// Tags are joined with `", "`, `scraped_at` stays numeric and unknown
    /// column names yield an empty string.
    pub fn cell(&self, field: &str) -> Value {
        let text = match field {
            "id" => &self.id,
            "nombre" => &self.nombre,
            "sector" => &self.sector,
            "sub_sector" => &self.sub_sector,
            "pais" => &self.pais,
            "estado" => &self.estado,
            "descripcion" => &self.descripcion,
            "website" => &self.website,
            "tags" => return Value::String(self.tags.join(", ")),
            "tecnologia_principal" => &self.tecnologia_principal,
            "eficiencia_hidrica" => &self.eficiencia_hidrica,
            "tecnologias_regenerativas" => &self.tecnologias_regenerativas,
            "impacto_medioambiental" => &self.impacto_medioambiental,
            "impacto_social" => &self.impacto_social,
            "modelo_digital" => &self.modelo_digital,
            "indicador_sostenibilidad" => &self.indicador_sostenibilidad,
            "fuente_datos" => &self.fuente_datos,
            "scraped_at" => return Value::from(self.scraped_at),
            _ => return Value::String(String::new()),
        };
        Value::String(text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_deal() -> Deal {
        Deal {
            id: "42".to_string(),
            nombre: "AquaGrow".to_string(),
            sector: "Agtech".to_string(),
            pais: "España".to_string(),
            tags: vec!["water".to_string(), "irrigation".to_string()],
            fuente_datos: "Sample Startup API".to_string(),
            scraped_at: 1_700_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_deal_serialization_keeps_column_order() {
        let json = serde_json::to_value(sample_deal()).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();

        let mut expected = OUTPUT_FIELDS.to_vec();
        let mut sorted = keys.clone();
        expected.sort_unstable();
        sorted.sort_unstable();
        assert_eq!(sorted, expected);

        let text = serde_json::to_string(&sample_deal()).unwrap();
        let id_pos = text.find("\"id\"").unwrap();
        let nombre_pos = text.find("\"nombre\"").unwrap();
        let scraped_pos = text.find("\"scraped_at\"").unwrap();
        assert!(id_pos < nombre_pos && nombre_pos < scraped_pos);
    }

    #[test]
    fn test_cell_joins_tags() {
        let deal = sample_deal();
        assert_eq!(deal.cell("tags"), Value::String("water, irrigation".to_string()));
    }

    #[test]
    fn test_cell_keeps_timestamp_numeric() {
        let deal = sample_deal();
        assert_eq!(deal.cell("scraped_at"), Value::from(1_700_000_000_i64));
    }

    #[test]
    fn test_cell_unknown_field_is_empty() {
        let deal = sample_deal();
        assert_eq!(deal.cell("valuation"), Value::String(String::new()));
    }

    #[test]
    fn test_text_cells() {
        let deal = sample_deal();
        assert_eq!(deal.cell("pais"), Value::String("España".to_string()));
        assert_eq!(deal.cell("impacto_social"), Value::String(String::new()));
        assert_eq!(
            deal.cell("fuente_datos"),
            Value::String("Sample Startup API".to_string())
        );
    }
}
