//! Configuration units: one parsed TOML document of desired preferences.
//!
//! A unit carries run metadata (scope, privilege, processes to restart)
//! plus a `data` table mapping preference domains to the nested values
//! that should be merged into them:
//!
//! ```toml
//! description = "Finder tweaks"
//! current_host = false
//! sudo = false
//! kill = ["Finder"]
//!
//! [data.com.apple.finder]
//! ShowPathbar = true
//! ```
//!
//! Values are opaque; they are converted to plist values without any
//! schema interpretation.

use std::fs;
use std::path::Path;

use plist::Value;
use serde::Deserialize;

use crate::Result;

/// One parsed configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Unit {
    /// Free-text description, logged at debug verbosity.
    #[serde(default)]
    pub description: Option<String>,

    /// Target the ByHost (per-machine) variant of each domain's store.
    #[serde(default)]
    pub current_host: bool,

    /// Read and write stores through sudo.
    #[serde(default)]
    pub sudo: bool,

    /// Processes to restart if this unit changed anything.
    #[serde(default)]
    pub kill: Vec<String>,

    /// Domain identifier -> desired values to merge in.
    #[serde(default)]
    pub data: toml::Table,
}

impl Unit {
    /// Parse a unit from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Whether this unit has any domain data to apply.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Convert a parsed TOML value into its plist representation.
///
/// RFC-3339 datetimes become plist dates; TOML's local/partial datetimes
/// have no plist equivalent and degrade to their string form.
pub fn toml_to_plist(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(n) => Value::Integer((*n).into()),
        toml::Value::Float(f) => Value::Real(*f),
        toml::Value::Boolean(b) => Value::Boolean(*b),
        toml::Value::Datetime(dt) => datetime_to_plist(dt),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_plist).collect()),
        toml::Value::Table(table) => Value::Dictionary(
            table
                .iter()
                .map(|(key, value)| (key.clone(), toml_to_plist(value)))
                .collect(),
        ),
    }
}

fn datetime_to_plist(dt: &toml::value::Datetime) -> Value {
    let text = dt.to_string();
    match chrono::DateTime::parse_from_rfc3339(&text) {
        Ok(parsed) => Value::Date(std::time::SystemTime::from(parsed).into()),
        Err(_) => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(text: &str) -> Unit {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn defaults_apply_when_fields_absent() {
        let unit = parse(
            r#"
            [data."com.apple.finder"]
            ShowPathbar = true
            "#,
        );
        assert_eq!(unit.description, None);
        assert!(!unit.current_host);
        assert!(!unit.sudo);
        assert!(unit.kill.is_empty());
        assert!(!unit.is_empty());
    }

    #[test]
    fn full_document_parses() {
        let unit = parse(
            r#"
            description = "Dock layout"
            current_host = true
            sudo = false
            kill = ["Dock"]

            [data."com.apple.dock"]
            orientation = "left"
            tilesize = 48
            "#,
        );
        assert_eq!(unit.description.as_deref(), Some("Dock layout"));
        assert!(unit.current_host);
        assert_eq!(unit.kill, vec!["Dock"]);
        let dock = unit.data.get("com.apple.dock").unwrap();
        assert_eq!(
            dock.get("orientation"),
            Some(&toml::Value::String("left".into()))
        );
    }

    #[test]
    fn document_without_data_is_empty() {
        let unit = parse(r#"description = "nothing yet""#);
        assert!(unit.is_empty());
    }

    #[test]
    fn from_file_round_trips() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[data.\"com.example\"]\nEnabled = true").unwrap();
        let unit = Unit::from_file(file.path()).unwrap();
        assert!(unit.data.contains_key("com.example"));
    }

    #[test]
    fn from_file_rejects_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid = = toml").unwrap();
        assert!(Unit::from_file(file.path()).is_err());
    }

    #[test]
    fn scalars_convert() {
        assert_eq!(
            toml_to_plist(&toml::Value::String("x".into())),
            Value::String("x".into())
        );
        assert_eq!(
            toml_to_plist(&toml::Value::Integer(7)),
            Value::Integer(7.into())
        );
        assert_eq!(toml_to_plist(&toml::Value::Float(1.5)), Value::Real(1.5));
        assert_eq!(
            toml_to_plist(&toml::Value::Boolean(true)),
            Value::Boolean(true)
        );
    }

    #[test]
    fn nested_structures_convert() {
        let value: toml::Value = toml::from_str(
            r#"
            [tile-data]
            file-label = "Terminal"
            badges = [1, 2]
            "#,
        )
        .unwrap();
        let converted = toml_to_plist(&value);
        let Value::Dictionary(dict) = converted else {
            panic!("expected dictionary");
        };
        let Some(Value::Dictionary(tile)) = dict.get("tile-data") else {
            panic!("expected nested dictionary");
        };
        assert_eq!(tile.get("file-label"), Some(&Value::String("Terminal".into())));
        assert_eq!(
            tile.get("badges"),
            Some(&Value::Array(vec![
                Value::Integer(1.into()),
                Value::Integer(2.into())
            ]))
        );
    }

    #[test]
    fn rfc3339_datetime_becomes_date() {
        let value: toml::Value = toml::from_str("when = 2024-01-02T03:04:05Z").unwrap();
        let converted = toml_to_plist(value.get("when").unwrap());
        assert!(matches!(converted, Value::Date(_)));
    }

    #[test]
    fn local_date_degrades_to_string() {
        let value: toml::Value = toml::from_str("when = 2024-01-02").unwrap();
        let converted = toml_to_plist(value.get("when").unwrap());
        assert_eq!(converted, Value::String("2024-01-02".into()));
    }
}
