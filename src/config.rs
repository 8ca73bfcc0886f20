//! Decoder configuration.
//!
//! Mirrors the TOML section a pipeline would carry for this decoder:
//!
//! ```toml
//! mmdb_dir = "/usr/share/GeoIP"
//! city_db_file = "GeoLite2-City.mmdb"
//! isp_db_file = "GeoIP2-ISP.mmdb"
//! source_host_fields = ["client_ip", "remote_host"]
//! target_field_prefix = "geoip"
//! raw_json_object = false
//! dns_lookup = false
//! language = "en"
//! ```

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::attributes::DEFAULT_LANGUAGE;
use crate::error::{Error, Result};
use crate::mmdb::DatabaseKind;
use crate::resolve::Resolution;
use crate::writer::OutputShape;

const DEFAULT_TARGET_PREFIX: &str = "geoip";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DecoderConfig {
    /// City database. `db_file` is accepted for older single-database configs.
    #[serde(alias = "db_file")]
    pub city_db_file: Option<Utf8PathBuf>,
    pub anonymous_ip_db_file: Option<Utf8PathBuf>,
    pub connection_type_db_file: Option<Utf8PathBuf>,
    pub isp_db_file: Option<Utf8PathBuf>,

    /// Base directory for relative database paths.
    pub mmdb_dir: Option<Utf8PathBuf>,

    /// Candidate address fields, tried in order.
    pub source_host_fields: Vec<String>,
    /// Older single-field form; tried after `source_host_fields`.
    pub source_host_field: Option<String>,

    pub target_field_prefix: String,
    /// Write one JSON object field instead of one field per attribute.
    pub raw_json_object: bool,
    /// Resolve candidate values as host names instead of parsing literals.
    pub dns_lookup: bool,
    /// Locale for country and city names.
    pub language: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            city_db_file: None,
            anonymous_ip_db_file: None,
            connection_type_db_file: None,
            isp_db_file: None,
            mmdb_dir: None,
            source_host_fields: Vec::new(),
            source_host_field: None,
            target_field_prefix: DEFAULT_TARGET_PREFIX.to_string(),
            raw_json_object: false,
            dns_lookup: false,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl DecoderConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check the settings that make a decoder useless when missing.
    pub fn validate(&self) -> Result<()> {
        if self.candidate_fields().is_empty() {
            return Err(Error::MissingSourceFields);
        }
        if self.target_field_prefix.is_empty() {
            return Err(Error::MissingTargetPrefix);
        }
        Ok(())
    }

    /// Candidate address fields in the order they are tried.
    pub fn candidate_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::with_capacity(self.source_host_fields.len() + 1);
        let all = self
            .source_host_fields
            .iter()
            .chain(self.source_host_field.iter());
        for name in all {
            if !name.trim().is_empty() && !fields.contains(name) {
                fields.push(name.clone());
            }
        }
        fields
    }

    /// Configured path of a database, resolved against `mmdb_dir` when relative.
    pub fn database_path(&self, kind: DatabaseKind) -> Option<Utf8PathBuf> {
        let path = match kind {
            DatabaseKind::AnonymousIp => self.anonymous_ip_db_file.as_ref(),
            DatabaseKind::City => self.city_db_file.as_ref(),
            DatabaseKind::ConnectionType => self.connection_type_db_file.as_ref(),
            DatabaseKind::Isp => self.isp_db_file.as_ref(),
        }?;
        if path.as_str().is_empty() {
            return None;
        }
        match &self.mmdb_dir {
            Some(dir) if path.is_relative() => Some(dir.join(path)),
            _ => Some(path.clone()),
        }
    }

    pub fn resolution(&self) -> Resolution {
        if self.dns_lookup {
            Resolution::Dns
        } else {
            Resolution::Literal
        }
    }

    pub fn output_shape(&self) -> OutputShape {
        if self.raw_json_object {
            OutputShape::JsonObject
        } else {
            OutputShape::Fields
        }
    }
}
