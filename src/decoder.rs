use std::net::IpAddr;

use tracing::debug;

use crate::attributes::AttributeSet;
use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use crate::mmdb::DatabaseSet;
use crate::record::EventRecord;
use crate::resolve::{AddressResolver, Resolve};
use crate::writer::FieldWriter;

/// Enriches records with GeoIP attributes.
///
/// A decoder is fully set up by its constructor: every database it will ever
/// query is already open, and from then on it is only read. Share it freely
/// between threads.
#[derive(Debug)]
pub struct GeoIpDecoder {
    fields: Vec<String>,
    resolver: AddressResolver,
    databases: DatabaseSet,
    writer: FieldWriter,
    language: String,
}

impl GeoIpDecoder {
    /// Validate `config` and open the databases it names.
    pub fn new(config: &DecoderConfig) -> Result<Self> {
        config.validate()?;
        let databases = DatabaseSet::open(config)?;
        Self::with_databases(config, databases)
    }

    /// Build a decoder around databases the host opened itself.
    pub fn with_databases(config: &DecoderConfig, databases: DatabaseSet) -> Result<Self> {
        config.validate()?;
        if databases.is_empty() {
            return Err(Error::NoDatabases);
        }
        Ok(Self {
            fields: config.candidate_fields(),
            resolver: AddressResolver::new(config.resolution()),
            databases,
            writer: FieldWriter::new(config.target_field_prefix.clone(), config.output_shape()),
            language: config.language.clone(),
        })
    }

    /// Use a different host-name resolver for DNS mode.
    #[must_use]
    pub fn with_resolver<R: Resolve + 'static>(mut self, resolver: R) -> Self {
        self.resolver = self.resolver.with_resolver(resolver);
        self
    }

    /// Candidate fields in the order they are tried.
    #[inline]
    pub fn candidate_fields(&self) -> &[String] {
        &self.fields
    }

    #[inline]
    pub fn databases(&self) -> &DatabaseSet {
        &self.databases
    }

    /// Enrich `record` and hand it back as the only output of this stage.
    ///
    /// Records are never dropped and never fail here.
    pub fn decode<R: EventRecord>(&self, mut record: R) -> Vec<R> {
        self.enrich(&mut record);
        vec![record]
    }

    /// Enrich `record` in place. Returns whether any field was added.
    ///
    /// Candidate fields are tried in order; the first one whose address
    /// produces output from any database ends the search.
    pub fn enrich<R: EventRecord + ?Sized>(&self, record: &mut R) -> bool {
        for name in &self.fields {
            let Some(ip) = self.resolver.resolve(record.field(name)) else {
                continue;
            };
            if self.enrich_with(record, ip) > 0 {
                return true;
            }
            debug!(field = %name, %ip, "no GeoIP data for address");
        }
        false
    }

    /// Query every configured database for `ip` and write what they return.
    ///
    /// Returns how many databases produced attributes.
    fn enrich_with<R: EventRecord + ?Sized>(&self, record: &mut R, ip: IpAddr) -> usize {
        let found: Vec<AttributeSet> = self
            .databases
            .kinds()
            .filter_map(|kind| self.databases.query(kind, ip, &self.language))
            .collect();
        if !found.is_empty() {
            self.writer.write_all(record, &found);
        }
        found.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmdb::{DatabaseKind, LookupDatabase};
    use crate::records::{ConnectionTypeRecord, LookupRecord};
    use crate::Message;

    #[derive(Debug)]
    struct Corporate;

    impl LookupDatabase for Corporate {
        fn kind(&self) -> DatabaseKind {
            DatabaseKind::ConnectionType
        }

        fn lookup(&self, _ip: IpAddr) -> Result<LookupRecord> {
            Ok(LookupRecord::ConnectionType(ConnectionTypeRecord {
                connection_type: Some("Corporate".into()),
            }))
        }
    }

    fn config(fields: &[&str]) -> DecoderConfig {
        DecoderConfig {
            source_host_fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn decode_returns_single_record() {
        let decoder = GeoIpDecoder::with_databases(
            &config(&["ip"]),
            DatabaseSet::from_databases(vec![Box::new(Corporate)]),
        )
        .unwrap();
        let out = decoder.decode(Message::new().with_field("ip", "10.0.0.1"));
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].field("geoip_connection_type").and_then(|v| v.as_str()),
            Some("Corporate")
        );
    }

    #[test]
    fn requires_candidate_fields() {
        let err = GeoIpDecoder::with_databases(&config(&[]), DatabaseSet::default()).unwrap_err();
        assert!(matches!(err, Error::MissingSourceFields));
    }

    #[test]
    fn requires_a_database() {
        let err = GeoIpDecoder::with_databases(&config(&["ip"]), DatabaseSet::default()).unwrap_err();
        assert!(matches!(err, Error::NoDatabases));
    }

    #[test]
    fn new_fails_without_databases() {
        let err = GeoIpDecoder::new(&config(&["ip"])).unwrap_err();
        assert!(matches!(err, Error::NoDatabases));
    }

    #[test]
    fn decoder_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GeoIpDecoder>();
    }
}
