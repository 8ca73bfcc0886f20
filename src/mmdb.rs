use std::fmt;
use std::net::IpAddr;

use camino::{Utf8Path, Utf8PathBuf};
use maxminddb::{geoip2, Mmap, Reader};
use tracing::{debug, info, trace, warn};

use crate::attributes::{AttributeSet, Extract};
use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use crate::records::LookupRecord;

/// The kinds of database the decoder knows how to read.
///
/// Declaration order is query order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatabaseKind {
    AnonymousIp,
    City,
    ConnectionType,
    Isp,
}

impl DatabaseKind {
    /// All kinds, in query order.
    pub const ALL: [DatabaseKind; 4] = [
        DatabaseKind::AnonymousIp,
        DatabaseKind::City,
        DatabaseKind::ConnectionType,
        DatabaseKind::Isp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DatabaseKind::AnonymousIp => "anonymous-ip",
            DatabaseKind::City => "city",
            DatabaseKind::ConnectionType => "connection-type",
            DatabaseKind::Isp => "isp",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A read-only store mapping an IP address to one kind of record.
///
/// Implementations must be safe to query from many threads at once.
pub trait LookupDatabase: fmt::Debug + Send + Sync {
    /// The kind of record this database returns.
    fn kind(&self) -> DatabaseKind;

    /// Look up the record for `ip`.
    fn lookup(&self, ip: IpAddr) -> Result<LookupRecord>;
}

/// A memory-mapped MaxMind database of a single kind.
pub struct MmdbDatabase {
    kind: DatabaseKind,
    path: Utf8PathBuf,
    reader: Reader<Mmap>,
}

impl fmt::Debug for MmdbDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmdbDatabase")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("database_type", &self.reader.metadata.database_type)
            .finish()
    }
}

impl MmdbDatabase {
    /// Open the database at `path` as `kind`.
    pub fn open(kind: DatabaseKind, path: &Utf8Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::DatabaseNotFound {
                kind,
                path: path.to_path_buf(),
            });
        }
        let reader = Reader::open_mmap(path).map_err(|source| Error::OpenDatabase {
            kind,
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            kind,
            path: path.to_path_buf(),
            reader,
        })
    }
}

impl LookupDatabase for MmdbDatabase {
    fn kind(&self) -> DatabaseKind {
        self.kind
    }

    fn lookup(&self, ip: IpAddr) -> Result<LookupRecord> {
        let failed = |source| Error::LookupFailed {
            ip: ip.to_string(),
            source,
        };
        let record = match self.kind {
            DatabaseKind::AnonymousIp => LookupRecord::AnonymousIp(
                self.reader
                    .lookup::<geoip2::AnonymousIp>(ip)
                    .map_err(failed)?
                    .into(),
            ),
            DatabaseKind::City => LookupRecord::City(
                self.reader
                    .lookup::<geoip2::City>(ip)
                    .map_err(failed)?
                    .into(),
            ),
            DatabaseKind::ConnectionType => LookupRecord::ConnectionType(
                self.reader
                    .lookup::<geoip2::ConnectionType>(ip)
                    .map_err(failed)?
                    .into(),
            ),
            DatabaseKind::Isp => LookupRecord::Isp(
                self.reader
                    .lookup::<geoip2::Isp>(ip)
                    .map_err(failed)?
                    .into(),
            ),
        };
        Ok(record)
    }
}

/// The set of databases a decoder queries, at most one per kind.
///
/// Built once before any record is processed and only read afterwards.
#[derive(Debug, Default)]
pub struct DatabaseSet {
    databases: Vec<Box<dyn LookupDatabase>>,
}

impl DatabaseSet {
    /// Open every database the configuration names.
    ///
    /// A database that fails to open is logged and left out; the set is only
    /// an error when nothing at all could be opened.
    pub fn open(config: &DecoderConfig) -> Result<Self> {
        let mut databases: Vec<Box<dyn LookupDatabase>> = Vec::new();

        for kind in DatabaseKind::ALL {
            let Some(path) = config.database_path(kind) else {
                continue;
            };
            match MmdbDatabase::open(kind, &path) {
                Ok(db) => {
                    info!(%kind, %path, "opened GeoIP database");
                    databases.push(Box::new(db));
                }
                Err(err) => warn!(%kind, %path, error = %err, "disabling GeoIP database"),
            }
        }

        if databases.is_empty() {
            return Err(Error::NoDatabases);
        }
        Ok(Self::from_databases(databases))
    }

    /// Build a set from already-opened databases. When two share a kind the
    /// first one is kept.
    pub fn from_databases(databases: Vec<Box<dyn LookupDatabase>>) -> Self {
        let mut kept: Vec<Box<dyn LookupDatabase>> = Vec::with_capacity(databases.len());
        for db in databases {
            if kept.iter().any(|k| k.kind() == db.kind()) {
                warn!(kind = %db.kind(), "ignoring duplicate GeoIP database");
                continue;
            }
            kept.push(db);
        }
        kept.sort_by_key(|db| db.kind());
        Self { databases: kept }
    }

    /// Configured kinds, in query order.
    pub fn kinds(&self) -> impl Iterator<Item = DatabaseKind> + '_ {
        self.databases.iter().map(|db| db.kind())
    }

    /// Number of open databases.
    #[inline]
    pub fn len(&self) -> usize {
        self.databases.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    /// Query one kind of database.
    ///
    /// Returns `None` when the kind is not configured, the lookup fails, or the
    /// record has nothing worth emitting.
    pub fn query(&self, kind: DatabaseKind, ip: IpAddr, language: &str) -> Option<AttributeSet> {
        let db = self.databases.iter().find(|db| db.kind() == kind)?;

        let record = match db.lookup(ip) {
            Ok(record) => record,
            Err(err) => {
                trace!(%kind, %ip, error = %err, "no GeoIP record");
                return None;
            }
        };
        if record.kind() != kind {
            debug!(%kind, got = %record.kind(), "database returned a record of the wrong kind");
            return None;
        }

        let attrs = record.extract(language);
        if attrs.is_empty() {
            trace!(%kind, %ip, "GeoIP record has no usable attributes");
            return None;
        }
        Some(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ConnectionTypeRecord, IspRecord};

    #[derive(Debug)]
    struct Fixed(LookupRecord);

    impl LookupDatabase for Fixed {
        fn kind(&self) -> DatabaseKind {
            self.0.kind()
        }

        fn lookup(&self, _ip: IpAddr) -> Result<LookupRecord> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug)]
    struct Missing(DatabaseKind);

    impl LookupDatabase for Missing {
        fn kind(&self) -> DatabaseKind {
            self.0
        }

        fn lookup(&self, _ip: IpAddr) -> Result<LookupRecord> {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "address not in database",
            )))
        }
    }

    fn isp(asn: u32) -> Box<dyn LookupDatabase> {
        Box::new(Fixed(LookupRecord::Isp(IspRecord {
            autonomous_system_number: Some(asn),
            ..Default::default()
        })))
    }

    fn ip() -> IpAddr {
        "81.2.69.160".parse().unwrap()
    }

    #[test]
    fn kinds_are_sorted_and_deduplicated() {
        let set = DatabaseSet::from_databases(vec![
            isp(1),
            Box::new(Missing(DatabaseKind::City)),
            isp(2),
        ]);
        assert_eq!(
            set.kinds().collect::<Vec<_>>(),
            vec![DatabaseKind::City, DatabaseKind::Isp]
        );
        // the first ISP database wins
        let attrs = set.query(DatabaseKind::Isp, ip(), "en").unwrap();
        assert_eq!(
            attrs.get("asn"),
            Some(&crate::attributes::AttributeValue::Int(1))
        );
    }

    #[test]
    fn unconfigured_kind_is_not_found() {
        let set = DatabaseSet::from_databases(vec![isp(15169)]);
        assert!(set.query(DatabaseKind::City, ip(), "en").is_none());
    }

    #[test]
    fn lookup_errors_are_not_found() {
        let set = DatabaseSet::from_databases(vec![Box::new(Missing(DatabaseKind::City))]);
        assert!(set.query(DatabaseKind::City, ip(), "en").is_none());
    }

    #[test]
    fn empty_records_are_not_found() {
        let set = DatabaseSet::from_databases(vec![
            isp(0),
            Box::new(Fixed(LookupRecord::ConnectionType(ConnectionTypeRecord {
                connection_type: None,
            }))),
        ]);
        assert!(set.query(DatabaseKind::Isp, ip(), "en").is_none());
        assert!(set.query(DatabaseKind::ConnectionType, ip(), "en").is_none());
    }

    #[test]
    fn all_databases_missing_is_an_error() {
        let config = DecoderConfig {
            city_db_file: Some("/nonexistent/GeoLite2-City.mmdb".into()),
            ..Default::default()
        };
        assert!(matches!(DatabaseSet::open(&config), Err(Error::NoDatabases)));
    }

    #[test]
    fn open_reports_missing_file() {
        let err = MmdbDatabase::open(DatabaseKind::Isp, Utf8Path::new("/nonexistent/isp.mmdb"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DatabaseNotFound {
                kind: DatabaseKind::Isp,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "isp database not found: /nonexistent/isp.mmdb"
        );
    }

    #[test]
    fn kind_names() {
        assert_eq!(DatabaseKind::AnonymousIp.to_string(), "anonymous-ip");
        assert_eq!(
            DatabaseKind::ALL.iter().map(|k| k.name()).collect::<Vec<_>>(),
            vec!["anonymous-ip", "city", "connection-type", "isp"]
        );
    }
}
