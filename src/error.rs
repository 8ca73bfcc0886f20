use camino::Utf8PathBuf;

use crate::mmdb::DatabaseKind;

/// Error types for the geoipdecode library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// MMDB database file was not found at the configured path.
    #[error("{kind} database not found: {path}")]
    DatabaseNotFound { kind: DatabaseKind, path: Utf8PathBuf },

    /// MMDB database file exists but could not be opened.
    #[error("could not open {kind} database at {path}")]
    OpenDatabase {
        kind: DatabaseKind,
        path: Utf8PathBuf,
        #[source]
        source: maxminddb::MaxMindDBError,
    },

    /// IP address lookup failed in the MMDB database.
    #[error("lookup failed for {ip}")]
    LookupFailed {
        ip: String,
        #[source]
        source: maxminddb::MaxMindDBError,
    },

    /// No database could be opened, so the decoder would never add anything.
    #[error("no usable GeoIP database configured")]
    NoDatabases,

    /// No candidate address fields were configured.
    #[error("`source_host_fields` must be specified")]
    MissingSourceFields,

    /// The output field-name prefix is empty.
    #[error("`target_field_prefix` must be specified")]
    MissingTargetPrefix,

    /// The record refused a new field.
    #[error("invalid field name: {name:?}")]
    InvalidFieldName { name: String },

    /// The configuration file could not be parsed.
    #[error("invalid configuration")]
    Config(#[from] toml::de::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using the library error.
pub type Result<T> = std::result::Result<T, Error>;
