//! The geoipdecode library for enriching event records with GeoIP data.
//!
//! A [`GeoIpDecoder`] reads an address from one of several candidate fields
//! of a record, looks it up in up to four MaxMind databases (City, ISP,
//! Anonymous IP, Connection Type) and appends what it finds to the record,
//! either as flat `<prefix>_<attribute>` fields or as one JSON object field.
//!
//! # Examples
//!
//! ```rust,no_run
//! use geoipdecode::{DecoderConfig, EventRecord, GeoIpDecoder, Message};
//!
//! let config = DecoderConfig {
//!     city_db_file: Some("/usr/share/GeoIP/GeoLite2-City.mmdb".into()),
//!     source_host_fields: vec!["client_ip".to_string()],
//!     ..Default::default()
//! };
//! let decoder = GeoIpDecoder::new(&config)?;
//!
//! let mut record = Message::new().with_field("client_ip", "81.2.69.160");
//! decoder.enrich(&mut record);
//! println!("{:?}", record.field("geoip_city"));
//! # Ok::<(), geoipdecode::Error>(())
//! ```

pub mod attributes;
pub mod config;
pub mod decoder;
pub mod error;
pub mod input;
pub mod mmdb;
pub mod record;
pub mod records;
pub mod resolve;
pub mod writer;

pub use crate::attributes::{AttributeSet, AttributeValue, Extract};
pub use crate::config::DecoderConfig;
pub use crate::decoder::GeoIpDecoder;
pub use crate::error::{Error, Result};
pub use crate::mmdb::{DatabaseKind, DatabaseSet, LookupDatabase, MmdbDatabase};
pub use crate::record::{EventRecord, FieldValue, Message};
pub use crate::resolve::{AddressResolver, Resolution, Resolve, SystemResolver};
pub use crate::writer::{FieldWriter, OutputShape};
