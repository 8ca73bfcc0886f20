//! Owned lookup records, one per database kind.
//!
//! These mirror the parts of the GeoIP2 record layouts the extractors read.
//! Keeping them owned lets any [`LookupDatabase`](crate::mmdb::LookupDatabase)
//! produce them, not only an MMDB reader.

use std::collections::BTreeMap;

use maxminddb::geoip2;

use crate::mmdb::DatabaseKind;

/// Location record from a GeoIP2/GeoLite2 City database.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CityRecord {
    pub country_iso_code: Option<String>,
    /// Country names keyed by locale, e.g. `"en"`.
    pub country_names: BTreeMap<String, String>,
    /// City names keyed by locale.
    pub city_names: BTreeMap<String, String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Record from a GeoIP2 ISP (or GeoLite2 ASN) database.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IspRecord {
    pub autonomous_system_number: Option<u32>,
    pub autonomous_system_organization: Option<String>,
    pub isp: Option<String>,
    pub organization: Option<String>,
}

/// Record from a GeoIP2 Anonymous IP database.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnonymousIpRecord {
    pub is_anonymous: Option<bool>,
    pub is_anonymous_vpn: Option<bool>,
    pub is_hosting_provider: Option<bool>,
    pub is_public_proxy: Option<bool>,
    pub is_tor_exit_node: Option<bool>,
}

/// Record from a GeoIP2 Connection Type database.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionTypeRecord {
    pub connection_type: Option<String>,
}

/// A raw lookup result, tagged by the kind of database that produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupRecord {
    AnonymousIp(AnonymousIpRecord),
    City(CityRecord),
    ConnectionType(ConnectionTypeRecord),
    Isp(IspRecord),
}

impl LookupRecord {
    #[inline]
    pub fn kind(&self) -> DatabaseKind {
        match self {
            LookupRecord::AnonymousIp(_) => DatabaseKind::AnonymousIp,
            LookupRecord::City(_) => DatabaseKind::City,
            LookupRecord::ConnectionType(_) => DatabaseKind::ConnectionType,
            LookupRecord::Isp(_) => DatabaseKind::Isp,
        }
    }
}

fn owned_names(names: Option<BTreeMap<&str, &str>>) -> BTreeMap<String, String> {
    names
        .into_iter()
        .flatten()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl From<geoip2::City<'_>> for CityRecord {
    fn from(city: geoip2::City<'_>) -> Self {
        let (country_iso_code, country_names) = match city.country {
            Some(c) => (c.iso_code.map(str::to_string), owned_names(c.names)),
            None => (None, BTreeMap::new()),
        };
        let (latitude, longitude) = match city.location {
            Some(loc) => (loc.latitude, loc.longitude),
            None => (None, None),
        };
        Self {
            country_iso_code,
            country_names,
            city_names: owned_names(city.city.and_then(|c| c.names)),
            latitude,
            longitude,
        }
    }
}

impl From<geoip2::Isp<'_>> for IspRecord {
    fn from(isp: geoip2::Isp<'_>) -> Self {
        Self {
            autonomous_system_number: isp.autonomous_system_number,
            autonomous_system_organization: isp.autonomous_system_organization.map(str::to_string),
            isp: isp.isp.map(str::to_string),
            organization: isp.organization.map(str::to_string),
        }
    }
}

impl From<geoip2::AnonymousIp> for AnonymousIpRecord {
    fn from(anon: geoip2::AnonymousIp) -> Self {
        Self {
            is_anonymous: anon.is_anonymous,
            is_anonymous_vpn: anon.is_anonymous_vpn,
            is_hosting_provider: anon.is_hosting_provider,
            is_public_proxy: anon.is_public_proxy,
            is_tor_exit_node: anon.is_tor_exit_node,
        }
    }
}

impl From<geoip2::ConnectionType<'_>> for ConnectionTypeRecord {
    fn from(ct: geoip2::ConnectionType<'_>) -> Self {
        Self {
            connection_type: ct.connection_type.map(str::to_string),
        }
    }
}
