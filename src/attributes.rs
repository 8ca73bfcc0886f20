//! Mapping raw lookup records onto named attributes.
//!
//! Every extractor follows one rule: a value that is empty, zero or false is
//! absent and never emitted. An empty [`AttributeSet`] therefore means the
//! lookup found nothing worth writing.

use std::slice;

use crate::records::{
    AnonymousIpRecord, CityRecord, ConnectionTypeRecord, IspRecord, LookupRecord,
};

/// Locale used for country and city names when none is configured.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Significant digits used when rendering coordinates as text.
const COORDINATE_DIGITS: usize = 16;

/// One extracted value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Bool(bool),
    /// A latitude/longitude pair, rendered as `[lon,lat]`.
    Location { latitude: f64, longitude: f64 },
}

/// Named attributes in extractor-defined order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeSet {
    attrs: Vec<(&'static str, AttributeValue)>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, name: &'static str, value: AttributeValue) {
        self.attrs.push((name, value));
    }

    /// Push a string attribute unless it is missing or empty.
    #[inline]
    fn push_str(&mut self, name: &'static str, value: Option<&str>) {
        if let Some(s) = value.filter(|s| !s.is_empty()) {
            self.push(name, AttributeValue::Str(s.to_string()));
        }
    }

    /// Push a flag only when it is set.
    #[inline]
    fn push_flag(&mut self, name: &'static str, value: Option<bool>) {
        if value == Some(true) {
            self.push(name, AttributeValue::Bool(true));
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attrs.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.attrs.iter().map(|(n, _)| *n).collect()
    }

    pub fn iter(&self) -> slice::Iter<'_, (&'static str, AttributeValue)> {
        self.attrs.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a (&'static str, AttributeValue);
    type IntoIter = slice::Iter<'a, (&'static str, AttributeValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Turns one kind of lookup record into attributes. Never fails.
pub trait Extract {
    /// `language` selects localized names where the record has them.
    fn extract(&self, language: &str) -> AttributeSet;
}

impl Extract for CityRecord {
    fn extract(&self, language: &str) -> AttributeSet {
        let mut attrs = AttributeSet::new();

        let latitude = self.latitude.filter(|v| v.is_finite()).unwrap_or(0.0);
        let longitude = self.longitude.filter(|v| v.is_finite()).unwrap_or(0.0);
        // (0, 0) is what the database returns when it has no usable location
        if latitude == 0.0 && longitude == 0.0 {
            return attrs;
        }

        attrs.push(
            "location",
            AttributeValue::Location {
                latitude,
                longitude,
            },
        );
        attrs.push_str("country_code", self.country_iso_code.as_deref());
        attrs.push_str(
            "country",
            self.country_names.get(language).map(String::as_str),
        );
        attrs.push_str("city", self.city_names.get(language).map(String::as_str));
        attrs
    }
}

impl Extract for IspRecord {
    fn extract(&self, _language: &str) -> AttributeSet {
        let mut attrs = AttributeSet::new();
        if let Some(asn) = self.autonomous_system_number.filter(|n| *n != 0) {
            attrs.push("asn", AttributeValue::Int(i64::from(asn)));
        }
        attrs.push_str("asn_org", self.autonomous_system_organization.as_deref());
        attrs.push_str("isp", self.isp.as_deref());
        attrs.push_str("organization", self.organization.as_deref());
        attrs
    }
}

impl Extract for AnonymousIpRecord {
    fn extract(&self, _language: &str) -> AttributeSet {
        let mut attrs = AttributeSet::new();
        attrs.push_flag("is_anonymous", self.is_anonymous);
        attrs.push_flag("is_anonymous_vpn", self.is_anonymous_vpn);
        attrs.push_flag("is_hosting_provider", self.is_hosting_provider);
        attrs.push_flag("is_public_proxy", self.is_public_proxy);
        attrs.push_flag("is_tor_exit_node", self.is_tor_exit_node);
        attrs
    }
}

impl Extract for ConnectionTypeRecord {
    fn extract(&self, _language: &str) -> AttributeSet {
        let mut attrs = AttributeSet::new();
        attrs.push_str("connection_type", self.connection_type.as_deref());
        attrs
    }
}

impl Extract for LookupRecord {
    fn extract(&self, language: &str) -> AttributeSet {
        match self {
            LookupRecord::AnonymousIp(r) => r.extract(language),
            LookupRecord::City(r) => r.extract(language),
            LookupRecord::ConnectionType(r) => r.extract(language),
            LookupRecord::Isp(r) => r.extract(language),
        }
    }
}

/// Render a coordinate like C's `%.16g`: 16 significant digits, trailing
/// zeros removed, exponent form only for very large or small magnitudes.
pub fn format_coordinate(value: f64) -> String {
    let sci = format!("{:.*e}", COORDINATE_DIGITS - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exp: i32 = exp.parse().unwrap_or_default();

    if exp < -4 || exp >= COORDINATE_DIGITS as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.unsigned_abs());
    }

    let decimals = (COORDINATE_DIGITS as i32 - 1 - exp).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, value)).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
