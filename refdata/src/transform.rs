//! Field normalization applied to each feed record before it is written.
//! Everything here is pure; logging of degraded values happens in the loaders.

use crate::config::ManagerLead;
use std::fmt;
use std::str::FromStr;

/// Keeps only the date portion of an ISO-8601 timestamp (`2020-05-01T00:00:00Z` -> `2020-05-01`).
pub fn truncate_date(value: &str) -> &str {
    match value.split_once('T') {
        Some((date, _)) => date,
        None => value,
    }
}

/// The single segment an account is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessSegment {
    KeyAccount,
    Enterprise,
    MidMarket,
    Smb,
    Isv,
    PublicSector,
    /// Pay-as-you-go accounts. Never loaded.
    Paygo,
}

/// Feed markers checked in priority order; the first one contained in the raw string wins.
const SEGMENT_PRIORITY: [(&str, BusinessSegment); 6] = [
    ("Key Accounts", BusinessSegment::KeyAccount),
    ("Enterprise", BusinessSegment::Enterprise),
    ("Midmarket", BusinessSegment::MidMarket),
    ("SMB", BusinessSegment::Smb),
    ("ISV", BusinessSegment::Isv),
    ("Public Sector", BusinessSegment::PublicSector),
];

const PAYGO_MARKER: &str = "NAC HQ";

impl BusinessSegment {
    /// Collapses a colon-separated multi-segment string such as
    /// `NAC Midmarket Cloud:NATD Public Sector` into one segment.
    pub fn collapse(raw: &str) -> BusinessSegment {
        if raw == PAYGO_MARKER {
            return BusinessSegment::Paygo;
        }
        SEGMENT_PRIORITY
            .iter()
            .find(|(marker, _)| raw.contains(marker))
            .map(|(_, segment)| *segment)
            .unwrap_or(BusinessSegment::Smb)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            BusinessSegment::KeyAccount => "Key Account",
            BusinessSegment::Enterprise => "Enterprise",
            BusinessSegment::MidMarket => "Mid-Market",
            BusinessSegment::Smb => "SMB",
            BusinessSegment::Isv => "ISV",
            BusinessSegment::PublicSector => "Public Sector",
            BusinessSegment::Paygo => "PAYGO",
        }
    }

    pub const fn is_excluded(&self) -> bool {
        matches!(self, BusinessSegment::Paygo)
    }
}

impl fmt::Display for BusinessSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleans an SE assignment list like `a@x.com - ECA, b@y.com - Hub SE` into
/// `a@x.com-ECA,b@y.com-Hub SE`. Entries that do not split into exactly two
/// dash-separated parts are dropped.
pub fn tokenize_se_list(raw: &str) -> String {
    if raw.is_empty() || raw == "null" {
        return String::new();
    }

    raw.split(',')
        .filter_map(|entry| {
            let mut parts = entry.split('-');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(role), None) => Some(format!("{}-{}", name.trim(), role.trim())),
                _ => None,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Returns the `app_map` tag of the first configured lead whose address appears
/// in the manager chain, or `None` when the employee is outside every lead's organization.
pub fn manager_lead_tag<'a>(chain: &str, leads: &'a [ManagerLead]) -> Option<&'a str> {
    if chain.is_empty() {
        return None;
    }
    leads
        .iter()
        .find(|lead| chain.contains(lead.manager.as_str()))
        .map(|lead| lead.app_map.as_str())
}

/// `first.name@example.com` -> `cn=FIRST_NAME<suffix>`.
pub fn email_to_directory_name(email: &str, suffix: &str) -> String {
    if email.is_empty() {
        return String::new();
    }
    let local = email.split('@').next().unwrap_or(email);
    format!("cn={}{}", local.replace('.', "_").to_uppercase(), suffix)
}

/// Splits a full name into given name and surname on the first space.
pub fn split_full_name(full_name: &str) -> (&str, &str) {
    match full_name.trim().split_once(' ') {
        Some((given, surname)) => (given.trim(), surname.trim()),
        None => (full_name.trim(), ""),
    }
}

/// Outcome of parsing a numeric feed field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric<T> {
    Parsed(T),
    /// The field was empty.
    Absent,
    /// The field had content that did not parse.
    Unparseable,
}

/// A numeric type a feed field can be parsed into.
pub trait FeedNumber: FromStr + Default {
    /// Values the column cannot hold, such as `NaN` or an overflowed float.
    fn is_finite(&self) -> bool {
        true
    }
}

impl FeedNumber for i64 {}

impl FeedNumber for f64 {
    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }
}

impl<T: FeedNumber> Numeric<T> {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Numeric::Absent;
        }
        match trimmed.parse::<T>() {
            Ok(value) if value.is_finite() => Numeric::Parsed(value),
            Ok(_) | Err(_) => Numeric::Unparseable,
        }
    }

    pub fn or_zero(self) -> T {
        match self {
            Numeric::Parsed(value) => value,
            Numeric::Absent | Numeric::Unparseable => T::default(),
        }
    }
}

/// Feed amounts are expressed in thousands.
pub fn scale_thousands(value: f64) -> f64 {
    value * 1000.0
}
