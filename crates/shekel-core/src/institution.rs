//! Supported financial institutions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// A financial institution the scraping service knows how to log into.
///
/// Parsed case-insensitively; serialized with the scraper's camelCase company id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Institution {
    Hapoalim,
    Leumi,
    Discount,
    Mercantile,
    Mizrahi,
    OtsarHahayal,
    VisaCal,
    Max,
    Isracard,
    Amex,
    Union,
    Beinleumi,
    Massad,
    Yahav,
    BeyahadBishvilha,
    OneZero,
    Behatsdaa,
    Pagi,
}

impl Institution {
    pub const ALL: [Institution; 18] = [
        Institution::Hapoalim,
        Institution::Leumi,
        Institution::Discount,
        Institution::Mercantile,
        Institution::Mizrahi,
        Institution::OtsarHahayal,
        Institution::VisaCal,
        Institution::Max,
        Institution::Isracard,
        Institution::Amex,
        Institution::Union,
        Institution::Beinleumi,
        Institution::Massad,
        Institution::Yahav,
        Institution::BeyahadBishvilha,
        Institution::OneZero,
        Institution::Behatsdaa,
        Institution::Pagi,
    ];

    /// Company id understood by the scraping service.
    pub fn company_id(&self) -> &'static str {
        match self {
            Institution::Hapoalim => "hapoalim",
            Institution::Leumi => "leumi",
            Institution::Discount => "discount",
            Institution::Mercantile => "mercantile",
            Institution::Mizrahi => "mizrahi",
            Institution::OtsarHahayal => "otsarHahayal",
            Institution::VisaCal => "visaCal",
            Institution::Max => "max",
            Institution::Isracard => "isracard",
            Institution::Amex => "amex",
            Institution::Union => "union",
            Institution::Beinleumi => "beinleumi",
            Institution::Massad => "massad",
            Institution::Yahav => "yahav",
            Institution::BeyahadBishvilha => "beyahadBishvilha",
            Institution::OneZero => "oneZero",
            Institution::Behatsdaa => "behatsdaa",
            Institution::Pagi => "pagi",
        }
    }
}

impl fmt::Display for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.company_id())
    }
}

impl FromStr for Institution {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Institution::ALL
            .into_iter()
            .find(|i| i.company_id().eq_ignore_ascii_case(needle))
            .ok_or_else(|| AppError::UnknownInstitution(s.to_string()))
    }
}

impl Serialize for Institution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.company_id())
    }
}

impl<'de> Deserialize<'de> for Institution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
