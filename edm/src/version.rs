//! OData protocol versions.

use serde::{Deserialize, Serialize};

/// An OData protocol version.
///
/// Ordered oldest to newest so version ranges can be expressed with the
/// ordinary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// OData 1.0.
    V1,
    /// OData 2.0.
    V2,
    /// OData 3.0.
    V3,
    /// OData 4.0 and 4.01.
    V4,
}

impl ProtocolVersion {
    /// Every version, oldest first.
    pub const ALL: [ProtocolVersion; 4] = [Self::V1, Self::V2, Self::V3, Self::V4];

    /// Parses a version header or attribute value such as `"3.0"`, `"2.0;NetFx"`
    /// or `"4.01"`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let number = value.split(';').next().unwrap_or("").trim();
        let major = number.split('.').next().unwrap_or("");
        match major {
            "1" => Some(Self::V1),
            "2" => Some(Self::V2),
            "3" => Some(Self::V3),
            "4" => Some(Self::V4),
            _ => None,
        }
    }

    /// Returns the canonical header spelling (`"3.0"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "1.0",
            Self::V2 => "2.0",
            Self::V3 => "3.0",
            Self::V4 => "4.0",
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_spellings() {
        assert_eq!(ProtocolVersion::parse("1.0"), Some(ProtocolVersion::V1));
        assert_eq!(ProtocolVersion::parse("2.0;NetFx"), Some(ProtocolVersion::V2));
        assert_eq!(ProtocolVersion::parse(" 3.0 "), Some(ProtocolVersion::V3));
        assert_eq!(ProtocolVersion::parse("4.01"), Some(ProtocolVersion::V4));
        assert_eq!(ProtocolVersion::parse("five"), None);
    }

    #[test]
    fn versions_are_ordered() {
        assert!(ProtocolVersion::V1 < ProtocolVersion::V4);
        assert!(ProtocolVersion::V3 > ProtocolVersion::V2);
    }
}
