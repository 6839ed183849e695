use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::temporal::format_timestamp;

/// The identifier substituted into a template to name one direct object.
///
/// Timestamps render fixed-width so sorting direct paths by name sorts them
/// by time; numbers render as plain decimal and must be sorted numerically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionId {
    /// Allocated from the clock at publish time.
    Timestamp(DateTime<Utc>),
    /// Allocated from the latest-number marker; strictly increasing per template.
    Number(u64),
}

impl VersionId {
    /// Canonical string form used in paths.
    pub fn render(&self) -> String {
        match self {
            VersionId::Timestamp(at) => format_timestamp(at),
            VersionId::Number(n) => n.to_string(),
        }
    }

    /// The sequence number, if this is a number identifier.
    pub fn number(&self) -> Option<u64> {
        match self {
            VersionId::Number(n) => Some(*n),
            VersionId::Timestamp(_) => None,
        }
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_both_forms() {
        let at = Utc.with_ymd_and_hms(2015, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(VersionId::Timestamp(at).render(), "2015.01.02.03.04.05.0000000");
        assert_eq!(VersionId::Number(42).to_string(), "42");
    }

    #[test]
    fn number_accessor() {
        assert_eq!(VersionId::Number(3).number(), Some(3));
        let at = Utc.with_ymd_and_hms(2015, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(VersionId::Timestamp(at).number(), None);
    }
}
