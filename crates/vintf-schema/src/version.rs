use crate::types::string_serde;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Placeholder major version under which AIDL instances are stored.
///
/// AIDL declarations carry no package version on the wire, but a stored
/// `FqInstance` with a package needs one. The real AIDL version travels in the
/// minor component and is stamped on at enumeration time.
pub const FAKE_AIDL_MAJOR_VERSION: u64 = u64::MAX;

/// AIDL version assumed when a declaration lists none.
pub const DEFAULT_AIDL_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version '{0}', expected '<major>.<minor>'")]
    Malformed(String),
    #[error("invalid version number '{0}'")]
    InvalidNumber(String),
    #[error("version number '{0}' is out of range")]
    OutOfRange(String),
}

/// A `(major, minor)` interface version, ordered lexicographically.
///
/// `major == 0` is the "no version" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    major: u64,
    minor: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }

    /// The stored form of AIDL version `version`.
    pub const fn aidl(version: u64) -> Self {
        Self::new(FAKE_AIDL_MAJOR_VERSION, version)
    }

    pub const fn major(self) -> u64 {
        self.major
    }

    pub const fn minor(self) -> u64 {
        self.minor
    }

    /// False for the `major == 0` sentinel.
    pub const fn is_present(self) -> bool {
        self.major > 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| VersionError::Malformed(s.to_owned()))?;
        Ok(Self::new(parse_component(major)?, parse_component(minor)?))
    }
}

string_serde!(Version);

/// Parse one version number: `0` or `[1-9][0-9]*`, within `u64`.
pub(crate) fn parse_component(text: &str) -> Result<u64, VersionError> {
    let bytes = text.as_bytes();
    let grammatical = match bytes {
        [] => false,
        [b'0'] => true,
        [first, rest @ ..] => {
            (b'1'..=b'9').contains(first) && rest.iter().all(u8::is_ascii_digit)
        }
    };
    if !grammatical {
        return Err(VersionError::InvalidNumber(text.to_owned()));
    }
    text.parse()
        .map_err(|_| VersionError::OutOfRange(text.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_major_then_minor() {
        assert!(Version::new(1, 9) < Version::new(2, 0));
        assert!(Version::new(2, 0) < Version::new(2, 1));
        assert_eq!(Version::new(3, 4), Version::new(3, 4));
    }

    #[test]
    fn zero_major_is_absent() {
        assert!(!Version::default().is_present());
        assert!(!Version::new(0, 5).is_present());
        assert!(Version::new(1, 0).is_present());
    }

    #[test]
    fn parses_and_displays() {
        let v: Version = "10.12".parse().unwrap();
        assert_eq!(v, Version::new(10, 12));
        assert_eq!(v.to_string(), "10.12");
    }

    #[test]
    fn rejects_leading_zeros_and_garbage() {
        assert!("01.0".parse::<Version>().is_err());
        assert!("1.00".parse::<Version>().is_err());
        assert!("1".parse::<Version>().is_err());
        assert!("1.".parse::<Version>().is_err());
        assert!("a.b".parse::<Version>().is_err());
        assert!("1.0.0".parse::<Version>().is_err());
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(
            "99999999999999999999.0".parse::<Version>(),
            Err(VersionError::OutOfRange("99999999999999999999".to_owned()))
        );
    }

    #[test]
    fn aidl_versions_use_placeholder_major() {
        let v = Version::aidl(3);
        assert_eq!(v.major(), FAKE_AIDL_MAJOR_VERSION);
        assert_eq!(v.minor(), 3);
        assert_eq!(v.to_string().parse::<Version>().unwrap(), v);
    }
}
