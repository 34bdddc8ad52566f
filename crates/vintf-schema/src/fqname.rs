//! Fully-qualified interface identifiers.
//!
//! Grammar, with every section optional but position-locked:
//!
//! ```text
//! ident   = [a-zA-Z_][a-zA-Z0-9_]*
//! package = ident ('.' ident)*
//! number  = "0" | [1-9][0-9]*
//! fqname  = [package] ['@' number '.' number] ['::' package]
//! ```
//!
//! For example `android.hardware.foo@1.0::IFoo.Type`. A lone package with
//! neither version nor name (`IFoo`, `a.b.c`) is read as a *name*.

use crate::types::canonical_string;
use crate::version::{parse_component, Version, VersionError};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FqNameError {
    #[error("identifier must not be empty")]
    Empty,
    #[error("invalid identifier '{input}': unexpected character at offset {offset}")]
    UnexpectedChar { input: String, offset: usize },
    #[error("invalid identifier '{input}': expected '.<minor>' after the major version")]
    MissingMinor { input: String },
    #[error("invalid identifier '{input}': expected '::' before the name")]
    UnterminatedScope { input: String },
    #[error("invalid identifier '{input}': '::' must follow a package or version")]
    DanglingScope { input: String },
    #[error("invalid identifier '{input}': trailing characters at offset {offset}")]
    TrailingInput { input: String, offset: usize },
    #[error("invalid identifier '{input}': {source}")]
    Version {
        input: String,
        #[source]
        source: VersionError,
    },
    #[error("invalid identifier '{input}': major version 0 means 'no version'")]
    ZeroMajor { input: String },
    #[error("invalid identifier '{input}': a package requires a version")]
    UnversionedPackage { input: String },
    #[error("fields do not round-trip through '{rendered}'")]
    NotCanonical { rendered: String },
}

/// A parsed `package@major.minor::name` identifier.
///
/// Only constructible through [`FqName::parse`] or [`FqName::from_parts`], so
/// every value renders to a string the parser accepts and parses back to the
/// same fields.
#[derive(Debug, Clone, Default)]
pub struct FqName {
    package: String,
    major: u64,
    minor: u64,
    name: String,
    is_identifier: bool,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_body(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

// Each `eat_*` returns the end of the match starting at `at`, or the offset
// of the first byte that broke the grammar.

fn eat_ident(s: &[u8], at: usize) -> Result<usize, usize> {
    if !s.get(at).copied().is_some_and(is_ident_start) {
        return Err(at);
    }
    let mut l = at + 1;
    while s.get(l).copied().is_some_and(is_ident_body) {
        l += 1;
    }
    Ok(l)
}

fn eat_package(s: &[u8], at: usize) -> Result<usize, usize> {
    let mut l = eat_ident(s, at)?;
    while s.get(l) == Some(&b'.') {
        l = eat_ident(s, l + 1)?;
    }
    Ok(l)
}

fn parse_pair(major: &str, minor: &str) -> Result<(u64, u64), VersionError> {
    Ok((parse_component(major)?, parse_component(minor)?))
}

fn eat_number(s: &[u8], at: usize) -> Result<usize, usize> {
    match s.get(at) {
        Some(b'0') => Ok(at + 1),
        Some(b'1'..=b'9') => {
            let mut l = at + 1;
            while s.get(l).is_some_and(u8::is_ascii_digit) {
                l += 1;
            }
            Ok(l)
        }
        _ => Err(at),
    }
}

impl FqName {
    /// Parse the full grammar, consuming the whole input.
    pub fn parse(s: &str) -> Result<Self, FqNameError> {
        if s.is_empty() {
            return Err(FqNameError::Empty);
        }

        let bytes = s.as_bytes();
        let unexpected = |offset| FqNameError::UnexpectedChar {
            input: s.to_owned(),
            offset,
        };

        let mut l = 0;
        let mut package: Option<Range<usize>> = None;
        let mut version: Option<(Range<usize>, Range<usize>)> = None;
        let mut name: Option<Range<usize>> = None;

        if bytes.first().copied().is_some_and(is_ident_start) {
            let end = eat_package(bytes, 0).map_err(unexpected)?;
            package = Some(0..end);
            l = end;
        }

        if bytes.get(l) == Some(&b'@') {
            let major_start = l + 1;
            let major_end = eat_number(bytes, major_start).map_err(unexpected)?;
            if bytes.get(major_end) != Some(&b'.') {
                return Err(FqNameError::MissingMinor {
                    input: s.to_owned(),
                });
            }
            let minor_start = major_end + 1;
            let minor_end = eat_number(bytes, minor_start).map_err(unexpected)?;
            version = Some((major_start..major_end, minor_start..minor_end));
            l = minor_end;
        }

        if bytes.get(l) == Some(&b':') {
            if bytes.get(l + 1) != Some(&b':') {
                return Err(FqNameError::UnterminatedScope {
                    input: s.to_owned(),
                });
            }
            // `::IFoo` would print back as `IFoo`.
            if package.is_none() && version.is_none() {
                return Err(FqNameError::DanglingScope {
                    input: s.to_owned(),
                });
            }
            let start = l + 2;
            let end = eat_package(bytes, start).map_err(unexpected)?;
            name = Some(start..end);
            l = end;
        }

        if l < bytes.len() {
            return Err(FqNameError::TrailingInput {
                input: s.to_owned(),
                offset: l,
            });
        }

        // A lone package is a name.
        if name.is_none() && version.is_none() {
            name = package.take();
        }

        let slice = |range: Option<Range<usize>>| range.map_or_else(String::new, |r| s[r].to_owned());
        let package = slice(package);
        let name = slice(name);

        let (major, minor) = match version {
            Some((major, minor)) => {
                let (major, minor) = (&s[major], &s[minor]);
                match parse_pair(major, minor) {
                    Ok((0, _)) => {
                        return Err(FqNameError::ZeroMajor {
                            input: s.to_owned(),
                        })
                    }
                    Ok(pair) => pair,
                    Err(source) => {
                        warn!("numbers in {major}.{minor} are out of range");
                        return Err(FqNameError::Version {
                            input: s.to_owned(),
                            source,
                        });
                    }
                }
            }
            None => (0, 0),
        };

        if !package.is_empty() && major == 0 {
            return Err(FqNameError::UnversionedPackage {
                input: s.to_owned(),
            });
        }

        let is_identifier = major == 0 && package.is_empty() && !name.contains('.');

        Ok(Self {
            package,
            major,
            minor,
            name,
            is_identifier,
        })
    }

    /// Build from separate fields. The fields are rendered, re-parsed, and
    /// must come back unchanged; otherwise the combination is rejected.
    pub fn from_parts(package: &str, major: u64, minor: u64, name: &str) -> Result<Self, FqNameError> {
        let candidate = Self {
            package: package.to_owned(),
            major,
            minor,
            name: name.to_owned(),
            is_identifier: false,
        };
        let rendered = candidate.to_string();
        let parsed = Self::parse(&rendered)?;
        if parsed.package != candidate.package
            || parsed.major != candidate.major
            || parsed.minor != candidate.minor
            || parsed.name != candidate.name
        {
            return Err(FqNameError::NotCanonical { rendered });
        }
        Ok(parsed)
    }

    /// Parse in place. On failure `self` is reset to the empty identifier.
    pub fn set_to(&mut self, s: &str) -> Result<(), FqNameError> {
        match Self::parse(s) {
            Ok(parsed) => {
                *self = parsed;
                Ok(())
            }
            Err(e) => {
                *self = Self::default();
                Err(e)
            }
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn has_version(&self) -> bool {
        self.major > 0
    }

    pub fn version(&self) -> Option<Version> {
        self.has_version()
            .then(|| Version::new(self.major, self.minor))
    }

    /// `"1.0"`, or empty without a version.
    pub fn version_string(&self) -> String {
        self.version().map(|v| v.to_string()).unwrap_or_default()
    }

    /// `"@1.0"`, or empty without a version.
    pub fn at_version(&self) -> String {
        self.version().map(|v| format!("@{v}")).unwrap_or_default()
    }

    /// # Panics
    /// Panics without a version; check [`has_version`](Self::has_version) first.
    pub fn major(&self) -> u64 {
        assert!(self.has_version(), "FqName '{self}' has no version");
        self.major
    }

    /// # Panics
    /// Panics without a version; check [`has_version`](Self::has_version) first.
    pub fn minor(&self) -> u64 {
        assert!(self.has_version(), "FqName '{self}' has no version");
        self.minor
    }

    /// The part after the version, e.g. `IFoo.Type` in `a.b@1.0::IFoo.Type`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the whole input was a single unqualified token.
    pub fn is_identifier(&self) -> bool {
        self.is_identifier
    }

    /// Interface names start with `I` and have no further dots.
    pub fn is_interface_name(&self) -> bool {
        self.name.starts_with('I') && !self.name.contains('.')
    }

    /// # Panics
    /// Panics unless [`is_interface_name`](Self::is_interface_name) holds.
    pub fn interface_name(&self) -> &str {
        assert!(self.is_interface_name(), "'{}' is not an interface name", self.name);
        &self.name
    }

    /// `android.hardware.foo@1.0::IFoo.Type` → `android.hardware.foo@1.0`.
    pub fn package_and_version(&self) -> Self {
        Self {
            package: self.package.clone(),
            major: self.major,
            minor: self.minor,
            name: String::new(),
            is_identifier: false,
        }
    }

    pub fn package_components(&self) -> Vec<&str> {
        self.package.split('.').collect()
    }

    /// Component-wise prefix match on the package: `android.hardware@1.0::IFoo`
    /// is in `android` but not in `and`.
    pub fn in_package(&self, prefix: &str) -> bool {
        let components = self.package_components();
        let wanted: Vec<&str> = prefix.split('.').collect();
        wanted.len() <= components.len() && wanted.iter().zip(&components).all(|(a, b)| a == b)
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.package)?;
        if self.has_version() {
            write!(f, "@{}.{}", self.major, self.minor)?;
        }
        if !self.name.is_empty() {
            if !self.package.is_empty() || self.has_version() {
                f.write_str("::")?;
            }
            f.write_str(&self.name)?;
        }
        Ok(())
    }
}

impl FromStr for FqName {
    type Err = FqNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

canonical_string!(FqName);
