use crate::fqname::{FqName, FqNameError};
use crate::types::canonical_string;
use crate::version::Version;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separates the identifier from the instance label.
pub const INSTANCE_SEP: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FqInstanceError {
    #[error(transparent)]
    Name(#[from] FqNameError),
    #[error(
        "'{0}' is not an instance reference; expected package@M.m[::IFoo]/instance, \
         @M.m[::IFoo]/instance or IFoo/instance"
    )]
    InvalidShape(String),
}

/// An [`FqName`] plus an instance label, e.g. `android.hardware.foo@1.0::IFoo/default`.
///
/// Accepted shapes:
///
/// ```text
/// android.hardware.foo@1.0::IFoo/default
/// android.hardware.foo@1.0/default
/// @1.0::IFoo/default
/// @1.0/default
/// IFoo/default
/// ```
#[derive(Debug, Clone, Default)]
pub struct FqInstance {
    fq_name: FqName,
    instance: String,
}

impl FqInstance {
    /// Split at the first `/`; the left side is an [`FqName`], the rest the
    /// instance label.
    pub fn parse(s: &str) -> Result<Self, FqInstanceError> {
        let (name, instance) = s.split_once(INSTANCE_SEP).unwrap_or((s, ""));
        Self::checked(FqName::parse(name)?, instance)
    }

    /// `android.hardware.foo@1.0::IFoo/default`
    pub fn from_parts(
        package: &str,
        major: u64,
        minor: u64,
        interface: &str,
        instance: &str,
    ) -> Result<Self, FqInstanceError> {
        Self::checked(FqName::from_parts(package, major, minor, interface)?, instance)
    }

    /// `@1.0::IFoo/default`
    pub fn from_version(major: u64, minor: u64, interface: &str, instance: &str) -> Result<Self, FqInstanceError> {
        Self::from_parts("", major, minor, interface, instance)
    }

    /// `IFoo/default`
    pub fn from_interface(interface: &str, instance: &str) -> Result<Self, FqInstanceError> {
        Self::from_version(0, 0, interface, instance)
    }

    /// Parse in place. On failure both the identifier and label are cleared.
    pub fn set_to(&mut self, s: &str) -> Result<(), FqInstanceError> {
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

    fn checked(fq_name: FqName, instance: &str) -> Result<Self, FqInstanceError> {
        let candidate = Self {
            fq_name,
            instance: instance.to_owned(),
        };
        if candidate.has_valid_shape() {
            Ok(candidate)
        } else {
            Err(FqInstanceError::InvalidShape(candidate.to_string()))
        }
    }

    fn has_valid_shape(&self) -> bool {
        let package = self.has_package();
        let version = self.has_version();
        let interface = self.has_interface();
        let instance = self.has_instance();

        // package@1.0[::IFoo]/instance
        (package && version && instance)
            // @1.0[::IFoo]/instance
            || (!package && version && instance)
            // IFoo/instance
            || (!package && !version && interface && instance)
    }

    pub fn package(&self) -> &str {
        self.fq_name.package()
    }

    pub fn has_package(&self) -> bool {
        !self.package().is_empty()
    }

    pub fn has_version(&self) -> bool {
        self.fq_name.has_version()
    }

    pub fn version(&self) -> Option<Version> {
        self.fq_name.version()
    }

    /// 0 without a version.
    pub fn major_version(&self) -> u64 {
        self.version().map_or(0, Version::major)
    }

    /// 0 without a version.
    pub fn minor_version(&self) -> u64 {
        self.version().map_or(0, Version::minor)
    }

    pub fn has_interface(&self) -> bool {
        self.fq_name.is_interface_name()
    }

    /// The interface name, or empty if the name is not interface-shaped.
    pub fn interface(&self) -> &str {
        if self.has_interface() {
            self.fq_name.interface_name()
        } else {
            ""
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn has_instance(&self) -> bool {
        !self.instance.is_empty()
    }

    pub fn fq_name(&self) -> &FqName {
        &self.fq_name
    }

    pub fn fq_name_string(&self) -> String {
        self.fq_name.to_string()
    }

    pub fn in_package(&self, prefix: &str) -> bool {
        self.fq_name.in_package(prefix)
    }
}

impl fmt::Display for FqInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fq_name)?;
        if self.has_instance() {
            write!(f, "{INSTANCE_SEP}{}", self.instance)?;
        }
        Ok(())
    }
}

impl FromStr for FqInstance {
    type Err = FqInstanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

canonical_string!(FqInstance);
