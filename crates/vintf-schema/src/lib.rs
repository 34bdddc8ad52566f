//! Interface identifiers and HAL declarations for the vendor interface object.
//!
//! This crate is the pure, in-memory core: the `package@M.m::Name` identifier
//! grammar (`FqName`), instance references (`FqInstance`), the legacy adapter
//! that builds references from pre-split fields, per-interface declarations
//! with their de-duplicating merge engine (`ManifestHal`), and the TOML
//! declaration document (`parse_manifest_str`).

pub mod fq_instance;
pub mod fqname;
pub mod hal;
pub mod legacy;
pub mod manifest;
pub mod transport;
mod types;
pub mod version;

pub use fq_instance::{FqInstance, FqInstanceError, INSTANCE_SEP};
pub use fqname::{FqName, FqNameError};
pub use hal::{InsertError, InvalidHal, ManifestHal, ManifestInstance};
pub use legacy::{
    convert_legacy_instance, convert_legacy_instance_into, to_aidl_fqname_string, to_fq_name_string,
    LegacyInstanceError,
};
pub use manifest::{
    build_manifest, parse_manifest_str, HalManifest, HalSection, InterfaceSection, ManifestDocument,
    ManifestError,
};
pub use transport::{Arch, HalFormat, Transport, TransportArch, TransportArchError, UnknownVariant};
pub use version::{Version, VersionError, DEFAULT_AIDL_VERSION, FAKE_AIDL_MAJOR_VERSION};
