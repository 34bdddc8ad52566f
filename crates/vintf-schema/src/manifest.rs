use crate::fq_instance::{FqInstance, FqInstanceError};
use crate::hal::{InsertError, InvalidHal, ManifestHal};
use crate::legacy::convert_legacy_instance_into;
use crate::transport::{Arch, HalFormat, Transport, TransportArch};
use crate::version::{self, Version, VersionError, DEFAULT_AIDL_VERSION, FAKE_AIDL_MAJOR_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("failed to serialize manifest: {0}")]
    SerializeToml(#[from] toml::ser::Error),
    #[error("invalid version '{value}' in HAL '{hal}': {source}")]
    Version {
        hal: String,
        value: String,
        source: VersionError,
    },
    #[error("duplicated instance '{instance}' in interface '{interface}' of HAL '{hal}'")]
    DuplicateInstance {
        hal: String,
        interface: String,
        instance: String,
    },
    #[error("duplicated interface entry '{interface}' in HAL '{hal}'")]
    DuplicateInterface { hal: String, interface: String },
    #[error("invalid instances in HAL '{hal}':\n{diagnostics}")]
    LegacyInstances { hal: String, diagnostics: String },
    #[error("invalid fqname '{value}' in HAL '{hal}': {source}")]
    FqName {
        hal: String,
        value: String,
        source: FqInstanceError,
    },
    #[error("fqname '{value}' in HAL '{hal}' should not specify a package")]
    PackageInFqName { hal: String, value: String },
    #[error("fqname '{value}' in AIDL HAL '{hal}' should not specify a version")]
    AidlFqNameWithVersion { hal: String, value: String },
    #[error("cannot add instance to HAL '{hal}': {source}")]
    Insert { hal: String, source: InsertError },
    #[error(transparent)]
    Invalid(#[from] InvalidHal),
}

/// On-disk shape of a declaration document.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ManifestDocument {
    #[serde(default, rename = "hal", skip_serializing_if = "Vec::is_empty")]
    pub hals: Vec<HalSection>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct HalSection {
    #[serde(default)]
    pub format: HalFormat,
    pub name: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub transport: Transport,
    #[serde(default, skip_serializing_if = "is_default")]
    pub arch: Arch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, rename = "override", skip_serializing_if = "is_default")]
    pub is_override: bool,
    #[serde(default, skip_serializing_if = "is_default")]
    pub updatable_via_apex: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fqnames: Vec<String>,
    #[serde(default, rename = "interface", skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<InterfaceSection>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InterfaceSection {
    pub name: String,
    #[serde(default)]
    pub instances: Vec<String>,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// A set of validated declarations, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HalManifest {
    pub hals: Vec<ManifestHal>,
}

impl HalManifest {
    /// Stamp every declaration with the file it came from.
    #[must_use]
    pub fn with_file_name(mut self, file_name: &str) -> Self {
        for hal in &mut self.hals {
            hal.set_file_name(file_name);
        }
        self
    }

    pub fn hals_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ManifestHal> + 'a {
        self.hals.iter().filter(move |hal| hal.name() == name)
    }

    /// Names of overrides that remove their HAL, deduplicated and sorted.
    pub fn disabled_hals(&self) -> Vec<&str> {
        self.hals
            .iter()
            .filter(|hal| hal.is_disabled_hal())
            .map(ManifestHal::name)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every declared or enumerated version across all declarations.
    pub fn all_versions(&self) -> BTreeSet<Version> {
        let mut out = BTreeSet::new();
        for hal in &self.hals {
            hal.append_all_versions(&mut out);
        }
        out
    }

    pub fn to_document(&self) -> ManifestDocument {
        ManifestDocument {
            hals: self.hals.iter().map(hal_to_section).collect(),
        }
    }

    /// Render back to TOML. Instances are written as package-less `fqnames`.
    pub fn to_toml_string(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string_pretty(&self.to_document())?)
    }
}

pub fn parse_manifest_str(input: &str) -> Result<HalManifest, ManifestError> {
    let document: ManifestDocument = toml::from_str(input)?;
    build_manifest(document)
}

pub fn build_manifest(document: ManifestDocument) -> Result<HalManifest, ManifestError> {
    let hals = document
        .hals
        .into_iter()
        .map(build_hal)
        .collect::<Result<Vec<_>, _>>()?;
    debug!("parsed {} HAL declarations", hals.len());
    Ok(HalManifest { hals })
}

fn parse_versions(section: &HalSection) -> Result<Vec<Version>, ManifestError> {
    let invalid = |value: &str, source: VersionError| ManifestError::Version {
        hal: section.name.clone(),
        value: value.to_owned(),
        source,
    };
    match section.format {
        HalFormat::Aidl if section.versions.is_empty() => Ok(vec![Version::aidl(DEFAULT_AIDL_VERSION)]),
        HalFormat::Aidl => section
            .versions
            .iter()
            .map(|v| {
                version::parse_component(v)
                    .map(Version::aidl)
                    .map_err(|e| invalid(v.as_str(), e))
            })
            .collect(),
        HalFormat::Hidl | HalFormat::Native => section
            .versions
            .iter()
            .map(|v| v.parse::<Version>().map_err(|e| invalid(v.as_str(), e)))
            .collect(),
    }
}

/// AIDL references carry no version; store them under the placeholder major.
fn restamp_aidl(fq_instance: &FqInstance) -> Result<FqInstance, FqInstanceError> {
    FqInstance::from_version(
        FAKE_AIDL_MAJOR_VERSION,
        0,
        fq_instance.interface(),
        fq_instance.instance(),
    )
}

fn legacy_instances(section: &HalSection, versions: &[Version]) -> Result<Vec<FqInstance>, ManifestError> {
    let mut seen_interfaces = BTreeSet::new();
    for interface in &section.interfaces {
        if !seen_interfaces.insert(interface.name.as_str()) {
            return Err(ManifestError::DuplicateInterface {
                hal: section.name.clone(),
                interface: interface.name.clone(),
            });
        }
        let mut seen_instances = BTreeSet::new();
        for instance in &interface.instances {
            if !seen_instances.insert(instance.as_str()) {
                return Err(ManifestError::DuplicateInstance {
                    hal: section.name.clone(),
                    interface: interface.name.clone(),
                    instance: instance.clone(),
                });
            }
        }
    }

    // AIDL references are versionless, so one pass suffices.
    let passes: &[Version] = match section.format {
        HalFormat::Aidl => &versions[..versions.len().min(1)],
        HalFormat::Hidl | HalFormat::Native => versions,
    };

    let mut diagnostics = String::new();
    let mut out = Vec::new();
    for version in passes {
        for interface in &section.interfaces {
            for instance in &interface.instances {
                out.extend(convert_legacy_instance_into(
                    &section.name,
                    *version,
                    &interface.name,
                    instance,
                    section.format,
                    &mut diagnostics,
                ));
            }
        }
    }

    if diagnostics.is_empty() {
        Ok(out)
    } else {
        Err(ManifestError::LegacyInstances {
            hal: section.name.clone(),
            diagnostics,
        })
    }
}

fn fqname_instances(section: &HalSection) -> Result<Vec<FqInstance>, ManifestError> {
    section
        .fqnames
        .iter()
        .map(|value| {
            let parsed = FqInstance::parse(value).map_err(|source| ManifestError::FqName {
                hal: section.name.clone(),
                value: value.clone(),
                source,
            })?;
            if parsed.has_package() {
                return Err(ManifestError::PackageInFqName {
                    hal: section.name.clone(),
                    value: value.clone(),
                });
            }
            if section.format == HalFormat::Aidl && parsed.has_version() {
                return Err(ManifestError::AidlFqNameWithVersion {
                    hal: section.name.clone(),
                    value: value.clone(),
                });
            }
            Ok(parsed)
        })
        .collect()
}

fn build_hal(section: HalSection) -> Result<ManifestHal, ManifestError> {
    let versions = parse_versions(&section)?;
    let transport_arch = TransportArch {
        transport: section.transport,
        arch: section.arch,
        ip: section.ip.clone(),
        port: section.port,
    };

    let mut references = legacy_instances(&section, &versions)?;
    references.extend(fqname_instances(&section)?);

    if section.format == HalFormat::Aidl {
        references = references
            .iter()
            .map(|r| {
                restamp_aidl(r).map_err(|source| ManifestError::FqName {
                    hal: section.name.clone(),
                    value: r.to_string(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;
    }

    let mut hal = ManifestHal::new(section.format, section.name)
        .with_versions(versions)
        .with_transport_arch(transport_arch)
        .with_override(section.is_override)
        .with_updatable_via_apex(section.updatable_via_apex);

    hal.insert_instances(&references, false)
        .map_err(|source| ManifestError::Insert {
            hal: hal.name().to_owned(),
            source,
        })?;
    hal.validate()?;
    Ok(hal)
}

fn hal_to_section(hal: &ManifestHal) -> HalSection {
    let versions = hal
        .versions()
        .iter()
        .map(|v| match hal.format() {
            HalFormat::Aidl => v.minor().to_string(),
            HalFormat::Hidl | HalFormat::Native => v.to_string(),
        })
        .collect();

    let fqnames = hal
        .instances()
        .map(|e| match hal.format() {
            HalFormat::Aidl => format!("{}/{}", e.interface(), e.instance()),
            HalFormat::Hidl | HalFormat::Native => {
                format!("@{}::{}/{}", e.version(), e.interface(), e.instance())
            }
        })
        .collect();

    let transport_arch = hal.transport_arch().clone();
    HalSection {
        format: hal.format(),
        name: hal.name().to_owned(),
        transport: transport_arch.transport,
        arch: transport_arch.arch,
        ip: transport_arch.ip,
        port: transport_arch.port,
        is_override: hal.is_override(),
        updatable_via_apex: hal.updatable_via_apex(),
        versions,
        fqnames,
        interfaces: Vec::new(),
    }
}
