//! Per-interface declarations and the instance merge engine.

use crate::fq_instance::FqInstance;
use crate::legacy::to_aidl_fqname_string;
use crate::transport::{HalFormat, TransportArch};
use crate::version::Version;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

/// Why a single insertion was refused. Insertion stops at the first problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    #[error("should not add '{instance}' to a HAL with name '{hal}'")]
    PackageMismatch { instance: String, hal: String },
    #[error("should specify version: '{0}'")]
    MissingVersion(String),
    #[error("should specify interface: '{0}'")]
    MissingInterface(String),
    #[error("should specify instance: '{0}'")]
    MissingInstance(String),
    #[error("duplicated HAL version: {existing} vs {new}")]
    DuplicateHalVersion { existing: u64, new: u64 },
    #[error("duplicated major version: {existing} vs {new}")]
    DuplicateMajorVersion { existing: Version, new: Version },
    #[error(
        "cannot create FqInstance with package='{package}', version='{version}', \
         interface='{interface}', instance='{instance}'"
    )]
    Rebuild {
        package: String,
        version: Version,
        interface: String,
        instance: String,
    },
}

/// Every structural problem found in one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid HAL '{name}': {}", .errors.join("; "))]
pub struct InvalidHal {
    pub name: String,
    pub errors: Vec<String>,
}

/// One resolved instance of a declaration, tagged with the declaration's
/// transport, format and package-update flag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManifestInstance {
    fq_instance: FqInstance,
    transport_arch: TransportArch,
    format: HalFormat,
    updatable_via_apex: bool,
}

impl ManifestInstance {
    pub fn new(
        fq_instance: FqInstance,
        transport_arch: TransportArch,
        format: HalFormat,
        updatable_via_apex: bool,
    ) -> Self {
        Self {
            fq_instance,
            transport_arch,
            format,
            updatable_via_apex,
        }
    }

    pub fn fq_instance(&self) -> &FqInstance {
        &self.fq_instance
    }

    pub fn package(&self) -> &str {
        self.fq_instance.package()
    }

    pub fn version(&self) -> Version {
        Version::new(self.fq_instance.major_version(), self.fq_instance.minor_version())
    }

    pub fn interface(&self) -> &str {
        self.fq_instance.interface()
    }

    pub fn instance(&self) -> &str {
        self.fq_instance.instance()
    }

    pub fn transport_arch(&self) -> &TransportArch {
        &self.transport_arch
    }

    pub fn format(&self) -> HalFormat {
        self.format
    }

    pub fn updatable_via_apex(&self) -> bool {
        self.updatable_via_apex
    }

    /// A copy with `version` stamped on.
    ///
    /// # Panics
    /// Panics if the stamped fields no longer form a valid reference, which
    /// only happens for an absent `version` on a packaged instance.
    pub fn with_version(&self, version: Version) -> Self {
        let stamped = FqInstance::from_parts(
            self.package(),
            version.major(),
            version.minor(),
            self.interface(),
            self.instance(),
        );
        match stamped {
            Ok(fq_instance) => Self {
                fq_instance,
                transport_arch: self.transport_arch.clone(),
                format: self.format,
                updatable_via_apex: self.updatable_via_apex,
            },
            Err(e) => panic!("cannot stamp version {version} onto '{}': {e}", self.fq_instance),
        }
    }

    /// Human-readable form: `pkg.IFoo/inst (@2)` for AIDL, the reference otherwise.
    pub fn description(&self) -> String {
        match self.format {
            HalFormat::Aidl => format!(
                "{} (@{})",
                to_aidl_fqname_string(self.package(), self.interface(), self.instance()),
                self.version().minor()
            ),
            HalFormat::Hidl | HalFormat::Native => self.fq_instance.to_string(),
        }
    }
}

/// A named interface declaration: its top-level versions and the
/// de-duplicated set of instances it provides.
///
/// Single writer: [`insert_instance`](Self::insert_instance) needs `&mut self`,
/// readers share `&self`.
#[derive(Debug, Clone, Default)]
pub struct ManifestHal {
    format: HalFormat,
    name: String,
    versions: Vec<Version>,
    transport_arch: TransportArch,
    is_override: bool,
    updatable_via_apex: bool,
    file_name: String,
    instances: BTreeSet<ManifestInstance>,
}

impl ManifestHal {
    pub fn new(format: HalFormat, name: impl Into<String>) -> Self {
        Self {
            format,
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_versions(mut self, versions: impl IntoIterator<Item = Version>) -> Self {
        self.versions = versions.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_transport_arch(mut self, transport_arch: TransportArch) -> Self {
        self.transport_arch = transport_arch;
        self
    }

    #[must_use]
    pub fn with_override(mut self, is_override: bool) -> Self {
        self.is_override = is_override;
        self
    }

    #[must_use]
    pub fn with_updatable_via_apex(mut self, updatable: bool) -> Self {
        self.updatable_via_apex = updatable;
        self
    }

    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = file_name.into();
    }

    pub fn format(&self) -> HalFormat {
        self.format
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Top-level versions. AIDL versions carry the placeholder major.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn transport_arch(&self) -> &TransportArch {
        &self.transport_arch
    }

    pub fn is_override(&self) -> bool {
        self.is_override
    }

    pub fn updatable_via_apex(&self) -> bool {
        self.updatable_via_apex
    }

    /// Where the declaration came from. Not part of equality.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Stored instances, without AIDL version replay.
    pub fn instances(&self) -> impl Iterator<Item = &ManifestInstance> {
        self.instances.iter()
    }

    /// Check top-level versions and the transport descriptor, reporting every
    /// problem rather than the first.
    pub fn validate(&self) -> Result<(), InvalidHal> {
        let mut errors = Vec::new();

        let mut seen: BTreeMap<u64, Version> = BTreeMap::new();
        for version in &self.versions {
            if !version.is_present() {
                errors.push(format!("absent version {version} is not a valid HAL version"));
                continue;
            }
            match seen.entry(version.major()) {
                Entry::Vacant(slot) => {
                    slot.insert(*version);
                }
                Entry::Occupied(slot) => {
                    errors.push(format!("duplicated major version: {version} vs. {}", slot.get()));
                }
            }
        }

        if let Err(e) = self.transport_arch.validate() {
            errors.push(e.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(InvalidHal {
                name: self.name.clone(),
                errors,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Visit every instance until `visit` returns false; returns false iff it did.
    ///
    /// AIDL instances are replayed once per top-level version with that
    /// version stamped on, since AIDL attaches versions at enumeration time.
    /// Absent top-level versions are skipped; `validate` reports them.
    pub fn for_each_instance<F>(&self, mut visit: F) -> bool
    where
        F: FnMut(&ManifestInstance) -> bool,
    {
        for stored in &self.instances {
            match self.format {
                HalFormat::Aidl => {
                    for version in self.versions.iter().filter(|v| v.is_present()) {
                        if !visit(&stored.with_version(*version)) {
                            return false;
                        }
                    }
                }
                HalFormat::Hidl | HalFormat::Native => {
                    if !visit(stored) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Everything [`for_each_instance`](Self::for_each_instance) yields.
    pub fn all_instances(&self) -> Vec<ManifestInstance> {
        let mut out = Vec::new();
        self.for_each_instance(|e| {
            out.push(e.clone());
            true
        });
        out
    }

    pub fn has_instance(&self, interface: &str, instance: &str) -> bool {
        let mut found = false;
        self.for_each_instance(|e| {
            found = e.interface() == interface && e.instance() == instance;
            !found
        });
        found
    }

    /// An override that yields no instances removes the HAL.
    pub fn is_disabled_hal(&self) -> bool {
        if !self.is_override {
            return false;
        }
        let mut has_instance = false;
        self.for_each_instance(|_| {
            has_instance = true;
            false
        });
        !has_instance
    }

    /// Add the top-level versions and every enumerated instance version to `out`.
    pub fn append_all_versions(&self, out: &mut BTreeSet<Version>) {
        out.extend(self.versions.iter().copied().filter(|v| v.is_present()));
        self.for_each_instance(|e| {
            out.insert(e.version());
            true
        });
    }

    fn verify_instance(&self, candidate: &FqInstance) -> Result<(), InsertError> {
        if candidate.has_package() && candidate.package() != self.name {
            return Err(InsertError::PackageMismatch {
                instance: candidate.to_string(),
                hal: self.name.clone(),
            });
        }
        if !candidate.has_version() {
            return Err(InsertError::MissingVersion(candidate.to_string()));
        }
        if !candidate.has_interface() {
            return Err(InsertError::MissingInterface(candidate.to_string()));
        }
        if !candidate.has_instance() {
            return Err(InsertError::MissingInstance(candidate.to_string()));
        }
        Ok(())
    }

    /// Insert one instance under this declaration's name.
    ///
    /// An existing entry with the same major version, interface and instance
    /// is a conflict unless `allow_duplicate_major` is set, in which case all
    /// such entries collapse into one carrying the largest minor version. The
    /// set is left untouched on any error.
    pub fn insert_instance(&mut self, candidate: &FqInstance, allow_duplicate_major: bool) -> Result<(), InsertError> {
        self.verify_instance(candidate)?;

        let major = candidate.major_version();
        let same_slot = |e: &ManifestInstance| {
            e.version().major() == major
                && e.interface() == candidate.interface()
                && e.instance() == candidate.instance()
        };

        let mut minor = candidate.minor_version();
        let mut superseded = 0usize;
        for existing in self.instances.iter().filter(|e| same_slot(e)) {
            if !allow_duplicate_major {
                return Err(match self.format {
                    HalFormat::Aidl => InsertError::DuplicateHalVersion {
                        existing: existing.version().minor(),
                        new: candidate.minor_version(),
                    },
                    HalFormat::Hidl | HalFormat::Native => InsertError::DuplicateMajorVersion {
                        existing: existing.version(),
                        new: Version::new(major, candidate.minor_version()),
                    },
                });
            }
            minor = minor.max(existing.version().minor());
            superseded += 1;
        }

        let fq_instance =
            FqInstance::from_parts(&self.name, major, minor, candidate.interface(), candidate.instance())
                .map_err(|_| InsertError::Rebuild {
                    package: self.name.clone(),
                    version: Version::new(major, minor),
                    interface: candidate.interface().to_owned(),
                    instance: candidate.instance().to_owned(),
                })?;

        if superseded > 0 {
            self.instances.retain(|e| !same_slot(e));
            debug!("merged {superseded} existing entries into {fq_instance}");
        }
        debug!("{}: inserted {fq_instance}", self.name);
        self.instances.insert(ManifestInstance::new(
            fq_instance,
            self.transport_arch.clone(),
            self.format,
            self.updatable_via_apex,
        ));
        Ok(())
    }

    /// Insert in order, stopping at the first failure.
    pub fn insert_instances<'a, I>(&mut self, instances: I, allow_duplicate_major: bool) -> Result<(), InsertError>
    where
        I: IntoIterator<Item = &'a FqInstance>,
    {
        for instance in instances {
            self.insert_instance(instance, allow_duplicate_major)?;
        }
        Ok(())
    }
}

impl PartialEq for ManifestHal {
    fn eq(&self, other: &Self) -> bool {
        // file_name is provenance only.
        self.format == other.format
            && self.name == other.name
            && self.versions == other.versions
            && self.transport_arch == other.transport_arch
            && self.is_override == other.is_override
            && self.updatable_via_apex == other.updatable_via_apex
            && self.instances == other.instances
    }
}

impl Eq for ManifestHal {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Arch, Transport};
    use crate::version::FAKE_AIDL_MAJOR_VERSION;

    const FOO: &str = "android.hardware.foo";

    fn fq(s: &str) -> FqInstance {
        FqInstance::parse(s).unwrap_or_else(|e| panic!("'{s}': {e}"))
    }

    fn hidl_hal() -> ManifestHal {
        ManifestHal::new(HalFormat::Hidl, FOO)
            .with_versions([Version::new(1, 0)])
            .with_transport_arch(TransportArch::new(Transport::Hwbinder, Arch::Empty))
    }

    fn stored(hal: &ManifestHal) -> Vec<String> {
        hal.instances().map(|e| e.fq_instance().to_string()).collect()
    }

    #[test]
    fn rejects_duplicate_major_version() {
        let mut hal = hidl_hal();
        hal.insert_instance(&fq("android.hardware.foo@1.0::IFoo/default"), false)
            .unwrap();
        let err = hal
            .insert_instance(&fq("android.hardware.foo@1.0::IFoo/default"), false)
            .unwrap_err();
        assert_eq!(
            err,
            InsertError::DuplicateMajorVersion {
                existing: Version::new(1, 0),
                new: Version::new(1, 0)
            }
        );
        assert_eq!(err.to_string(), "duplicated major version: 1.0 vs 1.0");
        assert_eq!(hal.instances().count(), 1);
    }

    #[test]
    fn merges_duplicates_to_max_minor() {
        let mut hal = hidl_hal();
        hal.insert_instance(&fq("android.hardware.foo@1.0::IFoo/default"), true)
            .unwrap();
        hal.insert_instance(&fq("android.hardware.foo@1.3::IFoo/default"), true)
            .unwrap();
        assert_eq!(stored(&hal), ["android.hardware.foo@1.3::IFoo/default"]);

        // A lower minor does not win.
        hal.insert_instance(&fq("@1.1::IFoo/default"), true).unwrap();
        assert_eq!(stored(&hal), ["android.hardware.foo@1.3::IFoo/default"]);
    }

    #[test]
    fn distinct_slots_coexist() {
        let mut hal = hidl_hal();
        hal.insert_instances(
            &[
                fq("@1.0::IFoo/default"),
                fq("@2.0::IFoo/default"),
                fq("@1.0::IFoo/slot1"),
                fq("@1.0::IBar/default"),
            ],
            false,
        )
        .unwrap();
        assert_eq!(hal.instances().count(), 4);
        assert!(hal.has_instance("IBar", "default"));
        assert!(!hal.has_instance("IBar", "slot1"));
    }

    #[test]
    fn canonical_instance_uses_declaration_name() {
        let mut hal = hidl_hal();
        hal.insert_instance(&fq("@1.2::IFoo/default"), false).unwrap();
        let e = hal.instances().next().unwrap();
        assert_eq!(e.package(), FOO);
        assert_eq!(e.version(), Version::new(1, 2));
        assert_eq!(e.format(), HalFormat::Hidl);
        assert_eq!(e.transport_arch().transport, Transport::Hwbinder);
    }

    #[test]
    fn verify_reports_specific_field() {
        let mut hal = hidl_hal();
        assert_eq!(
            hal.insert_instance(&fq("android.hardware.bar@1.0::IFoo/default"), false),
            Err(InsertError::PackageMismatch {
                instance: "android.hardware.bar@1.0::IFoo/default".to_owned(),
                hal: FOO.to_owned()
            })
        );
        assert_eq!(
            hal.insert_instance(&fq("IFoo/default"), false),
            Err(InsertError::MissingVersion("IFoo/default".to_owned()))
        );
        assert_eq!(
            hal.insert_instance(&fq("@1.0/default"), false),
            Err(InsertError::MissingInterface("@1.0/default".to_owned()))
        );
        assert!(matches!(
            hal.insert_instance(&FqInstance::default(), false),
            Err(InsertError::MissingVersion(_))
        ));
        assert_eq!(hal.instances().count(), 0);
    }

    #[test]
    fn failed_rebuild_leaves_set_untouched() {
        let mut hal = ManifestHal::new(HalFormat::Hidl, "not a package");
        let err = hal
            .insert_instance(&fq("@1.0::IFoo/default"), true)
            .unwrap_err();
        assert!(matches!(err, InsertError::Rebuild { .. }));
        assert!(err.to_string().contains("package='not a package'"));
        assert_eq!(hal.instances().count(), 0);
    }

    #[test]
    fn insert_instances_stops_at_first_failure() {
        let mut hal = hidl_hal();
        let err = hal
            .insert_instances(
                &[
                    fq("@1.0::IFoo/a"),
                    fq("@1.0::IFoo/a"),
                    fq("@1.0::IFoo/b"),
                ],
                false,
            )
            .unwrap_err();
        assert!(matches!(err, InsertError::DuplicateMajorVersion { .. }));
        assert_eq!(stored(&hal), ["android.hardware.foo@1.0::IFoo/a"]);
    }

    #[test]
    fn aidl_duplicate_compares_minor_only() {
        let mut hal = ManifestHal::new(HalFormat::Aidl, FOO).with_versions([Version::aidl(1)]);
        let e = FqInstance::from_version(FAKE_AIDL_MAJOR_VERSION, 0, "IFoo", "default").unwrap();
        hal.insert_instance(&e, false).unwrap();
        let err = hal.insert_instance(&e, false).unwrap_err();
        assert_eq!(err.to_string(), "duplicated HAL version: 0 vs 0");
    }

    #[test]
    fn aidl_instances_replay_per_version() {
        let mut hal = ManifestHal::new(HalFormat::Aidl, FOO).with_versions([Version::new(1, 0), Version::new(2, 0)]);
        hal.insert_instance(&fq("@1.0::IFoo/default"), false).unwrap();

        let mut seen = Vec::new();
        assert!(hal.for_each_instance(|e| {
            seen.push(e.version());
            true
        }));
        assert_eq!(seen, [Version::new(1, 0), Version::new(2, 0)]);
    }

    #[test]
    fn hidl_instances_visit_once_and_stop_early() {
        let mut hal = hidl_hal();
        hal.insert_instances(&[fq("@1.0::IFoo/a"), fq("@1.0::IFoo/b")], false)
            .unwrap();

        let mut visits = 0;
        assert!(hal.for_each_instance(|_| {
            visits += 1;
            true
        }));
        assert_eq!(visits, 2);

        let mut visits = 0;
        assert!(!hal.for_each_instance(|_| {
            visits += 1;
            false
        }));
        assert_eq!(visits, 1);
    }

    #[test]
    fn disabled_hal_is_empty_override() {
        let mut hal = hidl_hal().with_override(true);
        assert!(hal.is_disabled_hal());
        hal.insert_instance(&fq("@1.0::IFoo/default"), false).unwrap();
        assert!(!hal.is_disabled_hal());
        assert!(!hidl_hal().is_disabled_hal());
    }

    #[test]
    fn validate_collects_every_problem() {
        let hal = ManifestHal::new(HalFormat::Hidl, FOO)
            .with_versions([
                Version::new(1, 0),
                Version::new(1, 1),
                Version::new(2, 0),
                Version::new(2, 5),
            ])
            .with_transport_arch(TransportArch::new(Transport::Passthrough, Arch::Empty));
        let err = hal.validate().unwrap_err();
        assert_eq!(
            err.errors,
            [
                "duplicated major version: 1.1 vs. 1.0",
                "duplicated major version: 2.5 vs. 2.0",
                "passthrough HALs require an arch attribute",
            ]
        );
        assert!(!hal.is_valid());
        assert!(hidl_hal().is_valid());
    }

    #[test]
    fn absent_aidl_version_is_invalid_and_skipped() {
        let mut hal = ManifestHal::new(HalFormat::Aidl, FOO)
            .with_versions([Version::default(), Version::aidl(3)])
            .with_override(true);
        hal.insert_instance(&fq("@1.0::IFoo/default"), false).unwrap();

        let err = hal.validate().unwrap_err();
        assert_eq!(err.errors, ["absent version 0.0 is not a valid HAL version"]);
        assert!(!hal.is_valid());

        let all = hal.all_instances();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].version(), Version::aidl(3));
        assert!(hal.has_instance("IFoo", "default"));
        assert!(!hal.is_disabled_hal());

        let mut out = BTreeSet::new();
        hal.append_all_versions(&mut out);
        assert_eq!(out.into_iter().collect::<Vec<_>>(), [Version::aidl(3)]);
    }

    #[test]
    fn only_absent_versions_enumerate_nothing() {
        let mut hal = ManifestHal::new(HalFormat::Aidl, FOO).with_versions([Version::default()]);
        hal.insert_instance(&fq("@1.0::IFoo/default"), false).unwrap();
        assert!(!hal.is_valid());
        assert!(hal.all_instances().is_empty());
    }

    #[test]
    fn accessors_expose_declaration_fields() {
        let hal = hidl_hal();
        assert_eq!(hal.format(), HalFormat::Hidl);
        assert_eq!(hal.name(), FOO);
        assert_eq!(hal.versions(), [Version::new(1, 0)]);
        assert_eq!(hal.transport_arch().transport, Transport::Hwbinder);
    }

    #[test]
    fn append_all_versions_unions_instances() {
        let mut hal = hidl_hal();
        hal.insert_instances(&[fq("@2.1::IFoo/default"), fq("@1.0::IFoo/default")], false)
            .unwrap();
        let mut out = BTreeSet::new();
        hal.append_all_versions(&mut out);
        assert_eq!(
            out.into_iter().collect::<Vec<_>>(),
            [Version::new(1, 0), Version::new(2, 1)]
        );
    }

    #[test]
    fn equality_ignores_file_name() {
        let a = hidl_hal().with_file_name("/vendor/etc/vintf/manifest.toml");
        let b = hidl_hal().with_file_name("/odm/etc/vintf/manifest.toml");
        assert_eq!(a, b);
        assert_ne!(a, hidl_hal().with_override(true));
    }

    #[test]
    fn aidl_description_shows_version() {
        let mut hal = ManifestHal::new(HalFormat::Aidl, FOO).with_versions([Version::aidl(2)]);
        let e = FqInstance::from_version(FAKE_AIDL_MAJOR_VERSION, 0, "IFoo", "default").unwrap();
        hal.insert_instance(&e, false).unwrap();
        let all = hal.all_instances();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description(), "android.hardware.foo.IFoo/default (@2)");
    }
}
