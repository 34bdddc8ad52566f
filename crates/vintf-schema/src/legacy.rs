//! Building instance references from pre-split declaration fields.

use crate::fq_instance::FqInstance;
use crate::fqname::FqName;
use crate::transport::HalFormat;
use crate::version::Version;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegacyInstanceError {
    /// One or more sub-fields failed their own grammar.
    #[error("Invalid instance: '{rendered}'. {}", .problems.join(" "))]
    Malformed { rendered: String, problems: Vec<String> },
    /// The sub-fields were fine but do not form a valid reference.
    #[error("Invalid FqInstance: {rendered}")]
    Rejected { rendered: String },
}

/// `package@1.0::IFoo/instance`, with `::IFoo` and `/instance` left out when empty.
pub fn to_fq_name_string(package: &str, version: Version, interface: &str, instance: &str) -> String {
    let mut out = format!("{package}@{version}");
    if !interface.is_empty() {
        out.push_str("::");
        out.push_str(interface);
    }
    if !instance.is_empty() {
        out.push('/');
        out.push_str(instance);
    }
    out
}

/// `package.IFoo/instance`, the AIDL spelling.
pub fn to_aidl_fqname_string(package: &str, interface: &str, instance: &str) -> String {
    let mut out = format!("{package}.{interface}");
    if !instance.is_empty() {
        out.push('/');
        out.push_str(instance);
    }
    out
}

fn render(package: &str, version: Version, interface: &str, instance: &str, format: HalFormat) -> String {
    match format {
        HalFormat::Aidl => format!(
            "{} (@{})",
            to_aidl_fqname_string(package, interface, instance),
            version.minor()
        ),
        HalFormat::Hidl | HalFormat::Native => to_fq_name_string(package, version, interface, instance),
    }
}

fn is_interface(interface: &str) -> bool {
    FqName::parse(interface).is_ok_and(|n| n.is_interface_name())
}

/// Build a package-less reference from separately declared fields.
///
/// `package` and `interface` are checked on their own first so the error can
/// point at the bad sub-field. AIDL references carry no version; HIDL and
/// native ones carry `version`. A native declaration may omit the interface.
pub fn convert_legacy_instance(
    package: &str,
    version: Version,
    interface: &str,
    instance: &str,
    format: HalFormat,
) -> Result<FqInstance, LegacyInstanceError> {
    let mut problems = Vec::new();

    if FqName::parse(package).is_err() {
        problems.push(format!(
            "Package '{package}' should have the format \
             [a-zA-Z_][a-zA-Z0-9_]*(\\.[a-zA-Z_][a-zA-Z0-9_]*)*"
        ));
    }

    let interface_required = match format {
        HalFormat::Hidl | HalFormat::Aidl => true,
        HalFormat::Native => !interface.is_empty(),
    };
    if interface_required && !is_interface(interface) {
        problems.push(format!(
            "Interface '{interface}' should have the format I[a-zA-Z0-9_]*"
        ));
    }

    if !problems.is_empty() {
        return Err(LegacyInstanceError::Malformed {
            rendered: render(package, version, interface, instance, format),
            problems,
        });
    }

    let built = match format {
        HalFormat::Hidl | HalFormat::Native => {
            FqInstance::from_version(version.major(), version.minor(), interface, instance)
        }
        HalFormat::Aidl => FqInstance::from_interface(interface, instance),
    };
    built.map_err(|_| LegacyInstanceError::Rejected {
        rendered: match format {
            HalFormat::Aidl => to_aidl_fqname_string(package, interface, instance),
            HalFormat::Hidl | HalFormat::Native => to_fq_name_string(package, version, interface, instance),
        },
    })
}

/// Like [`convert_legacy_instance`], but on failure appends the diagnostic
/// line to `diagnostics` and returns `None`, so a caller walking many
/// declarations can report every bad one together.
pub fn convert_legacy_instance_into(
    package: &str,
    version: Version,
    interface: &str,
    instance: &str,
    format: HalFormat,
    diagnostics: &mut String,
) -> Option<FqInstance> {
    match convert_legacy_instance(package, version, interface, instance, format) {
        Ok(fq_instance) => Some(fq_instance),
        Err(e) => {
            diagnostics.push_str(&e.to_string());
            diagnostics.push('\n');
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1_0: Version = Version::new(1, 0);

    #[test]
    fn hidl_reference_carries_version() {
        let i = convert_legacy_instance("android.hardware.foo", V1_0, "IFoo", "default", HalFormat::Hidl).unwrap();
        assert_eq!(i.to_string(), "@1.0::IFoo/default");
    }

    #[test]
    fn aidl_reference_omits_version() {
        let i = convert_legacy_instance(
            "android.hardware.foo",
            Version::aidl(2),
            "IFoo",
            "default",
            HalFormat::Aidl,
        )
        .unwrap();
        assert_eq!(i.to_string(), "IFoo/default");
        assert!(!i.has_version());
    }

    #[test]
    fn native_interface_is_optional() {
        let i = convert_legacy_instance("mapper", V1_0, "", "minigbm", HalFormat::Native).unwrap();
        assert_eq!(i.to_string(), "@1.0/minigbm");

        let err = convert_legacy_instance("mapper", V1_0, "Foo", "minigbm", HalFormat::Native).unwrap_err();
        assert!(err.to_string().contains("Interface 'Foo'"));
    }

    #[test]
    fn names_each_malformed_field() {
        let err = convert_legacy_instance("android..foo", V1_0, "Foo", "default", HalFormat::Hidl).unwrap_err();
        let LegacyInstanceError::Malformed { rendered, problems } = &err else {
            panic!("expected Malformed, got {err:?}");
        };
        assert_eq!(rendered, "android..foo@1.0::Foo/default");
        assert_eq!(problems.len(), 2);
        assert!(problems[0].starts_with("Package 'android..foo'"));
        assert!(problems[1].starts_with("Interface 'Foo'"));
        assert!(err.to_string().starts_with("Invalid instance: 'android..foo@1.0::Foo/default'. "));
    }

    #[test]
    fn aidl_diagnostic_uses_aidl_spelling() {
        let err = convert_legacy_instance("android.hardware.foo", Version::aidl(3), "foo", "default", HalFormat::Aidl)
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Invalid instance: 'android.hardware.foo.foo/default (@3)'. "));
    }

    #[test]
    fn rejected_when_fields_do_not_combine() {
        // Every field passes on its own, but an empty label is never a reference.
        let err = convert_legacy_instance("android.hardware.foo", Version::new(0, 0), "IFoo", "", HalFormat::Hidl)
            .unwrap_err();
        assert_eq!(
            err,
            LegacyInstanceError::Rejected {
                rendered: "android.hardware.foo@0.0::IFoo".to_owned()
            }
        );
    }

    #[test]
    fn accumulates_diagnostics() {
        let mut diagnostics = String::new();
        assert!(convert_legacy_instance_into("a", V1_0, "x", "i", HalFormat::Hidl, &mut diagnostics).is_none());
        assert!(convert_legacy_instance_into("b", V1_0, "IFoo", "i", HalFormat::Hidl, &mut diagnostics).is_some());
        assert!(convert_legacy_instance_into("c", V1_0, "y", "i", HalFormat::Hidl, &mut diagnostics).is_none());
        assert_eq!(diagnostics.lines().count(), 2);
        assert!(diagnostics.contains("'a@1.0::x/i'"));
        assert!(diagnostics.contains("'c@1.0::y/i'"));
    }

    #[test]
    fn diagnostic_strings() {
        assert_eq!(to_fq_name_string("a.b", V1_0, "IFoo", "default"), "a.b@1.0::IFoo/default");
        assert_eq!(to_fq_name_string("a.b", V1_0, "", ""), "a.b@1.0");
        assert_eq!(to_aidl_fqname_string("a.b", "IFoo", "default"), "a.b.IFoo/default");
    }
}
