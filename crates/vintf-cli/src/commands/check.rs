use super::{colorize_format, display_version, json_pretty, EXIT_SUCCESS};
use serde::Serialize;
use std::path::Path;
use tracing::debug;
use vintf_schema::{parse_manifest_str, HalFormat, ManifestHal, ManifestInstance};

#[derive(Debug, Serialize)]
struct HalView<'a> {
    format: HalFormat,
    name: &'a str,
    versions: Vec<String>,
    transport: String,
    arch: String,
    #[serde(rename = "override")]
    is_override: bool,
    updatable_via_apex: bool,
    disabled: bool,
    instances: Vec<String>,
}

fn view(hal: &ManifestHal, all_instances: bool) -> HalView<'_> {
    let instances = if all_instances {
        hal.all_instances().iter().map(ManifestInstance::description).collect()
    } else {
        hal.instances().map(|e| e.fq_instance().to_string()).collect()
    };
    HalView {
        format: hal.format(),
        name: hal.name(),
        versions: hal.versions().iter().map(|v| display_version(hal, *v)).collect(),
        transport: hal.transport_arch().transport.to_string(),
        arch: hal.transport_arch().arch.to_string(),
        is_override: hal.is_override(),
        updatable_via_apex: hal.updatable_via_apex(),
        disabled: hal.is_disabled_hal(),
        instances,
    }
}

pub fn run(path: &Path, all_instances: bool, json: bool) -> Result<u8, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read manifest {}: {e}", path.display()))?;
    let manifest = parse_manifest_str(&content)
        .map_err(|e| format!("manifest error: {e}"))?
        .with_file_name(&path.display().to_string());
    debug!("{}: {} HALs", path.display(), manifest.hals.len());

    let views: Vec<HalView<'_>> = manifest.hals.iter().map(|h| view(h, all_instances)).collect();
    if json {
        println!("{}", json_pretty(&views)?);
        return Ok(EXIT_SUCCESS);
    }

    for v in &views {
        let mut line = format!("{} {}", colorize_format(v.format), v.name);
        if !v.versions.is_empty() {
            line.push_str(&format!(" @ {}", v.versions.join(", ")));
        }
        if !v.transport.is_empty() {
            line.push_str(&format!(" ({})", v.transport));
        }
        if v.disabled {
            line.push_str(" [disabled]");
        }
        println!("{line}");
        for instance in &v.instances {
            println!("  {instance}");
        }
    }
    println!("{} HALs OK", views.len());
    Ok(EXIT_SUCCESS)
}
