use super::{json_pretty, EXIT_SUCCESS};
use serde::Serialize;
use vintf_schema::FqInstance;

#[derive(Debug, Serialize)]
struct InstanceView<'a> {
    canonical: String,
    package: &'a str,
    version: Option<String>,
    interface: &'a str,
    instance: &'a str,
}

pub fn run(input: &str, json: bool) -> Result<u8, String> {
    let fq_instance = FqInstance::parse(input).map_err(|e| format!("parse error: {e}"))?;
    let view = InstanceView {
        canonical: fq_instance.to_string(),
        package: fq_instance.package(),
        version: fq_instance.version().map(|v| v.to_string()),
        interface: fq_instance.interface(),
        instance: fq_instance.instance(),
    };
    if json {
        println!("{}", json_pretty(&view)?);
    } else {
        let or_none = |s: &str| if s.is_empty() { "(none)".to_owned() } else { s.to_owned() };
        println!("instance:    {}", view.canonical);
        println!("package:     {}", or_none(view.package));
        println!("version:     {}", view.version.as_deref().unwrap_or("(none)"));
        println!("interface:   {}", or_none(view.interface));
        println!("label:       {}", view.instance);
    }
    Ok(EXIT_SUCCESS)
}
