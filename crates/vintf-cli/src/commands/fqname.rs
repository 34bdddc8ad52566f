use super::{json_pretty, yes_no, EXIT_SUCCESS};
use serde::Serialize;
use vintf_schema::FqName;

#[derive(Debug, Serialize)]
struct FqNameView<'a> {
    canonical: String,
    package: &'a str,
    version: Option<String>,
    name: &'a str,
    is_interface: bool,
    is_identifier: bool,
}

pub fn run(input: &str, json: bool) -> Result<u8, String> {
    let fq_name = FqName::parse(input).map_err(|e| format!("parse error: {e}"))?;
    let view = FqNameView {
        canonical: fq_name.to_string(),
        package: fq_name.package(),
        version: fq_name.version().map(|v| v.to_string()),
        name: fq_name.name(),
        is_interface: fq_name.is_interface_name(),
        is_identifier: fq_name.is_identifier(),
    };
    if json {
        println!("{}", json_pretty(&view)?);
    } else {
        println!("fqname:      {}", view.canonical);
        println!("package:     {}", view.package);
        println!("version:     {}", view.version.as_deref().unwrap_or("(none)"));
        println!("name:        {}", view.name);
        println!("interface:   {}", yes_no(view.is_interface));
    }
    Ok(EXIT_SUCCESS)
}
