mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_PARSE_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "vintf",
    version,
    about = "Inspect HAL identifiers, declaration documents and vendor VINTF directories"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse a fully-qualified name such as android.hardware.foo@1.0::IFoo.
    Fqname {
        /// Name to parse.
        input: String,
    },
    /// Parse an instance reference such as @1.0::IFoo/default.
    Instance {
        /// Reference to parse.
        input: String,
    },
    /// Validate a HAL declaration document and list what it declares.
    Check {
        /// Path to the declaration TOML file.
        manifest: PathBuf,
        /// Enumerate instances per declared version instead of as stored.
        #[arg(long, default_value_t = false)]
        all_instances: bool,
    },
    /// List VINTF directories contributed by vendor packages.
    ApexDirs {
        /// Host directory standing in for the device root.
        #[arg(long)]
        root: Option<PathBuf>,
        /// Map a device path prefix onto a host directory (PREFIX=DIR).
        #[arg(long = "map", value_parser = commands::apex_dirs::parse_mapping)]
        mappings: Vec<(String, PathBuf)>,
        /// Report whether the package index changed since this RFC 3339 time.
        #[arg(long)]
        since: Option<String>,
        /// Also list the fragment files inside each directory.
        #[arg(long)]
        files: bool,
    },
    /// Generate shell completions.
    Completions {
        /// Shell to generate for.
        shell: Shell,
    },
    /// Generate man pages.
    ManPages {
        /// Output directory.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("VINTF_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;
    let result = match cli.command {
        Commands::Fqname { input } => commands::fqname::run(&input, json_output),
        Commands::Instance { input } => commands::instance::run(&input, json_output),
        Commands::Check {
            manifest,
            all_instances,
        } => commands::check::run(&manifest, all_instances, json_output),
        Commands::ApexDirs {
            root,
            mappings,
            since,
            files,
        } => commands::apex_dirs::run(root, mappings, since.as_deref(), files, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("parse error:")
                || msg.starts_with("manifest error:")
                || msg.starts_with("failed to read manifest")
            {
                EXIT_PARSE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
