//! Resource Dispatch CLI
//!
//! Inspect resource URIs and check payloads against JSON schemas the way the
//! schema interceptor does.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

use resource_dispatch::{to_json_text, validate_file, ModuleConfig, ResourceError, Uri};

const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Parser)]
#[command(name = "resource-dispatch")]
#[command(about = "Inspect resource URIs and validate payloads against JSON schemas")]
#[command(version)]
struct Cli {
    /// Log level written to stderr (trace, debug, info, warn, error); overrides
    /// the configured level, defaults to warn
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Module configuration (TOML); supplies the log level and the schema directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a resource URI and print its parts as JSON
    Uri {
        /// Resource URI, e.g. app://self/user?id=1
        uri: String,
    },

    /// Validate a JSON payload against a schema file
    Validate {
        /// Payload file to validate
        payload: PathBuf,

        /// Schema file; external $refs are resolved relative to it. A relative
        /// path is looked up in the configured schema_dir when --config is given
        #[arg(long)]
        schema: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(ModuleConfig::from_file).transpose() {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL));
            eprintln!("Error: {}", e);
            return ExitCode::from(exit_code(&e));
        }
    };
    let level = cli
        .log_level
        .as_deref()
        .or_else(|| config.as_ref().map(|c| c.logging.level.as_str()))
        .unwrap_or(DEFAULT_LOG_LEVEL);
    init_logging(level);

    let result = match cli.command {
        Commands::Uri { uri } => run_uri(&uri),
        Commands::Validate {
            payload,
            schema,
            json,
        } => {
            let schema = schema_path(&schema, config.as_ref());
            run_validate(&payload, &schema, json)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Relative schema paths live in the configured schema directory.
fn schema_path(schema: &Path, config: Option<&ModuleConfig>) -> PathBuf {
    match config.and_then(|c| c.json_schema.as_ref()) {
        Some(dirs) if schema.is_relative() => dirs.schema_dir.join(schema),
        _ => schema.to_path_buf(),
    }
}

fn exit_code(error: &ResourceError) -> u8 {
    error.exit_code() as u8
}

fn run_uri(raw: &str) -> Result<(), u8> {
    let uri = Uri::parse(raw).map_err(|e| {
        eprintln!("Error: {}", e);
        exit_code(&e)
    })?;

    let parts = serde_json::json!({
        "scheme": uri.scheme(),
        "host": uri.host(),
        "path": uri.path(),
        "query": uri.query(),
        "uri": uri.to_string(),
    });
    let text = to_json_text(&parts).map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    print!("{}", text);
    Ok(())
}

fn load_payload(path: &Path, json_output: bool) -> Result<Value, u8> {
    let content = fs::read_to_string(path).map_err(|e| {
        report_error(
            json_output,
            &format!("cannot read payload {}: {}", path.display(), e),
        );
        3u8
    })?;
    serde_json::from_str(&content).map_err(|e| {
        report_error(
            json_output,
            &format!("invalid JSON payload {}: {}", path.display(), e),
        );
        2u8
    })
}

fn run_validate(payload_path: &Path, schema_path: &Path, json_output: bool) -> Result<(), u8> {
    let payload = load_payload(payload_path, json_output)?;
    debug!(schema = %schema_path.display(), "validating payload");

    let errors = validate_file(schema_path, &payload).map_err(|e| {
        report_error(json_output, &format!("loading schema: {}", e));
        exit_code(&e)
    })?;

    if errors.is_empty() {
        if json_output {
            println!(r#"{{"valid":true}}"#);
        } else {
            println!("Valid");
        }
        return Ok(());
    }

    if json_output {
        let output = serde_json::json!({
            "valid": false,
            "errors": errors,
        });
        println!("{}", output);
    } else {
        eprintln!("Validation failed:");
        for error in &errors {
            eprintln!("  {}", error);
        }
    }
    Err(1)
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
