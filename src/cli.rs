use crate::cache::OpenApiService;
use crate::config::GeneratorConfig;
use crate::routes::RouteTable;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use crate::validation::{feature_counts, validate_openapi31};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

/// Generate an OpenAPI 3.1 document from a route table and the Rust sources of its handlers
#[derive(Parser, Debug)]
#[command(name = "openapi-from-routes")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Route manifest (YAML or JSON) listing method, path and handler of every route
    #[arg(short = 'r', long = "routes", value_name = "FILE")]
    pub routes_path: Option<PathBuf>,

    /// Generator configuration file (YAML or JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// API title, overrides the config file
    #[arg(long = "title")]
    pub title: Option<String>,

    /// API version, overrides the config file
    #[arg(long = "api-version")]
    pub api_version: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }

    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    for file in [&args.routes_path, &args.config_path].into_iter().flatten() {
        if !file.is_file() {
            anyhow::bail!("File does not exist: {}", file.display());
        }
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }

    Ok(args)
}

/// Configuration file values with command line overrides applied.
pub fn effective_config(args: &CliArgs) -> Result<GeneratorConfig> {
    let mut config = match &args.config_path {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };
    if let Some(title) = &args.title {
        config.title = title.clone();
    }
    if let Some(version) = &args.api_version {
        config.version = version.clone();
    }
    Ok(config)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting OpenAPI document generation...");

    // Step 1: Configuration
    let config = effective_config(&args)?;
    debug!("Effective configuration: {:?}", config);

    // Step 2: Route table
    let table = match &args.routes_path {
        Some(path) => RouteTable::load(path)
            .with_context(|| format!("Failed to load route manifest: {}", path.display()))?,
        None => {
            warn!("No route manifest given; the document will contain no paths");
            RouteTable::new()
        }
    };
    let route_count = table.len();

    // Step 3: Declaration index
    info!("Indexing type declarations...");
    let service = OpenApiService::new(args.project_path.clone(), table, config);
    let index = service.index();

    // Step 4: Build OpenAPI document
    info!("Building OpenAPI document...");
    let document = service.document(false);

    for issue in validate_openapi31(&document) {
        warn!("OpenAPI 3.1 compliance: {}", issue);
    }

    // Step 5: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    // Step 6: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)
            .with_context(|| format!("Failed to write to file: {}", output_path.display()))?;
    } else {
        println!("{}", content);
    }

    let counts = feature_counts(&document);

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Types indexed: {}", index.declaration_count());
    info!("  - Files skipped: {}", index.files_skipped());
    info!("  - Routes registered: {}", route_count);
    info!("  - Paths documented: {}", counts["paths"]);
    info!("  - Webhooks: {}", counts["webhooks"]);
    info!("  - Schemas: {}", counts["schemas"]);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_args() {
        let args = CliArgs::try_parse_from(["openapi-from-routes", "."]).unwrap();
        assert_eq!(args.project_path, PathBuf::from("."));
        assert!(matches!(args.output_format, OutputFormat::Yaml));
        assert!(args.routes_path.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_parse_full_args() {
        let args = CliArgs::try_parse_from([
            "openapi-from-routes",
            "./service",
            "-r",
            "routes.yaml",
            "-c",
            "openapi.yaml",
            "-f",
            "json",
            "-o",
            "out/openapi.json",
            "--title",
            "Billing",
            "--api-version",
            "2.0.0",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.routes_path, Some(PathBuf::from("routes.yaml")));
        assert_eq!(args.config_path, Some(PathBuf::from("openapi.yaml")));
        assert!(matches!(args.output_format, OutputFormat::Json));
        assert_eq!(args.output_path, Some(PathBuf::from("out/openapi.json")));
        assert_eq!(args.title.as_deref(), Some("Billing"));
        assert_eq!(args.api_version.as_deref(), Some("2.0.0"));
        assert!(args.verbose);
    }

    #[test]
    fn test_missing_project_path_rejected() {
        let args = CliArgs::try_parse_from(["openapi-from-routes", "/no/such/project"]).unwrap();
        let err = parse_args_from_parsed(args).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_missing_manifest_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path().to_str().unwrap();
        let args =
            CliArgs::try_parse_from(["openapi-from-routes", project, "-r", "/no/routes.yaml"]).unwrap();
        let err = parse_args_from_parsed(args).unwrap_err();
        assert!(err.to_string().contains("/no/routes.yaml"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("openapi.yaml");
        fs::write(&config_path, "title: From File\nversion: 0.9.0\n").unwrap();

        let args = CliArgs::try_parse_from([
            "openapi-from-routes",
            temp_dir.path().to_str().unwrap(),
            "-c",
            config_path.to_str().unwrap(),
            "--api-version",
            "1.2.3",
        ])
        .unwrap();

        let config = effective_config(&args).unwrap();
        assert_eq!(config.title, "From File");
        assert_eq!(config.version, "1.2.3");
    }

    #[test]
    fn test_run_writes_output() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("lib.rs"), "pub struct Health { pub ok: bool }").unwrap();
        let routes = temp_dir.path().join("routes.yaml");
        fs::write(
            &routes,
            "routes:\n  - method: GET\n    path: /health\n    annotation:\n      success: {status: 200, type: Health}\n",
        )
        .unwrap();
        let output = temp_dir.path().join("out").join("openapi.json");

        let args = CliArgs::try_parse_from([
            "openapi-from-routes",
            temp_dir.path().to_str().unwrap(),
            "-r",
            routes.to_str().unwrap(),
            "-f",
            "json",
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(args).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(
            written["paths"]["/health"]["get"]["responses"]["200"]["content"]["application/json"]
                ["schema"]["$ref"],
            "#/components/schemas/crate.Health"
        );
        assert!(written["components"]["schemas"]["crate.Health"].is_object());
    }
}
