use crate::comments::{CommentStore, CommentStrategy};
use crate::config::{GeneratorConfig, ReaderKind};
use crate::descriptor::Manifest;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;

/// Generate Swagger 2.0 documentation from service class descriptors and their source comments
#[derive(Parser, Debug)]
#[command(name = "service-apidoc")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Manifest describing service classes and data types (YAML or JSON)
    #[arg(value_name = "MANIFEST")]
    pub manifest_path: PathBuf,

    /// Generator configuration file (YAML or JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Source root scanned for doc comments; may be repeated
    #[arg(short = 's', long = "source-root", value_name = "DIR")]
    pub source_roots: Vec<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// API title, overrides the configuration
    #[arg(long = "title")]
    pub title: Option<String>,

    /// API version, overrides the configuration
    #[arg(long = "api-version")]
    pub api_version: Option<String>,

    /// Reader used to turn classes into operations
    #[arg(long = "reader", value_enum)]
    pub reader: Option<ReaderArg>,

    /// How doc comments are read from source files
    #[arg(long = "comment-strategy", value_enum)]
    pub comment_strategy: Option<StrategyArg>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ReaderArg {
    /// Routing markers drive paths and verbs
    Rest,
    /// Provider methods become POST operations
    Rpc,
}

impl From<ReaderArg> for ReaderKind {
    fn from(arg: ReaderArg) -> Self {
        match arg {
            ReaderArg::Rest => ReaderKind::Rest,
            ReaderArg::Rpc => ReaderKind::Rpc,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StrategyArg {
    /// Syntax-tree based extraction
    Syntax,
    /// Pattern based extraction
    Regex,
}

impl From<StrategyArg> for CommentStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Syntax => CommentStrategy::Syntax,
            StrategyArg::Regex => CommentStrategy::Regex,
        }
    }
}

/// Validate and log already-parsed arguments
///
/// # Arguments
///
/// * `args` - Arguments produced by `CliArgs::parse`
///
/// # Returns
///
/// Returns the arguments unchanged once the referenced files exist.
///
/// # Errors
///
/// Returns an error if the manifest or the configuration file is missing.
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.manifest_path.is_file() {
        anyhow::bail!("Manifest does not exist: {}", args.manifest_path.display());
    }
    if let Some(ref config) = args.config_path {
        if !config.is_file() {
            anyhow::bail!("Configuration file does not exist: {}", config.display());
        }
    }

    info!("Manifest: {}", args.manifest_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }

    Ok(args)
}

/// Loads the configuration file, if any, and applies command-line overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the merged configuration
/// fails validation.
pub fn load_config(args: &CliArgs) -> Result<GeneratorConfig> {
    let mut config = match &args.config_path {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };

    if let Some(ref title) = args.title {
        config.info.title = title.clone();
    }
    if let Some(ref version) = args.api_version {
        config.info.version = version.clone();
    }
    if let Some(reader) = args.reader {
        config.reader = reader.into();
    }
    if let Some(strategy) = args.comment_strategy {
        config.comment_strategy = strategy.into();
    }
    config.source_roots.extend(args.source_roots.iter().cloned());

    config.validate()?;
    Ok(config)
}

/// Run the main workflow
///
/// # Arguments
///
/// * `args` - Validated command line arguments
///
/// # Errors
///
/// Returns an error if no class matches the selector or a file cannot be
/// read or written.
pub fn run(args: CliArgs) -> Result<()> {
    use crate::collector::generate;
    use crate::serializer::{serialize_json, serialize_yaml, write_to_file};

    info!("Starting API document generation...");

    // Step 1: Merge configuration file and flags
    let config = load_config(&args)?;
    debug!("Reader: {:?}, comment strategy: {:?}", config.reader, config.comment_strategy);

    // Step 2: Load the class manifest
    let manifest = Manifest::load(&args.manifest_path)
        .with_context(|| format!("Failed to load manifest {}", args.manifest_path.display()))?;
    info!(
        "Loaded {} classes and {} types",
        manifest.classes.len(),
        manifest.types.len()
    );

    // Step 3: Collect doc comments from the source roots
    info!("Collecting doc comments from {} source roots...", config.source_roots.len());
    let comments = CommentStore::build(
        &config.source_roots,
        &config.source_extensions,
        config.comment_strategy,
    );

    // Step 4: Build the document
    info!("Building API document...");
    let document = generate(&manifest, &comments, &config)?;

    // Step 5: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    // Step 6: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
    } else {
        println!("{}", content);
    }

    // Step 7: Display summary
    let operations: usize = document
        .paths
        .values()
        .map(|item| {
            [&item.get, &item.post, &item.put, &item.delete, &item.patch, &item.options, &item.head]
                .iter()
                .filter(|op| op.is_some())
                .count()
        })
        .sum();
    info!("Generation complete!");
    info!("Summary:");
    info!("  - Paths: {}", document.paths.len());
    info!("  - Operations: {}", operations);
    info!("  - Definitions: {}", document.definitions.len());
    info!("  - Documented types: {}", comments.len());

    Ok(())
}
