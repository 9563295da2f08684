//! Tapedeck CLI

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use tapedeck::cassette::storage;
use tapedeck::serializer::SerializerRegistry;
use tapedeck::Config;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Tapedeck v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: tapedeck <command> <path>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  inspect   List the interactions stored in a cassette file");
        eprintln!("  check     Validate a TOML configuration file");
        process::exit(1);
    }

    let command = &args[1];
    let path = PathBuf::from(&args[2]);

    let result = match command.as_str() {
        "inspect" => inspect(&path),
        "check" => check(&path),
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'tapedeck' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let serializers = SerializerRegistry::new();
    let Some(serializer) = serializers.for_extension(extension) else {
        bail!("No serializer for extension '{extension}'");
    };

    let Some(content) = storage::read_cassette_file(path, None)
        .with_context(|| format!("Failed to read {}", path.display()))?
    else {
        println!("{}: empty", path.display());
        return Ok(());
    };

    let document = serializer.deserialize(&content)?;
    let interactions = storage::parse_document(&document, path)?;

    println!("Cassette: {}", path.display());
    if let Some(recorded_with) = document
        .get(storage::RECORDED_WITH_KEY)
        .and_then(|v| v.as_str())
    {
        println!("Recorded with: {recorded_with}");
    }
    println!("Interactions: {}", interactions.len());
    println!();

    for (i, interaction) in interactions.iter().enumerate() {
        let request = interaction.request();
        let response = interaction.response();
        println!(
            "{i:>4}  {} {} -> {} ({} bytes, {})",
            request.method(),
            request.uri(),
            response.status().code,
            response.body().len(),
            interaction.recorded_at().to_rfc3339()
        );
    }

    Ok(())
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(path)?;
    let defaults = config.cassette_defaults()?;

    println!("Configuration OK: {}", path.display());
    match &config.cassette_library_dir {
        Some(dir) => println!("  cassette_library_dir: {}", dir.display()),
        None => println!("  cassette_library_dir: (none; cassettes are not persisted)"),
    }
    println!(
        "  default record mode: {}",
        defaults.record.unwrap_or_default()
    );
    println!("  ignored hosts: {}", config.ignore_hosts.len());
    println!("  sensitive data filters: {}", config.filter_sensitive_data.len());

    Ok(())
}
