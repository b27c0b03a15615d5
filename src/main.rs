use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use simple_attach::entity::{FileEntity, Record};
use simple_attach::imaging::{RustBackend, VariantEngine};
use simple_attach::store::{FileOperation, FileStore};
use simple_attach::{config, output, template};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Record properties given on the command line.
#[derive(clap::Args, Clone)]
struct RecordArgs {
    /// Text property, as name=value (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_pair)]
    values: Vec<(String, String)>,

    /// Date property, as name=YYYY-MM-DD or name=YYYY-MM-DDTHH:MM:SS (repeatable)
    #[arg(long = "date", value_name = "NAME=DATE", value_parser = parse_date_pair)]
    dates: Vec<(String, NaiveDateTime)>,
}

impl RecordArgs {
    fn record(&self) -> Record {
        let mut record = Record::new();
        for (name, value) in &self.values {
            record.set(name, value.as_str());
        }
        for (name, date) in &self.dates {
            record.set(name, *date);
        }
        record
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))
}

fn parse_date_pair(raw: &str) -> Result<(String, NaiveDateTime), String> {
    let (name, value) = parse_pair(raw)?;
    let date = NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("invalid date {value:?}"))?;
    Ok((name, date))
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "simple-attach")]
#[command(about = "Store files attached to records, with resized image variants")]
#[command(long_about = "\
Store files attached to records, with resized image variants

Each managed property has a destination template and, for images, a list of
formats to render:

  [properties.photo]
  path = \"users/{id}/{slug::name}-{-imgformat-}.{-ext-}\"
  formats = [\"original\", \"thumbnail\", \"medium\"]

Template tokens:
  {-ext-}  {-origin-}  {-custom-}  {-imgformat-}
  {slug::prop}  {date::Y/m/d::prop}  {prop}

Run 'simple-attach gen-config' to generate a documented store.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Store configuration file
    #[arg(long, default_value = "store.toml", global = true)]
    config: PathBuf,

    /// Log every step (same as RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a path template against record properties
    Expand {
        template: String,
        /// Name of the incoming file, for {-ext-} and {-origin-}
        #[arg(long)]
        source: Option<String>,
        /// Value for {-custom-}
        #[arg(long)]
        custom: Option<String>,
        /// Substitute {-imgformat-} with this format
        #[arg(long)]
        format: Option<String>,
        #[command(flatten)]
        record: RecordArgs,
    },
    /// Render one format of an image
    Transform {
        source: PathBuf,
        dest: PathBuf,
        #[arg(long)]
        format: String,
        /// Apply this property's format overrides
        #[arg(long)]
        property: Option<String>,
    },
    /// Store a file for a property, rendering its formats
    Replace {
        source: PathBuf,
        #[arg(long)]
        property: String,
        /// Destination relative to the root, instead of the template
        #[arg(long)]
        dest: Option<String>,
        /// Only render these formats
        #[arg(long, value_delimiter = ',')]
        formats: Option<Vec<String>>,
        /// Move the source instead of copying it
        #[arg(long)]
        rename: bool,
        #[command(flatten)]
        record: RecordArgs,
    },
    /// Show the resolved settings of every format
    Formats {
        /// Formats of this property, with its overrides
        #[arg(long)]
        property: Option<String>,
    },
    /// Print a stock store.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Expand {
            template,
            source,
            custom,
            format,
            record,
        } => {
            let mut record = record.record();
            if let Some(custom) = &custom {
                record = record.with_custom_path("cli", custom);
            }
            let mut path = template::expand(&template, &record, "cli", source.as_deref())?;
            if let Some(format) = format {
                let store_config = config::load_config(&cli.config)?;
                path = template::apply_format(&path, &format, &store_config.catalog())?;
            }
            println!("{}", path);
        }
        Command::Transform {
            source,
            dest,
            format,
            property,
        } => {
            let store_config = config::load_config(&cli.config)?;
            let overrides = match &property {
                Some(name) => Some(
                    &store_config
                        .property(name)
                        .ok_or_else(|| format!("unknown property {name:?}"))?
                        .overrides,
                ),
                None => None,
            };
            let engine = VariantEngine::new(RustBackend::new(), store_config.catalog());
            engine.transform(&source, &dest, &format, overrides)?;
            println!("{}: {} → {}", format, source.display(), dest.display());
        }
        Command::Replace {
            source,
            property,
            dest,
            formats,
            rename,
            record,
        } => {
            let store_config = config::load_config(&cli.config)?;
            let store = FileStore::new(store_config, RustBackend::new());
            let mut record = record.record();
            let operation = if rename {
                FileOperation::Rename
            } else {
                FileOperation::Copy
            };

            let Some(info) = store.replace_file(
                &mut record,
                &property,
                &source,
                dest.as_deref(),
                operation,
                formats.as_deref(),
            )?
            else {
                return Err(format!("{} is not a file", source.display()).into());
            };

            let filename = record.filename(&property).unwrap_or_default();
            let property_config = store
                .config()
                .property(&property)
                .ok_or_else(|| format!("unknown property {property:?}"))?;
            let mut files = Vec::new();
            if property_config.is_image() {
                let rendered = formats
                    .as_deref()
                    .unwrap_or(property_config.formats.as_slice());
                for format in rendered {
                    let path = store.web_path(&record, &property, Some(format))?;
                    files.push((format.clone(), path.unwrap_or_default()));
                }
            } else {
                let path = store.web_path(&record, &property, None)?;
                files.push(("file".to_string(), path.unwrap_or_default()));
            }

            output::print_stored(&property, &filename, &info, &files);
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Formats { property } => {
            let store_config = config::load_config(&cli.config)?;
            let catalog = store_config.catalog();
            match &property {
                Some(name) => {
                    let property_config = store_config
                        .property(name)
                        .ok_or_else(|| format!("unknown property {name:?}"))?;
                    output::print_formats_table(
                        &catalog,
                        &property_config.formats,
                        Some(&property_config.overrides),
                    )?;
                }
                None => output::print_formats_table(&catalog, &catalog.names(), None)?,
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
