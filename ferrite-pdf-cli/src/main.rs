use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ferrite_pdf::writer::ObjectSerializer;
use ferrite_pdf::{
    ContentObject, Object, Operation, ParseOptions, PdfFile, SerializationMode, Session,
    WriterConfig, XRefMode, XRefUsage,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "ferritepdf",
    about = "Inspect and rewrite PDF object graphs",
    version,
    author
)]
struct Cli {
    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Tolerate malformed input instead of failing
    #[arg(long, global = true)]
    lenient: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, object counts and trailer keys
    Info {
        /// Input PDF file
        input: PathBuf,
    },

    /// Print one indirect object in PDF syntax
    Object {
        /// Input PDF file
        input: PathBuf,

        /// Object number
        number: u32,
    },

    /// Write a full copy of a PDF
    Rewrite {
        /// Input PDF file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Cross-reference format of the output
        #[arg(long, value_enum, default_value = "stream")]
        xref: XrefFormat,

        /// Decimal places for real numbers
        #[arg(long, default_value_t = 5)]
        precision: usize,
    },

    /// Print the structure of a content stream or a page's contents
    Content {
        /// Input PDF file
        input: PathBuf,

        /// Object number of a page or content stream
        number: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum XrefFormat {
    Table,
    Stream,
}

impl From<XrefFormat> for XRefMode {
    fn from(format: XrefFormat) -> Self {
        match format {
            XrefFormat::Table => XRefMode::Table,
            XrefFormat::Stream => XRefMode::Stream,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = if cli.lenient {
        ParseOptions::lenient()
    } else {
        ParseOptions::strict()
    };
    let mut session = Session::new();

    match cli.command {
        Commands::Info { input } => {
            let file = open(&mut session, &input, options)?;
            print_info(&file, &input);
        }

        Commands::Object { input, number } => {
            let mut file = open(&mut session, &input, options)?;
            let object = file
                .objects_mut()
                .resolve(number)?
                .with_context(|| format!("Object {number} does not exist"))?;
            if !object.is_in_use() {
                bail!("Object {number} is free");
            }
            let body = ObjectSerializer::default().to_bytes(object.data());
            println!("{} {} obj", object.number(), object.generation());
            println!("{}", String::from_utf8_lossy(&body));
            println!("endobj");
        }

        Commands::Rewrite {
            input,
            output,
            xref,
            precision,
        } => {
            let mut file = open(&mut session, &input, options)?;
            *file.config_mut() = WriterConfig {
                real_precision: precision,
                xref_mode: xref.into(),
                ..WriterConfig::default()
            };
            file.save_as(&output, SerializationMode::Standard)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {}", output.display());
        }

        Commands::Content { input, number } => {
            let mut file = open(&mut session, &input, options)?;
            let object = file
                .objects_mut()
                .resolve(number)?
                .filter(|object| object.is_in_use())
                .map(|object| object.data().clone())
                .with_context(|| format!("Object {number} does not exist"))?;
            let contents = match object {
                Object::Dictionary(page) => page
                    .get("Contents")
                    .cloned()
                    .with_context(|| format!("Object {number} has no /Contents"))?,
                stream @ Object::Stream(_) => stream,
                other => bail!("Object {number} is a {}", other.type_name()),
            };
            let objects = file.content(&contents)?.parse_content_objects()?;
            print_content(&objects, 0);
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open(session: &mut Session, path: &Path, options: ParseOptions) -> Result<PdfFile> {
    let file = session
        .open_with_options(path, options)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    tracing::debug!(
        "Opened {} (PDF {}, {} objects)",
        path.display(),
        file.version(),
        file.objects().len()
    );
    Ok(file)
}

fn print_info(file: &PdfFile, path: &Path) {
    let objects = file.objects();
    let (mut in_use, mut free, mut compressed) = (0usize, 0usize, 0usize);
    for number in 0..=objects.last_object_number() {
        match objects.xref_entry(number).map(|e| e.usage) {
            Some(XRefUsage::InUse) => in_use += 1,
            Some(XRefUsage::InUseCompressed) => compressed += 1,
            Some(XRefUsage::Free) | None => free += 1,
        }
    }

    println!("File: {}", path.display());
    println!("PDF Version: {}", file.version());
    println!("Objects: {}", objects.len());
    println!("  In use: {in_use}");
    println!("  Compressed: {compressed}");
    println!("  Free: {free}");
    if let Some(offset) = file.startxref() {
        println!("startxref: {offset}");
    }
    let keys: Vec<&str> = file.trailer().keys().map(String::as_str).collect();
    println!("Trailer: {}", keys.join(", "));
}

fn format_operation(operation: &Operation) -> String {
    let serializer = ObjectSerializer::default();
    let mut parts: Vec<String> = operation
        .operands
        .iter()
        .map(|operand| String::from_utf8_lossy(&serializer.to_bytes(operand)).into_owned())
        .collect();
    parts.push(operation.operator.clone());
    parts.join(" ")
}

fn print_content(objects: &[ContentObject], depth: usize) {
    let indent = "  ".repeat(depth);
    for object in objects {
        match object {
            ContentObject::Operation(operation)
            | ContentObject::XObject(operation)
            | ContentObject::Shading(operation) => {
                println!("{indent}{}", format_operation(operation));
            }
            ContentObject::MarkedContent { begin, objects } => {
                println!("{indent}MarkedContent {}", format_operation(begin));
                print_content(objects, depth + 1);
            }
            ContentObject::InlineImage(image) => {
                let header = Object::Dictionary(image.header.clone());
                println!(
                    "{indent}InlineImage {} ({} bytes)",
                    String::from_utf8_lossy(&ObjectSerializer::default().to_bytes(&header)),
                    image.data.len()
                );
            }
            other => {
                println!("{indent}{}", other.kind());
                print_content(other.children(), depth + 1);
            }
        }
    }
}
