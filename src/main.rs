use anyhow::{Context, Error, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{info, warn};

use geoipdecode::input::FileOrStdin;
use geoipdecode::{DecoderConfig, GeoIpDecoder, Message};

/// Check if the error chain contains a broken pipe error.
#[inline(always)]
fn is_broken_pipe(err: &Error) -> bool {
    // Look for a broken pipe error in the error chain
    for cause in err.chain() {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::BrokenPipe {
                return true;
            }
        }
    }
    false
}

/// Enrich newline-delimited JSON records with GeoIP attributes
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// TOML file with decoder settings. Command-line options override it
    #[clap(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    config: Option<Utf8PathBuf>,

    /// Directory that relative database paths are resolved against
    #[clap(
        short = 'I',
        value_name = "DIR",
        value_hint = clap::ValueHint::DirPath,
        env = "GEOIP_MMDB_DIR"
    )]
    include: Option<Utf8PathBuf>,

    /// GeoIP2/GeoLite2 City database
    #[clap(long, value_name = "MMDB")]
    city_db: Option<Utf8PathBuf>,

    /// GeoIP2 ISP (or GeoLite2 ASN) database
    #[clap(long, value_name = "MMDB")]
    isp_db: Option<Utf8PathBuf>,

    /// GeoIP2 Anonymous IP database
    #[clap(long, value_name = "MMDB")]
    anonymous_ip_db: Option<Utf8PathBuf>,

    /// GeoIP2 Connection Type database
    #[clap(long, value_name = "MMDB")]
    connection_type_db: Option<Utf8PathBuf>,

    /// Record field holding the address. Repeat to give fallbacks, tried in order
    #[clap(short, long = "field", value_name = "NAME")]
    fields: Vec<String>,

    /// Prefix for the names of added fields
    #[clap(short, long)]
    prefix: Option<String>,

    /// Add a single JSON object field named after the prefix
    #[clap(long)]
    json_object: bool,

    /// Treat field values as host names and resolve them
    #[clap(long)]
    dns: bool,

    /// Locale for country and city names
    #[clap(long)]
    language: Option<String>,

    /// Input file(s) to process. Leave empty or use "-" to read from stdin
    #[clap(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    input: Vec<Utf8PathBuf>,
}

impl Args {
    /// Layer command-line options over the configuration file.
    fn decoder_config(&self) -> Result<DecoderConfig> {
        let mut config = match &self.config {
            Some(path) => DecoderConfig::load(path)
                .with_context(|| format!("failed to load configuration from {}", path))?,
            None => DecoderConfig::default(),
        };

        if let Some(dir) = &self.include {
            config.mmdb_dir = Some(dir.clone());
        }
        if let Some(path) = &self.city_db {
            config.city_db_file = Some(path.clone());
        }
        if let Some(path) = &self.isp_db {
            config.isp_db_file = Some(path.clone());
        }
        if let Some(path) = &self.anonymous_ip_db {
            config.anonymous_ip_db_file = Some(path.clone());
        }
        if let Some(path) = &self.connection_type_db {
            config.connection_type_db_file = Some(path.clone());
        }
        if !self.fields.is_empty() {
            config.source_host_fields = self.fields.clone();
            config.source_host_field = None;
        }
        if let Some(prefix) = &self.prefix {
            config.target_field_prefix = prefix.clone();
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        config.raw_json_object |= self.json_object;
        config.dns_lookup |= self.dns;

        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geoipdecode=warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    // Use a separate run function to handle the actual work
    let err = match run_main() {
        Ok(code) => return code,
        Err(err) => err,
    };

    // Handle broken pipe errors gracefully
    if is_broken_pipe(&err) {
        return ExitCode::SUCCESS;
    }

    // Print detailed error information based on environment variables
    let mut stderr = io::stderr();
    let _ = if std::env::var("RUST_BACKTRACE").is_ok_and(|v| v == "1")
        && std::env::var("RUST_LIB_BACKTRACE").map_or(true, |v| v == "1")
    {
        writeln!(stderr, "{:?}", err)
    } else {
        writeln!(stderr, "{:#}", err)
    };

    ExitCode::FAILURE
}

fn run_main() -> Result<ExitCode> {
    let mut args = Args::parse();

    // if no files specified, add stdin
    if args.input.is_empty() {
        args.input.push(Utf8PathBuf::from("-"));
    }

    let config = args.decoder_config()?;
    let decoder = GeoIpDecoder::new(&config).context("failed to initialize GeoIP decoder")?;
    info!(
        databases = decoder.databases().len(),
        fields = ?decoder.candidate_fields(),
        "GeoIP decoder ready"
    );

    run(&args.input, &decoder)?;

    Ok(ExitCode::SUCCESS)
}

fn run(inputs: &[Utf8PathBuf], decoder: &GeoIpDecoder) -> Result<()> {
    let mut out = io::BufWriter::with_capacity(65536, io::stdout());

    for path in inputs {
        let file = FileOrStdin::from_path(path.clone());
        let mut reader = file
            .reader()
            .with_context(|| format!("failed to open {}", file))?;

        reader.for_byte_line(|line| -> Result<bool> {
            if line.iter().all(u8::is_ascii_whitespace) {
                return Ok(true);
            }
            match Message::from_json(line) {
                Ok(record) => {
                    for record in decoder.decode(record) {
                        out.write_all(&record.to_json()?)?;
                        out.write_all(b"\n")?;
                    }
                }
                Err(err) => {
                    // Not ours to drop: pass it along untouched
                    warn!(input = %file, error = %err, "line is not a JSON object");
                    out.write_all(line)?;
                    out.write_all(b"\n")?;
                }
            }
            Ok(true)
        })?;
        out.flush()?;
    }

    Ok(())
}
