use bill_splitter::calculator::BillSplitRequest;
use bill_splitter::config::{Config, ConfigSource};
use bill_splitter::pdf_extract::{self, PdfContent};
use bill_splitter::reading_store::{self, UtilityType};
use bill_splitter::report::{self, BillSession, SessionFile};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bill-splitter")]
#[command(about = "Split household utility and tax bills between two apartments")]
struct Cli {
    /// Config file (falls back to $BILL_SPLITTER_CONFIG, then .config/bill_splitter.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Print results as JSON instead of a text summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split an electricity or water bill by consumption
    #[command(allow_negative_numbers = true)]
    Split {
        #[arg(long)]
        total: f64,
        /// Fixed charges shared 50/50
        #[arg(long, default_value_t = 0.0)]
        fixed: f64,
        /// Units consumed by both apartments together
        #[arg(long)]
        consumption: f64,
        /// Units consumed by apartment 1
        #[arg(long)]
        party1: f64,
        /// electricity or water (sets the unit shown)
        #[arg(long)]
        utility: Option<String>,
        #[arg(long)]
        label: Option<String>,
    },
    /// Split an amount 50/50 (property tax)
    #[command(allow_negative_numbers = true)]
    Flat {
        #[arg(long)]
        total: f64,
        #[arg(long)]
        label: Option<String>,
    },
    /// Read or update the stored meter readings
    Reading {
        #[command(subcommand)]
        action: ReadingAction,
    },
    /// Split every bill listed in a TOML session file and show the combined totals
    Session { file: String },
    /// Print the text of a bill PDF
    ReadPdf { path: String },
}

#[derive(Subcommand, Debug)]
enum ReadingAction {
    /// Show the last saved reading
    Get { utility: String },
    /// Overwrite the saved reading
    #[command(allow_negative_numbers = true)]
    Set { utility: String, value: f64 },
    /// Save a new reading and print the consumption since the previous one
    #[command(allow_negative_numbers = true)]
    Advance { utility: String, current: f64 },
}

#[derive(Serialize)]
struct ReadingOutput {
    utility: UtilityType,
    reading: f64,
}

fn main() {
    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let (cfg, source) = match Config::load_with_source(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: failed to load config {config_path}: {e}");
            std::process::exit(2);
        }
    };

    // init tracing; stdout is reserved for the report
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.filter)),
        )
        .init();

    // config was read before the subscriber existed
    match source {
        ConfigSource::File => {
            info!(config = %config_path, backend = ?cfg.store.backend, "Configuration loaded")
        }
        ConfigSource::Defaults => {
            warn!(config = %config_path, "Config file not found — using defaults")
        }
    }

    if let Err(e) = run(cli.command, cli.json, &cfg) {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Command, json: bool, cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Split {
            total,
            fixed,
            consumption,
            party1,
            utility,
            label,
        } => {
            let utility = utility.as_deref().map(str::parse::<UtilityType>).transpose()?;
            let label = label
                .or_else(|| utility.map(|u| u.to_string()))
                .unwrap_or_else(|| "Bill".to_string());
            let request = BillSplitRequest {
                total_amount: total,
                fixed_fees: fixed,
                total_consumption: consumption,
                party1_consumption: party1,
            };

            let mut session = BillSession::new();
            let entry = session.add_consumption(label, utility, request)?;
            emit(json, entry, || report::render_entry(&cfg.parties, entry))?;
        }
        Command::Flat { total, label } => {
            let mut session = BillSession::new();
            let entry = session.add_flat(label.unwrap_or_else(|| "Property tax".to_string()), total)?;
            emit(json, entry, || report::render_entry(&cfg.parties, entry))?;
        }
        Command::Reading { action } => {
            let mut store = reading_store::open_store(&cfg.store)?;
            match action {
                ReadingAction::Get { utility } => {
                    let utility: UtilityType = utility.parse()?;
                    let reading = store.get_reading(utility)?;
                    emit(json, &ReadingOutput { utility, reading }, || {
                        format!("Previous reading for {utility} is {reading}.\n")
                    })?;
                }
                ReadingAction::Set { utility, value } => {
                    let utility: UtilityType = utility.parse()?;
                    store.save_reading(utility, value)?;
                    emit(json, &ReadingOutput { utility, reading: value }, || {
                        format!("Saved new {utility} reading: {value}.\n")
                    })?;
                }
                ReadingAction::Advance { utility, current } => {
                    let utility: UtilityType = utility.parse()?;
                    let advance = reading_store::advance_reading(store.as_mut(), utility, current)?;
                    emit(json, &advance, || {
                        format!(
                            "{utility}: previous {}, current {}, consumption {} {}\n",
                            advance.previous,
                            advance.current,
                            advance.consumption,
                            utility.unit()
                        )
                    })?;
                }
            }
        }
        Command::Session { file } => {
            let span = tracing::info_span!("session", file = %file);
            let _guard = span.enter();

            let bills = SessionFile::load(&file)?;
            info!(bills = bills.bill.len(), "Session file loaded");
            let session = BillSession::from_bills(&bills.bill)?;
            emit(json, &session, || report::render_session(&cfg.parties, &session))?;
        }
        Command::ReadPdf { path } => match pdf_extract::read_bill_pdf(&path)? {
            PdfContent::Text(text) => print!("{text}"),
            PdfContent::ScannedImage => {
                println!("{path} has no text layer; enter the bill figures manually.");
            }
            PdfContent::Error(e) => return Err(format!("Could not read {path}: {e}").into()),
        },
    }
    Ok(())
}

fn emit<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}
