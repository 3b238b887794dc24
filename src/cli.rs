use bcilog::{DuplicatePolicy, TransportKind};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bcilog",
    version,
    about = "Capture and time-base reconstruction for 16-channel bioelectric telemetry",
    long_about = "Log the raw packet stream of a 16-channel acquisition board, then rebuild\n\
                  a drift-corrected time base and export samples as CSV."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: <config_dir>/bcilog/config.json)
    #[arg(long, global = true, env = "BCILOG_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stream from the device into a log file until Ctrl+C
    Capture(CaptureArgs),
    /// Reconstruct a log and write CSV
    Convert(ConvertArgs),
    /// Print framing, loss and clock statistics of a log
    Inspect(InspectArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TransportArg {
    Udp,
    Tcp,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Udp => TransportKind::Udp,
            TransportArg::Tcp => TransportKind::Tcp,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DuplicateArg {
    Accept,
    Flag,
    Drop,
}

impl From<DuplicateArg> for DuplicatePolicy {
    fn from(arg: DuplicateArg) -> Self {
        match arg {
            DuplicateArg::Accept => DuplicatePolicy::Accept,
            DuplicateArg::Flag => DuplicatePolicy::Flag,
            DuplicateArg::Drop => DuplicatePolicy::Drop,
        }
    }
}

#[derive(Args)]
pub struct CaptureArgs {
    /// Device address (host or host:port)
    #[arg(short, long, env = "BCILOG_DEVICE")]
    pub ip: Option<String>,

    /// Log file to append to (default: bci_<timestamp>.bci)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Device-side latency to request, in microseconds
    #[arg(short, long)]
    pub latency_us: Option<u32>,

    /// Stream transport
    #[arg(long, value_enum)]
    pub transport: Option<TransportArg>,

    /// Local port to listen on (0 = any)
    #[arg(long)]
    pub port: Option<u16>,

    /// Seconds without data before giving up
    #[arg(long)]
    pub silence_timeout: Option<u64>,

    /// Handling of repeated sample numbers
    #[arg(long, value_enum)]
    pub duplicates: Option<DuplicateArg>,

    /// Persist the effective capture settings to the config file
    #[arg(long, default_value_t = false)]
    pub save_config: bool,
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Log file to read
    pub input: PathBuf,

    /// CSV file to write (default: input with .csv extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write one CSV per contiguous segment
    #[arg(long, default_value_t = false)]
    pub split: bool,

    /// Emit a header row
    #[arg(long, default_value_t = false)]
    pub header: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Log file to read
    pub input: PathBuf,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
