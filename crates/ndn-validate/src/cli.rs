use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ndn-validate",
    version,
    about = "Validate signed NDN packets against a trust configuration"
)]
pub struct Cli {
    /// Path to the settings file
    #[arg(short, long, default_value = "ndn-validate.yaml")]
    pub config: PathBuf,

    /// Path to the validator configuration (overrides settings file)
    #[arg(short, long)]
    pub policy: Option<PathBuf>,

    /// Directory of certificates served to the validator (overrides settings file)
    #[arg(long)]
    pub cert_dir: Option<PathBuf>,

    /// Only load the validator configuration and print a summary
    #[arg(long)]
    pub check: bool,

    /// Packet files to validate, each holding a base64-encoded packet
    pub packets: Vec<PathBuf>,
}
