use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use specmod::config::ProcessingConfig;
use specmod::data::loader::load_windows;
use specmod::persist::{read_spectra, write_spectra, ReadGate, SaveFormat};
use specmod::spectral::SpectralGroup;

#[derive(Parser, Debug)]
#[command(
    name = "specmod",
    about = "Signal/noise spectral pairing and SNR bandwidth estimation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pair signal and noise windows of one event and assess every channel
    Process {
        /// Signal windows (.json, .csv or .parquet)
        #[arg(long)]
        signal: PathBuf,
        /// Noise windows, in the same channel order as the signal windows
        #[arg(long)]
        noise: PathBuf,
        /// Processing configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Integrate the spectra once (velocity -> displacement)
        #[arg(long)]
        integrate: bool,
        /// Report amplitude rather than power spectra
        #[arg(long)]
        amplitude: bool,
        /// Persist the group to this path (`.spec` is appended)
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Summarise a persisted spectra file
    Inspect {
        file: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long)]
        trust: bool,
        #[arg(long, default_value = "json")]
        format: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Process {
            signal,
            noise,
            config,
            integrate,
            amplitude,
            output,
            format,
        } => {
            let config = match config {
                Some(path) => ProcessingConfig::load_from_file(path)?,
                None => ProcessingConfig::default(),
            };
            let format: SaveFormat = format.parse()?;

            let signals = load_windows(&signal)?;
            let noises = load_windows(&noise)?;
            let mut group = SpectralGroup::from_streams(&signals, &noises, &config)
                .context("building spectral group")?;
            if integrate {
                group.integrate();
            }
            if amplitude {
                group.to_amplitude();
            }
            print_summary(&group);

            if let Some(path) = output {
                let written = write_spectra(&path, std::slice::from_ref(&group), format)?;
                println!("Saved to {}", written.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect {
            file,
            trust,
            format,
        } => {
            let format: SaveFormat = format.parse()?;
            let gate = if trust {
                ReadGate::Trusted
            } else {
                ReadGate::prompt()
            };
            match read_spectra(&file, format, gate)? {
                Some(groups) => {
                    for group in &groups {
                        print_summary(group);
                    }
                    Ok(ExitCode::SUCCESS)
                }
                None => Ok(ExitCode::from(2)),
            }
        }
    }
}

fn print_summary(group: &SpectralGroup) {
    println!("{group}");
    println!("{:<20} {:>5} {:>10} {:>10}", "channel", "pass", "low (Hz)", "high (Hz)");
    for pair in group.iter() {
        let (low, high) = match pair.bandwidth() {
            Some([lo, hi]) => (format!("{lo:.3}"), format!("{hi:.3}")),
            None => ("-".to_string(), "-".to_string()),
        };
        println!(
            "{:<20} {:>5} {:>10} {:>10}",
            pair.identifier(),
            pair.pass_snr(),
            low,
            high
        );
    }
}
