use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use exg_embed::{clean_directory, CleanConfig};

#[derive(Parser)]
#[command(name = "exg-clean", about = "Band-pass, epoch and summarise a directory of EEG recordings")]
struct Args {
    /// Directory of recordings (.safetensors with `data`, `sfreq`, `ch_names`)
    #[arg(long)]
    input: PathBuf,

    /// Output directory
    #[arg(long)]
    output: PathBuf,

    /// JSON cleaning config (absent keys keep their defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stim channel name, overrides the config
    #[arg(long)]
    stim_channel: Option<String>,

    /// Peak-to-peak rejection threshold, overrides the config
    #[arg(long)]
    reject_ptp: Option<f64>,

    /// Skip EOG/ECG artefact removal with ICA
    #[arg(long)]
    no_ica: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => CleanConfig::from_json_file(path)?,
        None => CleanConfig::default(),
    };
    if let Some(stim) = args.stim_channel {
        cfg.stim_channel = stim;
    }
    if args.reject_ptp.is_some() {
        cfg.reject_ptp = args.reject_ptp;
    }
    if args.no_ica {
        cfg.ica_components = None;
    }

    let report = clean_directory(&args.input, &cfg)?;
    println!(
        "Cleaned {} recordings, {} failed",
        report.recordings.len(),
        report.failures.len()
    );
    for r in report.recordings.iter().filter(|r| !r.ica_excluded.is_empty()) {
        println!("  {}: ICA removed components {:?}", r.id, r.ica_excluded);
    }
    for f in &report.failures {
        println!("  {}: {}", f.id, f.reason);
    }

    report.write(&args.output)?;
    println!("Written → {}", args.output.display());
    Ok(())
}
