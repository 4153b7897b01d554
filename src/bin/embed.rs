use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use exg_embed::{
    extract_and_embed, io::{write_embedding, write_features},
    AnalysisConfig, Component, Condition, FileBackedSource, SyntheticSource, TrialSource,
};

#[derive(Parser)]
#[command(name = "exg-embed", about = "EEG band-power features and 2-D t-SNE embedding")]
struct Args {
    /// Directory of recordings (.safetensors with `data`, `sfreq`).
    /// Synthetic trials are generated when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output directory for features.safetensors and embedding.safetensors
    #[arg(long)]
    output: PathBuf,

    /// JSON analysis config (absent keys keep their defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Samples per trial when cutting recordings (default: 1000)
    #[arg(long, default_value_t = 1000)]
    trial_samples: usize,

    /// Synthetic trials per condition (default: 50)
    #[arg(long, default_value_t = 50)]
    n_trials: usize,

    /// Synthetic channel count (default: 4)
    #[arg(long, default_value_t = 4)]
    n_channels: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };

    let set = match &args.input {
        Some(dir) => {
            let mut source = FileBackedSource::new(dir, args.trial_samples);
            let set = source.load()?;
            for (path, reason) in source.skipped() {
                println!("Skipped {}: {reason}", path.display());
            }
            set
        }
        None => {
            // Two conditions whose alpha/beta balance differs.
            let mut source = SyntheticSource {
                n_trials: args.n_trials,
                n_channels: args.n_channels,
                n_samples: args.trial_samples,
                sfreq: cfg.sfreq,
                seed: cfg.random_seed,
                conditions: vec![
                    Condition {
                        name: "rest".into(),
                        components: vec![Component::new(10.0, 2.0), Component::new(20.0, 0.5)],
                    },
                    Condition {
                        name: "task".into(),
                        components: vec![Component::new(10.0, 0.5), Component::new(20.0, 2.0)],
                    },
                ],
                ..Default::default()
            };
            source.load()?
        }
    };
    println!("Loaded {} trials × {} ch @ {} Hz", set.len(), set.n_channels(), set.sfreq());

    let (features, embedding) = extract_and_embed(&set, &cfg)?;
    println!("Features: {} × {}", features.n_trials(), features.n_features());

    std::fs::create_dir_all(&args.output)?;
    let features_path = args.output.join("features.safetensors");
    let embedding_path = args.output.join("embedding.safetensors");
    write_features(&features, &features_path)?;
    write_embedding(&embedding, &embedding_path)?;
    println!("Written → {}", features_path.display());
    println!("Written → {}", embedding_path.display());

    Ok(())
}
