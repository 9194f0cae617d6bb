use anyhow::{Context, Result};
use clap::Parser;
use eegprep::io::{load_recording, write_augmented, write_segments, write_wavelets};
use eegprep::{prepare, AugmentationKind, PipelineConfig, Segmentation, Wavelet};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prep", about = "Segment, augment and wavelet-decompose one EEG recording")]
struct Args {
    /// Recording safetensors (`data`, `sfreq`, `ch_names`, optional `label` and events)
    #[arg(long)]
    input: PathBuf,

    /// Subject identifier used in output file names
    #[arg(long)]
    subject: String,

    /// Directory receiving `<subject>_segments`, `_augmented` and `_wavelet_<L>` files
    #[arg(long)]
    output_dir: PathBuf,

    /// TOML file with pipeline settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Window placement: fixed | events (one window per stored event marker)
    #[arg(long)]
    segmentation: Option<Segmentation>,

    /// Delay from event marker to window start, in milliseconds
    #[arg(long)]
    onset_offset_ms: Option<f64>,

    /// Window length in milliseconds
    #[arg(long)]
    window_ms: Option<f64>,

    /// Channels to keep (comma-separated)
    #[arg(long, value_delimiter = ',')]
    keep: Option<Vec<String>>,

    /// Channels to drop (comma-separated)
    #[arg(long, value_delimiter = ',')]
    ignore: Option<Vec<String>>,

    /// Augmentation kind: jitter | scaling
    #[arg(long)]
    augment: Option<AugmentationKind>,

    /// Synthetic copies per segment (0 disables augmentation)
    #[arg(long)]
    factor: Option<usize>,

    /// Lower bound of sigma (jitter) or factor (scaling)
    #[arg(long)]
    low: Option<f32>,

    /// Upper bound of sigma (jitter) or factor (scaling)
    #[arg(long)]
    high: Option<f32>,

    /// Decomposition level
    #[arg(long)]
    level: Option<usize>,

    /// Wavelet: haar | db2 | db3 | db4
    #[arg(long)]
    wavelet: Option<Wavelet>,

    /// Skip per-channel scaling before decomposition
    #[arg(long)]
    no_scale: bool,

    /// Seed for reproducible augmentation
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn config(&self) -> Result<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(mode) = self.segmentation {
            cfg.segmentation = mode;
        }
        if let Some(ms) = self.onset_offset_ms {
            cfg.onset_offset_ms = ms;
        }
        if let Some(ms) = self.window_ms {
            cfg.window_duration_ms = ms;
        }
        if let Some(keep) = &self.keep {
            cfg.keep_channels = keep.clone();
        }
        if let Some(ignore) = &self.ignore {
            cfg.ignore_channels = Some(ignore.clone());
        }
        if let Some(kind) = self.augment {
            cfg.augmentation = kind;
        }
        if let Some(f) = self.factor {
            cfg.augmentation_factor = f;
        }
        let (low, high) = match cfg.augmentation {
            AugmentationKind::Jitter => (&mut cfg.low_sigma, &mut cfg.high_sigma),
            AugmentationKind::Scaling => (&mut cfg.low_factor, &mut cfg.high_factor),
        };
        if let Some(v) = self.low {
            *low = v;
        }
        if let Some(v) = self.high {
            *high = v;
        }
        if let Some(level) = self.level {
            cfg.decomposition_level = level;
        }
        if let Some(w) = self.wavelet {
            cfg.wavelet = w;
        }
        if self.no_scale {
            cfg.scale = false;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = args.config()?;

    let rec = load_recording(&args.input, &args.subject)?;
    println!("Loaded {} ch × {} samples @ {} Hz",
        rec.n_channels(), rec.n_samples(), rec.sfreq);

    let out = prepare(&rec, &cfg)?;
    println!("Produced {} segments, {} augmented rows, {} coefficient sets",
        out.segments.len(), out.batch.len(), out.wavelets.len());

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let path = |suffix: String| args.output_dir.join(format!("{}_{suffix}.safetensors", args.subject));

    let seg_path = path("segments".into());
    write_segments(&out.segments, &seg_path)?;
    println!("Written → {}", seg_path.display());

    let aug_path = path("augmented".into());
    write_augmented(&out.batch, &aug_path)?;
    println!("Written → {}", aug_path.display());

    let wav_path = path(format!("wavelet_{}", cfg.decomposition_level));
    write_wavelets(&out.wavelets, &wav_path)?;
    println!("Written → {}", wav_path.display());

    Ok(())
}
