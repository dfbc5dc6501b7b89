use anyhow::{Context, bail};
use clap::Parser;
use std::{fs::File, io::BufWriter, path::PathBuf};

use dicom_quadview::{
    DecodeFailurePolicy, Interpolation, Orientation, ViewerConfig, ViewerSession, WindowPreset,
    archive::is_zip_path,
};

#[derive(Parser)]
#[command(author, version, about = "Render the four views of a zipped DICOM series")]
struct Args {
    /// Zip archive or directory containing the series
    input: PathBuf,
    /// JSON viewer configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory for the rendered views
    #[arg(short, long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    axial: Option<usize>,
    #[arg(long)]
    coronal: Option<usize>,
    #[arg(long)]
    sagittal: Option<usize>,
    /// Window preset: default, ct-abdomen, ct-bone or custom
    #[arg(long, default_value = "default")]
    preset: WindowPreset,
    /// Custom window width (selects the custom preset)
    #[arg(long)]
    width: Option<f32>,
    /// Custom window center (selects the custom preset)
    #[arg(long)]
    center: Option<f32>,
    /// Render a thumbnail grid of every .dcm file instead of the volume
    #[arg(long, default_value_t = false)]
    grid: bool,
    /// Warn about every dropped file
    #[arg(long, default_value_t = false)]
    warn_dropped: bool,
    /// Resample coronal and sagittal views to isotropic spacing
    #[arg(long, default_value_t = false)]
    bilinear: bool,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = match &args.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("loading viewer config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    if args.warn_dropped {
        config.decode_failure_policy = DecodeFailurePolicy::Warn;
    }
    if args.bilinear {
        config.interpolation = Interpolation::Bilinear;
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;
    let mut session = ViewerSession::new(config);

    if args.grid {
        if !is_zip_path(&args.input) {
            bail!("--grid expects a zip archive, got {}", args.input.display());
        }
        let grid = session
            .thumbnail_grid(&args.input)
            .with_context(|| format!("building thumbnail grid from {}", args.input.display()))?;
        for (i, cell) in grid.cells().iter().enumerate() {
            if let Some(thumbnail) = cell {
                log::info!(
                    "Cell ({}, {}): {}",
                    i / grid.columns(),
                    i % grid.columns(),
                    thumbnail.label
                );
            }
        }
        let path = args.out.join("grid.png");
        grid.compose(session.config().thumbnail_size)
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!(
            "Thumbnail grid -> {} images in {}x{} cells, {}",
            grid.len(),
            grid.rows(),
            grid.columns(),
            path.display()
        );
        return Ok(());
    }

    let report = if is_zip_path(&args.input) {
        session.load_archive(&args.input)
    } else {
        session.load_directory(&args.input)
    }
    .with_context(|| format!("loading series from {}", args.input.display()))?;
    let dropped = report.dropped.len();

    let mut indices = session.indices();
    for (orientation, index) in [
        (Orientation::Axial, args.axial),
        (Orientation::Coronal, args.coronal),
        (Orientation::Sagittal, args.sagittal),
    ] {
        if let Some(index) = index {
            indices.set(orientation, index);
        }
    }
    session.set_slice_indices(indices)?;

    if args.width.is_some() || args.center.is_some() {
        session.select_preset(WindowPreset::Custom);
        let default = session.window()?;
        session.set_custom_window(
            args.width.unwrap_or(default.width()),
            args.center.unwrap_or(default.center()),
        )?;
    } else {
        session.select_preset(args.preset);
    }

    let view = session.render()?;
    for orientation in Orientation::all() {
        let path = args.out.join(format!("{}.png", orientation.name()));
        view.image(orientation)
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    let volume_path = args.out.join("volume.json");
    let writer = BufWriter::new(
        File::create(&volume_path)
            .with_context(|| format!("creating {}", volume_path.display()))?,
    );
    serde_json::to_writer(writer, view.volume)
        .with_context(|| format!("writing {}", volume_path.display()))?;

    println!(
        "Rendered slices {:?} with {} ({} files dropped) -> {}",
        view.indices,
        view.window,
        dropped,
        args.out.display()
    );
    Ok(())
}
