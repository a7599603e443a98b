//! A CLI tool for assembling DICOM series from a directory tree.
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use dicom::object::open_file;
use dicom_series::{
    Assembly, Escalation, Plane, Sample, Settings, SortBy, TreeStyle, VolumeLoader,
    preview::render_slice, slice_reader::build_dataset_tree,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortKey {
    SliceLocation,
    InstanceNumber,
    None,
}

impl From<SortKey> for SortBy {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::SliceLocation => SortBy::SliceLocation,
            SortKey::InstanceNumber => SortBy::InstanceNumber,
            SortKey::None => SortBy::None,
        }
    }
}

/// Group the DICOM slices below a directory into volumes
#[derive(Debug, Parser)]
struct App {
    /// Directory to scan
    directory: PathBuf,

    /// What to do with unreadable files and inconsistent series
    /// (nothing, warning, error)
    #[arg(short = 'e', long = "escalation", default_value = "warning")]
    escalation: Escalation,

    /// What to do with pixel data that disagrees with its series geometry
    #[arg(long = "shape-mismatch", default_value = "error")]
    shape_mismatch: Escalation,

    /// Increase verbosity (repeat up to 3 times)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Slice ordering key
    #[arg(long = "sort-by", value_enum, default_value = "slice-location")]
    sort_by: SortKey,

    /// Do not descend more than this many directory levels
    #[arg(long = "max-depth")]
    max_depth: Option<usize>,

    /// Only read files with this extension (repeatable)
    #[arg(long = "ext")]
    extensions: Vec<String>,

    /// Do not descend into subdirectories
    #[arg(long = "flat")]
    flat: bool,

    /// Store voxels as 64-bit floats
    #[arg(long = "f64")]
    double_precision: bool,

    /// Save the centre axial, sagittal and coronal slices of each volume
    /// as PNG files into this directory
    #[arg(long = "export")]
    export: Option<PathBuf>,

    /// Print the element tree of this DICOM file and exit
    #[arg(long = "tree")]
    tree: Option<PathBuf>,

    /// Draw trees with ASCII characters only
    #[arg(long = "ascii")]
    ascii: bool,
}

fn main() {
    let app = App::parse();

    let default_filter = match app.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init();

    if let Some(file) = &app.tree {
        print_tree(file, app.ascii);
        return;
    }

    let mut settings = Settings::default()
        .with_escalation(app.escalation)
        .with_shape_mismatch(app.shape_mismatch)
        .with_verbosity(app.verbose)
        .with_sort_by(app.sort_by.into())
        .with_max_depth(app.max_depth);
    if !app.extensions.is_empty() {
        settings = settings.with_extensions(app.extensions.iter().cloned());
    }
    let loader = VolumeLoader::new(settings);

    if app.double_precision {
        run::<f64>(&loader, &app);
    } else {
        run::<f32>(&loader, &app);
    }
}

fn run<T: Sample>(loader: &VolumeLoader, app: &App) {
    let result = if app.flat {
        loader.load_directory::<T>(&app.directory)
    } else {
        loader.load_tree::<T>(&app.directory)
    };
    let assembly = result.unwrap_or_else(|e| {
        log::error!("{e}");
        std::process::exit(-1);
    });

    print_summary(&assembly);

    if let Some(out) = &app.export {
        if let Err(e) = export_previews(&assembly, out) {
            log::error!("{e}");
            std::process::exit(-2);
        }
    }
}

fn print_summary<T: Sample>(assembly: &Assembly<T>) {
    for (key, volume) in &assembly.volumes {
        let spacing = volume.pixel_spacing().unwrap_or_default();
        println!(
            "{key}: {:?} {} spacing {:?} range [{:?}, {:?}]",
            volume.shape(),
            volume.modality.as_deref().unwrap_or("?"),
            spacing,
            volume.min(),
            volume.max(),
        );
    }
    println!(
        "{} volume(s), {} warning(s)",
        assembly.volumes.len(),
        assembly.warnings.len()
    );
}

fn export_previews<T: Sample>(
    assembly: &Assembly<T>,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(out)?;
    for (key, volume) in &assembly.volumes {
        let stem = key.replace('/', "_");
        for plane in [Plane::Axial, Plane::Sagittal, Plane::Coronal] {
            let count = volume.slice_count(plane)?;
            if count == 0 {
                continue;
            }
            let image = render_slice(volume, count / 2, plane, None)?;
            let path = out.join(format!("{stem}_{plane}.png"));
            image.save(&path)?;
            log::info!("Image saved to {}", path.display());
        }
    }
    Ok(())
}

fn print_tree(file: &Path, ascii: bool) {
    let object = open_file(file).unwrap_or_else(|e| {
        log::error!("{e}");
        std::process::exit(-1);
    });
    let style = if ascii { TreeStyle::ASCII } else { TreeStyle::UNICODE };
    let mut tree = build_dataset_tree(&object);
    tree.label = file.display().to_string();
    println!("{}", tree.render(&style, "\n"));
}

#[cfg(test)]
mod tests {
    use crate::App;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }
}
