use crate::enums::{Escalation, SortBy};
use crate::escalation::{Fault, Handled, SeriesField, handle_fault};
use crate::settings::{Settings, verbose};
use crate::slice_reader::{DecodedSlice, DicomSliceDecoder, SliceDecoder};
use crate::volume::{Sample, Volume, VolumeError};

use rayon::prelude::*;
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("The path ('{}') is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Fault(#[from] Fault),

    #[error("Volume error: {0}")]
    Volume(#[from] VolumeError),
}

/// Volumes found under a directory, keyed by relative path and series.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly<T = f32> {
    /// `"<subdirectory>/.../<series id>"` to volume, sorted by key.
    pub volumes: BTreeMap<String, Volume<T>>,
    /// Every fault handled under [`Escalation::Warning`], in handling order.
    pub warnings: Vec<Fault>,
}

impl<T> Default for Assembly<T> {
    fn default() -> Self {
        Self {
            volumes: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }
}

/// Replace every `/` of a Series Instance UID with `_`, so that series keys
/// never clash with the path segments added by [`VolumeLoader::load_tree`].
pub fn normalize_series_uid(uid: &str) -> String {
    uid.replace('/', "_")
}

/// Slices read for one series, with their per-slice attributes in parallel.
#[derive(Debug, Default)]
pub struct SeriesSlices {
    pub slices: Vec<DecodedSlice>,
    pub columns: Vec<usize>,
    pub rows: Vec<usize>,
    pub pixel_spacing: Vec<(f64, f64)>,
    pub slice_thickness: Vec<f64>,
    pub modality: Vec<String>,
}

impl SeriesSlices {
    fn push(&mut self, slice: DecodedSlice) {
        let fields = &slice.fields;
        self.columns.push(fields.columns);
        self.rows.push(fields.rows);
        self.pixel_spacing.push(fields.pixel_spacing);
        self.slice_thickness.push(fields.slice_thickness);
        self.modality.push(fields.modality.clone());
        self.slices.push(slice);
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Attributes whose values differ between slices.
    pub fn inconsistent_fields(&self) -> Vec<SeriesField> {
        SeriesField::ALL
            .into_iter()
            .filter(|field| match field {
                SeriesField::Columns => !all_equal(&self.columns),
                SeriesField::Rows => !all_equal(&self.rows),
                SeriesField::PixelSpacing => !all_equal(&self.pixel_spacing),
                SeriesField::SliceThickness => !all_equal(&self.slice_thickness),
                SeriesField::Modality => !all_equal(&self.modality),
            })
            .collect()
    }

    /// Stable sort of the slices along the depth axis. Slices without a sort
    /// key keep their discovery order after all slices that have one.
    ///
    /// The per-slice attribute vectors are rebuilt in the new order.
    pub fn sort(&mut self, sort_by: SortBy) {
        let key = |slice: &DecodedSlice| match sort_by {
            SortBy::SliceLocation => slice.fields.slice_location,
            SortBy::InstanceNumber => slice.fields.instance_number.map(f64::from),
            SortBy::None => Some(0.0),
        };
        let mut slices = std::mem::take(&mut self.slices);
        slices.sort_by(|a, b| match (key(a), key(b)) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        *self = Self::default();
        for slice in slices {
            self.push(slice);
        }
    }
}

fn all_equal<V: PartialEq>(values: &[V]) -> bool {
    values.windows(2).all(|pair| pair[0] == pair[1])
}

/// Groups decoded slices by normalized Series Instance UID.
#[derive(Debug, Default)]
pub struct SeriesAccumulator {
    series: BTreeMap<String, SeriesSlices>,
}

impl SeriesAccumulator {
    pub fn add(&mut self, slice: DecodedSlice) {
        let key = normalize_series_uid(&slice.fields.series_uid);
        self.series.entry(key).or_default().push(slice);
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn slice_count(&self) -> usize {
        self.series.values().map(SeriesSlices::len).sum()
    }

    pub fn into_series(self) -> impl Iterator<Item = (String, SeriesSlices)> {
        self.series.into_iter()
    }
}

struct Listing {
    files: Vec<PathBuf>,
    directories: Vec<PathBuf>,
}

/// Builds [`Volume`]s from directories of DICOM slices.
pub struct VolumeLoader<D = DicomSliceDecoder> {
    decoder: D,
    settings: Settings,
}

impl VolumeLoader<DicomSliceDecoder> {
    pub fn new(settings: Settings) -> Self {
        Self::with_decoder(DicomSliceDecoder, settings)
    }
}

impl<D: SliceDecoder> VolumeLoader<D> {
    pub fn with_decoder(decoder: D, settings: Settings) -> Self {
        Self { decoder, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Load the series found directly in `path`, ignoring subdirectories.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a readable directory, or if a fault
    /// is escalated to [`Escalation::Error`].
    pub fn load_directory<T: Sample>(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Assembly<T>, VolumeLoaderError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(VolumeLoaderError::NotADirectory(path.to_path_buf()));
        }
        let listing = self.list_directory(path)?;
        self.assemble_directory(path, &listing.files)
    }

    /// Load the series found in `path` and in all of its subdirectories.
    ///
    /// Series from a subdirectory are keyed `"<subdirectory>/<key>"`.
    /// Directories deeper than [`Settings::max_depth`] are not visited, and
    /// symbolic links to directories are never followed. A subdirectory that
    /// cannot be listed is an [`Fault::Unreadable`] fault.
    pub fn load_tree<T: Sample>(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Assembly<T>, VolumeLoaderError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(VolumeLoaderError::NotADirectory(path.to_path_buf()));
        }

        let mut assembly = Assembly::default();
        let mut pending = vec![(String::new(), path.to_path_buf(), 0_usize)];

        while let Some((prefix, directory, depth)) = pending.pop() {
            let listing = match self.list_directory(&directory) {
                Ok(listing) => listing,
                Err(err) if depth > 0 => {
                    let fault = Fault::Unreadable {
                        path: directory,
                        reason: err.to_string(),
                    };
                    self.route(
                        self.settings.escalation,
                        fault,
                        "volume_loader::load_tree",
                        &mut assembly.warnings,
                    )?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let level = self.assemble_directory::<T>(&directory, &listing.files)?;
            assembly.volumes.extend(
                level
                    .volumes
                    .into_iter()
                    .map(|(key, volume)| (format!("{prefix}{key}"), volume)),
            );
            assembly.warnings.extend(level.warnings);

            if self.settings.max_depth.is_some_and(|max| depth >= max) {
                if !listing.directories.is_empty() {
                    verbose(
                        &self.settings,
                        "volume_loader::load_tree",
                        1,
                        format!(
                            "Not descending into {} subdirectories of '{}' \
                             (maximum depth {depth}).",
                            listing.directories.len(),
                            directory.display()
                        ),
                    );
                }
                continue;
            }

            // reversed so that the first subdirectory is visited first
            for subdirectory in listing.directories.into_iter().rev() {
                let name = subdirectory
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                pending.push((format!("{prefix}{name}/"), subdirectory, depth + 1));
            }
        }

        Ok(assembly)
    }

    fn list_directory(&self, path: &Path) -> io::Result<Listing> {
        verbose(
            &self.settings,
            "volume_loader::list_directory",
            1,
            format!("Reading directory '{}'.", path.display()),
        );
        let mut entries: Vec<_> = fs::read_dir(path)?
            .filter_map(Result::ok)
            .filter_map(|entry| Some((entry.path(), entry.file_type().ok()?)))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut listing = Listing {
            files: Vec::new(),
            directories: Vec::new(),
        };
        for (entry, file_type) in entries {
            // `file_type` does not follow symbolic links, `is_file` does
            if file_type.is_dir() {
                listing.directories.push(entry);
            } else if file_type.is_symlink() && entry.is_dir() {
                verbose(
                    &self.settings,
                    "volume_loader::list_directory",
                    2,
                    format!("Not following directory link '{}'.", entry.display()),
                );
            } else if entry.is_file() && self.settings.accepts_extension(&entry) {
                verbose(
                    &self.settings,
                    "volume_loader::list_directory",
                    3,
                    format!("Found file: '{}'", entry.display()),
                );
                listing.files.push(entry);
            }
        }
        verbose(
            &self.settings,
            "volume_loader::list_directory",
            1,
            format!(
                "Found {} regular files and {} subdirectories in directory '{}'.",
                listing.files.len(),
                listing.directories.len(),
                path.display()
            ),
        );
        Ok(listing)
    }

    fn route(
        &self,
        policy: Escalation,
        fault: Fault,
        who: &str,
        warnings: &mut Vec<Fault>,
    ) -> Result<(), VolumeLoaderError> {
        match handle_fault(policy, fault)? {
            Handled::Warned(fault) => warnings.push(fault),
            Handled::Ignored(fault) => verbose(&self.settings, who, 2, fault.to_string()),
        }
        Ok(())
    }

    fn assemble_directory<T: Sample>(
        &self,
        path: &Path,
        files: &[PathBuf],
    ) -> Result<Assembly<T>, VolumeLoaderError> {
        let mut assembly = Assembly::default();

        let decoded: Vec<_> = files
            .par_iter()
            .map(|file| self.decoder.decode(file, &self.settings))
            .collect();

        let mut accumulator = SeriesAccumulator::default();
        for result in decoded {
            match result {
                Ok(slice) => {
                    if let Some(tree) = &slice.dataset_tree {
                        verbose(
                            &self.settings,
                            "volume_loader::read_slice",
                            3,
                            format!("{}:\n{tree}", slice.path.display()),
                        );
                    }
                    accumulator.add(slice);
                }
                Err(fault) => self.route(
                    self.settings.escalation,
                    fault,
                    "volume_loader::read_slice",
                    &mut assembly.warnings,
                )?,
            }
        }

        verbose(
            &self.settings,
            "volume_loader::assemble_directory",
            1,
            format!(
                "Read {} slices in {} DICOM image(s) in directory '{}'.",
                accumulator.slice_count(),
                accumulator.series_count(),
                path.display()
            ),
        );

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        for (series_id, mut series) in accumulator.into_series() {
            let inconsistent = series.inconsistent_fields();
            if !inconsistent.is_empty() {
                for field in inconsistent {
                    let fault = Fault::InconsistentSeries {
                        series: series_id.clone(),
                        field,
                    };
                    self.route(
                        self.settings.escalation,
                        fault,
                        "volume_loader::validate_series",
                        &mut assembly.warnings,
                    )?;
                }
                continue;
            }

            series.sort(self.settings.sort_by);
            let volume = self.build_volume(&name, &series_id, &series, &mut assembly.warnings)?;
            if let Some(volume) = volume {
                assembly.volumes.insert(series_id, volume);
            }
        }

        Ok(assembly)
    }

    /// Materialize a validated, sorted series. Returns `None` when a slice
    /// has the wrong pixel array shape and the fault was not escalated.
    fn build_volume<T: Sample>(
        &self,
        name: &str,
        series_id: &str,
        series: &SeriesSlices,
        warnings: &mut Vec<Fault>,
    ) -> Result<Option<Volume<T>>, VolumeLoaderError> {
        let (columns, rows) = (series.columns[0], series.rows[0]);
        let (row_spacing, column_spacing) = series.pixel_spacing[0];
        let spacing = [row_spacing, column_spacing, series.slice_thickness[0]];

        let mut volume = Volume::<T>::new(name, &[columns, rows, series.len()])?
            .with_pixel_spacing(&spacing)?
            .with_series_id(series_id)
            .with_modality(series.modality[0].as_str());

        for (i, slice) in series.slices.iter().enumerate() {
            let found = slice.pixels.dim();
            if found != (rows, columns) {
                let fault = Fault::ShapeMismatch {
                    series: series_id.to_string(),
                    path: slice.path.clone(),
                    expected: (rows, columns),
                    found,
                };
                self.route(
                    self.settings.shape_mismatch,
                    fault,
                    "volume_loader::build_volume",
                    warnings,
                )?;
                return Ok(None);
            }
            // stored (rows, columns), the volume is indexed (column, row, slice)
            let pixels = slice.pixels.t().mapv(T::from_f32);
            volume.set_slice(i, &pixels)?;
        }

        verbose(
            &self.settings,
            "volume_loader::build_volume",
            2,
            format!(
                "Built {columns}x{rows}x{} volume for series {series_id}.",
                series.len()
            ),
        );
        Ok(Some(volume))
    }
}
