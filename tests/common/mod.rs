//! A stand-in decoder reading slices from small `key=value` text files, so
//! that loader tests can run on real directories without DICOM fixtures.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use dicom_series::{DecodedSlice, Fault, Settings, SliceDecoder, SliceFields};
use ndarray::Array2;

const MAGIC: &str = "SLICE";

#[derive(Debug, Clone)]
pub struct SliceSpec {
    pub uid: Option<String>,
    pub columns: Option<usize>,
    pub rows: Option<usize>,
    pub spacing: Option<(f64, f64)>,
    pub thickness: Option<f64>,
    pub modality: Option<String>,
    pub location: Option<f64>,
    pub instance: Option<i32>,
    /// Base intensity; pixel (r, c) holds `base + 10 r + c`.
    pub base: f32,
    /// Shape of the stored pixel array, if it should differ from (rows, columns).
    pub pixel_shape: Option<(usize, usize)>,
}

impl SliceSpec {
    /// A 3 columns x 2 rows CT slice at `location`, with base intensity
    /// equal to its location.
    pub fn new(uid: &str, location: f64) -> Self {
        Self {
            uid: Some(uid.to_string()),
            columns: Some(3),
            rows: Some(2),
            spacing: Some((0.5, 0.5)),
            thickness: Some(2.0),
            modality: Some("CT".to_string()),
            location: Some(location),
            instance: None,
            base: location as f32,
            pixel_shape: None,
        }
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn modality(mut self, modality: &str) -> Self {
        self.modality = Some(modality.to_string());
        self
    }

    pub fn pixel_shape(mut self, rows: usize, columns: usize) -> Self {
        self.pixel_shape = Some((rows, columns));
        self
    }

    pub fn without_modality(mut self) -> Self {
        self.modality = None;
        self
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let mut text = format!("{MAGIC}\nbase={}\n", self.base);
        if let Some(uid) = &self.uid {
            text += &format!("uid={uid}\n");
        }
        if let Some(columns) = self.columns {
            text += &format!("columns={columns}\n");
        }
        if let Some(rows) = self.rows {
            text += &format!("rows={rows}\n");
        }
        if let Some((row, column)) = self.spacing {
            text += &format!("spacing={row},{column}\n");
        }
        if let Some(thickness) = self.thickness {
            text += &format!("thickness={thickness}\n");
        }
        if let Some(modality) = &self.modality {
            text += &format!("modality={modality}\n");
        }
        if let Some(location) = self.location {
            text += &format!("location={location}\n");
        }
        if let Some(instance) = self.instance {
            text += &format!("instance={instance}\n");
        }
        if let Some((rows, columns)) = self.pixel_shape {
            text += &format!("pixel_shape={rows},{columns}\n");
        }
        let path = dir.join(name);
        fs::write(&path, text).expect("should have written the slice file");
        path
    }
}

pub fn write_garbage(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"\x00\x01 not a slice").expect("should have written the file");
    path
}

pub fn subdir(parent: &Path, name: &str) -> PathBuf {
    let path = parent.join(name);
    fs::create_dir_all(&path).expect("should have created the directory");
    path
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextSliceDecoder;

impl SliceDecoder for TextSliceDecoder {
    fn decode(&self, path: &Path, _settings: &Settings) -> Result<DecodedSlice, Fault> {
        let unreadable = |reason: &str| Fault::Unreadable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let text = fs::read_to_string(path).map_err(|e| unreadable(&e.to_string()))?;
        let mut lines = text.lines();
        if lines.next() != Some(MAGIC) {
            return Err(unreadable("not a slice file"));
        }
        let values: HashMap<&str, &str> = lines.filter_map(|line| line.split_once('=')).collect();

        let get = |key: &str, field: &'static str| {
            values.get(key).copied().ok_or(Fault::MissingField {
                path: path.to_path_buf(),
                field,
            })
        };
        let number = |key: &str, field: &'static str| -> Result<f64, Fault> {
            get(key, field)?.parse().map_err(|_| unreadable(field))
        };
        let pair = |key: &str, field: &'static str| -> Result<(f64, f64), Fault> {
            let (a, b) = get(key, field)?.split_once(',').ok_or_else(|| unreadable(field))?;
            Ok((
                a.parse().map_err(|_| unreadable(field))?,
                b.parse().map_err(|_| unreadable(field))?,
            ))
        };

        let fields = SliceFields {
            series_uid: get("uid", "SeriesInstanceUID")?.to_string(),
            columns: number("columns", "Columns")? as usize,
            rows: number("rows", "Rows")? as usize,
            pixel_spacing: pair("spacing", "PixelSpacing")?,
            slice_thickness: number("thickness", "SliceThickness")?,
            modality: get("modality", "Modality")?.to_string(),
            slice_location: number("location", "SliceLocation").ok(),
            instance_number: number("instance", "InstanceNumber").ok().map(|n| n as i32),
        };
        let base = number("base", "PixelData")? as f32;
        let shape = match pair("pixel_shape", "PixelData") {
            Ok((rows, columns)) => (rows as usize, columns as usize),
            Err(_) => (fields.rows, fields.columns),
        };
        let pixels = Array2::from_shape_fn(shape, |(r, c)| base + (10 * r + c) as f32);

        Ok(DecodedSlice {
            path: path.to_path_buf(),
            fields,
            pixels,
            dataset_tree: None,
        })
    }
}
