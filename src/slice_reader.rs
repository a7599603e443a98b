//! Reading one DICOM file into the fields the loader needs.
//!
//! The loader only depends on [`SliceDecoder`]; [`DicomSliceDecoder`] is the
//! implementation backed by the dicom-rs stack.

use std::path::{Path, PathBuf};

use dicom::core::dictionary::DataDictionary;
use dicom::core::header::Header;
use dicom::core::{Tag, VR};
use dicom::object::mem::InMemElement;
use dicom::object::{DefaultDicomObject, InMemDicomObject, open_file};
use dicom::pixeldata::{ConvertOptions, PixelDecoder};
use dicom_dictionary_std::{StandardDataDictionary, tags};
use ndarray::{Array2, s};

use crate::escalation::Fault;
use crate::settings::Settings;
use crate::tree::Node;

/// Metadata fields every slice must carry.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceFields {
    pub series_uid: String,
    pub columns: usize,
    pub rows: usize,
    /// (row spacing, column spacing) in mm
    pub pixel_spacing: (f64, f64),
    pub slice_thickness: f64,
    pub modality: String,
    pub slice_location: Option<f64>,
    pub instance_number: Option<i32>,
}

/// One decoded file.
#[derive(Debug, Clone)]
pub struct DecodedSlice {
    pub path: PathBuf,
    pub fields: SliceFields,
    /// First frame, first sample, shaped (rows, columns).
    pub pixels: Array2<f32>,
    /// Element hierarchy of the dataset, only built at verbosity 3 and above.
    pub dataset_tree: Option<Node<Option<Tag>>>,
}

/// Source of decoded slices.
pub trait SliceDecoder: Sync {
    fn decode(&self, path: &Path, settings: &Settings) -> Result<DecodedSlice, Fault>;
}

impl<F> SliceDecoder for F
where
    F: Fn(&Path, &Settings) -> Result<DecodedSlice, Fault> + Sync,
{
    fn decode(&self, path: &Path, settings: &Settings) -> Result<DecodedSlice, Fault> {
        self(path, settings)
    }
}

/// Decodes files with `dicom::object::open_file`. Pixel values go through the
/// modality LUT (rescale slope and intercept) when the dataset defines one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomSliceDecoder;

impl SliceDecoder for DicomSliceDecoder {
    fn decode(&self, path: &Path, settings: &Settings) -> Result<DecodedSlice, Fault> {
        let object = open_file(path).map_err(|err| unreadable(path, err))?;
        let fields = read_fields(&object, path)?;
        let pixels = decode_first_frame(&object, path)?;
        let dataset_tree = settings
            .is_verbose(3)
            .then(|| build_dataset_tree(&object));

        Ok(DecodedSlice {
            path: path.to_path_buf(),
            fields,
            pixels,
            dataset_tree,
        })
    }
}

fn unreadable(path: &Path, err: impl std::fmt::Display) -> Fault {
    Fault::Unreadable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn decode_first_frame(object: &DefaultDicomObject, path: &Path) -> Result<Array2<f32>, Fault> {
    let options = ConvertOptions::new();
    let frames = object
        .decode_pixel_data()
        .map_err(|err| unreadable(path, err))?
        .to_ndarray_with_options::<f32>(&options)
        .map_err(|err| unreadable(path, err))?;
    Ok(frames.slice_move(s![0, .., .., 0]))
}

fn required<'a>(
    object: &'a InMemDicomObject,
    tag: Tag,
    field: &'static str,
    path: &Path,
) -> Result<&'a InMemElement, Fault> {
    object.element(tag).map_err(|_| Fault::MissingField {
        path: path.to_path_buf(),
        field,
    })
}

fn invalid(path: &Path, field: &str, err: impl std::fmt::Display) -> Fault {
    Fault::Unreadable {
        path: path.to_path_buf(),
        reason: format!("invalid {field}: {err}"),
    }
}

/// Extract the required and ordering fields of a dataset.
pub fn read_fields(object: &InMemDicomObject, path: &Path) -> Result<SliceFields, Fault> {
    let series_uid = required(object, tags::SERIES_INSTANCE_UID, "SeriesInstanceUID", path)?
        .to_str()
        .map_err(|err| invalid(path, "SeriesInstanceUID", err))?
        .trim_end_matches(['\0', ' '])
        .to_string();
    if series_uid.is_empty() {
        return Err(Fault::MissingField {
            path: path.to_path_buf(),
            field: "SeriesInstanceUID",
        });
    }

    let columns = required(object, tags::COLUMNS, "Columns", path)?
        .to_int::<u16>()
        .map_err(|err| invalid(path, "Columns", err))?;

    let rows = required(object, tags::ROWS, "Rows", path)?
        .to_int::<u16>()
        .map_err(|err| invalid(path, "Rows", err))?;

    let spacing = required(object, tags::PIXEL_SPACING, "PixelSpacing", path)?
        .to_multi_float64()
        .map_err(|err| invalid(path, "PixelSpacing", err))?;
    let pixel_spacing = match spacing.as_slice() {
        [row, column, ..] => (*row, *column),
        _ => {
            return Err(invalid(
                path,
                "PixelSpacing",
                format!("expected 2 values, found {}", spacing.len()),
            ));
        }
    };

    let slice_thickness = required(object, tags::SLICE_THICKNESS, "SliceThickness", path)?
        .to_float64()
        .map_err(|err| invalid(path, "SliceThickness", err))?;

    let modality = required(object, tags::MODALITY, "Modality", path)?
        .to_str()
        .map_err(|err| invalid(path, "Modality", err))?
        .trim()
        .to_string();

    let slice_location = object
        .element(tags::SLICE_LOCATION)
        .ok()
        .and_then(|e| e.to_float64().ok());
    let instance_number = object
        .element(tags::INSTANCE_NUMBER)
        .ok()
        .and_then(|e| e.to_int::<i32>().ok());

    Ok(SliceFields {
        series_uid,
        columns: columns as usize,
        rows: rows as usize,
        pixel_spacing,
        slice_thickness,
        modality,
        slice_location,
        instance_number,
    })
}

const MAX_VALUE_CHARS: usize = 64;

/// Build the element hierarchy of a dataset: one node per element, labelled
/// "(gggg,eeee) VR Alias: value", with sequence items as children.
pub fn build_dataset_tree(object: &InMemDicomObject) -> Node<Option<Tag>> {
    let mut root = Node::new("root", None);
    append_elements(&mut root, object);
    root
}

fn append_elements(parent: &mut Node<Option<Tag>>, object: &InMemDicomObject) {
    for element in object.iter() {
        let tag = element.tag();
        let alias = StandardDataDictionary
            .by_tag(tag)
            .map(|entry| entry.alias)
            .unwrap_or("Unknown");
        let node = Node::new(element_label(element, alias), Some(tag)).attach(parent);

        if let Some(items) = element.value().items() {
            for (i, item) in items.iter().enumerate() {
                let item_node =
                    Node::new(format!("{alias} Item {}", i + 1), Some(tag)).attach(node);
                append_elements(item_node, item);
            }
        }
    }
}

fn element_label(element: &InMemElement, alias: &str) -> String {
    let tag = element.tag();
    let vr = element.vr();
    let value = if tag == tags::PIXEL_DATA {
        "<pixel data>".to_string()
    } else if vr == VR::SQ {
        format!("<{} item(s)>", element.value().items().map_or(0, <[_]>::len))
    } else {
        match element.value().to_str() {
            Ok(text) if text.chars().count() > MAX_VALUE_CHARS => {
                let head: String = text.chars().take(MAX_VALUE_CHARS).collect();
                format!("{head}...")
            }
            Ok(text) => text.into_owned(),
            Err(_) => "<binary>".to_string(),
        }
    };
    format!("{tag} {vr} {alias}: {value}")
}
