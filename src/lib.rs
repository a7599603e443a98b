//! # DICOM-series library
//!
//! This crate turns directory trees of DICOM slice files into validated
//! volumes, one per series.

//!
//! Built on the dicom-rs ecosystem, which does all of the DICOM decoding;
//! this crate only consumes the decoded attributes and pixel data.
//! Every regular file of a directory is read (in parallel using rayon when
//! the environment supports it), the slices are grouped by Series Instance
//! UID, and each group is checked for consistent geometry and modality before
//! it is sorted and stacked into a [`Volume`]. Subdirectories are visited as
//! well and their series are keyed by relative path.
//!
//! Volumes are oriented as horizontal x vertical x depth and can be sliced in
//! the three medical planes:
//!  - Axial
//!  - Sagittal
//!  - Coronal
//!
//! Problems with the data (unreadable files, missing attributes, series whose
//! slices disagree) are routed through an [`Escalation`] policy: ignore them,
//! warn and skip, or fail the whole call.
//!
//! A small labelled [`tree`] is also provided, used to dump the element
//! hierarchy of a single dataset for diagnostics.
//!
//! # Examples
//!
//! ## Reading every series below a directory
//!
//! ```no_run
//! # use dicom_series::{Escalation, Plane, Settings, VolumeLoader};
//! let settings = Settings::default().with_escalation(Escalation::Warning);
//! let assembly = VolumeLoader::new(settings)
//!     .load_tree::<f32>("dicom")
//!     .expect("should have read the directory tree");
//! for (key, volume) in &assembly.volumes {
//!     let depth = volume.shape()[2];
//!     let axial = volume
//!         .get_slice(depth / 2, Plane::Axial)
//!         .expect("should have returned the slice at the centre of the volume");
//!     println!("{key}: {:?}, axial aspect {:?}", axial.dim(), volume.aspect_ratio(Plane::Axial));
//! }
//! for warning in &assembly.warnings {
//!     eprintln!("skipped: {warning}");
//! }
//! ```

pub mod enums;
pub mod escalation;
pub mod preview;
pub mod settings;
pub mod slice_reader;
pub mod tree;
pub mod volume;
pub mod volume_loader;

pub use enums::{Escalation, Plane, SortBy};
pub use escalation::{ConfigError, Fault, handle_fault};
pub use settings::Settings;
pub use slice_reader::{DecodedSlice, DicomSliceDecoder, SliceDecoder, SliceFields};
pub use tree::{Node, TreeError, TreeStyle};
pub use volume::{AspectRatios, Sample, Volume, VolumeError};
pub use volume_loader::{Assembly, VolumeLoader, VolumeLoaderError};
