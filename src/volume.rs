use std::fmt;

use ndarray::{Array2, ArrayBase, ArrayD, ArrayView2, Axis, Data, Dimension, Ix2, IxDyn};
use thiserror::Error;

use crate::enums::Plane;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VolumeError {
    #[error("The shape must be a non-empty sequence of sizes")]
    InvalidShape,

    #[error("Pixel spacing must be provided for {expected} dimensions, got {found}")]
    SpacingLength { expected: usize, found: usize },

    #[error("Number of image dimensions not supported ({0})")]
    UnsupportedDimensions(usize),

    #[error("Given slice has wrong size. Expected {expected:?} but got {found:?}")]
    SliceShape { expected: Vec<usize>, found: Vec<usize> },

    #[error("Slice index {index} out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Numeric type stored in a [`Volume`].
pub trait Sample: Copy + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const ZERO: Self;

    /// Convert a decoded pixel value, truncating and saturating for integers.
    fn from_f32(value: f32) -> Self;

    fn to_f64(self) -> f64;
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                const ZERO: Self = 0 as $t;

                #[inline]
                fn from_f32(value: f32) -> Self {
                    value as $t
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_sample!(f32, f64, u16, i16, i32);

/// Pixel aspect ratios derived from the spacing of a 2D or 3D volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AspectRatios {
    /// `spacing[1] / spacing[0]`
    Planar(f64),
    Volumetric {
        /// `spacing[1] / spacing[0]`
        axial: f64,
        /// `spacing[1] / spacing[2]`
        sagittal: f64,
        /// `spacing[2] / spacing[0]`
        coronal: f64,
    },
}

impl AspectRatios {
    fn from_spacing(spacing: &[f64]) -> Result<Option<Self>, VolumeError> {
        match spacing {
            [_] => Ok(None),
            [x, y] => Ok(Some(AspectRatios::Planar(y / x))),
            [x, y, z] => Ok(Some(AspectRatios::Volumetric {
                axial: y / x,
                sagittal: y / z,
                coronal: z / x,
            })),
            _ => Err(VolumeError::UnsupportedDimensions(spacing.len())),
        }
    }
}

/// A dense image oriented as horizontal x vertical x depth.
///
/// The shape is fixed at construction. For 3D volumes the last axis holds the
/// slices, filled one at a time with [`Volume::set_slice`].
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T = f32> {
    pub name: String,
    pub series_id: Option<String>,
    pub modality: Option<String>,
    data: ArrayD<T>,
    pixel_spacing: Option<Vec<f64>>,
    aspect_ratios: Option<AspectRatios>,
}

impl<T: Sample> Volume<T> {
    /// Allocate a zero-filled volume of the given shape.
    pub fn new(name: impl Into<String>, shape: &[usize]) -> Result<Self, VolumeError> {
        if shape.is_empty() {
            return Err(VolumeError::InvalidShape);
        }
        Ok(Self {
            name: name.into(),
            series_id: None,
            modality: None,
            data: ArrayD::from_elem(IxDyn(shape), T::ZERO),
            pixel_spacing: None,
            aspect_ratios: None,
        })
    }

    pub fn with_pixel_spacing(mut self, spacing: &[f64]) -> Result<Self, VolumeError> {
        self.set_pixel_spacing(Some(spacing))?;
        Ok(self)
    }

    pub fn with_series_id(mut self, series_id: impl Into<String>) -> Self {
        self.series_id = Some(series_id.into());
        self
    }

    pub fn with_modality(mut self, modality: impl Into<String>) -> Self {
        self.modality = Some(modality.into());
        self
    }

    /// Set or clear the distance between voxel centres along each axis.
    pub fn set_pixel_spacing(&mut self, spacing: Option<&[f64]>) -> Result<(), VolumeError> {
        let Some(spacing) = spacing else {
            self.pixel_spacing = None;
            self.aspect_ratios = None;
            return Ok(());
        };
        if spacing.len() != self.ndim() {
            return Err(VolumeError::SpacingLength {
                expected: self.ndim(),
                found: spacing.len(),
            });
        }
        self.aspect_ratios = AspectRatios::from_spacing(spacing)?;
        self.pixel_spacing = Some(spacing.to_vec());
        Ok(())
    }

    pub fn pixel_spacing(&self) -> Option<&[f64]> {
        self.pixel_spacing.as_deref()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }

    /// All aspect ratios, `None` for 1D volumes or when no spacing is set.
    pub fn aspect_ratios(&self) -> Result<Option<AspectRatios>, VolumeError> {
        match self.ndim() {
            1..=3 => Ok(self.aspect_ratios),
            n => Err(VolumeError::UnsupportedDimensions(n)),
        }
    }

    /// Aspect ratio for displaying a slice in `plane`. 2D volumes have a
    /// single ratio whatever the plane.
    pub fn aspect_ratio(&self, plane: Plane) -> Result<Option<f64>, VolumeError> {
        Ok(self.aspect_ratios()?.map(|ratios| match ratios {
            AspectRatios::Planar(ratio) => ratio,
            AspectRatios::Volumetric {
                axial,
                sagittal,
                coronal,
            } => match plane {
                Plane::Axial => axial,
                Plane::Sagittal => sagittal,
                Plane::Coronal => coronal,
            },
        }))
    }

    /// Number of slices available in `plane`.
    pub fn slice_count(&self, plane: Plane) -> Result<usize, VolumeError> {
        match self.ndim() {
            2 => Ok(1),
            3 => Ok(self.shape()[Self::plane_axis(plane).index()]),
            n => Err(VolumeError::UnsupportedDimensions(n)),
        }
    }

    fn plane_axis(plane: Plane) -> Axis {
        match plane {
            Plane::Axial => Axis(2),
            Plane::Sagittal => Axis(1),
            Plane::Coronal => Axis(0),
        }
    }

    /// Write `slice` at position `index` of the last axis.
    pub fn set_slice<S, D>(
        &mut self,
        index: usize,
        slice: &ArrayBase<S, D>,
    ) -> Result<(), VolumeError>
    where
        S: Data<Elem = T>,
        D: Dimension,
    {
        let ndim = self.ndim();
        if ndim < 2 {
            return Err(VolumeError::UnsupportedDimensions(ndim));
        }
        let expected = &self.shape()[..ndim - 1];
        if slice.shape() != expected {
            return Err(VolumeError::SliceShape {
                expected: expected.to_vec(),
                found: slice.shape().to_vec(),
            });
        }
        let len = self.shape()[ndim - 1];
        if index >= len {
            return Err(VolumeError::IndexOutOfRange { index, len });
        }
        self.data.index_axis_mut(Axis(ndim - 1), index).assign(slice);
        Ok(())
    }

    /// A view of the cross-section at `index` in `plane`.
    ///
    /// Axial fixes the depth axis, sagittal the second axis and coronal the
    /// first one. A 2D volume is its own single slice.
    pub fn get_slice(&self, index: usize, plane: Plane) -> Result<ArrayView2<'_, T>, VolumeError> {
        let len = self.slice_count(plane)?;
        if index >= len {
            return Err(VolumeError::IndexOutOfRange { index, len });
        }
        let view = match self.ndim() {
            2 => self.data.view(),
            _ => self.data.index_axis(Self::plane_axis(plane), index),
        };
        view.into_dimensionality::<Ix2>()
            .map_err(|_| VolumeError::UnsupportedDimensions(self.ndim()))
    }

    /// Like [`Volume::get_slice`], but returns an independent copy.
    pub fn get_slice_copy(&self, index: usize, plane: Plane) -> Result<Array2<T>, VolumeError> {
        self.get_slice(index, plane).map(|view| view.to_owned())
    }

    /// Smallest sample, `None` for an empty volume.
    pub fn min(&self) -> Option<T> {
        self.data
            .iter()
            .copied()
            .reduce(|a, b| if b < a { b } else { a })
    }

    /// Largest sample, `None` for an empty volume.
    pub fn max(&self) -> Option<T> {
        self.data
            .iter()
            .copied()
            .reduce(|a, b| if b > a { b } else { a })
    }
}
