use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

use crate::enums::Plane;
use crate::volume::{Sample, Volume, VolumeError};

/// Upper bound of the vertical stretch applied to a slice.
const MAX_STRETCH: f64 = 64.0;

#[inline]
fn normalize_to_u8(value: f64, low: f64, high: f64) -> u8 {
    if high <= low {
        return 0;
    }
    (((value - low) / (high - low)) * 255.0).clamp(0.0, 255.0) as u8
}

/// Render the slice at `index` in `plane` as an 8-bit grayscale image.
///
/// The first axis of the slice runs horizontally. Intensities are mapped
/// linearly from `window` (default: the volume's min and max) to 0..=255, and
/// the image is stretched vertically by the plane's aspect ratio. Ratios that
/// are not finite and positive (zero or missing spacings) are ignored.
pub fn render_slice<T: Sample>(
    volume: &Volume<T>,
    index: usize,
    plane: Plane,
    window: Option<(f64, f64)>,
) -> Result<GrayImage, VolumeError> {
    let slice = volume.get_slice(index, plane)?;
    let (low, high) = window.unwrap_or_else(|| {
        let low = volume.min().map_or(0.0, Sample::to_f64);
        let high = volume.max().map_or(0.0, Sample::to_f64);
        (low, high)
    });

    let (width, height) = slice.dim();
    let image = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([normalize_to_u8(slice[[x as usize, y as usize]].to_f64(), low, high)])
    });

    let ratio = volume
        .aspect_ratio(plane)?
        .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
        .map_or(1.0, |ratio| ratio.min(MAX_STRETCH));
    let scaled_height = ((height as f64) * ratio).round().max(1.0) as u32;
    if width == 0 || height == 0 || scaled_height == height as u32 {
        return Ok(image);
    }
    Ok(imageops::resize(&image, width as u32, scaled_height, FilterType::Triangle))
}
