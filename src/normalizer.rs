//! Turns decoded DICOM instances into [`Frame`]s.
//!
//! Normalization happens in two passes. [`decode_instance`] reads one
//! instance into per-frame records that keep absent attributes as `None`.
//! Once every instance of a dataset is decoded and sorted,
//! [`compute_frames`] fills the defaults (which depend on the position of
//! each frame in the dataset) and derives the geometry.

use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3};

use crate::attributes::{
    AttributeSource, FRAME_VOI_LUT_SEQUENCE, PIXEL_MEASURES_SEQUENCE, PLANE_ORIENTATION_SEQUENCE,
    PLANE_POSITION_SEQUENCE, frame_float_strings, functional_group,
};
use crate::enums::{PhotometricInterpretation, SampleFormat};
use crate::error::ViewerError;
use crate::frame::{Frame, PixelData};
use crate::math::Vec3;

pub const DEFAULT_WINDOW_CENTER: i32 = 30;
pub const DEFAULT_WINDOW_WIDTH: i32 = 400;

const ORTHOGONALITY_TOLERANCE: f64 = 1e-3;

/// One frame as read from its instance, before defaults are applied.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub id: String,
    pub instance_uid: String,
    pub frame_index: usize,
    pub instance_number: Option<i32>,
    pub patient_name: Option<String>,
    pub columns: usize,
    pub rows: usize,
    pub source_format: SampleFormat,
    pub pixel_data: PixelData,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    pub window_center: Option<i32>,
    pub window_width: Option<i32>,
    pub image_position: Option<Vec3>,
    pub image_orientation: Option<[Vec3; 2]>,
    pub pixel_spacing: Option<[f64; 2]>,
    pub slice_location: Option<f64>,
    pub spacing_between_slices: Option<f64>,
}

impl DecodedFrame {
    /// Location used for ordering before defaults exist.
    pub fn sort_location(&self) -> Option<f64> {
        self.slice_location.or_else(|| {
            let [row, column] = self.image_orientation.unwrap_or([Vec3::X, Vec3::Y]);
            self.image_position.map(|p| p.dot(row.cross(column)))
        })
    }
}

/// Normalize a single instance on its own. Defaults are computed as if the
/// instance were the whole dataset.
pub fn normalize_instance<S: AttributeSource>(source: &S) -> Result<Vec<Frame>, ViewerError> {
    Ok(compute_frames(decode_instance(source)?))
}

/// Read every frame of one instance.
pub fn decode_instance<S: AttributeSource>(source: &S) -> Result<Vec<DecodedFrame>, ViewerError> {
    let instance_uid = source
        .string(tags::SOP_INSTANCE_UID)
        .ok_or_else(|| ViewerError::CorruptData("missing SOP instance UID".into()))?;
    let rows = required_dimension(source, tags::ROWS, "rows")?;
    let columns = required_dimension(source, tags::COLUMNS, "columns")?;
    let format = sample_format(source)?;
    let number_of_frames = source
        .int_string(tags::NUMBER_OF_FRAMES)
        .filter(|n| *n > 0)
        .unwrap_or(1) as usize;

    let bytes = source
        .pixel_data()
        .ok_or_else(|| ViewerError::CorruptData(format!("{instance_uid}: missing pixel data")))?;
    let planar =
        format == SampleFormat::Rgb && source.uint16(tags::PLANAR_CONFIGURATION) == Some(1);
    let pixel_data = split_frames(&bytes, format, planar, number_of_frames, rows, columns)
        .map_err(|err| match err {
            ViewerError::CorruptData(msg) => {
                ViewerError::CorruptData(format!("{instance_uid}: {msg}"))
            }
            other => other,
        })?;

    let instance_number = source.int_string(tags::INSTANCE_NUMBER);
    let patient_name = source.string(tags::PATIENT_NAME);
    let rescale_slope = source.float_string(tags::RESCALE_SLOPE).unwrap_or(1.0);
    let rescale_intercept = source.float_string(tags::RESCALE_INTERCEPT).unwrap_or(0.0);
    let slice_location = source.float_string(tags::SLICE_LOCATION);
    let spacing_between_slices = source
        .float_string(tags::SPACING_BETWEEN_SLICES)
        .filter(|s| *s > 0.0);

    pixel_data
        .into_iter()
        .enumerate()
        .map(|(frame_index, pixel_data)| {
            let id = if number_of_frames > 1 {
                format!("{instance_uid}.{frame_index}")
            } else {
                instance_uid.clone()
            };
            let (window_center, window_width) = frame_window(source, frame_index);
            Ok(DecodedFrame {
                id,
                instance_uid: instance_uid.clone(),
                frame_index,
                instance_number,
                patient_name: patient_name.clone(),
                columns,
                rows,
                source_format: format,
                pixel_data,
                rescale_slope,
                rescale_intercept,
                window_center,
                window_width,
                image_position: frame_position(source, frame_index)?,
                image_orientation: frame_orientation(source, frame_index)?,
                pixel_spacing: frame_pixel_spacing(source, frame_index)?,
                // A top-level slice location describes the instance, not each frame.
                slice_location: slice_location.filter(|_| number_of_frames == 1),
                spacing_between_slices,
            })
        })
        .collect()
}

/// Apply defaults and derive geometry for an ordered list of frames.
pub fn compute_frames(decoded: Vec<DecodedFrame>) -> Vec<Frame> {
    let spacing_between_slices = dataset_slice_spacing(&decoded);

    decoded
        .into_iter()
        .enumerate()
        .map(|(index, frame)| {
            let has_explicit_geometry = frame.image_position.is_some()
                && frame.image_orientation.is_some()
                && frame.pixel_spacing.is_some();

            let [row, column] = frame.image_orientation.unwrap_or([Vec3::X, Vec3::Y]);
            let image_normal = row.cross(column).normalize();
            let slice_location = frame
                .slice_location
                .or_else(|| frame.image_position.map(|p| p.dot(image_normal)))
                .unwrap_or(index as f64 + 0.5);
            let image_position = frame
                .image_position
                .unwrap_or(Vec3::new(0.5, 0.5, slice_location));
            let pixel_spacing = frame.pixel_spacing.unwrap_or([1.0, 1.0]);

            let image_center = image_position
                + row * ((frame.columns as f64 - 1.0) * pixel_spacing[0] / 2.0)
                + column * ((frame.rows as f64 - 1.0) * pixel_spacing[1] / 2.0);

            Frame {
                id: frame.id,
                instance_uid: frame.instance_uid,
                frame_index: frame.frame_index,
                instance_number: frame.instance_number,
                patient_name: frame.patient_name,
                columns: frame.columns,
                rows: frame.rows,
                source_format: frame.source_format,
                pixel_data: frame.pixel_data,
                rescale_slope: frame.rescale_slope,
                rescale_intercept: frame.rescale_intercept,
                window_center: frame.window_center.unwrap_or(DEFAULT_WINDOW_CENTER),
                window_width: frame.window_width.unwrap_or(DEFAULT_WINDOW_WIDTH),
                image_position,
                image_orientation: [row, column],
                pixel_spacing,
                image_center,
                image_normal,
                dimensions_mm: [
                    pixel_spacing[0] * frame.columns as f64,
                    pixel_spacing[1] * frame.rows as f64,
                ],
                slice_location,
                spacing_between_slices,
                has_explicit_geometry,
            }
        })
        .collect()
}

fn dataset_slice_spacing(decoded: &[DecodedFrame]) -> f64 {
    if let Some(spacing) = decoded.first().and_then(|f| f.spacing_between_slices) {
        return spacing;
    }
    match decoded {
        [first, second, ..] => match (first.image_position, second.image_position) {
            (Some(a), Some(b)) if a.distance(b) > 0.0 => a.distance(b),
            _ => 1.0,
        },
        _ => 1.0,
    }
}

fn required_dimension<S: AttributeSource>(
    source: &S,
    tag: dicom::core::Tag,
    name: &str,
) -> Result<usize, ViewerError> {
    match source.uint16(tag) {
        Some(value) if value > 0 => Ok(value as usize),
        _ => Err(ViewerError::CorruptData(format!("missing or zero {name}"))),
    }
}

fn sample_format<S: AttributeSource>(source: &S) -> Result<SampleFormat, ViewerError> {
    let photometric = match source.string(tags::PHOTOMETRIC_INTERPRETATION) {
        Some(value) => PhotometricInterpretation::parse(&value).ok_or_else(|| {
            ViewerError::UnsupportedFormat(format!("photometric interpretation {value}"))
        })?,
        None => {
            log::debug!("No photometric interpretation, assuming MONOCHROME2");
            PhotometricInterpretation::Monochrome2
        }
    };
    let bits_allocated = source
        .uint16(tags::BITS_ALLOCATED)
        .ok_or_else(|| ViewerError::CorruptData("missing bits allocated".into()))?;
    let signed = source.uint16(tags::PIXEL_REPRESENTATION).unwrap_or(0) == 1;

    match photometric {
        PhotometricInterpretation::Rgb if bits_allocated == 8 => Ok(SampleFormat::Rgb),
        PhotometricInterpretation::Rgb => Err(ViewerError::UnsupportedFormat(format!(
            "RGB with {bits_allocated} bits allocated"
        ))),
        PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2 => {
            match (bits_allocated, signed) {
                (1..=8, true) => Ok(SampleFormat::Int8),
                (1..=8, false) => Ok(SampleFormat::Uint8),
                (9..=16, true) => Ok(SampleFormat::Int16),
                (9..=16, false) => Ok(SampleFormat::Uint16),
                _ => Err(ViewerError::UnsupportedFormat(format!(
                    "{bits_allocated} bits allocated"
                ))),
            }
        }
    }
}

fn frame_window<S: AttributeSource>(source: &S, frame_index: usize) -> (Option<i32>, Option<i32>) {
    let group = functional_group(source, frame_index, FRAME_VOI_LUT_SEQUENCE);
    let lookup = |tag| {
        group
            .and_then(|item| item.int_string(tag))
            .or_else(|| source.int_string(tag))
    };
    let width = lookup(tags::WINDOW_WIDTH).filter(|w| *w >= 1);
    (lookup(tags::WINDOW_CENTER), width)
}

fn frame_position<S: AttributeSource>(
    source: &S,
    frame_index: usize,
) -> Result<Option<Vec3>, ViewerError> {
    let Some(values) = frame_float_strings(
        source,
        frame_index,
        PLANE_POSITION_SEQUENCE,
        tags::IMAGE_POSITION_PATIENT,
    ) else {
        return Ok(None);
    };
    Vec3::from_slice(&values)
        .filter(|p| p.is_finite())
        .map(Some)
        .ok_or_else(|| {
            ViewerError::CorruptData(format!("image position has {} values", values.len()))
        })
}

fn frame_orientation<S: AttributeSource>(
    source: &S,
    frame_index: usize,
) -> Result<Option<[Vec3; 2]>, ViewerError> {
    let Some(values) = frame_float_strings(
        source,
        frame_index,
        PLANE_ORIENTATION_SEQUENCE,
        tags::IMAGE_ORIENTATION_PATIENT,
    ) else {
        return Ok(None);
    };
    let (Some(row), Some(column)) = (
        values.get(0..3).and_then(Vec3::from_slice),
        values.get(3..6).and_then(Vec3::from_slice),
    ) else {
        return Err(ViewerError::CorruptData(format!(
            "image orientation has {} values",
            values.len()
        )));
    };
    if values.len() != 6 {
        return Err(ViewerError::CorruptData(format!(
            "image orientation has {} values",
            values.len()
        )));
    }

    let row = row.normalize();
    let column = column.normalize();
    let degenerate = !row.is_finite()
        || !column.is_finite()
        || row.length() == 0.0
        || column.length() == 0.0
        || row.dot(column).abs() > ORTHOGONALITY_TOLERANCE;
    if degenerate {
        return Err(ViewerError::CorruptData(
            "image orientation vectors are not orthogonal".into(),
        ));
    }

    // Remove the residual skew so the basis is exactly orthonormal.
    let normal = row.cross(column).normalize();
    Ok(Some([row, normal.cross(row)]))
}

fn frame_pixel_spacing<S: AttributeSource>(
    source: &S,
    frame_index: usize,
) -> Result<Option<[f64; 2]>, ViewerError> {
    let Some(values) = frame_float_strings(
        source,
        frame_index,
        PIXEL_MEASURES_SEQUENCE,
        tags::PIXEL_SPACING,
    ) else {
        return Ok(None);
    };
    match values.as_slice() {
        // Stored as (row spacing, column spacing).
        [between_rows, between_columns] if *between_rows > 0.0 && *between_columns > 0.0 => {
            Ok(Some([*between_columns, *between_rows]))
        }
        _ => Err(ViewerError::CorruptData(format!(
            "invalid pixel spacing {values:?}"
        ))),
    }
}

/// Split a native pixel data buffer into per-frame sample arrays.
fn split_frames(
    bytes: &[u8],
    format: SampleFormat,
    planar: bool,
    number_of_frames: usize,
    rows: usize,
    columns: usize,
) -> Result<Vec<PixelData>, ViewerError> {
    if format == SampleFormat::Rgb {
        let frame_len = checked_frame_len(bytes.len(), number_of_frames, rows * columns * 3)?;
        return bytes
            .chunks_exact(frame_len)
            .map(|chunk| {
                let samples = chunk[..rows * columns * 3].to_vec();
                let array = if planar {
                    Array3::from_shape_vec((3, rows, columns), samples)?
                        .permuted_axes([1, 2, 0])
                        .as_standard_layout()
                        .into_owned()
                } else {
                    Array3::from_shape_vec((rows, columns, 3), samples)?
                };
                Ok(PixelData::Rgb(array))
            })
            .collect();
    }

    let samples = widen_samples(bytes, format)?;
    let frame_len = checked_frame_len(samples.len(), number_of_frames, rows * columns)?;
    samples
        .chunks_exact(frame_len)
        .map(|chunk| {
            let array = Array2::from_shape_vec((rows, columns), chunk[..rows * columns].to_vec())?;
            Ok(PixelData::Int16(array))
        })
        .collect()
}

fn checked_frame_len(
    total: usize,
    number_of_frames: usize,
    needed: usize,
) -> Result<usize, ViewerError> {
    if total % number_of_frames != 0 {
        return Err(ViewerError::CorruptData(format!(
            "{total} samples do not split into {number_of_frames} frames"
        )));
    }
    let frame_len = total / number_of_frames;
    if frame_len < needed {
        return Err(ViewerError::CorruptData(format!(
            "frame holds {frame_len} samples, expected {needed}"
        )));
    }
    Ok(frame_len)
}

/// Widen monochrome samples into `i16`. Unsigned 16-bit values keep their
/// bit pattern.
fn widen_samples(bytes: &[u8], format: SampleFormat) -> Result<Vec<i16>, ViewerError> {
    match format {
        SampleFormat::Int8 => Ok(bytes.iter().map(|b| *b as i8 as i16).collect()),
        SampleFormat::Uint8 => Ok(bytes.iter().map(|b| *b as i16).collect()),
        SampleFormat::Int16 | SampleFormat::Uint16 => {
            if bytes.len() % 2 != 0 {
                return Err(ViewerError::CorruptData(format!(
                    "odd byte count {} for 16-bit samples",
                    bytes.len()
                )));
            }
            Ok(bytes
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect())
        }
        SampleFormat::Rgb => Err(ViewerError::UnsupportedFormat(
            "colour samples cannot be widened".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE;
    use crate::fixtures::{self, InstanceBuilder, ds, sequence};
    use approx::assert_relative_eq;
    use dicom::object::InMemDicomObject;

    #[test]
    fn defaults_give_orthonormal_geometry() {
        let object = InstanceBuilder::monochrome16("1.1", 2, 3, &[0; 6])
            .without_geometry()
            .build();
        let frames = normalize_instance(&object).unwrap();
        let frame = &frames[0];

        assert!(!frame.has_explicit_geometry);
        assert_eq!(frame.image_position, Vec3::new(0.5, 0.5, 0.5));
        assert_eq!(frame.pixel_spacing, [1.0, 1.0]);
        assert_eq!((frame.window_center, frame.window_width), (30, 400));
        let [row, column] = frame.image_orientation;
        assert_relative_eq!(frame.image_normal.length(), 1.0);
        assert_relative_eq!(frame.image_normal.dot(row), 0.0);
        assert_relative_eq!(frame.image_normal.dot(column), 0.0);
        // (columns - 1) / 2 and (rows - 1) / 2 from the position.
        assert_eq!(frame.image_center, Vec3::new(1.5, 1.0, 0.5));
        assert_eq!(frame.dimensions_mm, [3.0, 2.0]);
    }

    #[test]
    fn default_slice_location_follows_dataset_index() {
        let decoded: Vec<_> = ["1.1", "1.2", "1.3"]
            .iter()
            .flat_map(|uid| {
                let object = InstanceBuilder::monochrome16(uid, 1, 1, &[0])
                    .without_geometry()
                    .build();
                decode_instance(&object).unwrap()
            })
            .collect();
        let frames = compute_frames(decoded);
        let locations: Vec<_> = frames.iter().map(|f| f.slice_location).collect();
        assert_eq!(locations, vec![0.5, 1.5, 2.5]);
        assert_eq!(frames[2].image_position.z, 2.5);
    }

    #[test]
    fn unsigned_and_eight_bit_samples_are_widened() {
        let object = InstanceBuilder::new("1.1", 1, 3)
            .bits(8, false)
            .pixel_bytes(vec![0, 128, 255])
            .build();
        let frame = &normalize_instance(&object).unwrap()[0];
        assert_eq!(frame.source_format, SampleFormat::Uint8);
        let crate::frame::PixelData::Int16(samples) = &frame.pixel_data else {
            panic!("expected monochrome data");
        };
        assert_eq!(samples.as_slice().unwrap(), &[0, 128, 255]);

        let object = InstanceBuilder::new("1.2", 1, 1)
            .bits(16, false)
            .pixel_bytes(0xFFFF_u16.to_le_bytes().to_vec())
            .build();
        let frame = &normalize_instance(&object).unwrap()[0];
        assert_eq!(frame.rescaled_value(0, 0), Some(-1));
    }

    #[test]
    fn rgb_planar_data_is_interleaved() {
        let object = InstanceBuilder::new("1.1", 1, 2)
            .rgb(true)
            .pixel_bytes(vec![10, 11, 20, 21, 30, 31])
            .build();
        let frame = &normalize_instance(&object).unwrap()[0];
        assert_eq!(frame.rgb_value(0, 0), Some([10, 20, 30]));
        assert_eq!(frame.rgb_value(1, 0), Some([11, 21, 31]));
    }

    #[test]
    fn unsupported_photometric_is_rejected() {
        let object = InstanceBuilder::monochrome16("1.1", 1, 1, &[0])
            .photometric("YBR_FULL")
            .build();
        assert!(matches!(
            normalize_instance(&object),
            Err(ViewerError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn uneven_multi_frame_split_is_corrupt() {
        let object = InstanceBuilder::new("1.1", 1, 1)
            .frames(2)
            .pixel_bytes(vec![0, 0, 0, 0, 0, 0])
            .build();
        assert!(matches!(
            normalize_instance(&object),
            Err(ViewerError::CorruptData(_))
        ));

        let object = InstanceBuilder::new("1.1", 2, 2)
            .pixel_bytes(vec![0; 6])
            .build();
        assert!(matches!(
            normalize_instance(&object),
            Err(ViewerError::CorruptData(_))
        ));
    }

    #[test]
    fn malformed_orientation_is_corrupt() {
        let object = InstanceBuilder::monochrome16("1.1", 1, 1, &[0])
            .element(ds(tags::IMAGE_ORIENTATION_PATIENT, &[1.0, 0.0, 0.0, 1.0, 0.0]))
            .build();
        assert!(matches!(
            normalize_instance(&object),
            Err(ViewerError::CorruptData(_))
        ));
    }

    #[test]
    fn multi_frame_uses_per_frame_groups() {
        let voi = |center: f64| {
            sequence(
                FRAME_VOI_LUT_SEQUENCE,
                vec![InMemDicomObject::from_element_iter([
                    ds(tags::WINDOW_CENTER, &[center]),
                    ds(tags::WINDOW_WIDTH, &[80.0]),
                ])],
            )
        };
        let object = fixtures::multi_frame_instance("2.1", &[0.0, 5.0])
            .element(sequence(
                PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
                vec![
                    InMemDicomObject::from_element_iter([
                        fixtures::plane_position(0.0),
                        voi(10.0),
                    ]),
                    InMemDicomObject::from_element_iter([
                        fixtures::plane_position(5.0),
                        voi(20.0),
                    ]),
                ],
            ))
            .build();
        let frames = normalize_instance(&object).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].id, "2.1.1");
        assert_eq!((frames[0].window_center, frames[0].window_width), (10, 80));
        assert_eq!(frames[1].window_center, 20);
        assert_eq!(frames[1].image_position, Vec3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(frames[0].spacing_between_slices, 5.0);
    }
}
