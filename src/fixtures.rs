//! Synthetic in-memory DICOM instances for unit tests.

use dicom::core::value::DataSetSequence;
use dicom::core::header::Header;
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::object::InMemDicomObject;
use dicom::object::mem::InMemElement;
use dicom_dictionary_std::tags;

use crate::attributes::{PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, PLANE_POSITION_SEQUENCE};
use crate::dataset::Dataset;
use crate::enums::SortBy;
use crate::frame::Frame;
use crate::loader::DatasetLoader;
use crate::normalizer::normalize_instance;

pub(crate) fn ds(tag: Tag, values: &[f64]) -> InMemElement {
    DataElement::new(
        tag,
        VR::DS,
        PrimitiveValue::Strs(values.iter().map(|v| v.to_string()).collect()),
    )
}

pub(crate) fn us(tag: Tag, value: u16) -> InMemElement {
    DataElement::new(tag, VR::US, PrimitiveValue::from(value))
}

pub(crate) fn text(tag: Tag, vr: VR, value: &str) -> InMemElement {
    DataElement::new(tag, vr, PrimitiveValue::from(value))
}

pub(crate) fn sequence(tag: Tag, items: Vec<InMemDicomObject>) -> InMemElement {
    DataElement::new(tag, VR::SQ, DataSetSequence::from(items))
}

pub(crate) fn plane_position(z: f64) -> InMemElement {
    sequence(
        PLANE_POSITION_SEQUENCE,
        vec![InMemDicomObject::from_element_iter([ds(
            tags::IMAGE_POSITION_PATIENT,
            &[0.0, 0.0, z],
        )])],
    )
}

pub(crate) fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub(crate) struct InstanceBuilder {
    elements: Vec<InMemElement>,
}

impl InstanceBuilder {
    /// Signed 16-bit MONOCHROME2 instance without pixel data or geometry.
    pub(crate) fn new(uid: &str, rows: u16, columns: u16) -> Self {
        Self {
            elements: vec![
                text(tags::SOP_INSTANCE_UID, VR::UI, uid),
                us(tags::ROWS, rows),
                us(tags::COLUMNS, columns),
                us(tags::BITS_ALLOCATED, 16),
                us(tags::PIXEL_REPRESENTATION, 1),
                text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
            ],
        }
    }

    /// Axial instance at `z = 0` with 1 mm pixels.
    pub(crate) fn monochrome16(uid: &str, rows: u16, columns: u16, samples: &[i16]) -> Self {
        Self::new(uid, rows, columns)
            .samples(samples)
            .position(0.0)
            .element(ds(
                tags::IMAGE_ORIENTATION_PATIENT,
                &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            ))
            .element(ds(tags::PIXEL_SPACING, &[1.0, 1.0]))
    }

    pub(crate) fn element(mut self, element: InMemElement) -> Self {
        self.elements.retain(|e| e.tag() != element.tag());
        self.elements.push(element);
        self
    }

    pub(crate) fn without_geometry(mut self) -> Self {
        self.elements.retain(|e| {
            ![
                tags::IMAGE_POSITION_PATIENT,
                tags::IMAGE_ORIENTATION_PATIENT,
                tags::PIXEL_SPACING,
            ]
            .contains(&e.tag())
        });
        self
    }

    pub(crate) fn position(self, z: f64) -> Self {
        self.element(ds(tags::IMAGE_POSITION_PATIENT, &[0.0, 0.0, z]))
    }

    pub(crate) fn bits(self, allocated: u16, signed: bool) -> Self {
        self.element(us(tags::BITS_ALLOCATED, allocated))
            .element(us(tags::PIXEL_REPRESENTATION, signed as u16))
    }

    pub(crate) fn rgb(self, planar: bool) -> Self {
        self.photometric("RGB")
            .bits(8, false)
            .element(us(tags::SAMPLES_PER_PIXEL, 3))
            .element(us(tags::PLANAR_CONFIGURATION, planar as u16))
    }

    pub(crate) fn photometric(self, value: &str) -> Self {
        self.element(text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, value))
    }

    pub(crate) fn frames(self, count: usize) -> Self {
        self.element(text(tags::NUMBER_OF_FRAMES, VR::IS, &count.to_string()))
    }

    pub(crate) fn window(self, center: f64, width: f64) -> Self {
        self.element(ds(tags::WINDOW_CENTER, &[center]))
            .element(ds(tags::WINDOW_WIDTH, &[width]))
    }

    pub(crate) fn pixel_bytes(self, bytes: Vec<u8>) -> Self {
        self.element(DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::from(bytes),
        ))
    }

    pub(crate) fn samples(self, samples: &[i16]) -> Self {
        self.pixel_bytes(samples_to_bytes(samples))
    }

    pub(crate) fn build(self) -> InMemDicomObject {
        InMemDicomObject::from_element_iter(self.elements)
    }
}

/// Multi-frame 2x2 instance with one per-frame plane position per `z`.
/// Frame `k` holds samples `k * 10 .. k * 10 + 4`.
pub(crate) fn multi_frame_instance(uid: &str, positions: &[f64]) -> InstanceBuilder {
    let samples: Vec<i16> = (0..positions.len() as i16)
        .flat_map(|k| (0..4).map(move |i| k * 10 + i))
        .collect();
    InstanceBuilder::new(uid, 2, 2)
        .frames(positions.len())
        .samples(&samples)
        .element(ds(
            tags::IMAGE_ORIENTATION_PATIENT,
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        ))
        .element(ds(tags::PIXEL_SPACING, &[1.0, 1.0]))
        .element(sequence(
            PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
            positions
                .iter()
                .map(|z| InMemDicomObject::from_element_iter([plane_position(*z)]))
                .collect(),
        ))
}

pub(crate) fn axial_frame(uid: &str, z: f64, columns: u16, rows: u16, samples: &[i16]) -> Frame {
    let object = InstanceBuilder::monochrome16(uid, rows, columns, samples)
        .position(z)
        .build();
    match normalize_instance(&object) {
        Ok(mut frames) => frames.remove(0),
        Err(err) => panic!("fixture failed to normalize: {err}"),
    }
}

/// Axial stack of `count` single-frame instances spaced `spacing` mm apart.
/// Pixel `i` of slice `k` holds `k * 100 + i`.
pub(crate) fn axial_instances(
    count: usize,
    spacing: f64,
    columns: u16,
    rows: u16,
) -> Vec<InMemDicomObject> {
    (0..count)
        .map(|k| {
            let samples: Vec<i16> = (0..rows as i16 * columns as i16)
                .map(|i| k as i16 * 100 + i)
                .collect();
            InstanceBuilder::monochrome16(&format!("1.2.840.{k:04}"), rows, columns, &samples)
                .position(k as f64 * spacing)
                .window(100.0, 400.0)
                .build()
        })
        .collect()
}

pub(crate) fn axial_stack(count: usize, spacing: f64, columns: u16, rows: u16) -> Dataset {
    let instances = axial_instances(count, spacing, columns, rows);
    match DatasetLoader::load_from_instances(&instances, SortBy::Identifier) {
        Ok(dataset) => dataset,
        Err(err) => panic!("fixture failed to load: {err}"),
    }
}

/// 2x2 axial slices at the given positions, kept in that order.
pub(crate) fn stack_at(positions: &[f64]) -> Dataset {
    let instances: Vec<_> = positions
        .iter()
        .enumerate()
        .map(|(k, z)| {
            InstanceBuilder::monochrome16(&format!("1.2.840.{k:04}"), 2, 2, &[0, 1, 2, 3])
                .position(*z)
                .build()
        })
        .collect();
    match DatasetLoader::load_from_instances(&instances, SortBy::Identifier) {
        Ok(dataset) => dataset,
        Err(err) => panic!("fixture failed to load: {err}"),
    }
}
