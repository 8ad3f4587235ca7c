//! Typed attribute access over a parsed DICOM instance.
//!
//! The normalizer only talks to [`AttributeSource`], so anything able to
//! answer these lookups can feed the geometry model. The implementation for
//! [`InMemDicomObject`] covers files opened through `dicom::object`.

use std::borrow::Cow;

use dicom::core::Tag;
use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;

pub const PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE: Tag = Tag(0x5200, 0x9230);
pub const SHARED_FUNCTIONAL_GROUPS_SEQUENCE: Tag = Tag(0x5200, 0x9229);
pub const PLANE_POSITION_SEQUENCE: Tag = Tag(0x0020, 0x9113);
pub const PLANE_ORIENTATION_SEQUENCE: Tag = Tag(0x0020, 0x9116);
pub const PIXEL_MEASURES_SEQUENCE: Tag = Tag(0x0028, 0x9110);
pub const FRAME_VOI_LUT_SEQUENCE: Tag = Tag(0x0028, 0x9132);

pub trait AttributeSource: Sized {
    fn uint16(&self, tag: Tag) -> Option<u16>;

    /// Integer string (IS) value. Decimal strings are truncated.
    fn int_string(&self, tag: Tag) -> Option<i32>;

    /// First value of a decimal string (DS).
    fn float_string(&self, tag: Tag) -> Option<f64>;

    /// All values of a multi-valued decimal string (DS).
    fn float_strings(&self, tag: Tag) -> Option<Vec<f64>>;

    /// Text value with DICOM padding removed. Empty strings read as absent.
    fn string(&self, tag: Tag) -> Option<String>;

    /// Raw native-encoded pixel data bytes.
    fn pixel_data(&self) -> Option<Cow<'_, [u8]>>;

    /// Item `index` of the sequence stored under `tag`.
    fn sequence_item(&self, tag: Tag, index: usize) -> Option<&Self>;
}

impl AttributeSource for InMemDicomObject {
    fn uint16(&self, tag: Tag) -> Option<u16> {
        self.get(tag)?.to_int::<u16>().ok()
    }

    fn int_string(&self, tag: Tag) -> Option<i32> {
        let element = self.get(tag)?;
        element
            .to_int::<i32>()
            .ok()
            .or_else(|| element.to_float64().ok().map(|v| v.trunc() as i32))
    }

    fn float_string(&self, tag: Tag) -> Option<f64> {
        self.get(tag)?.to_float64().ok()
    }

    fn float_strings(&self, tag: Tag) -> Option<Vec<f64>> {
        self.get(tag)?.to_multi_float64().ok()
    }

    fn string(&self, tag: Tag) -> Option<String> {
        let value = self.get(tag)?.to_str().ok()?;
        let value = value.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        (!value.is_empty()).then(|| value.to_string())
    }

    fn pixel_data(&self) -> Option<Cow<'_, [u8]>> {
        self.get(tags::PIXEL_DATA)?.to_bytes().ok()
    }

    fn sequence_item(&self, tag: Tag, index: usize) -> Option<&Self> {
        self.get(tag)?.items()?.get(index)
    }
}

/// Looks up a functional-group macro for one frame: the per-frame group
/// wins over the shared group. Returns the first item of the macro sequence.
pub fn functional_group<S: AttributeSource>(
    source: &S,
    frame_index: usize,
    macro_tag: Tag,
) -> Option<&S> {
    source
        .sequence_item(PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, frame_index)
        .and_then(|group| group.sequence_item(macro_tag, 0))
        .or_else(|| {
            source
                .sequence_item(SHARED_FUNCTIONAL_GROUPS_SEQUENCE, 0)
                .and_then(|group| group.sequence_item(macro_tag, 0))
        })
}

/// Resolves a multi-valued decimal string for one frame: functional groups
/// first, then the top-level attribute.
pub fn frame_float_strings<S: AttributeSource>(
    source: &S,
    frame_index: usize,
    macro_tag: Tag,
    tag: Tag,
) -> Option<Vec<f64>> {
    functional_group(source, frame_index, macro_tag)
        .and_then(|item| item.float_strings(tag))
        .or_else(|| source.float_strings(tag))
}
