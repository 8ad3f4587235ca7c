/// Window/level lookup from rescaled intensity to 8 bits.
///
/// `table[i] = floor(i / width * 256)` for `i` in `0..width`. Values at or
/// below the left limit map to 0 and values at or above the right limit to
/// 255; values in between index the table relative to the left limit.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiLut {
    width: i32,
    table: Vec<u8>,
}

impl VoiLut {
    pub fn new(width: i32) -> Self {
        let width = width.max(1);
        let table = (0..width as i64)
            .map(|i| (i * 256 / width as i64) as u8)
            .collect();
        Self { width, table }
    }

    /// Reuse `slot` while the width is unchanged, otherwise replace it with a
    /// freshly allocated table.
    pub fn ensure(slot: &mut Option<VoiLut>, width: i32) -> &VoiLut {
        let width = width.max(1);
        if slot.as_ref().is_none_or(|lut| lut.width != width) {
            log::trace!("Allocating VOI table of width {width}");
            *slot = Some(VoiLut::new(width));
        }
        slot.get_or_insert_with(|| VoiLut::new(width))
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn table(&self) -> &[u8] {
        &self.table
    }

    /// `(left, right)` limits of a window, floored.
    pub fn limits(center: i32, width: i32) -> (i32, i32) {
        let half = width.max(1) as f64 / 2.0;
        (
            (center as f64 - half).floor() as i32,
            (center as f64 + half).floor() as i32,
        )
    }

    #[inline]
    pub fn intensity(&self, raw: i32, left: i32, right: i32) -> u8 {
        if raw <= left {
            0
        } else if raw >= right {
            255
        } else {
            self.table
                .get((raw - left) as usize)
                .copied()
                .unwrap_or(u8::MAX)
        }
    }
}
