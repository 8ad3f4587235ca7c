use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::render::properties::{PixelRect, RenderingProperties};

pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Opaque black canvas of the given size.
pub fn blank_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, BACKGROUND)
}

#[inline]
pub fn gray(value: u8) -> [u8; 4] {
    [value, value, value, 255]
}

/// Fill the visible part of the canvas. `shade` returns the colour of
/// source pixel `(column, row)`.
///
/// When zoomed out every viewport pixel looks up its source pixel. When
/// zoomed in each visible source pixel is shaded once into a buffer which
/// is then scaled onto the canvas. Both paths use the same nearest
/// mapping and give identical pixels.
pub fn rasterize<F>(properties: &RenderingProperties, canvas: &mut RgbaImage, shade: F)
where
    F: Fn(usize, usize) -> [u8; 4] + Sync,
{
    let (Some(bounded), Some(image_space)) = (properties.bounded_space, properties.image_space)
    else {
        return;
    };

    if properties.zoom < 1.0 {
        render_viewport_pixels(properties, bounded, canvas, shade);
    } else {
        let buffer = render_image_pixels(image_space, &shade);
        blit(properties, bounded, image_space, &buffer, canvas);
    }
}

fn canvas_rows<'a>(
    canvas: &'a mut RgbaImage,
    bounded: PixelRect,
) -> impl ParallelIterator<Item = (i64, &'a mut [u8])> {
    let row_bytes = canvas.width() as usize * 4;
    canvas
        .par_chunks_mut(row_bytes)
        .enumerate()
        .skip(bounded.y0 as usize)
        .take(bounded.height())
        .map(|(y, row)| (y as i64, row))
}

fn render_viewport_pixels<F>(
    properties: &RenderingProperties,
    bounded: PixelRect,
    canvas: &mut RgbaImage,
    shade: F,
) where
    F: Fn(usize, usize) -> [u8; 4] + Sync,
{
    canvas_rows(canvas, bounded).for_each(|(y, row)| {
        let source_row = properties.image_y(y);
        for x in bounded.x0..=bounded.x1 {
            let offset = x as usize * 4;
            row[offset..offset + 4].copy_from_slice(&shade(properties.image_x(x), source_row));
        }
    });
}

fn render_image_pixels<F>(image_space: PixelRect, shade: &F) -> Vec<[u8; 4]>
where
    F: Fn(usize, usize) -> [u8; 4] + Sync,
{
    (image_space.y0..=image_space.y1)
        .into_par_iter()
        .flat_map_iter(|row| {
            (image_space.x0..=image_space.x1)
                .map(move |column| shade(column as usize, row as usize))
        })
        .collect()
}

fn blit(
    properties: &RenderingProperties,
    bounded: PixelRect,
    image_space: PixelRect,
    buffer: &[[u8; 4]],
    canvas: &mut RgbaImage,
) {
    let buffer_width = image_space.width();
    canvas_rows(canvas, bounded).for_each(|(y, row)| {
        let source_row = properties.image_y(y) - image_space.y0 as usize;
        for x in bounded.x0..=bounded.x1 {
            let source_column = properties.image_x(x) - image_space.x0 as usize;
            let offset = x as usize * 4;
            row[offset..offset + 4]
                .copy_from_slice(&buffer[source_row * buffer_width + source_column]);
        }
    });
}
