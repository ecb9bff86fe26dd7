//! Splitting images into channels and writing solved values back.

use image::{ImageBuffer, Pixel};

use crate::grid::{Channel, GridShape};
use crate::system::Unknowns;

/// Split an 8-bit image into one [`Channel`] per colour channel, in order.
#[must_use]
pub fn split_channels<P>(img: &ImageBuffer<P, Vec<u8>>) -> Vec<Channel>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = img.dimensions();
    let shape = GridShape::new(h as usize, w as usize);
    let count = usize::from(P::CHANNEL_COUNT);
    let mut planes = vec![Vec::with_capacity(shape.len()); count];
    for px in img.pixels() {
        for (plane, &v) in planes.iter_mut().zip(px.channels()) {
            plane.push(v);
        }
    }
    planes
        .into_iter()
        .map(|data| Channel::from_plane(shape, data))
        .collect()
}

/// Copy `target` and overwrite every unknown with its rounded solution.
///
/// Values are rounded to nearest and clamped to `0..=255`. Pixels that are
/// not unknowns keep their target value exactly.
#[must_use]
pub fn composite_channel(target: &Channel, unknowns: &Unknowns, x: &[f64]) -> Channel {
    debug_assert_eq!(x.len(), unknowns.len());
    let mut out = target.clone();
    for (&at, &v) in unknowns.coords().iter().zip(x) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let sample = v.round().clamp(0.0, 255.0) as u8;
        out.set(at, sample);
    }
    out
}

/// Interleave single-channel grids back into one image, in channel order.
///
/// Returns `None` if the channel count does not match `P` or the channels
/// disagree on shape.
#[must_use]
pub fn merge_channels<P>(channels: &[Channel]) -> Option<ImageBuffer<P, Vec<u8>>>
where
    P: Pixel<Subpixel = u8>,
{
    if channels.len() != usize::from(P::CHANNEL_COUNT) {
        return None;
    }
    let shape = channels.first()?.shape();
    if channels.iter().any(|c| c.shape() != shape) {
        return None;
    }

    let mut raw = Vec::with_capacity(shape.len() * channels.len());
    for i in 0..shape.len() {
        raw.extend(channels.iter().map(|c| c.as_raw()[i]));
    }
    let width = u32::try_from(shape.width).ok()?;
    let height = u32::try_from(shape.height).ok()?;
    ImageBuffer::from_raw(width, height, raw)
}
