//! Median cut palette selection with Floyd-Steinberg error diffusion

use crate::error::CatResult;
use crate::quantize::Quantizer;
use imgref::{ImgRef, ImgVec};
use rgb::RGBA8;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Splits the color histogram at the weighted median of its widest channel
/// until there are enough boxes, then averages each box into a palette entry.
pub struct MedianCut {
    /// 0 maps every pixel to its nearest color, 1 diffuses the full error
    pub dithering: f32,
}

impl Quantizer for MedianCut {
    fn quantize(&self, image: ImgRef<'_, RGBA8>, max_colors: u16) -> CatResult<(ImgVec<u8>, Vec<RGBA8>)> {
        let mut hist = histogram(image);
        let pal = palette(&mut hist, usize::from(max_colors.clamp(1, 256)));
        let indices = remap(image, &pal, self.dithering);
        Ok((indices, pal))
    }
}

/// Unique colors with their pixel counts, sorted by color
fn histogram(image: ImgRef<'_, RGBA8>) -> Vec<(RGBA8, u32)> {
    let mut counts = BTreeMap::new();
    for px in image.pixels() {
        *counts.entry([px.r, px.g, px.b, px.a]).or_insert(0_u32) += 1;
    }
    counts.into_iter().map(|([r, g, b, a], n)| (RGBA8::new(r, g, b, a), n)).collect()
}

#[inline]
fn channel(c: RGBA8, ch: usize) -> u8 {
    match ch {
        0 => c.r,
        1 => c.g,
        2 => c.b,
        _ => c.a,
    }
}

/// (channel, max - min)
fn widest_channel(colors: &[(RGBA8, u32)]) -> (usize, u8) {
    (0..4).map(|ch| {
        let (min, max) = colors.iter().fold((255, 0), |(min, max), &(c, _)| {
            let v = channel(c, ch);
            (v.min(min), v.max(max))
        });
        (ch, max.saturating_sub(min))
    })
    .max_by_key(|&(ch, range)| (range, Reverse(ch)))
    .unwrap_or((0, 0))
}

fn palette(hist: &mut [(RGBA8, u32)], max_colors: usize) -> Vec<RGBA8> {
    if hist.is_empty() {
        return vec![RGBA8::new(0, 0, 0, 255)];
    }

    // boxes are (start, end) ranges of the histogram
    let mut boxes = vec![(0, hist.len())];
    while boxes.len() < max_colors {
        let widest = boxes.iter().enumerate()
            .filter(|&(_, &(start, end))| end - start > 1)
            .map(|(i, &(start, end))| (i, widest_channel(&hist[start..end])))
            .max_by_key(|&(i, (_, range))| (range, Reverse(i)));
        let Some((i, (ch, _))) = widest else {
            break; // every box is down to a single color
        };

        let (start, end) = boxes[i];
        let colors = &mut hist[start..end];
        colors.sort_unstable_by_key(|&(c, _)| (channel(c, ch), c.r, c.g, c.b, c.a));

        let total: u64 = colors.iter().map(|&(_, n)| u64::from(n)).sum();
        let mut acc = 0;
        let split = colors.iter()
            .position(|&(_, n)| {
                acc += u64::from(n);
                acc * 2 >= total
            })
            .map_or(1, |pos| pos + 1)
            .clamp(1, colors.len() - 1);

        boxes[i] = (start, start + split);
        boxes.insert(i + 1, (start + split, end));
    }

    boxes.into_iter().map(|(start, end)| average(&hist[start..end])).collect()
}

fn average(colors: &[(RGBA8, u32)]) -> RGBA8 {
    let total: u64 = colors.iter().map(|&(_, n)| u64::from(n)).sum::<u64>().max(1);
    let mean = |ch| {
        let sum: u64 = colors.iter().map(|&(c, n)| u64::from(channel(c, ch)) * u64::from(n)).sum();
        ((sum + total / 2) / total) as u8
    };
    RGBA8::new(mean(0), mean(1), mean(2), mean(3))
}

#[inline]
fn nearest(pal: &[RGBA8], want: [f32; 4]) -> usize {
    let mut best = (0, f32::INFINITY);
    for (i, &c) in pal.iter().enumerate() {
        let dist: f32 = (0..4).map(|ch| {
            let d = want[ch] - f32::from(channel(c, ch));
            d * d
        }).sum();
        if dist < best.1 {
            best = (i, dist);
        }
    }
    best.0
}

/// Left-to-right Floyd-Steinberg. Error rows are padded by one pixel on each side.
fn remap(image: ImgRef<'_, RGBA8>, pal: &[RGBA8], dithering: f32) -> ImgVec<u8> {
    let width = image.width();
    let mut err_curr = vec![[0_f32; 4]; width + 2];
    let mut err_next = vec![[0_f32; 4]; width + 2];
    let mut out = Vec::with_capacity(width * image.height());

    for row in image.rows() {
        for (x, &px) in row.iter().enumerate() {
            let bx = x + 1;
            let mut want = [0.; 4];
            for (ch, w) in want.iter_mut().enumerate() {
                *w = (f32::from(channel(px, ch)) + err_curr[bx][ch]).clamp(0., 255.);
            }

            let idx = nearest(pal, want);
            out.push(idx as u8);

            let got = pal[idx];
            for ch in 0..4 {
                let e = (want[ch] - f32::from(channel(got, ch))) * dithering;
                err_curr[bx + 1][ch] += e * (7. / 16.);
                err_next[bx - 1][ch] += e * (3. / 16.);
                err_next[bx][ch] += e * (5. / 16.);
                err_next[bx + 1][ch] += e * (1. / 16.);
            }
        }
        std::mem::swap(&mut err_curr, &mut err_next);
        err_next.fill([0.; 4]);
    }

    ImgVec::new(out, width, image.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::tests::{check_valid, gradient};

    const Q: MedianCut = MedianCut { dithering: 1. };

    #[test]
    fn respects_palette_cap() {
        let img = gradient(37, 23);
        for max_colors in [1, 2, 7, 64, 256] {
            check_valid(&Q, img.as_ref(), max_colors);
        }
    }

    #[test]
    fn exact_when_colors_fit() {
        let colors = [RGBA8::new(255, 0, 0, 255), RGBA8::new(0, 255, 0, 255), RGBA8::new(0, 0, 255, 255)];
        let buf: Vec<_> = (0..30).map(|i| colors[i % 3]).collect();
        let img = ImgVec::new(buf, 6, 5);
        let (indices, pal) = Q.quantize(img.as_ref(), 4).unwrap();
        assert_eq!(pal.len(), 3);
        for (&i, &px) in indices.buf().iter().zip(img.buf()) {
            assert_eq!(pal[usize::from(i)], px);
        }
    }

    #[test]
    fn two_colors_split_apart() {
        let dark = RGBA8::new(10, 10, 10, 255);
        let light = RGBA8::new(240, 240, 240, 255);
        let buf: Vec<_> = (0..100).map(|i| if i < 50 { dark } else { light }).collect();
        let (_, mut pal) = Q.quantize(ImgVec::new(buf, 10, 10).as_ref(), 2).unwrap();
        pal.sort_by_key(|c| c.r);
        assert_eq!(pal, [dark, light]);
    }

    #[test]
    fn deterministic_across_threads() {
        let img = gradient(50, 40);
        let here = Q.quantize(img.as_ref(), 16).unwrap();
        let there = std::thread::spawn(move || Q.quantize(img.as_ref(), 16).unwrap()).join().unwrap();
        assert_eq!(here.0.buf(), there.0.buf());
        assert_eq!(here.1, there.1);
    }

    #[test]
    fn dithering_mixes_colors() {
        // mid gray between black and white palette entries
        let buf = vec![RGBA8::new(128, 128, 128, 255); 64];
        let pal = [RGBA8::new(0, 0, 0, 255), RGBA8::new(255, 255, 255, 255)];
        let img = ImgVec::new(buf, 8, 8);
        let dithered = remap(img.as_ref(), &pal, 1.);
        let whites = dithered.buf().iter().filter(|&&i| i == 1).count();
        assert!((24..=40).contains(&whites), "{whites}");

        let flat = remap(img.as_ref(), &pal, 0.);
        assert!(flat.buf().iter().all(|&i| i == flat.buf()[0]));
    }
}
