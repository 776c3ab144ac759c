use std::collections::HashMap;

use super::color::{color_distance, Rgba8};
use crate::config::PaletteQuality;
use crate::error::{Result, TextureError};

/// Result of reducing a set of colors to a palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palettized {
    pub palette: Vec<Rgba8>,
    /// One index per source texel, in source order
    pub indices: Vec<u8>,
}

#[derive(Debug, Clone)]
struct ColorBox {
    colors: Vec<(Rgba8, usize)>,
}

impl ColorBox {
    fn channel(c: &Rgba8, channel: usize) -> u8 {
        match channel {
            0 => c.r,
            1 => c.g,
            2 => c.b,
            _ => c.a,
        }
    }

    /// Widest channel and its range
    fn widest(&self) -> (usize, u8) {
        (0..4)
            .map(|ch| {
                let (lo, hi) = self.colors.iter().fold((255u8, 0u8), |(lo, hi), (c, _)| {
                    let v = Self::channel(c, ch);
                    (lo.min(v), hi.max(v))
                });
                (ch, hi.saturating_sub(lo))
            })
            .max_by_key(|(ch, range)| (*range, 3 - *ch))
            .unwrap_or((0, 0))
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let (channel, _) = self.widest();
        self.colors.sort_by_key(|(c, _)| (Self::channel(c, channel), c.r, c.g, c.b, c.a));

        let total: usize = self.colors.iter().map(|(_, n)| n).sum();
        let mut running = 0;
        let mut cut = 1;
        for (i, (_, n)) in self.colors.iter().enumerate() {
            running += n;
            if running * 2 >= total {
                cut = (i + 1).clamp(1, self.colors.len() - 1);
                break;
            }
        }

        let rest = self.colors.split_off(cut);
        (self, ColorBox { colors: rest })
    }

    fn average(&self) -> Rgba8 {
        let total: usize = self.colors.iter().map(|(_, n)| n).sum::<usize>().max(1);
        let mut sums = [0usize; 4];
        for (c, n) in &self.colors {
            sums[0] += c.r as usize * n;
            sums[1] += c.g as usize * n;
            sums[2] += c.b as usize * n;
            sums[3] += c.a as usize * n;
        }
        let avg = |s: usize| ((s + total / 2) / total) as u8;
        Rgba8::new(avg(sums[0]), avg(sums[1]), avg(sums[2]), avg(sums[3]))
    }
}

fn median_cut(unique: &[(Rgba8, usize)], max_entries: usize) -> Vec<Rgba8> {
    let mut boxes = vec![ColorBox {
        colors: unique.to_vec(),
    }];

    while boxes.len() < max_entries {
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.colors.len() > 1)
            .max_by_key(|(i, b)| (b.widest().1, b.colors.len(), usize::MAX - i))
            .map(|(i, _)| i);

        let Some(index) = candidate else { break };
        let (a, b) = boxes.swap_remove(index).split();
        boxes.push(a);
        boxes.push(b);
    }

    boxes.iter().map(|b| b.average()).collect()
}

pub fn nearest_entry(palette: &[Rgba8], color: Rgba8) -> usize {
    palette
        .iter()
        .enumerate()
        .min_by_key(|(_, entry)| color_distance(**entry, color))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Reduces `colors` to at most `max_entries` palette entries
pub fn palettize(colors: &[Rgba8], max_entries: usize, quality: PaletteQuality) -> Result<Palettized> {
    if max_entries == 0 || max_entries > 256 {
        return Err(TextureError::Internal(format!(
            "cannot build a palette with {} entries",
            max_entries
        )));
    }

    // First-seen order keeps palettes of simple images stable
    let mut order = vec![];
    let mut counts: HashMap<Rgba8, usize> = HashMap::new();
    for c in colors {
        let count = counts.entry(*c).or_insert_with(|| {
            order.push(*c);
            0
        });
        *count += 1;
    }

    if order.len() <= max_entries {
        let lookup: HashMap<Rgba8, u8> = order
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i as u8))
            .collect();
        return Ok(Palettized {
            indices: colors.iter().map(|c| lookup[c]).collect(),
            palette: order,
        });
    }

    if quality == PaletteQuality::ExactOnly {
        return Err(TextureError::InvalidConfiguration(format!(
            "{} distinct colors do not fit a {} entry palette",
            order.len(),
            max_entries
        )));
    }

    let unique: Vec<(Rgba8, usize)> = order.iter().map(|c| (*c, counts[c])).collect();
    let palette = median_cut(&unique, max_entries);

    let mut cache: HashMap<Rgba8, u8> = HashMap::new();
    let indices = colors
        .iter()
        .map(|c| {
            *cache
                .entry(*c)
                .or_insert_with(|| nearest_entry(&palette, *c) as u8)
        })
        .collect();

    Ok(Palettized { palette, indices })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_palettes_keep_first_seen_order() {
        let red = Rgba8::new(255, 0, 0, 255);
        let blue = Rgba8::new(0, 0, 255, 255);
        let p = palettize(&[blue, red, blue, blue], 16, PaletteQuality::MedianCut).unwrap();
        assert_eq!(p.palette, vec![blue, red]);
        assert_eq!(p.indices, vec![0, 1, 0, 0]);
    }

    #[test]
    fn median_cut_reduces() {
        let colors: Vec<Rgba8> = (0..=255u8).map(|v| Rgba8::new(v, v, v, 255)).collect();
        let p = palettize(&colors, 16, PaletteQuality::MedianCut).unwrap();
        assert_eq!(p.palette.len(), 16);
        assert_eq!(p.indices.len(), 256);
        for (c, i) in colors.iter().zip(&p.indices) {
            let entry = p.palette[*i as usize];
            assert!((entry.r as i32 - c.r as i32).abs() <= 16);
        }
    }

    #[test]
    fn exact_only_refuses_lossy_palettes() {
        let colors: Vec<Rgba8> = (0..20u8).map(|v| Rgba8::new(v, 0, 0, 255)).collect();
        assert!(matches!(
            palettize(&colors, 16, PaletteQuality::ExactOnly),
            Err(TextureError::InvalidConfiguration(_))
        ));
    }
}
