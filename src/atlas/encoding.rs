//! Animation lookup images read by the renderer.
//!
//! The lookup image has one texel per atlas tile:
//!
//! | channel | meaning |
//! |---|---|
//! | R | frame count (0/1 = static) |
//! | G | frame duration in ticks |
//! | B | per-frame V step scaled to 0-255 |
//! | A | bit 0 = interpolate, bit 1 = custom frame order |
//!
//! Tiles with a custom order get a row in the frame-order image, indexed by
//! the tile's column. Texel `(sequence_index, column)` holds the frame index
//! in R and an optional time override in G; A is 255 for used texels.

use super::builder::{TextureAtlas, UvRect};
use crate::error::Result;
use crate::resource_pack::AnimationFrame;
use image::ImageEncoder;

pub const FLAG_INTERPOLATE: u8 = 0b01;
pub const FLAG_CUSTOM_ORDER: u8 = 0b10;

/// Decoded contents of one lookup texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnimationTexel {
    pub frame_count: u8,
    pub frame_duration: u8,
    pub frame_v_step: u8,
    pub flags: u8,
}

impl AnimationTexel {
    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }

    pub fn interpolate(&self) -> bool {
        self.flags & FLAG_INTERPOLATE != 0
    }

    pub fn has_custom_order(&self) -> bool {
        self.flags & FLAG_CUSTOM_ORDER != 0
    }

    /// V step as a fraction of the atlas height.
    pub fn v_step(&self) -> f32 {
        self.frame_v_step as f32 / 255.0
    }

    fn from_rect(rect: &UvRect) -> Self {
        match &rect.animation {
            None => Self::default(),
            Some(anim) => {
                let mut flags = 0;
                if anim.interpolate {
                    flags |= FLAG_INTERPOLATE;
                }
                if anim.frame_order.is_some() {
                    flags |= FLAG_CUSTOM_ORDER;
                }
                Self {
                    frame_count: saturate(anim.frame_count),
                    frame_duration: saturate(anim.frame_duration),
                    frame_v_step: (anim.frame_v_step.clamp(0.0, 1.0) * 255.0).round() as u8,
                    flags,
                }
            }
        }
    }
}

fn saturate(value: u32) -> u8 {
    value.min(u8::MAX as u32) as u8
}

/// A small RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl LookupImage {
    fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y as usize * self.width as usize + x as usize) * 4)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let i = self.offset(x, y)?;
        let mut texel = [0u8; 4];
        texel.copy_from_slice(&self.pixels[i..i + 4]);
        Some(texel)
    }

    fn set(&mut self, x: u32, y: u32, texel: [u8; 4]) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i..i + 4].copy_from_slice(&texel);
        }
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        image::codecs::png::PngEncoder::new(std::io::Cursor::new(&mut bytes)).write_image(
            &self.pixels,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(bytes)
    }

    pub fn from_png(bytes: &[u8]) -> Result<Self> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

fn tile_cell(rect: &UvRect, grid: u32) -> (u32, u32) {
    (
        (rect.u * grid as f32).round() as u32,
        (rect.v * grid as f32).round() as u32,
    )
}

/// Encode the per-tile lookup image for an atlas.
pub fn encode_animation_lookup(atlas: &TextureAtlas) -> LookupImage {
    let grid = atlas.grid_size;
    let mut image = LookupImage::blank(grid, grid);

    for rect in atlas.tile_uv.values() {
        let texel = AnimationTexel::from_rect(rect);
        if texel.is_animated() {
            let (x, y) = tile_cell(rect, grid);
            image.set(
                x,
                y,
                [texel.frame_count, texel.frame_duration, texel.frame_v_step, texel.flags],
            );
        }
    }

    image
}

/// Read the lookup texel for the tile whose top-left corner is at `(u, v)`.
pub fn decode_animation_texel(image: &LookupImage, u: f32, v: f32) -> AnimationTexel {
    let x = (u * image.width as f32).round() as u32;
    let y = (v * image.height as f32).round() as u32;
    match image.get(x, y) {
        Some([r, g, b, a]) => AnimationTexel {
            frame_count: r,
            frame_duration: g,
            frame_v_step: b,
            flags: a,
        },
        None => AnimationTexel::default(),
    }
}

/// Encode the frame-order image, or `None` if no tile has a custom order.
pub fn encode_frame_order(atlas: &TextureAtlas) -> Option<LookupImage> {
    let ordered: Vec<(&UvRect, &Vec<AnimationFrame>)> = atlas
        .tile_uv
        .values()
        .filter_map(|rect| {
            let order = rect.animation.as_ref()?.frame_order.as_ref()?;
            Some((rect, order))
        })
        .collect();

    let longest = ordered.iter().map(|(_, order)| order.len()).max()?;
    let mut image = LookupImage::blank(longest as u32, atlas.grid_size);

    for (rect, order) in ordered {
        let (column, _) = tile_cell(rect, atlas.grid_size);
        for (seq, frame) in order.iter().enumerate() {
            image.set(
                seq as u32,
                column,
                [saturate(frame.index), saturate(frame.time.unwrap_or(0)), 0, 255],
            );
        }
    }

    Some(image)
}

/// Read back the custom order stored for a tile column.
pub fn decode_frame_order(image: &LookupImage, column: u32) -> Vec<AnimationFrame> {
    (0..image.width)
        .map_while(|seq| image.get(seq, column))
        .take_while(|texel| texel[3] == 255)
        .map(|[index, time, _, _]| AnimationFrame {
            index: index as u32,
            time: (time > 0).then_some(time as u32),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasBuilder;
    use crate::resource_pack::{ExtractedTexture, TextureAnimation};
    use crate::test_support::{png, sprite_sheet};

    fn animated(name: &str, frames: u32, duration: u32, interpolate: bool) -> ExtractedTexture {
        let colors: Vec<[u8; 4]> = (0..frames).map(|i| [i as u8, 0, 0, 255]).collect();
        ExtractedTexture {
            name: name.to_string(),
            source_path: String::new(),
            bytes: sprite_sheet(16, &colors),
            animation: Some(TextureAnimation {
                frame_duration_ticks: duration,
                frame_count: frames,
                frame_height: 16,
                custom_frame_order: None,
                interpolate,
            }),
        }
    }

    #[test]
    fn test_lookup_round_trip() {
        let mut textures = vec![
            animated("block/a", 2, 1, false),
            animated("block/b", 8, 3, true),
            animated("block/c", 32, 20, false),
            animated("block/d", 5, 255, true),
        ];
        textures.push(ExtractedTexture {
            name: "block/stone".to_string(),
            source_path: String::new(),
            bytes: png(16, 16, [1, 1, 1, 255]),
            animation: None,
        });

        let atlas = AtlasBuilder::new(16, 4096).build(&textures).unwrap();
        let png_bytes = encode_animation_lookup(&atlas).to_png().unwrap();
        let lookup = LookupImage::from_png(&png_bytes).unwrap();
        assert_eq!(lookup.width, atlas.grid_size);

        for texture in &textures {
            let rect = atlas.get_region(&texture.name).unwrap();
            let texel = decode_animation_texel(&lookup, rect.u, rect.v);
            match &texture.animation {
                Some(anim) => {
                    assert_eq!(texel.frame_count as u32, anim.frame_count, "{}", texture.name);
                    assert_eq!(texel.frame_duration as u32, anim.frame_duration_ticks);
                    assert_eq!(texel.interpolate(), anim.interpolate);
                    assert!(!texel.has_custom_order());
                    assert!((texel.v_step() - 1.0 / atlas.grid_size as f32).abs() < 1.0 / 255.0);
                }
                None => assert!(!texel.is_animated()),
            }
        }
    }

    #[test]
    fn test_frame_order_round_trip() {
        let order = vec![
            AnimationFrame { index: 2, time: Some(10) },
            AnimationFrame { index: 0, time: None },
            AnimationFrame { index: 1, time: None },
            AnimationFrame { index: 0, time: Some(4) },
        ];
        let mut custom = animated("block/custom", 3, 2, false);
        if let Some(anim) = custom.animation.as_mut() {
            anim.custom_frame_order = Some(order.clone());
        }
        let plain = animated("block/plain", 2, 1, false);

        let atlas = AtlasBuilder::new(16, 1024).build(&[custom, plain]).unwrap();
        let image = encode_frame_order(&atlas).unwrap();
        assert_eq!(image.width, 4);
        assert_eq!(image.height, atlas.grid_size);

        let rect = atlas.get_region("block/custom").unwrap();
        let column = (rect.u * atlas.grid_size as f32).round() as u32;
        assert_eq!(decode_frame_order(&image, column), order);

        let lookup = encode_animation_lookup(&atlas);
        assert!(decode_animation_texel(&lookup, rect.u, rect.v).has_custom_order());

        let plain = atlas.get_region("block/plain").unwrap();
        let plain_column = (plain.u * atlas.grid_size as f32).round() as u32;
        assert!(decode_frame_order(&image, plain_column).is_empty());
    }

    #[test]
    fn test_no_custom_order_means_no_image() {
        let atlas = AtlasBuilder::new(16, 1024)
            .build(&[animated("block/a", 2, 1, false)])
            .unwrap();
        assert!(encode_frame_order(&atlas).is_none());
    }

    #[test]
    fn test_counts_saturate() {
        assert_eq!(saturate(300), 255);
        assert_eq!(saturate(7), 7);
    }
}
