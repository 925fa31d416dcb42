//! Texture atlas builder using column-per-animation grid packing.
//!
//! Every tile is a `tile_size` square cell of a power-of-two grid. Each
//! animated texture owns a whole column and stores frame `k` in row `k`, so
//! the renderer finds any frame with `v + k * frame_v_step`. Static tiles
//! fill the remaining columns top to bottom.

use crate::error::{PipelineError, Result};
use crate::resource_pack::texture::load_texture_from_bytes;
use crate::resource_pack::{AnimationFrame, ExtractedTexture, TextureData};
use image::ImageEncoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved tile that unresolved texture references point at.
pub const MISSING_TEXTURE: &str = "missingno";

/// Animation data attached to an animated tile's UV rect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UvAnimation {
    /// Number of frames stacked below the tile's origin.
    pub frame_count: u32,
    /// V distance between consecutive frames.
    pub frame_v_step: f32,
    /// Ticks per frame.
    pub frame_duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_order: Option<Vec<AnimationFrame>>,
    #[serde(default)]
    pub interpolate: bool,
}

/// A tile's region within the atlas, normalized to [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvRect {
    /// U coordinate of the left edge.
    pub u: f32,
    /// V coordinate of the top edge (of frame 0 for animated tiles).
    pub v: f32,
    /// Width in UV space.
    pub su: f32,
    /// Height of one frame in UV space.
    pub sv: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<UvAnimation>,
}

impl UvRect {
    /// Transform a local UV coordinate (0-1) to atlas coordinate.
    pub fn transform_uv(&self, u: f32, v: f32) -> [f32; 2] {
        [self.u + u * self.su, self.v + v * self.sv]
    }

    /// Tile center, used by the renderer to clamp samples at low mip levels.
    pub fn center(&self) -> [f32; 2] {
        [self.u + self.su * 0.5, self.v + self.sv * 0.5]
    }

    /// V coordinate of the top edge of frame `k`.
    pub fn frame_v(&self, k: u32) -> f32 {
        match &self.animation {
            Some(anim) => self.v + k as f32 * anim.frame_v_step,
            None => self.v,
        }
    }
}

/// Summary persisted with generated assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtlasInfo {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub tile_count: usize,
    pub animated_count: usize,
}

/// A built texture atlas.
#[derive(Debug)]
pub struct TextureAtlas {
    /// Width of the atlas in pixels.
    pub width: u32,
    /// Height of the atlas in pixels.
    pub height: u32,
    /// Edge length of one tile in pixels.
    pub tile_size: u32,
    /// Tiles per edge.
    pub grid_size: u32,
    /// RGBA pixel data.
    pub pixels: Vec<u8>,
    /// Mapping from texture name to its tile.
    pub tile_uv: BTreeMap<String, UvRect>,
    /// Names of tiles that carry animation, sorted.
    pub animated_names: Vec<String>,
    missing: UvRect,
}

impl TextureAtlas {
    /// Get the region for a texture.
    pub fn get_region(&self, name: &str) -> Option<&UvRect> {
        self.tile_uv.get(name)
    }

    /// Region for a texture, or the missing-texture tile.
    pub fn region_or_missing(&self, name: &str) -> &UvRect {
        self.tile_uv.get(name).unwrap_or(&self.missing)
    }

    /// Check if the atlas contains a texture.
    pub fn contains(&self, name: &str) -> bool {
        self.tile_uv.contains_key(name)
    }

    pub fn info(&self) -> AtlasInfo {
        AtlasInfo {
            width: self.width,
            height: self.height,
            tile_size: self.tile_size,
            tile_count: self.tile_uv.len(),
            animated_count: self.animated_names.len(),
        }
    }

    /// Export the atlas as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(std::io::Cursor::new(&mut bytes));
        encoder.write_image(
            &self.pixels,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(bytes)
    }
}

/// Grid placement of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cell {
    column: u32,
    row: u32,
}

/// Grid dimensions chosen for a set of textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GridPlan {
    /// Tiles per edge (a power of two).
    size: u32,
    /// Rows every animated column must provide.
    min_rows: u32,
}

/// Pick the smallest power-of-two grid that gives every animated texture its
/// own column of `min_rows` rows and fits the static tiles in the rest.
fn plan_grid(animated_count: u32, static_count: u32, min_rows: u32) -> GridPlan {
    let mut size = 1u32;
    loop {
        let static_columns = static_count.div_ceil(size);
        if size >= min_rows && animated_count + static_columns <= size {
            return GridPlan { size, min_rows };
        }
        size *= 2;
    }
}

/// Builder for creating texture atlases.
pub struct AtlasBuilder {
    tile_size: u32,
    max_size: u32,
}

impl AtlasBuilder {
    /// Create a new atlas builder.
    pub fn new(tile_size: u32, max_size: u32) -> Self {
        Self {
            tile_size: tile_size.max(1),
            max_size,
        }
    }

    /// Pack textures into an atlas.
    pub fn build(&self, textures: &[ExtractedTexture]) -> Result<TextureAtlas> {
        let mut animated: Vec<&ExtractedTexture> =
            textures.iter().filter(|t| t.is_animated()).collect();
        let mut statics: Vec<&ExtractedTexture> = textures
            .iter()
            .filter(|t| !t.is_animated() && t.name != MISSING_TEXTURE)
            .collect();
        animated.sort_by(|a, b| a.name.cmp(&b.name));
        statics.sort_by(|a, b| a.name.cmp(&b.name));

        let min_rows = animated
            .iter()
            .map(|t| t.frame_count())
            .max()
            .unwrap_or(1)
            .max(1);

        // +1 for the missing-texture tile.
        let static_count = statics.len() as u32 + 1;
        let plan = plan_grid(animated.len() as u32, static_count, min_rows);

        let atlas_px = plan.size as u64 * self.tile_size as u64;
        if atlas_px > self.max_size as u64 {
            return Err(PipelineError::AtlasTooLarge {
                required: atlas_px.min(u32::MAX as u64) as u32,
                max: self.max_size,
            });
        }
        let atlas_px = atlas_px as u32;

        tracing::debug!(
            grid = plan.size,
            min_rows = plan.min_rows,
            animated = animated.len(),
            statics = static_count,
            "atlas grid planned"
        );

        let mut canvas = Canvas::new(atlas_px, self.tile_size);
        let mut tile_uv = BTreeMap::new();
        let mut animated_names = Vec::new();
        let step = 1.0 / plan.size as f32;

        for (i, texture) in animated.iter().enumerate() {
            let cell = Cell {
                column: i as u32,
                row: 0,
            };
            let Some(animation) = texture.animation.as_ref() else {
                continue;
            };

            let rect = match load_texture_from_bytes(&texture.bytes) {
                Ok(sheet) => {
                    for k in 0..animation.frame_count {
                        let frame = sheet
                            .frame(k)
                            .map(|f| f.resized(self.tile_size))
                            .unwrap_or_else(|| TextureData::placeholder(self.tile_size));
                        canvas.draw(&frame, Cell { row: cell.row + k, ..cell });
                    }
                    animated_names.push(texture.name.clone());
                    UvRect {
                        animation: Some(UvAnimation {
                            frame_count: animation.frame_count,
                            frame_v_step: step,
                            frame_duration: animation.frame_duration_ticks,
                            frame_order: animation.custom_frame_order.clone(),
                            interpolate: animation.interpolate,
                        }),
                        ..cell_rect(cell, step)
                    }
                }
                Err(e) => {
                    tracing::warn!(texture = %texture.name, error = %e, "failed to decode animated texture, using placeholder");
                    canvas.draw(&TextureData::placeholder(self.tile_size), cell);
                    cell_rect(cell, step)
                }
            };
            tile_uv.insert(texture.name.clone(), rect);
        }

        let first_static_column = animated.len() as u32;
        let missing_tile = std::iter::once((MISSING_TEXTURE, None));
        let rest = statics.iter().map(|t| (t.name.as_str(), Some(*t)));

        for (j, (name, texture)) in missing_tile.chain(rest).enumerate() {
            let j = j as u32;
            let cell = Cell {
                column: first_static_column + j / plan.size,
                row: j % plan.size,
            };

            let tile = match texture {
                None => TextureData::placeholder(self.tile_size),
                Some(texture) => match load_texture_from_bytes(&texture.bytes) {
                    Ok(data) => {
                        let first = if data.height > data.width {
                            data.frame(0).unwrap_or(data)
                        } else {
                            data
                        };
                        first.resized(self.tile_size)
                    }
                    Err(e) => {
                        tracing::warn!(texture = %name, error = %e, "failed to decode texture, using placeholder");
                        TextureData::placeholder(self.tile_size)
                    }
                },
            };

            canvas.draw(&tile, cell);
            tile_uv.insert(name.to_string(), cell_rect(cell, step));
        }

        animated_names.sort();
        let missing = cell_rect(
            Cell {
                column: first_static_column,
                row: 0,
            },
            step,
        );

        tracing::info!(
            size = atlas_px,
            tiles = tile_uv.len(),
            animated = animated_names.len(),
            "atlas built"
        );

        Ok(TextureAtlas {
            width: atlas_px,
            height: atlas_px,
            tile_size: self.tile_size,
            grid_size: plan.size,
            pixels: canvas.pixels,
            tile_uv,
            animated_names,
            missing,
        })
    }
}

fn cell_rect(cell: Cell, step: f32) -> UvRect {
    UvRect {
        u: cell.column as f32 * step,
        v: cell.row as f32 * step,
        su: step,
        sv: step,
        animation: None,
    }
}

/// RGBA drawing surface for the atlas.
struct Canvas {
    size: u32,
    tile_size: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(size: u32, tile_size: u32) -> Self {
        Self {
            size,
            tile_size,
            pixels: vec![0u8; size as usize * size as usize * 4],
        }
    }

    /// Copy a `tile_size` square into a grid cell, row by row.
    fn draw(&mut self, tile: &TextureData, cell: Cell) {
        let x0 = (cell.column * self.tile_size) as usize;
        let y0 = (cell.row * self.tile_size) as usize;
        let row_bytes = self.tile_size as usize * 4;
        let stride = self.size as usize * 4;

        for row in 0..self.tile_size as usize {
            let src = row * row_bytes;
            let dst = (y0 + row) * stride + x0 * 4;
            if src + row_bytes <= tile.pixels.len() && dst + row_bytes <= self.pixels.len() {
                self.pixels[dst..dst + row_bytes].copy_from_slice(&tile.pixels[src..src + row_bytes]);
            }
        }
    }
}
