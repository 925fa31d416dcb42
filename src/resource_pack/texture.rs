//! Texture entries and animation metadata.

use serde::{Deserialize, Serialize};

/// Animation block of a `.png.mcmeta` sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationMeta {
    /// Ticks each frame is shown for.
    pub frametime: u32,
    /// Blend between adjacent frames.
    pub interpolate: bool,
    /// Explicit frame sequence, if the sheet is not played top to bottom.
    pub frames: Option<Vec<AnimationFrame>>,
}

/// One step of a custom frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationFrame {
    /// Row of the sprite sheet to show.
    pub index: u32,
    /// Per-frame override of `frametime`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u32>,
}

#[derive(Deserialize)]
struct RawMcmeta {
    animation: Option<RawAnimation>,
}

#[derive(Deserialize)]
struct RawAnimation {
    #[serde(default = "default_frametime")]
    frametime: u32,
    #[serde(default)]
    interpolate: bool,
    #[serde(default)]
    frames: Option<Vec<RawFrame>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrame {
    Index(u32),
    Timed { index: u32, time: Option<u32> },
}

fn default_frametime() -> u32 {
    1
}

/// Parse a `.png.mcmeta` document.
///
/// Returns `Ok(None)` when the sidecar has no `animation` section.
pub fn parse_mcmeta(contents: &str) -> Result<Option<AnimationMeta>, serde_json::Error> {
    let raw: RawMcmeta = serde_json::from_str(contents)?;
    Ok(raw.animation.map(|anim| AnimationMeta {
        frametime: anim.frametime.max(1),
        interpolate: anim.interpolate,
        frames: anim.frames.map(|frames| {
            frames
                .into_iter()
                .map(|frame| match frame {
                    RawFrame::Index(index) => AnimationFrame { index, time: None },
                    RawFrame::Timed { index, time } => AnimationFrame { index, time },
                })
                .collect()
        }),
    }))
}

/// Resolved animation of an extracted texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureAnimation {
    pub frame_duration_ticks: u32,
    /// Always at least 2; single-frame sheets carry no animation.
    pub frame_count: u32,
    pub frame_height: u32,
    pub custom_frame_order: Option<Vec<AnimationFrame>>,
    pub interpolate: bool,
}

impl TextureAnimation {
    /// Combine sidecar metadata with the sheet's dimensions.
    ///
    /// Frames are assumed square, so `frame_count = height / width`.
    /// Returns `None` for sheets with a single frame.
    pub fn from_meta(meta: AnimationMeta, width: u32, height: u32) -> Option<Self> {
        if width == 0 {
            return None;
        }
        let frame_count = height / width;
        if frame_count <= 1 {
            return None;
        }

        let custom_frame_order = meta.frames.and_then(|frames| {
            let valid: Vec<_> = frames
                .into_iter()
                .filter(|frame| frame.index < frame_count)
                .collect();
            let sequential = valid.len() == frame_count as usize
                && valid
                    .iter()
                    .enumerate()
                    .all(|(i, frame)| frame.index == i as u32 && frame.time.is_none());
            if valid.is_empty() || sequential {
                None
            } else {
                Some(valid)
            }
        });

        Some(Self {
            frame_duration_ticks: meta.frametime,
            frame_count,
            frame_height: width,
            custom_frame_order,
            interpolate: meta.interpolate,
        })
    }
}

/// A texture pulled out of the client archive.
#[derive(Debug, Clone)]
pub struct ExtractedTexture {
    /// Atlas key, e.g. `block/stone`.
    pub name: String,
    /// Entry path inside the archive.
    pub source_path: String,
    /// Encoded PNG bytes.
    pub bytes: Vec<u8>,
    pub animation: Option<TextureAnimation>,
}

impl ExtractedTexture {
    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }

    pub fn frame_count(&self) -> u32 {
        self.animation.as_ref().map(|a| a.frame_count).unwrap_or(1)
    }
}

/// Decoded RGBA texture data.
#[derive(Debug, Clone)]
pub struct TextureData {
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
    /// RGBA8 pixel data (4 bytes per pixel).
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Create a new texture from RGBA data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a placeholder texture (magenta/black checkerboard).
    pub fn placeholder(size: u32) -> Self {
        let mut pixels = vec![0u8; (size * size * 4) as usize];
        let cell = (size / 8).max(1);

        for y in 0..size {
            for x in 0..size {
                let idx = ((y * size + x) * 4) as usize;
                let is_magenta = ((x / cell) + (y / cell)) % 2 == 0;
                let color = if is_magenta {
                    [255, 0, 255, 255]
                } else {
                    [0, 0, 0, 255]
                };
                pixels[idx..idx + 4].copy_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    /// Get a pixel at (x, y).
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Cut frame `index` out of a vertical sprite sheet of square frames.
    pub fn frame(&self, index: u32) -> Option<TextureData> {
        let frame_height = self.width;
        let start = index.checked_mul(frame_height)?;
        if start + frame_height > self.height {
            return None;
        }
        let row_bytes = (self.width * 4) as usize;
        let begin = start as usize * row_bytes;
        let end = begin + frame_height as usize * row_bytes;
        Some(Self::new(self.width, frame_height, self.pixels[begin..end].to_vec()))
    }

    /// Nearest-neighbour resample to a square of `size` pixels.
    pub fn resized(&self, size: u32) -> TextureData {
        if self.width == size && self.height == size {
            return self.clone();
        }
        match image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone()) {
            Some(img) => {
                let scaled =
                    image::imageops::resize(&img, size, size, image::imageops::FilterType::Nearest);
                Self::new(size, size, scaled.into_raw())
            }
            None => Self::placeholder(size),
        }
    }
}

/// Decode PNG bytes into RGBA.
pub fn load_texture_from_bytes(data: &[u8]) -> Result<TextureData, image::ImageError> {
    let img = image::load_from_memory(data)?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(TextureData::new(width, height, rgba.into_raw()))
}

/// Read only the image header to get `(width, height)`.
pub fn image_dimensions(data: &[u8]) -> Result<(u32, u32), image::ImageError> {
    image::ImageReader::new(std::io::Cursor::new(data))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_dimensions()
}
