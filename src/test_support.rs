//! Fixture builders shared by unit tests.

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;

/// Encode a solid-colour PNG.
pub(crate) fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Encode a vertical sprite sheet whose frame `i` is filled with `colors[i]`.
pub(crate) fn sprite_sheet(size: u32, colors: &[[u8; 4]]) -> Vec<u8> {
    let img = RgbaImage::from_fn(size, size * colors.len() as u32, |_, y| {
        Rgba(colors[(y / size) as usize])
    });
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Write a zip archive with the given `(path, contents)` entries.
/// Paths ending in `/` become directory entries.
pub(crate) fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents).unwrap();
        }
    }
    zip.finish().unwrap();
}
