use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use rfd::FileDialog;
use std::path::PathBuf;

use crate::log_err;

// ============================================================================
// IMAGE IMPORT
// ============================================================================

/// Decode raw file bytes into RGBA pixels. Any format the `image` crate
/// recognizes (PNG, JPEG, WebP, BMP) is accepted.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, String> {
    image::load_from_memory(bytes)
        .map(|img| img.into_rgba8())
        .map_err(|e| format!("Could not decode image: {}", e))
}

/// Load an image from disk (the upload path).
pub fn load_image_from_path(path: &PathBuf) -> Result<RgbaImage, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("Could not read {}: {}", path.display(), e))?;
    decode_image(&bytes)
}

/// Native file dialog for picking an image to place as a layer.
pub fn open_image_dialog() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp"])
        .pick_file()
}

/// Grab an image from the system clipboard, if it holds one.
pub fn clipboard_image() -> Result<RgbaImage, String> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| format!("Clipboard unavailable: {}", e))?;
    let data = clipboard
        .get_image()
        .map_err(|e| format!("No image on clipboard: {}", e))?;
    RgbaImage::from_raw(
        data.width as u32,
        data.height as u32,
        data.bytes.into_owned(),
    )
    .ok_or_else(|| "Clipboard image has inconsistent dimensions".to_string())
}

// ============================================================================
// WIRE FORMAT — PNG + base64
// ============================================================================

/// Encode RGBA pixels as a PNG byte stream.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    encoder
        .write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgba8)
        .map_err(|e| format!("PNG encode failed: {}", e))?;
    Ok(buf)
}

/// PNG-encode and base64-wrap an image for the generation wire format.
pub fn encode_png_base64(img: &RgbaImage) -> Result<String, String> {
    Ok(BASE64.encode(encode_png(img)?))
}

/// Decode a base64 raster (as returned by the generation service) back
/// into pixels. Tolerates an optional `data:image/...;base64,` prefix.
pub fn decode_base64_image(data: &str) -> Result<RgbaImage, String> {
    let payload = match data.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => data,
    };
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| format!("Invalid base64 image: {}", e))?;
    decode_image(&bytes)
}

// ============================================================================
// DATA DIRECTORY
// ============================================================================

/// Per-user application data directory (created on demand).
///
///   Windows:  `%APPDATA%\StageFE`
///   macOS:    `~/Library/Application Support/StageFE`
///   Linux:    `$XDG_DATA_HOME/StageFE` or `~/.local/share/StageFE`
pub fn app_data_dir() -> PathBuf {
    let base = platform_data_dir();
    let dir = base.join("StageFE");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        log_err!("Could not create data dir {:?}: {}", dir, e);
    }
    dir
}

fn platform_data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_base64_round_trip() {
        let mut img = RgbaImage::new(5, 3);
        img.put_pixel(2, 1, Rgba([10, 200, 30, 255]));
        let encoded = encode_png_base64(&img).unwrap();
        let decoded = decode_base64_image(&encoded).unwrap();
        assert_eq!(decoded.dimensions(), (5, 3));
        assert_eq!(decoded.get_pixel(2, 1).0, [10, 200, 30, 255]);
    }

    #[test]
    fn base64_decode_strips_data_url_prefix() {
        let img = RgbaImage::new(2, 2);
        let raw = encode_png_base64(&img).unwrap();
        let with_prefix = format!("data:image/png;base64,{}", raw);
        assert!(decode_base64_image(&with_prefix).is_ok());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(decode_image(&[0, 1, 2, 3]).is_err());
        assert!(decode_base64_image("!!!not-base64!!!").is_err());
    }
}
