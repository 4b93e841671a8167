//! Page image → base64 PNG wrapped in `ImageData`.
//!
//! Every supported backend (OpenAI, Azure, Anthropic, Gemini, Vertex AI)
//! takes images as base64 payloads inside the JSON request body, so one
//! encoding serves them all.

use crate::error::EngineError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page for a multimodal chat message.
///
/// ## Why PNG?
/// Rendered glyphs have hard edges. JPEG blurs them into ringing artefacts
/// that vision models misread as punctuation or diacritics; PNG keeps them
/// exact at the cost of a larger payload.
///
/// ## Why `detail: "high"`?
/// Tiling models (GPT-4o family) otherwise see a single downscaled overview
/// and lose footnotes, table cells and sub/superscripts.
pub fn encode_page(page_num: usize, img: &DynamicImage) -> Result<ImageData, EngineError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| EngineError::with_source(format!("PNG encoding failed for page {page_num}"), e))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Page {}: {} bytes PNG → {} bytes base64", page_num, buf.len(), b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn encodes_page_as_base64_png() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 12, Rgb([250, 250, 250])));
        let data = encode_page(1, &img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(b"\x89PNG"), "PNG signature expected");
    }
}
