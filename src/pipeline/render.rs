//! PDF rasterisation of the selected pages via pdfium.
//!
//! `pdfium-render` wraps a C++ library with thread-local state, so all work
//! happens on the blocking pool.
//!
//! ## Sizing
//!
//! The longest edge of each page image is capped by `max_rendered_pixels`
//! instead of rendering at a fixed DPI. A fixed DPI turns an A0 poster into
//! a 30-megapixel image that providers reject or silently downscale; a fixed
//! edge keeps Letter/A4 pages near 150 DPI, enough for body text and
//! footnotes, and keeps request sizes predictable.

use crate::config::{EngineSettings, PageSelection};
use crate::error::EngineError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable pointing at an existing libpdfium shared library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Rendered pages of one document.
pub struct RenderedPages {
    /// Page count of the whole document.
    pub total_pages: usize,
    /// `(page_index_0based, image)` in ascending page order.
    pub images: Vec<(usize, DynamicImage)>,
}

/// Open `pdf_path` and rasterise the pages picked by `selection`.
pub async fn render_pages(
    pdf_path: &Path,
    selection: &PageSelection,
    settings: &EngineSettings,
) -> Result<RenderedPages, EngineError> {
    let path = pdf_path.to_path_buf();
    let selection = selection.clone();
    let max_pixels = settings.max_rendered_pixels;
    let password = settings.password.clone();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, &selection, max_pixels, password.as_deref())
    })
    .await
    .map_err(|e| EngineError::new(format!("Render task panicked: {e}")))?
}

/// Bind to libpdfium: `PDFIUM_LIB_PATH` first, then the system library.
fn bind_pdfium() -> Result<Pdfium, EngineError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| {
        EngineError::new(format!(
            "Failed to bind to pdfium library: {e:?}\n\
             Install libpdfium or set {PDFIUM_LIB_PATH_ENV}=/path/to/libpdfium."
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

fn render_pages_blocking(
    pdf_path: &Path,
    selection: &PageSelection,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<RenderedPages, EngineError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        EngineError::new(format!(
            "Failed to open PDF '{}': {e:?}",
            pdf_path.display()
        ))
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let indices = selection.to_indices(total_pages);
    info!(
        "PDF loaded: {} pages, {} selected",
        total_pages,
        indices.len()
    );

    if indices.is_empty() {
        return Err(EngineError::new(format!(
            "None of the selected pages exist (document has {total_pages} pages)"
        )));
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(indices.len());
    for idx in indices {
        let page = pages.get(idx as u16).map_err(|e| {
            EngineError::new(format!("Failed to load page {}: {e:?}", idx + 1))
        })?;
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            EngineError::new(format!("Rasterisation failed for page {}: {e:?}", idx + 1))
        })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push((idx, image));
    }

    Ok(RenderedPages {
        total_pages,
        images,
    })
}
