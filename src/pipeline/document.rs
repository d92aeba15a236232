//! Document container: a growing multi-page PDF.
//!
//! [`DocumentContainer`] is the narrow surface the assembler needs: append a
//! page, place an image or a line of text on the current page, finalise.
//! [`PdfContainer`] implements it with `pdf-writer`, embedding each image as
//! a `DCTDecode` XObject so the encoder's JPEG bytes go in unchanged.
//!
//! Geometry arrives in millimetres from the top-left (see
//! [`crate::pipeline::layout`]); conversion to PDF user space happens here.

use crate::error::BundleError;
use crate::pipeline::layout::{PageSize, Rect};
use pdf_writer::{Content, Filter, Name, Pdf, Rect as PdfRect, Ref, Str};
use std::mem;
use tracing::{debug, info, warn};

const PT_PER_MM: f64 = 72.0 / 25.4;

const FONT_NAME: Name<'static> = Name(b"F1");

/// Text size for in-document markers, in points.
pub const MARKER_FONT_SIZE: f32 = 12.0;

/// Page-oriented document writer used by the assembler.
///
/// A fresh container already holds one empty page.
pub trait DocumentContainer: Send {
    /// Append a page and make it current.
    fn add_page(&mut self);

    /// Draw JPEG bytes of `pixel_width × pixel_height` into `rect` on the
    /// current page.
    fn place_image(&mut self, jpeg: &[u8], pixel_width: u32, pixel_height: u32, rect: Rect);

    /// Draw one line of text with its baseline-left corner at `(x, y)`.
    fn place_text(&mut self, text: &str, x: f64, y: f64);

    /// Serialise the document. The container cannot be reused afterwards.
    fn finish(&mut self) -> Result<Vec<u8>, BundleError>;
}

struct PageBuf {
    id: Ref,
    content: Content,
    images: Vec<(String, Ref)>,
}

/// [`DocumentContainer`] backed by `pdf-writer`.
pub struct PdfContainer {
    pdf: Pdf,
    next_ref: Ref,
    page_tree: Ref,
    font: Ref,
    page_size: PageSize,
    pages: Vec<Ref>,
    current: Option<PageBuf>,
    image_count: usize,
    finished: bool,
}

impl PdfContainer {
    /// Start a document whose pages are all `page_size` (millimetres).
    pub fn new(page_size: PageSize) -> Self {
        let mut next_ref = Ref::new(1);
        let catalog = next_ref.bump();
        let page_tree = next_ref.bump();
        let font = next_ref.bump();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog).pages(page_tree);
        pdf.type1_font(font).base_font(Name(b"Helvetica"));

        let mut container = Self {
            pdf,
            next_ref,
            page_tree,
            font,
            page_size,
            pages: Vec::new(),
            current: None,
            image_count: 0,
            finished: false,
        };
        container.add_page();
        container
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn height_pt(&self) -> f64 {
        self.page_size.height * PT_PER_MM
    }

    fn flush_page(&mut self) {
        let Some(buf) = self.current.take() else {
            return;
        };
        let content_id = self.next_ref.bump();
        let data = buf.content.finish();
        self.pdf.stream(content_id, &data);

        let mut page = self.pdf.page(buf.id);
        page.media_box(PdfRect::new(
            0.0,
            0.0,
            (self.page_size.width * PT_PER_MM) as f32,
            (self.page_size.height * PT_PER_MM) as f32,
        ));
        page.parent(self.page_tree);
        page.contents(content_id);

        let mut resources = page.resources();
        resources.fonts().pair(FONT_NAME, self.font);
        if !buf.images.is_empty() {
            let mut x_objects = resources.x_objects();
            for (name, id) in &buf.images {
                x_objects.pair(Name(name.as_bytes()), *id);
            }
        }
    }
}

impl DocumentContainer for PdfContainer {
    fn add_page(&mut self) {
        self.flush_page();
        let id = self.next_ref.bump();
        self.pages.push(id);
        self.current = Some(PageBuf {
            id,
            content: Content::new(),
            images: Vec::new(),
        });
        debug!("PDF: page {} started", self.pages.len());
    }

    fn place_image(&mut self, jpeg: &[u8], pixel_width: u32, pixel_height: u32, rect: Rect) {
        if self.current.is_none() {
            warn!("PDF: image placed after finalisation, ignored");
            return;
        }
        let id = self.next_ref.bump();
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);

        let mut image = self.pdf.image_xobject(id, jpeg);
        image.filter(Filter::DctDecode);
        image.width(pixel_width as i32);
        image.height(pixel_height as i32);
        image.color_space().device_rgb();
        image.bits_per_component(8);
        drop(image);

        let height_pt = self.height_pt();
        let w = rect.width * PT_PER_MM;
        let h = rect.height * PT_PER_MM;
        let x = rect.x * PT_PER_MM;
        let y = height_pt - rect.y * PT_PER_MM - h;

        if let Some(page) = self.current.as_mut() {
            page.content.save_state();
            page.content
                .transform([w as f32, 0.0, 0.0, h as f32, x as f32, y as f32]);
            page.content.x_object(Name(name.as_bytes()));
            page.content.restore_state();
            page.images.push((name, id));
        }
    }

    fn place_text(&mut self, text: &str, x: f64, y: f64) {
        let bytes = winansi_lossy(text);
        let height_pt = self.height_pt();
        let Some(page) = self.current.as_mut() else {
            warn!("PDF: text placed after finalisation, ignored");
            return;
        };
        page.content.begin_text();
        page.content.set_font(FONT_NAME, MARKER_FONT_SIZE);
        page.content.set_fill_rgb(0.8, 0.0, 0.0);
        page.content
            .next_line((x * PT_PER_MM) as f32, (height_pt - y * PT_PER_MM) as f32);
        page.content.show(Str(&bytes));
        page.content.end_text();
    }

    fn finish(&mut self) -> Result<Vec<u8>, BundleError> {
        if self.finished {
            return Err(BundleError::Container {
                container: "document",
                detail: "document was already finalised".into(),
            });
        }
        self.flush_page();
        self.finished = true;

        if self.pages.is_empty() {
            return Err(BundleError::Container {
                container: "document",
                detail: "document has no pages".into(),
            });
        }

        self.pdf
            .pages(self.page_tree)
            .kids(self.pages.iter().copied())
            .count(self.pages.len() as i32);

        let bytes = mem::replace(&mut self.pdf, Pdf::new()).finish();
        info!(
            "PDF finalised: {} pages, {} images, {} bytes",
            self.pages.len(),
            self.image_count,
            bytes.len()
        );
        Ok(bytes)
    }
}

/// Helvetica's built-in encoding covers printable ASCII; anything else is
/// replaced with `?`.
fn winansi_lossy(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::layout::REFERENCE_PAGE;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn fresh_container_has_one_page() {
        let mut c = PdfContainer::new(REFERENCE_PAGE);
        assert_eq!(c.page_count(), 1);
        let bytes = c.finish().expect("finish");
        assert!(bytes.starts_with(b"%PDF"));
        assert!(contains(&bytes, b"/Count 1"));
    }

    #[test]
    fn pages_and_text_are_written() {
        let mut c = PdfContainer::new(REFERENCE_PAGE);
        c.place_text("Error loading image: broken.png", 10.0, 20.0);
        c.add_page();
        c.add_page();
        let bytes = c.finish().expect("finish");
        assert!(contains(&bytes, b"/Count 3"));
        assert!(contains(&bytes, b"Error loading image: broken.png"));
        assert!(contains(&bytes, b"/Helvetica"));
    }

    #[test]
    fn image_is_embedded_as_dct() {
        let jpeg = {
            let raster = crate::pipeline::raster::Raster {
                pixels: image::RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30])),
            };
            crate::pipeline::encode::encode_jpeg(&raster, 90, "x").unwrap()
        };
        let mut c = PdfContainer::new(REFERENCE_PAGE);
        c.place_image(
            &jpeg,
            4,
            3,
            Rect {
                x: 0.0,
                y: 0.0,
                width: 210.0,
                height: 157.5,
            },
        );
        let bytes = c.finish().expect("finish");
        assert!(contains(&bytes, b"/DCTDecode"));
        assert!(contains(&bytes, b"/Im1"));
    }

    #[test]
    fn second_finish_is_container_error() {
        let mut c = PdfContainer::new(REFERENCE_PAGE);
        c.finish().unwrap();
        assert!(matches!(
            c.finish(),
            Err(BundleError::Container {
                container: "document",
                ..
            })
        ));
    }

    #[test]
    fn non_ascii_text_is_replaced() {
        assert_eq!(winansi_lossy("café.png"), b"caf?.png".to_vec());
    }
}
