//! Page geometry for document assembly.
//!
//! All values are in millimetres with the origin at the page's top-left
//! corner and y growing downward. The PDF container converts to points and
//! flips the y axis when it writes the page.

use crate::config::{DocumentOptions, Margin, Orientation};

/// ISO A4, portrait.
pub const REFERENCE_PAGE: PageSize = PageSize {
    width: 210.0,
    height: 297.0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Reference page paired for `orientation`.
pub fn page_size(orientation: Orientation) -> PageSize {
    match orientation {
        Orientation::Portrait => REFERENCE_PAGE,
        Orientation::Landscape => PageSize {
            width: REFERENCE_PAGE.height,
            height: REFERENCE_PAGE.width,
        },
    }
}

/// Page area left after insetting every edge by the margin.
pub fn content_box(page: PageSize, margin: Margin) -> Rect {
    let inset = margin.inset_mm();
    Rect {
        x: inset,
        y: inset,
        width: page.width - 2.0 * inset,
        height: page.height - 2.0 * inset,
    }
}

/// Largest `(width, height)` with the image's aspect ratio that fits in
/// `box_width × box_height`.
pub fn fit_inside(image_width: f64, image_height: f64, box_width: f64, box_height: f64) -> (f64, f64) {
    let aspect = image_width / image_height;
    let mut width = box_width;
    let mut height = box_width / aspect;
    if height > box_height {
        height = box_height;
        width = box_height * aspect;
    }
    (width, height)
}

/// Fit an image into `content` and centre it there.
pub fn place_in(content: Rect, image_width: u32, image_height: u32) -> Rect {
    let (width, height) = fit_inside(
        f64::from(image_width),
        f64::from(image_height),
        content.width,
        content.height,
    );
    Rect {
        x: content.x + (content.width - width) / 2.0,
        y: content.y + (content.height - height) / 2.0,
        width,
        height,
    }
}

/// Where an `image_width × image_height` image lands on a page generated
/// with `options`.
pub fn image_rect(options: &DocumentOptions, image_width: u32, image_height: u32) -> Rect {
    let content = content_box(page_size(options.orientation), options.margin);
    place_in(content, image_width, image_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn four_by_three_in_square_box() {
        let content = Rect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let r = place_in(content, 400, 300);
        assert!(approx(r.width, 100.0));
        assert!(approx(r.height, 75.0));
        assert!(approx(r.x, 0.0));
        assert!(approx(r.y, 12.5));
    }

    #[test]
    fn tall_image_is_height_bound() {
        let (w, h) = fit_inside(1.0, 4.0, 100.0, 100.0);
        assert!(approx(h, 100.0));
        assert!(approx(w, 25.0));
    }

    #[test]
    fn fit_never_exceeds_either_bound() {
        for (iw, ih) in [(1.0, 1.0), (3.0, 1.0), (1.0, 3.0), (16.0, 9.0), (9.0, 16.0)] {
            for (bw, bh) in [(190.0, 277.0), (277.0, 190.0), (50.0, 50.0)] {
                let (w, h) = fit_inside(iw, ih, bw, bh);
                assert!(w <= bw + EPS && h <= bh + EPS);
                assert!(approx(w, bw) || approx(h, bh), "not maximal: {w}x{h} in {bw}x{bh}");
                assert!(approx(w / h, iw / ih));
            }
        }
    }

    #[test]
    fn no_margin_content_is_full_page() {
        let page = page_size(Orientation::Portrait);
        let c = content_box(page, Margin::None);
        assert_eq!((c.x, c.y, c.width, c.height), (0.0, 0.0, 210.0, 297.0));
    }

    #[test]
    fn small_margin_shrinks_both_dimensions_twice() {
        let page = page_size(Orientation::Portrait);
        let c = content_box(page, Margin::Small);
        let inset = Margin::Small.inset_mm();
        assert!(approx(c.width, page.width - 2.0 * inset));
        assert!(approx(c.height, page.height - 2.0 * inset));
        assert!(approx(c.x, inset) && approx(c.y, inset));
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let p = page_size(Orientation::Portrait);
        let l = page_size(Orientation::Landscape);
        assert_eq!((l.width, l.height), (p.height, p.width));
    }

    #[test]
    fn square_image_centred_on_portrait_page_with_big_margin() {
        let options = DocumentOptions {
            margin: Margin::Big,
            orientation: Orientation::Portrait,
        };
        let r = image_rect(&options, 500, 500);
        assert!(approx(r.width, 170.0));
        assert!(approx(r.height, 170.0));
        assert!(approx(r.x, 20.0));
        assert!(approx(r.y, 20.0 + (257.0 - 170.0) / 2.0));
    }
}
