//! Finds the most prominent text blob in a captured frame.
//!
//! Best-effort heuristic, used only to position the pointer as visual
//! feedback. Nothing downstream depends on the result.

use image::RgbaImage;
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::edges::canny;
use tracing::debug;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// Pixel coordinate marking the likely text location in a captured frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerHint {
    pub x: i32,
    pub y: i32,
}

/// Picks the external contour with the largest enclosed area in the edge
/// map and returns the center of its bounding rectangle. `None` when the
/// frame produces no contours at all.
pub fn locate_text(img: &RgbaImage) -> Option<PointerHint> {
    let gray = image::imageops::grayscale(img);
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
    let contours = find_contours::<i32>(&edges);

    let mut best: Option<(&Contour<i32>, f64)> = None;
    for contour in contours.iter().filter(|c| c.border_type == BorderType::Outer) {
        let area = contour_area(contour);
        // Strictly greater keeps the first contour among equal areas
        if best.map_or(true, |(_, largest)| area > largest) {
            best = Some((contour, area));
        }
    }

    let (contour, area) = best?;
    let (min_x, min_y, max_x, max_y) = bounding_rect(contour)?;
    let hint = PointerHint {
        x: (min_x + max_x) / 2,
        y: (min_y + max_y) / 2,
    };
    debug!(
        "largest contour covers {:.0} px^2, hint at ({}, {})",
        area, hint.x, hint.y
    );
    Some(hint)
}

/// Shoelace formula over the contour's boundary points.
fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0i64;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        sum += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    sum.abs() as f64 / 2.0
}

fn bounding_rect(contour: &Contour<i32>) -> Option<(i32, i32, i32, i32)> {
    let first = contour.points.first()?;
    let mut rect = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        rect.0 = rect.0.min(p.x);
        rect.1 = rect.1.min(p.y);
        rect.2 = rect.2.max(p.x);
        rect.3 = rect.3.max(p.y);
    }
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn blank(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))
    }

    fn fill_block(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
    }

    #[test]
    fn blank_image_has_no_hint() {
        assert_eq!(locate_text(&blank(120, 80)), None);
    }

    #[test]
    fn single_block_hint_is_near_its_center() {
        let mut img = blank(200, 160);
        fill_block(&mut img, 60, 40, 140, 100);

        let hint = locate_text(&img).expect("no hint for a solid block");
        assert!((hint.x - 100).abs() <= 3, "x off center: {}", hint.x);
        assert!((hint.y - 70).abs() <= 3, "y off center: {}", hint.y);
    }

    #[test]
    fn prefers_the_larger_of_two_blocks() {
        let mut img = blank(300, 200);
        fill_block(&mut img, 10, 10, 40, 30);
        fill_block(&mut img, 120, 60, 280, 180);

        let hint = locate_text(&img).expect("no hint with two blocks");
        assert!((hint.x - 200).abs() <= 3, "x off center: {}", hint.x);
        assert!((hint.y - 120).abs() <= 3, "y off center: {}", hint.y);
    }

    #[test]
    fn degenerate_contours_have_zero_area() {
        let contour = Contour::new(
            vec![imageproc::point::Point::new(5, 5)],
            BorderType::Outer,
            None,
        );
        assert_eq!(contour_area(&contour), 0.0);
    }
}
