//! Drawing of the mouth outline on camera frames.

use image::{Rgb, RgbImage};

use crate::vision::types::{Frame, Point};

pub const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

fn cross(origin: &Point, a: &Point, b: &Point) -> f32 {
    (a.x - origin.x) * (b.y - origin.y) - (a.y - origin.y) * (b.x - origin.x)
}

/// Convex hull (Andrew's monotone chain), counter-clockwise, without repeating the first point.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted: Vec<Point> = points.iter().copied().filter(|p| p.x.is_finite() && p.y.is_finite()).collect();
    sorted.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(sorted.len() * 2);

    for point in sorted.iter() {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], point) <= 0.0 {
            hull.pop();
        }
        hull.push(*point);
    }

    let lower_len = hull.len() + 1;
    for point in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], point) <= 0.0 {
            hull.pop();
        }
        hull.push(*point);
    }

    hull.pop();
    hull
}

fn put_pixel(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u64) < image.width() as u64 && (y as u64) < image.height() as u64 {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line, clipped to the image.
pub fn draw_line(image: &mut RgbImage, from: &Point, to: &Point, color: Rgb<u8>) {
    let (mut x0, mut y0) = (from.x.round() as i64, from.y.round() as i64);
    let (x1, y1) = (to.x.round() as i64, to.y.round() as i64);

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel(image, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Outlines the convex hull of `points`.
pub fn draw_outline(image: &mut RgbImage, points: &[Point], color: Rgb<u8>) {
    let hull = convex_hull(points);

    match hull.len() {
        0 => {},
        1 => draw_line(image, &hull[0], &hull[0], color),
        _ => {
            for (index, point) in hull.iter().enumerate() {
                let next = &hull[(index + 1) % hull.len()];
                draw_line(image, point, next, color);
            }
        },
    }
}

pub fn to_frame(image: &RgbImage) -> Frame {
    let mut rgba = Vec::with_capacity(image.as_raw().len() / 3 * 4);
    for pixel in image.pixels() {
        rgba.extend_from_slice(&[pixel[0], pixel[1], pixel[2], 255]);
    }

    Frame {
        width: image.width(),
        height: image.height(),
        rgba,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_points_are_not_on_the_hull() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(5.0, 0.0),
        ];

        let hull = convex_hull(&points);

        assert_eq!(hull, vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
    }

    #[test]
    fn outline_is_drawn_inside_the_image_only() {
        let mut image = RgbImage::new(20, 20);
        let points = [Point::new(2.0, 2.0), Point::new(30.0, 2.0), Point::new(2.0, 12.0)];

        draw_outline(&mut image, &points, OUTLINE_COLOR);

        assert_eq!(*image.get_pixel(2, 2), OUTLINE_COLOR);
        assert_eq!(*image.get_pixel(19, 2), OUTLINE_COLOR);
        assert_eq!(*image.get_pixel(2, 12), OUTLINE_COLOR);
        assert_eq!(*image.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn frames_are_opaque_rgba() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(1, 0, Rgb([1, 2, 3]));

        let frame = to_frame(&image);

        assert_eq!((frame.width, frame.height), (2, 1));
        assert_eq!(frame.rgba, vec![0, 0, 0, 255, 1, 2, 3, 255]);
    }
}
