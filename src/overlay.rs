// src/overlay.rs - Draws the tracked hand onto the frame
use image::{DynamicImage, Rgba, RgbaImage};

use crate::landmarks::{LandmarkSet, HAND_CONNECTIONS};

const BONE_COLOR: Rgba<u8> = Rgba([70, 130, 240, 255]);
const JOINT_COLOR: Rgba<u8> = Rgba([76, 175, 80, 255]);
const JOINT_OUTLINE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const JOINT_RADIUS: f64 = 4.0;

/// Returns a copy of `frame` with the hand skeleton drawn on it,
/// connections first, then joints.
pub fn annotate(frame: &DynamicImage, hand: &LandmarkSet) -> DynamicImage {
    let mut canvas = frame.to_rgba8();
    draw_hand(&mut canvas, hand);
    DynamicImage::ImageRgba8(canvas)
}

pub fn draw_hand(canvas: &mut RgbaImage, hand: &LandmarkSet) {
    let (w, h) = (canvas.width() as f64, canvas.height() as f64);
    let to_pixel = |i: usize| {
        let p = hand.points()[i];
        (p.x * w, p.y * h)
    };

    for (from, to) in HAND_CONNECTIONS {
        if let Some((from, to)) = clip_to_canvas(to_pixel(from), to_pixel(to), w, h) {
            draw_line(canvas, from, to, BONE_COLOR);
        }
    }

    for i in 0..hand.points().len() {
        let center = to_pixel(i);
        if !on_canvas(center, w, h, JOINT_RADIUS) {
            continue;
        }
        draw_disc(canvas, center, JOINT_RADIUS, JOINT_OUTLINE);
        draw_disc(canvas, center, JOINT_RADIUS - 1.0, JOINT_COLOR);
    }
}

fn on_canvas(p: (f64, f64), w: f64, h: f64, margin: f64) -> bool {
    p.0.is_finite()
        && p.1.is_finite()
        && (-margin..=w + margin).contains(&p.0)
        && (-margin..=h + margin).contains(&p.1)
}

/// Liang-Barsky clip of a segment to the canvas plus a one pixel margin.
/// Detector coordinates are unbounded, so line length must not depend on
/// them.
fn clip_to_canvas(
    from: (f64, f64),
    to: (f64, f64),
    w: f64,
    h: f64,
) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    if ![from.0, from.1, dx, dy].iter().all(|v| v.is_finite()) {
        return None;
    }

    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let edges = [
        (-dx, from.0 + 1.0),
        (dx, w + 1.0 - from.0),
        (-dy, from.1 + 1.0),
        (dy, h + 1.0 - from.1),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    Some((
        (from.0 + t0 * dx, from.1 + t0 * dy),
        (from.0 + t1 * dx, from.1 + t1 * dy),
    ))
}

fn put(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_line(canvas: &mut RgbaImage, from: (f64, f64), to: (f64, f64), color: Rgba<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i64;
    for s in 0..=steps {
        let t = s as f64 / steps as f64;
        let x = (from.0 + dx * t).round() as i64;
        let y = (from.1 + dy * t).round() as i64;
        // two pixels wide
        put(canvas, x, y, color);
        put(canvas, x + 1, y, color);
    }
}

fn draw_disc(canvas: &mut RgbaImage, center: (f64, f64), radius: f64, color: Rgba<u8>) {
    let r = radius.ceil() as i64;
    let (cx, cy) = (center.0.round() as i64, center.1.round() as i64);
    for y in -r..=r {
        for x in -r..=r {
            if ((x * x + y * y) as f64) <= radius * radius {
                put(canvas, cx + x, cy + y, color);
            }
        }
    }
}
