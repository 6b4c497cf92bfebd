use eframe::egui::{Color32, Painter, Pos2, Rect, Shape, Stroke, Vec2, vec2};

use labnote::mindmap::NodeShape;

const FALLBACK_COLOR: Color32 = Color32::from_rgb(138, 148, 166);

/// Parses `#rrggbb`; anything else gets a neutral grey.
pub(super) fn parse_hex_color(text: &str) -> Color32 {
    let hex = text.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return FALLBACK_COLOR;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => Color32::from_rgb(r, g, b),
        _ => FALLBACK_COLOR,
    }
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(24, 27, 33));

    let step = (48.0 * zoom.clamp(0.5, 2.0)).max(16.0);
    let origin = rect.center() + pan;
    let dot = Color32::from_rgba_unmultiplied(90, 100, 115, 90);

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
        while y < rect.bottom() {
            painter.circle_filled(Pos2::new(x, y), 1.0, dot);
            y += step;
        }
        x += step;
    }
}

pub(super) fn segment_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    Rect::from_two_pos(start, end)
        .expand(padding)
        .intersects(rect)
}

/// Straight or dashed line with an optional arrow head at `end`.
pub(super) fn draw_link(
    painter: &Painter,
    start: Pos2,
    end: Pos2,
    stroke: Stroke,
    dash: Option<(f32, f32)>,
    arrow: bool,
) {
    match dash {
        Some((dash, gap)) if dash > 0.0 && gap >= 0.0 => {
            painter.extend(Shape::dashed_line(&[start, end], stroke, dash, gap));
        }
        _ => {
            painter.line_segment([start, end], stroke);
        }
    }

    if arrow {
        let direction = (end - start).normalized();
        if direction.is_finite() && direction != Vec2::ZERO {
            let size = 6.0 + stroke.width * 2.0;
            let normal = vec2(-direction.y, direction.x);
            let back = end - direction * size;
            painter.add(Shape::convex_polygon(
                vec![end, back + normal * size * 0.5, back - normal * size * 0.5],
                stroke.color,
                Stroke::NONE,
            ));
        }
    }
}

/// Point where the segment from the centre of `rect` toward `toward`
/// leaves the rectangle; used to stop links at node borders.
pub(super) fn border_point(rect: Rect, toward: Pos2) -> Pos2 {
    let center = rect.center();
    let delta = toward - center;
    if delta.x.abs() < f32::EPSILON && delta.y.abs() < f32::EPSILON {
        return center;
    }
    let half = rect.size() * 0.5;
    let scale_x = if delta.x.abs() > f32::EPSILON {
        half.x / delta.x.abs()
    } else {
        f32::INFINITY
    };
    let scale_y = if delta.y.abs() > f32::EPSILON {
        half.y / delta.y.abs()
    } else {
        f32::INFINITY
    };
    center + delta * scale_x.min(scale_y).min(1.0)
}

pub(super) fn draw_node_shape(
    painter: &Painter,
    rect: Rect,
    shape: NodeShape,
    fill: Color32,
    stroke: Stroke,
) {
    match shape {
        NodeShape::Rectangle => {
            painter.rect(rect, 0.0, fill, stroke, eframe::egui::StrokeKind::Inside);
        }
        NodeShape::Rounded => {
            let radius = (rect.height() * 0.3).min(12.0);
            painter.rect(rect, radius, fill, stroke, eframe::egui::StrokeKind::Inside);
        }
        NodeShape::Ellipse => {
            painter.add(Shape::ellipse_filled(rect.center(), rect.size() * 0.5, fill));
            painter.add(Shape::ellipse_stroke(rect.center(), rect.size() * 0.5, stroke));
        }
        NodeShape::Diamond => {
            let c = rect.center();
            let points = vec![
                Pos2::new(c.x, rect.top()),
                Pos2::new(rect.right(), c.y),
                Pos2::new(c.x, rect.bottom()),
                Pos2::new(rect.left(), c.y),
            ];
            painter.add(Shape::convex_polygon(points, fill, stroke));
        }
    }
}
