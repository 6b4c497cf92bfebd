use eframe::egui::{Pos2, Rect, Vec2, vec2};

use crate::mindmap::MapViewport;

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 4.0;
pub const DEFAULT_ZOOM: f32 = 1.0;
const ZOOM_STEP: f32 = 1.2;
const FIT_MARGIN: f32 = 40.0;

/// Camera over the layout. World point `w` is drawn at
/// `screen_center + pan + w * zoom`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub zoom: f32,
    pub pan: Vec2,
    /// Size of the area the map is drawn into.
    pub screen: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            pan: Vec2::ZERO,
            screen: vec2(1280.0, 800.0),
        }
    }
}

impl Viewport {
    pub fn from_saved(saved: MapViewport) -> Self {
        let zoom = if saved.zoom.is_finite() {
            saved.zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            DEFAULT_ZOOM
        };
        let pan = vec2(saved.pan_x, saved.pan_y);
        Self {
            zoom,
            pan: if pan.is_finite() { pan } else { Vec2::ZERO },
            ..Self::default()
        }
    }

    pub fn to_saved(self) -> MapViewport {
        MapViewport {
            zoom: self.zoom,
            pan_x: self.pan.x,
            pan_y: self.pan.y,
        }
    }

    pub fn world_to_screen(&self, rect: Rect, world: Vec2) -> Pos2 {
        rect.center() + self.pan + world * self.zoom
    }

    pub fn screen_to_world(&self, rect: Rect, screen: Pos2) -> Vec2 {
        (screen - rect.center() - self.pan) / self.zoom
    }

    /// Zooms by `factor` keeping the world point under `anchor` fixed.
    /// `anchor` is relative to the screen centre.
    pub fn zoom_about(&mut self, anchor: Vec2, factor: f32) {
        let world = (anchor - self.pan) / self.zoom;
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = anchor - world * self.zoom;
    }

    pub fn zoom_at(&mut self, rect: Rect, pointer: Pos2, factor: f32) {
        self.zoom_about(pointer - rect.center(), factor);
    }

    pub fn zoom_in(&mut self) {
        self.zoom_about(Vec2::ZERO, ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_about(Vec2::ZERO, 1.0 / ZOOM_STEP);
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        if delta.is_finite() {
            self.pan += delta;
        }
    }

    /// Puts `world` at the centre of the screen without changing zoom.
    pub fn center_on(&mut self, world: Vec2) {
        self.pan = -world * self.zoom;
    }

    /// Zooms and pans so `bounds` fills the screen. Never zooms in past the
    /// default level, so a lone small node is shown at normal size.
    pub fn fit(&mut self, bounds: Rect) {
        let available = (self.screen - Vec2::splat(FIT_MARGIN * 2.0)).max(Vec2::splat(1.0));
        let size = bounds.size();
        let zoom = if size.x > 0.0 && size.y > 0.0 {
            (available.x / size.x).min(available.y / size.y)
        } else {
            DEFAULT_ZOOM
        };
        self.zoom = zoom.min(DEFAULT_ZOOM).clamp(MIN_ZOOM, MAX_ZOOM);
        self.center_on(bounds.center().to_vec2());
    }

    pub fn set_screen(&mut self, size: Vec2) {
        if size.x > 0.0 && size.y > 0.0 && size.is_finite() {
            self.screen = size;
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    fn screen_rect() -> Rect {
        Rect::from_min_size(Pos2::ZERO, vec2(1280.0, 800.0))
    }

    #[test]
    fn screen_and_world_transforms_invert() {
        let viewport = Viewport {
            zoom: 1.7,
            pan: vec2(30.0, -12.0),
            ..Viewport::default()
        };
        let world = vec2(-140.0, 66.0);
        let screen = viewport.world_to_screen(screen_rect(), world);
        let back = viewport.screen_to_world(screen_rect(), screen);
        assert!((back - world).length() < 1e-3);
    }

    #[test]
    fn zoom_at_keeps_pointer_anchored() {
        let mut viewport = Viewport::default();
        let rect = screen_rect();
        let pointer = pos2(900.0, 200.0);
        let before = viewport.screen_to_world(rect, pointer);
        viewport.zoom_at(rect, pointer, 1.5);
        let after = viewport.screen_to_world(rect, pointer);
        assert!((before - after).length() < 1e-3);
        assert_eq!(viewport.zoom, 1.5);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut viewport = Viewport::default();
        for _ in 0..100 {
            viewport.zoom_in();
        }
        assert_eq!(viewport.zoom, MAX_ZOOM);
        for _ in 0..100 {
            viewport.zoom_out();
        }
        assert_eq!(viewport.zoom, MIN_ZOOM);
    }

    #[test]
    fn fit_caps_zoom_at_default() {
        let mut viewport = Viewport::default();
        viewport.fit(Rect::from_center_size(pos2(50.0, 50.0), vec2(140.0, 44.0)));
        assert_eq!(viewport.zoom, DEFAULT_ZOOM);
        assert_eq!(viewport.pan, vec2(-50.0, -50.0));
    }

    #[test]
    fn fit_zooms_out_for_wide_maps() {
        let mut viewport = Viewport::default();
        viewport.fit(Rect::from_center_size(Pos2::ZERO, vec2(4000.0, 100.0)));
        assert!((viewport.zoom - 1200.0 / 4000.0).abs() < 1e-4);
    }

    #[test]
    fn saved_viewport_is_sanitised() {
        let viewport = Viewport::from_saved(MapViewport {
            zoom: f32::NAN,
            pan_x: 3.0,
            pan_y: f32::INFINITY,
        });
        assert_eq!(viewport.zoom, DEFAULT_ZOOM);
        assert_eq!(viewport.pan, Vec2::ZERO);
    }
}
