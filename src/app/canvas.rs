use eframe::egui::{self, Align2, Color32, FontId, PointerButton, Rect, Sense, Stroke, Ui, Vec2};

use labnote::mindmap::{EdgeKind, MindEdge};

use super::render_utils::{
    border_point, dim_color, draw_background, draw_link, draw_node_shape, parse_hex_color,
    segment_visible,
};
use super::{OpenMap, ViewModel};

const SELECTED_STROKE: Color32 = Color32::from_rgb(255, 214, 102);
const LINK_SOURCE_STROKE: Color32 = Color32::from_rgb(120, 220, 160);

/// What the pointer did to the canvas this frame.
#[derive(Default)]
struct CanvasInput {
    clicked: Option<Option<String>>,
    drag_finished: bool,
}

impl ViewModel {
    pub(super) fn draw_canvas(&mut self, ui: &mut Ui) {
        let Some(open) = self.open.as_mut() else {
            ui.centered_and_justified(|ui| {
                ui.label("Open or create a mind map to start.");
            });
            return;
        };

        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        open.engine.viewport_mut().set_screen(rect.size());

        let input = handle_input(ui, open, rect, &response);
        paint(ui, open, rect);

        if let Some(target) = input.clicked {
            self.apply_click(target);
        }
        if input.drag_finished
            && self
                .open
                .as_ref()
                .is_some_and(|open| !open.engine.is_running())
        {
            self.save_layout();
        }
    }

    /// A click either finishes a pending link or changes the selection.
    fn apply_click(&mut self, target: Option<String>) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let (Some(source), Some(target)) = (open.link_from.clone(), target.clone()) else {
            open.link_from = None;
            open.rename = target
                .as_deref()
                .and_then(|id| open.map.node(id))
                .map(|node| node.title.clone())
                .unwrap_or_default();
            open.selected = target;
            return;
        };

        open.link_from = None;
        if source == target {
            return;
        }
        let map_id = open.map.id.clone();
        let result = self
            .lab
            .mind_maps()
            .add_edge(&map_id, &source, &target, EdgeKind::Relation);
        if self.report(result).is_some() {
            self.refresh_open_map();
        }
    }
}

fn handle_input(ui: &Ui, open: &mut OpenMap, rect: Rect, response: &egui::Response) -> CanvasInput {
    let mut input = CanvasInput::default();

    if response.hovered() {
        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() > f32::EPSILON {
            let pointer = ui
                .input(|input| input.pointer.hover_pos())
                .unwrap_or_else(|| rect.center());
            let factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
            open.engine.zoom_at(rect, pointer, factor);
        }
    }

    if response.dragged_by(PointerButton::Secondary) || response.dragged_by(PointerButton::Middle) {
        open.engine.pan_by(response.drag_delta());
    }

    let pointer_world = response
        .interact_pointer_pos()
        .map(|pointer| open.engine.viewport().screen_to_world(rect, pointer));

    if response.drag_started_by(PointerButton::Primary)
        && let Some(world) = pointer_world
        && let Some(id) = open.engine.node_at(world).map(str::to_owned)
        && let Some(position) = open.engine.position(&id)
        && open.engine.drag_start(&id)
    {
        open.grab_offset = position - world;
        open.dragging = Some(id);
    }

    if let Some(id) = open.dragging.clone() {
        if response.dragged_by(PointerButton::Primary)
            && let Some(world) = pointer_world
        {
            open.engine.drag_to(&id, world + open.grab_offset);
            open.layout_dirty = true;
        }
        if response.drag_stopped() {
            open.engine.drag_end(&id);
            open.dragging = None;
            input.drag_finished = true;
        }
    }

    if response.clicked_by(PointerButton::Primary)
        && let Some(world) = pointer_world
    {
        input.clicked = Some(open.engine.node_at(world).map(str::to_owned));
    }

    input
}

fn paint(ui: &Ui, open: &OpenMap, rect: Rect) {
    let painter = ui.painter_at(rect);
    let viewport = *open.engine.viewport();
    draw_background(&painter, rect, viewport.pan, viewport.zoom);

    let node_rect = |id: &str| {
        let node = open.map.node(id)?;
        let center = viewport.world_to_screen(rect, open.engine.position(id)?);
        Some(Rect::from_center_size(
            center,
            Vec2::new(node.width, node.height) * viewport.zoom,
        ))
    };

    for (edge_id, _, _) in open.engine.links() {
        let Some(edge) = open.map.edge(edge_id) else {
            continue;
        };
        let (Some(from), Some(to)) = (node_rect(&edge.source), node_rect(&edge.target)) else {
            continue;
        };
        let start = border_point(from, to.center());
        let end = border_point(to, from.center());
        if !segment_visible(rect, start, end, 8.0) {
            continue;
        }
        let highlighted = open
            .selected
            .as_deref()
            .is_some_and(|selected| edge.touches(selected));
        draw_link(
            &painter,
            start,
            end,
            edge_stroke(edge, viewport.zoom, highlighted),
            edge.style.dash.map(|(dash, gap)| (dash * viewport.zoom, gap * viewport.zoom)),
            edge.style.arrow,
        );
    }

    let font = FontId::proportional((13.0 * viewport.zoom).clamp(6.0, 28.0));
    for node in &open.map.nodes {
        let Some(screen) = node_rect(&node.id) else {
            continue;
        };
        if !screen.intersects(rect) {
            continue;
        }

        let base = parse_hex_color(&node.style.color);
        let selected = open.selected.as_deref() == Some(node.id.as_str());
        let linking = open.link_from.as_deref() == Some(node.id.as_str());
        let stroke = if linking {
            Stroke::new(2.5, LINK_SOURCE_STROKE)
        } else if selected {
            Stroke::new(2.5, SELECTED_STROKE)
        } else {
            Stroke::new(1.0, dim_color(base, 0.6))
        };
        draw_node_shape(&painter, screen, node.style.shape, dim_color(base, 0.85), stroke);

        if viewport.zoom >= 0.25 {
            painter.text(
                screen.center(),
                Align2::CENTER_CENTER,
                &node.title,
                font.clone(),
                Color32::WHITE,
            );
        }
    }
}

fn edge_stroke(edge: &MindEdge, zoom: f32, highlighted: bool) -> Stroke {
    let color = parse_hex_color(&edge.style.color);
    let width = (edge.style.width * zoom).clamp(0.5, 8.0);
    if highlighted {
        Stroke::new(width + 1.0, color)
    } else {
        Stroke::new(width, dim_color(color, 0.8))
    }
}
