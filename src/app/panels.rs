use eframe::egui::{self, Align, Color32, Layout, RichText, ScrollArea, Ui};

use labnote::mindmap::{MapTemplate, NodeDraft, NodeKind};
use labnote::model::{MessageSource, Role};
use labnote::util::short_id;

use super::ViewModel;

const FALLBACK_TEXT: Color32 = Color32::from_rgb(230, 180, 90);

impl ViewModel {
    pub(super) fn draw_top_bar(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.heading("labnote");
            ui.separator();
            let stats = self.lab.stats();
            ui.label(format!("maps: {}", self.maps.len()));
            ui.label(format!("cache hits: {}", stats.hits));
            ui.label(format!("misses: {}", stats.misses));
            if ui
                .button("Reload")
                .on_hover_text("Read every collection from disk again")
                .clicked()
            {
                if self.open.as_ref().is_some_and(|open| open.layout_dirty) {
                    self.save_layout();
                }
                self.lab.cache().invalidate_all();
                self.maps_dirty = true;
                self.refresh_open_map();
            }
            if self.lab.assistant().config().is_configured() {
                ui.label(format!("model: {}", self.lab.assistant().config().model));
            } else {
                ui.label(RichText::new("assistant offline").color(FALLBACK_TEXT));
            }

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if let Some(open) = &self.open {
                    let engine = &open.engine;
                    let motion = if engine.is_running() {
                        format!(
                            ", settling (tick {}, energy {:.2})",
                            engine.tick_count(),
                            engine.kinetic_energy()
                        )
                    } else {
                        String::new()
                    };
                    ui.label(format!(
                        "{} nodes, {} edges, zoom {:.0}%{motion}",
                        engine.node_count(),
                        engine.edge_count(),
                        engine.viewport().zoom * 100.0,
                    ));
                }
                if let Some(status) = &self.status {
                    ui.label(RichText::new(status.as_str()).color(Color32::LIGHT_RED));
                }
            });
        });
    }

    pub(super) fn draw_map_panel(&mut self, ui: &mut Ui) {
        ui.heading("Mind maps");
        ui.add_space(4.0);

        let search = ui.add(egui::TextEdit::singleline(&mut self.search).hint_text("Search maps"));
        if search.changed() {
            self.maps_dirty = true;
        }

        let mut open_request = None;
        let mut delete_request = None;
        ScrollArea::vertical()
            .id_salt("map_list")
            .max_height(220.0)
            .show(ui, |ui| {
                for map in &self.maps {
                    let is_open = self.open.as_ref().is_some_and(|open| open.map.id == map.id);
                    ui.horizontal(|ui| {
                        if ui.selectable_label(is_open, map.title.as_str()).clicked() {
                            open_request = Some(map.id.clone());
                        }
                        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                            if ui.small_button("✕").on_hover_text("Delete map").clicked() {
                                delete_request = Some(map.id.clone());
                            }
                            ui.weak(format!("{} nodes", map.nodes.len()));
                        });
                    });
                }
                if self.maps.is_empty() {
                    ui.weak("No maps yet.");
                }
            });
        if let Some(id) = open_request {
            self.open_map(&id);
        }
        if let Some(id) = delete_request {
            self.delete_map(&id);
        }

        ui.separator();
        self.draw_create_section(ui);
        ui.separator();
        self.draw_generate_section(ui);

        if self.open.is_some() {
            ui.separator();
            self.draw_layout_controls(ui);
            ui.separator();
            self.draw_node_tools(ui);
        }
    }

    fn draw_create_section(&mut self, ui: &mut Ui) {
        ui.label("New map");
        ui.text_edit_singleline(&mut self.new_map_title);
        egui::ComboBox::from_id_salt("template")
            .selected_text(self.new_map_template.label())
            .show_ui(ui, |ui| {
                for template in MapTemplate::ALL {
                    ui.selectable_value(&mut self.new_map_template, template, template.label());
                }
            });
        let can_create = !self.new_map_title.trim().is_empty();
        if ui.add_enabled(can_create, egui::Button::new("Create")).clicked() {
            let title = self.new_map_title.trim().to_owned();
            let result = self.lab.new_mind_map(&title, self.new_map_template);
            if let Some(map) = self.report(result) {
                self.new_map_title.clear();
                self.open_map(&map.id);
            }
        }
    }

    fn draw_generate_section(&mut self, ui: &mut Ui) {
        ui.label("Generate from a topic");
        ui.add(
            egui::TextEdit::multiline(&mut self.generate_prompt)
                .desired_rows(2)
                .hint_text("e.g. CRISPR screening workflow"),
        );
        let busy = self.generate_rx.is_some();
        let configured = self.lab.assistant().config().is_configured();
        ui.horizontal(|ui| {
            let button = ui.add_enabled(configured && !busy, egui::Button::new("Generate"));
            if !configured {
                button.on_disabled_hover_text("Configure an assistant endpoint first");
            } else if button.clicked() {
                self.start_generation();
            }
            if busy {
                ui.spinner();
            }
        });
    }

    fn draw_layout_controls(&mut self, ui: &mut Ui) {
        let mut save = false;
        if let Some(open) = self.open.as_mut() {
            ui.label("Layout");
            ui.horizontal(|ui| {
                if ui.button("−").on_hover_text("Zoom out").clicked() {
                    open.engine.zoom_out();
                }
                if ui.button("+").on_hover_text("Zoom in").clicked() {
                    open.engine.zoom_in();
                }
                if ui.button("Fit").clicked() {
                    open.engine.reset_zoom();
                }
                if ui.button("Center").clicked() {
                    open.engine.center_view();
                }
            });
            ui.horizontal(|ui| {
                ui.checkbox(&mut open.live_layout, "Live layout");
                if ui.button("Relax").clicked() {
                    open.engine.reheat(1.0);
                }
                save = ui
                    .add_enabled(open.layout_dirty, egui::Button::new("Save"))
                    .clicked();
            });
        }
        if save {
            self.save_layout();
        }
    }

    fn draw_node_tools(&mut self, ui: &mut Ui) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let map_id = open.map.id.clone();

        ui.label("Nodes");
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut open.new_node_title);
            egui::ComboBox::from_id_salt("node_kind")
                .selected_text(open.new_node_kind.label())
                .show_ui(ui, |ui| {
                    for kind in NodeKind::ALL {
                        ui.selectable_value(&mut open.new_node_kind, kind, kind.label());
                    }
                });
        });

        let selected = open.selected.clone();
        let add_label = if selected.is_some() { "Add child" } else { "Add node" };
        let mut add = None;
        if ui
            .add_enabled(!open.new_node_title.trim().is_empty(), egui::Button::new(add_label))
            .clicked()
        {
            let mut draft = NodeDraft::new(open.new_node_title.trim(), open.new_node_kind);
            if let Some(parent) = &selected {
                draft = draft.under(parent.clone());
            }
            add = Some(draft);
        }

        let Some(node_id) = selected else {
            if let Some(draft) = add {
                self.add_node(&map_id, draft);
            }
            return;
        };

        ui.add_space(6.0);
        ui.label(format!("Selected: {}", short_id(&node_id)));
        let mut rename = None;
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut open.rename);
            if ui.button("Rename").clicked() {
                rename = Some(open.rename.trim().to_owned());
            }
        });

        let mut delete = false;
        ui.horizontal(|ui| {
            let linking = open.link_from.as_deref() == Some(node_id.as_str());
            let label = if linking { "Cancel link" } else { "Link to…" };
            if ui.button(label).clicked() {
                open.link_from = if linking { None } else { Some(node_id.clone()) };
            }
            delete = ui.button("Delete node").clicked();
        });
        if open.link_from.is_some() {
            ui.weak("Click another node to connect it.");
        }

        let edges = open
            .map
            .edges
            .iter()
            .filter(|edge| edge.touches(&node_id))
            .map(|edge| {
                let other = if edge.source == node_id { &edge.target } else { &edge.source };
                let title = open
                    .map
                    .node(other)
                    .map_or("(missing)", |node| node.title.as_str());
                (edge.id.clone(), format!("{:?} ↔ {title}", edge.kind))
            })
            .collect::<Vec<_>>();
        let mut delete_edge = None;
        if !edges.is_empty() {
            ui.label("Edges");
            for (edge_id, label) in &edges {
                ui.horizontal(|ui| {
                    ui.label(label.as_str());
                    if ui.small_button("✕").clicked() {
                        delete_edge = Some(edge_id.clone());
                    }
                });
            }
        }

        if let Some(draft) = add {
            self.add_node(&map_id, draft);
        }
        if let Some(title) = rename {
            let result = self
                .lab
                .mind_maps()
                .update_node(&map_id, &node_id, |node| node.title = title);
            if self.report(result).is_some() {
                self.refresh_open_map();
            }
        }
        if delete {
            let result = self.lab.mind_maps().delete_node(&map_id, &node_id);
            if self.report(result).is_some() {
                self.refresh_open_map();
            }
        }
        if let Some(edge_id) = delete_edge {
            let result = self.lab.mind_maps().delete_edge(&map_id, &edge_id);
            if self.report(result).is_some() {
                self.refresh_open_map();
            }
        }
    }

    fn add_node(&mut self, map_id: &str, draft: NodeDraft) {
        // Parent offsets are taken from stored positions.
        self.save_layout();
        let result = self.lab.mind_maps().add_node(map_id, draft);
        if self.report(result).is_some() {
            if let Some(open) = self.open.as_mut() {
                open.new_node_title.clear();
            }
            self.refresh_open_map();
        }
    }

    fn delete_map(&mut self, id: &str) {
        if self.open.as_ref().is_some_and(|open| open.map.id == id)
            && let Some(mut open) = self.open.take()
        {
            open.engine.dispose();
        }
        let result = self.lab.mind_maps().delete(id);
        self.report(result);
    }

    pub(super) fn draw_chat_panel(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.heading("Assistant");
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if ui
                    .add_enabled(self.chat.pending.is_none(), egui::Button::new("New chat"))
                    .clicked()
                {
                    self.chat.session_id = None;
                    self.chat.messages.clear();
                    self.chat.last_reply_fallback = false;
                }
            });
        });
        if self.chat.last_reply_fallback {
            ui.label(
                RichText::new("Offline reply: the assistant could not be reached.")
                    .color(FALLBACK_TEXT),
            );
        }
        ui.separator();

        let input_height = 70.0;
        ScrollArea::vertical()
            .id_salt("chat_messages")
            .stick_to_bottom(true)
            .max_height((ui.available_height() - input_height).max(80.0))
            .show(ui, |ui| {
                for message in &self.chat.messages {
                    let (who, color) = match (message.role, message.source) {
                        (Role::User, _) => ("You", Color32::LIGHT_BLUE),
                        (_, MessageSource::Fallback) => ("Offline", FALLBACK_TEXT),
                        _ => ("Assistant", Color32::LIGHT_GREEN),
                    };
                    ui.label(RichText::new(who).strong().color(color));
                    ui.label(message.content.as_str());
                    ui.add_space(6.0);
                }
                if self.chat.pending.is_some() {
                    ui.spinner();
                }
            });

        ui.separator();
        let input = ui.add(
            egui::TextEdit::multiline(&mut self.chat.input)
                .desired_rows(2)
                .desired_width(f32::INFINITY)
                .hint_text("Ask about your experiments"),
        );
        let enter = input.has_focus()
            && ui.input(|input| input.key_pressed(egui::Key::Enter) && input.modifiers.command);
        let can_send = self.chat.pending.is_none() && !self.chat.input.trim().is_empty();
        let send = ui.add_enabled(can_send, egui::Button::new("Send")).clicked();
        if can_send && (send || enter) {
            self.start_chat();
        }
    }
}
