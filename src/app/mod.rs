use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context, Vec2};
use tracing::{info, warn};

use labnote::assistant::AssistantReply;
use labnote::cache::{Interest, InvalidationEvent};
use labnote::lab::PendingChat;
use labnote::layout::LayoutEngine;
use labnote::mindmap::{MapTemplate, MindMap, NodeKind, generate};
use labnote::model::{ChatMessage, EntityKind};
use labnote::store::FileStore;
use labnote::{Lab, LabConfig};

mod canvas;
mod panels;
mod render_utils;

pub struct LabViewerApp {
    config: LabConfig,
    state: AppState,
}

enum AppState {
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    lab: Lab<FileStore>,
    events: Receiver<InvalidationEvent>,
    maps: Vec<MindMap>,
    maps_dirty: bool,
    search: String,
    new_map_title: String,
    new_map_template: MapTemplate,
    generate_prompt: String,
    generate_rx: Option<Receiver<Result<MindMap, String>>>,
    open: Option<OpenMap>,
    chat: ChatPanel,
    status: Option<String>,
}

/// A map being edited together with its running layout.
struct OpenMap {
    map: MindMap,
    engine: LayoutEngine,
    selected: Option<String>,
    dragging: Option<String>,
    /// Offset from the pointer to the dragged node's centre.
    grab_offset: Vec2,
    link_from: Option<String>,
    live_layout: bool,
    /// Positions changed since the last save.
    layout_dirty: bool,
    new_node_title: String,
    new_node_kind: NodeKind,
    rename: String,
}

#[derive(Default)]
struct ChatPanel {
    session_id: Option<String>,
    input: String,
    messages: Vec<ChatMessage>,
    pending: Option<Receiver<(PendingChat, AssistantReply)>>,
    last_reply_fallback: bool,
}

impl LabViewerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: LabConfig) -> Self {
        let state = Self::open_lab(&config);
        Self { config, state }
    }

    fn open_lab(config: &LabConfig) -> AppState {
        let data_dir = config.data_dir();
        match FileStore::open(&data_dir) {
            Ok(store) => {
                info!(data_dir = %data_dir.display(), "viewer opening lab");
                AppState::Ready(Box::new(ViewModel::new(Lab::open(store, config.clone()))))
            }
            Err(error) => AppState::Error(format!("{error} ({})", data_dir.display())),
        }
    }
}

impl ViewModel {
    fn new(mut lab: Lab<FileStore>) -> Self {
        let (_, events) = lab
            .cache()
            .subscribe_channel(Interest::only(EntityKind::MindMaps));
        Self {
            lab,
            events,
            maps: Vec::new(),
            maps_dirty: true,
            search: String::new(),
            new_map_title: String::new(),
            new_map_template: MapTemplate::Blank,
            generate_prompt: String::new(),
            generate_rx: None,
            open: None,
            chat: ChatPanel::default(),
            status: None,
        }
    }

    fn report<T>(&mut self, result: labnote::LabResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(%error, "viewer action failed");
                self.status = Some(error.to_string());
                None
            }
        }
    }

    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if event.kind == EntityKind::MindMaps {
                        self.maps_dirty = true;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let (_, events) = self
                        .lab
                        .cache()
                        .subscribe_channel(Interest::only(EntityKind::MindMaps));
                    self.events = events;
                    self.maps_dirty = true;
                    break;
                }
            }
        }
        if self.maps_dirty {
            self.maps = self.lab.mind_maps().search(&self.search);
            self.maps_dirty = false;
        }
    }

    fn open_map(&mut self, id: &str) {
        self.close_map();
        let result = self.lab.mind_maps().require(id);
        let Some(map) = self.report(result) else {
            return;
        };
        let engine = LayoutEngine::from_map(&map);
        self.open = Some(OpenMap {
            engine,
            selected: None,
            dragging: None,
            grab_offset: Vec2::ZERO,
            link_from: None,
            live_layout: true,
            layout_dirty: false,
            new_node_title: String::new(),
            new_node_kind: NodeKind::Idea,
            rename: String::new(),
            map,
        });
    }

    /// Saves positions and stops the layout of the open map.
    fn close_map(&mut self) {
        if let Some(mut open) = self.open.take() {
            if open.layout_dirty {
                open.engine.write_back(&mut open.map);
                let result = self.lab.mind_maps().save_layout(&open.map);
                self.report(result);
            }
            open.engine.dispose();
        }
    }

    fn save_layout(&mut self) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        open.engine.write_back(&mut open.map);
        let result = self.lab.mind_maps().save_layout(&open.map);
        if let Some(saved) = self.report(result)
            && let Some(open) = self.open.as_mut()
        {
            open.map = saved;
            open.layout_dirty = false;
        }
    }

    /// Reloads the open map from the store and brings the engine in line
    /// with it: new nodes and edges are added, vanished ones removed.
    fn refresh_open_map(&mut self) {
        let Some(id) = self.open.as_ref().map(|open| open.map.id.clone()) else {
            return;
        };
        let result = self.lab.mind_maps().require(&id);
        let Some(map) = self.report(result) else {
            return;
        };
        let Some(open) = self.open.as_mut() else {
            return;
        };

        let gone_nodes = open
            .engine
            .node_ids()
            .filter(|node| map.node(node).is_none())
            .map(str::to_owned)
            .collect::<Vec<_>>();
        for node in gone_nodes {
            open.engine.remove_node(&node);
        }
        let gone_edges = open
            .engine
            .edge_ids()
            .filter(|edge| map.edge(edge).is_none())
            .map(str::to_owned)
            .collect::<Vec<_>>();
        for edge in gone_edges {
            open.engine.remove_edge(&edge);
        }
        for node in &map.nodes {
            if !open.engine.has_node(&node.id) {
                open.engine.add_node(node);
            }
        }
        for edge in &map.edges {
            if !open.engine.has_edge(&edge.id) {
                open.engine.add_edge(edge);
            }
        }
        if open
            .selected
            .as_deref()
            .is_some_and(|selected| map.node(selected).is_none())
        {
            open.selected = None;
        }
        open.map = map;
        open.layout_dirty = true;
    }

    fn step_layout(&mut self, ctx: &Context) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        if !open.live_layout || !open.engine.is_running() {
            return;
        }
        open.engine.tick();
        open.layout_dirty = true;
        if open.engine.is_running() {
            ctx.request_repaint();
        } else if open.dragging.is_none() {
            self.save_layout();
        }
    }

    fn start_chat(&mut self) {
        if self.chat.pending.is_some() {
            return;
        }
        let text = std::mem::take(&mut self.chat.input);
        let session_id = self.chat.session_id.clone();
        let result = self.lab.begin_chat(session_id.as_deref(), &text, None);
        let Some(pending) = self.report(result) else {
            self.chat.input = text;
            return;
        };

        self.chat.session_id = Some(pending.session_id.clone());
        self.chat.messages = pending.history.messages.clone();
        self.chat.messages.push(ChatMessage::user(pending.text.clone()));

        let assistant = self.lab.assistant().clone();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let reply = assistant.send(&pending.history, &pending.text, &pending.context);
            let _ = tx.send((pending, reply));
        });
        self.chat.pending = Some(rx);
    }

    fn poll_chat(&mut self, ctx: &Context) {
        let Some(rx) = self.chat.pending.take() else {
            return;
        };
        match rx.try_recv() {
            Ok((pending, reply)) => {
                self.chat.last_reply_fallback = reply.is_fallback();
                let result = self.lab.finish_chat(&pending.session_id, &reply);
                if let Some(session) = self.report(result) {
                    self.chat.messages = session.messages;
                }
            }
            Err(TryRecvError::Empty) => {
                self.chat.pending = Some(rx);
                ctx.request_repaint();
            }
            Err(TryRecvError::Disconnected) => {
                self.status = Some("Chat worker disconnected".to_owned());
            }
        }
    }

    fn start_generation(&mut self) {
        if self.generate_rx.is_some() || self.generate_prompt.trim().is_empty() {
            return;
        }
        let prompt = self.generate_prompt.trim().to_owned();
        let assistant = self.lab.assistant().clone();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = generate::generate(&assistant, &prompt).map_err(|error| error.to_string());
            let _ = tx.send(result);
        });
        self.generate_rx = Some(rx);
    }

    fn poll_generation(&mut self, ctx: &Context) {
        let Some(rx) = self.generate_rx.take() else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(map)) => {
                let result = self.lab.save_generated(map);
                if let Some(map) = self.report(result) {
                    self.generate_prompt.clear();
                    self.open_map(&map.id);
                }
            }
            Ok(Err(error)) => self.status = Some(format!("Map generation failed: {error}")),
            Err(TryRecvError::Empty) => {
                self.generate_rx = Some(rx);
                ctx.request_repaint();
            }
            Err(TryRecvError::Disconnected) => {
                self.status = Some("Generation worker disconnected".to_owned());
            }
        }
    }

    fn show(&mut self, ctx: &Context) {
        self.drain_events();
        self.poll_chat(ctx);
        self.poll_generation(ctx);
        self.step_layout(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_top_bar(ui));

        egui::SidePanel::left("maps")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_map_panel(ui));

        egui::SidePanel::right("chat")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_chat_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_canvas(ui));
    }
}

impl eframe::App for LabViewerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Ready(model) => model.show(ctx),
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to open the lab data directory");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::open_lab(&self.config));
                    }
                });
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let AppState::Ready(model) = &mut self.state {
            model.close_map();
        }
    }
}
