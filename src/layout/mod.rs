//! Force-directed layout for mind maps.
//!
//! The simulation cools with an `alpha` value the way d3-force does: every
//! tick moves alpha toward its target, forces are scaled by alpha, and the
//! run settles once alpha or the kinetic energy drops below a threshold. A
//! hard tick cap guarantees termination for degenerate inputs.

mod forces;
mod quadtree;
mod viewport;

use std::collections::HashMap;

use eframe::egui::{Pos2, Rect, Vec2, vec2};
use tracing::{debug, trace};

use crate::mindmap::{LayoutAlgorithm, MindEdge, MindMap, MindNode};
use crate::util::stable_pair;
use forces::{Collision, Repulsion, collide, repel};
use quadtree::Cell;
pub use viewport::{DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM, Viewport};

const BARNES_HUT_THETA: f32 = 0.8;
const DRAG_ALPHA: f32 = 0.3;
const CHANGE_ALPHA: f32 = 0.3;
const REMOVE_ALPHA: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutParams {
    /// Rest length of a link.
    pub rest_length: f32,
    pub spring: f32,
    pub repulsion: f32,
    pub softening: f32,
    /// Nodes further apart than this ignore each other.
    pub max_repulsion_distance: f32,
    pub centering: f32,
    pub collision: f32,
    pub collision_padding: f32,
    /// Fraction of velocity lost per tick.
    pub velocity_decay: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    /// Settles when the summed squared speed drops below this.
    pub energy_epsilon: f32,
    pub max_ticks: usize,
    pub max_force: f32,
    pub max_speed: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            rest_length: 180.0,
            spring: 0.05,
            repulsion: 2_400.0,
            softening: 400.0,
            max_repulsion_distance: 900.0,
            centering: 0.002,
            collision: 0.7,
            collision_padding: 8.0,
            velocity_decay: 0.4,
            alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
            alpha_min: 0.001,
            energy_epsilon: 0.01,
            max_ticks: 600,
            max_force: 60.0,
            max_speed: 40.0,
        }
    }
}

impl LayoutParams {
    pub fn with_spacing(spacing: f32) -> Self {
        let mut params = Self::default();
        if spacing.is_finite() && spacing > 0.0 {
            params.rest_length = spacing;
        }
        params
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationState {
    Running,
    Settled,
    Disposed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeDrag {
    Free,
    Pinned,
}

#[derive(Clone, Debug)]
struct SimNode {
    id: String,
    position: Vec2,
    velocity: Vec2,
    size: Vec2,
    pin: Option<Vec2>,
}

impl SimNode {
    fn radius(&self) -> f32 {
        self.size.length() * 0.5
    }
}

#[derive(Clone, Debug)]
struct SimEdge {
    id: String,
    source: String,
    target: String,
    /// Resolved node indices; `None` while an endpoint is missing.
    link: Option<(usize, usize)>,
}

#[derive(Default)]
struct Scratch {
    forces: Vec<Vec2>,
    points: Vec<Vec2>,
    radii: Vec<f32>,
}

pub struct LayoutEngine {
    params: LayoutParams,
    nodes: Vec<SimNode>,
    index: HashMap<String, usize>,
    edges: Vec<SimEdge>,
    alpha: f32,
    alpha_target: f32,
    state: SimulationState,
    ticks: usize,
    ticks_since_heat: usize,
    energy: f32,
    /// Manual maps never simulate; drags still move nodes.
    manual: bool,
    viewport: Viewport,
    scratch: Scratch,
}

impl LayoutEngine {
    pub fn new(params: LayoutParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            alpha: 1.0,
            alpha_target: 0.0,
            state: SimulationState::Running,
            ticks: 0,
            ticks_since_heat: 0,
            energy: 0.0,
            manual: false,
            viewport: Viewport::default(),
            scratch: Scratch::default(),
        }
    }

    pub fn from_map(map: &MindMap) -> Self {
        let mut engine = Self::new(LayoutParams::with_spacing(map.layout.spacing));
        engine.manual = map.layout.algorithm == LayoutAlgorithm::Manual;
        engine.viewport = Viewport::from_saved(map.viewport);

        for node in &map.nodes {
            engine.push_node(node, node_position(node));
        }
        if let [only] = engine.nodes.as_mut_slice()
            && !engine.manual
        {
            only.position = Vec2::ZERO;
        }
        engine.spread_coincident();
        for edge in &map.edges {
            engine.push_edge(edge);
        }
        if engine.manual {
            engine.state = SimulationState::Settled;
        }
        debug!(
            map = %map.id,
            nodes = engine.nodes.len(),
            edges = engine.edges.len(),
            "layout loaded"
        );
        engine
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SimulationState::Running
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn tick_count(&self) -> usize {
        self.ticks
    }

    pub fn kinetic_energy(&self) -> f32 {
        self.energy
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn has_edge(&self, id: &str) -> bool {
        self.edges.iter().any(|edge| edge.id == id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.id.as_str())
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = &str> {
        self.edges.iter().map(|edge| edge.id.as_str())
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        self.index.get(id).map(|&index| self.nodes[index].position)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&str, Vec2)> {
        self.nodes
            .iter()
            .map(|node| (node.id.as_str(), node.position))
    }

    /// Endpoint positions of every drawable edge.
    pub fn links(&self) -> impl Iterator<Item = (&str, Vec2, Vec2)> {
        self.edges.iter().filter_map(|edge| {
            let (source, target) = edge.link?;
            Some((
                edge.id.as_str(),
                self.nodes[source].position,
                self.nodes[target].position,
            ))
        })
    }

    pub fn drag_state(&self, id: &str) -> Option<NodeDrag> {
        let node = &self.nodes[*self.index.get(id)?];
        Some(if node.pin.is_some() {
            NodeDrag::Pinned
        } else {
            NodeDrag::Free
        })
    }

    /// Advances the simulation one step. Returns `false` once nothing moves.
    pub fn tick(&mut self) -> bool {
        if self.state != SimulationState::Running {
            return false;
        }

        match self.nodes.len() {
            0 => {
                self.settle();
                return false;
            }
            1 => {
                let manual = self.manual;
                let node = &mut self.nodes[0];
                node.velocity = Vec2::ZERO;
                let Some(pin) = node.pin else {
                    // A lone node rests at the origin.
                    if !manual {
                        node.position = Vec2::ZERO;
                    }
                    self.settle();
                    return false;
                };
                node.position = pin;
                self.ticks += 1;
                return true;
            }
            _ => {}
        }

        self.alpha += (self.alpha_target - self.alpha) * self.params.alpha_decay;
        self.accumulate_forces();
        self.energy = self.integrate();
        self.ticks += 1;
        self.ticks_since_heat += 1;

        let dragging = self.nodes.iter().any(|node| node.pin.is_some());
        let cooled = self.alpha < self.params.alpha_min
            || (self.ticks_since_heat > 1 && self.energy < self.params.energy_epsilon);
        if (!dragging && cooled) || self.ticks_since_heat >= self.params.max_ticks {
            self.settle();
        }
        true
    }

    /// Ticks until settled or `max_ticks` steps ran. Returns steps taken.
    pub fn run(&mut self, max_ticks: usize) -> usize {
        let mut steps = 0;
        while steps < max_ticks && self.tick() {
            steps += 1;
        }
        steps
    }

    pub fn run_to_rest(&mut self) -> usize {
        self.run(self.params.max_ticks)
    }

    /// Restarts a settled simulation with at least `alpha` energy.
    pub fn reheat(&mut self, alpha: f32) {
        if self.state == SimulationState::Disposed || self.manual {
            return;
        }
        self.alpha = self.alpha.max(alpha);
        self.ticks_since_heat = 0;
        self.state = SimulationState::Running;
    }

    pub fn drag_start(&mut self, id: &str) -> bool {
        if self.state == SimulationState::Disposed {
            return false;
        }
        let Some(&index) = self.index.get(id) else {
            return false;
        };
        let node = &mut self.nodes[index];
        node.pin = Some(node.position);
        node.velocity = Vec2::ZERO;
        self.alpha_target = DRAG_ALPHA;
        self.reheat(DRAG_ALPHA);
        trace!(node = id, "drag started");
        true
    }

    pub fn drag_to(&mut self, id: &str, world: Vec2) -> bool {
        if self.state == SimulationState::Disposed || !world.is_finite() {
            return false;
        }
        let Some(&index) = self.index.get(id) else {
            return false;
        };
        let node = &mut self.nodes[index];
        let Some(pin) = node.pin.as_mut() else {
            return false;
        };
        *pin = world;
        node.position = world;
        self.reheat(DRAG_ALPHA);
        true
    }

    pub fn drag_end(&mut self, id: &str) -> bool {
        let Some(&index) = self.index.get(id) else {
            return false;
        };
        let released = self.nodes[index].pin.take().is_some();
        if !self.nodes.iter().any(|node| node.pin.is_some()) {
            self.alpha_target = 0.0;
        }
        released
    }

    /// Adds a node next to its parent hint if it has one, otherwise at its
    /// stored position. Reheats only partially so the rest of the map
    /// barely moves.
    pub fn add_node(&mut self, node: &MindNode) -> bool {
        if self.state == SimulationState::Disposed || self.index.contains_key(&node.id) {
            return false;
        }

        let parent = node
            .parent_id
            .as_deref()
            .and_then(|parent| self.position(parent));
        let position = match parent {
            Some(parent) => {
                let (dx, dy) = stable_pair(&node.id);
                let offset = vec2(dx, dy);
                let direction = if offset.length() > 0.01 {
                    offset.normalized()
                } else {
                    Vec2::X
                };
                parent + direction * self.params.rest_length
            }
            None => node_position(node),
        };
        self.push_node(node, position);
        self.spread_coincident();
        self.relink();
        self.reheat(CHANGE_ALPHA);
        true
    }

    pub fn add_edge(&mut self, edge: &MindEdge) -> bool {
        if self.state == SimulationState::Disposed || self.edges.iter().any(|e| e.id == edge.id) {
            return false;
        }
        self.push_edge(edge);
        self.reheat(CHANGE_ALPHA);
        true
    }

    /// Removes the node and its edges; returns the removed edge ids.
    pub fn remove_node(&mut self, id: &str) -> Option<Vec<String>> {
        let index = *self.index.get(id)?;
        self.nodes.remove(index);

        let mut removed = Vec::new();
        self.edges.retain(|edge| {
            let touches = edge.source == id || edge.target == id;
            if touches {
                removed.push(edge.id.clone());
            }
            !touches
        });
        self.reindex();
        self.relink();
        self.reheat(REMOVE_ALPHA);
        Some(removed)
    }

    pub fn remove_edge(&mut self, id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|edge| edge.id != id);
        let removed = self.edges.len() != before;
        if removed {
            self.reheat(REMOVE_ALPHA);
        }
        removed
    }

    /// Node under `world`, treating nodes as their bounding boxes. Later
    /// nodes are drawn on top and win.
    pub fn node_at(&self, world: Vec2) -> Option<&str> {
        self.nodes
            .iter()
            .rev()
            .find(|node| {
                Rect::from_center_size(node.position.to_pos2(), node.size)
                    .contains(world.to_pos2())
            })
            .map(|node| node.id.as_str())
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.nodes
            .iter()
            .map(|node| Rect::from_center_size(node.position.to_pos2(), node.size))
            .reduce(|acc, rect| acc.union(rect))
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    /// Zooms keeping the world point under `pointer` in place.
    pub fn zoom_at(&mut self, rect: Rect, pointer: Pos2, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.viewport.zoom_at(rect, pointer, factor);
        }
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.viewport.pan_by(delta);
    }

    /// Fits the whole map on screen. Does nothing for an empty map.
    pub fn reset_zoom(&mut self) {
        if let Some(bounds) = self.bounds() {
            self.viewport.fit(bounds);
        }
    }

    /// Centres the map without changing zoom. Does nothing for an empty map.
    pub fn center_view(&mut self) {
        if let Some(bounds) = self.bounds() {
            self.viewport.center_on(bounds.center().to_vec2());
        }
    }

    /// Copies positions and the camera into `map`. Nodes unknown to the
    /// engine are left untouched.
    pub fn write_back(&self, map: &mut MindMap) {
        for node in &mut map.nodes {
            if let Some(position) = self.position(&node.id) {
                node.x = position.x;
                node.y = position.y;
            }
        }
        map.viewport = self.viewport.to_saved();
    }

    /// Stops the simulation for good and releases its buffers.
    pub fn dispose(&mut self) {
        self.state = SimulationState::Disposed;
        self.nodes.clear();
        self.edges.clear();
        self.index.clear();
        self.scratch = Scratch::default();
    }

    fn settle(&mut self) {
        if self.state == SimulationState::Running {
            trace!(ticks = self.ticks, alpha = self.alpha, "layout settled");
            self.state = SimulationState::Settled;
        }
        for node in &mut self.nodes {
            node.velocity = Vec2::ZERO;
        }
    }

    fn push_node(&mut self, node: &MindNode, position: Vec2) {
        let size = vec2(node.width.max(1.0), node.height.max(1.0));
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(SimNode {
            id: node.id.clone(),
            position,
            velocity: Vec2::ZERO,
            size: if size.is_finite() { size } else { vec2(1.0, 1.0) },
            pin: None,
        });
    }

    fn push_edge(&mut self, edge: &MindEdge) {
        let mut sim = SimEdge {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            link: None,
        };
        sim.link = self.resolve(&sim);
        self.edges.push(sim);
    }

    fn resolve(&self, edge: &SimEdge) -> Option<(usize, usize)> {
        let source = *self.index.get(&edge.source)?;
        let target = *self.index.get(&edge.target)?;
        (source != target).then_some((source, target))
    }

    fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
    }

    fn relink(&mut self) {
        let links = self
            .edges
            .iter()
            .map(|edge| self.resolve(edge))
            .collect::<Vec<_>>();
        for (edge, link) in self.edges.iter_mut().zip(links) {
            edge.link = link;
        }
    }

    /// Nudges nodes that share a position onto a small spiral so the
    /// forces have a direction to work with.
    fn spread_coincident(&mut self) {
        let mut seen: HashMap<(u32, u32), usize> = HashMap::new();
        for node in &mut self.nodes {
            let key = (node.position.x.to_bits(), node.position.y.to_bits());
            let count = seen.entry(key).or_insert(0);
            if *count > 0 {
                let angle = *count as f32 * 2.399_963;
                let radius = 10.0 * (*count as f32).sqrt();
                node.position += vec2(angle.cos(), angle.sin()) * radius;
            }
            *count += 1;
        }
    }

    fn accumulate_forces(&mut self) {
        let count = self.nodes.len();
        let scratch = &mut self.scratch;
        scratch.forces.clear();
        scratch.forces.resize(count, Vec2::ZERO);
        scratch.points.clear();
        scratch.radii.clear();
        let mut max_radius = 0.0_f32;
        for node in &self.nodes {
            scratch.points.push(node.position);
            let radius = node.radius();
            scratch.radii.push(radius);
            max_radius = max_radius.max(radius);
        }

        let params = self.params;
        let forces = &mut scratch.forces;
        let points = &scratch.points;

        if let Some(root) = Cell::build(points) {
            let repulsion = Repulsion {
                strength: params.repulsion,
                softening: params.softening,
                theta: BARNES_HUT_THETA,
                max_distance_sq: params.max_repulsion_distance * params.max_repulsion_distance,
            };
            for (index, force) in forces.iter_mut().enumerate() {
                repel(&root, index, points, repulsion, force);
            }

            let reach = max_radius * 2.0 + params.collision_padding;
            let collision = Collision {
                strength: params.collision,
                padding: params.collision_padding,
                reach_sq: reach * reach,
            };
            collide(&root, &root, true, points, &scratch.radii, collision, forces);
        }

        for edge in &self.edges {
            let Some((source, target)) = edge.link else {
                continue;
            };
            let delta = points[target] - points[source];
            let distance = delta.length();
            if distance <= 0.0001 {
                continue;
            }
            let pull = delta / distance * ((distance - params.rest_length) * params.spring);
            forces[source] += pull;
            forces[target] -= pull;
        }

        for (force, point) in forces.iter_mut().zip(points) {
            *force -= *point * params.centering;
        }
    }

    fn integrate(&mut self) -> f32 {
        let params = self.params;
        let keep = 1.0 - params.velocity_decay;
        let mut energy = 0.0;

        for (node, force) in self.nodes.iter_mut().zip(&self.scratch.forces) {
            if let Some(pin) = node.pin {
                node.position = pin;
                node.velocity = Vec2::ZERO;
                continue;
            }

            let mut force = *force * self.alpha;
            let magnitude = force.length();
            if magnitude > params.max_force {
                force *= params.max_force / magnitude;
            }

            let mut velocity = (node.velocity + force) * keep;
            let speed = velocity.length();
            if speed > params.max_speed {
                velocity *= params.max_speed / speed;
            }
            if !velocity.is_finite() {
                velocity = Vec2::ZERO;
            }

            node.velocity = velocity;
            node.position += velocity;
            energy += velocity.length_sq();
        }
        energy
    }
}

fn node_position(node: &MindNode) -> Vec2 {
    let position = vec2(node.x, node.y);
    if position.is_finite() {
        position
    } else {
        Vec2::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mindmap::{EdgeKind, NodeKind};

    fn node(id: &str, x: f32, y: f32) -> MindNode {
        let mut node = MindNode::new(id, NodeKind::Idea).at(x, y);
        node.id = id.to_owned();
        node
    }

    fn edge(id: &str, source: &str, target: &str) -> MindEdge {
        let mut edge = MindEdge::new(source, target, EdgeKind::Hierarchy);
        edge.id = id.to_owned();
        edge
    }

    fn map_of(nodes: Vec<MindNode>, edges: Vec<MindEdge>) -> MindMap {
        let mut map = MindMap::new("Layout");
        map.nodes = nodes;
        map.edges = edges;
        map
    }

    #[test]
    fn empty_map_settles_immediately() {
        let mut engine = LayoutEngine::from_map(&MindMap::new("Empty"));
        assert!(!engine.tick());
        assert_eq!(engine.state(), SimulationState::Settled);

        let before = *engine.viewport();
        engine.reset_zoom();
        engine.center_view();
        assert_eq!(*engine.viewport(), before);
    }

    #[test]
    fn single_node_is_centred_at_default_zoom() {
        let map = map_of(vec![node("solo", 320.0, -75.0)], Vec::new());
        let mut engine = LayoutEngine::from_map(&map);
        engine.run_to_rest();
        engine.reset_zoom();

        assert_eq!(engine.position("solo"), Some(Vec2::ZERO));
        assert_eq!(engine.viewport().zoom, DEFAULT_ZOOM);
        assert_eq!(engine.viewport().pan, Vec2::ZERO);
    }

    #[test]
    fn last_remaining_node_returns_to_the_centre() {
        let map = map_of(
            vec![node("a", 400.0, 300.0), node("b", 600.0, 300.0)],
            vec![edge("ab", "a", "b")],
        );
        let mut engine = LayoutEngine::from_map(&map);
        engine.run_to_rest();

        engine.remove_node("b").unwrap();
        engine.run_to_rest();
        assert_eq!(engine.position("a"), Some(Vec2::ZERO));
        assert_eq!(engine.state(), SimulationState::Settled);
    }

    #[test]
    fn first_node_added_to_an_empty_map_is_centred() {
        let mut engine = LayoutEngine::from_map(&MindMap::new("Empty"));
        engine.run_to_rest();

        assert!(engine.add_node(&node("first", 250.0, -120.0)));
        engine.run_to_rest();
        assert_eq!(engine.position("first"), Some(Vec2::ZERO));
    }

    #[test]
    fn linked_pair_settles_near_rest_length() {
        let map = map_of(
            vec![node("a", -30.0, 0.0), node("b", 30.0, 0.0)],
            vec![edge("ab", "a", "b")],
        );
        let mut engine = LayoutEngine::from_map(&map);
        engine.run(200);

        let distance = (engine.position("a").unwrap() - engine.position("b").unwrap()).length();
        let rest = engine.params().rest_length;
        assert!(
            (distance - rest).abs() <= rest * 0.1,
            "distance {distance} vs rest {rest}"
        );
    }

    #[test]
    fn coincident_nodes_separate_and_terminate() {
        let nodes = (0..12).map(|i| node(&format!("n{i}"), 0.0, 0.0)).collect();
        let mut engine = LayoutEngine::from_map(&map_of(nodes, Vec::new()));
        let steps = engine.run(10_000);

        assert!(steps <= engine.params().max_ticks);
        assert_eq!(engine.state(), SimulationState::Settled);
        let points = engine.positions().map(|(_, p)| p).collect::<Vec<_>>();
        for (i, a) in points.iter().enumerate() {
            assert!(a.is_finite());
            for b in &points[i + 1..] {
                assert!((*a - *b).length() > 1.0);
            }
        }
    }

    #[test]
    fn pinned_node_stays_where_it_was_dragged() {
        let map = map_of(
            vec![node("a", 0.0, 0.0), node("b", 200.0, 0.0), node("c", 0.0, 200.0)],
            vec![edge("ab", "a", "b"), edge("ac", "a", "c")],
        );
        let mut engine = LayoutEngine::from_map(&map);
        engine.run_to_rest();

        assert!(engine.drag_start("a"));
        assert_eq!(engine.drag_state("a"), Some(NodeDrag::Pinned));
        let target = vec2(500.0, -250.0);
        assert!(engine.drag_to("a", target));
        for _ in 0..50 {
            engine.tick();
            assert_eq!(engine.position("a"), Some(target));
        }
        assert!(engine.is_running());

        assert!(engine.drag_end("a"));
        assert_eq!(engine.drag_state("a"), Some(NodeDrag::Free));
        engine.run_to_rest();
        assert_eq!(engine.state(), SimulationState::Settled);
    }

    #[test]
    fn removing_node_drops_its_edges_and_reheats() {
        let map = map_of(
            vec![node("a", 0.0, 0.0), node("b", 180.0, 0.0), node("c", 0.0, 180.0)],
            vec![edge("ab", "a", "b"), edge("bc", "b", "c")],
        );
        let mut engine = LayoutEngine::from_map(&map);
        engine.run_to_rest();

        let removed = engine.remove_node("a").unwrap();
        assert_eq!(removed, vec!["ab".to_owned()]);
        assert_eq!(engine.edge_count(), 1);
        assert!(engine.is_running());
        assert!(engine.alpha() >= REMOVE_ALPHA);
        assert_eq!(engine.links().count(), 1);
    }

    #[test]
    fn added_child_starts_near_parent() {
        let map = map_of(vec![node("root", 40.0, 40.0)], Vec::new());
        let mut engine = LayoutEngine::from_map(&map);
        engine.run_to_rest();

        let child = node("child", 0.0, 0.0).with_parent("root");
        assert!(engine.add_node(&child));
        let parent = engine.position("root").unwrap();
        let placed = engine.position("child").unwrap();
        assert!(((placed - parent).length() - engine.params().rest_length).abs() < 1.0);
    }

    #[test]
    fn dangling_edges_are_ignored_until_resolved() {
        let map = map_of(vec![node("a", 0.0, 0.0)], vec![edge("ax", "a", "x")]);
        let mut engine = LayoutEngine::from_map(&map);
        assert_eq!(engine.links().count(), 0);
        engine.add_node(&node("x", 100.0, 0.0));
        assert_eq!(engine.links().count(), 1);
    }

    #[test]
    fn write_back_copies_positions_and_camera() {
        let mut map = map_of(vec![node("a", 10.0, 0.0), node("b", 20.0, 0.0)], Vec::new());
        let mut engine = LayoutEngine::from_map(&map);
        engine.run_to_rest();
        engine.zoom_in();
        engine.write_back(&mut map);

        let a = engine.position("a").unwrap();
        assert_eq!((map.nodes[0].x, map.nodes[0].y), (a.x, a.y));
        assert!(map.viewport.zoom > DEFAULT_ZOOM);
    }

    #[test]
    fn disposed_engine_ignores_further_work() {
        let map = map_of(vec![node("a", 0.0, 0.0), node("b", 5.0, 0.0)], Vec::new());
        let mut engine = LayoutEngine::from_map(&map);
        engine.dispose();

        assert_eq!(engine.state(), SimulationState::Disposed);
        assert!(!engine.tick());
        assert!(!engine.drag_start("a"));
        assert!(!engine.add_node(&node("c", 0.0, 0.0)));
        assert_eq!(engine.node_count(), 0);
    }

    #[test]
    fn manual_layout_does_not_simulate() {
        let mut map = map_of(vec![node("a", 0.0, 0.0), node("b", 5.0, 0.0)], Vec::new());
        map.layout.algorithm = LayoutAlgorithm::Manual;
        let mut engine = LayoutEngine::from_map(&map);
        assert_eq!(engine.run(100), 0);
        assert_eq!(engine.position("b"), Some(vec2(5.0, 0.0)));
    }
}
