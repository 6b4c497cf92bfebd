use eframe::egui::{Vec2, vec2};

use super::quadtree::Cell;

const MIN_DISTANCE: f32 = 0.0001;

#[derive(Clone, Copy)]
pub(super) struct Repulsion {
    pub(super) strength: f32,
    pub(super) softening: f32,
    pub(super) theta: f32,
    /// Pairs further apart than this do not repel.
    pub(super) max_distance_sq: f32,
}

#[derive(Clone, Copy)]
pub(super) struct Collision {
    pub(super) strength: f32,
    pub(super) padding: f32,
    pub(super) reach_sq: f32,
}

/// Direction used when two nodes sit on the same spot. Deterministic in the
/// pair so repeated runs separate them the same way.
pub(super) fn separation_axis(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214 + 0.1) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

fn direction_between(from: Vec2, to: Vec2, a: usize, b: usize) -> (Vec2, f32) {
    let delta = from - to;
    let distance = delta.length();
    if distance > MIN_DISTANCE {
        (delta / distance, distance)
    } else if a < b {
        (separation_axis(a, b), 0.0)
    } else {
        (-separation_axis(b, a), 0.0)
    }
}

/// Adds the repulsion acting on node `index` from every node under `cell`.
pub(super) fn repel(
    cell: &Cell,
    index: usize,
    points: &[Vec2],
    params: Repulsion,
    force: &mut Vec2,
) {
    if cell.weight <= 0.0 {
        return;
    }
    let point = points[index];

    if cell.is_leaf() {
        for &other in &cell.members {
            if other == index {
                continue;
            }
            let (direction, distance) = direction_between(point, points[other], index, other);
            let distance_sq = distance * distance;
            if distance_sq > params.max_distance_sq {
                continue;
            }
            *force += direction * (params.strength / (distance_sq + params.softening));
        }
        return;
    }

    let delta = point - cell.centroid;
    let distance_sq = delta.length_sq().max(MIN_DISTANCE);
    let distance = distance_sq.sqrt();
    let far_enough = !cell.region.contains(point) && cell.region.width() / distance < params.theta;
    if far_enough {
        if distance_sq <= params.max_distance_sq {
            *force += (delta / distance)
                * (params.strength * cell.weight / (distance_sq + params.softening));
        }
        return;
    }

    for child in cell.children() {
        repel(child, index, points, params, force);
    }
}

fn push_apart(
    a: usize,
    b: usize,
    points: &[Vec2],
    radii: &[f32],
    params: Collision,
    forces: &mut [Vec2],
) {
    let (direction, distance) = direction_between(points[a], points[b], a, b);
    let min_distance = radii[a] + radii[b] + params.padding;
    if distance < min_distance {
        let push = direction * ((min_distance - distance) * params.strength * 0.5);
        forces[a] += push;
        forces[b] -= push;
    }
}

/// Pushes overlapping nodes apart. Walks pairs of cells and skips any pair
/// whose regions are further apart than `reach`.
pub(super) fn collide(
    a: &Cell,
    b: &Cell,
    same: bool,
    points: &[Vec2],
    radii: &[f32],
    params: Collision,
    forces: &mut [Vec2],
) {
    if !same && a.region.gap_sq(b.region) > params.reach_sq {
        return;
    }

    if a.is_leaf() && b.is_leaf() {
        if same {
            for (offset, &first) in a.members.iter().enumerate() {
                for &second in &a.members[offset + 1..] {
                    push_apart(first, second, points, radii, params, forces);
                }
            }
        } else {
            for &first in &a.members {
                for &second in &b.members {
                    push_apart(first, second, points, radii, params, forces);
                }
            }
        }
        return;
    }

    if same {
        let children = a.children().collect::<Vec<_>>();
        for (offset, first) in children.iter().enumerate() {
            collide(first, first, true, points, radii, params, forces);
            for second in &children[offset + 1..] {
                collide(first, second, false, points, radii, params, forces);
            }
        }
        return;
    }

    let split_a = !a.is_leaf() && (b.is_leaf() || a.region.half >= b.region.half);
    if split_a {
        for child in a.children() {
            collide(child, b, false, points, radii, params, forces);
        }
    } else {
        for child in b.children() {
            collide(a, child, false, points, radii, params, forces);
        }
    }
}
