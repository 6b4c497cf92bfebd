use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 12;

/// Axis-aligned square.
#[derive(Clone, Copy, Debug)]
pub(super) struct Region {
    pub(super) center: Vec2,
    pub(super) half: f32,
}

impl Region {
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        let (min, max) = points.iter().fold(
            (
                vec2(f32::INFINITY, f32::INFINITY),
                vec2(f32::NEG_INFINITY, f32::NEG_INFINITY),
            ),
            |(min, max), point| (min.min(*point), max.max(*point)),
        );
        if !(min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite()) {
            return None;
        }

        let span = (max - min).max_elem().max(1.0);
        Some(Self {
            center: (min + max) * 0.5,
            half: span * 0.5 + 1.0,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        let offset = (point - self.center).abs();
        offset.x <= self.half && offset.y <= self.half
    }

    pub(super) fn width(self) -> f32 {
        self.half * 2.0
    }

    /// Squared gap between two regions; zero when they touch or overlap.
    pub(super) fn gap_sq(self, other: Self) -> f32 {
        let reach = self.half + other.half;
        let gap = ((self.center - other.center).abs() - vec2(reach, reach)).max(Vec2::ZERO);
        gap.length_sq()
    }

    fn quadrant(self, index: usize) -> Self {
        let half = self.half * 0.5;
        let sx = if index & 1 == 0 { -half } else { half };
        let sy = if index & 2 == 0 { -half } else { half };
        Self {
            center: self.center + vec2(sx, sy),
            half,
        }
    }

    fn quadrant_of(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }
}

/// Barnes-Hut cell. Leaves hold their members; inner cells only summarise.
pub(super) struct Cell {
    pub(super) region: Region,
    pub(super) centroid: Vec2,
    pub(super) weight: f32,
    pub(super) members: Vec<usize>,
    pub(super) quadrants: [Option<Box<Cell>>; 4],
}

impl Cell {
    pub(super) fn build(points: &[Vec2]) -> Option<Self> {
        let region = Region::enclosing(points)?;
        Some(Self::subdivide(region, (0..points.len()).collect(), points, 0))
    }

    fn subdivide(region: Region, members: Vec<usize>, points: &[Vec2], depth: usize) -> Self {
        let weight = members.len() as f32;
        let centroid = if members.is_empty() {
            region.center
        } else {
            members
                .iter()
                .fold(Vec2::ZERO, |sum, &index| sum + points[index])
                / weight
        };

        let mut cell = Self {
            region,
            centroid,
            weight,
            members,
            quadrants: Default::default(),
        };
        if depth >= MAX_DEPTH || cell.members.len() <= LEAF_CAPACITY {
            return cell;
        }

        let mut buckets: [Vec<usize>; 4] = Default::default();
        for &index in &cell.members {
            buckets[region.quadrant_of(points[index])].push(index);
        }
        // Coincident points all land in one bucket; keep them as a leaf.
        if buckets.iter().filter(|bucket| !bucket.is_empty()).count() < 2 {
            return cell;
        }

        for (index, bucket) in buckets.into_iter().enumerate() {
            if !bucket.is_empty() {
                cell.quadrants[index] = Some(Box::new(Self::subdivide(
                    region.quadrant(index),
                    bucket,
                    points,
                    depth + 1,
                )));
            }
        }
        cell.members.clear();
        cell
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.quadrants.iter().all(Option::is_none)
    }

    pub(super) fn children(&self) -> impl Iterator<Item = &Cell> {
        self.quadrants.iter().filter_map(|child| child.as_deref())
    }
}
