//! Local mirror of the arena objects

use std::collections::HashMap;

use rand::Rng;

use crate::comms::protocol::{ObjectType, Point, WorldObject, WorldUpdate};
use crate::error::BotError;

/// Every object the server has told us about, keyed by object id
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    objects: HashMap<String, WorldObject>,
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn get(&self, id: &str) -> Option<&WorldObject> {
        self.objects.get(id)
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    /// Insert or replace objects by id
    pub fn merge_updates(&mut self, updated: HashMap<String, WorldObject>) {
        self.objects.extend(updated);
    }

    /// Drop deleted ids, unknown ids are ignored
    pub fn remove_deleted(&mut self, deleted: &[String]) {
        for id in deleted {
            self.objects.remove(id);
        }
    }

    /// Apply a turn update: deletions first, then inserts/replacements
    pub fn apply_update(&mut self, update: WorldUpdate) {
        self.remove_deleted(&update.deleted_objects);
        self.merge_updates(update.updated_objects);
    }

    /// All objects of a given type
    pub fn of_type(&self, kind: ObjectType) -> impl Iterator<Item = (&String, &WorldObject)> {
        self.objects.iter().filter(move |(_, obj)| obj.kind == kind)
    }

    /// Point position of a single-point object such as a tank
    pub fn point_of(&self, id: &str) -> Result<Point, BotError> {
        let object = self
            .get(id)
            .ok_or_else(|| BotError::MissingEntity(id.to_string()))?;
        object
            .position
            .as_point()
            .ok_or_else(|| BotError::Protocol(format!("object {} has no point position", id)))
    }

    /// Arena size from the corners of every BOUNDARY object
    pub fn arena_bounds(&self) -> Result<ArenaBounds, BotError> {
        ArenaBounds::from_points(
            self.of_type(ObjectType::Boundary)
                .flat_map(|(_, obj)| obj.position.points().iter().copied()),
        )
        .ok_or_else(|| {
            BotError::Configuration("no boundary objects received during init".to_string())
        })
    }

    /// Current closing boundary edges, if one exists
    pub fn closing_boundary(&self) -> Option<ClosingBoundary> {
        self.of_type(ObjectType::ClosingBoundary)
            .next()
            .and_then(|(_, obj)| ClosingBoundary::from_points(obj.position.points()))
    }
}

/// Arena dimensions, fixed for the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaBounds {
    pub width: f64,
    pub height: f64,
}

impl ArenaBounds {
    /// Largest X and largest Y over the given corners
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        points.into_iter().fold(None, |bounds, p| {
            Some(match bounds {
                None => Self {
                    width: p.x,
                    height: p.y,
                },
                Some(b) => Self {
                    width: b.width.max(p.x),
                    height: b.height.max(p.y),
                },
            })
        })
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Edges of the shrinking play area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosingBoundary {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl ClosingBoundary {
    /// Edges from rectangle corners given in any order
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            top: first.y,
            right: first.x,
            bottom: first.y,
            left: first.x,
        };
        Some(points.iter().fold(init, |b, p| Self {
            top: b.top.max(p.y),
            right: b.right.max(p.x),
            bottom: b.bottom.min(p.y),
            left: b.left.min(p.x),
        }))
    }

    /// Whole arena, used until the server sends a closing boundary
    pub fn from_arena(arena: &ArenaBounds) -> Self {
        Self {
            top: arena.height,
            right: arena.width,
            bottom: 0.0,
            left: 0.0,
        }
    }

    /// Distance from a point to the nearest edge (negative when outside)
    pub fn nearest_edge_distance(&self, p: Point) -> f64 {
        (p.y - self.bottom)
            .min(self.top - p.y)
            .min(p.x - self.left)
            .min(self.right - p.x)
    }

    /// Uniform random point inside the area, kept `margin` away from every edge.
    /// Collapses to the centre on an axis narrower than twice the margin.
    pub fn random_point_inside<R: Rng>(&self, rng: &mut R, margin: f64) -> Point {
        let x = Self::sample_axis(rng, self.left + margin, self.right - margin);
        let y = Self::sample_axis(rng, self.bottom + margin, self.top - margin);
        Point::new(x, y)
    }

    fn sample_axis<R: Rng>(rng: &mut R, low: f64, high: f64) -> f64 {
        if low < high {
            rng.gen_range(low..=high)
        } else {
            (low + high) / 2.0
        }
    }
}
