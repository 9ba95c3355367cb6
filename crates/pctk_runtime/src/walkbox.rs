//! Walkable-area geometry and pathfinding.
//!
//! A room's floor is a set of convex quads. Two enabled boxes are adjacent
//! when each contains a vertex of the other; the shared vertex is the gate
//! an actor walks through between them. Routes between non-adjacent boxes
//! come from an all-pairs next-hop matrix recomputed whenever a box is
//! enabled or disabled.

use std::collections::HashMap;

use glam::Vec2;
use thiserror::Error;

use pctk_core::geometry::{closest_point_on_segment, cross};
use pctk_resource::format::WalkboxData;

#[derive(Debug, Error)]
pub enum WalkboxError {
    #[error("walkbox '{id}' has invalid geometry: {reason}")]
    InvalidGeometry { id: String, reason: String },
}

/// Distance sentinel for unreachable box pairs.
const UNREACHABLE: u8 = u8::MAX;
/// Itinerary sentinel for pairs with no route.
const NO_ROUTE: i32 = -1;

/// A convex quad in simulation space. Construction rejects concave and
/// degenerate vertex sets; a configuration bug here must fail loudly rather
/// than produce actors walking through walls.
#[derive(Debug)]
pub struct Walkbox {
    pub id: String,
    pub enabled: bool,
    vertices: [Vec2; 4],
}

impl Walkbox {
    pub fn new(id: impl Into<String>, vertices: [Vec2; 4]) -> Result<Self, WalkboxError> {
        let id = id.into();
        check_convex(&id, &vertices)?;
        Ok(Self {
            id,
            enabled: true,
            vertices,
        })
    }

    pub fn from_data(data: &WalkboxData) -> Result<Self, WalkboxError> {
        let vertices = data
            .vertices
            .map(|(x, y)| Vec2::new(x as f32, y as f32));
        let mut walkbox = Self::new(data.id.clone(), vertices)?;
        walkbox.enabled = data.enabled;
        Ok(walkbox)
    }

    pub fn vertices(&self) -> &[Vec2; 4] {
        &self.vertices
    }

    /// Vertex equality counts as inside; otherwise an even-odd ray cast
    /// against the four edges.
    pub fn contains(&self, p: Vec2) -> bool {
        if self.vertices.iter().any(|&v| v == p) {
            return true;
        }
        let mut inside = false;
        let mut j = 3;
        for i in 0..4 {
            let (vi, vj) = (self.vertices[i], self.vertices[j]);
            if (vi.y > p.y) != (vj.y > p.y)
                && p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// `p` itself when inside, otherwise the nearest point on the boundary.
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        if self.contains(p) {
            return p;
        }
        let mut best = self.vertices[0];
        let mut best_dist = f32::MAX;
        for i in 0..4 {
            let candidate =
                closest_point_on_segment(self.vertices[i], self.vertices[(i + 1) % 4], p);
            let dist = candidate.distance_squared(p);
            if dist < best_dist {
                best = candidate;
                best_dist = dist;
            }
        }
        best
    }
}

/// Walk consecutive vertex triples accumulating cross-product signs. Zero
/// crosses (collinear triples) are skipped; a sign flip or an all-zero total
/// rejects the quad.
fn check_convex(id: &str, vertices: &[Vec2; 4]) -> Result<(), WalkboxError> {
    let mut total = 0.0f32;
    let mut first_sign = 0.0f32;
    for i in 0..4 {
        let p1 = vertices[i];
        let p2 = vertices[(i + 1) % 4];
        let p3 = vertices[(i + 2) % 4];
        let c = cross(p2 - p1, p3 - p2);
        total += c;
        if c == 0.0 {
            continue;
        }
        if first_sign == 0.0 {
            first_sign = c;
        } else if (c > 0.0) != (first_sign > 0.0) {
            return Err(WalkboxError::InvalidGeometry {
                id: id.to_string(),
                reason: "vertices are not convex".into(),
            });
        }
    }
    if total == 0.0 {
        return Err(WalkboxError::InvalidGeometry {
            id: id.to_string(),
            reason: "vertices are degenerate".into(),
        });
    }
    Ok(())
}

/// All the walkboxes of one room plus the precomputed routing tables.
pub struct WalkboxMatrix {
    boxes: Vec<Walkbox>,
    distance: Vec<Vec<u8>>,
    itinerary: Vec<Vec<i32>>,
    gates: HashMap<(usize, usize), Vec2>,
}

impl WalkboxMatrix {
    pub fn new(boxes: Vec<Walkbox>) -> Self {
        let mut matrix = Self {
            boxes,
            distance: Vec::new(),
            itinerary: Vec::new(),
            gates: HashMap::new(),
        };
        matrix.reset_itinerary();
        matrix
    }

    pub fn from_data(data: &[WalkboxData]) -> Result<Self, WalkboxError> {
        let boxes = data
            .iter()
            .map(Walkbox::from_data)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(boxes))
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Walkbox> {
        self.boxes.get(index)
    }

    /// Flip a box's enabled flag by id and rebuild the routing tables.
    /// Returns false when no box has that id.
    pub fn enable_walkbox(&mut self, id: &str, enabled: bool) -> bool {
        let Some(walkbox) = self.boxes.iter_mut().find(|b| b.id == id) else {
            return false;
        };
        walkbox.enabled = enabled;
        self.reset_itinerary();
        true
    }

    /// The shared vertex actors pass through between adjacent boxes `i` and
    /// `j`.
    pub fn gate(&self, i: usize, j: usize) -> Option<Vec2> {
        self.gates.get(&(i, j)).copied()
    }

    /// Rebuild distance and next-hop tables with Floyd-Warshall over the
    /// adjacency graph of enabled boxes.
    pub fn reset_itinerary(&mut self) {
        let n = self.boxes.len();
        self.gates.clear();
        self.distance = vec![vec![UNREACHABLE; n]; n];
        self.itinerary = vec![vec![NO_ROUTE; n]; n];
        for i in 0..n {
            self.distance[i][i] = 0;
            self.itinerary[i][i] = i as i32;
        }
        for i in 0..n {
            for j in (i + 1)..n {
                if !self.boxes[i].enabled || !self.boxes[j].enabled {
                    continue;
                }
                if let Some(gate) = self.shared_gate(i, j) {
                    self.distance[i][j] = 1;
                    self.distance[j][i] = 1;
                    self.itinerary[i][j] = j as i32;
                    self.itinerary[j][i] = i as i32;
                    self.gates.insert((i, j), gate);
                    self.gates.insert((j, i), gate);
                }
            }
        }
        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    let through = self.distance[i][k].saturating_add(self.distance[k][j]);
                    if through < self.distance[i][j] {
                        self.distance[i][j] = through;
                        self.itinerary[i][j] = self.itinerary[i][k];
                    }
                }
            }
        }
    }

    /// Adjacency requires agreement in both directions: a vertex of each box
    /// inside the other. The gate is the first vertex of the lower-indexed
    /// box found inside the higher-indexed one.
    fn shared_gate(&self, i: usize, j: usize) -> Option<Vec2> {
        let (a, b) = (&self.boxes[i], &self.boxes[j]);
        let a_in_b = a.vertices.iter().find(|&&v| b.contains(v));
        let b_in_a = b.vertices.iter().find(|&&v| a.contains(v));
        match (a_in_b, b_in_a) {
            (Some(&gate), Some(_)) => Some(gate),
            _ => None,
        }
    }

    /// The enabled box containing `p` (ties to the lowest index), or the one
    /// whose boundary is nearest.
    pub fn locate(&self, p: Vec2) -> Option<usize> {
        let enabled = || self.boxes.iter().enumerate().filter(|(_, b)| b.enabled);
        if let Some((index, _)) = enabled().find(|(_, b)| b.contains(p)) {
            return Some(index);
        }
        enabled()
            .map(|(index, b)| (index, b.closest_point(p).distance_squared(p)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    /// Waypoints from `from` to `to`: one gate per box transition, ending at
    /// the closest reachable point to `to`. Empty when there is no route.
    pub fn path(&self, from: Vec2, to: Vec2) -> Vec<Vec2> {
        let (Some(mut current), Some(target)) = (self.locate(from), self.locate(to)) else {
            return Vec::new();
        };
        let mut waypoints = Vec::new();
        while current != target {
            let next = self.itinerary[current][target];
            if next == NO_ROUTE {
                return Vec::new();
            }
            let next = next as usize;
            if let Some(gate) = self.gates.get(&(current, next)) {
                waypoints.push(*gate);
            }
            current = next;
        }
        waypoints.push(self.boxes[current].closest_point(to));
        waypoints
    }
}
