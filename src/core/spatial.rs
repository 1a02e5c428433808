//! Spatial-Index (KD-Tree) über Liniensegmente für Nähe-Abfragen.
//!
//! Indexiert werden die Segment-Mittelpunkte. Eine Radius-Abfrage erweitert
//! den Suchradius um die halbe Länge des längsten Segments und filtert danach
//! exakt über den Punkt-Segment-Abstand.

use geo_types::LineString;
use glam::DVec2;
use kiddo::{KdTree, SquaredEuclidean};

use super::geometry::xy;

/// Ergebnis einer Abstandsabfrage gegen den Segment-Index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentMatch {
    /// Schlüssel des Linienzugs, zu dem das Segment gehört
    pub owner_id: u64,
    /// Euklidischer Abstand zum Suchpunkt
    pub distance: f64,
    /// Nächster Punkt auf dem Segment
    pub closest: DVec2,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    owner_id: u64,
    start: DVec2,
    end: DVec2,
}

impl Segment {
    fn closest_point(&self, query: DVec2) -> DVec2 {
        let delta = self.end - self.start;
        let length_sq = delta.length_squared();
        if length_sq <= f64::EPSILON {
            return self.start;
        }
        let t = ((query - self.start).dot(delta) / length_sq).clamp(0.0, 1.0);
        self.start + delta * t
    }
}

/// Read-only Index über allen Segmenten einer Menge von Linienzügen.
#[derive(Debug, Clone)]
pub struct SegmentIndex {
    tree: KdTree<f64, 2>,
    segments: Vec<Segment>,
    max_half_length: f64,
}

impl SegmentIndex {
    /// Erstellt einen leeren Index.
    pub fn empty() -> Self {
        Self {
            tree: (&Vec::<[f64; 2]>::new()).into(),
            segments: Vec::new(),
            max_half_length: 0.0,
        }
    }

    /// Baut den Index aus `(Schlüssel, Linienzug)`-Paaren.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = (u64, &'a LineString<f64>)>) -> Self {
        let mut segments = Vec::new();
        for (owner_id, line) in lines {
            segments.extend(line.lines().map(|l| Segment {
                owner_id,
                start: xy(l.start),
                end: xy(l.end),
            }));
        }

        let entries: Vec<[f64; 2]> = segments
            .iter()
            .map(|s| {
                let mid = (s.start + s.end) * 0.5;
                [mid.x, mid.y]
            })
            .collect();
        let tree: KdTree<f64, 2> = (&entries).into();

        let max_half_length = segments
            .iter()
            .map(|s| s.start.distance(s.end) * 0.5)
            .fold(0.0, f64::max);

        Self {
            tree,
            segments,
            max_half_length,
        }
    }

    /// Anzahl indexierter Segmente.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// `true`, wenn keine Segmente im Index liegen.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Findet alle Linienzüge, die dem Punkt näher als `radius` kommen.
    ///
    /// Pro Linienzug wird nur der nächste Treffer geliefert, aufsteigend nach Abstand.
    pub fn within_radius(&self, query: DVec2, radius: f64) -> Vec<SegmentMatch> {
        if self.is_empty() || radius.is_sign_negative() {
            return Vec::new();
        }

        let search = radius + self.max_half_length;
        let mut best: Vec<SegmentMatch> = Vec::new();
        for entry in self
            .tree
            .within::<SquaredEuclidean>(&[query.x, query.y], search * search)
        {
            let Some(segment) = self.segments.get(entry.item as usize) else {
                continue;
            };
            let closest = segment.closest_point(query);
            let distance = closest.distance(query);
            if distance > radius {
                continue;
            }

            match best.iter_mut().find(|m| m.owner_id == segment.owner_id) {
                Some(existing) if existing.distance <= distance => {}
                Some(existing) => {
                    existing.distance = distance;
                    existing.closest = closest;
                }
                None => best.push(SegmentMatch {
                    owner_id: segment.owner_id,
                    distance,
                    closest,
                }),
            }
        }

        best.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.owner_id.cmp(&b.owner_id))
        });
        best
    }

    /// Nächster Linienzug zum Punkt über alle Segmente.
    ///
    /// Nutzt den KD-Tree für den nächsten Mittelpunkt und prüft danach alle
    /// Segmente im dadurch begrenzten Radius.
    pub fn nearest(&self, query: DVec2) -> Option<SegmentMatch> {
        if self.is_empty() {
            return None;
        }

        let result = self
            .tree
            .nearest_one::<SquaredEuclidean>(&[query.x, query.y]);
        let segment = self.segments.get(result.item as usize)?;
        let upper_bound = segment.closest_point(query).distance(query);
        self.within_radius(query, upper_bound).into_iter().next()
    }
}
