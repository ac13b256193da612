use std::collections::{BTreeMap, BTreeSet};

use rstar::{RTree, RTreeObject, AABB};

use crate::polygon::Footprint;
use crate::{Geometry, Polygon};

/// Indexes keyed polygons to answer "which of these touch some shape?" An R-tree over bounding
/// boxes narrows the candidates, then an exact intersection test decides.
pub struct FindIntersecting<K> {
    geometries: BTreeMap<K, Prepared>,
    tree: RTree<Entry<K>>,
}

struct Prepared {
    polygon: geo::Polygon<f64>,
    aabb: AABB<[f64; 2]>,
}

struct Entry<K> {
    key: K,
    aabb: AABB<[f64; 2]>,
}

impl<K> RTreeObject for Entry<K> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// A query shape converted once, instead of per candidate.
struct QueryShape {
    parts: Vec<QueryPart>,
}

struct QueryPart {
    footprint: Footprint,
    aabb: AABB<[f64; 2]>,
}

impl QueryPart {
    fn intersects(&self, candidate: &Prepared) -> bool {
        overlaps(&self.aabb, &candidate.aabb) && self.footprint.intersects(&candidate.polygon)
    }
}

impl QueryShape {
    fn new(shape: &Geometry) -> QueryShape {
        let parts = match shape {
            Geometry::Point(pt) => {
                let coord: geo::Coordinate<f64> = (*pt).into();
                vec![QueryPart {
                    footprint: Footprint::Point(coord),
                    aabb: AABB::from_point([coord.x, coord.y]),
                }]
            }
            _ => shape
                .polygons()
                .into_iter()
                .map(|p| QueryPart {
                    footprint: p.footprint(),
                    aabb: p.get_bounds().as_aabb(),
                })
                .collect(),
        };
        QueryShape { parts }
    }

    fn intersects(&self, candidate: &Prepared) -> bool {
        self.parts.iter().any(|part| part.intersects(candidate))
    }
}

fn overlaps(a: &AABB<[f64; 2]>, b: &AABB<[f64; 2]>) -> bool {
    let (a_lower, a_upper) = (a.lower(), a.upper());
    let (b_lower, b_upper) = (b.lower(), b.upper());
    a_lower[0] <= b_upper[0]
        && b_lower[0] <= a_upper[0]
        && a_lower[1] <= b_upper[1]
        && b_lower[1] <= a_upper[1]
}

impl<K> FindIntersecting<K>
where
    K: Clone + Ord,
{
    /// If a key repeats, the last polygon wins.
    pub fn new<'a, I: IntoIterator<Item = (K, &'a Polygon)>>(entries: I) -> FindIntersecting<K> {
        let mut geometries = BTreeMap::new();
        for (key, polygon) in entries {
            geometries.insert(
                key,
                Prepared {
                    polygon: polygon.to_geo(),
                    aabb: polygon.get_bounds().as_aabb(),
                },
            );
        }
        let tree = RTree::bulk_load(
            geometries
                .iter()
                .map(|(key, prepared)| Entry {
                    key: key.clone(),
                    aabb: prepared.aabb,
                })
                .collect(),
        );
        FindIntersecting { geometries, tree }
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Every key whose polygon shares any point with the shape.
    pub fn query(&self, shape: &Geometry) -> BTreeSet<K> {
        let query = QueryShape::new(shape);
        let mut result = BTreeSet::new();
        for part in &query.parts {
            for entry in self.tree.locate_in_envelope_intersecting(&part.aabb) {
                if result.contains(&entry.key) {
                    continue;
                }
                if query.intersects(&self.geometries[&entry.key]) {
                    result.insert(entry.key.clone());
                }
            }
        }
        result
    }

    /// The same answer as `query`, intersected with `candidates`, but only the candidates are
    /// tested. Unknown candidate keys are ignored.
    pub fn query_subset(&self, shape: &Geometry, candidates: &BTreeSet<K>) -> BTreeSet<K> {
        let query = QueryShape::new(shape);
        candidates
            .iter()
            .filter(|key| {
                self.geometries
                    .get(*key)
                    .map(|prepared| query.intersects(prepared))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// The slow, exhaustive version of `query`, ignoring the R-tree.
    pub fn query_brute_force(&self, shape: &Geometry) -> BTreeSet<K> {
        let query = QueryShape::new(shape);
        self.geometries
            .iter()
            .filter(|(_, prepared)| query.intersects(prepared))
            .map(|(key, _)| key.clone())
            .collect()
    }
}
