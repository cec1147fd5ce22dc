//! Masked strands: over/under intervals at crossings.
//!
//! Crossings are found by sampling one strand against the closest points
//! of the other. Nearby hits collapse first-wins so each physical crossing
//! yields one mask interval.

use crate::strand::{MaskSegment, Strand};
use kurbo::Point;

pub const INTERSECTION_THRESHOLD: f64 = 10.0;
/// Samples taken along each segment of the first strand.
const CROSSING_SAMPLES: usize = 50;
/// Samples used for the closest-point search on the second strand.
const CLOSEST_SAMPLES: usize = 50;
/// Half-width of the interval written by [`Strand::auto_masked`].
const MASK_HALF_WIDTH: f64 = 0.05;

/// A sampled crossing between two strands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub segment1: usize,
    pub t1: f64,
    pub segment2: usize,
    pub t2: f64,
    pub point: Point,
}

/// Sampled crossings of `a` against `b`, merged within `2 * threshold`.
pub fn find_intersections(a: &Strand, b: &Strand, threshold: f64) -> Vec<Intersection> {
    let mut hits = Vec::new();
    for (i, seg1) in a.segments.iter().enumerate() {
        for (j, seg2) in b.segments.iter().enumerate() {
            for k in 0..=CROSSING_SAMPLES {
                let t1 = k as f64 / CROSSING_SAMPLES as f64;
                let point = seg1.bezier.point_at(t1);
                let closest = seg2.bezier.closest_point(point, CLOSEST_SAMPLES);
                if closest.distance < threshold {
                    hits.push(Intersection {
                        segment1: i,
                        t1,
                        segment2: j,
                        t2: closest.t,
                        point,
                    });
                }
            }
        }
    }
    merge_intersections(hits, threshold * 2.0)
}

/// Keep the first hit of each cluster of points closer than `radius`.
pub fn merge_intersections(hits: Vec<Intersection>, radius: f64) -> Vec<Intersection> {
    let mut merged: Vec<Intersection> = Vec::new();
    for hit in hits {
        if merged.iter().all(|m| m.point.distance(hit.point) >= radius) {
            merged.push(hit);
        }
    }
    merged
}

impl Strand {
    pub fn is_masked(&self) -> bool {
        !self.masks.is_empty()
    }

    pub fn with_mask(&self, mask: MaskSegment) -> Self {
        let mut out = self.clone();
        out.masks.push(mask);
        out
    }

    /// Drop the mask at `index`; out-of-range indices are ignored.
    pub fn without_mask(&self, index: usize) -> Self {
        let mut out = self.clone();
        if index < out.masks.len() {
            out.masks.remove(index);
        }
        out
    }

    pub fn with_masks_cleared(&self) -> Self {
        let mut out = self.clone();
        out.masks.clear();
        out
    }

    /// Append one interval per crossing with `other`.
    pub fn auto_masked(&self, other: &Strand, is_over: bool) -> Self {
        let crossings = find_intersections(self, other, INTERSECTION_THRESHOLD);
        if crossings.is_empty() {
            return self.clone();
        }
        let mut out = self.clone();
        out.masks.extend(crossings.iter().map(|c| MaskSegment {
            strand_id: other.id,
            segment_index: c.segment1,
            t_start: (c.t1 - MASK_HALF_WIDTH).max(0.0),
            t_end: (c.t1 + MASK_HALF_WIDTH).min(1.0),
            is_over,
        }));
        out
    }

    pub fn with_mask_toggled(&self, index: usize) -> Self {
        let mut out = self.clone();
        if let Some(mask) = out.masks.get_mut(index) {
            mask.is_over = !mask.is_over;
        }
        out
    }

    /// First mask whose interval encloses `t` on `segment_index`.
    pub fn mask_at(&self, segment_index: usize, t: f64) -> Option<&MaskSegment> {
        self.masks.iter().find(|m| m.contains(segment_index, t))
    }

    pub fn has_mask_with(&self, other: &Strand) -> bool {
        self.masks.iter().any(|m| m.strand_id == other.id)
    }
}
