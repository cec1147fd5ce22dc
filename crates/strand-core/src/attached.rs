//! Attached strands: endpoints pinned onto other strands.
//!
//! A child records where it is pinned in `attachments`; the parent records
//! the child in `attached_strand_ids` and marks the side in `has_circles`.
//! Positions are re-resolved from parents with [`Strand::with_attached_positions`].

use crate::id::StrandId;
use crate::strand::{Attachment, Attachments, Side, Strand};
use kurbo::Point;
use std::collections::HashMap;

/// Minimum length a strand created from a parent should reach.
pub const ATTACHED_MIN_LENGTH: f64 = 40.0;

impl Attachment {
    /// Anchor on the given endpoint of `parent`.
    pub fn to_endpoint(parent: &Strand, side: Side) -> Self {
        Self {
            strand_id: parent.id,
            segment_index: parent.segment_index_for(side),
            t: side.t(),
            attachment_side: Some(side),
        }
    }
}

impl Strand {
    /// Tag `self` with attachment descriptors.
    pub fn attached(&self, start: Option<Attachment>, end: Option<Attachment>) -> Self {
        let mut out = self.clone();
        out.attachments = Some(Attachments { start, end });
        out
    }

    /// Nascent child growing out of `parent`'s `side` endpoint.
    pub fn from_parent(id: StrandId, parent: &Strand, start_point: Point, side: Side) -> Self {
        let mut child = Strand::initial(id, start_point, parent.style.clone());
        child.parent_id = Some(parent.id);
        child.attachment_side = Some(side);
        child.has_circles = [true, false];
        child.start_attached = true;
        child.min_length = Some(ATTACHED_MIN_LENGTH);
        child.is_start_side = Some(true);
        child.inherit_curvature(parent);
        child.attachments = Some(Attachments {
            start: Some(Attachment::to_endpoint(parent, side)),
            end: None,
        });
        child
    }

    pub fn inherit_curvature(&mut self, parent: &Strand) {
        self.curve_response_exponent = parent.curve_response_exponent;
        self.control_point_base_fraction = parent.control_point_base_fraction;
        self.distance_multiplier = parent.distance_multiplier;
        self.endpoint_tension = parent.endpoint_tension;
    }

    pub fn is_attached(&self) -> bool {
        self.attachments.as_ref().is_some_and(|a| !a.is_empty())
    }

    pub fn attachment(&self, side: Side) -> Option<&Attachment> {
        self.attachments.as_ref()?.get(side)
    }

    pub fn attach_start(&self, attachment: Attachment) -> Self {
        let mut out = self.clone();
        out.attachments.get_or_insert_with(Attachments::default).start = Some(attachment);
        out.start_attached = true;
        out
    }

    pub fn attach_end(&self, attachment: Attachment) -> Self {
        let mut out = self.clone();
        out.attachments.get_or_insert_with(Attachments::default).end = Some(attachment);
        out.end_attached = true;
        out
    }

    pub fn detach_start(&self) -> Self {
        let mut out = self.clone();
        if let Some(a) = out.attachments.as_mut() {
            a.start = None;
        }
        out.start_attached = false;
        out.parent_id = None;
        out.attachment_side = None;
        out.has_circles[Side::Start.index()] = false;
        out
    }

    pub fn detach_end(&self) -> Self {
        let mut out = self.clone();
        if let Some(a) = out.attachments.as_mut() {
            a.end = None;
        }
        out.end_attached = false;
        out.has_circles[Side::End.index()] = false;
        out
    }

    /// Where the endpoint on `side` should sit according to its parent.
    pub fn attachment_point(&self, side: Side, strands: &HashMap<StrandId, Strand>) -> Option<Point> {
        let attachment = self.attachment(side)?;
        strands.get(&attachment.strand_id)?.point_at(attachment.t)
    }

    /// Snap attached endpoints onto their parents. Control points are
    /// left alone; missing parents leave the endpoint where it is.
    pub fn with_attached_positions(&self, strands: &HashMap<StrandId, Strand>) -> Self {
        let mut out = self.clone();
        for side in [Side::Start, Side::End] {
            if let Some(p) = out.attachment_point(side, strands)
                && p != out.endpoint(side)
            {
                out = out.with_endpoint_at(side, p);
            }
        }
        out
    }

    /// Ids of the strands this one is pinned to.
    pub fn parent_ids(&self) -> impl Iterator<Item = StrandId> + '_ {
        [Side::Start, Side::End]
            .into_iter()
            .filter_map(|side| self.attachment(side).map(|a| a.strand_id))
    }
}

/// Strands whose start or end attachment references `parent_id`.
pub fn child_strands<'a>(
    parent_id: StrandId,
    strands: impl IntoIterator<Item = &'a Strand>,
) -> Vec<&'a Strand> {
    strands
        .into_iter()
        .filter(|s| s.parent_ids().any(|p| p == parent_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strand::StrandStyle;
    use pretty_assertions::assert_eq;

    fn parent() -> Strand {
        let mut p = Strand::straight(
            StrandId::intern("attach_parent"),
            Point::new(0.0, 0.0),
            Point::new(90.0, 0.0),
            StrandStyle::with_color("#123456", 12.0),
        );
        p.curve_response_exponent = 2.0;
        p
    }

    #[test]
    fn from_parent_inherits_style_and_marks_start() {
        let p = parent();
        let child = Strand::from_parent(StrandId::intern("attach_child"), &p, p.end, Side::End);
        assert_eq!(child.style, p.style);
        assert_eq!(child.parent_id, Some(p.id));
        assert_eq!(child.attachment_side, Some(Side::End));
        assert_eq!(child.has_circles, [true, false]);
        assert_eq!(child.min_length, Some(40.0));
        assert_eq!(child.is_start_side, Some(true));
        assert_eq!(child.curve_response_exponent, 2.0);
        let a = child.attachment(Side::Start).unwrap();
        assert_eq!((a.strand_id, a.t), (p.id, 1.0));
        assert!(child.is_attached());
    }

    #[test]
    fn positions_follow_parent() {
        let p = parent();
        let child = Strand::from_parent(StrandId::intern("follow_child"), &p, p.end, Side::End)
            .update_endpoint(Point::new(200.0, 50.0));
        let moved = p.with_endpoint_dragged(Side::End, Point::new(120.0, 30.0));
        let map = HashMap::from([(moved.id, moved.clone())]);
        let updated = child.with_attached_positions(&map);
        assert_eq!(updated.start, Point::new(120.0, 30.0));
        assert_eq!(updated.end, Point::new(200.0, 50.0));
        assert_eq!(updated.segments[0].bezier.control1, child.segments[0].bezier.control1);
    }

    #[test]
    fn missing_parent_leaves_strand_unchanged() {
        let p = parent();
        let child = Strand::from_parent(StrandId::intern("orphan_child"), &p, p.end, Side::End);
        assert_eq!(child.with_attached_positions(&HashMap::new()), child);
    }

    #[test]
    fn detach_clears_links() {
        let p = parent();
        let child = Strand::from_parent(StrandId::intern("detach_child"), &p, p.start, Side::Start)
            .attach_end(Attachment::to_endpoint(&p, Side::End));
        assert!(child.end_attached);
        let loose = child.detach_start().detach_end();
        assert!(!loose.is_attached());
        assert!(!loose.start_attached);
        assert_eq!(loose.has_circles, [false, false]);
    }

    #[test]
    fn children_are_found_by_either_end() {
        let p = parent();
        let a = Strand::from_parent(StrandId::intern("kid_a"), &p, p.end, Side::End);
        let b = Strand::initial(StrandId::intern("kid_b"), Point::ORIGIN, StrandStyle::default())
            .attach_end(Attachment::to_endpoint(&p, Side::Start));
        let c = Strand::initial(StrandId::intern("kid_c"), Point::ORIGIN, StrandStyle::default());
        let all = [p.clone(), a, b, c];
        let kids: Vec<_> = child_strands(p.id, &all).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(kids, vec!["kid_a", "kid_b"]);
    }
}
