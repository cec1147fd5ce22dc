//! Interaction controller.
//!
//! Interprets gestures according to the active [`Mode`] and replaces the
//! canvas snapshot wholesale on every change. A continuous gesture lives
//! in exactly one [`Gesture`] variant from `PanBegin` to `PanEnd`.
//!
//! Content edits are validated before they are published; a change that
//! breaks a canvas invariant is logged and dropped. Discrete edits record
//! one undo entry each, continuous ones are batched into a single entry
//! when the gesture ends.

use crate::config::EditorConfig;
use crate::history::UndoHistory;
use crate::input::GestureEvent;
use crate::layer_state::LayerStateService;
use kurbo::{Point, Rect, Vec2};
use std::sync::Arc;
use strand_core::geometry::{angle_between_points, snap_to_grid, snap_vec_to_grid};
use strand_core::{
    Attachment, CanvasState, HandleKind, LayerId, Side, Strand, StrandId, StrandStyle,
};
use strand_render::hit::{self, EndpointHit};
use strand_render::{Overlay, PreviewLine, RenderOptions, Scene, render_scene};
use tokio::sync::watch;

/// Length granularity while re-aiming a strand.
const ANGLE_LENGTH_STEP: f64 = 5.0;
const ANGLE_MIN_LENGTH: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Select,
    Move,
    Attach,
    Mask,
    Rotate,
    AngleAdjust,
    Draw,
    Pan,
}

/// In-flight gesture state. Points are in canvas coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    PreviewingAttach {
        start: Point,
        anchor: Option<EndpointHit>,
        current: Point,
    },
    MovingEndpoint {
        strand: StrandId,
        side: Side,
        origin: Point,
    },
    MovingWhole {
        origin: Strand,
    },
    EditingHandle {
        strand: StrandId,
        segment_index: usize,
        handle: HandleKind,
        origin: Point,
    },
    Rubberband {
        start: Point,
        current: Point,
    },
    Drawing {
        points: Vec<Point>,
    },
    Rotating {
        origin: Strand,
        pivot: Point,
        begin_angle: f64,
    },
    AdjustingAngle {
        origin: Strand,
    },
    Panning {
        origin: Vec2,
    },
}

pub struct Controller {
    pub(crate) config: EditorConfig,
    pub(crate) canvas: Arc<CanvasState>,
    pub(crate) mode: Mode,
    pub(crate) gesture: Gesture,
    pub(crate) history: UndoHistory,
    pub(crate) layer_state: LayerStateService,
    pub(crate) current_color: String,
    pub(crate) current_width: f64,
    pub(crate) show_shadows: bool,
    pub(crate) show_control_points: bool,
    /// First strand tapped in MASK mode.
    pub(crate) mask_first: Option<StrandId>,
    tx: watch::Sender<Arc<CanvasState>>,
}

impl Controller {
    pub fn new(config: EditorConfig) -> Self {
        let canvas = CanvasState {
            grid_size: config.grid_size,
            ..CanvasState::new()
        };
        Self::with_canvas(config, canvas)
    }

    pub fn with_canvas(config: EditorConfig, canvas: CanvasState) -> Self {
        let canvas = Arc::new(canvas);
        let (tx, _rx) = watch::channel(Arc::clone(&canvas));
        let mut layer_state = LayerStateService::new();
        layer_state.save_current_state(&canvas);
        Self {
            history: UndoHistory::new(config.undo_capacity),
            current_color: config.default_color.clone(),
            current_width: config.default_width,
            config,
            canvas,
            mode: Mode::default(),
            gesture: Gesture::Idle,
            layer_state,
            show_shadows: true,
            show_control_points: true,
            mask_first: None,
            tx,
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn canvas(&self) -> &Arc<CanvasState> {
        &self.canvas
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn layer_state(&self) -> &LayerStateService {
        &self.layer_state
    }

    pub fn layer_state_mut(&mut self) -> &mut LayerStateService {
        &mut self.layer_state
    }

    pub fn current_color(&self) -> &str {
        &self.current_color
    }

    pub fn current_width(&self) -> f64 {
        self.current_width
    }

    /// Observe every published canvas snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CanvasState>> {
        self.tx.subscribe()
    }

    // ─── Publishing ─────────────────────────────────────────────────────

    pub(crate) fn publish(&mut self, next: CanvasState) {
        self.publish_arc(Arc::new(next));
    }

    pub(crate) fn publish_arc(&mut self, next: Arc<CanvasState>) {
        self.canvas = next;
        self.layer_state.save_current_state(&self.canvas);
        self.tx.send_replace(Arc::clone(&self.canvas));
    }

    /// Validate the touched strands of `next` and publish it.
    pub(crate) fn commit(&mut self, next: CanvasState, touched: &[StrandId]) -> bool {
        if let Err(e) = next.validate_strands(touched) {
            log::error!("dropping edit: {e}");
            return false;
        }
        self.publish(next);
        true
    }

    /// [`Controller::commit`] plus one undo entry holding the prior canvas.
    pub(crate) fn commit_undoable(
        &mut self,
        next: CanvasState,
        touched: &[StrandId],
        description: &str,
    ) -> bool {
        let before = Arc::clone(&self.canvas);
        if !self.commit(next, touched) {
            return false;
        }
        self.history.save_state(&before, description);
        log::debug!("recorded {description:?}");
        true
    }

    /// Swap in a loaded document. History starts over.
    pub fn replace_canvas(&mut self, canvas: CanvasState) {
        self.reset_gesture();
        self.history.clear();
        self.publish(canvas);
    }

    // ─── Modes ──────────────────────────────────────────────────────────

    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        self.cancel_gesture();
        self.mask_first = None;
        log::debug!("mode {:?} -> {mode:?}", self.mode);
        self.mode = mode;
    }

    pub fn set_current_color(&mut self, color: impl Into<String>) {
        self.current_color = color.into();
    }

    pub fn set_current_width(&mut self, width: f64) {
        if width > 0.0 {
            self.current_width = width;
        }
    }

    // ─── Undo / redo ────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        self.cancel_gesture();
        match self.history.undo(&self.canvas) {
            Some(previous) => {
                self.publish_arc(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_gesture();
        match self.history.redo(&self.canvas) {
            Some(next) => {
                self.publish_arc(next);
                true
            }
            None => false,
        }
    }

    // ─── View ───────────────────────────────────────────────────────────

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.canvas.zoom * self.config.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.canvas.zoom / self.config.zoom_step);
    }

    fn set_zoom(&mut self, zoom: f64) {
        let zoom = self.config.clamp_zoom(zoom);
        if zoom != self.canvas.zoom {
            self.publish(CanvasState {
                zoom,
                ..(*self.canvas).clone()
            });
        }
    }

    pub fn reset_view(&mut self) {
        self.publish(CanvasState {
            zoom: 1.0,
            pan_offset: Vec2::ZERO,
            ..(*self.canvas).clone()
        });
    }

    pub fn toggle_grid(&mut self) {
        self.publish(CanvasState {
            grid_enabled: !self.canvas.grid_enabled,
            ..(*self.canvas).clone()
        });
    }

    pub fn toggle_shadows(&mut self) {
        self.show_shadows = !self.show_shadows;
    }

    pub fn toggle_control_points(&mut self) {
        self.show_control_points = !self.show_control_points;
    }

    pub fn deselect_all(&mut self) {
        self.mask_first = None;
        if self.canvas.selected_strand_id.is_some() {
            self.publish(CanvasState {
                selected_strand_id: None,
                ..(*self.canvas).clone()
            });
        }
    }

    fn select_strand(&mut self, hit: Option<hit::StrandHit>) {
        let mut next = (*self.canvas).clone();
        match hit {
            Some(h) => {
                next.selected_strand_id = Some(h.strand_id);
                next.selected_layer_id = Some(h.layer_id);
            }
            None => next.selected_strand_id = None,
        }
        if next != *self.canvas {
            self.publish(next);
        }
    }

    // ─── Rendering ──────────────────────────────────────────────────────

    pub fn render_options(&self, viewport: Option<Rect>) -> RenderOptions {
        let overlay = match self.mode {
            Mode::Attach => Overlay::AttachTargets,
            Mode::Move => Overlay::MoveTargets,
            _ => Overlay::None,
        };
        let preview = match &self.gesture {
            Gesture::PreviewingAttach { start, anchor, current } => Some(PreviewLine {
                from: *start,
                to: *current,
                color: anchor
                    .and_then(|a| self.canvas.strand(a.strand_id))
                    .map_or_else(|| self.current_color.clone(), |s| s.style.color.clone()),
                width: self.current_width,
            }),
            _ => None,
        };
        let rubberband = match &self.gesture {
            Gesture::Rubberband { start, current } => Some(Rect::from_points(*start, *current)),
            _ => None,
        };
        RenderOptions {
            show_shadows: self.show_shadows,
            show_selection: true,
            show_control_points: self.show_control_points && self.mode == Mode::Select,
            viewport,
            overlay,
            preview,
            rubberband,
        }
    }

    pub fn render(&self, viewport: Option<Rect>) -> Scene {
        render_scene(&self.canvas, &self.render_options(viewport))
    }

    // ─── Gesture dispatch ───────────────────────────────────────────────

    pub fn handle(&mut self, event: GestureEvent) {
        match event {
            GestureEvent::PanBegin { at } => self.on_pan_begin(at),
            GestureEvent::PanUpdate { at, translation } => self.on_pan_update(at, translation),
            GestureEvent::PanEnd { at } => self.on_pan_end(at),
            GestureEvent::PanCancel => self.cancel_gesture(),
            GestureEvent::Tap { at } => self.on_tap(at),
            GestureEvent::DoubleTap { at } => self.on_double_tap(at),
            GestureEvent::Pinch { scale, focal } => self.on_pinch(scale, focal),
        }
    }

    /// Abandon the current gesture and restore the canvas it started from.
    pub fn cancel_gesture(&mut self) {
        if let Some(before) = self.history.cancel_batch()
            && before != self.canvas
        {
            self.publish_arc(before);
        }
        self.reset_gesture();
    }

    fn reset_gesture(&mut self) {
        self.history.cancel_batch();
        if self.layer_state.is_moving() {
            self.layer_state.end_movement();
        }
        self.gesture = Gesture::Idle;
    }

    /// Screen translation to canvas units, snapped when the grid is on.
    fn canvas_delta(&self, translation: Vec2) -> Vec2 {
        let zoom = if self.canvas.zoom > 0.0 { self.canvas.zoom } else { 1.0 };
        let delta = translation / zoom;
        if self.canvas.grid_enabled {
            snap_vec_to_grid(delta, self.canvas.grid_size)
        } else {
            delta
        }
    }

    fn begin_batch(&mut self) {
        self.history.begin_batch(&self.canvas);
        self.layer_state.start_movement(&self.canvas);
    }

    fn on_pan_begin(&mut self, screen: Point) {
        if self.gesture != Gesture::Idle {
            self.cancel_gesture();
        }
        let p = self.canvas.to_canvas(screen);
        self.gesture = match self.mode {
            Mode::Attach => self.begin_attach(p),
            Mode::Move => self.begin_move(p),
            Mode::Select => self.begin_select_drag(p),
            Mode::Draw => Gesture::Drawing { points: vec![p] },
            Mode::Rotate => self.begin_rotate(p),
            Mode::AngleAdjust => self.begin_angle_adjust(p),
            Mode::Pan => Gesture::Panning {
                origin: self.canvas.pan_offset,
            },
            Mode::Mask => Gesture::Idle,
        };
        log::debug!("{:?} gesture began: {:?}", self.mode, self.gesture);
    }

    fn on_pan_update(&mut self, screen: Point, translation: Vec2) {
        let q = self.canvas.to_canvas(screen);
        let delta = self.canvas_delta(translation);
        match self.gesture.clone() {
            Gesture::Idle => {}
            Gesture::PreviewingAttach { start, anchor, .. } => {
                self.gesture = Gesture::PreviewingAttach {
                    start,
                    anchor,
                    current: q,
                };
            }
            Gesture::MovingEndpoint { strand, side, origin } => {
                if delta != Vec2::ZERO {
                    self.detach_for_move(strand, side);
                }
                if let Some(s) = self.canvas.strand(strand) {
                    let moved = s.with_endpoint_dragged(side, origin + delta);
                    self.apply_live(moved);
                }
            }
            Gesture::MovingWhole { origin } => {
                self.apply_live(origin.translated(delta));
            }
            Gesture::EditingHandle {
                strand,
                segment_index,
                handle,
                origin,
            } => {
                if let Some(s) = self.canvas.strand(strand) {
                    let edited = s.with_handle(segment_index, handle, origin + delta);
                    self.apply_live(edited);
                }
            }
            Gesture::Rubberband { start, .. } => {
                self.gesture = Gesture::Rubberband { start, current: q };
            }
            Gesture::Drawing { mut points } => {
                if points
                    .last()
                    .is_none_or(|last| last.distance(q) > self.config.draw_sample_spacing)
                {
                    points.push(q);
                }
                self.gesture = Gesture::Drawing { points };
            }
            Gesture::Rotating {
                origin,
                pivot,
                begin_angle,
            } => {
                let angle = angle_between_points(pivot, q) - begin_angle;
                self.apply_live(origin.rotated(pivot, angle));
            }
            Gesture::AdjustingAngle { origin } => {
                let angle = angle_between_points(origin.start, q);
                let length = snapped_length(origin.start.distance(q));
                self.apply_live(aimed(&origin, angle, length));
            }
            Gesture::Panning { origin } => {
                self.publish(CanvasState {
                    pan_offset: origin + translation,
                    ..(*self.canvas).clone()
                });
            }
        }
    }

    fn on_pan_end(&mut self, screen: Point) {
        let q = self.canvas.to_canvas(screen);
        let gesture = std::mem::take(&mut self.gesture);
        match gesture {
            Gesture::Idle | Gesture::Panning { .. } => {}
            Gesture::PreviewingAttach { start, anchor, .. } => self.finish_attach(start, anchor, q),
            Gesture::MovingEndpoint { .. } | Gesture::MovingWhole { .. } => {
                self.finish_batch("Move strand")
            }
            Gesture::EditingHandle { .. } => self.finish_batch("Move control point"),
            Gesture::Rotating { .. } => self.finish_batch("Rotate strand"),
            Gesture::AdjustingAngle { .. } => self.finish_batch("Adjust angle"),
            Gesture::Rubberband { start, .. } => {
                let rect = Rect::from_points(start, q);
                let hit = hit::find_strands_in_rect(&self.canvas.layers, rect).pop();
                self.select_strand(hit);
            }
            Gesture::Drawing { mut points } => {
                if points
                    .last()
                    .is_none_or(|last| last.distance(q) > self.config.draw_sample_spacing)
                {
                    points.push(q);
                }
                self.finish_draw(&points);
            }
        }
    }

    /// Replace one strand mid-gesture, re-pinning everything attached.
    fn apply_live(&mut self, strand: Strand) {
        let id = strand.id;
        let next = self
            .canvas
            .with_strand_replaced(&strand)
            .with_attachments_propagated();
        self.commit(next, &[id]);
    }

    fn finish_batch(&mut self, description: &str) {
        if self.history.end_batch(&self.canvas, description) {
            log::debug!("recorded {description:?}");
        }
        self.layer_state.end_movement();
        self.layer_state.save_current_state(&self.canvas);
    }

    // ─── ATTACH ─────────────────────────────────────────────────────────

    fn begin_attach(&self, p: Point) -> Gesture {
        let anchor = hit::find_endpoint_attachment(&self.canvas.layers, p, self.config.attach_radius);
        let start = anchor.map_or(p, |a| a.point);
        Gesture::PreviewingAttach {
            start,
            anchor,
            current: p,
        }
    }

    fn finish_attach(&mut self, start: Point, anchor: Option<EndpointHit>, q: Point) {
        let end_anchor = hit::find_endpoint_attachment(&self.canvas.layers, q, self.config.attach_radius)
            .filter(|e| anchor.is_none_or(|a| (a.strand_id, a.side) != (e.strand_id, e.side)));
        let end = end_anchor.map_or(q, |e| e.point);
        if start.distance(end) < self.config.min_attach_length {
            log::debug!("attach too short ({:.2}px), ignored", start.distance(end));
            return;
        }
        let Some(layer_id) = self.target_layer() else {
            log::warn!("no layer to add the strand to");
            return;
        };

        let start_parent = anchor.and_then(|a| self.canvas.strand(a.strand_id).cloned());
        let style = match &start_parent {
            Some(parent) => parent.style.clone(),
            None => StrandStyle::with_color(self.current_color.clone(), self.current_width),
        };
        let id = StrandId::fresh();
        let mut child = Strand::initial(id, start, style).update_endpoint(end);
        let mut parents: Vec<Strand> = Vec::new();

        if let (Some(a), Some(parent)) = (anchor, &start_parent) {
            child.parent_id = Some(parent.id);
            child.attachment_side = Some(a.side);
            child.has_circles[Side::Start.index()] = true;
            child.is_start_side = Some(false);
            child.inherit_curvature(parent);
            child = child.attach_start(Attachment::to_endpoint(parent, a.side));
            parents.push(parent.with_child_registered(a.side, id));
        }
        if let Some(e) = end_anchor
            && let Some(parent) = self.canvas.strand(e.strand_id)
        {
            child = child.attach_end(Attachment::to_endpoint(parent, e.side));
            // Both ends may land on the same parent.
            let base = match parents.iter().position(|p| p.id == parent.id) {
                Some(i) => parents.remove(i),
                None => parent.clone(),
            };
            parents.push(base.with_child_registered(e.side, id));
        }

        let Some(mut next) = self
            .canvas
            .with_strands_replaced(&parents)
            .with_strand_added(layer_id, child)
        else {
            log::warn!("layer {layer_id} vanished before the strand was added");
            return;
        };
        next.selected_strand_id = Some(id);
        next.selected_layer_id = Some(layer_id);

        let mut touched = vec![id];
        touched.extend(parents.iter().map(|p| p.id));
        if self.commit_undoable(next, &touched, "Create strand") {
            log::info!("created strand {id} in layer {layer_id}");
        }
    }

    /// Selected flat layer, else the topmost flat layer.
    fn target_layer(&self) -> Option<LayerId> {
        self.canvas
            .selected_layer_id
            .filter(|id| self.canvas.layer(*id).is_some())
            .or_else(|| self.canvas.leaf_layers().last().map(|leaf| leaf.layer.id))
    }

    // ─── MOVE ───────────────────────────────────────────────────────────

    fn begin_move(&mut self, p: Point) -> Gesture {
        if let Some(e) = hit::find_strand_endpoint_for_move(&self.canvas.layers, p, self.config.move_area) {
            self.begin_batch();
            return Gesture::MovingEndpoint {
                strand: e.strand_id,
                side: e.side,
                origin: e.point,
            };
        }
        match self.unlocked_strand_at(p) {
            Some(h) => {
                self.select_strand(Some(h));
                let Some(origin) = self.canvas.strand(h.strand_id).cloned() else {
                    return Gesture::Idle;
                };
                self.begin_batch();
                Gesture::MovingWhole { origin }
            }
            None => Gesture::Idle,
        }
    }

    /// A dragged endpoint that is pinned to a parent lets go of it. No-op
    /// once the endpoint is free.
    fn detach_for_move(&mut self, id: StrandId, side: Side) {
        let Some(strand) = self.canvas.strand(id).cloned() else {
            return;
        };
        let Some(attachment) = strand.attachment(side).copied() else {
            return;
        };
        let child = match side {
            Side::Start => strand.detach_start(),
            Side::End => strand.detach_end(),
        };
        let mut touched = vec![child];
        if let Some(parent) = self.canvas.strand(attachment.strand_id) {
            let sides: Vec<Side> = attachment.attachment_side.into_iter().collect();
            let mut released = parent.with_child_released(id, &sides);
            if touched[0].parent_ids().any(|p| p == parent.id) {
                released.attached_strand_ids.push(id);
            }
            touched.push(released);
        }
        let ids: Vec<StrandId> = touched.iter().map(|s| s.id).collect();
        let next = self.canvas.with_strands_replaced(&touched);
        self.commit(next, &ids);
    }

    fn unlocked_strand_at(&self, p: Point) -> Option<hit::StrandHit> {
        hit::find_all_strands_at_point(&self.canvas.layers, p, self.config.hit_tolerance)
            .into_iter()
            .rev()
            .find(|h| !self.canvas.is_strand_locked(h.strand_id))
    }

    // ─── SELECT ─────────────────────────────────────────────────────────

    fn begin_select_drag(&mut self, p: Point) -> Gesture {
        let handle = self
            .canvas
            .selected_strand()
            .filter(|s| !self.canvas.is_strand_locked(s.id))
            .and_then(|s| {
                hit::find_closest_control_point(s, p, self.config.hit_tolerance).map(|c| (s.id, c))
            });
        match handle {
            Some((strand, c)) => {
                self.begin_batch();
                Gesture::EditingHandle {
                    strand,
                    segment_index: c.segment_index,
                    handle: c.handle,
                    origin: c.point,
                }
            }
            None => Gesture::Rubberband {
                start: p,
                current: p,
            },
        }
    }

    fn on_tap(&mut self, screen: Point) {
        let p = self.canvas.to_canvas(screen);
        match self.mode {
            Mode::Mask => self.mask_tap(p),
            Mode::Pan => {}
            _ => {
                let hit = hit::find_strand_at_point(&self.canvas.layers, p, self.config.hit_tolerance);
                self.select_strand(hit);
            }
        }
    }

    // ─── DRAW ───────────────────────────────────────────────────────────

    fn finish_draw(&mut self, points: &[Point]) {
        let style = StrandStyle::with_color(self.current_color.clone(), self.current_width);
        let id = StrandId::fresh();
        let Some(strand) = Strand::from_points(id, points, style) else {
            log::debug!("freehand stroke with {} samples ignored", points.len());
            return;
        };
        let Some(layer_id) = self.target_layer() else {
            log::warn!("no layer to add the strand to");
            return;
        };
        let Some(mut next) = self.canvas.with_strand_added(layer_id, strand) else {
            return;
        };
        next.selected_strand_id = Some(id);
        next.selected_layer_id = Some(layer_id);
        self.commit_undoable(next, &[id], "Draw strand");
    }

    // ─── ROTATE / ANGLE_ADJUST ──────────────────────────────────────────

    /// Strand under `p`, else the selection, provided it is not locked.
    fn gesture_target(&mut self, p: Point) -> Option<Strand> {
        match self.unlocked_strand_at(p) {
            Some(h) => {
                self.select_strand(Some(h));
                self.canvas.strand(h.strand_id).cloned()
            }
            None => self
                .canvas
                .selected_strand()
                .filter(|s| !self.canvas.is_strand_locked(s.id))
                .cloned(),
        }
    }

    fn begin_rotate(&mut self, p: Point) -> Gesture {
        let Some(origin) = self.gesture_target(p) else {
            return Gesture::Idle;
        };
        let pivot = origin.center();
        self.begin_batch();
        Gesture::Rotating {
            origin,
            pivot,
            begin_angle: angle_between_points(pivot, p),
        }
    }

    fn begin_angle_adjust(&mut self, p: Point) -> Gesture {
        let Some(origin) = self.gesture_target(p) else {
            return Gesture::Idle;
        };
        self.begin_batch();
        Gesture::AdjustingAngle { origin }
    }

    /// Aim `id` at `degrees` from its start. `length` defaults to the
    /// current chord length.
    pub fn adjust_angle(&mut self, id: StrandId, degrees: f64, length: Option<f64>) -> bool {
        let Some(strand) = self.canvas.strand(id) else {
            return false;
        };
        if self.canvas.is_strand_locked(id) {
            log::debug!("strand {id} is locked");
            return false;
        }
        let length = snapped_length(length.unwrap_or_else(|| strand.start.distance(strand.end)));
        let adjusted = aimed(strand, degrees.to_radians(), length);
        let next = self
            .canvas
            .with_strand_replaced(&adjusted)
            .with_attachments_propagated();
        self.commit_undoable(next, &[id], "Adjust angle")
    }

    // ─── MASK ───────────────────────────────────────────────────────────

    fn mask_tap(&mut self, p: Point) {
        let Some(h) = hit::find_strand_at_point(&self.canvas.layers, p, self.config.hit_tolerance)
        else {
            self.mask_first = None;
            return;
        };
        let Some(first) = self.mask_first.take() else {
            self.mask_first = Some(h.strand_id);
            self.select_strand(Some(h));
            return;
        };
        if first == h.strand_id {
            self.mask_first = Some(first);
            return;
        }
        let (Some(under), Some(over)) = (self.canvas.strand(first), self.canvas.strand(h.strand_id))
        else {
            return;
        };
        if under.has_mask_with(over) {
            log::debug!("{first} is already masked by {}", over.id);
            return;
        }
        let masked = under.auto_masked(over, false);
        if masked == *under {
            log::debug!("{first} and {} do not cross", over.id);
            return;
        }
        let next = self.canvas.with_strand_replaced(&masked);
        self.commit_undoable(next, &[first], "Create mask");
    }

    fn on_double_tap(&mut self, screen: Point) {
        if self.mode != Mode::Mask {
            return;
        }
        let p = self.canvas.to_canvas(screen);
        let Some(h) = hit::find_strand_at_point(&self.canvas.layers, p, self.config.hit_tolerance)
        else {
            return;
        };
        let Some(strand) = self.canvas.strand(h.strand_id) else {
            return;
        };
        let nearest = strand
            .masks
            .iter()
            .enumerate()
            .filter_map(|(i, m)| {
                let segment = strand.segments.get(m.segment_index)?;
                Some((i, segment.bezier.point_at(m.mid_t()).distance(p)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((index, _)) = nearest {
            let toggled = strand.with_mask_toggled(index);
            let next = self.canvas.with_strand_replaced(&toggled);
            self.commit_undoable(next, &[h.strand_id], "Toggle mask");
        }
    }

    // ─── Pinch ──────────────────────────────────────────────────────────

    /// Zoom by `scale` keeping the screen point `focal` fixed.
    fn on_pinch(&mut self, scale: f64, focal: Point) {
        if !(scale.is_finite() && scale > 0.0) {
            return;
        }
        let old = self.canvas.zoom;
        let zoom = self.config.clamp_zoom(old * scale);
        if zoom == old {
            return;
        }
        let f = focal.to_vec2();
        let pan_offset = f - (f - self.canvas.pan_offset) * (zoom / old);
        self.publish(CanvasState {
            zoom,
            pan_offset,
            ..(*self.canvas).clone()
        });
    }
}

fn snapped_length(length: f64) -> f64 {
    snap_to_grid(length, ANGLE_LENGTH_STEP).max(ANGLE_MIN_LENGTH)
}

/// `strand` rotated about its start so the chord points at `angle`
/// radians, scaled to `length`.
fn aimed(strand: &Strand, angle: f64, length: f64) -> Strand {
    let start = strand.start;
    let target = start + Vec2::from_angle(angle) * length;
    let chord = strand.end - start;
    let current = chord.hypot();
    if current == 0.0 {
        return strand.with_endpoint_dragged(Side::End, target);
    }
    strand
        .rotated(start, angle - chord.atan2())
        .scaled(length / current, start)
        .with_endpoint_at(Side::Start, start)
        .with_endpoint_at(Side::End, target)
}
