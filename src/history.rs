use tracing::{debug, info};

use crate::geometry::Point;
use crate::stroke::{DrawingConfig, Stroke, StrokeShape, Tool};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Drawing,
}

/// A text prompt the host should show. Raised synchronously by the state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingInput {
    /// Free text anchored at a natural-space point (text tool).
    Text { anchor: Point },
    /// Label for the committed shape at `index`, shown at its centroid.
    Label { index: usize, anchor: Point },
}

impl PendingInput {
    pub fn anchor(&self) -> Point {
        match self {
            PendingInput::Text { anchor } | PendingInput::Label { anchor, .. } => *anchor,
        }
    }
}

/// Committed strokes in paint order, the in-progress draft, and the redo buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StrokeHistory {
    committed: Vec<Stroke>,
    draft: Option<Stroke>,
    redo_stack: Vec<Stroke>,
    pending: Option<PendingInput>,
}

impl StrokeHistory {
    pub fn state(&self) -> GestureState {
        if self.draft.is_some() {
            GestureState::Drawing
        } else {
            GestureState::Idle
        }
    }

    pub fn committed(&self) -> &[Stroke] {
        &self.committed
    }

    pub fn draft(&self) -> Option<&Stroke> {
        self.draft.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingInput> {
        self.pending.as_ref()
    }

    pub fn take_pending(&mut self) -> Option<PendingInput> {
        self.pending.take()
    }

    pub fn can_undo(&self) -> bool {
        self.state() == GestureState::Idle && !self.committed.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.state() == GestureState::Idle && !self.redo_stack.is_empty()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.draft.is_none()
    }

    /// Committed strokes followed by the draft, deep-copied.
    pub fn snapshot(&self) -> Vec<Stroke> {
        self.committed.iter().chain(self.draft.iter()).cloned().collect()
    }

    pub fn iter_all(&self) -> impl Iterator<Item = &Stroke> {
        self.committed.iter().chain(self.draft.iter())
    }

    // ── Gesture transitions ─────────────────────────────────────────────────

    /// Idle → Drawing. The text tool raises a text prompt instead of drafting.
    pub fn begin_stroke(&mut self, start: Point, config: &DrawingConfig) -> bool {
        if self.draft.is_some() {
            debug!("begin_stroke ignored: gesture already in progress");
            return false;
        }
        if config.tool == Tool::Text {
            self.pending = Some(PendingInput::Text { anchor: start });
            return false;
        }
        self.draft = config.new_stroke(start);
        self.draft.is_some()
    }

    pub fn extend_stroke(&mut self, point: Point) -> bool {
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        match &mut draft.shape {
            StrokeShape::Freehand { points } => points.push(point),
            StrokeShape::Rectangle { end, .. } | StrokeShape::Ellipse { end, .. } => *end = point,
            StrokeShape::Text { .. } => return false,
        }
        true
    }

    /// Drawing → Idle. Returns the committed index.
    ///
    /// Shape drafts that never left their start point are dropped. A committed
    /// shape raises a label prompt tied to its index.
    pub fn commit_stroke(&mut self) -> Option<usize> {
        let Some(draft) = self.draft.take() else {
            debug!("commit_stroke ignored: no gesture in progress");
            return None;
        };
        if let StrokeShape::Rectangle { start, end, .. } | StrokeShape::Ellipse { start, end, .. } =
            &draft.shape
        {
            if start == end {
                info!(tool = ?draft.tool, "zero-size shape discarded");
                return None;
            }
        }
        let index = self.push(draft);
        if let Some(anchor) = self.committed[index].centroid() {
            self.pending = Some(PendingInput::Label { index, anchor });
        }
        Some(index)
    }

    /// Drops the draft without committing it.
    pub fn cancel_stroke(&mut self) {
        self.draft = None;
    }

    /// Commits a text stroke entered after a [`PendingInput::Text`] prompt.
    pub fn commit_text(
        &mut self,
        anchor: Point,
        content: &str,
        config: &DrawingConfig,
    ) -> Option<usize> {
        let content = content.trim();
        if content.is_empty() || self.draft.is_some() {
            return None;
        }
        Some(self.push(config.text_stroke(anchor, content.to_owned())))
    }

    /// Attaches a label to the committed shape at `index`.
    pub fn attach_label(&mut self, index: usize, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        match self.committed.get_mut(index) {
            Some(stroke) if stroke.tool.is_shape() => {
                *stroke = stroke.with_label(text.to_owned());
                true
            }
            _ => false,
        }
    }

    /// Appends an already finished stroke, as if its gesture had just ended.
    /// No label prompt is raised.
    pub fn push_committed(&mut self, stroke: Stroke) -> Option<usize> {
        if self.draft.is_some() {
            debug!("push_committed ignored: gesture already in progress");
            return None;
        }
        Some(self.push(stroke))
    }

    fn push(&mut self, stroke: Stroke) -> usize {
        self.committed.push(stroke);
        self.redo_stack.clear();
        self.committed.len() - 1
    }

    // ── Undo / redo ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        if self.draft.is_some() {
            return false;
        }
        let Some(stroke) = self.committed.pop() else {
            return false;
        };
        self.redo_stack.push(stroke);
        self.drop_stale_label();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.draft.is_some() {
            return false;
        }
        let Some(stroke) = self.redo_stack.pop() else {
            return false;
        };
        self.committed.push(stroke);
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn drop_stale_label(&mut self) {
        if let Some(PendingInput::Label { index, .. }) = self.pending {
            if index >= self.committed.len() {
                self.pending = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pen() -> DrawingConfig {
        DrawingConfig::default()
    }

    fn tool(tool: Tool) -> DrawingConfig {
        DrawingConfig {
            tool,
            ..DrawingConfig::default()
        }
    }

    fn draw_line(history: &mut StrokeHistory, y: f64) {
        history.begin_stroke(Point::new(0.0, y), &pen());
        history.extend_stroke(Point::new(10.0, y));
        history.commit_stroke();
    }

    #[test]
    fn gesture_walks_idle_drawing_idle() {
        let mut history = StrokeHistory::default();
        assert_eq!(history.state(), GestureState::Idle);
        assert!(history.begin_stroke(Point::new(1.0, 1.0), &pen()));
        assert_eq!(history.state(), GestureState::Drawing);
        history.extend_stroke(Point::new(2.0, 2.0));
        assert_eq!(history.commit_stroke(), Some(0));
        assert_eq!(history.state(), GestureState::Idle);
        match &history.committed()[0].shape {
            StrokeShape::Freehand { points } => assert_eq!(points.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn out_of_order_events_are_no_ops() {
        let mut history = StrokeHistory::default();
        assert!(!history.extend_stroke(Point::new(1.0, 1.0)));
        assert_eq!(history.commit_stroke(), None);

        history.begin_stroke(Point::new(0.0, 0.0), &pen());
        assert!(!history.begin_stroke(Point::new(5.0, 5.0), &pen()));
        history.commit_stroke();
        // pointerleave after pointerup
        assert_eq!(history.commit_stroke(), None);
        assert_eq!(history.committed().len(), 1);
    }

    #[test]
    fn shape_extend_replaces_end_and_raises_label_prompt() {
        let mut history = StrokeHistory::default();
        history.begin_stroke(Point::new(10.0, 10.0), &tool(Tool::Rectangle));
        history.extend_stroke(Point::new(20.0, 20.0));
        history.extend_stroke(Point::new(30.0, 40.0));
        let index = history.commit_stroke().unwrap();
        assert_eq!(
            history.take_pending(),
            Some(PendingInput::Label {
                index,
                anchor: Point::new(20.0, 25.0)
            })
        );
        assert!(history.attach_label(index, "  remove car "));
        assert_eq!(history.committed()[index].label(), Some("remove car"));
    }

    #[test]
    fn zero_size_shape_is_discarded() {
        let mut history = StrokeHistory::default();
        history.begin_stroke(Point::new(3.0, 3.0), &tool(Tool::Ellipse));
        assert_eq!(history.commit_stroke(), None);
        assert!(history.committed().is_empty());
        assert!(history.pending().is_none());
    }

    #[test]
    fn text_tool_raises_prompt_without_draft() {
        let mut history = StrokeHistory::default();
        let cfg = tool(Tool::Text);
        assert!(!history.begin_stroke(Point::new(7.0, 8.0), &cfg));
        assert_eq!(history.state(), GestureState::Idle);
        assert_eq!(
            history.take_pending(),
            Some(PendingInput::Text {
                anchor: Point::new(7.0, 8.0)
            })
        );
        assert_eq!(history.commit_text(Point::new(7.0, 8.0), "   ", &cfg), None);
        assert_eq!(history.commit_text(Point::new(7.0, 8.0), "hi", &cfg), Some(0));
    }

    #[test]
    fn new_commit_clears_redo_stack() {
        let mut history = StrokeHistory::default();
        draw_line(&mut history, 0.0);
        assert!(history.undo());
        assert_eq!(history.redo_len(), 1);

        draw_line(&mut history, 1.0);
        assert_eq!(history.redo_len(), 0);
        assert!(!history.redo());
        assert_eq!(history.committed().len(), 1);
    }

    #[test]
    fn undo_redo_are_blocked_while_drawing() {
        let mut history = StrokeHistory::default();
        draw_line(&mut history, 0.0);
        history.begin_stroke(Point::new(0.0, 0.0), &pen());
        assert!(!history.undo());
        history.commit_stroke();
        assert!(history.undo());
        history.begin_stroke(Point::new(0.0, 0.0), &pen());
        assert!(!history.redo());
    }

    #[test]
    fn label_prompt_for_undone_shape_is_dropped() {
        let mut history = StrokeHistory::default();
        history.begin_stroke(Point::new(0.0, 0.0), &tool(Tool::Rectangle));
        history.extend_stroke(Point::new(5.0, 5.0));
        let index = history.commit_stroke().unwrap();
        history.undo();
        assert!(history.pending().is_none());
        assert!(!history.attach_label(index, "late"));
    }

    #[test]
    fn snapshot_includes_draft_last() {
        let mut history = StrokeHistory::default();
        draw_line(&mut history, 0.0);
        history.begin_stroke(Point::new(0.0, 9.0), &pen());
        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(Some(&snapshot[1]), history.draft());
    }
}
