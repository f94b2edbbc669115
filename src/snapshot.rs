//! Snapshot Engine — replay-to-raster and compaction scheduling.
//!
//! DESIGN
//! ======
//! `render` is pure and synchronous: events in, PNG bytes plus a world-space
//! origin out. `SnapshotEngine` wraps it with the async compaction trigger —
//! a per-board in-progress flag guarding a `tokio::spawn`ed compaction so the
//! draw path is never blocked by a render.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::Engine as _;
use sqlx::PgPool;
use tiny_skia::{Color, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::{DrawEvent, EventPayload, Point, ShapeType, SnapshotResult};
use crate::store;

const FIXED_PADDING: f64 = 100.0;
const MAX_DIMENSION: u32 = 16384;

#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds {
    fn empty() -> Self {
        Self { min_x: f64::INFINITY, min_y: f64::INFINITY, max_x: f64::NEG_INFINITY, max_y: f64::NEG_INFINITY }
    }

    fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    fn expand_point(&mut self, p: Point, pad: f64) {
        self.min_x = self.min_x.min(p.x - pad);
        self.min_y = self.min_y.min(p.y - pad);
        self.max_x = self.max_x.max(p.x + pad);
        self.max_y = self.max_y.max(p.y + pad);
    }

    fn expand_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        self.min_x = self.min_x.min(x0);
        self.min_y = self.min_y.min(y0);
        self.max_x = self.max_x.max(x1);
        self.max_y = self.max_y.max(y1);
    }
}

fn text_extent(text: &str, position: Point, font_size: f64) -> (f64, f64, f64, f64) {
    let lines: Vec<&str> = text.split('\n').collect();
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let width = longest as f64 * 0.6 * font_size;
    let height = lines.len().max(1) as f64 * 1.3 * font_size;
    (position.x, position.y, position.x + width, position.y + height)
}

/// Locate the last `clear` event, collect deleted stroke ids in the
/// surviving suffix, and compute the padded bounding box of what remains.
fn survivors_and_bounds(events: &[DrawEvent]) -> (Vec<&DrawEvent>, Bounds) {
    let last_clear = events.iter().rposition(|e| matches!(e.payload, EventPayload::Clear {}));
    let suffix = match last_clear {
        Some(idx) => &events[idx + 1..],
        None => events,
    };

    let mut deleted: HashSet<Uuid> = HashSet::new();
    for event in suffix {
        if let EventPayload::Delete { stroke_ids } = &event.payload {
            deleted.extend(stroke_ids.iter().copied());
        }
    }

    let mut bounds = Bounds::empty();
    let mut survivors = Vec::new();
    for event in suffix {
        let keep = match &event.payload {
            EventPayload::Stroke { stroke_id, .. } | EventPayload::Shape { stroke_id, .. } => {
                !deleted.contains(stroke_id)
            }
            EventPayload::Text { stroke_id, .. } => !deleted.contains(stroke_id),
            EventPayload::Delete { .. } | EventPayload::Clear {} => true,
        };
        if !keep {
            continue;
        }

        match &event.payload {
            EventPayload::Stroke { width, points, .. } => {
                for p in points {
                    bounds.expand_point(*p, *width);
                }
            }
            EventPayload::Shape { width, start, end, .. } => {
                bounds.expand_point(*start, *width);
                bounds.expand_point(*end, *width);
            }
            EventPayload::Text { text, position, font_size, .. } => {
                let (x0, y0, x1, y1) = text_extent(text, *position, *font_size);
                bounds.expand_rect(x0, y0, x1, y1);
            }
            EventPayload::Delete { .. } | EventPayload::Clear {} => {}
        }

        if matches!(event.payload, EventPayload::Stroke { .. } | EventPayload::Shape { .. } | EventPayload::Text { .. })
        {
            survivors.push(event);
        }
    }

    (survivors, bounds)
}

fn parse_color(s: &str) -> Color {
    let s = s.trim_start_matches('#');
    let bytes = u32::from_str_radix(s, 16).unwrap_or(0x00_00_00);
    let r = ((bytes >> 16) & 0xFF) as u8;
    let g = ((bytes >> 8) & 0xFF) as u8;
    let b = (bytes & 0xFF) as u8;
    Color::from_rgba8(r, g, b, 255)
}

/// Replay an ordered event log to a raster image, per the bounding-box and
/// culling rules above.
#[must_use]
pub fn render(events: &[DrawEvent]) -> SnapshotResult {
    let (survivors, mut bounds) = survivors_and_bounds(events);

    if bounds.is_empty() || survivors.is_empty() {
        let pixmap = Pixmap::new(1, 1).expect("1x1 pixmap always allocates");
        return SnapshotResult { png_bytes: pixmap.encode_png().unwrap_or_default(), offset_x: 0.0, offset_y: 0.0 };
    }

    bounds.min_x -= FIXED_PADDING;
    bounds.min_y -= FIXED_PADDING;
    bounds.max_x += FIXED_PADDING;
    bounds.max_y += FIXED_PADDING;

    let width = ((bounds.max_x - bounds.min_x).ceil() as u32).clamp(1, MAX_DIMENSION);
    let height = ((bounds.max_y - bounds.min_y).ceil() as u32).clamp(1, MAX_DIMENSION);

    let mut pixmap = Pixmap::new(width, height).unwrap_or_else(|| Pixmap::new(1, 1).unwrap());
    let translate = Transform::from_translate((-bounds.min_x) as f32, (-bounds.min_y) as f32);

    for event in survivors {
        match &event.payload {
            EventPayload::Stroke { color, width, opacity, points, .. } => {
                draw_stroke(&mut pixmap, points, color, *width, *opacity, translate);
            }
            EventPayload::Shape { shape_type, start, end, color, width, opacity, .. } => {
                draw_shape(&mut pixmap, *shape_type, *start, *end, color, *width, *opacity, translate);
            }
            EventPayload::Text { text, position, color, font_size, .. } => {
                draw_text_box(&mut pixmap, text, *position, color, *font_size, translate);
            }
            EventPayload::Delete { .. } | EventPayload::Clear {} => {}
        }
    }

    SnapshotResult {
        png_bytes: pixmap.encode_png().unwrap_or_default(),
        offset_x: bounds.min_x,
        offset_y: bounds.min_y,
    }
}

fn draw_stroke(pixmap: &mut Pixmap, points: &[Point], color: &str, width: f64, opacity: Option<f64>, transform: Transform) {
    if points.is_empty() {
        return;
    }
    let mut paint = Paint::default();
    let mut c = parse_color(color);
    c.set_alpha(opacity.unwrap_or(1.0).clamp(0.0, 1.0) as f32);
    paint.set_color(c);
    paint.anti_alias = true;

    if points.len() == 1 {
        let mut pb = PathBuilder::new();
        let r = (width / 2.0).max(0.5) as f32;
        pb.push_circle(points[0].x as f32, points[0].y as f32, r);
        if let Some(path) = pb.finish() {
            pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
        }
        return;
    }

    let mut pb = PathBuilder::new();
    pb.move_to(points[0].x as f32, points[0].y as f32);
    for p in &points[1..] {
        pb.line_to(p.x as f32, p.y as f32);
    }
    let Some(path) = pb.finish() else { return };
    let stroke = Stroke { width: width.max(0.1) as f32, line_cap: LineCap::Round, line_join: LineJoin::Round, ..Stroke::default() };
    pixmap.stroke_path(&path, &paint, &stroke, transform, None);
}

#[allow(clippy::too_many_arguments)]
fn draw_shape(
    pixmap: &mut Pixmap,
    shape_type: ShapeType,
    start: Point,
    end: Point,
    color: &str,
    width: f64,
    opacity: Option<f64>,
    transform: Transform,
) {
    let mut paint = Paint::default();
    let mut c = parse_color(color);
    c.set_alpha(opacity.unwrap_or(1.0).clamp(0.0, 1.0) as f32);
    paint.set_color(c);
    paint.anti_alias = true;

    let mut pb = PathBuilder::new();
    match shape_type {
        ShapeType::Rectangle => {
            let (x0, y0) = (start.x.min(end.x) as f32, start.y.min(end.y) as f32);
            let (x1, y1) = (start.x.max(end.x) as f32, start.y.max(end.y) as f32);
            pb.move_to(x0, y0);
            pb.line_to(x1, y0);
            pb.line_to(x1, y1);
            pb.line_to(x0, y1);
            pb.close();
        }
        ShapeType::Ellipse => {
            let cx = ((start.x + end.x) / 2.0) as f32;
            let cy = ((start.y + end.y) / 2.0) as f32;
            let rx = ((end.x - start.x).abs() / 2.0).max(0.5) as f32;
            let ry = ((end.y - start.y).abs() / 2.0).max(0.5) as f32;
            pb.push_oval(tiny_skia::Rect::from_xywh(cx - rx, cy - ry, rx * 2.0, ry * 2.0).unwrap_or_default());
        }
        ShapeType::Line => {
            pb.move_to(start.x as f32, start.y as f32);
            pb.line_to(end.x as f32, end.y as f32);
        }
    }
    let Some(path) = pb.finish() else { return };
    let stroke = Stroke { width: width.max(0.1) as f32, line_cap: LineCap::Round, line_join: LineJoin::Round, ..Stroke::default() };
    pixmap.stroke_path(&path, &paint, &stroke, transform, None);
}

fn draw_text_box(pixmap: &mut Pixmap, text: &str, position: Point, color: &str, font_size: f64, transform: Transform) {
    // No font-shaping dependency in the stack; render the text's bounding
    // box outline so the snapshot at least reserves its footprint.
    let (x0, y0, x1, y1) = text_extent(text, position, font_size);
    let mut paint = Paint::default();
    paint.set_color(parse_color(color));
    paint.anti_alias = true;

    let Some(rect) = tiny_skia::Rect::from_ltrb(x0 as f32, y0 as f32, x1 as f32, y1 as f32) else { return };
    let path = PathBuilder::from_rect(rect);
    let stroke = Stroke { width: 1.0, ..Stroke::default() };
    pixmap.stroke_path(&path, &paint, &stroke, transform, None);
}

// =============================================================================
// COMPACTION SCHEDULING
// =============================================================================

#[derive(Clone)]
pub struct SnapshotEngine {
    pool: PgPool,
    threshold: i64,
    in_progress: Arc<Mutex<HashSet<Uuid>>>,
}

impl SnapshotEngine {
    #[must_use]
    pub fn new(pool: PgPool, threshold: i64) -> Self {
        Self { pool, threshold, in_progress: Arc::new(Mutex::new(HashSet::new())) }
    }

    /// Called after every successfully sequenced event. Fires a background
    /// compaction when `seq` lands on a threshold multiple and none is
    /// already running for this board; otherwise a no-op.
    pub fn maybe_trigger(&self, board_id: Uuid, seq: i64) {
        if self.threshold <= 0 || seq % self.threshold != 0 {
            return;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            {
                let mut in_progress = engine.in_progress.lock().await;
                if !in_progress.insert(board_id) {
                    return;
                }
            }
            if let Err(e) = engine.compact(board_id, seq).await {
                tracing::error!(%board_id, error = %e, "compaction failed; prior snapshot, if any, remains valid");
            }
            engine.in_progress.lock().await.remove(&board_id);
        });
    }

    async fn compact(&self, board_id: Uuid, seq: i64) -> Result<(), store::StoreError> {
        let events = store::events_after(&self.pool, board_id, 0).await?;
        let events: Vec<_> = events.into_iter().filter(|e| e.seq <= seq).collect();
        let result = render(&events);
        let image_data = base64::engine::general_purpose::STANDARD.encode(&result.png_bytes);
        store::save_snapshot(&self.pool, board_id, seq, &image_data, result.offset_x, result.offset_y).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
