//! The Graphics Sink: a line-drawing surface abstracted as a trait with
//! `line` and `string` operations; the CLI wires a headless [`NullSink`]
//! by default (mirroring `graphicsnull.c`'s no-op device).

/// The two operations the `draw_line`/`draw_string` primitives forward to.
pub trait GraphicsSink {
    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64);
    fn string(&mut self, s: &str, x: f64, y: f64);
}

/// A no-op sink for headless runs (tests, the default CLI invocation).
#[derive(Debug, Default)]
pub struct NullSink;

impl GraphicsSink for NullSink {
    fn line(&mut self, _x1: f64, _y1: f64, _x2: f64, _y2: f64) {}
    fn string(&mut self, _s: &str, _x: f64, _y: f64) {}
}
