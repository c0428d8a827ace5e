//! The output sink: bounded buffering with coalesced display flushes.
//!
//! Engines call [`OutputSink::append`] once per line the guest program
//! writes. The sink appends to its [`OutputBuffer`], enforces the character
//! ceiling, and schedules at most one display flush per frame. Failing
//! `append` is how the harness stops a runaway program: engines must turn an
//! `Err` from the sink into an abort of the running code.

use std::{
    cell::RefCell,
    fmt, iter,
    rc::{Rc, Weak},
};

use crate::{
    display::SharedDisplay,
    error::AbortReason,
    frames::{FrameId, FrameScheduler},
    session::{ActiveGeneration, Generation},
};

// =============================================================================
// OutputBuffer
// =============================================================================

/// Output text accumulated by one session, bounded by a character ceiling.
///
/// Lengths are counted in `char`s. The buffer never holds more than `limit`
/// characters: the chunk that would cross the ceiling is truncated at it and
/// the buffer freezes, rejecting every later append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    text: String,
    chars: usize,
    limit: usize,
    frozen: bool,
}

impl OutputBuffer {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            limit,
            frozen: false,
        }
    }

    /// Appends `chunk` followed by a newline.
    pub fn push_line(&mut self, chunk: &str) -> Result<(), AbortReason> {
        let exceeded = AbortReason::OutputLimitExceeded { limit: self.limit };
        if self.frozen {
            return Err(exceeded);
        }
        let incoming = chunk.chars().count() + 1;
        if self.chars + incoming > self.limit {
            let room = self.limit - self.chars;
            self.text.extend(chunk.chars().chain(iter::once('\n')).take(room));
            self.chars = self.limit;
            self.frozen = true;
            return Err(exceeded);
        }
        self.text.push_str(chunk);
        self.text.push('\n');
        self.chars += incoming;
        Ok(())
    }

    /// Drops the buffered text. A frozen buffer stays frozen.
    pub fn clear(&mut self) {
        self.text.clear();
        self.chars = 0;
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Buffered length in characters.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.chars
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

// =============================================================================
// OutputSink
// =============================================================================

/// Output channel of one run session.
///
/// Cheap to clone; clones share the same buffer. A sink only touches the
/// display while its generation is the active one.
#[derive(Clone)]
pub struct OutputSink {
    inner: Rc<SinkInner>,
}

struct SinkInner {
    generation: Generation,
    active: ActiveGeneration,
    frames: Rc<dyn FrameScheduler>,
    display: SharedDisplay,
    state: RefCell<SinkState>,
}

struct SinkState {
    buffer: OutputBuffer,
    pending_frame: Option<FrameId>,
    abort: Option<AbortReason>,
    chunks: usize,
}

impl OutputSink {
    /// Creates the sink for the session tagged `generation`.
    #[must_use]
    pub fn new(
        generation: Generation,
        limit: usize,
        active: ActiveGeneration,
        frames: Rc<dyn FrameScheduler>,
        display: SharedDisplay,
    ) -> Self {
        Self {
            inner: Rc::new(SinkInner {
                generation,
                active,
                frames,
                display,
                state: RefCell::new(SinkState {
                    buffer: OutputBuffer::new(limit),
                    pending_frame: None,
                    abort: None,
                    chunks: 0,
                }),
            }),
        }
    }

    /// Appends one chunk of guest output.
    ///
    /// Returns the abort reason once the session must stop: the buffer hit
    /// its ceiling, or a newer session superseded this one.
    pub fn append(&self, chunk: &str) -> Result<(), AbortReason> {
        let inner = &self.inner;
        if !inner.active.is_current(inner.generation) {
            return Err(AbortReason::Superseded);
        }

        let mut state = inner.state.borrow_mut();
        if let Some(reason) = state.abort {
            return Err(reason);
        }
        state.chunks += 1;
        if let Err(reason) = state.buffer.push_line(chunk) {
            state.abort = Some(reason);
            tracing::warn!(
                generation = %inner.generation,
                limit = state.buffer.limit(),
                chunks = state.chunks,
                "output limit exceeded, aborting run"
            );
            return Err(reason);
        }
        let needs_frame = state.pending_frame.is_none();
        drop(state);

        if needs_frame {
            let weak = Rc::downgrade(inner);
            let id = inner.frames.request_frame(Box::new(move || flush_from_frame(&weak)));
            inner.state.borrow_mut().pending_frame = Some(id);
        }
        Ok(())
    }

    /// Writes the buffer to the display immediately, replacing any scheduled flush.
    pub fn flush_now(&self) {
        self.cancel_pending();
        let inner = &self.inner;
        if !inner.active.is_current(inner.generation) {
            return;
        }
        let state = inner.state.borrow();
        inner.display.borrow_mut().render_output(state.buffer.as_str());
    }

    /// Cancels the scheduled flush, if any.
    pub fn cancel_pending(&self) {
        let pending = self.inner.state.borrow_mut().pending_frame.take();
        if let Some(id) = pending {
            self.inner.frames.cancel_frame(id);
        }
    }

    /// Empties the buffer and, for the active session, the output panel.
    pub fn clear(&self) {
        self.cancel_pending();
        self.inner.state.borrow_mut().buffer.clear();
        if self.is_current() {
            self.inner.display.borrow_mut().render_output("");
        }
    }

    /// Copy of the buffered output.
    #[must_use]
    pub fn output(&self) -> String {
        self.inner.state.borrow().buffer.as_str().to_owned()
    }

    /// Why the sink started refusing output, if it has.
    #[must_use]
    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.inner.state.borrow().abort
    }

    /// Characters the buffer can still take, counting each chunk's newline.
    ///
    /// Fails like [`append`](Self::append) would once the sink refuses output.
    pub fn room(&self) -> Result<usize, AbortReason> {
        if !self.is_current() {
            return Err(AbortReason::Superseded);
        }
        let state = self.inner.state.borrow();
        if let Some(reason) = state.abort {
            return Err(reason);
        }
        Ok(state.buffer.limit() - state.buffer.char_count())
    }

    /// Number of chunks offered to the sink, including the one that tripped the ceiling.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.inner.state.borrow().chunks
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.inner.generation
    }

    /// Whether this sink's session is still the active one.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.inner.active.is_current(self.inner.generation)
    }

    /// Whether a coalesced flush is scheduled.
    #[must_use]
    pub fn has_pending_flush(&self) -> bool {
        self.inner.state.borrow().pending_frame.is_some()
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("OutputSink")
            .field("generation", &self.inner.generation)
            .field("chars", &state.buffer.char_count())
            .field("abort", &state.abort)
            .finish_non_exhaustive()
    }
}

/// Frame callback: renders the buffer unless the session was superseded.
fn flush_from_frame(weak: &Weak<SinkInner>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut state = inner.state.borrow_mut();
    state.pending_frame = None;
    if !inner.active.is_current(inner.generation) {
        tracing::debug!(generation = %inner.generation, "dropping stale flush");
        return;
    }
    inner.display.borrow_mut().render_output(state.buffer.as_str());
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{display::MemoryDisplay, frames::ManualFrames};

    struct Fixture {
        active: ActiveGeneration,
        frames: Rc<ManualFrames>,
        display: Rc<RefCell<MemoryDisplay>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                active: ActiveGeneration::new(),
                frames: Rc::new(ManualFrames::new()),
                display: MemoryDisplay::shared(),
            }
        }

        fn sink(&self, limit: usize) -> OutputSink {
            let generation = self.active.advance();
            OutputSink::new(
                generation,
                limit,
                self.active.clone(),
                self.frames.clone(),
                self.display.clone(),
            )
        }
    }

    #[test]
    fn buffer_appends_lines_in_order() {
        let mut buffer = OutputBuffer::new(100);
        buffer.push_line("a").unwrap();
        buffer.push_line("bc").unwrap();
        assert_eq!(buffer.as_str(), "a\nbc\n");
        assert_eq!(buffer.char_count(), 5);
    }

    #[test]
    fn buffer_accepts_output_exactly_at_ceiling() {
        let mut buffer = OutputBuffer::new(4);
        buffer.push_line("abc").unwrap();
        assert!(!buffer.is_frozen());
        assert_eq!(buffer.char_count(), 4);
    }

    #[test]
    fn buffer_truncates_crossing_chunk_and_freezes() {
        let mut buffer = OutputBuffer::new(6);
        buffer.push_line("abc").unwrap();
        let err = buffer.push_line("defg").unwrap_err();
        assert_eq!(err, AbortReason::OutputLimitExceeded { limit: 6 });
        assert_eq!(buffer.as_str(), "abc\nde");
        assert!(buffer.is_frozen());
        assert!(buffer.push_line("x").is_err());
        assert_eq!(buffer.as_str(), "abc\nde");
    }

    #[test]
    fn buffer_counts_characters_not_bytes() {
        let mut buffer = OutputBuffer::new(3);
        buffer.push_line("éé").unwrap();
        assert_eq!(buffer.char_count(), 3);
        assert!(buffer.push_line("é").is_err());
        assert_eq!(buffer.as_str(), "éé\n");
    }

    #[test]
    fn appends_between_frames_coalesce_into_one_render() {
        let fixture = Fixture::new();
        let sink = fixture.sink(1_000);
        for i in 0..50 {
            sink.append(&i.to_string()).unwrap();
        }
        assert_eq!(fixture.frames.pending(), 1);
        assert_eq!(fixture.display.borrow().render_count(), 0);

        fixture.frames.run_frame();
        let display = fixture.display.borrow();
        assert_eq!(display.render_count(), 1);
        let expected: String = (0..50).map(|i| format!("{i}\n")).collect();
        assert_eq!(display.output(), expected);
    }

    #[test]
    fn next_append_after_flush_schedules_a_new_frame() {
        let fixture = Fixture::new();
        let sink = fixture.sink(1_000);
        sink.append("one").unwrap();
        fixture.frames.run_frame();
        assert!(!sink.has_pending_flush());

        sink.append("two").unwrap();
        assert!(sink.has_pending_flush());
        fixture.frames.run_frame();
        assert_eq!(fixture.display.borrow().output(), "one\ntwo\n");
        assert_eq!(fixture.display.borrow().render_count(), 2);
    }

    #[test]
    fn limit_trips_and_stays_tripped() {
        let fixture = Fixture::new();
        let sink = fixture.sink(10);
        sink.append("1234").unwrap();
        let err = sink.append("56789").unwrap_err();
        assert_eq!(err, AbortReason::OutputLimitExceeded { limit: 10 });
        assert_eq!(sink.append("more"), Err(err));
        assert_eq!(sink.abort_reason(), Some(err));
        assert_eq!(sink.chunk_count(), 2);

        sink.flush_now();
        assert_eq!(fixture.display.borrow().output(), "1234\n56789");
        assert_eq!(fixture.frames.pending(), 0);
    }

    #[test]
    fn room_shrinks_with_output_and_fails_once_refusing() {
        let fixture = Fixture::new();
        let sink = fixture.sink(10);
        assert_eq!(sink.room(), Ok(10));
        sink.append("abc").unwrap();
        assert_eq!(sink.room(), Ok(6));

        sink.append("too long").unwrap_err();
        assert_eq!(sink.room(), Err(AbortReason::OutputLimitExceeded { limit: 10 }));

        let other = fixture.sink(10);
        assert_eq!(other.room(), Ok(10));
        assert_eq!(sink.room(), Err(AbortReason::Superseded));
    }

    #[test]
    fn stale_sink_refuses_output_and_never_renders() {
        let fixture = Fixture::new();
        let old = fixture.sink(100);
        old.append("old output").unwrap();

        let new = fixture.sink(100);
        assert_eq!(old.append("more"), Err(AbortReason::Superseded));

        fixture.frames.run_frame();
        old.flush_now();
        assert_eq!(fixture.display.borrow().render_count(), 0);

        new.append("fresh").unwrap();
        fixture.frames.run_frame();
        assert_eq!(fixture.display.borrow().output(), "fresh\n");
    }

    #[test]
    fn clear_empties_buffer_and_panel() {
        let fixture = Fixture::new();
        let sink = fixture.sink(100);
        sink.append("text").unwrap();
        sink.clear();
        assert_eq!(fixture.frames.pending(), 0);
        assert_eq!(sink.output(), "");
        assert_eq!(fixture.display.borrow().output(), "");

        sink.append("after").unwrap();
        fixture.frames.run_frame();
        assert_eq!(fixture.display.borrow().output(), "after\n");
    }
}
