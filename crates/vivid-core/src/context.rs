//! Per-frame environment handed to every operator.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use vivid_gpu::GpuBackend;

use crate::audio::{AudioEvent, AudioEvents};

/// Edge-and-level state of one button or key for the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonState {
    /// Went down this frame.
    pub pressed: bool,
    /// Went up this frame.
    pub released: bool,
    /// Currently down.
    pub held: bool,
}

/// Input snapshot: the host feeds raw device state, [`Context::begin_frame`]
/// latches per-frame edges so operators and user code see a consistent view
/// for the whole frame.
#[derive(Default)]
pub struct InputState {
    mouse: [f32; 2],
    last_mouse: [f32; 2],
    button_down: [bool; 3],
    button_prev: [bool; 3],
    buttons: [ButtonState; 3],
    key_down: HashSet<u32>,
    key_pressed: HashSet<u32>,
    key_released: HashSet<u32>,
    key_prev: HashSet<u32>,
    scroll: [f32; 2],
}

impl InputState {
    /// Host: reports the current cursor position in pixels.
    pub fn set_mouse_pos(&mut self, x: f32, y: f32) {
        self.mouse = [x, y];
    }

    /// Host: reports a mouse button level (0 = left, 1 = right, 2 = middle).
    pub fn set_mouse_button(&mut self, button: usize, down: bool) {
        if let Some(b) = self.button_down.get_mut(button) {
            *b = down;
        }
    }

    /// Host: reports a key level change.
    pub fn set_key(&mut self, code: u32, down: bool) {
        if down {
            self.key_down.insert(code);
        } else {
            self.key_down.remove(&code);
        }
    }

    /// Host: accumulates scroll wheel motion for this frame.
    pub fn add_scroll(&mut self, dx: f32, dy: f32) {
        self.scroll[0] += dx;
        self.scroll[1] += dy;
    }

    fn latch(&mut self) {
        self.last_mouse = self.mouse;
        for i in 0..3 {
            let down = self.button_down[i];
            let prev = self.button_prev[i];
            self.buttons[i] = ButtonState {
                pressed: down && !prev,
                released: !down && prev,
                held: down,
            };
            self.button_prev[i] = down;
        }
        self.key_pressed = self.key_down.difference(&self.key_prev).copied().collect();
        self.key_released = self.key_prev.difference(&self.key_down).copied().collect();
        self.key_prev = self.key_down.clone();
    }
}

/// Per-frame environment: time, input, the GPU backend, the audio handle,
/// and the host-facing error and debug sinks.
///
/// One `Context` lives for the whole session. The host calls
/// [`begin_frame`](Context::begin_frame), runs the user `update` and
/// `Chain::process`, then [`end_frame`](Context::end_frame).
pub struct Context {
    gpu: Box<dyn GpuBackend>,
    start: Instant,
    time: f64,
    dt: f32,
    frame: u64,
    width: u32,
    height: u32,
    input: InputState,
    audio: Option<Box<dyn AudioEvents>>,
    debug_values: BTreeMap<String, f32>,
    recording: bool,
    error: Option<String>,
}

impl Context {
    /// Creates a session context around the host's GPU backend.
    pub fn new(gpu: Box<dyn GpuBackend>, width: u32, height: u32) -> Self {
        Self {
            gpu,
            start: Instant::now(),
            time: 0.0,
            dt: 0.0,
            frame: 0,
            width,
            height,
            input: InputState::default(),
            audio: None,
            debug_values: BTreeMap::new(),
            recording: false,
            error: None,
        }
    }

    /// Starts a frame: samples wall-clock time, latches input edges, clears
    /// the debug overlay values, and opens the GPU frame.
    pub fn begin_frame(&mut self) {
        let now = self.start.elapsed().as_secs_f64();
        self.begin_frame_at(now);
    }

    /// Starts a frame at an explicit time, for fixed-step offline render.
    pub fn begin_frame_at(&mut self, time: f64) {
        self.dt = (time - self.time) as f32;
        self.time = time;
        self.input.latch();
        self.debug_values.clear();
        self.gpu.begin_frame();
    }

    /// Ends the frame: resets per-frame scroll, bumps the frame index.
    pub fn end_frame(&mut self) {
        self.input.scroll = [0.0; 2];
        self.frame += 1;
    }

    // --- Time and geometry ---

    /// Seconds since session start, as seen at `begin_frame`.
    pub fn time(&self) -> f32 {
        self.time as f32
    }

    /// Seconds since session start, full precision.
    pub fn time_f64(&self) -> f64 {
        self.time
    }

    /// Seconds since the previous frame.
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Frame index, starting at 0.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Output width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Output height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Host: reports a window resize.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    // --- GPU ---

    /// The session's GPU backend.
    pub fn gpu(&mut self) -> &mut dyn GpuBackend {
        self.gpu.as_mut()
    }

    // --- Input ---

    /// Mutable input feed, for the host event loop.
    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    /// Cursor position in pixels.
    pub fn mouse(&self) -> [f32; 2] {
        self.input.mouse
    }

    /// Cursor position mapped to `[-1, 1]` with Y up.
    pub fn mouse_norm(&self) -> [f32; 2] {
        if self.width == 0 || self.height == 0 {
            return [0.0, 0.0];
        }
        [
            (self.input.mouse[0] / self.width as f32) * 2.0 - 1.0,
            1.0 - (self.input.mouse[1] / self.height as f32) * 2.0,
        ]
    }

    /// Mouse button state for this frame (0 = left, 1 = right, 2 = middle).
    pub fn mouse_button(&self, button: usize) -> ButtonState {
        self.input
            .buttons
            .get(button)
            .copied()
            .unwrap_or_default()
    }

    /// Key state for this frame.
    pub fn key(&self, code: u32) -> ButtonState {
        ButtonState {
            pressed: self.input.key_pressed.contains(&code),
            released: self.input.key_released.contains(&code),
            held: self.input.key_down.contains(&code),
        }
    }

    /// Scroll wheel motion accumulated this frame.
    pub fn scroll(&self) -> [f32; 2] {
        self.input.scroll
    }

    // --- Audio ---

    /// Host: installs the audio handle after the audio graph is built.
    pub fn set_audio(&mut self, audio: Box<dyn AudioEvents>) {
        self.audio = Some(audio);
    }

    /// Host: removes the audio handle (before teardown or reinstall).
    pub fn take_audio(&mut self) -> Option<Box<dyn AudioEvents>> {
        self.audio.take()
    }

    /// The audio handle, if audio is installed.
    pub fn audio(&mut self) -> Option<&mut (dyn AudioEvents + '_)> {
        match &mut self.audio {
            Some(audio) => Some(audio.as_mut()),
            None => None,
        }
    }

    /// Queues a `NoteOn` for the named audio operator.
    ///
    /// Returns `false` if audio is not installed, the name is unknown, or
    /// the event queue is full.
    pub fn note_on(&mut self, name: &str, freq: f32, velocity: f32) -> bool {
        self.queue_for(name, |target| AudioEvent::note_on(target, freq, velocity))
    }

    /// Queues a `NoteOff` for the named audio operator.
    pub fn note_off(&mut self, name: &str) -> bool {
        self.queue_for(name, AudioEvent::note_off)
    }

    /// Queues a one-shot `Trigger` for the named audio operator.
    pub fn trigger(&mut self, name: &str) -> bool {
        self.queue_for(name, AudioEvent::trigger)
    }

    /// Queues a `ParamChange` for the named audio operator.
    pub fn audio_param(&mut self, name: &str, param: u32, value: f32) -> bool {
        self.queue_for(name, |target| AudioEvent::param_change(target, param, value))
    }

    fn queue_for(&mut self, name: &str, make: impl FnOnce(u32) -> AudioEvent) -> bool {
        let Some(audio) = self.audio.as_deref_mut() else {
            return false;
        };
        let Some(target) = audio.operator_index(name) else {
            tracing::warn!(name, "audio event for unknown operator");
            return false;
        };
        audio.push(make(target))
    }

    // --- Debug and capture ---

    /// Publishes a value to the inspector overlay for this frame.
    pub fn debug_value(&mut self, name: impl Into<String>, value: f32) {
        self.debug_values.insert(name.into(), value);
    }

    /// Values published this frame.
    pub fn debug_values(&self) -> impl Iterator<Item = (&str, f32)> {
        self.debug_values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Whether the host is capturing output this session.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Host: toggles the capture flag.
    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    // --- Error surface ---

    /// Surfaces a non-fatal error to the host overlay.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// The current error, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Clears the error overlay.
    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivid_gpu::HeadlessBackend;

    fn ctx() -> Context {
        Context::new(Box::new(HeadlessBackend::new()), 1280, 720)
    }

    #[test]
    fn fixed_step_time() {
        let mut ctx = ctx();
        ctx.begin_frame_at(0.0);
        ctx.end_frame();
        ctx.begin_frame_at(1.0 / 60.0);
        assert!((ctx.dt() - 1.0 / 60.0).abs() < 1e-6);
        assert_eq!(ctx.frame(), 1);
    }

    #[test]
    fn mouse_edges_latch_per_frame() {
        let mut ctx = ctx();
        ctx.input_mut().set_mouse_button(0, true);
        ctx.begin_frame_at(0.0);
        assert!(ctx.mouse_button(0).pressed);
        assert!(ctx.mouse_button(0).held);
        ctx.end_frame();

        ctx.begin_frame_at(0.016);
        assert!(!ctx.mouse_button(0).pressed);
        assert!(ctx.mouse_button(0).held);

        ctx.input_mut().set_mouse_button(0, false);
        ctx.end_frame();
        ctx.begin_frame_at(0.033);
        assert!(ctx.mouse_button(0).released);
        assert!(!ctx.mouse_button(0).held);
    }

    #[test]
    fn mouse_norm_flips_y() {
        let mut ctx = ctx();
        ctx.input_mut().set_mouse_pos(640.0, 0.0);
        ctx.begin_frame_at(0.0);
        let norm = ctx.mouse_norm();
        assert!((norm[0]).abs() < 1e-6);
        assert!((norm[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn audio_events_without_audio_report_false() {
        let mut ctx = ctx();
        assert!(!ctx.note_on("osc", 440.0, 1.0));
        assert!(!ctx.trigger("kick"));
    }
}
