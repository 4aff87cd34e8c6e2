//! Type-indexed visualization registry for the inspector overlay.
//!
//! Addons register a draw function for their concrete operator type; the
//! inspector looks the function up by the operator's dynamic type and
//! falls back to a kind-appropriate default (waveform, meter, swatch,
//! value readout) when none is registered. No downcasting in the
//! inspector, no virtual hook on the operator trait.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use vivid_core::{Operator, OutputKind};

/// Bounding rectangle handed to draw functions.
#[derive(Clone, Copy, Debug)]
pub struct VizRect {
    /// Left edge.
    pub min_x: f32,
    /// Top edge.
    pub min_y: f32,
    /// Right edge.
    pub max_x: f32,
    /// Bottom edge.
    pub max_y: f32,
}

impl VizRect {
    /// Rectangle width.
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    /// Rectangle height.
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f32 {
        (self.min_x + self.max_x) * 0.5
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        (self.min_y + self.max_y) * 0.5
    }
}

/// Immediate-mode draw list the overlay provides.
///
/// Deliberately shaped like the ImGui draw-list subset the inspector
/// uses, so a GUI host implements it as a thin shim.
pub trait DrawSurface {
    /// Draws a line segment.
    fn line(&mut self, from: [f32; 2], to: [f32; 2], color: [f32; 4], thickness: f32);
    /// Draws a rectangle, filled or outlined.
    fn rect(&mut self, min: [f32; 2], max: [f32; 2], color: [f32; 4], filled: bool);
    /// Draws text at a position.
    fn text(&mut self, pos: [f32; 2], color: [f32; 4], text: &str);
}

/// Draw function for one operator type.
pub type VizFn = fn(&dyn Operator, &mut dyn DrawSurface, &VizRect);

/// Process-wide `TypeId -> VizFn` map.
pub struct VizRegistry {
    map: RwLock<HashMap<TypeId, VizFn>>,
}

impl VizRegistry {
    /// The process-wide registry.
    pub fn global() -> &'static VizRegistry {
        static REGISTRY: OnceLock<VizRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| VizRegistry {
            map: RwLock::new(HashMap::new()),
        })
    }

    /// Registers a draw function for operator type `T`.
    pub fn register<T: Operator>(&self, draw: VizFn) {
        self.map.write().unwrap().insert(TypeId::of::<T>(), draw);
    }

    /// Returns `true` if a custom visualizer exists for this operator.
    pub fn has(&self, op: &dyn Operator) -> bool {
        let any: &dyn Any = op;
        self.map.read().unwrap().contains_key(&any.type_id())
    }

    /// Draws `op` with its registered visualizer. Returns `false` if none
    /// is registered (caller should use [`draw_fallback`]).
    pub fn draw(&self, op: &dyn Operator, surface: &mut dyn DrawSurface, rect: &VizRect) -> bool {
        let any: &dyn Any = op;
        let Some(draw) = self.map.read().unwrap().get(&any.type_id()).copied() else {
            return false;
        };
        draw(op, surface, rect);
        true
    }
}

/// Registration helper for addon init functions.
///
/// ```rust,ignore
/// pub fn init_addon() {
///     let _ = Registrar::<Kick>::new(draw_kick);
/// }
/// ```
pub struct Registrar<T: Operator>(std::marker::PhantomData<T>);

impl<T: Operator> Registrar<T> {
    /// Registers `draw` for `T` on the global registry.
    pub fn new(draw: VizFn) -> Self {
        VizRegistry::global().register::<T>(draw);
        Self(std::marker::PhantomData)
    }
}

const METER_COLOR: [f32; 4] = [0.3, 0.9, 0.5, 1.0];
const FRAME_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 1.0];
const TEXT_COLOR: [f32; 4] = [0.9, 0.9, 0.9, 1.0];

/// Kind-appropriate default drawing for operators without a custom
/// visualizer.
pub fn draw_fallback(op: &dyn Operator, surface: &mut dyn DrawSurface, rect: &VizRect) {
    surface.rect(
        [rect.min_x, rect.min_y],
        [rect.max_x, rect.max_y],
        FRAME_COLOR,
        false,
    );
    match op.output_kind() {
        OutputKind::Audio => draw_waveform(op, surface, rect),
        OutputKind::AudioValue | OutputKind::Value => draw_meter(op, surface, rect),
        OutputKind::Texture => {
            // The overlay blits the texture itself; here just the label.
            surface.text(
                [rect.min_x + 4.0, rect.min_y + 4.0],
                TEXT_COLOR,
                op.type_name(),
            );
        }
        _ => {
            surface.text(
                [rect.min_x + 4.0, rect.center_y()],
                TEXT_COLOR,
                op.type_name(),
            );
        }
    }
}

fn draw_waveform(op: &dyn Operator, surface: &mut dyn DrawSurface, rect: &VizRect) {
    let Some(buf) = op.audio_output() else { return };
    let samples = buf.samples();
    if samples.len() < 4 {
        return;
    }
    let mid = rect.center_y();
    let half = rect.height() * 0.5;
    let step = samples.len().max(2) / 2;
    let points = (rect.width() as usize).clamp(2, step);
    let mut prev = [rect.min_x, mid];
    for i in 1..points {
        let sample = samples[(i * samples.len()) / points];
        let next = [
            rect.min_x + rect.width() * i as f32 / points as f32,
            mid - sample.clamp(-1.0, 1.0) * half,
        ];
        surface.line(prev, next, METER_COLOR, 1.0);
        prev = next;
    }
}

fn draw_meter(op: &dyn Operator, surface: &mut dyn DrawSurface, rect: &VizRect) {
    let value = op.value_output().unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = rect.width() * value;
    surface.rect(
        [rect.min_x, rect.min_y],
        [rect.min_x + filled, rect.max_y],
        METER_COLOR,
        true,
    );
}
