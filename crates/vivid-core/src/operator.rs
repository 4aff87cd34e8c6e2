//! The operator contract.
//!
//! An operator is one node in a chain: it declares what it outputs, which
//! named upstream operators it reads, and a parameter set; the chain owns
//! scheduling, input resolution, and cook bookkeeping. Leaf crates
//! implement this trait for every effect, generator, and analyzer.

use std::any::Any;

use vivid_gpu::TextureHandle;

use crate::audio::{AudioBuffer, AudioOperator};
use crate::chain::Inputs;
use crate::context::Context;
use crate::param::{ParamDecl, ParamSet};
use crate::state::OperatorState;

/// Maximum indexed input slots per operator.
pub const MAX_INPUTS: usize = 8;

/// Static classification of what an operator produces.
///
/// Fixed at construction; consumers use it to validate connections and the
/// scheduler uses it to split the graph between the render frame and the
/// audio callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// One output texture per frame.
    Texture,
    /// One audio buffer per block.
    Audio,
    /// A scalar readable every frame.
    Value,
    /// An audio buffer per block plus a synchronously readable scalar.
    AudioValue,
    /// Geometry for the 3D path.
    Mesh,
    /// A light source description.
    Light,
    /// An assembled 3D scene.
    Scene,
    /// Side effects only (outputs, senders).
    None,
}

impl OutputKind {
    /// Tag used by the editor bridge and inspector.
    pub fn tag(self) -> &'static str {
        match self {
            OutputKind::Texture => "Texture",
            OutputKind::Audio => "Audio",
            OutputKind::Value => "Value",
            OutputKind::AudioValue => "AudioValue",
            OutputKind::Mesh => "Mesh",
            OutputKind::Light => "Light",
            OutputKind::Scene => "Scene",
            OutputKind::None => "None",
        }
    }

    /// Whether this kind participates in the audio subgraph.
    pub fn is_audio_eligible(self) -> bool {
        matches!(
            self,
            OutputKind::Audio | OutputKind::AudioValue | OutputKind::Value
        )
    }
}

/// Accepted-kind sets for common slot declarations.
///
/// An empty set means the slot accepts any kind.
pub mod accepts {
    use super::OutputKind;

    /// Texture producers only.
    pub const TEXTURE: &[OutputKind] = &[OutputKind::Texture];
    /// Audio producers (including analyzers).
    pub const AUDIO: &[OutputKind] = &[OutputKind::Audio, OutputKind::AudioValue];
    /// Scalar producers (including analyzers).
    pub const VALUE: &[OutputKind] = &[OutputKind::Value, OutputKind::AudioValue];
    /// Any kind.
    pub const ANY: &[OutputKind] = &[];
}

struct SlotDecl {
    label: &'static str,
    accepts: &'static [OutputKind],
    name: Option<String>,
}

/// An operator's declared input slots and their connected names.
///
/// Inputs are non-owning: a slot stores the *instance name* of the upstream
/// operator, and the chain resolves names to storage indices whenever the
/// topology changes. Unresolvable or kind-mismatched slots run as absent.
#[derive(Default)]
pub struct InputSlots {
    slots: Vec<SlotDecl>,
}

impl InputSlots {
    /// Creates an empty slot table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a slot; builder form for operator constructors.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_INPUTS`] slots are declared.
    pub fn slot(mut self, label: &'static str, accepts: &'static [OutputKind]) -> Self {
        assert!(self.slots.len() < MAX_INPUTS, "operator exceeds {MAX_INPUTS} input slots");
        self.slots.push(SlotDecl {
            label,
            accepts,
            name: None,
        });
        self
    }

    /// Number of declared slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slots are declared.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot label, for the inspector.
    pub fn label(&self, slot: usize) -> Option<&'static str> {
        self.slots.get(slot).map(|s| s.label)
    }

    /// Accepted kinds for a slot. Empty means any.
    pub fn accepted(&self, slot: usize) -> &'static [OutputKind] {
        self.slots.get(slot).map_or(accepts::ANY, |s| s.accepts)
    }

    /// Whether `kind` may connect to `slot`.
    pub fn accepts_kind(&self, slot: usize, kind: OutputKind) -> bool {
        let set = self.accepted(slot);
        set.is_empty() || set.contains(&kind)
    }

    /// Connected upstream name, if set.
    pub fn name(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).and_then(|s| s.name.as_deref())
    }

    /// Connects `slot` to the operator named `name`.
    ///
    /// Returns `false` if the slot does not exist.
    pub fn connect(&mut self, slot: usize, name: impl Into<String>) -> bool {
        match self.slots.get_mut(slot) {
            Some(s) => {
                s.name = Some(name.into());
                true
            }
            None => false,
        }
    }

    /// Clears a slot's connection.
    pub fn disconnect(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.name = None;
        }
    }
}

/// A node in a chain.
///
/// Contract highlights (the chain guarantees the preconditions):
///
/// - `init` runs once, lazily, in topological order before the operator's
///   first `process`; implementations are memoized and safe to call again.
/// - `process` runs at most once per frame, after every resolved input's
///   `process`. It must tolerate absent inputs (produce black / silence /
///   zero) and must not read `Context` fields outside the current frame.
/// - `cleanup` releases everything `init` acquired and is idempotent.
/// - Downstream code never matches on concrete types; specialization goes
///   through [`as_audio`](Operator::as_audio) or the visualization
///   registry.
pub trait Operator: Any {
    /// Human-readable type label, independent of the chain-given instance
    /// name (e.g. `"Noise"`).
    fn type_name(&self) -> &'static str;

    /// The kind of output this operator produces. Constant for the
    /// operator's lifetime.
    fn output_kind(&self) -> OutputKind;

    /// Declared input slots, if the operator takes inputs.
    fn inputs(&self) -> Option<&InputSlots> {
        None
    }

    /// Mutable access to the input slots, for chain-driven wiring.
    fn inputs_mut(&mut self) -> Option<&mut InputSlots> {
        None
    }

    /// Embedded parameter set, if the operator has parameters.
    fn param_set(&self) -> Option<&ParamSet> {
        None
    }

    /// Mutable access to the embedded parameter set.
    fn param_set_mut(&mut self) -> Option<&mut ParamSet> {
        None
    }

    /// Ordered parameter declarations.
    fn params(&self) -> Vec<ParamDecl> {
        self.param_set()
            .map(|p| p.decls().copied().collect())
            .unwrap_or_default()
    }

    /// Parameter value by name.
    fn get_param(&self, name: &str) -> Option<[f32; 4]> {
        self.param_set().and_then(|p| p.get(name))
    }

    /// Writes a parameter by name, clamped to its declared range.
    /// Returns `false` for unknown names.
    fn set_param(&mut self, name: &str, value: [f32; 4]) -> bool {
        self.param_set_mut().is_some_and(|p| p.set(name, value))
    }

    /// Allocates output resources. Memoized; may be called repeatedly.
    fn init(&mut self, _ctx: &mut Context) {}

    /// Produces this frame's output.
    fn process(&mut self, ctx: &mut Context, inputs: &Inputs);

    /// Releases output resources. Idempotent.
    fn cleanup(&mut self, _ctx: &mut Context) {}

    /// Whether the operator wants to cook this frame regardless of input
    /// and parameter changes. Defaults to `true`; operators with
    /// frame-idempotent output return `false` to enable output caching.
    fn needs_cook(&self, _ctx: &Context) -> bool {
        true
    }

    /// Texture output, for [`OutputKind::Texture`] operators.
    fn texture_output(&self) -> Option<TextureHandle> {
        None
    }

    /// Scalar output, for [`OutputKind::Value`] and
    /// [`OutputKind::AudioValue`] operators.
    fn value_output(&self) -> Option<f32> {
        None
    }

    /// Audio output, for [`OutputKind::Audio`] and
    /// [`OutputKind::AudioValue`] operators.
    fn audio_output(&self) -> Option<&AudioBuffer> {
        None
    }

    /// The audio-thread face of this operator, if it has one.
    fn as_audio(&mut self) -> Option<&mut dyn AudioOperator> {
        None
    }

    /// Captures state for hot-reload. `None` (the default) means the
    /// operator is reconstructed at defaults.
    fn save_state(&self) -> Option<Box<dyn OperatorState>> {
        None
    }

    /// Restores state captured by [`save_state`](Operator::save_state).
    /// Implementations downcast and ignore mismatched payloads.
    fn load_state(&mut self, _state: Box<dyn OperatorState>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_declaration_and_wiring() {
        let mut slots = InputSlots::new()
            .slot("source", accepts::TEXTURE)
            .slot("modulator", accepts::VALUE);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots.label(0), Some("source"));
        assert!(slots.accepts_kind(0, OutputKind::Texture));
        assert!(!slots.accepts_kind(0, OutputKind::Audio));
        assert!(slots.accepts_kind(1, OutputKind::AudioValue));

        assert!(slots.connect(0, "noise"));
        assert_eq!(slots.name(0), Some("noise"));
        assert!(!slots.connect(5, "nope"));

        slots.disconnect(0);
        assert_eq!(slots.name(0), None);
    }

    #[test]
    fn empty_accept_set_means_any() {
        let slots = InputSlots::new().slot("any", accepts::ANY);
        assert!(slots.accepts_kind(0, OutputKind::Mesh));
        assert!(slots.accepts_kind(0, OutputKind::None));
    }
}
