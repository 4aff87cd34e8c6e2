//! Operator discovery and instantiation by type name.
//!
//! The registry is the type-erasure seam between the engine and operator
//! crates (including out-of-tree addons): each entry pairs a descriptor
//! with a constructor closure, so editors and config files can create
//! operators without naming Rust types. All built-in operators register at
//! construction; addons call [`OperatorRegistry::register`] from their
//! init function.

pub mod viz;

use vivid_audio::ops::{
    ArEnvelope, AudioDelay, AudioGain, AudioMixer, Levels, NoiseGen, Oscillator, SamplePlayer,
    Spectrum,
};
use vivid_core::{Operator, OutputKind};
use vivid_effects::{Blur, Feedback, Hsv, Lfo, Mix, Noise, Output, SolidColor};

/// Describes a registered operator type.
#[derive(Debug, Clone)]
pub struct OperatorDescriptor {
    /// Unique identifier (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable type name, matching `Operator::type_name`.
    pub name: &'static str,
    /// What the operator produces.
    pub kind: OutputKind,
    /// One-line description for pickers.
    pub description: &'static str,
}

/// Factory function type for creating operators.
type OperatorFactory = fn() -> Box<dyn Operator>;

struct RegistryEntry {
    descriptor: OperatorDescriptor,
    factory: OperatorFactory,
}

/// Registry of all available operator types.
pub struct OperatorRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorRegistry {
    /// Creates a registry with every built-in operator registered.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(17),
        };
        registry.register_builtins();
        registry
    }

    fn register_builtins(&mut self) {
        // Texture generators and effects.
        self.register(
            OperatorDescriptor {
                id: "noise",
                name: "Noise",
                kind: OutputKind::Texture,
                description: "Animated fractal noise generator",
            },
            || Box::new(Noise::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "solid",
                name: "SolidColor",
                kind: OutputKind::Texture,
                description: "Constant color fill",
            },
            || Box::new(SolidColor::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "blur",
                name: "Blur",
                kind: OutputKind::Texture,
                description: "Separable gaussian blur",
            },
            || Box::new(Blur::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "hsv",
                name: "Hsv",
                kind: OutputKind::Texture,
                description: "Hue/saturation/value adjustment",
            },
            || Box::new(Hsv::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "mix",
                name: "Mix",
                kind: OutputKind::Texture,
                description: "Two-input blend with modes",
            },
            || Box::new(Mix::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "feedback",
                name: "Feedback",
                kind: OutputKind::Texture,
                description: "Previous-frame accumulation trails",
            },
            || Box::new(Feedback::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "output",
                name: "Output",
                kind: OutputKind::Texture,
                description: "Screen output marker",
            },
            || Box::new(Output::new()),
        );

        // Value sources.
        self.register(
            OperatorDescriptor {
                id: "lfo",
                name: "Lfo",
                kind: OutputKind::Value,
                description: "Low-frequency modulation source",
            },
            || Box::new(Lfo::new()),
        );

        // Audio generators, effects, analyzers.
        self.register(
            OperatorDescriptor {
                id: "oscillator",
                name: "Oscillator",
                kind: OutputKind::Audio,
                description: "Five-waveform stereo oscillator",
            },
            || Box::new(Oscillator::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "noise_gen",
                name: "NoiseGen",
                kind: OutputKind::Audio,
                description: "White noise generator",
            },
            || Box::new(NoiseGen::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "sample_player",
                name: "SamplePlayer",
                kind: OutputKind::Audio,
                description: "Triggered WAV playback",
            },
            || Box::new(SamplePlayer::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "gain",
                name: "AudioGain",
                kind: OutputKind::Audio,
                description: "Gain stage with mix and bypass",
            },
            || Box::new(AudioGain::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "mixer",
                name: "AudioMixer",
                kind: OutputKind::Audio,
                description: "Four-input summing bus",
            },
            || Box::new(AudioMixer::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "delay",
                name: "AudioDelay",
                kind: OutputKind::Audio,
                description: "Stereo feedback delay",
            },
            || Box::new(AudioDelay::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "envelope",
                name: "ArEnvelope",
                kind: OutputKind::AudioValue,
                description: "Attack/release envelope and VCA",
            },
            || Box::new(ArEnvelope::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "levels",
                name: "Levels",
                kind: OutputKind::AudioValue,
                description: "RMS/peak level analyzer",
            },
            || Box::new(Levels::new()),
        );
        self.register(
            OperatorDescriptor {
                id: "spectrum",
                name: "Spectrum",
                kind: OutputKind::AudioValue,
                description: "FFT band analyzer",
            },
            || Box::new(Spectrum::new()),
        );
    }

    /// Registers an operator type. Addons call this from their init.
    pub fn register(&mut self, descriptor: OperatorDescriptor, factory: OperatorFactory) {
        if self.get(descriptor.id).is_some() {
            tracing::warn!(id = descriptor.id, "operator id registered twice; keeping first");
            return;
        }
        self.entries.push(RegistryEntry { descriptor, factory });
    }

    /// Descriptors for every registered operator.
    pub fn all(&self) -> impl Iterator<Item = &OperatorDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Descriptors filtered by output kind.
    pub fn of_kind(&self, kind: OutputKind) -> Vec<&OperatorDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.kind == kind)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Looks up a descriptor by id.
    pub fn get(&self, id: &str) -> Option<&OperatorDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Creates an operator instance by id.
    pub fn create(&self, id: &str) -> Option<Box<dyn Operator>> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| (e.factory)())
    }

    /// Finds a parameter's index by name for a registered operator type.
    ///
    /// Builds a temporary instance to scan declarations — the index is
    /// what `ParamChange` events carry.
    pub fn param_index_by_name(&self, id: &str, param_name: &str) -> Option<usize> {
        let op = self.create(id)?;
        op.params().iter().position(|d| d.name == param_name)
    }

    /// Number of registered operator types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_holds_all_builtins() {
        let registry = OperatorRegistry::new();
        assert_eq!(registry.len(), 17);
    }

    #[test]
    fn create_by_id() {
        let registry = OperatorRegistry::new();
        let noise = registry.create("noise").unwrap();
        assert_eq!(noise.type_name(), "Noise");
        assert_eq!(noise.output_kind(), OutputKind::Texture);
        assert!(registry.create("nonexistent").is_none());
    }

    #[test]
    fn descriptors_match_instances() {
        let registry = OperatorRegistry::new();
        for descriptor in registry.all() {
            let op = registry.create(descriptor.id).unwrap();
            assert_eq!(
                op.type_name(),
                descriptor.name,
                "descriptor/type name mismatch for '{}'",
                descriptor.id
            );
            assert_eq!(
                op.output_kind(),
                descriptor.kind,
                "descriptor/kind mismatch for '{}'",
                descriptor.id
            );
        }
    }

    #[test]
    fn kind_filter() {
        let registry = OperatorRegistry::new();
        let audio = registry.of_kind(OutputKind::Audio);
        assert_eq!(audio.len(), 6);
        let analyzers = registry.of_kind(OutputKind::AudioValue);
        assert_eq!(analyzers.len(), 3);
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let mut registry = OperatorRegistry::new();
        let before = registry.len();
        registry.register(
            OperatorDescriptor {
                id: "noise",
                name: "Imposter",
                kind: OutputKind::Value,
                description: "duplicate",
            },
            || Box::new(Lfo::new()),
        );
        assert_eq!(registry.len(), before);
        assert_eq!(registry.get("noise").unwrap().name, "Noise");
    }

    #[test]
    fn param_index_lookup() {
        let registry = OperatorRegistry::new();
        assert_eq!(registry.param_index_by_name("oscillator", "frequency"), Some(0));
        assert_eq!(registry.param_index_by_name("oscillator", "volume"), Some(1));
        assert_eq!(registry.param_index_by_name("oscillator", "nope"), None);
    }
}
