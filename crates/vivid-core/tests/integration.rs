//! End-to-end chain behavior: scheduling, caching, wiring errors, state.

use std::collections::HashMap;

use vivid_core::param::{ParamKind, ParamSet};
use vivid_core::state::downcast_state;
use vivid_core::{
    accepts, Chain, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind,
};
use vivid_gpu::HeadlessBackend;

fn ctx() -> Context {
    Context::new(Box::new(HeadlessBackend::new()), 640, 360)
}

/// Value generator: outputs its `level` parameter. Cooks only when dirty.
struct Source {
    params: ParamSet,
    out: f32,
    processed: u32,
}

impl Source {
    const P_LEVEL: usize = 0;

    fn new(level: f32) -> Self {
        let mut params = ParamSet::new();
        params.register("level", ParamKind::Float, 0.0, 100.0, [0.0; 4]);
        params.set_float(Self::P_LEVEL, level);
        params.take_dirty();
        Self {
            params,
            out: 0.0,
            processed: 0,
        }
    }
}

impl Operator for Source {
    fn type_name(&self) -> &'static str {
        "Source"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::Value
    }
    fn param_set(&self) -> Option<&ParamSet> {
        Some(&self.params)
    }
    fn param_set_mut(&mut self) -> Option<&mut ParamSet> {
        Some(&mut self.params)
    }
    fn process(&mut self, _ctx: &mut Context, _inputs: &Inputs) {
        self.out = self.params.float(Self::P_LEVEL);
        self.processed += 1;
    }
    fn needs_cook(&self, _ctx: &Context) -> bool {
        false
    }
    fn value_output(&self) -> Option<f32> {
        Some(self.out)
    }
    fn save_state(&self) -> Option<Box<dyn OperatorState>> {
        Some(Box::new(self.params.save_values()))
    }
    fn load_state(&mut self, state: Box<dyn OperatorState>) {
        if let Some(values) = downcast_state(state) {
            self.params.apply_values(&values);
        }
    }
}

/// Value pass-through: doubles its single input. Cooks only on change.
struct Double {
    inputs: InputSlots,
    out: f32,
    processed: u32,
}

impl Double {
    fn new() -> Self {
        Self {
            inputs: InputSlots::new().slot("source", accepts::VALUE),
            out: 0.0,
            processed: 0,
        }
    }
}

impl Operator for Double {
    fn type_name(&self) -> &'static str {
        "Double"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::Value
    }
    fn inputs(&self) -> Option<&InputSlots> {
        Some(&self.inputs)
    }
    fn inputs_mut(&mut self) -> Option<&mut InputSlots> {
        Some(&mut self.inputs)
    }
    fn process(&mut self, _ctx: &mut Context, inputs: &Inputs) {
        self.out = inputs.value(0).unwrap_or(0.0) * 2.0;
        self.processed += 1;
    }
    fn needs_cook(&self, _ctx: &Context) -> bool {
        false
    }
    fn value_output(&self) -> Option<f32> {
        Some(self.out)
    }
}

#[test]
fn linear_chain_executes_in_dependency_order() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    // Insert consumer first to prove ordering follows edges, not insertion.
    chain.add("double", Double::new()).unwrap();
    chain.add("source", Source::new(21.0)).unwrap();
    chain.connect("double", 0, "source").unwrap();
    chain.set_output("double");

    chain.process(&mut ctx);

    assert_eq!(chain.execution_order(), vec!["source", "double"]);
    assert_eq!(chain.value_of("double"), Some(42.0));
    assert!(!chain.has_error());
}

#[test]
fn cook_revisions_cache_unchanged_operators() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("source", Source::new(4.0)).unwrap();
    chain.add("double", Double::new()).unwrap();
    chain.connect("double", 0, "source").unwrap();
    chain.set_output("double");

    chain.process(&mut ctx);
    assert_eq!(chain.revision_of("source"), Some(1));
    assert_eq!(chain.revision_of("double"), Some(1));

    // Nothing changed: both skip, revisions hold, outputs identical.
    chain.process(&mut ctx);
    assert_eq!(chain.revision_of("source"), Some(1));
    assert_eq!(chain.revision_of("double"), Some(1));
    assert_eq!(chain.get::<Source>("source").processed, 1);
    assert_eq!(chain.get::<Double>("double").processed, 1);

    // A parameter write dirties the producer; the consumer re-cooks because
    // its observed input revision moved.
    chain
        .get_dyn_mut("source")
        .unwrap()
        .set_param("level", [5.0, 0.0, 0.0, 0.0]);
    chain.process(&mut ctx);
    assert_eq!(chain.revision_of("source"), Some(2));
    assert_eq!(chain.revision_of("double"), Some(2));
    assert_eq!(chain.value_of("double"), Some(10.0));
}

#[test]
fn cycle_is_rejected_and_order_survives() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("a", Double::new()).unwrap();
    chain.add("b", Double::new()).unwrap();
    chain.process(&mut ctx);
    assert_eq!(chain.execution_order(), vec!["a", "b"]);

    chain.connect("a", 0, "b").unwrap();
    assert!(chain.connect("b", 0, "a").is_err());
    assert!(chain.error().contains("CycleDetected"));

    chain.process(&mut ctx);
    assert!(!chain.is_failed());
    assert_eq!(chain.execution_order(), vec!["b", "a"]);
}

#[test]
fn self_connection_is_a_cycle() {
    let mut chain = Chain::new();
    chain.add("a", Double::new()).unwrap();
    assert!(chain.connect("a", 0, "a").is_err());
    assert!(chain.error().contains("CycleDetected"));
}

#[test]
fn duplicate_name_is_rejected_chain_stays_usable() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("source", Source::new(1.0)).unwrap();
    assert!(chain.add("source", Source::new(2.0)).is_err());
    assert!(chain.error().contains("DuplicateName"));

    chain.set_output("source");
    chain.process(&mut ctx);
    assert_eq!(chain.value_of("source"), Some(1.0));
}

#[test]
fn unknown_output_selector_runs_no_nodes() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("source", Source::new(1.0)).unwrap();
    chain.set_output("missing");

    chain.process(&mut ctx);
    assert!(chain.error().contains("UnknownOperator"));
    assert!(chain.execution_order().is_empty());
    assert_eq!(chain.get::<Source>("source").processed, 0);
}

#[test]
fn unreachable_operators_are_skipped() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("orphan", Source::new(9.0)).unwrap();
    chain.add("double", Double::new()).unwrap();
    // double's input is unset; it still runs (with the slot absent) because
    // it is the selected output.
    chain.set_output("double");

    chain.process(&mut ctx);
    assert_eq!(chain.execution_order(), vec!["double"]);
    assert_eq!(chain.value_of("double"), Some(0.0));
    assert_eq!(chain.get::<Source>("orphan").processed, 0);
}

#[test]
fn unknown_input_runs_as_absent() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("double", Double::new()).unwrap();
    chain.connect("double", 0, "ghost").unwrap();
    chain.set_output("double");

    chain.process(&mut ctx);
    assert!(chain.error().contains("UnknownInput"));
    assert_eq!(chain.value_of("double"), Some(0.0));
}

/// Texture-kind stub for kind-mismatch wiring.
struct TexStub;

impl Operator for TexStub {
    fn type_name(&self) -> &'static str {
        "TexStub"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::Texture
    }
    fn process(&mut self, _ctx: &mut Context, _inputs: &Inputs) {}
}

#[test]
fn kind_mismatch_is_warned_and_slot_runs_absent() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("tex", TexStub).unwrap();
    chain.add("double", Double::new()).unwrap();
    chain.connect("double", 0, "tex").unwrap();
    chain.set_output("double");

    chain.process(&mut ctx);
    assert!(chain.error().contains("KindMismatch"));
    assert_eq!(chain.value_of("double"), Some(0.0));
}

#[test]
fn invalid_slot_is_rejected() {
    let mut chain = Chain::new();
    chain.add("source", Source::new(1.0)).unwrap();
    chain.add("double", Double::new()).unwrap();
    assert!(chain.connect("double", 3, "source").is_err());
    assert!(chain.connect("source", 0, "double").is_err());
    assert!(chain.error().contains("InvalidSlot"));
}

#[test]
fn snapshot_restore_preserves_parameters_by_name() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("osc", Source::new(880.0)).unwrap();
    chain.set_output("osc");
    chain.process(&mut ctx);

    let snapshot = chain.snapshot_all();
    assert!(snapshot.contains_key("osc"));

    // Rebuild with defaults, as a hot-reload would.
    let mut rebuilt = Chain::new();
    rebuilt.add("osc", Source::new(440.0)).unwrap();
    rebuilt.add("new_op", Source::new(1.0)).unwrap();
    rebuilt.restore_all(snapshot);

    assert_eq!(
        rebuilt.get_dyn("osc").unwrap().get_param("level"),
        Some([880.0, 0.0, 0.0, 0.0])
    );
    // Operators without a matching saved state keep defaults.
    assert_eq!(
        rebuilt.get_dyn("new_op").unwrap().get_param("level"),
        Some([1.0, 0.0, 0.0, 0.0])
    );
}

#[test]
fn restore_discards_states_for_missing_operators() {
    let mut chain = Chain::new();
    chain.add("keep", Source::new(3.0)).unwrap();

    let mut states: HashMap<String, Box<dyn OperatorState>> = HashMap::new();
    states.insert(
        "keep".into(),
        Box::new(chain.get::<Source>("keep").params.save_values()),
    );
    states.insert(
        "gone".into(),
        Box::new(String::from("stale")) as Box<dyn OperatorState>,
    );

    // Drift the live value, then restore: the saved value wins and the
    // state for the vanished operator is dropped without complaint.
    chain
        .get_dyn_mut("keep")
        .unwrap()
        .set_param("level", [7.0, 0.0, 0.0, 0.0]);
    chain.restore_all(states);
    assert_eq!(
        chain.get_dyn("keep").unwrap().get_param("level"),
        Some([3.0, 0.0, 0.0, 0.0])
    );
}

#[test]
fn set_param_roundtrip_clamps_to_range() {
    let mut chain = Chain::new();
    chain.add("source", Source::new(0.0)).unwrap();
    let op = chain.get_dyn_mut("source").unwrap();
    assert!(op.set_param("level", [250.0, 0.0, 0.0, 0.0]));
    assert_eq!(op.get_param("level"), Some([100.0, 0.0, 0.0, 0.0]));
    assert!(!op.set_param("missing", [1.0; 4]));
}

#[test]
fn audio_subgraph_selects_audio_ancestors() {
    struct AudioStub;
    impl Operator for AudioStub {
        fn type_name(&self) -> &'static str {
            "AudioStub"
        }
        fn output_kind(&self) -> OutputKind {
            OutputKind::Audio
        }
        fn process(&mut self, _ctx: &mut Context, _inputs: &Inputs) {}
    }

    let mut chain = Chain::new();
    chain.add("visual", TexStub).unwrap();
    chain.add("synth", AudioStub).unwrap();
    chain.add("master", AudioStub).unwrap();
    chain.set_output("visual");
    chain.set_audio_output("master");

    // master has no inputs, so only master is an ancestor of the selector.
    assert_eq!(chain.audio_subgraph(), vec!["master".to_string()]);
}
