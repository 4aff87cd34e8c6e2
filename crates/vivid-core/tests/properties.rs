//! Property tests: topological ordering over random DAGs, clamp invariants.

use proptest::prelude::*;

use vivid_core::param::{ParamKind, ParamSet};
use vivid_core::{accepts, Chain, Context, Inputs, InputSlots, Operator, OutputKind};
use vivid_gpu::HeadlessBackend;

/// Value node with a configurable number of any-kind input slots.
struct Node {
    inputs: InputSlots,
}

impl Node {
    fn new(slot_count: usize) -> Self {
        let mut inputs = InputSlots::new();
        for _ in 0..slot_count {
            inputs = inputs.slot("in", accepts::ANY);
        }
        Self { inputs }
    }
}

impl Operator for Node {
    fn type_name(&self) -> &'static str {
        "Node"
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
    fn process(&mut self, _ctx: &mut Context, _inputs: &Inputs) {}
    fn value_output(&self) -> Option<f32> {
        Some(0.0)
    }
}

fn node_name(i: usize) -> String {
    format!("n{i}")
}

proptest! {
    /// For any random DAG (edges only from lower to higher node index, so
    /// acyclic by construction), the execution order places every producer
    /// before each of its consumers.
    #[test]
    fn execution_order_is_topological(
        n in 2usize..12,
        edge_seeds in proptest::collection::vec((0usize..12, 0usize..12), 0..24),
    ) {
        let mut ctx = Context::new(Box::new(HeadlessBackend::new()), 64, 64);
        let mut chain = Chain::new();

        // Every node gets enough slots for its potential in-edges.
        for i in 0..n {
            chain.add(&node_name(i), Node::new(8)).unwrap();
        }

        let mut edges = Vec::new();
        let mut slot_counter = vec![0usize; n];
        for (a, b) in edge_seeds {
            let (a, b) = (a % n, b % n);
            let (lo, hi) = (a.min(b), a.max(b));
            if lo == hi || slot_counter[hi] >= 8 {
                continue;
            }
            // Edge lo -> hi: hi consumes lo.
            chain.connect(&node_name(hi), slot_counter[hi], &node_name(lo)).unwrap();
            slot_counter[hi] += 1;
            edges.push((lo, hi));
        }

        chain.process(&mut ctx);
        prop_assert!(!chain.is_failed());

        let order = chain.execution_order();
        // Every node is reachable (no selectors set), so all appear.
        prop_assert_eq!(order.len(), n);

        let position = |name: &str| order.iter().position(|&o| o == name).unwrap();
        for (lo, hi) in edges {
            prop_assert!(
                position(&node_name(lo)) < position(&node_name(hi)),
                "producer n{} must run before consumer n{}", lo, hi
            );
        }
    }

    /// set followed by get returns the value clamped into [min, max] on
    /// every meaningful component.
    #[test]
    fn set_param_clamps_within_declared_range(
        min in -100.0f32..0.0,
        span in 0.1f32..200.0,
        value in proptest::array::uniform4(-1000.0f32..1000.0),
    ) {
        let max = min + span;
        let mut params = ParamSet::new();
        params.register("p", ParamKind::Color, min, max, [0.0; 4]);
        params.set("p", value);
        let got = params.get("p").unwrap();
        for c in got {
            prop_assert!(c >= min && c <= max);
        }
    }

    /// Insertion order breaks ties: with no edges at all, execution order
    /// equals insertion order.
    #[test]
    fn tie_break_is_insertion_order(n in 1usize..10) {
        let mut ctx = Context::new(Box::new(HeadlessBackend::new()), 64, 64);
        let mut chain = Chain::new();
        for i in 0..n {
            chain.add(&node_name(i), Node::new(0)).unwrap();
        }
        chain.process(&mut ctx);
        let expected: Vec<String> = (0..n).map(node_name).collect();
        prop_assert_eq!(chain.execution_order(), expected);
    }
}
