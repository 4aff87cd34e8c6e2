//! Named operator container with dependency-ordered execution.
//!
//! A [`Chain`] owns its operators, resolves their name-based inputs into
//! storage indices, computes a topological execution order (Kahn's
//! algorithm, insertion-order tie-breaking, restricted to nodes reachable
//! from the output selectors), and runs the per-frame cook pass.
//!
//! Mutations (`add`, `remove`, `connect`, selector changes) mark the chain
//! for re-sorting; the sort happens at most once per topology change, never
//! per frame. Non-fatal failures — dangling input names, kind mismatches,
//! missing selectors — accumulate on an error buffer the host displays and
//! clears; a cycle puts the chain into a failed state in which `process` is
//! a no-op until the topology is repaired.

use std::any::Any;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use vivid_gpu::TextureHandle;

use crate::audio::AudioBuffer;
use crate::context::Context;
use crate::error::ChainError;
use crate::operator::Operator;
use crate::state::OperatorState;

struct Slot {
    name: String,
    op: Option<Box<dyn Operator>>,
    /// Per input slot: resolved producer storage index.
    resolved: Vec<Option<usize>>,
    /// Per input slot: producer revision observed at last cook.
    last_seen: Vec<Option<u64>>,
    /// Monotonic cook revision; bumped every time `process` runs.
    revision: u64,
    initialized: bool,
}

/// One resolved upstream operator, as seen by a cooking consumer.
pub struct InputRef<'a> {
    op: &'a dyn Operator,
    revision: u64,
}

/// Read-only view of a cooking operator's resolved inputs.
///
/// Slots mirror the operator's declared [`InputSlots`](crate::InputSlots);
/// a `None` entry means the slot is unconnected, unresolved, or
/// kind-mismatched, and the operator substitutes black / silence / zero.
pub struct Inputs<'a> {
    entries: Vec<Option<InputRef<'a>>>,
}

impl<'a> Inputs<'a> {
    /// A view with no inputs (generators).
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The upstream operator at `slot`.
    pub fn operator(&self, slot: usize) -> Option<&'a dyn Operator> {
        self.entries.get(slot).and_then(|e| e.as_ref()).map(|e| e.op)
    }

    /// The upstream cook revision at `slot`.
    pub fn revision(&self, slot: usize) -> Option<u64> {
        self.entries
            .get(slot)
            .and_then(|e| e.as_ref())
            .map(|e| e.revision)
    }

    /// Texture output of the operator at `slot`, if it produces one.
    pub fn texture(&self, slot: usize) -> Option<TextureHandle> {
        self.operator(slot).and_then(|op| op.texture_output())
    }

    /// Scalar output of the operator at `slot`, if it produces one.
    pub fn value(&self, slot: usize) -> Option<f32> {
        self.operator(slot).and_then(|op| op.value_output())
    }

    /// Audio output of the operator at `slot`, if it produces one.
    pub fn audio(&self, slot: usize) -> Option<&'a AudioBuffer> {
        self.operator(slot).and_then(|op| op.audio_output())
    }
}

/// Named container of operators plus execution order and output selectors.
#[derive(Default)]
pub struct Chain {
    /// Storage slots; indices are stable, removed entries become tombstones.
    slots: Vec<Option<Slot>>,
    by_name: HashMap<String, usize>,
    /// Execution order over live, reachable storage indices.
    order: Vec<usize>,
    needs_sort: bool,
    failed: bool,
    output_name: Option<String>,
    audio_output_name: Option<String>,
    error: String,
}

impl Chain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Construction ---

    /// Adds an operator under `name` and returns a typed reference for
    /// builder-style configuration.
    ///
    /// Duplicate names are rejected: the error is recorded on the chain's
    /// error buffer, the chain stays usable without the new operator.
    pub fn add<T: Operator>(&mut self, name: &str, op: T) -> Result<&mut T, ChainError> {
        if self.by_name.contains_key(name) {
            let err = ChainError::DuplicateName(name.to_string());
            self.record_error(&err);
            return Err(err);
        }

        let input_count = op.inputs().map_or(0, |s| s.len());
        let idx = self.slots.len();
        self.slots.push(Some(Slot {
            name: name.to_string(),
            op: Some(Box::new(op)),
            resolved: vec![None; input_count],
            last_seen: vec![None; input_count],
            revision: 0,
            initialized: false,
        }));
        self.by_name.insert(name.to_string(), idx);
        self.needs_sort = true;

        let op = self.slots[idx]
            .as_mut()
            .and_then(|s| s.op.as_deref_mut())
            .unwrap();
        let any: &mut dyn Any = op;
        Ok(any.downcast_mut::<T>().unwrap())
    }

    /// Removes an operator, running its `cleanup`, and returns it.
    ///
    /// Dangling references to the removed name surface as `UnknownInput`
    /// warnings at the next sort.
    pub fn remove(&mut self, name: &str, ctx: &mut Context) -> Option<Box<dyn Operator>> {
        let idx = self.by_name.remove(name)?;
        let slot = self.slots[idx].take()?;
        let mut op = slot.op?;
        op.cleanup(ctx);
        self.needs_sort = true;
        Some(op)
    }

    /// Swaps the operator stored under `name`, returning the old one.
    ///
    /// The slot keeps its name and downstream references; the incoming
    /// operator is initialized lazily like a fresh add. Used by the audio
    /// graph to leave tap nodes in place of extracted operators.
    pub fn replace_operator(
        &mut self,
        name: &str,
        op: Box<dyn Operator>,
    ) -> Option<Box<dyn Operator>> {
        let idx = *self.by_name.get(name)?;
        let slot = self.slots[idx].as_mut()?;
        let old = slot.op.replace(op);
        slot.initialized = false;
        slot.resolved = vec![None; slot.op.as_deref().unwrap().inputs().map_or(0, |s| s.len())];
        slot.last_seen = vec![None; slot.resolved.len()];
        self.needs_sort = true;
        old
    }

    // --- Lookup ---

    /// Returns `true` if an operator named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Typed access to an operator.
    ///
    /// # Panics
    ///
    /// Panics if no operator has this name or the stored operator is not a
    /// `T`. Both are programming errors in the chain definition; use
    /// [`try_get`](Chain::try_get) when the shape is not known statically.
    pub fn get<T: Operator>(&mut self, name: &str) -> &mut T {
        match self.try_get::<T>(name) {
            Some(op) => op,
            None => panic!(
                "operator '{name}' not found or not a {}",
                std::any::type_name::<T>()
            ),
        }
    }

    /// Typed access to an operator; `None` on missing name or type
    /// mismatch (including operators currently extracted into the audio
    /// graph).
    pub fn try_get<T: Operator>(&mut self, name: &str) -> Option<&mut T> {
        let idx = *self.by_name.get(name)?;
        let op = self.slots[idx].as_mut()?.op.as_deref_mut()?;
        let any: &mut dyn Any = op;
        any.downcast_mut::<T>()
    }

    /// Untyped access to an operator.
    pub fn get_dyn(&self, name: &str) -> Option<&dyn Operator> {
        let idx = *self.by_name.get(name)?;
        self.slots[idx].as_ref()?.op.as_deref()
    }

    /// Untyped mutable access to an operator.
    pub fn get_dyn_mut(&mut self, name: &str) -> Option<&mut dyn Operator> {
        let idx = *self.by_name.get(name)?;
        self.slots[idx].as_mut()?.op.as_deref_mut()
    }

    /// Instance names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref().map(|s| s.name.as_str()))
            .collect()
    }

    /// Number of live operators.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Returns `true` if the chain holds no operators.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- Wiring ---

    /// Connects `consumer`'s input `slot` to the operator named `producer`.
    ///
    /// A connection that would close a cycle is rejected with
    /// [`ChainError::CycleDetected`], leaving the previous topology (and
    /// execution order) intact. A kind mismatch is recorded as a warning
    /// and the slot runs as absent. The producer may not exist yet;
    /// resolution is retried at the next sort.
    pub fn connect(
        &mut self,
        consumer: &str,
        slot: usize,
        producer: &str,
    ) -> Result<(), ChainError> {
        let Some(&consumer_idx) = self.by_name.get(consumer) else {
            let err = ChainError::UnknownOperator(consumer.to_string());
            self.record_error(&err);
            return Err(err);
        };

        // Cycle check before mutating: the new edge producer -> consumer
        // closes a cycle iff producer already depends on consumer.
        if let Some(&producer_idx) = self.by_name.get(producer)
            && (producer_idx == consumer_idx || self.depends_on(producer_idx, consumer_idx))
        {
            let err = ChainError::CycleDetected {
                consumer: consumer.to_string(),
                producer: producer.to_string(),
            };
            self.record_error(&err);
            return Err(err);
        }

        let op = self.slots[consumer_idx]
            .as_mut()
            .and_then(|s| s.op.as_deref_mut())
            .expect("live slot has an operator");
        let connected = op
            .inputs_mut()
            .is_some_and(|inputs| inputs.connect(slot, producer));
        if !connected {
            let err = ChainError::InvalidSlot {
                consumer: consumer.to_string(),
                slot,
            };
            self.record_error(&err);
            return Err(err);
        }

        self.needs_sort = true;
        Ok(())
    }

    /// Clears `consumer`'s input `slot`.
    pub fn disconnect(&mut self, consumer: &str, slot: usize) {
        if let Some(op) = self.get_dyn_mut(consumer)
            && let Some(inputs) = op.inputs_mut()
        {
            inputs.disconnect(slot);
        }
        self.needs_sort = true;
    }

    /// Walks input edges upward from `from`; `true` if `target` is an
    /// ancestor.
    fn depends_on(&self, from: usize, target: usize) -> bool {
        let mut stack = vec![from];
        let mut visited = vec![false; self.slots.len()];
        while let Some(idx) = stack.pop() {
            if idx == target {
                return true;
            }
            if std::mem::replace(&mut visited[idx], true) {
                continue;
            }
            let Some(op) = self.slots[idx].as_ref().and_then(|s| s.op.as_deref()) else {
                continue;
            };
            if let Some(inputs) = op.inputs() {
                for slot in 0..inputs.len() {
                    if let Some(name) = inputs.name(slot)
                        && let Some(&p) = self.by_name.get(name)
                    {
                        stack.push(p);
                    }
                }
            }
        }
        false
    }

    // --- Output selection ---

    /// Selects the texture-producing operator whose output the host
    /// presents.
    pub fn set_output(&mut self, name: impl Into<String>) {
        self.output_name = Some(name.into());
        self.needs_sort = true;
    }

    /// Selects the audio-producing operator whose buffer the audio
    /// callback publishes.
    pub fn set_audio_output(&mut self, name: impl Into<String>) {
        self.audio_output_name = Some(name.into());
        self.needs_sort = true;
    }

    /// The visual output selector.
    pub fn output_name(&self) -> Option<&str> {
        self.output_name.as_deref()
    }

    /// The audio output selector.
    pub fn audio_output_name(&self) -> Option<&str> {
        self.audio_output_name.as_deref()
    }

    /// The selected output operator's texture, after a processed frame.
    pub fn output_texture(&self) -> Option<TextureHandle> {
        self.get_dyn(self.output_name.clone()?.as_str())
            .and_then(|op| op.texture_output())
    }

    /// Scalar output of a named operator, for audio-reactive wiring.
    pub fn value_of(&self, name: &str) -> Option<f32> {
        self.get_dyn(name).and_then(|op| op.value_output())
    }

    // --- Error surface ---

    /// Accumulated non-fatal error text; empty when healthy.
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Returns `true` if errors have accumulated since the last clear.
    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Clears the error buffer (host, after display).
    pub fn clear_error(&mut self) {
        self.error.clear();
    }

    fn record_error(&mut self, err: &ChainError) {
        tracing::warn!(%err, "chain error");
        if !self.error.is_empty() {
            self.error.push('\n');
        }
        self.error.push_str(&err.to_string());
    }

    // --- Scheduling ---

    /// Resolves names, computes reachability from the output selectors,
    /// and rebuilds the execution order with Kahn's algorithm.
    fn sort(&mut self) {
        self.needs_sort = false;
        let n = self.slots.len();
        let mut errors = Vec::new();

        // Resolve every live slot's input names to storage indices.
        for idx in 0..n {
            let Some(slot) = self.slots[idx].as_ref() else {
                continue;
            };
            let Some(op) = slot.op.as_deref() else {
                continue;
            };
            let consumer = slot.name.clone();
            let count = op.inputs().map_or(0, |s| s.len());
            let mut resolved = vec![None; count];
            if let Some(inputs) = op.inputs() {
                for s in 0..count {
                    let Some(name) = inputs.name(s) else {
                        continue;
                    };
                    let Some(&p) = self.by_name.get(name) else {
                        errors.push(ChainError::UnknownInput {
                            consumer: consumer.clone(),
                            slot: s,
                            name: name.to_string(),
                        });
                        continue;
                    };
                    let kind = self.slots[p]
                        .as_ref()
                        .and_then(|ps| ps.op.as_deref())
                        .map(|pop| pop.output_kind());
                    match kind {
                        Some(kind) if inputs.accepts_kind(s, kind) => resolved[s] = Some(p),
                        Some(kind) => errors.push(ChainError::KindMismatch {
                            consumer: consumer.clone(),
                            slot: s,
                            producer: name.to_string(),
                            actual: kind,
                        }),
                        None => {}
                    }
                }
            }
            let slot = self.slots[idx].as_mut().unwrap();
            slot.resolved = resolved;
            slot.last_seen = vec![None; count];
        }

        for err in &errors {
            self.record_error(err);
        }

        // Reachability from the selectors. With no selector set at all the
        // whole chain is reachable, so pre-`set_output` construction code
        // still gets a meaningful order.
        let mut reachable = vec![false; n];
        if self.output_name.is_none() && self.audio_output_name.is_none() {
            for (idx, slot) in self.slots.iter().enumerate() {
                reachable[idx] = slot.is_some();
            }
        } else {
            for selector in [self.output_name.clone(), self.audio_output_name.clone()]
                .into_iter()
                .flatten()
            {
                let root = self.by_name.get(&selector).copied();
                match root {
                    Some(root) => self.mark_ancestors(root, &mut reachable),
                    None => {
                        let err = ChainError::UnknownOperator(selector);
                        self.record_error(&err);
                    }
                }
            }
        }

        // Kahn over the reachable subgraph, min-heap on insertion index for
        // a stable order.
        let mut in_degree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut reachable_count = 0usize;
        for idx in 0..n {
            if !reachable[idx] {
                continue;
            }
            reachable_count += 1;
            let slot = self.slots[idx].as_ref().unwrap();
            for p in slot.resolved.iter().flatten() {
                in_degree[idx] += 1;
                successors[*p].push(idx);
            }
        }

        let mut heap: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| reachable[i] && in_degree[i] == 0)
            .map(Reverse)
            .collect();
        let mut emitted = Vec::with_capacity(reachable_count);
        while let Some(Reverse(idx)) = heap.pop() {
            emitted.push(idx);
            for &succ in &successors[idx] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    heap.push(Reverse(succ));
                }
            }
        }

        if emitted.len() != reachable_count {
            // A cycle survived eager connect-time checks (name set before
            // the producer was added). Previous order stays valid.
            self.failed = true;
            let err = ChainError::CycleDetected {
                consumer: String::from("<chain>"),
                producer: String::from("<chain>"),
            };
            self.record_error(&err);
        } else {
            self.failed = false;
            self.order = emitted;
            tracing::debug!(order = ?self.execution_order(), "chain sorted");
        }
    }

    fn mark_ancestors(&self, root: usize, reachable: &mut [bool]) {
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if std::mem::replace(&mut reachable[idx], true) {
                continue;
            }
            if let Some(slot) = self.slots[idx].as_ref() {
                stack.extend(slot.resolved.iter().flatten().copied());
            }
        }
    }

    /// Current execution order as instance names (reachable nodes only).
    pub fn execution_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|&i| self.slots[i].as_ref().map(|s| s.name.as_str()))
            .collect()
    }

    /// Cook revision of a named operator. Zero until its first cook.
    pub fn revision_of(&self, name: &str) -> Option<u64> {
        let idx = *self.by_name.get(name)?;
        self.slots[idx].as_ref().map(|s| s.revision)
    }

    /// Whether the chain is in the failed (cyclic) state.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    // --- Per-frame processing ---

    /// Runs one frame: sorts if the topology changed, lazily initializes,
    /// then cooks every reachable operator whose inputs or parameters
    /// changed (or that asks to cook every frame). No-op while failed.
    pub fn process(&mut self, ctx: &mut Context) {
        if self.needs_sort {
            self.sort();
        }
        if self.failed {
            return;
        }

        let order = self.order.clone();

        for &idx in &order {
            let Some(slot) = self.slots[idx].as_mut() else {
                continue;
            };
            if slot.initialized {
                continue;
            }
            let Some(mut op) = slot.op.take() else {
                continue;
            };
            op.init(ctx);
            let slot = self.slots[idx].as_mut().unwrap();
            slot.op = Some(op);
            slot.initialized = true;
        }

        for &idx in &order {
            // Observe input revisions before borrowing the operator.
            let seen_now: Vec<Option<u64>> = {
                let Some(slot) = self.slots[idx].as_ref() else {
                    continue;
                };
                slot.resolved
                    .iter()
                    .map(|r| {
                        r.and_then(|p| self.slots[p].as_ref().map(|ps| ps.revision))
                    })
                    .collect()
            };

            let (first, inputs_changed) = {
                let slot = self.slots[idx].as_ref().unwrap();
                (slot.revision == 0, seen_now != slot.last_seen)
            };

            let Some(mut op) = self.slots[idx].as_mut().unwrap().op.take() else {
                continue;
            };

            let param_dirty = op.param_set_mut().is_some_and(|p| p.take_dirty());
            let cook = first || param_dirty || inputs_changed || op.needs_cook(ctx);

            if cook {
                let inputs = self.gather_inputs(idx);
                op.process(ctx, &inputs);
            }

            let slot = self.slots[idx].as_mut().unwrap();
            slot.op = Some(op);
            if cook {
                slot.revision += 1;
                slot.last_seen = seen_now;
            }
        }
    }

    /// Builds the input view for the slot at `idx`. The operator itself is
    /// taken out of its slot while this view is alive.
    fn gather_inputs(&self, idx: usize) -> Inputs<'_> {
        let Some(slot) = self.slots[idx].as_ref() else {
            return Inputs::empty();
        };
        let entries = slot
            .resolved
            .iter()
            .map(|r| {
                r.and_then(|p| {
                    let ps = self.slots[p].as_ref()?;
                    Some(InputRef {
                        op: ps.op.as_deref()?,
                        revision: ps.revision,
                    })
                })
            })
            .collect();
        Inputs { entries }
    }

    // --- Audio subgraph view ---

    /// Names of the operators the audio graph should own, in execution
    /// order: audio-eligible kinds that are ancestors of (or are) the audio
    /// output selector.
    pub fn audio_subgraph(&mut self) -> Vec<String> {
        if self.needs_sort {
            self.sort();
        }
        if self.failed {
            return Vec::new();
        }
        let Some(root_name) = self.audio_output_name.clone() else {
            return Vec::new();
        };
        let Some(&root) = self.by_name.get(&root_name) else {
            return Vec::new();
        };

        let mut wanted = vec![false; self.slots.len()];
        self.mark_ancestors(root, &mut wanted);

        self.order
            .iter()
            .filter(|&&i| wanted[i])
            .filter_map(|&i| {
                let slot = self.slots[i].as_ref()?;
                let op = slot.op.as_deref()?;
                op.output_kind()
                    .is_audio_eligible()
                    .then(|| slot.name.clone())
            })
            .collect()
    }

    // --- State preservation ---

    /// Captures `save_state` for every operator that implements it,
    /// keyed by instance name.
    pub fn snapshot_all(&self) -> HashMap<String, Box<dyn OperatorState>> {
        let mut states = HashMap::new();
        for slot in self.slots.iter().flatten() {
            if let Some(op) = slot.op.as_deref()
                && let Some(state) = op.save_state()
            {
                states.insert(slot.name.clone(), state);
            }
        }
        states
    }

    /// Restores captured states by instance name.
    ///
    /// Unmatched saved states are discarded; unmatched operators keep
    /// their defaults.
    pub fn restore_all(&mut self, states: HashMap<String, Box<dyn OperatorState>>) {
        for (name, state) in states {
            if let Some(op) = self.get_dyn_mut(&name) {
                op.load_state(state);
            } else {
                tracing::debug!(name = %name, "discarding state for missing operator");
            }
        }
    }

    /// Runs `cleanup` on every operator and empties the chain.
    pub fn destroy(&mut self, ctx: &mut Context) {
        for slot in self.slots.iter_mut().flatten() {
            if let Some(op) = slot.op.as_deref_mut() {
                op.cleanup(ctx);
            }
        }
        self.slots.clear();
        self.by_name.clear();
        self.order.clear();
        self.needs_sort = false;
        self.failed = false;
    }
}
