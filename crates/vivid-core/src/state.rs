//! Opt-in operator state preservation across hot-reload.
//!
//! State capture is best-effort by design: hot-reload is a development
//! tool, not a persistence mechanism. An operator whose type or layout
//! changed between builds silently falls back to its defaults.

use std::any::Any;

/// Marker for values an operator can hand across a chain rebuild.
///
/// Blanket-implemented for every `Send + 'static` type, so operators define
/// a plain struct and return it boxed. `load_state` downcasts; a failed
/// downcast means the operator changed shape since the snapshot and the
/// state is discarded.
pub trait OperatorState: Any + Send {
    /// Upcast to [`Any`] for downcasting in `load_state`.
    fn as_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any + Send> OperatorState for T {
    fn as_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Downcasts a boxed state to a concrete type.
///
/// Returns `None` (and drops the state) on type mismatch.
pub fn downcast_state<T: Any>(state: Box<dyn OperatorState>) -> Option<T> {
    state.as_any().downcast::<T>().ok().map(|b| *b)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OscState {
        freq: f32,
    }

    #[test]
    fn downcast_matches() {
        let boxed: Box<dyn OperatorState> = Box::new(OscState { freq: 880.0 });
        let state = downcast_state::<OscState>(boxed).unwrap();
        assert_eq!(state.freq, 880.0);
    }

    #[test]
    fn downcast_mismatch_discards() {
        let boxed: Box<dyn OperatorState> = Box::new(OscState { freq: 880.0 });
        assert!(downcast_state::<u32>(boxed).is_none());
    }
}
