/// One unit of deferred work handed to a [`TurnDriver`]
pub type TurnStep = Box<dyn FnOnce()>;

/// Port for the environment's scheduling primitive
///
/// Implementations must run every scheduled step in its own turn, strictly
/// after the turn that scheduled it, in scheduling order. A step must never
/// share a turn with another step, even where the underlying primitive
/// would batch them.
pub trait TurnDriver {
    fn schedule(&self, step: TurnStep);

    /// Driver name for debugging
    fn name(&self) -> &str {
        "TurnDriver"
    }
}
