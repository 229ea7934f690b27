/// A state machine driven one input at a time.
///
/// Transitions consume the current state and return the next one. Anything
/// the transition hands back to the caller, rather than keeping, goes
/// through `context`.
pub trait FiniteStateMachine {
    type Input;
    type Context;

    #[must_use]
    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self;
}
