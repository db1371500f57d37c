// ABOUTME: Control — the explicit break/return signal type, kept separate from RillError

use crate::value::RillValue;

/// Spec section 9: "Exceptions for control flow -> explicit signal types.
/// break/return must be distinct sum-type variants... never conflated with
/// runtime errors." `Control` is the success side of evaluating a
/// statement; `RillError` (the `Err` side of the same `Result`) remains
/// reserved for actual failures.
#[derive(Debug, Clone)]
pub enum Control {
    Value(RillValue),
    Break(RillValue),
    Return(RillValue),
}

impl Control {
    pub fn value(self) -> RillValue {
        match self {
            Control::Value(v) | Control::Break(v) | Control::Return(v) => v,
        }
    }

    pub fn is_signal(&self) -> bool {
        !matches!(self, Control::Value(_))
    }
}

pub type EvalResult = Result<Control, crate::error::RillError>;
