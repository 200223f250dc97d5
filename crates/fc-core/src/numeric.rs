use crate::CoreError;

pub fn ensure_finite(v: f64, what: &'static str) -> Result<f64, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Round a flow temperature to the integer the actuator accepts.
///
/// Halves round away from zero. Values outside the `i32` range saturate.
pub fn round_flow(v: f64) -> i32 {
    v.round() as i32
}
