// Numeric helpers for position scoring

const EXPONENT_TOLERANCE: f64 = 1e-9;

/// Logarithm of `x` in an arbitrary base
pub fn log_base(x: f64, base: f64) -> f64 {
    x.ln() / base.ln()
}

/// Exponential decay `exp(-rate * age)`
pub fn exponential_decay(age: f64, rate: f64) -> f64 {
    (-rate * age).exp()
}

/// Real-valued power `base^exponent`.
///
/// Negative bases have a real result only for integer exponents, or for
/// exponents that are reciprocals of odd integers (odd roots, e.g. `1/3`),
/// where the real root `-(|base|^exponent)` is taken. Everything else
/// returns `None` instead of NaN.
pub fn real_pow(base: f64, exponent: f64) -> Option<f64> {
    if !base.is_finite() || !exponent.is_finite() {
        return None;
    }

    if base >= 0.0 {
        let value = base.powf(exponent);
        return value.is_finite().then_some(value);
    }

    if is_integer(exponent) {
        let value = base.powf(exponent.round());
        return value.is_finite().then_some(value);
    }

    let reciprocal = 1.0 / exponent;
    if is_integer(reciprocal) && (reciprocal.round() as i64) % 2 != 0 {
        let value = -(base.abs().powf(exponent));
        return value.is_finite().then_some(value);
    }

    None
}

fn is_integer(x: f64) -> bool {
    (x - x.round()).abs() < EXPONENT_TOLERANCE
}
