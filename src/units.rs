//! Unit-of-measure magnitude conversion.
//!
//! A compact built-in table covering the families the transform engine's
//! `unitMapping` stage needs: length, mass, duration, speed, pressure, and
//! temperature. Conversion only succeeds between units of the same family;
//! temperature is offset-corrected rather than a pure scale.

/// Scale factor to the family's base unit, or `None` for unknown units.
fn scale(unit: &str) -> Option<(Family, f64)> {
    use Family::*;
    Some(match unit {
        "mm" => (Length, 0.001),
        "cm" => (Length, 0.01),
        "m" => (Length, 1.0),
        "km" => (Length, 1000.0),
        "in" => (Length, 0.0254),
        "ft" => (Length, 0.3048),
        "yd" => (Length, 0.9144),
        "mi" => (Length, 1609.344),

        "mg" => (Mass, 1e-6),
        "g" => (Mass, 1e-3),
        "kg" => (Mass, 1.0),
        "t" | "tonne" => (Mass, 1000.0),
        "oz" => (Mass, 0.028_349_523_125),
        "lb" => (Mass, 0.453_592_37),

        "ms" => (Duration, 0.001),
        "s" | "sec" => (Duration, 1.0),
        "min" => (Duration, 60.0),
        "h" | "hour" => (Duration, 3600.0),
        "d" | "day" => (Duration, 86_400.0),

        "m/s" => (Speed, 1.0),
        "km/h" => (Speed, 1.0 / 3.6),
        "mph" => (Speed, 0.447_04),
        "kn" | "knot" => (Speed, 0.514_444_444_444_444_4),

        "Pa" => (Pressure, 1.0),
        "hPa" | "mbar" => (Pressure, 100.0),
        "kPa" => (Pressure, 1000.0),
        "bar" => (Pressure, 1e5),
        "atm" => (Pressure, 101_325.0),
        "psi" => (Pressure, 6_894.757_293_168),

        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Length,
    Mass,
    Duration,
    Speed,
    Pressure,
}

fn to_kelvin(value: f64, unit: &str) -> Option<f64> {
    Some(match unit {
        "K" | "kelvin" => value,
        "degC" | "celsius" => value + 273.15,
        "degF" | "fahrenheit" => (value - 32.0) * 5.0 / 9.0 + 273.15,
        _ => return None,
    })
}

fn from_kelvin(value: f64, unit: &str) -> Option<f64> {
    Some(match unit {
        "K" | "kelvin" => value,
        "degC" | "celsius" => value - 273.15,
        "degF" | "fahrenheit" => (value - 273.15) * 9.0 / 5.0 + 32.0,
        _ => return None,
    })
}

/// Convert `value` from unit `from` to unit `to`.
///
/// Returns `None` when either unit is unknown or the units belong to
/// different families.
pub fn convert(value: f64, from: &str, to: &str) -> Option<f64> {
    if let Some(k) = to_kelvin(value, from) {
        return from_kelvin(k, to);
    }
    let (from_family, from_scale) = scale(from)?;
    let (to_family, to_scale) = scale(to)?;
    if from_family != to_family {
        return None;
    }
    Some(value * from_scale / to_scale)
}
