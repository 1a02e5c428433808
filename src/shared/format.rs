//! Zahlenformatierung für deutschsprachige Beschreibungstexte.

/// Formatiert eine Zahl mit fester Nachkommastellenzahl und Dezimalkomma.
///
/// Ohne Tausendertrennzeichen: `1234.5` → `"1234,50"`.
pub fn format_dezimal(wert: f64, nachkommastellen: usize) -> String {
    format!("{:.*}", nachkommastellen, wert).replace('.', ",")
}

/// Meterangabe mit zwei Nachkommastellen, z.B. `"2,50 m"`.
pub fn format_meter(wert: f64) -> String {
    format!("{} m", format_dezimal(wert, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_decimal_comma() {
        assert_eq!(format_dezimal(2.5, 2), "2,50");
        assert_eq!(format_dezimal(1234.567, 2), "1234,57");
        assert_eq!(format_dezimal(-0.125, 1), "-0,1");
    }

    #[test]
    fn meter_has_unit() {
        assert_eq!(format_meter(1.6), "1,60 m");
    }
}
