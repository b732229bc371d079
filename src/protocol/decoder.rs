//! # Line Decoder
//!
//! Classifies and decodes lines received from the acquisition board.
//!
//! The board's text protocol has drifted across firmware revisions, so the
//! decoder never fails: a malformed field is dropped with a warning and the
//! rest of the line is still used, and a range announcement that does not
//! parse is passed on as plain status text.
//!
//! Recognised shapes:
//!
//! - `Pot1:12.34,Pot2:0.50` or `P1:512|P2:300` (measurements)
//! - `T1: Min=102 Max=918 Range=25.00mm` (range announcement)
//! - `Transductor 1: Min=102, Max=918, Rango=25.00mm` (calibration summary)
//! - `✓ Range T3 updated to 40.0mm` / `✓ Rango T3 actualizado a 40.00mm`

use tracing::warn;

use super::message::*;

/// Decode one line of text
///
/// # Arguments
///
/// * `line` - One line as read from the board (surrounding whitespace is ignored)
///
/// # Returns
///
/// * `Line` - Measurement batch, range acknowledgement or status text
///
/// # Examples
///
/// ```
/// use transducer_monitor::protocol::decoder::parse_line;
/// use transducer_monitor::protocol::message::Line;
///
/// match parse_line("Pot1:12.50,Pot2:3.00") {
///     Line::Measurement(batch) => assert_eq!(batch.len(), 2),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn parse_line(line: &str) -> Line {
    let line = line.trim();

    if is_measurement(line) {
        return Line::Measurement(parse_measurement(line));
    }

    if is_range_line(line) {
        match parse_range_ack(line) {
            Some(ack) => return Line::RangeAck(ack),
            None => warn!("Could not parse range line: '{}'", line),
        }
    }

    Line::Status(line.to_string())
}

/// Whether a line carries channel readings
///
/// Data lines start with a channel label, i.e. `P` or `Pot` immediately
/// followed by a digit. Firmware prompts such as `PASO 1: ...` or
/// `Presiona ENTER...` do not qualify.
pub fn is_measurement(line: &str) -> bool {
    let rest = line
        .strip_prefix(LABEL_PREFIX_LONG)
        .or_else(|| line.strip_prefix(LABEL_PREFIX_SHORT));

    matches!(rest.and_then(|r| r.chars().next()), Some(c) if c.is_ascii_digit())
}

/// Normalise a channel label (`P1`, `Pot1`) to its index
///
/// # Returns
///
/// * `Option<u8>` - Channel index, or `None` if the label is not recognised
pub fn parse_channel_label(label: &str) -> Option<u8> {
    let digits = label
        .strip_prefix(LABEL_PREFIX_LONG)
        .or_else(|| label.strip_prefix(LABEL_PREFIX_SHORT))?;

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    match digits.parse::<u8>() {
        Ok(0) | Err(_) => None,
        Ok(index) => Some(index),
    }
}

/// Decode every field of a measurement line independently
fn parse_measurement(line: &str) -> MeasurementBatch {
    let mut batch = MeasurementBatch::default();

    for field in line.split(FIELD_DELIMITERS) {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }

        match parse_field(field) {
            Some(reading) => batch.readings.push(reading),
            None => {
                warn!("Skipping malformed data field: '{}'", field);
                batch.skipped += 1;
            }
        }
    }

    batch
}

fn parse_field(field: &str) -> Option<Reading> {
    let mut parts = field.split(VALUE_SEPARATOR);
    let label = parts.next()?.trim();
    let value = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }

    let channel = parse_channel_label(label)?;
    let value: f64 = value.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(Reading { channel, value })
}

fn is_range_line(line: &str) -> bool {
    RANGE_KEYWORDS.iter().any(|keyword| {
        line.contains(&format!("{}=", keyword)) || line.contains(&format!("{} T", keyword))
    })
}

fn parse_range_ack(line: &str) -> Option<RangeAck> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let keyword_pos = tokens
        .iter()
        .position(|t| RANGE_KEYWORDS.contains(t));

    // Form B: "✓ Range T<idx> updated to <value>mm"
    if let Some(pos) = keyword_pos {
        let channel = parse_t_index(tokens.get(pos + 1)?)?;
        let range = parse_range_value(tokens.last()?)?;
        return Some(RangeAck { channel, range });
    }

    // Form A: "T<idx>: ... Range=<value>mm" or "Transductor <idx>: ... Rango=<value>mm"
    let channel = match tokens.first()? {
        t if t.starts_with("Transductor") => parse_index(tokens.get(1)?.trim_end_matches(':'))?,
        t => parse_t_index(t.trim_end_matches(':'))?,
    };

    let value = tokens.iter().find_map(|t| {
        let (key, value) = t.split_once('=')?;
        RANGE_KEYWORDS.contains(&key).then_some(value)
    })?;

    let range = parse_range_value(value)?;
    Some(RangeAck { channel, range })
}

fn parse_t_index(token: &str) -> Option<u8> {
    parse_index(token.strip_prefix('T')?)
}

fn parse_index(digits: &str) -> Option<u8> {
    match digits.parse::<u8>() {
        Ok(0) | Err(_) => None,
        Ok(index) => Some(index),
    }
}

fn parse_range_value(token: &str) -> Option<f64> {
    let value: f64 = token
        .trim_end_matches([',', '.'])
        .trim_end_matches(RANGE_UNIT)
        .parse()
        .ok()?;

    (value.is_finite() && value > 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(line: &str) -> MeasurementBatch {
        match parse_line(line) {
            Line::Measurement(batch) => batch,
            other => panic!("Expected measurement batch, got {:?}", other),
        }
    }

    fn ack(line: &str) -> RangeAck {
        match parse_line(line) {
            Line::RangeAck(ack) => ack,
            other => panic!("Expected range ack, got {:?}", other),
        }
    }

    #[test]
    fn test_comma_separated_measurement() {
        let batch = batch("Pot1:12.34,Pot2:0.50");
        assert_eq!(batch.readings, vec![
            Reading { channel: 1, value: 12.34 },
            Reading { channel: 2, value: 0.50 },
        ]);
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn test_pipe_separated_short_labels() {
        let batch = batch("P1:512|P2:300");
        assert_eq!(batch.readings, vec![
            Reading { channel: 1, value: 512.0 },
            Reading { channel: 2, value: 300.0 },
        ]);
    }

    #[test]
    fn test_mixed_delimiters_and_whitespace() {
        let batch = batch("  Pot1: 1.5 | P2 :2.5, Pot3:3.5 \r");
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.readings[1], Reading { channel: 2, value: 2.5 });
    }

    #[test]
    fn test_malformed_field_does_not_discard_batch() {
        let batch = batch("Pot1:1.0,Pot2:abc,Pot3:3.0,Pot4:1:2,Pot5");
        assert_eq!(batch.readings, vec![
            Reading { channel: 1, value: 1.0 },
            Reading { channel: 3, value: 3.0 },
        ]);
        assert_eq!(batch.skipped, 3, "non-numeric, double separator and missing value");
    }

    #[test]
    fn test_unknown_label_is_skipped() {
        let batch = batch("Pot1:1.0,Temp:22.0,Pot0:5.0");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.skipped, 2);
    }

    #[test]
    fn test_non_finite_values_are_skipped() {
        let batch = batch("Pot1:nan,Pot2:inf,Pot3:-2.5");
        assert_eq!(batch.readings, vec![Reading { channel: 3, value: -2.5 }]);
    }

    #[test]
    fn test_trailing_delimiter_is_ignored() {
        let batch = batch("Pot1:1.0,");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn test_prompts_starting_with_p_are_status() {
        for line in ["PASO 1: Coloca TRANSDUCTOR 1 en 0mm", "Presiona ENTER...", "Pot"] {
            assert_eq!(parse_line(line), Line::Status(line.to_string()));
        }
    }

    #[test]
    fn test_channel_label_normalisation() {
        assert_eq!(parse_channel_label("P1"), Some(1));
        assert_eq!(parse_channel_label("Pot1"), Some(1));
        assert_eq!(parse_channel_label("Pot12"), Some(12));
        assert_eq!(parse_channel_label("P0"), None);
        assert_eq!(parse_channel_label("Pot"), None);
        assert_eq!(parse_channel_label("Px1"), None);
        assert_eq!(parse_channel_label("Pot1a"), None);
        assert_eq!(parse_channel_label("T1"), None);
    }

    #[test]
    fn test_range_announcement_form_a() {
        assert_eq!(ack("T2: Min=102 Max=918 Range=30.50mm"), RangeAck { channel: 2, range: 30.5 });
        assert_eq!(ack("T1: Min=0 Max=1023 Rango=25.00mm"), RangeAck { channel: 1, range: 25.0 });
    }

    #[test]
    fn test_range_ack_form_b() {
        assert_eq!(ack("✓ Range T3 updated to 40.0mm"), RangeAck { channel: 3, range: 40.0 });
        assert_eq!(ack("✓ Rango T5 actualizado a 12.75mm"), RangeAck { channel: 5, range: 12.75 });
    }

    #[test]
    fn test_calibration_summary_form() {
        assert_eq!(
            ack("Transductor 4: Min=100, Max=900, Rango=60.00mm"),
            RangeAck { channel: 4, range: 60.0 }
        );
    }

    #[test]
    fn test_unparsable_range_line_falls_through_to_status() {
        for line in [
            "Error: Formato incorrecto Range=",
            "T: Range=25mm",
            "✓ Range Tx updated to 40.0mm",
            "✓ Range T3 updated to soon",
            "T1: Range=-4mm",
        ] {
            assert_eq!(parse_line(line), Line::Status(line.to_string()), "line: {}", line);
        }
    }

    #[test]
    fn test_generic_status_line() {
        let line = "Sistema iniciado - Enviando datos en mm...";
        assert_eq!(parse_line(line), Line::Status(line.to_string()));
    }

    #[test]
    fn test_status_is_trimmed() {
        assert_eq!(parse_line("  hello \r"), Line::Status("hello".to_string()));
    }
}
