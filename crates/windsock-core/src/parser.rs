//! Frame payload decoding.
//!
//! A frame payload (the PDU between the markers) is either a structured JSON
//! measurement batch or the legacy delimited text `<windSpeed> <temperature>
//! [<nodeId>]`. Malformed payloads are reported as [`ParseError`] and dropped
//! by the caller; nothing here touches connection state.

use tracing::debug;

use windsock_types::{MeasurementBatch, ParseError, ParseResult, WeatherSample};

use crate::frame::{END_MARKER, START_LEGACY, START_MODERN};

/// Node whose measurement is selected from a structured batch.
const PRIMARY_NODE: u32 = 0;

/// Decodes one complete frame into a [`WeatherSample`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageParser;

impl MessageParser {
    /// Create a parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode one marker-delimited frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the frame carries no recognized start
    /// marker, strips down to an empty payload, or fails both the structured
    /// and the legacy decode.
    pub fn parse(&self, frame: &str) -> ParseResult<WeatherSample> {
        let pdu = strip_markers(frame)?;

        if pdu.starts_with('{') {
            // Structured decode; fall through to legacy on any miss, the way
            // older firmware mixes formats on the same link.
            match serde_json::from_str::<MeasurementBatch>(pdu) {
                Ok(batch) => {
                    if let Some(measurement) = batch.node(PRIMARY_NODE) {
                        return Ok(measurement.into_sample());
                    }
                    debug!(version = batch.version, "batch has no primary-node entry");
                }
                Err(err) => debug!(error = %err, "structured decode failed, trying legacy"),
            }
        }

        parse_legacy(pdu)
    }
}

/// Strip the recognized start prefix and `_end` suffix, then trim.
fn strip_markers(frame: &str) -> ParseResult<&str> {
    let body = frame
        .strip_prefix(START_MODERN)
        .or_else(|| frame.strip_prefix(START_LEGACY))
        .ok_or_else(|| ParseError::UnrecognizedFrame(truncate_for_log(frame)))?;

    let pdu = body.strip_suffix(END_MARKER).unwrap_or(body).trim();
    if pdu.is_empty() {
        return Err(ParseError::EmptyPayload);
    }
    Ok(pdu)
}

/// Decode the legacy delimited form: wind speed, temperature, optional node id.
fn parse_legacy(pdu: &str) -> ParseResult<WeatherSample> {
    let tokens: Vec<&str> = pdu
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() < 2 {
        return Err(ParseError::TooFewTokens {
            found: tokens.len(),
        });
    }

    let wind_speed = parse_float(tokens[0])?;
    let temperature = parse_float(tokens[1])?;

    // A third token is a node id; anything unparsable falls back to the
    // primary node rather than rejecting the sample.
    let node_id = tokens
        .get(2)
        .and_then(|t| t.parse::<u32>().ok())
        .unwrap_or(PRIMARY_NODE);

    Ok(WeatherSample::with_node(wind_speed, temperature, node_id))
}

fn parse_float(token: &str) -> ParseResult<f64> {
    token.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        token: token.to_string(),
    })
}

fn truncate_for_log(frame: &str) -> String {
    const MAX: usize = 64;
    if frame.len() <= MAX {
        frame.to_string()
    } else {
        let cut = frame
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        format!("{}…", &frame[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(frame: &str) -> ParseResult<WeatherSample> {
        MessageParser::new().parse(frame)
    }

    #[test]
    fn legacy_space_separated() {
        let sample = parse("WS_5.5 22.2_end").unwrap();
        assert_eq!(sample.wind_speed, 5.5);
        assert_eq!(sample.temperature, 22.2);
        assert_eq!(sample.node_id, 0);
    }

    #[test]
    fn legacy_comma_separated_with_old_marker() {
        let sample = parse("start_5.5,22.2_end").unwrap();
        assert_eq!(sample.wind_speed, 5.5);
        assert_eq!(sample.temperature, 22.2);
        assert_eq!(sample.node_id, 0);
    }

    #[test]
    fn legacy_with_node_id() {
        let sample = parse("start_5.5 22.2 1_end").unwrap();
        assert_eq!(sample.node_id, 1);
    }

    #[test]
    fn legacy_semicolons_and_runs_of_separators() {
        let sample = parse("WS_3.0;;  19.5 ;2_end").unwrap();
        assert_eq!(sample.wind_speed, 3.0);
        assert_eq!(sample.temperature, 19.5);
        assert_eq!(sample.node_id, 2);
    }

    #[test]
    fn legacy_unparsable_node_id_defaults_to_zero() {
        let sample = parse("WS_3.0 19.5 xyz_end").unwrap();
        assert_eq!(sample.node_id, 0);
    }

    #[test]
    fn structured_batch_selects_primary_node() {
        let frame = r#"WS_{"version":1,"numberOfNodes":2,"measurements":[
            {"windSpeed":2.5,"temperature":21.0,"nodeId":1},
            {"windSpeed":3.1,"temperature":20.4,"nodeId":0}
        ]}_end"#;
        let sample = parse(frame).unwrap();
        assert_eq!(sample.wind_speed, 3.1);
        assert_eq!(sample.temperature, 20.4);
        assert_eq!(sample.node_id, 0);
    }

    #[test]
    fn structured_without_primary_node_falls_back_and_fails() {
        let frame = r#"WS_{"version":1,"numberOfNodes":1,"measurements":[
            {"windSpeed":2.5,"temperature":21.0,"nodeId":3}
        ]}_end"#;
        assert!(parse(frame).is_err());
    }

    #[test]
    fn malformed_json_falls_back_to_legacy_and_fails() {
        // Looks like JSON but is neither a batch nor a legacy pair.
        assert!(matches!(
            parse("WS_{\"temp\":25}_end"),
            Err(ParseError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn empty_inputs_fail() {
        assert!(matches!(parse(""), Err(ParseError::UnrecognizedFrame(_))));
        assert!(matches!(parse("   "), Err(ParseError::UnrecognizedFrame(_))));
        assert!(matches!(parse("WS__end"), Err(ParseError::EmptyPayload)));
        assert!(matches!(parse("WS_   _end"), Err(ParseError::EmptyPayload)));
    }

    #[test]
    fn single_token_fails() {
        assert!(matches!(
            parse("WS_5.5_end"),
            Err(ParseError::TooFewTokens { found: 1 })
        ));
    }

    #[test]
    fn non_numeric_tokens_fail() {
        assert!(matches!(
            parse("WS_fast warm_end"),
            Err(ParseError::InvalidNumber { .. })
        ));
    }
}
