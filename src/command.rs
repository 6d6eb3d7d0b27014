//! Tolerant parser for inbound dispense commands.
//!
//! The backend publishes small JSON objects such as
//!
//! ```text
//! {"command":"dispense","medicine_id":7,"medicine_name":"Aspirin","quantity":5,
//!  "prescription_id":"RX-19","timestamp":"2024-05-01T10:00:00Z"}
//! ```
//!
//! Payloads come off the wire and may be truncated or followed by junk, so
//! this is a token scanner rather than a strict JSON parser:
//!
//! - only top-level keys are read, nested objects and arrays are skipped
//! - the first occurrence of a key wins
//! - scanning stops at the first token that does not fit the grammar, and
//!   whatever was read up to that point is kept
//! - a string without a closing quote is treated as absent
//! - numbers are read up to the first non-digit; a sign or overflow makes
//!   the value unusable and the default applies
//!
//! [`Command::parse`] is total: any byte slice yields a [`Command`].
//!
//! # Example
//!
//! ```rust
//! use rs_dispenser::command::Command;
//!
//! let cmd = Command::parse(br#"{"command": "dispense", "quantity": 5}"#);
//! let req = cmd.dispense().unwrap();
//! assert_eq!(req.quantity, Some(5));
//!
//! // Missing quantity falls back to the default
//! let cmd = Command::parse(br#"{"action":"dispense"}"#);
//! assert_eq!(cmd.dispense().unwrap().quantity_or(10), 10);
//!
//! assert_eq!(Command::parse(br#"{"foo":"bar"}"#), Command::Unrecognized);
//! ```

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::config::{short_string, ShortString};

/// Pill count used when a command carries no usable quantity.
pub const DEFAULT_QUANTITY: u32 = 10;

/// Value of the `command` / `action` field that starts a dispense.
const DISPENSE: &str = "dispense";

// ============================================================================
// Command types
// ============================================================================

/// A decoded inbound command.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Start (or restart) a dispense session.
    Dispense(DispenseRequest),
    /// Anything else; ignored by the control loop.
    Unrecognized,
}

/// Parameters of a dispense command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DispenseRequest {
    /// Requested pill count, `None` if absent or not a usable number.
    pub quantity: Option<u32>,
    /// Medicine name, echoed in logs only.
    pub medicine_name: Option<ShortString>,
    /// Prescription reference, echoed in the started status.
    pub prescription_id: Option<ShortString>,
}

impl DispenseRequest {
    /// Request with a quantity and no provenance.
    pub fn with_quantity(quantity: u32) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    /// Set the prescription reference.
    pub fn with_prescription(mut self, id: &str) -> Self {
        self.prescription_id = Some(short_string(id));
        self
    }

    /// Set the medicine name.
    pub fn with_medicine(mut self, name: &str) -> Self {
        self.medicine_name = Some(short_string(name));
        self
    }

    /// Requested quantity or `default`.
    pub fn quantity_or(&self, default: u32) -> u32 {
        self.quantity.unwrap_or(default)
    }

    /// Requested quantity or [`DEFAULT_QUANTITY`].
    pub fn target(&self) -> u32 {
        self.quantity_or(DEFAULT_QUANTITY)
    }
}

impl Command {
    /// Parse a payload.
    pub fn parse(bytes: &[u8]) -> Self {
        let fields = Fields::scan(bytes);
        let is_dispense = |v: &Option<String>| v.as_deref() == Some(DISPENSE);

        if is_dispense(&fields.command) || is_dispense(&fields.action) {
            Command::Dispense(DispenseRequest {
                quantity: fields.quantity,
                medicine_name: fields.medicine_name.as_deref().map(short_string),
                prescription_id: fields.prescription_id.as_deref().map(short_string),
            })
        } else {
            Command::Unrecognized
        }
    }

    /// Parse a transport delivery, reading at most `declared_len` bytes.
    ///
    /// For raw receive buffers whose payload length is reported separately;
    /// bytes past that length are never examined. The bundled transports
    /// already copy exact-length payloads into [`MqttMessage`], so the
    /// control loop uses [`Command::parse`].
    ///
    /// [`MqttMessage`]: crate::traits::MqttMessage
    pub fn parse_delivery(payload: &[u8], declared_len: usize) -> Self {
        let len = declared_len.min(payload.len());
        Self::parse(&payload[..len])
    }

    /// The dispense request, if this is one.
    pub fn dispense(&self) -> Option<&DispenseRequest> {
        match self {
            Command::Dispense(req) => Some(req),
            Command::Unrecognized => None,
        }
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// Top-level fields of interest, first occurrence only.
#[derive(Default)]
struct Fields {
    command: Option<String>,
    action: Option<String>,
    quantity: Option<u32>,
    quantity_seen: bool,
    medicine_name: Option<String>,
    prescription_id: Option<String>,
}

/// A scanned value.
enum Value {
    Str(Option<String>),
    Number(Option<u32>),
    Other,
}

/// Scanning cannot continue past this point.
struct Stop;

impl Fields {
    fn scan(bytes: &[u8]) -> Self {
        let mut fields = Fields::default();
        let mut s = Scanner::new(bytes);

        if !s.seek(b'{') {
            return fields;
        }
        // Errors only end the scan; fields read so far are kept.
        let _ = fields.members(&mut s);
        fields
    }

    fn members(&mut self, s: &mut Scanner<'_>) -> Result<(), Stop> {
        loop {
            s.skip_ws();
            match s.peek() {
                Some(b'}') | None => return Ok(()),
                Some(b',') => {
                    s.bump();
                    continue;
                }
                Some(b'"') => {}
                Some(_) => return Err(Stop),
            }

            let key = s.string()?;
            s.skip_ws();
            if s.peek() != Some(b':') {
                return Err(Stop);
            }
            s.bump();
            s.skip_ws();

            let value = s.value()?;
            if let Some(key) = key {
                self.assign(&key, value);
            }
        }
    }

    fn assign(&mut self, key: &str, value: Value) {
        let text = |v: Value| match v {
            Value::Str(s) => s,
            _ => None,
        };
        match key {
            "command" if self.command.is_none() => self.command = text(value),
            "action" if self.action.is_none() => self.action = text(value),
            "medicine_name" if self.medicine_name.is_none() => self.medicine_name = text(value),
            "prescription_id" if self.prescription_id.is_none() => {
                self.prescription_id = text(value)
            }
            "quantity" if !self.quantity_seen => {
                self.quantity_seen = true;
                self.quantity = match value {
                    Value::Number(n) => n,
                    Value::Str(Some(s)) => leading_u32(s.as_bytes()),
                    _ => None,
                };
            }
            _ => {}
        }
    }
}

/// Parse the leading unsigned decimal digits of `bytes`.
///
/// `None` if there are no leading digits or the value overflows.
fn leading_u32(bytes: &[u8]) -> Option<u32> {
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit());
    let mut value: u32 = 0;
    let mut any = false;
    for d in digits {
        value = value.checked_mul(10)?.checked_add(u32::from(d - b'0'))?;
        any = true;
    }
    any.then_some(value)
}

struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// Advance past the first `target` byte. False if there is none.
    fn seek(&mut self, target: u8) -> bool {
        while let Some(b) = self.bump() {
            if b == target {
                return true;
            }
        }
        false
    }

    fn value(&mut self) -> Result<Value, Stop> {
        match self.peek() {
            Some(b'"') => Ok(Value::Str(self.string()?)),
            Some(b'0'..=b'9') => Ok(Value::Number(self.number())),
            Some(b'-') => {
                self.number();
                Ok(Value::Number(None))
            }
            Some(b'{' | b'[') => {
                self.skip_nested()?;
                Ok(Value::Other)
            }
            Some(b) if b.is_ascii_alphabetic() => {
                while self.peek().is_some_and(|b| b.is_ascii_alphanumeric()) {
                    self.pos += 1;
                }
                Ok(Value::Other)
            }
            _ => Err(Stop),
        }
    }

    /// Consume a number token, returning its leading digits as `u32`.
    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
        ) {
            self.pos += 1;
        }
        leading_u32(&self.buf[start..self.pos])
    }

    /// Consume a quoted string starting at the opening quote.
    ///
    /// `Err(Stop)` if the closing quote is missing. `Ok(None)` if the
    /// string terminated but did not decode to valid UTF-8.
    fn string(&mut self) -> Result<Option<String>, Stop> {
        if self.bump() != Some(b'"') {
            return Err(Stop);
        }
        let mut out: Vec<u8> = Vec::new();
        let mut valid = true;
        loop {
            match self.bump().ok_or(Stop)? {
                b'"' => break,
                b'\\' => match self.bump().ok_or(Stop)? {
                    b'"' => out.push(b'"'),
                    b'\\' => out.push(b'\\'),
                    b'/' => out.push(b'/'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'u' => {
                        let c = self.unicode_escape()?;
                        let mut tmp = [0u8; 4];
                        out.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
                    }
                    _ => valid = false,
                },
                b => out.push(b),
            }
        }
        if !valid {
            return Ok(None);
        }
        Ok(String::from_utf8(out).ok())
    }

    /// Decode the four hex digits after `\u`, pairing surrogates when
    /// possible. Unpaired surrogates decode as U+FFFD.
    fn unicode_escape(&mut self) -> Result<char, Stop> {
        let hi = self.hex4()?;
        if !(0xD800..0xDC00).contains(&hi) {
            return Ok(char::from_u32(hi).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        if self.buf.get(self.pos..self.pos + 2) != Some(b"\\u".as_slice()) {
            return Ok(char::REPLACEMENT_CHARACTER);
        }
        self.pos += 2;
        let lo = self.hex4()?;
        if !(0xDC00..0xE000).contains(&lo) {
            return Ok(char::REPLACEMENT_CHARACTER);
        }
        let c = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
        Ok(char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn hex4(&mut self) -> Result<u32, Stop> {
        let mut v = 0;
        for _ in 0..4 {
            let d = (self.bump().ok_or(Stop)? as char).to_digit(16).ok_or(Stop)?;
            v = v * 16 + d;
        }
        Ok(v)
    }

    /// Skip a balanced object or array, honouring strings.
    fn skip_nested(&mut self) -> Result<(), Stop> {
        let mut depth = 0usize;
        loop {
            match self.peek().ok_or(Stop)? {
                b'{' | b'[' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' | b']' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                b'"' => {
                    self.string()?;
                }
                _ => self.pos += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispense(payload: &str) -> DispenseRequest {
        match Command::parse(payload.as_bytes()) {
            Command::Dispense(req) => req,
            Command::Unrecognized => panic!("expected dispense for {payload}"),
        }
    }

    // =========================================================================
    // Recognition
    // =========================================================================

    #[test]
    fn compact_form() {
        let req = dispense(r#"{"command":"dispense","quantity":5}"#);
        assert_eq!(req.quantity, Some(5));
        assert_eq!(req.target(), 5);
    }

    #[test]
    fn spaced_form() {
        let req = dispense("{ \"command\" : \"dispense\" ,\n \"quantity\" : 3 }");
        assert_eq!(req.quantity, Some(3));
    }

    #[test]
    fn action_key_accepted() {
        let req = dispense(r#"{"action":"dispense","quantity":2}"#);
        assert_eq!(req.quantity, Some(2));
    }

    #[test]
    fn backend_payload() {
        let req = dispense(
            r#"{"command":"dispense","medicine_id":7,"medicine_name":"Aspirin","quantity":4,"prescription_id":"RX-19","timestamp":"2024-05-01T10:00:00Z"}"#,
        );
        assert_eq!(req.quantity, Some(4));
        assert_eq!(req.medicine_name.as_deref(), Some("Aspirin"));
        assert_eq!(req.prescription_id.as_deref(), Some("RX-19"));
    }

    #[test]
    fn unrecognized_inputs() {
        for payload in [
            "",
            "{}",
            r#"{"foo":"bar"}"#,
            r#"{"command":"status"}"#,
            r#"{"command":"Dispense"}"#,
            r#"{"command":5}"#,
            "dispense",
            "not json at all",
        ] {
            assert_eq!(
                Command::parse(payload.as_bytes()),
                Command::Unrecognized,
                "{payload}"
            );
        }
    }

    #[test]
    fn nested_value_not_top_level() {
        let cmd = Command::parse(br#"{"meta":{"command":"dispense"}}"#);
        assert_eq!(cmd, Command::Unrecognized);
    }

    #[test]
    fn nested_values_skipped() {
        let req =
            dispense(r#"{"meta":{"a":[1,{"b":"}"}]},"tags":["x","y"],"command":"dispense","quantity":6}"#);
        assert_eq!(req.quantity, Some(6));
    }

    #[test]
    fn first_occurrence_wins() {
        let req = dispense(r#"{"command":"dispense","quantity":3,"quantity":9}"#);
        assert_eq!(req.quantity, Some(3));

        let cmd = Command::parse(br#"{"command":"status","command":"dispense"}"#);
        assert_eq!(cmd, Command::Unrecognized);
    }

    #[test]
    fn leading_junk_before_object() {
        let req = dispense(r#"xx{"command":"dispense","quantity":2}"#);
        assert_eq!(req.quantity, Some(2));
    }

    #[test]
    fn trailing_garbage_ignored() {
        let req = dispense("{\"command\":\"dispense\",\"quantity\":7}\0\0garbage\"{");
        assert_eq!(req.quantity, Some(7));
    }

    #[test]
    fn literals_skipped() {
        let req = dispense(r#"{"urgent":true,"note":null,"command":"dispense"}"#);
        assert_eq!(req.quantity, None);
    }

    // =========================================================================
    // Quantity
    // =========================================================================

    #[test]
    fn missing_quantity_defaults() {
        let req = dispense(r#"{"command":"dispense"}"#);
        assert_eq!(req.quantity, None);
        assert_eq!(req.target(), DEFAULT_QUANTITY);
    }

    #[test]
    fn non_numeric_quantity_defaults() {
        for q in [r#""abc""#, "true", "null", "-3", "[1]", r#""""#, r#""-2""#] {
            let payload = alloc::format!(r#"{{"command":"dispense","quantity":{q}}}"#);
            assert_eq!(dispense(&payload).target(), 10, "{payload}");
        }
    }

    #[test]
    fn quantity_stops_at_first_non_digit() {
        assert_eq!(dispense(r#"{"command":"dispense","quantity":12.7}"#).quantity, Some(12));
        assert_eq!(dispense(r#"{"command":"dispense","quantity":8e2}"#).quantity, Some(8));
        assert_eq!(dispense(r#"{"command":"dispense","quantity":"5 pills"}"#).quantity, Some(5));
    }

    #[test]
    fn quantity_digits_then_junk_keeps_earlier_fields() {
        let req = dispense(r#"{"command":"dispense","quantity":4abc,"prescription_id":"RX"}"#);
        assert_eq!(req.quantity, Some(4));
        assert_eq!(req.prescription_id, None);
    }

    #[test]
    fn quantity_overflow_defaults() {
        let req = dispense(r#"{"command":"dispense","quantity":99999999999}"#);
        assert_eq!(req.quantity, None);
        let max = dispense(r#"{"command":"dispense","quantity":4294967295}"#);
        assert_eq!(max.quantity, Some(u32::MAX));
    }

    #[test]
    fn zero_quantity_is_kept() {
        assert_eq!(dispense(r#"{"command":"dispense","quantity":0}"#).quantity, Some(0));
    }

    #[test]
    fn quantity_at_end_of_buffer() {
        let req = dispense(r#"{"command":"dispense","quantity":42"#);
        assert_eq!(req.quantity, Some(42));
    }

    // =========================================================================
    // Strings
    // =========================================================================

    #[test]
    fn truncated_string_is_absent() {
        let req = dispense(r#"{"command":"dispense","quantity":2,"medicine_name":"Ibupro"#);
        assert_eq!(req.quantity, Some(2));
        assert_eq!(req.medicine_name, None);
    }

    #[test]
    fn truncated_command_value_unrecognized() {
        assert_eq!(
            Command::parse(br#"{"command":"dispen"#),
            Command::Unrecognized
        );
        assert_eq!(Command::parse(br#"{"command":"#), Command::Unrecognized);
    }

    #[test]
    fn escapes_decoded() {
        let req = dispense(
            r#"{"command":"dispense","medicine_name":"Vit \"D\"\u00e9\\","prescription_id":"a\/b"}"#,
        );
        assert_eq!(req.medicine_name.as_deref(), Some("Vit \"D\"\u{e9}\\"));
        assert_eq!(req.prescription_id.as_deref(), Some("a/b"));
    }

    #[test]
    fn surrogate_pair_decoded() {
        let req = dispense(r#"{"command":"dispense","medicine_name":"\ud83d\udc8a"}"#);
        assert_eq!(req.medicine_name.as_deref(), Some("\u{1F48A}"));
    }

    #[test]
    fn escaped_command_value() {
        let req = dispense(r#"{"command":"\u0064ispense"}"#);
        assert_eq!(req.quantity, None);
    }

    #[test]
    fn invalid_utf8_field_absent() {
        let mut payload = br#"{"command":"dispense","medicine_name":""#.to_vec();
        payload.extend_from_slice(&[0xFF, 0xFE]);
        payload.extend_from_slice(br#"","quantity":3}"#);
        let req = Command::parse(&payload);
        let req = req.dispense().unwrap();
        assert_eq!(req.medicine_name, None);
        assert_eq!(req.quantity, Some(3));
    }

    #[test]
    fn long_string_truncated() {
        let name = "m".repeat(200);
        let payload = alloc::format!(r#"{{"command":"dispense","medicine_name":"{name}"}}"#);
        let req = dispense(&payload);
        assert_eq!(req.medicine_name.unwrap().len(), 64);
    }

    // =========================================================================
    // Delivery bounds
    // =========================================================================

    #[test]
    fn delivery_respects_declared_length() {
        let buf = br#"{"command":"dispense","quantity":5}"#;
        // Cut inside the "quantity" key
        let cmd = Command::parse_delivery(buf, 25);
        assert_eq!(cmd.dispense().unwrap().quantity, None);
    }

    #[test]
    fn delivery_length_larger_than_buffer() {
        let buf = br#"{"command":"dispense","quantity":5}"#;
        let cmd = Command::parse_delivery(buf, 10_000);
        assert_eq!(cmd.dispense().unwrap().quantity, Some(5));
    }

    #[test]
    fn delivery_zero_length() {
        let buf = br#"{"command":"dispense"}"#;
        assert_eq!(Command::parse_delivery(buf, 0), Command::Unrecognized);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn leading_u32_cases() {
        assert_eq!(leading_u32(b"123abc"), Some(123));
        assert_eq!(leading_u32(b"abc"), None);
        assert_eq!(leading_u32(b""), None);
        assert_eq!(leading_u32(b"4294967296"), None);
    }

    #[test]
    fn request_builders() {
        let req = DispenseRequest::with_quantity(3)
            .with_prescription("RX-1")
            .with_medicine("Aspirin");
        assert_eq!(req.target(), 3);
        assert_eq!(req.prescription_id.as_deref(), Some("RX-1"));
        assert_eq!(req.medicine_name.as_deref(), Some("Aspirin"));
    }
}
