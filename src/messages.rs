//! Outbound status and health payloads.
//!
//! Payloads are formatted by hand into fixed-capacity strings so the core
//! needs neither an allocator for output nor a JSON serializer.
//!
//! # Formats
//!
//! Status topic:
//!
//! ```json
//! {"status":"dispensing_started","targetCount":5,"prescription_id":"RX-19"}
//! {"pillCount":2,"targetCount":5}
//! {"pillCount":5,"targetCount":5,"status":"complete"}
//! ```
//!
//! Health topic:
//!
//! ```json
//! {"status":"online","temperature":23.50}
//! {"status":"online","temperature":null}
//! {"status":"offline"}
//! ```
//!
//! # Example
//!
//! ```rust
//! use rs_dispenser::messages::{HealthReport, StatusMessage};
//!
//! let msg = StatusMessage::Progress { count: 2, target: 5 };
//! assert_eq!(msg.to_json().as_str(), r#"{"pillCount":2,"targetCount":5}"#);
//!
//! let health = HealthReport { temperature: None };
//! assert_eq!(health.to_json().as_str(), r#"{"status":"online","temperature":null}"#);
//! ```

use core::fmt::Write;

use crate::config::ShortString;

/// Capacity of an outbound payload.
pub const MAX_PAYLOAD: usize = 512;

/// Outbound payload buffer.
pub type Payload = heapless::String<MAX_PAYLOAD>;

/// Health payload published once the transport is up.
pub const ONLINE: &str = r#"{"status":"online"}"#;

/// Health payload registered as the transport's last will.
pub const OFFLINE: &str = r#"{"status":"offline"}"#;

// ============================================================================
// Status
// ============================================================================

/// Dispense progress, published on the status topic.
#[derive(Clone, Debug, PartialEq)]
pub enum StatusMessage {
    /// A session has started.
    Started {
        /// Pills to dispense.
        target: u32,
        /// Prescription reference from the command, if any.
        prescription_id: Option<ShortString>,
    },
    /// A pill was counted and the session continues.
    Progress {
        /// Pills counted so far.
        count: u32,
        /// Session target.
        target: u32,
    },
    /// The session reached its target.
    Complete {
        /// Pills counted.
        count: u32,
        /// Session target.
        target: u32,
    },
}

impl StatusMessage {
    /// Render as JSON.
    pub fn to_json(&self) -> Payload {
        let mut out = Payload::new();
        // Capacity covers the longest escaped prescription id.
        let _ = match self {
            Self::Started {
                target,
                prescription_id,
            } => {
                let _ = write!(out, r#"{{"status":"dispensing_started","targetCount":{target}"#);
                if let Some(id) = prescription_id {
                    let _ = out.push_str(r#","prescription_id":""#);
                    push_escaped(&mut out, id);
                    let _ = out.push('"');
                }
                out.push('}').map_err(|_| ())
            }
            Self::Progress { count, target } => {
                write!(out, r#"{{"pillCount":{count},"targetCount":{target}}}"#).map_err(|_| ())
            }
            Self::Complete { count, target } => write!(
                out,
                r#"{{"pillCount":{count},"targetCount":{target},"status":"complete"}}"#
            )
            .map_err(|_| ()),
        };
        out
    }

    /// True for the completion message.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

// ============================================================================
// Health
// ============================================================================

/// Periodic health telemetry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HealthReport {
    /// Enclosure temperature, `None` on a sensor fault.
    pub temperature: Option<f32>,
}

impl HealthReport {
    /// Build a report from a raw reading, treating NaN and infinities as
    /// a failed read.
    pub fn from_reading(reading: Option<f32>) -> Self {
        Self {
            temperature: reading.filter(|t| t.is_finite()),
        }
    }

    /// Render as JSON. A missing reading is an explicit `null`.
    pub fn to_json(&self) -> Payload {
        let mut out = Payload::new();
        let _ = match self.temperature.filter(|t| t.is_finite()) {
            Some(t) => write!(out, r#"{{"status":"online","temperature":{t:.2}}}"#),
            None => write!(out, r#"{{"status":"online","temperature":null}}"#),
        };
        out
    }
}

/// Append `s` as the body of a JSON string literal.
fn push_escaped(out: &mut Payload, s: &str) {
    for c in s.chars() {
        let _ = match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32).map_err(|_| ()),
            c => out.push(c).map_err(|_| ()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::short_string;

    #[test]
    fn started_without_prescription() {
        let msg = StatusMessage::Started {
            target: 5,
            prescription_id: None,
        };
        assert_eq!(
            msg.to_json().as_str(),
            r#"{"status":"dispensing_started","targetCount":5}"#
        );
    }

    #[test]
    fn started_with_prescription() {
        let msg = StatusMessage::Started {
            target: 3,
            prescription_id: Some(short_string("RX-19")),
        };
        assert_eq!(
            msg.to_json().as_str(),
            r#"{"status":"dispensing_started","targetCount":3,"prescription_id":"RX-19"}"#
        );
    }

    #[test]
    fn started_escapes_prescription() {
        let msg = StatusMessage::Started {
            target: 1,
            prescription_id: Some(short_string("a\"b\\c\n\u{1}")),
        };
        assert_eq!(
            msg.to_json().as_str(),
            r#"{"status":"dispensing_started","targetCount":1,"prescription_id":"a\"b\\c\n\u0001"}"#
        );
    }

    #[test]
    fn worst_case_prescription_fits() {
        let id: alloc::string::String = core::iter::repeat('\u{1}').take(64).collect();
        let msg = StatusMessage::Started {
            target: u32::MAX,
            prescription_id: Some(short_string(&id)),
        };
        assert!(msg.to_json().ends_with("\"}"));
    }

    #[test]
    fn progress_and_complete() {
        let p = StatusMessage::Progress {
            count: 1,
            target: 2,
        };
        assert_eq!(p.to_json().as_str(), r#"{"pillCount":1,"targetCount":2}"#);
        assert!(!p.is_complete());

        let c = StatusMessage::Complete {
            count: 2,
            target: 2,
        };
        assert_eq!(
            c.to_json().as_str(),
            r#"{"pillCount":2,"targetCount":2,"status":"complete"}"#
        );
        assert!(c.is_complete());
    }

    #[test]
    fn health_with_temperature() {
        let h = HealthReport::from_reading(Some(23.5));
        assert_eq!(
            h.to_json().as_str(),
            r#"{"status":"online","temperature":23.50}"#
        );
    }

    #[test]
    fn health_without_temperature() {
        for reading in [None, Some(f32::NAN), Some(f32::INFINITY)] {
            let h = HealthReport::from_reading(reading);
            assert_eq!(h.temperature, None);
            assert_eq!(
                h.to_json().as_str(),
                r#"{"status":"online","temperature":null}"#
            );
        }
    }

    #[test]
    fn negative_temperature() {
        let h = HealthReport::from_reading(Some(-4.25));
        assert_eq!(
            h.to_json().as_str(),
            r#"{"status":"online","temperature":-4.25}"#
        );
    }
}
