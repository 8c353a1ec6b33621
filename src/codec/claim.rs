//! Meeting claims and request validation
//!
//! Validation runs before anything touches a key or the ledger. Each failure
//! names the field that violated its constraint.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::types::{NotaryError, Result};

/// Inclusive upper bound of `meetingType`
pub const MAX_MEETING_TYPE: u8 = 5;

/// A claim about one scheduled meeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub recipient: String,
    pub meeting_id: String,
    pub meeting_type: u8,
    pub start_time: u32,
    pub end_time: u32,
}

impl Claim {
    /// Build a claim from an inbound JSON body.
    ///
    /// Type checks come first (strings, then numbers), range checks after,
    /// so the reported field matches the first broken rule.
    pub fn from_json(body: &JsonValue) -> Result<Self> {
        let recipient = require_string(body, "recipient")?;
        let meeting_id = require_string(body, "meetingId")?;

        for field in ["meetingType", "startTime", "endTime"] {
            if !body.get(field).is_some_and(JsonValue::is_number) {
                return Err(NotaryError::validation(
                    field,
                    "MeetingType, startTime, and endTime must be numbers.",
                ));
            }
        }

        let meeting_type = require_integer(body, "meetingType")?;
        if !(0..=MAX_MEETING_TYPE as i128).contains(&meeting_type) {
            return Err(NotaryError::validation(
                "meetingType",
                "MeetingType must be a number between 0 and 5.",
            ));
        }

        let start_time = require_u32(body, "startTime")?;
        let end_time = require_u32(body, "endTime")?;

        let claim = Self {
            recipient,
            meeting_id,
            meeting_type: meeting_type as u8,
            start_time,
            end_time,
        };
        claim.validate()?;
        Ok(claim)
    }

    /// Re-check invariants on an already typed claim
    pub fn validate(&self) -> Result<()> {
        if self.recipient.trim().is_empty() {
            return Err(NotaryError::validation("recipient", "Recipient must not be empty."));
        }
        if self.meeting_id.is_empty() {
            return Err(NotaryError::validation("meetingId", "MeetingId must not be empty."));
        }
        if self.meeting_type > MAX_MEETING_TYPE {
            return Err(NotaryError::validation(
                "meetingType",
                "MeetingType must be a number between 0 and 5.",
            ));
        }
        Ok(())
    }
}

fn require_string(body: &JsonValue, field: &str) -> Result<String> {
    match body.get(field) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        _ => Err(NotaryError::validation(field, "Recipient and meetingId must be strings.")),
    }
}

/// Integer value of a JSON number; fractional values are rejected
fn require_integer(body: &JsonValue, field: &str) -> Result<i128> {
    let value = body
        .get(field)
        .ok_or_else(|| NotaryError::validation(field, format!("{field} is required.")))?;

    if let Some(n) = value.as_i64() {
        return Ok(n as i128);
    }
    if let Some(n) = value.as_u64() {
        return Ok(n as i128);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e30 => Ok(f as i128),
        _ => Err(NotaryError::validation(field, format!("{field} must be an integer."))),
    }
}

fn require_u32(body: &JsonValue, field: &str) -> Result<u32> {
    let n = require_integer(body, field)?;
    u32::try_from(n).map_err(|_| {
        NotaryError::validation(field, format!("{field} must fit in an unsigned 32-bit timestamp."))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(meeting_type: JsonValue) -> JsonValue {
        json!({
            "recipient": "0xA1",
            "meetingId": "standup-42",
            "meetingType": meeting_type,
            "startTime": 1_700_000_000u32,
            "endTime": 1_700_003_600u32,
        })
    }

    fn field_of(err: NotaryError) -> String {
        match err {
            NotaryError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_meeting_type_boundaries() {
        assert_eq!(Claim::from_json(&body(json!(5))).unwrap().meeting_type, 5);
        assert_eq!(Claim::from_json(&body(json!(0))).unwrap().meeting_type, 0);
        assert_eq!(field_of(Claim::from_json(&body(json!(6))).unwrap_err()), "meetingType");
        assert_eq!(field_of(Claim::from_json(&body(json!(-1))).unwrap_err()), "meetingType");
        assert_eq!(field_of(Claim::from_json(&body(json!(2.5))).unwrap_err()), "meetingType");
    }

    #[test]
    fn test_non_numeric_start_time_rejected() {
        let mut b = body(json!(2));
        b["startTime"] = json!("1700000000");
        let err = Claim::from_json(&b).unwrap_err();
        assert_eq!(err.to_string(), "MeetingType, startTime, and endTime must be numbers.");
        assert_eq!(field_of(err), "startTime");
    }

    #[test]
    fn test_string_fields_checked_first() {
        let mut b = body(json!("two"));
        b["recipient"] = json!(42);
        assert_eq!(field_of(Claim::from_json(&b).unwrap_err()), "recipient");

        let mut b = body(json!(2));
        b["meetingId"] = JsonValue::Null;
        assert_eq!(field_of(Claim::from_json(&b).unwrap_err()), "meetingId");
    }

    #[test]
    fn test_timestamps_must_fit_u32() {
        let mut b = body(json!(1));
        b["endTime"] = json!(4_294_967_296u64);
        assert_eq!(field_of(Claim::from_json(&b).unwrap_err()), "endTime");

        let mut b = body(json!(1));
        b["startTime"] = json!(-5);
        assert_eq!(field_of(Claim::from_json(&b).unwrap_err()), "startTime");
    }

    #[test]
    fn test_empty_identifiers_rejected() {
        let mut b = body(json!(1));
        b["meetingId"] = json!("");
        assert_eq!(field_of(Claim::from_json(&b).unwrap_err()), "meetingId");

        let mut b = body(json!(1));
        b["recipient"] = json!("  ");
        assert_eq!(field_of(Claim::from_json(&b).unwrap_err()), "recipient");
    }

    #[test]
    fn test_valid_claim() {
        let claim = Claim::from_json(&body(json!(2))).unwrap();
        assert_eq!(claim.meeting_id, "standup-42");
        assert_eq!(claim.start_time, 1_700_000_000);
        assert_eq!(claim.end_time, 1_700_003_600);
    }
}
