use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// A message as returned by the proxy. `sender` and `data` are carried through
/// as raw JSON and never inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "ID")]
    pub id: String,
    /// Acceptance time in nanoseconds since the epoch, assigned by the source.
    #[serde(rename = "Accepted")]
    pub accepted: i64,
    #[serde(rename = "Sender")]
    pub sender: Box<RawValue>,
    #[serde(rename = "Data")]
    pub data: Box<RawValue>,
}

/// Messages of one fetch, in log order.
pub type Batch = Vec<Message>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_pass_through_verbatim() {
        let raw = r#"{"ID":"m-1","Accepted":1700000000123456789,"Sender":{"ip": "10.0.0.1"},"Data":[1, 2,3]}"#;
        let message: Message = serde_json::from_str(raw).unwrap();

        assert_eq!(message.id, "m-1");
        assert_eq!(message.accepted, 1_700_000_000_123_456_789);
        // whitespace and key order are untouched
        assert_eq!(message.sender.get(), r#"{"ip": "10.0.0.1"}"#);
        assert_eq!(message.data.get(), "[1, 2,3]");
    }
}
