//! Built-in job handlers, one per [`JobType`](crate::jobs::JobType).
//!
//! Each handler checks its required payload fields, decodes the payload into
//! a typed struct and walks through its stages with simulated latencies.

mod cleanup;
mod data_sync;
mod email_sender;
mod report_generator;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::jobs::types::JobPayload;

pub use cleanup::CleanupHandler;
pub use data_sync::DataSyncHandler;
pub use email_sender::EmailSenderHandler;
pub use report_generator::ReportGeneratorHandler;

/// JavaScript-style truthiness: null, false, 0, NaN and "" are falsy.
pub(crate) fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

/// Whether every field in `required` is present and truthy
pub(crate) fn has_required_fields(payload: &JobPayload, required: &[&str]) -> bool {
    required
        .iter()
        .all(|field| payload.get(*field).is_some_and(is_truthy))
}

pub(crate) fn decode_payload<T: DeserializeOwned>(payload: &JobPayload) -> Result<T, String> {
    serde_json::from_value(JsonValue::Object(payload.clone()))
        .map_err(|e| format!("Malformed payload: {e}"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use jiff::Timestamp;
    use serde_json::Value as JsonValue;

    use crate::jobs::models::{NewScheduledJob, ScheduledJob};
    use crate::jobs::types::{JobPayload, JobType};

    pub fn payload(value: JsonValue) -> JobPayload {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("payload must be an object, got {other}"),
        }
    }

    pub fn job(job_type: JobType, value: JsonValue) -> ScheduledJob {
        NewScheduledJob {
            job_type,
            customer_id: "cust_42".to_string(),
            next_run_at: Timestamp::now(),
            max_retries: 3,
            payload: payload(value),
        }
        .into_job(Timestamp::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_follows_javascript_rules() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(1), json!("x"), json!([]), json!({})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn required_fields_must_be_present_and_truthy() {
        let payload = test_support::payload(json!({ "a": "x", "b": "" }));
        assert!(has_required_fields(&payload, &["a"]));
        assert!(!has_required_fields(&payload, &["a", "b"]));
        assert!(!has_required_fields(&payload, &["c"]));
    }
}
