//! Response envelope handling.
//!
//! The backend may wrap payloads as `{code, message, data, timestamp?}`.
//! Codes `0` and `200` both mean success; any other code is a business
//! failure even when the HTTP status is 2xx. Bodies without a numeric `code`
//! member are returned as-is.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tunedeck_core::ApiError;

/// Envelope codes that denote success.
pub const SUCCESS_CODES: [i64; 2] = [0, 200];

const DEFAULT_FAILURE_MESSAGE: &str = "request failed";

/// Turn an HTTP status and raw body into the success payload or an error.
pub fn interpret_response(status: u16, body: &[u8]) -> Result<Value, ApiError> {
    let parsed = parse_body(body);

    if !(200..300).contains(&status) {
        return Err(failure_from_parts(status, parsed, body));
    }

    match parsed {
        Some(value) => unwrap_envelope(value),
        None => Ok(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

/// The error for a non-2xx response.
pub fn http_failure(status: u16, body: &[u8]) -> ApiError {
    failure_from_parts(status, parse_body(body), body)
}

fn failure_from_parts(status: u16, parsed: Option<Value>, body: &[u8]) -> ApiError {
    let message = parsed
        .as_ref()
        .and_then(|value| value.get("message"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
        .or_else(|| {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
    let data = parsed.unwrap_or_else(|| Value::String(String::from_utf8_lossy(body).into_owned()));
    ApiError::new(i64::from(status), message).with_data(data)
}

/// Strip the envelope from a successful body, or surface its business error.
pub fn unwrap_envelope(value: Value) -> Result<Value, ApiError> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };
    let Some(code) = map.get("code").and_then(Value::as_i64) else {
        return Ok(Value::Object(map));
    };

    if !SUCCESS_CODES.contains(&code) {
        let message = map
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .unwrap_or(DEFAULT_FAILURE_MESSAGE)
            .to_string();
        let data = map.remove("data").unwrap_or(Value::Null);
        return Err(ApiError::new(code, message).with_data(data));
    }

    match map.remove("data") {
        Some(data) => Ok(data),
        None => Ok(Value::Object(map)),
    }
}

/// Decode an unwrapped payload into the caller's type.
///
/// A body that does not match is reported with code `0`, like any other
/// fault that carries no status.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::network(format!("invalid response body: {}", err)))
}

fn parse_body(body: &[u8]) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Some(Value::Null);
    }
    serde_json::from_slice(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_success_sentinels_unwrap_data() {
        for code in SUCCESS_CODES {
            let out = interpret_response(200, &body(json!({"code": code, "message": "ok", "data": [1, 2]})));
            assert_eq!(out.unwrap(), json!([1, 2]));
        }
    }

    #[test]
    fn test_business_failure_in_2xx() {
        let err = interpret_response(
            200,
            &body(json!({"code": 401, "message": "unauthorized", "data": null})),
        )
        .unwrap_err();
        assert_eq!(err.code, 401);
        assert_eq!(err.message, "unauthorized");
        assert!(err.data.is_none());
        assert!(err.is_auth());
    }

    #[test]
    fn test_business_failure_keeps_payload() {
        let err = unwrap_envelope(json!({
            "code": 42201,
            "message": "",
            "data": {"name": ["is required"]}
        }))
        .unwrap_err();
        assert_eq!(err.code, 42201);
        assert_eq!(err.message, DEFAULT_FAILURE_MESSAGE);
        assert_eq!(err.data, Some(json!({"name": ["is required"]})));
    }

    #[test]
    fn test_raw_body_without_envelope() {
        let out = interpret_response(200, &body(json!([{"id": 1}]))).unwrap();
        assert_eq!(out, json!([{"id": 1}]));

        let out = interpret_response(200, &body(json!({"id": "a1", "name": "x"}))).unwrap();
        assert_eq!(out, json!({"id": "a1", "name": "x"}));
    }

    #[test]
    fn test_envelope_without_data_returns_body() {
        let out = unwrap_envelope(json!({"code": 0, "message": "ok"})).unwrap();
        assert_eq!(out, json!({"code": 0, "message": "ok"}));
    }

    #[test]
    fn test_non_numeric_code_is_not_an_envelope() {
        let out = unwrap_envelope(json!({"code": "M3-2024", "name": "x"})).unwrap();
        assert_eq!(out["code"], "M3-2024");
    }

    #[test]
    fn test_empty_body_is_null() {
        assert_eq!(interpret_response(204, b"").unwrap(), Value::Null);
        assert_eq!(interpret_response(200, b"  \n").unwrap(), Value::Null);
    }

    #[test]
    fn test_http_error_uses_body_message() {
        let err = interpret_response(403, &body(json!({"message": "admins only"}))).unwrap_err();
        assert_eq!(err.code, 403);
        assert_eq!(err.message, "admins only");
        assert!(err.is_permission());
    }

    #[test]
    fn test_http_error_falls_back_to_reason() {
        let err = interpret_response(404, b"<html>nope</html>").unwrap_err();
        assert_eq!(err.code, 404);
        assert_eq!(err.message, "Not Found");
        assert_eq!(err.data, Some(json!("<html>nope</html>")));

        let err = interpret_response(503, b"").unwrap_err();
        assert_eq!(err.message, "Service Unavailable");
        assert!(err.data.is_none());
    }

    #[test]
    fn test_decode_failure_is_code_zero() {
        let err = decode::<Vec<String>>(json!({"not": "a list"})).unwrap_err();
        assert_eq!(err.code, 0);
        assert!(err.message.starts_with("invalid response body"));
    }

    #[test]
    fn test_decode_unit_from_null() {
        decode::<()>(Value::Null).unwrap();
    }
}
