use crate::error::{AvError, Result};
use crate::types::AmpPower;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version sent with every request
pub const API_VERSION: &str = "1.1";

/// Amplifier JSON-RPC request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub version: String,
    pub id: u32,
    pub params: Vec<Value>,
}

/// Parameters for `setPowerStatus`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerParams {
    pub status: AmpPower,
}

impl RpcRequest {
    /// Create a request with the given method and no parameters
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            version: API_VERSION.to_string(),
            id: 1,
            params: Vec::new(),
        }
    }

    /// Append a parameter object
    pub fn with_param<P: Serialize>(mut self, param: &P) -> Result<Self> {
        self.params.push(serde_json::to_value(param)?);
        Ok(self)
    }

    /// `setPowerStatus` request for the given state
    pub fn set_power_status(state: AmpPower) -> Result<Self> {
        Self::new("setPowerStatus").with_param(&PowerParams { status: state })
    }
}

/// Decoded amplifier reply
///
/// The wire format is either `{"id":1,"result":[...]}` or
/// `{"id":1,"error":[code,"message"]}`.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    Result(Value),
    Error { code: i64, message: String },
}

impl RpcReply {
    /// Decode a reply body, checking the `error` member before `result`
    pub fn parse(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;
        let obj = value
            .as_object()
            .ok_or_else(|| AvError::protocol("Reply is not an object"))?;

        if let Some(error) = obj.get("error") {
            let fields = error
                .as_array()
                .ok_or_else(|| AvError::protocol("Reply error is not an array"))?;
            let code = fields
                .first()
                .and_then(|v| v.as_i64())
                .ok_or_else(|| AvError::protocol("Reply error has no code"))?;
            let message = fields
                .get(1)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            return Ok(Self::Error { code, message });
        }

        match obj.get("result") {
            Some(result) => Ok(Self::Result(result.clone())),
            None => Err(AvError::protocol("Reply has neither result nor error")),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn power_request_envelope() {
        let request = RpcRequest::set_power_status(AmpPower::Active).unwrap();
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "method": "setPowerStatus",
                "version": "1.1",
                "id": 1,
                "params": [{ "status": "active" }]
            })
        );
    }

    #[test]
    fn parses_result_reply() {
        let reply = RpcReply::parse(r#"{"result":[],"id":1}"#).unwrap();
        assert_eq!(reply, RpcReply::Result(json!([])));
        assert!(!reply.is_error());
    }

    #[test]
    fn parses_error_reply() {
        let reply = RpcReply::parse(r#"{"error":[40000,"Display Is Turned off"],"id":1}"#).unwrap();
        assert_eq!(
            reply,
            RpcReply::Error {
                code: 40000,
                message: "Display Is Turned off".to_string()
            }
        );
    }

    #[test]
    fn rejects_shapeless_reply() {
        assert!(RpcReply::parse(r#"{"id":1}"#).is_err());
        assert!(RpcReply::parse("[]").is_err());
        assert!(RpcReply::parse("not json").is_err());
    }
}
