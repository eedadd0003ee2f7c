//! Postcode validation against third-party lookup services.
//!
//! Services are asked in order and the first one that answers decides. A
//! service that cannot be reached, or answers with anything but `200 OK`,
//! is skipped without retrying.

use crate::orders::normalize;
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of a validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    /// At least one lookup service answered.
    pub reachable: bool,
    pub valid: bool,
}

impl Validation {
    pub const UNREACHABLE: Validation = Validation {
        reachable: false,
        valid: false,
    };

    pub fn answered(valid: bool) -> Self {
        Validation {
            reachable: true,
            valid,
        }
    }
}

#[tonic::async_trait]
pub trait PostcodeValidator: Send + Sync + 'static {
    async fn validate(&self, postcode: &str) -> Validation;
}

pub const POSTCODES_IO: &str = "https://api.postcodes.io";
pub const GET_THE_DATA: &str = "https://api.getthedata.com";

/// A single lookup service and the base URL it is reached on.
#[derive(Debug, Clone)]
pub enum LookupService {
    /// `GET {base}/postcodes/{postcode}/validate` answering
    /// `{"status": 200, "result": bool}`.
    PostcodesIo(String),
    /// `GET {base}/postcode/{postcode}` answering `{"status": "match"}` for
    /// known postcodes.
    GetTheData(String),
}

impl LookupService {
    fn url(&self, postcode: &str) -> String {
        match self {
            LookupService::PostcodesIo(base) => format!("{base}/postcodes/{postcode}/validate"),
            LookupService::GetTheData(base) => format!("{base}/postcode/{postcode}"),
        }
    }

    fn interpret(&self, body: &Value) -> bool {
        match self {
            LookupService::PostcodesIo(_) => {
                body["status"].as_u64() == Some(200) && body["result"].as_bool() == Some(true)
            }
            LookupService::GetTheData(_) => body["status"].as_str() == Some("match"),
        }
    }
}

pub struct HttpValidator {
    client: reqwest::Client,
    services: Vec<LookupService>,
}

impl Default for HttpValidator {
    fn default() -> Self {
        Self::new(vec![
            LookupService::PostcodesIo(POSTCODES_IO.to_string()),
            LookupService::GetTheData(GET_THE_DATA.to_string()),
        ])
    }
}

impl HttpValidator {
    pub fn new(services: Vec<LookupService>) -> Self {
        Self {
            client: reqwest::Client::new(),
            services,
        }
    }

    async fn query(&self, service: &LookupService, postcode: &str) -> Option<bool> {
        let url = service.url(postcode);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Postcode service unreachable");
                return None;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            warn!(url = %url, status = %response.status(), "Postcode service refused lookup");
            return None;
        }
        match response.json::<Value>().await {
            Ok(body) => Some(service.interpret(&body)),
            Err(e) => {
                warn!(url = %url, error = %e, "Postcode service sent an unreadable reply");
                None
            }
        }
    }
}

#[tonic::async_trait]
impl PostcodeValidator for HttpValidator {
    async fn validate(&self, postcode: &str) -> Validation {
        let postcode = normalize(postcode);
        for service in &self.services {
            if let Some(valid) = self.query(service, &postcode).await {
                debug!(postcode = %postcode, valid, "Postcode validated");
                return Validation::answered(valid);
            }
        }
        Validation::UNREACHABLE
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn postcodes_io_reply() {
        let service = LookupService::PostcodesIo(POSTCODES_IO.into());
        assert_eq!(
            service.url("dh13le"),
            "https://api.postcodes.io/postcodes/dh13le/validate"
        );
        assert!(service.interpret(&json!({"status": 200, "result": true})));
        assert!(!service.interpret(&json!({"status": 200, "result": false})));
        assert!(!service.interpret(&json!({"status": 404, "result": true})));
    }

    #[test]
    fn get_the_data_reply() {
        let service = LookupService::GetTheData(GET_THE_DATA.into());
        assert_eq!(
            service.url("zz99zz"),
            "https://api.getthedata.com/postcode/zz99zz"
        );
        assert!(service.interpret(&json!({"status": "match"})));
        assert!(!service.interpret(&json!({"status": "no_match"})));
        assert!(!service.interpret(&json!({})));
    }

    #[tokio::test]
    async fn no_reachable_service() {
        // Nothing listens on port 1, both lookups fail to connect.
        let validator = HttpValidator::new(vec![
            LookupService::PostcodesIo("http://127.0.0.1:1".into()),
            LookupService::GetTheData("http://127.0.0.1:1".into()),
        ]);
        assert_eq!(validator.validate("DH1 3LE").await, Validation::UNREACHABLE);
    }
}
