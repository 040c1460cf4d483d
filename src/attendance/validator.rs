//! Remote attendance validator: a serverless function that checks the
//! geofence and records the event.

use super::{AttendanceValidator, ClockReceipt, ClockRequest, ClockVerdict, ValidatorError};
use crate::APP_USER_AGENT;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

const FUNCTIONS_PATH: &str = "/functions/v1/";

/// Wire shape of both verdicts, told apart by `success`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerdictBody {
    success: bool,
    event_id: Option<String>,
    site_name: Option<String>,
    site_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    error_code: Option<String>,
    message: Option<String>,
}

impl TryFrom<VerdictBody> for ClockVerdict {
    type Error = ValidatorError;

    fn try_from(body: VerdictBody) -> Result<Self, Self::Error> {
        if !body.success {
            return Ok(Self::Refused {
                error_code: body.error_code,
                message: body.message,
            });
        }

        match (body.event_id, body.site_name, body.site_id, body.timestamp) {
            (Some(event_id), Some(site_name), Some(site_id), Some(timestamp)) => {
                Ok(Self::Accepted(ClockReceipt {
                    event_id,
                    site_name,
                    site_id,
                    timestamp,
                }))
            }
            _ => Err(ValidatorError::InvalidResponse(
                "success verdict without event details".to_string(),
            )),
        }
    }
}

pub struct ValidatorClient {
    client: Client,
    endpoint: Url,
    api_key: SecretString,
}

impl ValidatorClient {
    /// Client for the function `function` under `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, function: &str, api_key: SecretString) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;
        let endpoint = Url::parse(base_url)?
            .join(FUNCTIONS_PATH)?
            .join(function.trim_matches('/'))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl AttendanceValidator for ValidatorClient {
    #[instrument(skip(self, request, access_token), fields(kind = %request.kind))]
    async fn submit(
        &self,
        request: &ClockRequest,
        access_token: &SecretString,
    ) -> Result<ClockVerdict, ValidatorError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(access_token.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ValidatorError::InvalidResponse(e.to_string()))
            .or_else(|e| {
                if status.is_success() {
                    Err(e)
                } else {
                    Ok(Value::Null)
                }
            })?;

        debug!(%status, "validator responded");

        match serde_json::from_value::<VerdictBody>(body.clone()) {
            Ok(verdict) if status.is_success() || !verdict.success => verdict.try_into(),
            Ok(_) => Err(ValidatorError::Status {
                status: status.as_u16(),
                message: None,
            }),
            Err(e) if status.is_success() => Err(ValidatorError::InvalidResponse(e.to_string())),
            Err(_) => {
                let message = ["message", "error", "msg"]
                    .iter()
                    .find_map(|field| body.get(field).and_then(Value::as_str))
                    .map(str::to_string);
                warn!(%status, "validator error without verdict");
                Err(ValidatorError::Status {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::attendance::ClockType;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn request(kind: ClockType) -> ClockRequest {
        ClockRequest {
            kind,
            lat: 38.58,
            lng: -121.49,
            accuracy: Some(8.0),
            device_label: "linux x86_64".to_string(),
        }
    }

    async fn submit_against(
        template: ResponseTemplate,
    ) -> Option<Result<ClockVerdict, ValidatorError>> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return None;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/clock-event"))
            .respond_with(template)
            .mount(&server)
            .await;

        let client =
            ValidatorClient::new(&server.uri(), "clock-event", SecretString::from("anon-key"))
                .unwrap();
        Some(
            client
                .submit(&request(ClockType::In), &SecretString::from("a1"))
                .await,
        )
    }

    #[test]
    fn test_endpoint() {
        let client = ValidatorClient::new(
            "https://project.example.co",
            "/clock-event/",
            SecretString::from("k"),
        )
        .unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://project.example.co/functions/v1/clock-event"
        );
    }

    #[tokio::test]
    async fn test_submit_sends_bearer_and_payload() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/clock-event"))
            .and(header("authorization", "Bearer a1"))
            .and(header("apikey", "anon-key"))
            .and(body_json(json!({
                "type": "OUT",
                "lat": 38.58,
                "lng": -121.49,
                "accuracy": 8.0,
                "deviceLabel": "linux x86_64"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "eventId": "e9",
                "siteName": "Sacramento Yard",
                "siteId": "site-1",
                "timestamp": "2025-03-01T17:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ValidatorClient::new(&server.uri(), "clock-event", SecretString::from("anon-key"))
                .unwrap();
        let verdict = client
            .submit(&request(ClockType::Out), &SecretString::from("a1"))
            .await
            .unwrap();

        let ClockVerdict::Accepted(receipt) = verdict else {
            panic!("expected an accepted verdict, got {verdict:?}");
        };
        assert_eq!(receipt.event_id, "e9");
        assert_eq!(receipt.site_name, "Sacramento Yard");
    }

    #[tokio::test]
    async fn test_refusal_in_error_status_is_a_verdict() {
        let Some(result) = submit_against(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "errorCode": "OUT_OF_RANGE",
            "message": "You are 412m from the nearest site"
        })))
        .await
        else {
            return;
        };

        assert!(matches!(
            result.unwrap(),
            ClockVerdict::Refused { error_code: Some(code), message: Some(_) } if code == "OUT_OF_RANGE"
        ));
    }

    #[tokio::test]
    async fn test_error_status_without_verdict() {
        let Some(result) = submit_against(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })),
        )
        .await
        else {
            return;
        };

        assert!(matches!(
            result.unwrap_err(),
            ValidatorError::Status { status: 500, message: Some(m) } if m == "boom"
        ));
    }

    #[tokio::test]
    async fn test_error_status_with_empty_body() {
        let Some(result) = submit_against(ResponseTemplate::new(502)).await else {
            return;
        };

        assert!(matches!(
            result.unwrap_err(),
            ValidatorError::Status {
                status: 502,
                message: None
            }
        ));
    }

    #[tokio::test]
    async fn test_incomplete_success_is_invalid() {
        let Some(result) = submit_against(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true })),
        )
        .await
        else {
            return;
        };

        assert!(matches!(
            result.unwrap_err(),
            ValidatorError::InvalidResponse(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_validator_is_transport() {
        let client =
            ValidatorClient::new("http://127.0.0.1:9", "clock-event", SecretString::from("k"))
                .unwrap();
        let err = client
            .submit(&request(ClockType::In), &SecretString::from("a1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidatorError::Transport(_)));
    }
}
