use crate::domain::model::Payload;
use crate::domain::ports::Delivery;
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Logs the payload instead of calling an API.
#[derive(Debug, Clone, Default)]
pub struct LogDelivery;

#[async_trait]
impl Delivery for LogDelivery {
    async fn deliver(&self, payload: &Payload) -> Result<()> {
        let json = serde_json::to_string(payload)?;
        tracing::info!(
            company_id = %payload.header.tenant_id,
            records = payload.records.len(),
            "Payload ready for delivery"
        );
        tracing::debug!("JSON payload {}", json);
        Ok(())
    }
}

/// POSTs the payload as JSON to a downstream endpoint.
#[derive(Debug, Clone)]
pub struct HttpDelivery {
    client: Client,
    endpoint: String,
}

impl HttpDelivery {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    async fn deliver(&self, payload: &Payload) -> Result<()> {
        tracing::debug!("Making API request to: {}", self.endpoint);
        let response = self.client.post(&self.endpoint).json(payload).send().await?;
        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImportError::DeliveryError {
                message: format!("{} returned {}: {}", self.endpoint, status, body),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Record;
    use httpmock::prelude::*;

    fn payload() -> Payload {
        let mut payload = Payload::new("ACME");
        payload.records.push(Record {
            transaction_id: "T1".to_string(),
            transaction_date: "2024-01-01".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
        });
        payload
    }

    #[tokio::test]
    async fn test_http_delivery_posts_payload() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/records").json_body(serde_json::json!({
                "header": {"companyID": "ACME"},
                "record": [{
                    "transactionID": "T1",
                    "transactionDate": "2024-01-01",
                    "firstName": "Jane",
                    "lastName": "Doe"
                }]
            }));
            then.status(201);
        });

        HttpDelivery::new(server.url("/records"))
            .deliver(&payload())
            .await
            .unwrap();

        api_mock.assert();
    }

    #[tokio::test]
    async fn test_http_delivery_rejects_error_status() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/records");
            then.status(500).body("database unavailable");
        });

        let err = HttpDelivery::new(server.url("/records"))
            .deliver(&payload())
            .await
            .unwrap_err();

        api_mock.assert();
        match err {
            ImportError::DeliveryError { message } => {
                assert!(message.contains("500"));
                assert!(message.contains("database unavailable"));
            }
            other => panic!("expected delivery error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_log_delivery_always_succeeds() {
        assert!(LogDelivery.deliver(&payload()).await.is_ok());
    }
}
