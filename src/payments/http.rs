use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::PaymentConfig;
use crate::errors::ServiceError;

use super::{
    CheckoutSessionParams, GatewayCustomer, GatewayPrice, GatewayProduct, HostedSession,
    PaymentGateway,
};

/// REST client for the payment provider.
///
/// Requests are form-encoded with bearer-key auth. No per-request timeout is
/// configured beyond the transport defaults.
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: String,
}

impl HttpPaymentGateway {
    pub fn new(cfg: &PaymentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            secret_key: cfg.secret_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, ServiceError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalService(format!("request to {path} failed: {e}")))?;

        Self::decode(path, response).await
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%path, %status, %body, "payment provider rejected request");
            return Err(ServiceError::ExternalService(format!(
                "{path} returned {status}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            ServiceError::ExternalService(format!("invalid response from {path}: {e}"))
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self))]
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
    ) -> Result<GatewayCustomer, ServiceError> {
        let form = vec![
            ("email".to_string(), email.to_string()),
            ("name".to_string(), name.to_string()),
        ];
        let res: IdResponse = self.post_form("/v1/customers", &form).await?;
        Ok(GatewayCustomer { id: res.id })
    }

    #[instrument(skip(self))]
    async fn delete_customer(&self, customer_id: &str) -> Result<(), ServiceError> {
        let path = format!("/v1/customers/{customer_id}");
        let response = self
            .http
            .delete(self.url(&path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalService(format!("request to {path} failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::ExternalService(format!(
                "{path} returned {status}"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_product(&self, name: &str) -> Result<GatewayProduct, ServiceError> {
        let form = vec![("name".to_string(), name.to_string())];
        let res: IdResponse = self.post_form("/v1/products", &form).await?;
        Ok(GatewayProduct { id: res.id })
    }

    #[instrument(skip(self))]
    async fn create_price(
        &self,
        product_id: &str,
        currency: &str,
        unit_amount: i64,
    ) -> Result<GatewayPrice, ServiceError> {
        let form = vec![
            ("product".to_string(), product_id.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            ("unit_amount".to_string(), unit_amount.to_string()),
        ];
        let res: IdResponse = self.post_form("/v1/prices", &form).await?;
        Ok(GatewayPrice { id: res.id })
    }

    #[instrument(skip(self))]
    async fn archive_price(&self, price_id: &str) -> Result<(), ServiceError> {
        let path = format!("/v1/prices/{price_id}");
        let form = vec![("active".to_string(), "false".to_string())];
        let _: IdResponse = self.post_form(&path, &form).await?;
        Ok(())
    }

    #[instrument(skip(self, params), fields(order_id = %params.client_reference_id))]
    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> Result<HostedSession, ServiceError> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("customer".to_string(), params.customer_id),
            (
                "client_reference_id".to_string(),
                params.client_reference_id,
            ),
            ("success_url".to_string(), params.success_url),
            ("cancel_url".to_string(), params.cancel_url),
        ];

        for (i, item) in params.line_items.iter().enumerate() {
            form.push((format!("line_items[{i}][price]"), item.price_id.clone()));
            form.push((
                format!("line_items[{i}][quantity]"),
                item.quantity.to_string(),
            ));
        }

        let res: SessionResponse = self.post_form("/v1/checkout/sessions", &form).await?;
        Ok(HostedSession {
            id: res.id,
            url: res.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::SessionLineItem;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> HttpPaymentGateway {
        HttpPaymentGateway::new(&PaymentConfig {
            api_base: server.uri(),
            secret_key: "sk_test_123".to_string(),
            success_url: "http://localhost/success".to_string(),
            cancel_url: "http://localhost/cancel".to_string(),
        })
    }

    #[tokio::test]
    async fn create_customer_returns_the_provider_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .and(body_string_contains("email=ada%40example.com"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "cus_42"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let customer = gateway
            .create_customer("ada@example.com", "Ada")
            .await
            .expect("customer created");

        assert_eq!(customer.id, "cus_42");
    }

    #[tokio::test]
    async fn provider_errors_surface_as_external_service_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .respond_with(
                ResponseTemplate::new(402)
                    .set_body_json(serde_json::json!({"error": "card_declined"})),
            )
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let err = gateway
            .create_customer("ada@example.com", "Ada")
            .await
            .expect_err("provider error expected");

        assert!(matches!(err, ServiceError::ExternalService(_)), "{err:?}");
        assert!(err.to_string().contains("402"), "{err}");
    }

    #[tokio::test]
    async fn checkout_session_sends_indexed_line_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            // form encoding of line_items[0][price]
            .and(body_string_contains("line_items%5B0%5D%5Bprice%5D=price_eur"))
            .and(body_string_contains("line_items%5B0%5D%5Bquantity%5D=2"))
            .and(body_string_contains("client_reference_id=order-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_1",
                "url": "https://pay.example/cs_test_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let session = gateway
            .create_checkout_session(CheckoutSessionParams {
                customer_id: "cus_42".to_string(),
                client_reference_id: "order-1".to_string(),
                line_items: vec![SessionLineItem {
                    price_id: "price_eur".to_string(),
                    quantity: 2,
                }],
                success_url: "http://localhost/success".to_string(),
                cancel_url: "http://localhost/cancel".to_string(),
            })
            .await
            .expect("session created");

        assert_eq!(session.id, "cs_test_1");
        assert_eq!(session.url, "https://pay.example/cs_test_1");
    }

    #[tokio::test]
    async fn delete_customer_tolerates_success_without_body_fields() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/customers/cus_42"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "cus_42", "deleted": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        gateway
            .delete_customer("cus_42")
            .await
            .expect("delete succeeds");
    }
}
