//! REST client for the SMS gateway backend

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::core::error::ClientError;
use crate::core::models::{
    ApiKey, LoginResponse, Message, NewSim, NewTransaction, OneOrMany, RegisterRequest, SendSms,
    Sim, SimUpdate, Transaction, User, Wallet,
};
use crate::utils::truncate_string;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Every backend call the dashboard and CLI make
///
/// Views and flows hold an `Arc<dyn GatewayApi>` so they can be exercised
/// against a mock instead of a live backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayApi: Send + Sync {
    /// Replace (or drop) the bearer token attached to requests
    fn set_token(&self, token: Option<String>);
    fn has_token(&self) -> bool;

    async fn register(&self, request: &RegisterRequest) -> Result<User, ClientError>;
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError>;
    async fn current_user(&self) -> Result<User, ClientError>;

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, ClientError>;
    async fn create_api_key(&self, name: &str) -> Result<ApiKey, ClientError>;
    async fn delete_api_key(&self, id: i64) -> Result<(), ClientError>;

    async fn get_wallet(&self) -> Result<Wallet, ClientError>;
    async fn list_transactions(&self) -> Result<Vec<Transaction>, ClientError>;
    async fn create_transaction(&self, request: &NewTransaction) -> Result<Transaction, ClientError>;

    async fn list_sims(&self) -> Result<Vec<Sim>, ClientError>;
    async fn create_sim(&self, request: &NewSim) -> Result<Sim, ClientError>;
    async fn get_sim(&self, id: i64) -> Result<Sim, ClientError>;
    async fn update_sim(&self, id: i64, update: &SimUpdate) -> Result<Sim, ClientError>;
    async fn activate_sim(&self, id: i64) -> Result<Sim, ClientError>;
    async fn deactivate_sim(&self, id: i64) -> Result<Sim, ClientError>;
    async fn delete_sim(&self, id: i64) -> Result<(), ClientError>;

    async fn list_messages(&self) -> Result<Vec<Message>, ClientError>;
    async fn send_sms(&self, request: &SendSms) -> Result<Vec<Message>, ClientError>;
    async fn get_message(&self, id: i64) -> Result<Message, ClientError>;
}

/// HTTP implementation of [`GatewayApi`]
///
/// Cloning is cheap; clones share the connection pool and the token.
#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("smsgw-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);

        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and map the status; 401 drops the held token
    async fn execute(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("backend rejected credentials, dropping session token");
            self.set_token(None);
            return Err(ClientError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = extract_detail(&body, status);
            tracing::debug!(status = status.as_u16(), %detail, "backend request failed");
            return Err(ClientError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = self.execute(builder).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Pull FastAPI's `detail` out of an error body, falling back to the raw text
fn extract_detail(body: &str, status: StatusCode) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| match value.get("detail") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        });

    match detail {
        Some(detail) => detail,
        None if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        None => truncate_string(body.trim(), 200),
    }
}

#[async_trait]
impl GatewayApi for GatewayClient {
    fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    fn has_token(&self) -> bool {
        self.token().is_some()
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, ClientError> {
        self.fetch(self.request(Method::POST, "/auth/register").json(request))
            .await
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let form = [("username", username), ("password", password)];
        self.fetch(self.request(Method::POST, "/auth/token").form(&form))
            .await
    }

    async fn current_user(&self) -> Result<User, ClientError> {
        self.fetch(self.request(Method::GET, "/auth/me")).await
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, ClientError> {
        self.fetch(self.request(Method::GET, "/api-keys")).await
    }

    async fn create_api_key(&self, name: &str) -> Result<ApiKey, ClientError> {
        self.fetch(self.request(Method::POST, "/api-keys").json(&json!({ "name": name })))
            .await
    }

    async fn delete_api_key(&self, id: i64) -> Result<(), ClientError> {
        self.execute(self.request(Method::DELETE, &format!("/api-keys/{}", id)))
            .await?;
        Ok(())
    }

    async fn get_wallet(&self) -> Result<Wallet, ClientError> {
        self.fetch(self.request(Method::GET, "/wallets")).await
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, ClientError> {
        self.fetch(self.request(Method::GET, "/wallets/transactions"))
            .await
    }

    async fn create_transaction(&self, request: &NewTransaction) -> Result<Transaction, ClientError> {
        let mut builder = self
            .request(Method::POST, "/wallets/transactions")
            .json(request);
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_HEADER, key);
        }
        self.fetch(builder).await
    }

    async fn list_sims(&self) -> Result<Vec<Sim>, ClientError> {
        self.fetch(self.request(Method::GET, "/sims/")).await
    }

    async fn create_sim(&self, request: &NewSim) -> Result<Sim, ClientError> {
        let mut builder = self.request(Method::POST, "/sims/").json(request);
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_HEADER, key);
        }
        self.fetch(builder).await
    }

    async fn get_sim(&self, id: i64) -> Result<Sim, ClientError> {
        self.fetch(self.request(Method::GET, &format!("/sims/{}", id)))
            .await
    }

    async fn update_sim(&self, id: i64, update: &SimUpdate) -> Result<Sim, ClientError> {
        self.fetch(
            self.request(Method::PATCH, &format!("/sims/{}", id))
                .json(update),
        )
        .await
    }

    async fn activate_sim(&self, id: i64) -> Result<Sim, ClientError> {
        self.fetch(self.request(Method::POST, &format!("/sims/{}/activate", id)))
            .await
    }

    async fn deactivate_sim(&self, id: i64) -> Result<Sim, ClientError> {
        self.fetch(self.request(Method::POST, &format!("/sims/{}/deactivate", id)))
            .await
    }

    async fn delete_sim(&self, id: i64) -> Result<(), ClientError> {
        self.execute(self.request(Method::DELETE, &format!("/sims/{}", id)))
            .await?;
        Ok(())
    }

    async fn list_messages(&self) -> Result<Vec<Message>, ClientError> {
        self.fetch(self.request(Method::GET, "/sms/")).await
    }

    async fn send_sms(&self, request: &SendSms) -> Result<Vec<Message>, ClientError> {
        let sent: OneOrMany<Message> = self
            .fetch(self.request(Method::POST, "/sms/send").json(request))
            .await?;
        Ok(sent.into())
    }

    async fn get_message(&self, id: i64) -> Result<Message, ClientError> {
        self.fetch(self.request(Method::GET, &format!("/sms/{}", id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{MessageStatus, TransactionKind};
    use rust_decimal::Decimal;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> GatewayClient {
        GatewayClient::new(&format!("{}/api/", server.uri()), Duration::from_secs(5)).unwrap()
    }

    fn sim_json(id: i64, active: bool) -> Value {
        json!({
            "id": id,
            "iccid": format!("ICC{}", id),
            "phone_number": "+15550100",
            "status": if active { "active" } else { "inactive" },
            "is_active": active,
            "expiry_date": "2030-01-01T00:00:00",
            "messages_used": 3,
            "messages_limit": 150
        })
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sims/"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([sim_json(1, true)])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.set_token(Some("tok-1".to_string()));

        let sims = client.list_sims().await.unwrap();
        assert_eq!(sims.len(), 1);
        assert_eq!(sims[0].messages_limit(), 150);
    }

    #[tokio::test]
    async fn test_login_is_form_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("username=ops%40example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt",
                "token_type": "bearer",
                "user": { "id": 1, "email": "ops@example.com", "username": "ops" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let login = client.login("ops@example.com", "hunter2").await.unwrap();
        assert_eq!(login.access_token, "jwt");
        assert_eq!(login.user.display_name(), "ops");
    }

    #[tokio::test]
    async fn test_unauthorized_drops_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Could not validate credentials" })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.set_token(Some("stale".to_string()));

        let err = client.current_user().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!client.has_token());
    }

    #[tokio::test]
    async fn test_error_detail_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sims/4/activate"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "detail": "SIM is already active" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/wallets"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client_for(&server).await;

        match client.activate_sim(4).await {
            Err(ClientError::Api { status, detail }) => {
                assert_eq!(status, 400);
                assert_eq!(detail, "SIM is already active");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match client.get_wallet().await {
            Err(ClientError::Api { status, detail }) => {
                assert_eq!(status, 502);
                assert_eq!(detail, "Bad Gateway");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_idempotency_header_on_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/wallets/transactions"))
            .and(header(IDEMPOTENCY_HEADER, "purchase-1"))
            .and(body_string_contains("\"type\":\"debit\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 9, "wallet_id": 1, "type": "debit", "amount": "25.00",
                "description": "SIM purchase", "status": "completed",
                "created_at": "2025-06-12T08:00:00"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let tx = client
            .create_transaction(&NewTransaction {
                kind: TransactionKind::Debit,
                amount: Decimal::new(25, 0),
                description: "SIM purchase".to_string(),
                idempotency_key: Some("purchase-1".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(tx.id, 9);
    }

    #[tokio::test]
    async fn test_send_posts_sim_ids_and_accepts_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sms/send"))
            .and(body_json(json!({
                "sim_ids": [4],
                "recipient_number": "+447700900123",
                "content": "hi"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 11, "recipient_number": "+447700900123", "sender_number": "+15550100",
                "content": "hi", "status": "sent", "direction": "outbound",
                "created_at": "2025-06-12T08:00:00"
            }])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let sent = client
            .send_sms(&SendSms {
                sim_ids: vec![4],
                recipient_number: "+447700900123".to_string(),
                content: "hi".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn test_delete_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/api-keys/3"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.delete_api_key(3).await.unwrap();
    }
}
