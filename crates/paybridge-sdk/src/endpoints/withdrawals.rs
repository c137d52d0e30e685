//! Withdrawal endpoints

use super::{currency_code, invalid, list_request, path_id, positive_amount, ListParams};
use crate::client::PayBridgeClient;
use paybridge_http::ApiResponse;
use paybridge_types::{IntoMoney, Money, PayBridgeResult};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

/// Body of `POST /withdrawals`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateWithdrawal {
    pub amount: Money,
    pub currency: String,
    /// PIX key, bank account id or wallet address, depending on `method`
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreateWithdrawal {
    pub fn new(amount: impl IntoMoney, currency: &str, destination: impl Into<String>) -> PayBridgeResult<Self> {
        let destination = destination.into();
        if destination.trim().is_empty() {
            return Err(invalid("destination", "destination is required"));
        }
        Ok(Self {
            amount: positive_amount("amount", amount)?,
            currency: currency_code("currency", currency)?,
            destination,
            method: None,
            description: None,
        })
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Withdrawal endpoints
pub struct WithdrawalEndpoints<'a> {
    client: &'a PayBridgeClient,
}

impl<'a> WithdrawalEndpoints<'a> {
    pub fn new(client: &'a PayBridgeClient) -> Self {
        Self { client }
    }

    /// Request a withdrawal
    #[instrument(skip(self))]
    pub async fn create(&self, withdrawal: &CreateWithdrawal) -> PayBridgeResult<ApiResponse<Value>> {
        debug!("Requesting withdrawal of {} {}", withdrawal.amount, withdrawal.currency);
        self.client.post("/withdrawals", withdrawal).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> PayBridgeResult<ApiResponse<Value>> {
        let id = path_id("id", id)?;
        self.client.get(&format!("/withdrawals/{}", id), &[]).await
    }

    #[instrument(skip(self))]
    pub async fn list(&self, params: &ListParams) -> PayBridgeResult<ApiResponse<Value>> {
        self.client.request(list_request("/withdrawals", params)).await
    }

    /// Cancel a withdrawal that has not been processed yet
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: &str, reason: Option<&str>) -> PayBridgeResult<ApiResponse<Value>> {
        let id = path_id("id", id)?;
        let body = match reason {
            Some(reason) => json!({ "reason": reason }),
            None => json!({}),
        };
        let response = self.client.post(&format!("/withdrawals/{}/cancel", id), &body).await?;
        info!("Cancelled withdrawal {}", id);
        Ok(response)
    }
}
