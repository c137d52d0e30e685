//! Deposit endpoints

use super::{currency_code, list_request, path_id, positive_amount, ListParams};
use crate::client::PayBridgeClient;
use paybridge_http::ApiResponse;
use paybridge_types::{IntoMoney, Money, PayBridgeResult};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// Body of `POST /deposits`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateDeposit {
    pub amount: Money,
    pub currency: String,
    /// Funding method such as `pix` or `bank_transfer`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Caller reference, echoed back by the API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl CreateDeposit {
    /// Amount must be positive; currency is a three-letter code
    pub fn new(amount: impl IntoMoney, currency: &str) -> PayBridgeResult<Self> {
        Ok(Self {
            amount: positive_amount("amount", amount)?,
            currency: currency_code("currency", currency)?,
            method: None,
            description: None,
            external_id: None,
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

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }
}

/// Deposit endpoints
pub struct DepositEndpoints<'a> {
    client: &'a PayBridgeClient,
}

impl<'a> DepositEndpoints<'a> {
    pub fn new(client: &'a PayBridgeClient) -> Self {
        Self { client }
    }

    /// Create a deposit
    #[instrument(skip(self))]
    pub async fn create(&self, deposit: &CreateDeposit) -> PayBridgeResult<ApiResponse<Value>> {
        debug!("Creating deposit of {} {}", deposit.amount, deposit.currency);
        self.client.post("/deposits", deposit).await
    }

    /// Get one deposit by id
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> PayBridgeResult<ApiResponse<Value>> {
        let id = path_id("id", id)?;
        self.client.get(&format!("/deposits/{}", id), &[]).await
    }

    /// List deposits, newest first
    #[instrument(skip(self))]
    pub async fn list(&self, params: &ListParams) -> PayBridgeResult<ApiResponse<Value>> {
        self.client.request(list_request("/deposits", params)).await
    }
}
