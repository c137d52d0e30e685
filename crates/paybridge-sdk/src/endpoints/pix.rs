//! PIX endpoints
//!
//! Keys are passed through as given; checking CPF/CNPJ digits is left to
//! the API.

use super::{invalid, list_request, path_id, positive_amount, ListParams};
use crate::client::PayBridgeClient;
use paybridge_http::ApiResponse;
use paybridge_types::{IntoMoney, Money, PayBridgeResult};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Longest QR code lifetime the API accepts, in seconds
pub const MAX_QR_CODE_EXPIRY_SECS: u64 = 86_400;

/// Kind of PIX key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixKeyType {
    Cpf,
    Cnpj,
    Email,
    Phone,
    /// Random key generated by the bank (EVP)
    Random,
}

/// Body of `POST /pix/keys`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePixKey {
    #[serde(rename = "type")]
    pub key_type: PixKeyType,
    /// Absent for random keys, which the API generates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl CreatePixKey {
    pub fn new(key_type: PixKeyType, key: impl Into<String>) -> PayBridgeResult<Self> {
        let key = key.into();
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid("key", "key is required"));
        }
        Ok(Self {
            key_type,
            key: Some(key.to_string()),
        })
    }

    /// Ask the API to generate a random key
    pub fn random() -> Self {
        Self {
            key_type: PixKeyType::Random,
            key: None,
        }
    }
}

/// Body of `POST /pix/payments`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixPayment {
    /// Recipient key
    pub key: String,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PixPayment {
    pub fn new(key: impl Into<String>, amount: impl IntoMoney) -> PayBridgeResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(invalid("key", "key is required"));
        }
        Ok(Self {
            key,
            amount: positive_amount("amount", amount)?,
            description: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Body of `POST /pix/qrcode`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixQrCode {
    /// Open amount when `None`; the payer chooses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Seconds until the code stops accepting payments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl PixQrCode {
    /// Code for a fixed amount
    pub fn fixed(amount: impl IntoMoney) -> PayBridgeResult<Self> {
        Ok(Self {
            amount: Some(positive_amount("amount", amount)?),
            description: None,
            expires_in: None,
        })
    }

    /// Code the payer fills in
    pub fn open() -> Self {
        Self {
            amount: None,
            description: None,
            expires_in: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_expiry(mut self, secs: u64) -> PayBridgeResult<Self> {
        if secs == 0 || secs > MAX_QR_CODE_EXPIRY_SECS {
            return Err(invalid(
                "expires_in",
                format!("expires_in must be between 1 and {}", MAX_QR_CODE_EXPIRY_SECS),
            ));
        }
        self.expires_in = Some(secs);
        Ok(self)
    }
}

/// PIX endpoints
pub struct PixEndpoints<'a> {
    client: &'a PayBridgeClient,
}

impl<'a> PixEndpoints<'a> {
    pub fn new(client: &'a PayBridgeClient) -> Self {
        Self { client }
    }

    /// Register a key on the account
    #[instrument(skip(self))]
    pub async fn create_key(&self, key: &CreatePixKey) -> PayBridgeResult<ApiResponse<Value>> {
        debug!("Registering {:?} PIX key", key.key_type);
        self.client.post("/pix/keys", key).await
    }

    #[instrument(skip(self))]
    pub async fn list_keys(&self, params: &ListParams) -> PayBridgeResult<ApiResponse<Value>> {
        self.client.request(list_request("/pix/keys", params)).await
    }

    #[instrument(skip(self))]
    pub async fn delete_key(&self, id: &str) -> PayBridgeResult<ApiResponse<Value>> {
        let id = path_id("id", id)?;
        let response = self.client.delete(&format!("/pix/keys/{}", id)).await?;
        info!("Deleted PIX key {}", id);
        Ok(response)
    }

    /// Send an instant payment
    #[instrument(skip(self))]
    pub async fn send_payment(&self, payment: &PixPayment) -> PayBridgeResult<ApiResponse<Value>> {
        debug!("Sending PIX payment of {}", payment.amount);
        self.client.post("/pix/payments", payment).await
    }

    #[instrument(skip(self))]
    pub async fn get_payment(&self, id: &str) -> PayBridgeResult<ApiResponse<Value>> {
        let id = path_id("id", id)?;
        self.client.get(&format!("/pix/payments/{}", id), &[]).await
    }

    /// Generate a QR code for receiving a payment
    #[instrument(skip(self))]
    pub async fn create_qr_code(&self, code: &PixQrCode) -> PayBridgeResult<ApiResponse<Value>> {
        self.client.post("/pix/qrcode", code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::mock_client;
    use paybridge_http::{HttpResponse, Method};
    use serde_json::json;

    #[test]
    fn test_key_serialization() {
        let key = CreatePixKey::new(PixKeyType::Email, " ops@example.com ").unwrap();
        assert_eq!(
            serde_json::to_value(&key).unwrap(),
            json!({"type": "email", "key": "ops@example.com"})
        );
        assert_eq!(serde_json::to_value(CreatePixKey::random()).unwrap(), json!({"type": "random"}));
        assert!(CreatePixKey::new(PixKeyType::Cpf, "").is_err());
    }

    #[test]
    fn test_qr_code_options() {
        let code = PixQrCode::fixed("49.90").unwrap().with_expiry(600).unwrap();
        assert_eq!(
            serde_json::to_value(&code).unwrap(),
            json!({"amount": "49.9", "expires_in": 600})
        );
        assert!(PixQrCode::open().with_expiry(0).is_err());
        assert!(PixQrCode::open().with_expiry(MAX_QR_CODE_EXPIRY_SECS + 1).is_err());
        assert_eq!(serde_json::to_value(PixQrCode::open()).unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_key_lifecycle() {
        let (client, transport) = mock_client();
        transport.push_json(201, json!({"id": "key_1"}));
        transport.push_json(200, json!({"data": [{"id": "key_1"}]}));
        transport.push_response(HttpResponse::new(204, ""));

        client
            .pix()
            .create_key(&CreatePixKey::new(PixKeyType::Phone, "+5511999999999").unwrap())
            .await
            .unwrap();
        client.pix().list_keys(&ListParams::default()).await.unwrap();
        client.pix().delete_key("key_1").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].path, "/pix/keys");
        assert_eq!(requests[1].method, Method::GET);
        assert_eq!(requests[2].method, Method::DELETE);
        assert_eq!(requests[2].path, "/pix/keys/key_1");
    }

    #[tokio::test]
    async fn test_payment_and_qr_code() {
        let (client, transport) = mock_client();
        transport.push_json(201, json!({"id": "pay_1", "end_to_end_id": "E123"}));
        transport.push_json(200, json!({"id": "pay_1", "status": "settled"}));
        transport.push_json(201, json!({"payload": "000201..."}));

        let payment = PixPayment::new("ops@example.com", "10.00")
            .unwrap()
            .with_description("invoice 42");
        client.pix().send_payment(&payment).await.unwrap();
        let status = client.pix().get_payment("pay_1").await.unwrap();
        assert_eq!(status.data["status"], "settled");
        client.pix().create_qr_code(&PixQrCode::open()).await.unwrap();

        let requests = transport.requests();
        assert_eq!(
            requests[0].body,
            Some(json!({"key": "ops@example.com", "amount": "10", "description": "invoice 42"}))
        );
        assert_eq!(requests[1].path, "/pix/payments/pay_1");
        assert_eq!(requests[2].path, "/pix/qrcode");
    }
}
