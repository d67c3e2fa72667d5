use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{error, instrument};

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// Order registered with the payment gateway before the customer is sent to
/// the hosted checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// Client for the external payment gateway. Amounts cross the wire in minor
/// units; callback authenticity is checked with an HMAC over
/// `"{gateway_order_id}|{gateway_payment_id}"`.
#[derive(Clone)]
pub struct PaymentGatewayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl PaymentGatewayClient {
    pub fn new(base_url: String, key_id: String, key_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            key_id,
            key_secret,
        }
    }

    /// Public key id, exposed to the storefront so it can open the hosted
    /// checkout.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    #[instrument(skip(self), fields(receipt = %receipt))]
    pub async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let minor_units = to_minor_units(amount).ok_or_else(|| {
            ServiceError::InvalidOperation(format!("Amount {} cannot be charged", amount))
        })?;

        let response = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": minor_units,
                "currency": currency,
                "receipt": receipt,
            }))
            .send()
            .await
            .map_err(|e| {
                error!("gateway request failed: {}", e);
                ServiceError::ExternalServiceError("Payment gateway unreachable".to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!("gateway rejected order creation: {}", status);
            return Err(ServiceError::ExternalServiceError(format!(
                "Payment gateway returned {}",
                status
            )));
        }

        response.json::<GatewayOrder>().await.map_err(|e| {
            error!("gateway response malformed: {}", e);
            ServiceError::ExternalServiceError("Malformed gateway response".to_string())
        })
    }

    /// Constant-time check of a payment callback signature.
    pub fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let mut mac = match HmacSha256::new_from_slice(self.key_secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(format!("{}|{}", gateway_order_id, gateway_payment_id).as_bytes());
        mac.verify_slice(&provided).is_ok()
    }
}

/// Converts a major-unit amount to gateway minor units. Rejects amounts that
/// do not fit or are not positive.
fn to_minor_units(amount: Decimal) -> Option<i64> {
    if amount <= Decimal::ZERO {
        return None;
    }
    (amount * dec!(100)).round().to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PaymentGatewayClient {
        PaymentGatewayClient::new(
            "http://localhost:0".to_string(),
            "key_test".to_string(),
            "secret_test".to_string(),
        )
    }

    fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_accepted() {
        let c = client();
        let sig = sign("secret_test", "order_1", "pay_1");
        assert!(c.verify_signature("order_1", "pay_1", &sig));
    }

    #[test]
    fn tampered_signature_rejected() {
        let c = client();
        let sig = sign("secret_test", "order_1", "pay_1");
        // flip one hex digit
        let mut tampered: Vec<char> = sig.chars().collect();
        tampered[0] = if tampered[0] == '0' { '1' } else { '0' };
        let tampered: String = tampered.into_iter().collect();
        assert!(!c.verify_signature("order_1", "pay_1", &tampered));
    }

    #[test]
    fn signature_bound_to_payment_id() {
        let c = client();
        let sig = sign("secret_test", "order_1", "pay_1");
        assert!(!c.verify_signature("order_1", "pay_2", &sig));
    }

    #[test]
    fn non_hex_signature_rejected() {
        let c = client();
        assert!(!c.verify_signature("order_1", "pay_1", "not-hex!"));
    }

    #[test]
    fn minor_unit_conversion() {
        assert_eq!(to_minor_units(dec!(499.00)), Some(49900));
        assert_eq!(to_minor_units(dec!(0.5)), Some(50));
        assert_eq!(to_minor_units(dec!(0)), None);
        assert_eq!(to_minor_units(dec!(-10)), None);
    }
}
