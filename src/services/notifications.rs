use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::{instrument, warn};

use crate::entities::order;

/// Fire-and-forget email relay. A failed or slow send is logged and reported
/// as `false`; it never fails the operation that triggered it.
#[derive(Clone)]
pub struct EmailNotifier {
    http: reqwest::Client,
    relay_url: String,
    from: String,
    timeout: Duration,
}

impl EmailNotifier {
    pub fn new(relay_url: String, from: String, timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            relay_url,
            from,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn send_order_confirmation(&self, to: &str, order: &order::Model) -> bool {
        let subject = format!("Order {} confirmed", order.order_number);
        let body = format!(
            "Thanks for your purchase!\n\nOrder {} has been confirmed.\nTotal: {}\n",
            order.order_number,
            format_amount(order.total)
        );
        self.send(to, &subject, &body).await
    }

    #[instrument(skip(self), fields(to = %to))]
    pub async fn send_password_reset_otp(&self, to: &str, otp: &str, ttl_minutes: i64) -> bool {
        let subject = "Your password reset code".to_string();
        let body = format!(
            "Your one-time password reset code is {}. It expires in {} minutes.\n",
            otp, ttl_minutes
        );
        self.send(to, &subject, &body).await
    }

    pub async fn send_shipping_update(
        &self,
        to: &str,
        order_number: &str,
        tracking_number: &str,
    ) -> bool {
        let subject = format!("Order {} shipped", order_number);
        let body = format!(
            "Your order {} is on its way. Tracking number: {}\n",
            order_number, tracking_number
        );
        self.send(to, &subject, &body).await
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        let request = self
            .http
            .post(&self.relay_url)
            .timeout(self.timeout)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "body": body,
            }))
            .send();

        match request.await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("email relay returned {}", response.status());
                false
            }
            Err(e) => {
                warn!("email send failed: {}", e);
                false
            }
        }
    }
}

/// Formats an amount for customer-facing copy.
fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}
