//! Return request endpoints.

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shoplink_core::{
    AccountId, Email, OrderId, OrderItemId, Price, RefundMethod, ReturnOption, VariantId,
};

use super::{ApiClient, ApiError, required};

/// An order line that can still be returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnableItem {
    pub order_item_id: OrderItemId,
    #[serde(default)]
    pub product_variant_id: Option<VariantId>,
    pub product_name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub color: String,
    pub quantity: i32,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A line chosen for return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnSelection {
    pub order_item_id: OrderItemId,
    pub quantity: i32,
}

/// Body of `POST return-requests/checkout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnCheckoutRequest {
    pub account_id: AccountId,
    pub order_id: OrderId,
    pub selected_items: Vec<ReturnSelection>,
}

/// Server-issued return session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnCheckoutSession {
    pub return_checkout_session_id: String,
    pub order_id: OrderId,
    #[serde(default)]
    pub items: Vec<ReturnableItem>,
    #[serde(default)]
    pub refund_methods: Vec<RefundMethod>,
}

/// A file attached to a return request.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for MediaAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaAttachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything the customer fills in on the final return step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSubmission {
    pub email: String,
    pub return_reason: String,
    pub return_option: ReturnOption,
    pub return_description: String,
    pub refund_method: RefundMethod,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_account_name: Option<String>,
    pub media: Vec<MediaAttachment>,
}

impl ApiClient {
    /// Lines of an order that are eligible for return.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(order_id = %order_id, account_id = %account_id))]
    pub async fn returnable_items(
        &self,
        order_id: OrderId,
        account_id: AccountId,
    ) -> Result<Vec<ReturnableItem>, ApiError> {
        let mut url = self.url("return-requests/order-items")?;
        url.query_pairs_mut()
            .append_pair("orderId", &order_id.to_string())
            .append_pair("accountId", &account_id.to_string());
        let items: Option<Vec<ReturnableItem>> =
            self.send_enveloped(self.request(Method::GET, url)).await?;
        Ok(items.unwrap_or_default())
    }

    /// Open a return session for the chosen lines.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, is rejected, or carries no session.
    #[instrument(skip_all, fields(order_id = %request.order_id, lines = request.selected_items.len()))]
    pub async fn create_return_checkout(
        &self,
        request: &ReturnCheckoutRequest,
    ) -> Result<ReturnCheckoutSession, ApiError> {
        let url = self.url("return-requests/checkout")?;
        let session = self
            .send_enveloped(self.request(Method::POST, url).json(request))
            .await?;
        required(session, "return checkout")
    }

    /// Submit the final return request as a multipart form.
    ///
    /// The email must already be validated by the caller.
    ///
    /// # Errors
    ///
    /// Returns error if a media part is malformed, or the request fails or is
    /// rejected.
    #[instrument(skip_all, fields(session = %session_id, media = submission.media.len()))]
    pub async fn submit_return_request(
        &self,
        session_id: &str,
        email: &Email,
        submission: &ReturnSubmission,
    ) -> Result<(), ApiError> {
        let url = self.url("return-requests/submit-return-request")?;

        let mut form = Form::new()
            .text("returnCheckoutSessionId", session_id.to_string())
            .text("email", email.to_string())
            .text("returnReason", submission.return_reason.clone())
            .text("returnOption", submission.return_option.as_str())
            .text("returnDescription", submission.return_description.clone())
            .text("refundMethod", submission.refund_method.as_str());

        let bank_fields = [
            ("bankName", &submission.bank_name),
            ("bankAccountNumber", &submission.bank_account_number),
            ("bankAccountName", &submission.bank_account_name),
        ];
        for (name, value) in bank_fields {
            if let Some(value) = value {
                form = form.text(name, value.clone());
            }
        }

        for media in &submission.media {
            let part = Part::bytes(media.bytes.clone())
                .file_name(media.file_name.clone())
                .mime_str(&media.content_type)?;
            form = form.part("mediaFiles", part);
        }

        self.send_unit(self.request(Method::POST, url).multipart(form))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::api::tests::signed_in_client;

    #[tokio::test]
    async fn test_returnable_items_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/return-requests/order-items")
                    .query_param("orderId", "5")
                    .query_param("accountId", "7");
                then.status(200).json_body(json!({
                    "data": [{
                        "orderItemId": 51,
                        "productName": "Quần jean",
                        "quantity": 2,
                        "price": 90000
                    }],
                    "status": true,
                    "message": ""
                }));
            })
            .await;

        let items = signed_in_client(&server)
            .returnable_items(OrderId::new(5), AccountId::new(7))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_submit_return_sends_multipart() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/return-requests/submit-return-request")
                    .header_exists("content-type")
                    .body_contains("rcs_9")
                    .body_contains("Vietcombank")
                    .body_contains("filename=\"proof.jpg\"");
                then.status(200).json_body(json!({"status": true, "message": "Submitted"}));
            })
            .await;

        let submission = ReturnSubmission {
            email: "an@example.com".to_string(),
            return_reason: "Wrong size".to_string(),
            return_option: ReturnOption::Refund,
            return_description: "Too small".to_string(),
            refund_method: RefundMethod::BankTransfer,
            bank_name: Some("Vietcombank".to_string()),
            bank_account_number: Some("0123456789".to_string()),
            bank_account_name: Some("NGUYEN VAN AN".to_string()),
            media: vec![MediaAttachment {
                file_name: "proof.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
                bytes: vec![0xFF, 0xD8, 0xFF],
            }],
        };
        signed_in_client(&server)
            .submit_return_request(
                "rcs_9",
                &Email::parse("an@example.com").unwrap(),
                &submission,
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
