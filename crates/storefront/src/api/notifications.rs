//! Notification history endpoint.

use reqwest::Method;
use tracing::instrument;

use shoplink_core::{AccountId, NotificationItem};

use super::{ApiClient, ApiError};

impl ApiClient {
    /// Fetch the stored notifications of an account, in server order.
    ///
    /// Resolved against the notifications base URL rather than the API base.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn notification_history(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<NotificationItem>, ApiError> {
        let url = self.notifications_url(&format!("api/notifications/user/{account_id}"))?;
        let items: Option<Vec<NotificationItem>> =
            self.send_enveloped(self.request(Method::GET, url)).await?;
        Ok(items.unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::api::tests::signed_in_client;

    #[tokio::test]
    async fn test_history_uses_notifications_base() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/notifications/user/7");
                then.status(200).json_body(json!({
                    "data": [
                        {"id": 2, "title": "Đơn hàng", "message": "Đã giao", "createdAt": "2026-10-01T08:00:00Z"},
                        {"id": 1, "title": "Khuyến mãi", "message": "Giảm 10%"}
                    ],
                    "status": true,
                    "message": ""
                }));
            })
            .await;

        let items = signed_in_client(&server)
            .notification_history(AccountId::new(7))
            .await
            .unwrap();
        mock.assert_async().await;
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["Đơn hàng", "Khuyến mãi"]);
    }
}
