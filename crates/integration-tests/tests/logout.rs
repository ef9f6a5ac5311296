//! Logout in one context resets every component in every context.

#![allow(clippy::unwrap_used)]

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

use shoplink_integration_tests::{Site, cart_line, eventually, ok};
use shoplink_storefront::checkout::CHECKOUT_SESSION_KEY;
use shoplink_storefront::navigation::Navigation;

#[tokio::test]
async fn logout_resets_cart_notifications_and_checkout_everywhere() {
    let site = Site::start().await;
    site.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/cart/7");
            then.status(200).json_body(ok(json!([cart_line(1, 2, 100_000.0)])));
        })
        .await;
    site.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/notifications/user/7");
            then.status(200).json_body(ok(json!([
                {"title": "Chào mừng", "message": "Cảm ơn bạn đã đăng ký"}
            ])));
        })
        .await;
    site.server
        .mock_async(|when, then| {
            when.method(POST).path("/api/checkout");
            then.status(200).json_body(json!({
                "checkOutSessionId": "cs-1",
                "selectedItems": [cart_line(1, 2, 100_000.0)],
                "shippingAddresses": [],
                "paymentMethods": ["COD"],
                "subTotal": 200_000.0,
                "shippingCost": 0.0
            }));
        })
        .await;

    let a = site.signed_in_tab();
    let b = site.tab();

    let cart = b.cart();
    cart.load().await.unwrap();
    let checkout = b.checkout();
    checkout
        .begin(&[shoplink_core::VariantId::new(1)])
        .await
        .unwrap();
    let notifications = b.notifications();
    notifications.start().await;
    notifications.receive("Đơn hàng #5", "Đang giao");
    assert_eq!(notifications.notification_count(), 2);
    assert!(!cart.is_empty());

    a.logout().unwrap();

    let (cart_ref, notifications_ref) = (&cart, &notifications);
    eventually("components to reset", || async move {
        cart_ref.is_empty()
            && notifications_ref.notification_count() == 0
            && notifications_ref.transient_notifications().is_empty()
    })
    .await;

    assert!(!b.session().is_authenticated());
    assert!(site.storage.get(CHECKOUT_SESSION_KEY).unwrap().is_none());
    assert!(checkout.current().unwrap().is_none());
    assert_eq!(b.navigator().current(), Navigation::Login { return_to: None });
    assert_eq!(a.navigator().current(), Navigation::Login { return_to: None });

    notifications.stop().await;
}
