//! Toast eviction timing.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use url::Url;

use shoplink_storefront::Storefront;
use shoplink_storefront::config::ClientConfig;

#[tokio::test(start_paused = true)]
async fn toast_expires_after_sixty_seconds_while_history_keeps_it() {
    let base = Url::parse("http://127.0.0.1:9/api/").unwrap();
    let tab = Storefront::new(ClientConfig::for_base_url(base)).unwrap();
    let center = tab.notifications();
    assert_eq!(tab.config().toast_ttl, Duration::from_secs(60));

    center.receive("Khuyến mãi", "Giảm 20% hôm nay");
    let persistent = center.persistent_notifications();
    tokio::time::sleep(Duration::from_secs(30)).await;
    center.receive("Đơn hàng #9", "Đã xác nhận");

    tokio::time::sleep(Duration::from_secs(31)).await;
    let titles: Vec<_> = center
        .transient_notifications()
        .into_iter()
        .map(|entry| entry.title)
        .collect();
    assert_eq!(titles, ["Đơn hàng #9"]);
    assert_eq!(center.persistent_notifications().last(), persistent.last());
    assert_eq!(center.notification_count(), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(center.transient_notifications().is_empty());
    assert_eq!(center.notification_count(), 2);
}
