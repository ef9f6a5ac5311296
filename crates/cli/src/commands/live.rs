//! Push-backed commands.

use std::time::Duration;

use shoplink_core::NotificationEntry;
use shoplink_storefront::Storefront;
use shoplink_storefront::chat::Direction;
use shoplink_storefront::push::ConnectionState;

use super::CommandError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Print the history, then every notification pushed until Ctrl-C.
#[allow(clippy::print_stdout)]
pub async fn watch_notifications(storefront: &Storefront) {
    let center = storefront.notifications();
    center.start().await;

    let mut seen = center.persistent_notifications();
    for entry in seen.iter().rev() {
        print_entry(entry);
    }
    println!("Watching notifications, Ctrl-C to stop");

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    let mut tick = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = &mut interrupted => break,
            _ = tick.tick() => {
                let current = center.persistent_notifications();
                let fresh = current.len().saturating_sub(seen.len());
                for entry in current.iter().take(fresh).rev() {
                    print_entry(entry);
                }
                seen = current;
            }
        }
    }
    center.stop().await;
}

/// Send one chat message and print replies for `wait_secs` seconds.
///
/// # Errors
///
/// Returns an error if the message is blank or no session exists.
#[allow(clippy::print_stdout)]
pub async fn chat(storefront: &Storefront, message: &str, wait_secs: u64) -> Result<(), CommandError> {
    let chat = storefront.chat();
    let handle = chat.start().await;

    let wait = Duration::from_secs(wait_secs);
    let connected = tokio::time::timeout(wait, async {
        while chat.channel_state() != ConnectionState::Connected {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .is_ok();

    if connected && chat.send(message)? {
        tokio::time::sleep(wait).await;
    } else {
        println!("Assistant unavailable, message not sent");
    }

    for line in chat.messages() {
        let arrow = match line.direction {
            Direction::Incoming => "<",
            Direction::Outgoing => ">",
        };
        println!("{arrow} {}: {}", line.sender, line.content);
    }

    handle.cancel();
    chat.stop().await;
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_entry(entry: &NotificationEntry) {
    println!(
        "{} {}: {}",
        entry.received_at.format("%Y-%m-%d %H:%M"),
        entry.title,
        entry.message
    );
}
