//! Session and profile commands.

use shoplink_core::AccountId;
use shoplink_storefront::Storefront;
use shoplink_storefront::session::SessionIdentity;

use super::CommandError;

/// Store a session issued by the login endpoint.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
#[allow(clippy::print_stdout)]
pub fn login(
    storefront: &Storefront,
    token: String,
    account_id: AccountId,
    user_name: String,
) -> Result<(), CommandError> {
    storefront.sign_in(&SessionIdentity::new(token, account_id, user_name.clone()))?;
    println!("Signed in as {user_name} (account {account_id})");
    Ok(())
}

/// # Errors
///
/// Returns an error if the session cannot be cleared.
#[allow(clippy::print_stdout)]
pub fn logout(storefront: &Storefront) -> Result<(), CommandError> {
    storefront.logout()?;
    println!("Signed out");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn whoami(storefront: &Storefront) {
    match storefront.session().current() {
        Some(identity) => println!("{} (account {})", identity.user_name, identity.account_id),
        None => println!("Not signed in"),
    }
}

/// # Errors
///
/// Returns an error if the profile cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn profile(storefront: &Storefront) -> Result<(), CommandError> {
    let account = storefront.account();
    let profile = account.profile().await?;
    let styles = account.preferred_styles().await?;
    let addresses = account.shipping_addresses().await?;

    println!("{}", profile.full_name);
    if let Some(email) = &profile.email {
        println!("  email: {email}");
    }
    if let Some(phone) = &profile.phone_number {
        println!("  phone: {phone}");
    }

    let chosen: Vec<_> = styles
        .iter()
        .filter(|s| s.is_selected)
        .map(|s| s.style_name.as_str())
        .collect();
    if !chosen.is_empty() {
        println!("  styles: {}", chosen.join(", "));
    }

    for address in &addresses {
        let marker = if address.is_default { "*" } else { " " };
        println!("  {marker} [{}] {}", address.address_id, address.one_line());
    }
    Ok(())
}
