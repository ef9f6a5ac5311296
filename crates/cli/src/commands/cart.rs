//! Cart commands.

use std::io::{BufRead, Write};

use shoplink_core::{CartItem, CurrencyCode, Price, ProductId, VariantId};
use shoplink_storefront::Storefront;
use shoplink_storefront::api::AddToCartRequest;
use shoplink_storefront::cart::{CartCache, RemovalOutcome};

use super::CommandError;

/// # Errors
///
/// Returns an error if the cart cannot be loaded.
pub async fn show(storefront: &Storefront) -> Result<(), CommandError> {
    let cart = storefront.cart();
    cart.load().await?;
    print_cart(&cart);
    Ok(())
}

/// # Errors
///
/// Returns an error if the server refuses the item.
pub async fn add(
    storefront: &Storefront,
    product_id: ProductId,
    size: String,
    color: String,
    quantity: i32,
    price: i64,
) -> Result<(), CommandError> {
    let cart = storefront.cart();
    let request = AddToCartRequest {
        product_id,
        size,
        color,
        quantity,
        price: Price::from_units(price),
    };
    cart.add(&request).await?;
    print_cart(&cart);
    Ok(())
}

/// # Errors
///
/// Returns an error if the server refuses the change.
pub async fn change_quantity(
    storefront: &Storefront,
    variant_id: VariantId,
    delta: i32,
) -> Result<(), CommandError> {
    let cart = storefront.cart();
    cart.load().await?;
    cart.mutate_quantity(variant_id, delta).await?;
    print_cart(&cart);
    Ok(())
}

/// Remove a line, asking first unless `yes` is set.
///
/// # Errors
///
/// Returns an error if the line is unknown or the server refuses.
#[allow(clippy::print_stdout)]
pub async fn remove(
    storefront: &Storefront,
    variant_id: VariantId,
    yes: bool,
) -> Result<(), CommandError> {
    let cart = storefront.cart();
    cart.load().await?;
    let outcome = cart
        .remove_confirmed(variant_id, |item| yes || confirm(item))
        .await?;
    match outcome {
        RemovalOutcome::Removed => print_cart(&cart),
        RemovalOutcome::Cancelled => println!("Kept in cart"),
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the server refuses.
#[allow(clippy::print_stdout)]
pub async fn clear(storefront: &Storefront) -> Result<(), CommandError> {
    let cart = storefront.cart();
    cart.clear_all().await?;
    println!("Cart cleared");
    Ok(())
}

#[allow(clippy::print_stdout)]
fn confirm(item: &CartItem) -> bool {
    print!(
        "Remove {} ({} / {}) x{}? [y/N] ",
        item.product_name, item.size, item.color, item.quantity
    );
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

#[allow(clippy::print_stdout)]
fn print_cart(cart: &CartCache) {
    let items = cart.items();
    if items.is_empty() {
        println!("Cart is empty");
        return;
    }
    for item in &items {
        println!(
            "[{}] {} ({} / {}) x{} @ {} = {}",
            item.product_variant_id,
            item.product_name,
            item.size,
            item.color,
            item.quantity,
            item.effective_price().display(CurrencyCode::VND),
            item.line_total().display(CurrencyCode::VND),
        );
    }
    println!(
        "{} items, subtotal {}",
        cart.item_count(),
        cart.subtotal().display(CurrencyCode::VND)
    );
}
