//! Checkout, order and return commands.

use shoplink_core::{AddressId, CurrencyCode, OrderId, OrderStatus, PaymentMethod, StoreId, VariantId};
use shoplink_storefront::Storefront;
use shoplink_storefront::api::CheckoutSession;
use shoplink_storefront::checkout::OrderPlacement;
use shoplink_storefront::navigation::Navigation;

use super::CommandError;

/// Open a checkout session for `variant_ids`, or the whole cart when empty.
///
/// # Errors
///
/// Returns an error if the selection is empty or the server refuses.
pub async fn begin_checkout(
    storefront: &Storefront,
    variant_ids: &[VariantId],
) -> Result<(), CommandError> {
    let checkout = storefront.checkout();
    let session = if variant_ids.is_empty() {
        let cart = storefront.cart();
        cart.load().await?;
        cart.set_all_selected(true);
        checkout.begin_from_cart(&cart).await?
    } else {
        checkout.begin(variant_ids).await?
    };
    print_session(&session);
    Ok(())
}

/// # Errors
///
/// Returns an error if no session is open, no address exists, or the server
/// refuses the order.
#[allow(clippy::print_stdout)]
pub async fn place_order(
    storefront: &Storefront,
    payment_method: PaymentMethod,
    shipping_address_id: Option<AddressId>,
    store_id: Option<StoreId>,
) -> Result<(), CommandError> {
    let checkout = storefront.checkout();
    let placement = OrderPlacement {
        payment_method,
        shipping_address_id,
        store_id,
    };
    let result = checkout.place_order(&placement).await;
    if matches!(storefront.navigator().current(), Navigation::AddShippingAddress) {
        println!("Add a shipping address first: shoplink profile show lists saved addresses");
    }
    result?;

    match storefront.navigator().current() {
        Navigation::External(url) => println!("Complete payment at {url}"),
        Navigation::OrderConfirmation {
            order_id: Some(order_id),
        } => println!("Order {order_id} placed"),
        _ => println!("Order placed"),
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if storage cannot be read.
#[allow(clippy::print_stdout)]
pub fn show_checkout(storefront: &Storefront) -> Result<(), CommandError> {
    match storefront.checkout().current()? {
        Some(session) => print_session(&session),
        None => println!("No checkout in progress"),
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the orders cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn list(storefront: &Storefront, status: Option<OrderStatus>) -> Result<(), CommandError> {
    let orders = storefront.account().orders(status).await?;
    if orders.is_empty() {
        println!("No orders");
    }
    for order in &orders {
        println!(
            "#{} {} {} {}",
            order.order_id,
            order.status,
            order.total_amount.display(CurrencyCode::VND),
            order.order_date.as_deref().unwrap_or_default(),
        );
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the order cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn show(storefront: &Storefront, order_id: OrderId) -> Result<(), CommandError> {
    let order = storefront.account().order_details(order_id).await?;
    println!("Order #{} ({})", order.order_id, order.status);
    for line in &order.items {
        println!(
            "  {} ({} / {}) x{} @ {}",
            line.product_name,
            line.size,
            line.color,
            line.quantity,
            line.price.display(CurrencyCode::VND),
        );
    }
    if let Some(address) = &order.shipping_address {
        println!("  ship to: {}", address.one_line());
    }
    println!("  subtotal: {}", order.sub_total.display(CurrencyCode::VND));
    println!("  shipping: {}", order.shipping_cost.display(CurrencyCode::VND));
    println!("  total:    {}", order.total_amount.display(CurrencyCode::VND));
    Ok(())
}

/// # Errors
///
/// Returns an error if the items cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn returnable_items(storefront: &Storefront, order_id: OrderId) -> Result<(), CommandError> {
    let items = storefront.returns().returnable_items(order_id).await?;
    if items.is_empty() {
        println!("Nothing in order #{order_id} can be returned");
    }
    for item in &items {
        println!(
            "[{}] {} ({} / {}) x{} @ {}",
            item.order_item_id,
            item.product_name,
            item.size,
            item.color,
            item.quantity,
            item.price.display(CurrencyCode::VND),
        );
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_session(session: &CheckoutSession) {
    println!("Checkout {}", session.check_out_session_id);
    for item in &session.selected_items {
        println!(
            "  [{}] {} x{} = {}",
            item.product_variant_id,
            item.product_name,
            item.quantity,
            item.line_total().display(CurrencyCode::VND),
        );
    }
    for address in &session.shipping_addresses {
        let marker = if address.is_default { "*" } else { " " };
        println!("  {marker} [{}] {}", address.address_id, address.one_line());
    }
    let methods: Vec<_> = session.payment_methods.iter().map(PaymentMethod::as_str).collect();
    println!("  payment: {}", methods.join(", "));
    println!("  subtotal: {}", session.sub_total.display(CurrencyCode::VND));
    println!("  shipping: {}", session.shipping_cost.display(CurrencyCode::VND));
    println!("  total:    {}", session.total().display(CurrencyCode::VND));
}
