//! ShopLink CLI - drive the storefront client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Store a session obtained from the login endpoint
//! shoplink login --token "$TOKEN" --account-id 7 --user-name An
//!
//! # Cart
//! shoplink cart show
//! shoplink cart qty 12 -- -1
//! shoplink cart remove 12 --yes
//!
//! # Checkout the whole cart and pay on delivery
//! shoplink checkout begin
//! shoplink checkout place --payment cod
//!
//! # Follow live notifications
//! shoplink notifications watch
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPLINK_API_BASE_URL` - REST API base URL (required)
//! - `SHOPLINK_STATE_DIR` - where the session is kept (default `.shoplink`)
//! - `SENTRY_DSN` - enables error reporting when set

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shoplink_core::{
    AccountId, AddressId, OrderId, OrderStatus, PaymentMethod, ProductId, StoreId, VariantId,
};
use shoplink_storefront::config::ClientConfig;

mod commands;

use commands::CommandError;

/// State directory used when neither `--state-dir` nor `SHOPLINK_STATE_DIR`
/// is given.
const DEFAULT_STATE_DIR: &str = ".shoplink";

#[derive(Parser)]
#[command(name = "shoplink")]
#[command(author, version, about = "ShopLink storefront client")]
struct Cli {
    /// Directory holding the session and checkout state
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a session issued by the login endpoint
    Login {
        #[arg(long)]
        token: String,
        #[arg(long)]
        account_id: AccountId,
        #[arg(long)]
        user_name: String,
    },
    /// Sign out and reset every component
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Open a checkout session and place orders
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
    /// Order history
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Return requests
    Returns {
        #[command(subcommand)]
        action: ReturnsAction,
    },
    /// Customer profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Live notifications
    Notifications {
        #[command(subcommand)]
        action: NotificationsAction,
    },
    /// Talk to the shopping assistant
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines and the subtotal
    Show,
    /// Add a product variant
    Add {
        #[arg(long)]
        product_id: ProductId,
        #[arg(long)]
        size: String,
        #[arg(long)]
        color: String,
        #[arg(long, default_value_t = 1)]
        quantity: i32,
        /// Unit price in whole currency units
        #[arg(long)]
        price: i64,
    },
    /// Change a line's quantity by a signed delta
    Qty {
        variant_id: VariantId,
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },
    /// Remove a line after confirmation
    Remove {
        variant_id: VariantId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Open a checkout session (all cart lines when none are given)
    Begin { variant_ids: Vec<VariantId> },
    /// Place the order for the open session
    Place {
        /// `cod` or `payos`
        #[arg(long, default_value = "cod")]
        payment: PaymentMethod,
        #[arg(long)]
        address_id: Option<AddressId>,
        #[arg(long)]
        store_id: Option<StoreId>,
    },
    /// Show the open session
    Show,
    /// Forget the open session
    Abandon,
}

#[derive(Subcommand)]
enum OrdersAction {
    List {
        /// e.g. `pending`, `delivered`
        #[arg(long)]
        status: Option<OrderStatus>,
    },
    Show { order_id: OrderId },
}

#[derive(Subcommand)]
enum ReturnsAction {
    /// Lines of an order that can be returned
    Items { order_id: OrderId },
}

#[derive(Subcommand)]
enum ProfileAction {
    Show,
}

#[derive(Subcommand)]
enum NotificationsAction {
    /// Print notifications as they arrive until interrupted
    Watch,
}

#[derive(Subcommand)]
enum ChatAction {
    /// Send one message and print replies for a while
    Send {
        message: String,
        /// Seconds to wait for replies
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(mut config) => {
            if let Some(dir) = cli.state_dir.clone() {
                config.state_dir = Some(dir);
            }
            config
                .state_dir
                .get_or_insert_with(|| PathBuf::from(DEFAULT_STATE_DIR));
            config
        }
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shoplink_storefront=info,shoplink=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli.command, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: ClientConfig) -> Result<(), CommandError> {
    let storefront = commands::open(config)?;

    match command {
        Commands::Login {
            token,
            account_id,
            user_name,
        } => commands::session::login(&storefront, token, account_id, user_name)?,
        Commands::Logout => commands::session::logout(&storefront)?,
        Commands::Whoami => commands::session::whoami(&storefront),
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&storefront).await?,
            CartAction::Add {
                product_id,
                size,
                color,
                quantity,
                price,
            } => {
                commands::cart::add(&storefront, product_id, size, color, quantity, price).await?;
            }
            CartAction::Qty { variant_id, delta } => {
                commands::cart::change_quantity(&storefront, variant_id, delta).await?;
            }
            CartAction::Remove { variant_id, yes } => {
                commands::cart::remove(&storefront, variant_id, yes).await?;
            }
            CartAction::Clear => commands::cart::clear(&storefront).await?,
        },
        Commands::Checkout { action } => match action {
            CheckoutAction::Begin { variant_ids } => {
                commands::orders::begin_checkout(&storefront, &variant_ids).await?;
            }
            CheckoutAction::Place {
                payment,
                address_id,
                store_id,
            } => {
                commands::orders::place_order(&storefront, payment, address_id, store_id).await?;
            }
            CheckoutAction::Show => commands::orders::show_checkout(&storefront)?,
            CheckoutAction::Abandon => storefront.checkout().abandon()?,
        },
        Commands::Orders { action } => match action {
            OrdersAction::List { status } => commands::orders::list(&storefront, status).await?,
            OrdersAction::Show { order_id } => {
                commands::orders::show(&storefront, order_id).await?;
            }
        },
        Commands::Returns { action } => match action {
            ReturnsAction::Items { order_id } => {
                commands::orders::returnable_items(&storefront, order_id).await?;
            }
        },
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::session::profile(&storefront).await?,
        },
        Commands::Notifications { action } => match action {
            NotificationsAction::Watch => commands::live::watch_notifications(&storefront).await,
        },
        Commands::Chat { action } => match action {
            ChatAction::Send { message, wait } => {
                commands::live::chat(&storefront, &message, wait).await?;
            }
        },
    }
    Ok(())
}
