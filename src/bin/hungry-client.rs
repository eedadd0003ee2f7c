use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use hungry::{
    looks_like_postcode, Registry, RemoteDispatcher, RemoteRegistry, DISPATCHER_NAME,
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct App {
    #[clap(long, global = true, default_value = "127.0.0.1:4000", env = "HUNGRY_REGISTRY")]
    registry: String,

    #[clap(long, global = true, default_value = "warn", env = "HUNGRY_LOG")]
    log_level: tracing_subscriber::filter::LevelFilter,

    #[clap(subcommand)]
    subcmd: Action,
}

/// Actions that can be performed against the dispatcher.
#[derive(Debug, Subcommand)]
enum Action {
    /// Check whether orders are being taken.
    Serving,

    /// Place an order for delivery to a postcode.
    Order {
        postcode: String,
        #[clap(required = true)]
        items: Vec<String>,
    },

    /// List the orders placed for a postcode.
    Orders { postcode: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = App::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level)
        .init();

    if let Action::Order { postcode, .. } | Action::Orders { postcode } = &cli.subcmd {
        if !looks_like_postcode(postcode) {
            bail!("'{postcode}' does not look like a postcode");
        }
    }

    let subcmd = match cli.subcmd {
        Action::Order { postcode, items } => {
            let items: Vec<String> = items
                .iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect();
            if items.is_empty() {
                bail!("An order needs at least one item");
            }
            Action::Order { postcode, items }
        }
        subcmd => subcmd,
    };

    let registry = RemoteRegistry::connect(&cli.registry).await?;
    let addr = registry
        .lookup(DISPATCHER_NAME)
        .await
        .context("Could not find dispatcher")?;
    let dispatcher = RemoteDispatcher::connect(&addr).await?;

    match subcmd {
        Action::Serving => {
            if !dispatcher.is_serving().await? {
                bail!("Just Hungry is not taking orders right now.");
            }
            println!("Just Hungry is taking orders.");
        }
        Action::Order { postcode, items } => {
            let outcome = dispatcher.place_order(&postcode, items).await?;
            if !outcome.ok {
                bail!("Could not place order: {}", outcome.detail);
            }
            println!("Order {} successfully placed!", outcome.detail);
        }
        Action::Orders { postcode } => {
            let listing = dispatcher.get_orders(&postcode).await?;
            if listing.orders.is_empty() {
                match listing.detail.as_str() {
                    "" => println!("No orders on record."),
                    detail => println!("{detail}"),
                }
            } else {
                println!("Orders:");
                for (i, order) in listing.orders.iter().enumerate() {
                    println!("#{}: {}", i + 1, order.join(", "));
                }
            }
        }
    }

    Ok(())
}
