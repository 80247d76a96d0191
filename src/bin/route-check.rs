use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use route_dispatch::config::load_config;
use route_dispatch::exchange::{Exchange, Protocol, Request};
use route_dispatch::{Dispatcher, Router};

#[derive(Parser)]
#[command(name = "route-check")]
#[command(about = "Inspect a route-dispatch configuration offline", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "dispatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration
    Validate,
    /// Print the routing tree
    Routes,
    /// Score every root route against a request target
    Explain {
        /// Request target, e.g. /users/alice
        target: String,
        #[arg(short, long, default_value = "GET")]
        method: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Validate => {
            println!("{}: ok", cli.config.display());
        }
        Commands::Routes => {
            let dispatcher = Dispatcher::build(&config)?;
            print_tree(dispatcher.root(), 0);
        }
        Commands::Explain { target, method } => {
            let dispatcher = Dispatcher::build(&config)?;
            let root = dispatcher.root();
            let request = Request::new(method.parse()?, target).with_protocol(Protocol::Http);
            let exchange = Exchange::new(request);

            println!("threshold {:.3}, mode {:?}", root.threshold(), root.mode());
            for route in root.routes() {
                println!("{:.3}  {}", route.score(&exchange), route.describe());
            }
            match root.select(&exchange) {
                Some(selection) => println!("selected {}", selection.route().describe()),
                None => println!("no route selected"),
            }
        }
    }

    Ok(())
}

fn print_tree(router: &Arc<Router>, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}{} ({} routes)", indent, router.name(), router.route_count());
    for route in router.routes() {
        println!("{}  {}", indent, route.describe());
        if let Some(child) = route.target().as_router() {
            print_tree(child, depth + 2);
        }
    }
}
