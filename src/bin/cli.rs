//! GardenDB CLI Client
//!
//! Command-line interface for interacting with GardenDB.

use clap::{Parser, Subcommand};
use gardendb::network::Client;
use gardendb::protocol::Status;
use gardendb::query;

/// GardenDB CLI
#[derive(Parser, Debug)]
#[command(name = "gardendb-cli")]
#[command(about = "CLI for the GardenDB document store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one query, e.g. 'select users where "id" == 1'
    Query {
        /// The query text
        text: String,
    },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> gardendb::Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
        Commands::Query { text } => {
            let command = query::parse(&text)?;
            let response = client.execute(&command)?;

            match response.status {
                Status::Ok => match response.json()? {
                    Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                    None => println!("OK"),
                },
                Status::NotFound => {
                    eprintln!("not found: {}", response.message());
                    std::process::exit(2);
                }
                Status::Error => {
                    eprintln!("error: {}", response.message());
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
