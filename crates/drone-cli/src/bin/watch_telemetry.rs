//! CLI tool to watch the simulator's realtime telemetry stream.

use anyhow::Result;
use clap::Parser;
use drone_core::TelemetryEvent;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Print telemetry ticks from the drone simulator
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Realtime stream URL
    #[arg(long, default_value = "ws://localhost:3070/ws")]
    url: String,

    /// Text to send on connect; the simulator echoes it back
    #[arg(long)]
    greet: Option<String>,

    /// Stop after this many ticks (0 = forever)
    #[arg(long, default_value_t = 0)]
    count: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    println!("Connecting to {}...", args.url);
    let (mut socket, _) = connect_async(args.url.as_str()).await?;

    if let Some(greeting) = &args.greet {
        socket.send(Message::Text(greeting.clone())).await?;
    }

    let mut ticks = 0u64;
    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => match serde_json::from_str::<TelemetryEvent>(&text) {
                Ok(event) => {
                    ticks += 1;
                    println!(
                        "[{:5}] {} ({:.6}, {:.6}, {:.1}m) {} batt {:.2}",
                        ticks, event.name, event.lat, event.lon, event.alt, event.state, event.batt
                    );
                    if args.count > 0 && ticks >= args.count {
                        break;
                    }
                }
                Err(_) => println!("{}", text),
            },
            Message::Close(_) => {
                println!("Stream closed by simulator");
                break;
            }
            _ => {}
        }
    }

    println!("\nReceived {} telemetry ticks.", ticks);
    Ok(())
}
