//! beacon-ctl — command-line interface for the Beacon daemon.

use anyhow::{Context, Result};

mod cmd;

use cmd::announce::{cmd_announcement, cmd_verify};
use cmd::status::{cmd_peers, cmd_shutdown, cmd_status};

const DEFAULT_PORT: u16 = 9101;

fn print_usage() {
    println!("Usage: beacon-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                         Show lifecycle state and advertised services");
    println!("  peers                          List discovered peers");
    println!("  announcement                   Show this node's signed announcement");
    println!("  verify <name> <hex> [framing]  Check a payload against an instance name");
    println!("                                 (framing: legacy | length_prefixed)");
    println!("  shutdown                       Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>   Status endpoint port (default: {})", DEFAULT_PORT);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd_status(port).await,
        ["peers"] => cmd_peers(port).await,
        ["announcement"] => cmd_announcement(port).await,
        ["verify", name, payload] => cmd_verify(name, payload, None),
        ["verify", name, payload, framing] => cmd_verify(name, payload, Some(*framing)),
        ["shutdown"] => cmd_shutdown(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
