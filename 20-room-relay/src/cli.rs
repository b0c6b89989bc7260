use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::config::RelayConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay, accepting HTTP and WebSocket connections.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Messages the hub buffers before room senders wait.
    #[arg(long, default_value_t = 5)]
    pub broadcast_capacity: usize,

    /// Pending joins and leaves the hub buffers.
    #[arg(long, default_value_t = 1)]
    pub membership_capacity: usize,

    /// Messages buffered per client before the hub starts dropping for it.
    #[arg(long, default_value_t = 10)]
    pub outbound_capacity: usize,
}

impl ServeArgs {
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            broadcast_capacity: self.broadcast_capacity,
            membership_capacity: self.membership_capacity,
            outbound_capacity: self.outbound_capacity,
        }
        .normalized()
    }
}
