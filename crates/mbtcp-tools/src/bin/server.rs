use std::sync::Arc;

use clap::Parser;
use tracing::info;

use mbtcp_core::types::Address;
use mbtcp_datalink::{DataTable, ModbusTcpServer};
use mbtcp_tools::common::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "server", about = "Serve an in-memory Modbus TCP data table")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 502)]
    port: u16,
    /// Preset holding register 0 so clients have something to read.
    #[arg(long)]
    seed: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let table = Arc::new(DataTable::default());
    if let Some(seed) = args.seed {
        table.holding_registers().set(Address::new(0), seed)?;
    }

    let server = ModbusTcpServer::bind((args.host.as_str(), args.port), table).await?;
    info!(addr = %server.local_addr()?, "modbus tcp server listening");
    server.run().await?;
    Ok(())
}
