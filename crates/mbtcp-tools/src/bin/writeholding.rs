use clap::Parser;
use mbtcp_tools::common::{build_client, init_tracing, TcpConnectionArgs};

#[derive(Debug, Parser)]
#[command(name = "writeholding", about = "Write holding registers (FC06/FC16)")]
struct Args {
    #[command(flatten)]
    conn: TcpConnectionArgs,
    #[arg(long, default_value_t = 1)]
    unit_id: u8,
    #[arg(long)]
    start: u16,
    /// One or more register values; a single value uses FC06.
    #[arg(long, required = true, num_args = 1..)]
    values: Vec<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();
    let client = build_client(&args.conn).await?;

    match args.values.as_slice() {
        [value] => {
            client
                .write_single_register(args.unit_id, args.start, *value)
                .await?;
        }
        values => {
            client
                .write_multiple_registers(args.unit_id, args.start, values)
                .await?;
        }
    }
    println!("wrote {} register(s) at {}", args.values.len(), args.start);
    Ok(())
}
