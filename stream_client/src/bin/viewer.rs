//! Receive-only live view: subscribes to `live_frame` events without
//! capturing anything locally.
use std::time::Duration;

use clap::Parser;
use env_logger::fmt::TimestampPrecision;
use stream_client::{
    meter::spawn_meter_logger,
    session::StreamSession,
    transport::{self, ReconnectPolicy},
    Error,
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address of the detection server to connect to
    #[clap(long, env = "DETECT_SERVER_ADDR", default_value = "127.0.0.1:5000")]
    address: String,

    /// Reconnection attempts before giving up
    #[clap(long, default_value_t = 5)]
    max_reconnects: u32,

    /// Fixed delay between reconnection attempts in milliseconds
    #[clap(long, default_value_t = 1000)]
    reconnect_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    log::info!("Launching live viewer for {}", &args.address);

    let policy = ReconnectPolicy {
        max_attempts: args.max_reconnects,
        delay: Duration::from_millis(args.reconnect_delay_ms),
    };
    let mut handle = transport::spawn(args.address.clone(), policy);
    let mut session = StreamSession::new(handle.outbound.clone());
    let _meter = spawn_meter_logger();

    log::info!("{}", session.status());

    let mut last_status = session.status().to_owned();
    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(event) => session.on_transport_event(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }

        if session.status() != last_status {
            log::info!("{}", session.status());
            last_status = session.status().to_owned();
        }
    }

    log::info!("{}", session.status());

    Ok(())
}
