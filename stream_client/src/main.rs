use std::time::Duration;

use clap::Parser;
use env_logger::fmt::TimestampPrecision;
use stream_client::{
    meter::spawn_meter_logger,
    sensors::V4lFrameSource,
    session::{StreamSession, CAPTURE_PERIOD, CAPTURE_RATE_HZ},
    transport::{self, ReconnectPolicy},
    Error,
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address of the detection server to connect to
    #[clap(long, env = "DETECT_SERVER_ADDR", default_value = "127.0.0.1:5000")]
    address: String,

    /// Video device to capture from
    #[clap(long, default_value = "/dev/video0")]
    device: String,

    /// Capture width
    #[clap(long, default_value_t = 640)]
    width: u32,

    /// Capture height
    #[clap(long, default_value_t = 480)]
    height: u32,

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

    log::info!("Launching streaming client for {}", &args.address);

    let policy = ReconnectPolicy {
        max_attempts: args.max_reconnects,
        delay: Duration::from_millis(args.reconnect_delay_ms),
    };
    let mut handle = transport::spawn(args.address.clone(), policy);
    let mut session = StreamSession::new(handle.outbound.clone());
    let _meter = spawn_meter_logger();

    log::info!("{}", session.status());

    // Acquire the camera up front. A denial is terminal for this run;
    // the user retries by relaunching.
    let device = args.device.clone();
    if let Err(err) = session.start_camera(move || {
        V4lFrameSource::open(&device, (args.width, args.height), CAPTURE_RATE_HZ)
    }) {
        log::error!("{}", session.status());
        return Err(err.into());
    }

    let mut timer = tokio::time::interval(CAPTURE_PERIOD);
    let mut last_status = session.status().to_owned();
    let mut transport_gone = false;

    loop {
        tokio::select! {
            _ = timer.tick(), if session.is_streaming() => session.on_tick(),
            event = handle.events.recv(), if !transport_gone => match event {
                Some(event) => session.on_transport_event(event),
                // Reconnection budget exhausted; keep capturing until the
                // user stops, frames simply fail to send.
                None => transport_gone = true,
            },
            _ = tokio::signal::ctrl_c() => break,
        }

        if session.status() != last_status {
            log::info!("{}", session.status());
            last_status = session.status().to_owned();
        }
    }

    session.stop_camera();
    log::info!("{}", session.status());

    Ok(())
}
