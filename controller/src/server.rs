use std::io::{ErrorKind, Read};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use lumen_common::ControllerConfig;
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::{dispatch, net, registry};

const ACCEPT_POLL_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    LinkConnecting,
    Serving,
    Shutdown,
}

/// Elapsed-time bookkeeping for the periodic maintenance steps. `None`
/// means the step has never run and is immediately due.
struct Ticks {
    last_time_sync: Option<Instant>,
    last_schedule_check: Option<Instant>,
    last_registration: Option<Instant>,
}

impl Ticks {
    fn new() -> Self {
        Self {
            last_time_sync: None,
            last_schedule_check: None,
            last_registration: None,
        }
    }

    fn due(last: Option<Instant>, interval: Duration) -> bool {
        last.map(|at| at.elapsed() >= interval).unwrap_or(true)
    }
}

/// The control loop: single-threaded, cooperative by polling. Connections
/// are served one at a time between maintenance ticks; nothing here ever
/// terminates the process except an operator interrupt.
pub fn run(config: ControllerConfig) -> anyhow::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&shutdown))
        .context("registering SIGINT handler")?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))
        .context("registering SIGTERM handler")?;

    let mut phase = Phase::Init;
    debug!(?phase, "starting controller");
    let mut app = App::new(config);

    phase = Phase::LinkConnecting;
    debug!(?phase, "bringing up network link");
    // No usable link means nothing here can work; give up and let the
    // supervisor restart us.
    let ip = net::local_ipv4().context("network link unavailable")?;
    let device_id = net::device_id(ip);
    info!("network up, ip={ip} device_id={device_id}");

    let mut ticks = Ticks::new();

    // Startup order: announce the device, then get a usable clock, then
    // start serving.
    if let Err(err) = registry::register(&app.config, &device_id, &ip.to_string()) {
        warn!("initial registration failed: {err:#}");
    }
    ticks.last_registration = Some(Instant::now());

    app.clock.sync(&app.config.ntp_servers);
    ticks.last_time_sync = Some(Instant::now());

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, app.config.http_port))
        .with_context(|| {
            format!("failed to bind HTTP server on port {}", app.config.http_port)
        })?;
    listener
        .set_nonblocking(true)
        .context("configuring listener")?;
    info!("HTTP server listening on http://{ip}:{}", app.config.http_port);

    phase = Phase::Serving;
    debug!(?phase, "entering main loop");
    let fault_delay = Duration::from_secs(app.config.loop_fault_delay_secs);
    while !shutdown.load(Ordering::Relaxed) {
        if let Err(err) = serve_iteration(&mut app, &listener, &mut ticks, &device_id, ip) {
            error!("unexpected error in main loop: {err:#}");
            thread::sleep(fault_delay);
        }
    }

    phase = Phase::Shutdown;
    info!(?phase, "interrupt received, shutting down");
    drop(listener);
    app.warm.off();
    app.natural.off();
    Ok(())
}

/// One loop iteration: maintenance first, then at most one connection.
fn serve_iteration(
    app: &mut App,
    listener: &TcpListener,
    ticks: &mut Ticks,
    device_id: &str,
    ip: Ipv4Addr,
) -> anyhow::Result<()> {
    let sync_interval = Duration::from_secs(app.config.time_sync_secs);
    if !app.clock.is_synced() || Ticks::due(ticks.last_time_sync, sync_interval) {
        app.clock.sync(&app.config.ntp_servers);
        ticks.last_time_sync = Some(Instant::now());
    }

    let check_interval = Duration::from_secs(app.config.schedule_check_secs);
    if app.clock.is_synced() && Ticks::due(ticks.last_schedule_check, check_interval) {
        app.evaluate_and_apply();
        ticks.last_schedule_check = Some(Instant::now());
    }

    let registration_interval = Duration::from_secs(app.config.registration_secs);
    if Ticks::due(ticks.last_registration, registration_interval) {
        match registry::register(&app.config, device_id, &ip.to_string()) {
            Ok(()) => ticks.last_registration = Some(Instant::now()),
            Err(err) => warn!("registration failed, will retry next interval: {err:#}"),
        }
    }

    let wait = Duration::from_millis(app.config.accept_wait_ms);
    if let Some(stream) = accept_with_timeout(listener, wait) {
        handle_connection(app, stream);
    }
    Ok(())
}

/// Polls the listener for up to `wait`, yielding back to the loop on
/// timeout so maintenance keeps running between connections. Accept-level
/// faults other than the timeout are logged and ignored.
fn accept_with_timeout(listener: &TcpListener, wait: Duration) -> Option<TcpStream> {
    let deadline = Instant::now() + wait;
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!("connection from {peer}");
                return Some(stream);
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return None;
                }
                thread::sleep(ACCEPT_POLL_SLICE);
            }
            Err(err) => {
                warn!("error accepting connection: {err}");
                return None;
            }
        }
    }
}

/// Services one connection completely: a single bounded read, dispatch,
/// one response, close. A stalled client blocks the loop for the duration
/// of its request; that is the accepted cost of the single-threaded model.
fn handle_connection(app: &mut App, mut stream: TcpStream) {
    if let Err(err) = stream.set_nonblocking(false) {
        warn!("error configuring connection: {err}");
        return;
    }

    let mut buffer = vec![0u8; app.config.max_request_bytes];
    let read = match stream.read(&mut buffer) {
        Ok(read) => read,
        Err(err) => {
            warn!("error reading request: {err}");
            return;
        }
    };

    let response = dispatch::handle(&buffer[..read], app);
    if let Err(err) = response.write_to(&mut stream) {
        warn!("error writing response: {err}");
    }
    // Dropping the stream closes the connection; no keep-alive.
}
