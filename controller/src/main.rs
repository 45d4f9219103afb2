mod app;
mod clock;
mod dispatch;
mod http;
mod net;
mod pwm;
mod registry;
mod server;
mod store;

use lumen_common::ControllerConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = ControllerConfig::from_env();
    config.sanitize();
    server::run(config)
}
