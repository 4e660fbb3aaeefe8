use hearth::config::Config;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load();
    let port = cfg
        .server
        .listen_addr
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    tracing::info!(version = hearth::version(), "starting echo server");
    hearth::run_echo_server(port)
}
