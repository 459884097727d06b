//! Web server command.

use console::style;

use crate::config::Config;

/// Start the web server.
pub async fn cmd_serve(config: &Config, bind: Option<String>) -> anyhow::Result<()> {
    let bind = parse_bind_address(bind.as_deref().unwrap_or(&config.server.bind));

    println!(
        "{} Starting webdetect server at http://{}",
        style("→").cyan(),
        bind
    );
    println!(
        "  Caller identity header: {}",
        style(&config.server.identity_header).dim()
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(config, &bind).await
}

/// Normalize a bind address that can be:
/// - Just a port: "8080" -> 0.0.0.0:8080
/// - Just a host: "127.0.0.1" -> 127.0.0.1:8080
/// - Host and port: "127.0.0.1:3000"
fn parse_bind_address(bind: &str) -> String {
    if let Ok(port) = bind.parse::<u16>() {
        return format!("0.0.0.0:{}", port);
    }

    if let Some((_, port)) = bind.rsplit_once(':') {
        if port.parse::<u16>().is_ok() {
            return bind.to_string();
        }
    }

    format!("{}:8080", bind)
}
