use std::process;
use std::sync::Arc;

use relay::{RelayApp, ServerConfig, VersionInfo};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod hello;

use hello::HelloWorkflow;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: relay-server [--host <addr>] [--port <port>] [--path <path>]");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --host <addr>    Address to bind [default: 0.0.0.0]");
            eprintln!("  --port <port>    Port to listen on [default: 8080]");
            eprintln!("  --path <path>    WebSocket path devices connect to [default: /relay]");
            process::exit(2);
        }
    };

    init_tracing();

    let app = RelayApp::new(Arc::new(HelloWorkflow))
        .with_version(VersionInfo::new().with_app(env!("CARGO_PKG_VERSION")));

    relay::serve(config, app).await
}

fn parse_args(args: &[String]) -> Result<ServerConfig, String> {
    let mut config = ServerConfig::default();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                config.host = args.get(i).ok_or("--host requires a value")?.clone();
            }
            "--port" => {
                i += 1;
                let raw = args.get(i).ok_or("--port requires a value")?;
                config.port = raw
                    .parse()
                    .map_err(|_| format!("invalid port '{raw}'"))?;
            }
            "--path" => {
                i += 1;
                let path = args.get(i).ok_or("--path requires a value")?;
                if !path.starts_with('/') {
                    return Err(format!("path must start with '/': {path}"));
                }
                config.path = path.clone();
            }
            "--help" | "-h" => return Err(String::new()),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    Ok(config)
}

/// RUST_LOG takes precedence; otherwise RELAY_LOG sets the level for our crates.
/// LOG_FORMAT=json switches to structured output.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let base_level = match std::env::var("RELAY_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("trace") => "trace",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("relay={base_level},relay_server={base_level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}
