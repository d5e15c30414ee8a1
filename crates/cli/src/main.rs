// Railgrid CLI - hosts the railway address-space server

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;

use railgrid_gate::CredentialTable;
use railgrid_server::{EndpointConfig, Server, ServerConfig, ShutdownHandle};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "rgrid")]
#[command(about = "Railway OPC UA address-space server (in-process core)")]
#[command(version)]
struct Cli {
    /// Hostname the endpoint is advertised at
    #[arg(long, env = "RAILGRID_HOSTNAME", default_value = "localhost")]
    hostname: String,

    /// Endpoint port
    #[arg(long, env = "RAILGRID_PORT", default_value_t = 4840)]
    port: u16,

    /// Endpoint path segment
    #[arg(long, env = "RAILGRID_PATH", default_value = "/railway/")]
    path: String,

    /// Namespace URI
    #[arg(long, env = "RAILGRID_URI", default_value = railgrid_server::DEFAULT_NAMESPACE_URI)]
    uri: String,

    /// Comma-separated user:password pairs. Omit to allow anonymous
    /// write access.
    #[arg(long, env = "RAILGRID_USERS", value_name = "USER:PASS,...")]
    users: Option<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let credentials = match cli.users.as_deref() {
        Some(spec) => match parse_users(spec) {
            Ok(table) => Some(table),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(EXIT_USAGE);
            }
        },
        None => None,
    };

    match serve(cli, credentials) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            log::error!("server failed: {e}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn serve(
    cli: Cli,
    credentials: Option<CredentialTable>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig {
        endpoint: EndpointConfig {
            hostname: cli.hostname,
            port: cli.port,
            path: cli.path,
            ..EndpointConfig::default()
        },
        namespace_uri: cli.uri,
        credentials,
    };

    let server = Server::start(config)?;

    // Operator console: monitor every railway variable and log each data
    // change until shutdown.
    let session = server.local_session()?;
    let (sub, rx) = session.create_subscription(Duration::from_millis(100))?;
    for node in server.nodes().variables() {
        session.subscribe(sub, node)?;
    }
    let logger = thread::spawn(move || {
        for notification in rx {
            let change = notification.change;
            log::info!(
                "data change: {} {} -> {} (rev {})",
                change.node,
                change.old,
                change.new,
                change.revision
            );
        }
    });

    install_shutdown_signal(server.shutdown_handle());
    server.run();

    // Shutdown deleted the subscription, so the channel is closed and the
    // logger thread drains out.
    session.close();
    let _ = logger.join();
    Ok(())
}

/// Parse the `--users` spec: comma-separated `user:pass` pairs.
fn parse_users(spec: &str) -> Result<CredentialTable, String> {
    let mut table = CredentialTable::new();
    for pair in spec.split(',') {
        let Some((user, pass)) = pair.split_once(':') else {
            return Err(format!("malformed user spec '{pair}' (expected user:pass)"));
        };
        if user.is_empty() {
            return Err(format!("malformed user spec '{pair}' (empty username)"));
        }
        table.insert(user, pass);
    }
    Ok(table)
}

#[cfg(unix)]
fn install_shutdown_signal(handle: ShutdownHandle) {
    use std::sync::atomic::{AtomicBool, Ordering};

    // The handler itself only flips a flag (async-signal-safe); a watcher
    // thread trips the actual shutdown.
    static STOP: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_signal(_sig: libc::c_int) {
        STOP.store(true, Ordering::SeqCst);
    }

    let handler = on_signal as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }

    thread::spawn(move || {
        while !STOP.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
        }
        log::info!("shutdown signal received");
        handle.shutdown();
    });
}

#[cfg(not(unix))]
fn install_shutdown_signal(_handle: ShutdownHandle) {
    // No signal hookup on this platform; the hosting environment stops
    // the process directly.
}
