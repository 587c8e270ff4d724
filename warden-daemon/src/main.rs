use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};
use tokio::signal;
use tokio::sync::mpsc;

use warden_broker::BrokerManager;
use warden_daemon::authorizer::Authorizer;
use warden_daemon::config::Config;
use warden_daemon::error::{DaemonError, IoContext};
use warden_daemon::handler::DaemonHandler;
use warden_daemon::manager::IdentityManager;
use warden_daemon::server::DaemonServer;
use warden_daemon::sweeper::Sweeper;

use warden_local::{GroupEditor, LocalEntries};
use warden_store::UserDb;

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    // Initialize logger
    env_logger::init();

    // Load configuration
    let config = match std::env::var("WARDEN_CONFIG") {
        Ok(path) => Config::from_file(&PathBuf::from(path))?,
        Err(_) => Config::default(),
    };
    config.validate()?;

    info!("Starting warden-daemon");
    info!("Socket path: {}", config.socket_path.display());
    info!("State directory: {}", config.state_dir.display());
    info!(
        "UID range: [{}, {}], GID range: [{}, {}]",
        config.uid_min, config.uid_max, config.gid_min, config.gid_max
    );

    // Core services
    let store = UserDb::open(&config.state_dir)?;
    let local = LocalEntries::new(
        &config.passwd_path,
        &config.group_path,
        &config.userdb_lock_path,
    );
    let editor = GroupEditor::new(&config.group_editor);
    let (corruption_tx, corruption_rx) = mpsc::unbounded_channel();
    let manager = Arc::new(IdentityManager::new(
        store,
        local,
        editor,
        config.id_ranges(),
        Some(corruption_tx),
    ));
    let brokers = Arc::new(BrokerManager::with_sample(config.broker_wait()));

    // Background expiration sweeper + corruption rebuild task
    let sweeper = Sweeper::new(
        manager.clone(),
        config.expiration(),
        config.cleanup_interval(),
    );
    tokio::spawn(sweeper.run(corruption_rx));

    // RPC server
    let handler = DaemonHandler::new(manager, brokers, Authorizer::default());
    let server = DaemonServer::new(handler, config.socket_path.clone());

    let shutdown = shutdown_signal();
    tokio::select! {
        result = server.serve() => {
            if let Err(e) = result {
                error!("Server error: {e}");
                return Err(DaemonError::io("Server error", e));
            }
        }
        _ = shutdown => {
            info!("Received shutdown signal");
        }
    }

    // Clean up: remove socket file
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path).io_context(|| {
            format!(
                "Failed to remove socket file at {}",
                config.socket_path.display()
            )
        })?;
    }

    info!("warden-daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
