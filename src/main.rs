use anyhow::{Context, Result};
use open_music_nodes::{Config, Event, Manager, ManagerOptions, NodeOptions};
use serenity::model::id::UserId;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_music_nodes=debug".parse()?),
        )
        .init();

    info!("🎵 Iniciando open-music-nodes v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config.nodes).await;
    }

    let client_id = config
        .client_id
        .map(UserId::new)
        .context("DISCORD_CLIENT_ID no configurado")?;

    let (manager, events) = Manager::new(ManagerOptions::from(&config))?;
    manager.init(client_id)?;

    tokio::spawn(async move {
        while let Ok(event) = events.recv_async().await {
            log_event(&event);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Error al registrar Ctrl+C")?;
    info!("⚠️ Señal de shutdown recibida, cerrando...");

    manager.shutdown();

    Ok(())
}

fn log_event(event: &Event) {
    match event {
        Event::NodeConnect { identifier, .. } => info!("✅ Nodo {} conectado", identifier),
        Event::NodeDisconnect { identifier, reason } => {
            warn!("🔌 Nodo {} desconectado: {}", identifier, reason)
        }
        Event::NodeError { identifier, error } => error!("❌ Nodo {}: {}", identifier, error),
        Event::TrackStart { guild_id, track } => {
            info!("▶️ {} en guild {}", track.title, guild_id)
        }
        other => info!("📣 {:?}", other),
    }
}

/// Checks every configured node answers its info endpoint.
async fn health_check(nodes: &[NodeOptions]) -> Result<()> {
    let mut healthy = true;

    for options in nodes {
        let node = open_music_nodes::Node::new(options.clone())?;

        match node.rest().info().await {
            Ok(info) => info!("✅ {} responde (v{})", node.identifier(), info.version.semver),
            Err(e) => {
                error!("❌ {} no responde: {}", node.identifier(), e);
                healthy = false;
            }
        }
    }

    if healthy {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Nodos sin respuesta");
    }
}
