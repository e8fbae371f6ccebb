use std::sync::Arc;

use ruka::{
    bot::{Bot, RestAnnouncer},
    common::{http::HttpClient, logger, types::AnyResult},
    configs::Config,
    engine::LavalinkNode,
    gateway::{ConnectReason, GatewayOptions, GatewaySession, Presence},
    player::{GuildSessionRegistry, PlaybackOrchestrator},
    rest::RestClient,
    sources::{SpotifyClient, TrackResolver},
    voice::VoiceStateStore,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(config.logging.as_ref());

    info!("Starting ruka v{}", env!("CARGO_PKG_VERSION"));

    let http = HttpClient::new()?;
    let rest = RestClient::new(http.clone(), &config.gateway.api_base, &config.bot.token);

    let gateway = GatewaySession::new(GatewayOptions {
        token: config.bot.token.clone(),
        intents: config.bot.intents()?,
        presence: config.bot.status_text.clone().map(Presence::listening),
        rest: rest.clone(),
        default_url: config.gateway.default_url.clone(),
    });

    let node = LavalinkNode::new(config.engine.clone(), http.clone(), Arc::new(gateway.clone()));

    let spotify = config
        .spotify
        .as_ref()
        .and_then(|s| SpotifyClient::new(http.clone(), s));
    if spotify.is_none() {
        warn!("Spotify is not configured; Spotify links fall back to search");
    }
    let resolver = Arc::new(TrackResolver::new(Arc::new(node.rest().clone()), spotify));

    let voice = Arc::new(VoiceStateStore::new());
    let announcer = RestAnnouncer::new(rest.clone());
    let orchestrator = Arc::new(PlaybackOrchestrator::new(
        Arc::new(GuildSessionRegistry::new()),
        resolver,
        Arc::new(node.clone()),
        voice.clone(),
        Arc::new(rest.clone()),
        Arc::new(announcer.clone()),
    ));

    let bot = Arc::new(Bot::new(
        config.bot.prefix.clone(),
        voice,
        node.clone(),
        orchestrator,
        announcer,
    ));
    bot.register(&gateway);

    let mut session = gateway.connect(ConnectReason::Identify);

    tokio::select! {
        result = &mut session => {
            match result {
                Ok(Ok(())) => info!("Gateway session ended"),
                Ok(Err(e)) => error!("Gateway session stopped: {}", e),
                Err(e) => error!("Gateway task failed: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            gateway.shutdown();
            if let Err(e) = session.await {
                warn!("Gateway task did not shut down cleanly: {}", e);
            }
        }
    }

    node.shutdown();
    Ok(())
}
