use std::{sync::Arc, time::Duration};

use crossbeam_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::{
    catalog::Catalog,
    client_api::{LocalClient, QueueSource},
    config::CompanionConfig,
    discovery::{self, ClientCredentials},
    error::CompanionError,
    events::UiEvent,
    protocol::{
        decode_client_frame, subscribe_frame, ChampSelectSession, ClientEvent, SummonerProfile,
        SUBSCRIPTIONS,
    },
    selection::select_build,
    state::CompanionState,
    stats::{Queue, Role, StatsProvider},
};

/// Queue ids drawn from the Howling Abyss pool: ARAM and ARURF.
pub const ARAM_QUEUE_IDS: [i64; 2] = [450, 900];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Champ select assigned the position.
    Explicit,
    /// The provider's primary role for the champion.
    Inferred,
    /// A queue with its own role-less statistics pool.
    SpecialCased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleResolution {
    pub role: Option<Role>,
    pub queue: Queue,
    pub source: ResolutionSource,
}

/// Picks the role and statistics pool for a champion. The lobby queue is only
/// consulted when champ select assigned no position.
pub async fn resolve_role_queue(
    assigned: Option<Role>,
    champion_id: u32,
    default_queue: Queue,
    queue_source: &dyn QueueSource,
    stats: &dyn StatsProvider,
) -> Result<RoleResolution, CompanionError> {
    if let Some(role) = assigned {
        return Ok(RoleResolution {
            role: Some(role),
            queue: default_queue,
            source: ResolutionSource::Explicit,
        });
    }

    let queue_id = queue_source.current_queue_id().await?;
    if ARAM_QUEUE_IDS.contains(&queue_id) {
        return Ok(RoleResolution {
            role: None,
            queue: Queue::HowlingAbyssAram,
            source: ResolutionSource::SpecialCased,
        });
    }

    let role = stats.primary_role(champion_id).await?;
    Ok(RoleResolution {
        role: Some(role),
        queue: default_queue,
        source: ResolutionSource::Inferred,
    })
}

/// Turns decoded client events into state changes and UI events for one
/// client session.
pub struct EventProcessor {
    state: Arc<CompanionState>,
    catalog: Arc<Catalog>,
    stats: Arc<dyn StatsProvider>,
    default_queue: Queue,
    events: Sender<UiEvent>,
    last_champion_id: u32,
}

impl EventProcessor {
    pub fn new(
        state: Arc<CompanionState>,
        catalog: Arc<Catalog>,
        stats: Arc<dyn StatsProvider>,
        default_queue: Queue,
        events: Sender<UiEvent>,
    ) -> Self {
        Self {
            state,
            catalog,
            stats,
            default_queue,
            events,
            last_champion_id: 0,
        }
    }

    pub async fn handle(&mut self, event: ClientEvent, queue_source: &dyn QueueSource) {
        match event {
            ClientEvent::ChampSelectUpdate(session) => {
                self.on_champ_select(&session, queue_source).await
            }
            ClientEvent::ChampSelectDeleted => self.on_champ_select_end(),
            ClientEvent::SummonerUpdated(profile) => self.on_summoner_updated(&profile),
            ClientEvent::SummonerDeleted => self.on_summoner_deleted(),
        }
    }

    async fn on_champ_select(&mut self, session: &ChampSelectSession, queue_source: &dyn QueueSource) {
        let Some(summoner_id) = self.state.summoner_id() else {
            debug!("champ select update before summoner is known");
            return;
        };
        let Some(member) = session.member(summoner_id) else {
            debug!(summoner_id, "local summoner missing from champ select roster");
            return;
        };

        let champion_id = member.resolved_champion();
        if champion_id == 0 || champion_id == self.last_champion_id {
            return;
        }
        self.last_champion_id = champion_id;

        let assigned = Role::from_position(&member.assigned_position);
        let resolution = match resolve_role_queue(
            assigned,
            champion_id,
            self.default_queue,
            queue_source,
            self.stats.as_ref(),
        )
        .await
        {
            Ok(resolution) => resolution,
            Err(err) => {
                warn!(%err, champion_id, "failed resolving role and queue; skipping cycle");
                return;
            }
        };
        self.state
            .set_selection(champion_id, resolution.role, resolution.queue);

        match select_build(
            self.stats.as_ref(),
            &self.catalog,
            champion_id,
            resolution.role,
            resolution.queue,
        )
        .await
        {
            Ok(recommendation) => {
                info!(
                    champion_id,
                    champion = %recommendation.champion_name,
                    role = ?resolution.role,
                    queue = %resolution.queue,
                    source = ?resolution.source,
                    "computed build recommendation"
                );
                let recommendation = Arc::new(recommendation);
                self.state
                    .set_latest_recommendation(Some(Arc::clone(&recommendation)));
                self.emit(UiEvent::ChampionChange(recommendation));
            }
            Err(err) => warn!(%err, champion_id, "build selection failed; skipping cycle"),
        }
    }

    fn on_champ_select_end(&mut self) {
        self.last_champion_id = 0;
        self.state.clear_selection();
        self.state.set_latest_recommendation(None);
        self.emit(UiEvent::QuitChampSelect);
    }

    pub fn on_summoner_updated(&mut self, profile: &SummonerProfile) {
        let info = self.state.set_identity(profile);
        info!(summoner_id = profile.summoner_id, username = %info.username, "summoner updated");
        self.emit(UiEvent::UserInfo(info));
    }

    fn on_summoner_deleted(&mut self) {
        self.last_champion_id = 0;
        let info = self.state.clear_identity();
        self.state.set_latest_recommendation(None);
        info!("summoner logged out");
        self.emit(UiEvent::UserInfo(info));
    }

    fn emit(&self, event: UiEvent) {
        if self.events.send(event).is_err() {
            error!("ui event bus closed; dropping event");
        }
    }
}

/// Everything the monitor loop needs, handed over at construction.
#[derive(Clone)]
pub struct MonitorContext {
    pub config: CompanionConfig,
    pub state: Arc<CompanionState>,
    pub catalog: Arc<Catalog>,
    pub stats: Arc<dyn StatsProvider>,
    pub events: Sender<UiEvent>,
}

/// Discovers the client, follows its event stream, and starts over after a
/// fixed delay whenever the session ends. Never returns.
pub async fn run_monitor(ctx: MonitorContext) {
    let restart_delay = Duration::from_secs(ctx.config.restart_delay_secs);
    loop {
        let credentials = discovery::wait_for_client(&ctx.config).await;
        ctx.state.set_credentials(Some(credentials.clone()));

        match run_session(&ctx, credentials).await {
            Ok(()) => warn!("client event stream closed"),
            Err(err) => warn!(%err, "client session ended"),
        }

        ctx.state.set_credentials(None);
        info!(delay_secs = restart_delay.as_secs(), "restarting client session");
        sleep(restart_delay).await;
    }
}

async fn run_session(ctx: &MonitorContext, credentials: ClientCredentials) -> Result<(), CompanionError> {
    let client = LocalClient::new(
        credentials,
        Duration::from_secs(ctx.config.http_timeout_secs),
    )?;
    let mut processor = EventProcessor::new(
        Arc::clone(&ctx.state),
        Arc::clone(&ctx.catalog),
        Arc::clone(&ctx.stats),
        ctx.config.default_queue,
        ctx.events.clone(),
    );

    match client.current_summoner().await? {
        Some(profile) => processor.on_summoner_updated(&profile),
        None => info!("no summoner logged in yet"),
    }

    let mut stream = client.connect_events().await?;
    info!(port = client.credentials().port, "connected to client event stream");
    for name in SUBSCRIPTIONS {
        stream.send(Message::Text(subscribe_frame(name).into())).await?;
    }
    debug!(events = ?SUBSCRIPTIONS, "subscribed to client events");

    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => match decode_client_frame(&text) {
                Ok(Some(event)) => processor.handle(event, &client).await,
                Ok(None) => {}
                Err(err) => warn!(%err, "skipped malformed client event"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
