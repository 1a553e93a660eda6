use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use common::{EmoteDefinition, EmotePlayType, InMemoryCatalog, TimelineCatalog};
use plugin::host::{
    CharacterAddress, CharacterOwnership, CharacterSnapshot, InMemoryHost, TickSource,
};
use plugin::runtime::{IpcHub, SyncTransport};
use plugin::{EmoteCore, PluginConfig};
use protocol::packets::{
    PMSG_ACTOR_CONTROL_RECV, PMSG_CLIENT_TRIGGER_RECV, OPCODE_ACTOR_CONTROL,
    OPCODE_CLIENT_TRIGGER, SUBTYPE_END_POSE, SUBTYPE_GENERIC_EMOTE_START, SUBTYPE_SET_POSE,
    SUBTYPE_START_POSE,
};
use protocol::ser::serialize;
use protocol::{Delivery, MessageDirection, SyncAudience, SyncChannel};
use tokio::sync::broadcast;

const PLAYER: CharacterAddress = CharacterAddress(0x1000);
const MINION: CharacterAddress = CharacterAddress(0x2000);
const PLAYER_CONTENT_ID: u64 = 0x0040_0000_0000_0001;
const MINION_OBJECT_INDEX: u16 = 3;

const EMOTE_DOZE: u32 = 88;
const EMOTE_WAVE: u32 = 16;
const EMOTE_DANCE: u32 = 101;

#[derive(Debug, Clone)]
struct SimConfig {
    catalog_path: Option<String>,
    frame_ms: u64,
}

/// One plugin instance with its own view of the session.
struct Instance {
    name: &'static str,
    host: Arc<InMemoryHost>,
    core: EmoteCore<InMemoryHost>,
    inbox: Vec<broadcast::Receiver<Vec<u8>>>,
}

impl Instance {
    fn new(
        name: &'static str,
        config: PluginConfig,
        catalog: Arc<dyn TimelineCatalog>,
        hub: &IpcHub,
        ownership: (CharacterOwnership, CharacterOwnership),
    ) -> anyhow::Result<Self> {
        let host = Arc::new(InMemoryHost::new());
        host.spawn(
            PLAYER,
            CharacterSnapshot::new(PLAYER_CONTENT_ID, 0x1040_0001, 0, ownership.0),
        );
        host.spawn(
            MINION,
            CharacterSnapshot::new(0, 0x1040_0002, MINION_OBJECT_INDEX, ownership.1),
        );
        if ownership.0 == CharacterOwnership::LocalPlayer {
            host.set_local_player(PLAYER);
        }

        let prefix = config.sync.channel_prefix.clone();
        let inbox = SyncChannel::ALL
            .iter()
            .map(|channel| hub.subscribe(&channel.name(&prefix)))
            .collect();

        let ticks: Arc<dyn TickSource> = host.clone();
        let transport: Arc<dyn SyncTransport> = Arc::new(hub.clone());
        let core = EmoteCore::bootstrap(config, host.clone(), ticks, catalog, transport)
            .with_context(|| format!("failed to start instance {name}"))?;

        Ok(Self {
            name,
            host,
            core,
            inbox,
        })
    }

    fn step(&mut self) {
        for subscription in self.host.active_subscriptions() {
            for eviction in self.core.on_tick(subscription) {
                log::info!(
                    "[{}] loop on {:?} ended: {:?}",
                    self.name,
                    eviction.character,
                    eviction.reason
                );
            }
        }

        let mut frames = Vec::new();
        for rx in &mut self.inbox {
            while let Ok(frame) = rx.try_recv() {
                frames.push(frame);
            }
        }
        for frame in frames {
            match self.core.apply_remote(&frame) {
                Ok(outcome) => log::debug!("[{}] remote frame: {outcome:?}", self.name),
                Err(err) => log::warn!("[{}] remote frame rejected: {err}", self.name),
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cfg = parse_args()?;
    log::info!("Protocol crate version: {}", protocol::protocol_version());

    let config = PluginConfig::load_from_env().context("failed to load plugin config")?;
    let catalog: Arc<dyn TimelineCatalog> = Arc::new(load_catalog(cfg.catalog_path.as_deref())?);
    let hub = IpcHub::new(config.sync.bus_capacity);
    let frame = Duration::from_millis(cfg.frame_ms);

    let mut local = Instance::new(
        "local",
        config.clone(),
        catalog.clone(),
        &hub,
        (CharacterOwnership::LocalPlayer, CharacterOwnership::OwnedObject),
    )?;
    let mut observer = Instance::new(
        "observer",
        config.clone(),
        catalog,
        &hub,
        (CharacterOwnership::Foreign, CharacterOwnership::Foreign),
    )?;

    log::info!("looped emote, then a step forward");
    local.core.play_emote(PLAYER, EMOTE_DOZE)?;
    run_frames(&mut [&mut local, &mut observer], 10, frame).await;
    for instance in [&local, &observer] {
        instance.host.move_by(PLAYER, [0.0, 0.0, 0.002]);
    }
    run_frames(&mut [&mut local, &mut observer], 2, frame).await;

    log::info!("one-shot emote");
    local.core.play_emote(PLAYER, EMOTE_WAVE)?;
    run_frames(&mut [&mut local, &mut observer], 2, frame).await;

    log::info!("minion loop with a smooth stop");
    local.core.play_emote(MINION, EMOTE_DANCE)?;
    local.core.overrides_mut().set_overall_speed(MINION, 1.5);
    run_frames(&mut [&mut local, &mut observer], 5, frame).await;
    local.core.stop_and_reset(MINION, true);
    run_frames(&mut [&mut local, &mut observer], 8, frame).await;

    log::info!("server control feed");
    for (opcode, bytes) in control_feed() {
        if let Some(mismatch) =
            local
                .core
                .on_network_message(opcode, MessageDirection::Inbound, &bytes)
        {
            log::info!("verifier flagged: {mismatch}");
        }
    }

    let settle_frames = (config.debounce().as_millis() as u64 / cfg.frame_ms.max(1)) + 10;
    run_frames(&mut [&mut local, &mut observer], settle_frames as u32, frame).await;

    for instance in [&local, &observer] {
        let stats = serde_json::to_string_pretty(&instance.core.stats())?;
        println!("[{}] {stats}", instance.name);
    }
    println!(
        "[bus] {} channels, debounced local channel: {}",
        hub.channel_count(),
        SyncChannel::new(SyncAudience::LocalPlayer, Delivery::Debounced)
            .name(&config.sync.channel_prefix)
    );

    local.core.shutdown();
    observer.core.shutdown();
    Ok(())
}

async fn run_frames(instances: &mut [&mut Instance], frames: u32, frame: Duration) {
    for _ in 0..frames {
        for instance in instances.iter_mut() {
            instance.step();
        }
        tokio::time::sleep(frame).await;
    }
}

fn control_feed() -> Vec<(u16, Vec<u8>)> {
    vec![
        (
            OPCODE_CLIENT_TRIGGER,
            serialize(&PMSG_CLIENT_TRIGGER_RECV::new(
                SUBTYPE_GENERIC_EMOTE_START,
                EMOTE_DOZE,
                0,
                0,
            )),
        ),
        (
            OPCODE_ACTOR_CONTROL,
            serialize(&PMSG_ACTOR_CONTROL_RECV::new(SUBTYPE_START_POSE, 1, 0, 0)),
        ),
        (
            OPCODE_ACTOR_CONTROL,
            serialize(&PMSG_ACTOR_CONTROL_RECV::new(SUBTYPE_SET_POSE, 2, 0, 0)),
        ),
        (
            OPCODE_ACTOR_CONTROL,
            serialize(&PMSG_ACTOR_CONTROL_RECV::new(SUBTYPE_END_POSE, 0, 0, 0)),
        ),
    ]
}

fn load_catalog(path: Option<&str>) -> anyhow::Result<InMemoryCatalog> {
    let Some(path) = path else {
        return Ok(builtin_catalog());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read emote catalog {path}"))?;
    let catalog: InMemoryCatalog =
        toml::from_str(&content).with_context(|| format!("invalid emote catalog {path}"))?;
    log::info!("Loaded {} emotes from {path}", catalog.emote_count());
    Ok(catalog)
}

fn builtin_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_timeline(640, true)
        .with_timeline(641, false)
        .with_timeline(120, false)
        .with_timeline(900, true)
        .with_timeline(901, false)
        .with_emote(EmoteDefinition::new(
            EMOTE_DOZE,
            EmotePlayType::Looped,
            [640, 641, 0, 0, 0],
        ))
        .with_emote(EmoteDefinition::new(
            EMOTE_WAVE,
            EmotePlayType::OneShot,
            [120, 0, 0, 0, 0],
        ))
        .with_emote(EmoteDefinition::new(
            EMOTE_DANCE,
            EmotePlayType::Looped,
            [901, 900, 0, 0, 0],
        ))
}

fn parse_args() -> anyhow::Result<SimConfig> {
    let mut cfg = SimConfig {
        catalog_path: std::env::var("EMOTE_CATALOG_PATH").ok(),
        frame_ms: 16,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--catalog" => cfg.catalog_path = Some(next_arg_value(&mut args, &arg)?),
            "--frame-ms" => {
                let value = next_arg_value(&mut args, &arg)?;
                cfg.frame_ms = value
                    .parse::<u64>()
                    .with_context(|| format!("invalid --frame-ms: {value}"))?;
            }
            "--help" | "-h" => {
                println!("usage: sim-host [--catalog <emotes.toml>] [--frame-ms <ms>]");
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    Ok(cfg)
}

fn next_arg_value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("missing value for {flag}"))
}
