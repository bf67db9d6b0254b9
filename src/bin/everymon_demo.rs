//! Scripted match between two clients (and a spectator) over the local bus.
//!
//! ```text
//! everymon-demo [SEED] [--full]
//! ```
//!
//! `SEED` is four comma-separated integers; a random seed is drawn otherwise.
//! `--full` plays the six-member sample teams instead of the two starters.
//! Log verbosity follows `RUST_LOG`.

use std::env;
use std::fmt;
use std::time::Duration;

use crossbeam_channel::{after, select};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use everymon::session::{spawn_client, ClientHandle, ClientUpdate};
use everymon::team::samples;
use everymon::{
    BattleAdapter, LobbyCode, LocalBus, LocalChannel, MatchSeed, ReferenceBattle, SessionRecord, SyncConfig,
    SyncNotice, SyncPhase, SyncSession, TeamSpec,
};

type Client = ClientHandle<ReferenceBattle, LocalChannel>;

const MATCH_DEADLINE: Duration = Duration::from_secs(30);

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "everymon=warn".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let full = args.iter().any(|a| a == "--full");
    let seed = match args.iter().find(|a| !a.starts_with("--")) {
        Some(raw) => raw.parse::<MatchSeed>().unwrap_or_else(|e| {
            eprintln!("everymon-demo: {e}");
            std::process::exit(2);
        }),
        None => MatchSeed::generate(),
    };
    let (team_a, team_b) = if full {
        (samples::full_p1(), samples::full_p2())
    } else {
        (samples::fire_starter(), samples::water_starter())
    };

    let host = Uuid::new_v4();
    let guest = Uuid::new_v4();
    let watcher = Uuid::new_v4();
    let mut record = SessionRecord::open(LobbyCode::generate(), host);
    if let Err(e) = record.admit(guest, seed) {
        eprintln!("everymon-demo: {e}");
        std::process::exit(1);
    }
    println!("lobby {} seed {seed}", record.code);

    let bus = LocalBus::default();
    let config = SyncConfig::default();
    let clients = [host, guest, watcher].map(|user| {
        let name = record.role_for(user).to_string().replace(' ', "-");
        start_client(&bus, &record, user, &team_a, &team_b, &config, &name)
    });

    let outcome = run(&clients);
    let [p1, p2, spectator] = clients;

    let sessions = [p1.shutdown(), p2.shutdown(), spectator.shutdown()];
    for session in sessions.iter().flatten() {
        let digest = session.adapter().map(|a| a.state_digest().digest).unwrap_or_default();
        println!(
            "{:<12} {:<22} {}",
            session.role().map(|r| r.to_string()).unwrap_or_default(),
            session.phase(),
            digest
        );
    }

    if outcome != SyncPhase::Complete {
        std::process::exit(1);
    }
}

fn start_client(
    bus: &LocalBus,
    record: &SessionRecord,
    user: Uuid,
    team_a: &TeamSpec,
    team_b: &TeamSpec,
    config: &SyncConfig,
    name: &str,
) -> Client {
    let seed = record.battle_seed().unwrap_or_else(|e| die(name, &e));
    let (channel, inbox) = bus.join(&record.channel());

    let mut adapter = BattleAdapter::reference(seed);
    adapter.start_battle(team_a, team_b).unwrap_or_else(|e| die(name, &e));

    let mut session = SyncSession::new(channel, config.clone());
    session.begin(record.role_for(user), adapter).unwrap_or_else(|e| die(name, &e));
    spawn_client(name, session, inbox)
}

fn die(name: &str, err: &dyn fmt::Display) -> ! {
    eprintln!("everymon-demo: {name}: {err}");
    std::process::exit(1);
}

/// Plays `default` for both players until the spectator sees the end.
fn run(clients: &[Client; 3]) -> SyncPhase {
    let [p1, p2, spectator] = clients;
    let deadline = after(MATCH_DEADLINE);
    let mut verified = 0u32;

    loop {
        select! {
            recv(p1.updates()) -> update => {
                if let Ok(update) = update {
                    handle_player(p1, update);
                }
            }
            recv(p2.updates()) -> update => {
                if let Ok(update) = update {
                    handle_player(p2, update);
                }
            }
            recv(spectator.updates()) -> update => match update {
                Ok(ClientUpdate::Events(events)) => {
                    for event in events {
                        println!("{event}");
                    }
                }
                Ok(ClientUpdate::Notice(SyncNotice::DigestVerified { .. })) => verified += 1,
                Ok(ClientUpdate::Phase(phase @ (SyncPhase::Complete | SyncPhase::Desynced))) => {
                    info!(%phase, verified, "spectator finished");
                    println!("spectator verified {verified} digests");
                    return phase;
                }
                Ok(ClientUpdate::Error(e)) => warn!(error = %e, "spectator error"),
                Ok(_) => {}
                Err(_) => return SyncPhase::Desynced,
            },
            recv(deadline) -> _ => {
                eprintln!("everymon-demo: match did not finish in {MATCH_DEADLINE:?}");
                return SyncPhase::CombatRemotePending;
            }
        }
    }
}

fn handle_player(client: &Client, update: ClientUpdate) {
    match update {
        ClientUpdate::ChoiceRequested { .. } => {
            if let Err(e) = client.submit("default") {
                warn!(error = %e, "submit failed");
            }
        }
        ClientUpdate::Error(e) if e.is_fatal() => warn!(error = %e, "player desynced"),
        ClientUpdate::Error(e) => warn!(error = %e, "player error"),
        _ => {}
    }
}
