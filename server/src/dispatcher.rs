//! Maps inbound client events onto game operations and decides who hears about the result.
//!
//! Every handler runs to completion on the single event loop and returns the list of
//! [`Outbound`] actions for the transport to carry out. Recipients are resolved at the
//! moment an event is emitted, mirroring emit-to-origin / emit-to-others / emit-to-all
//! semantics. Missing state never raises: stale references degrade to a no-op or, for
//! actions that need a player, a one-time reload notice to the sender.

use crate::client_manager::{ClientManager, ClientPhase};
use crate::config::GameRules;
use crate::game::GameState;
use crate::utils::get_timestamp;
use log::{debug, info, warn};
use shared::{
    AuthenticationData, ClientEvent, EntityRef, PlayerCoordinates, PlayerHitData, ReviveData,
    ServerEvent, SetupData, ShootData,
};
use std::net::SocketAddr;
use std::time::Duration;

/// An action for the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Deliver `event` to each listed connection.
    Event { to: Vec<String>, event: ServerEvent },
    /// Close the connection after everything queued before it has been sent.
    Close { to: String },
}

pub struct Dispatcher {
    game: GameState,
    clients: ClientManager,
    /// Connection currently asked to report the team bases.
    setup_requested_from: Option<String>,
}

impl Dispatcher {
    pub fn new(rules: GameRules, max_clients: usize) -> Self {
        Self::with_game(GameState::new(rules), max_clients)
    }

    pub fn with_game(game: GameState, max_clients: usize) -> Self {
        Self {
            game,
            clients: ClientManager::new(max_clients),
            setup_requested_from: None,
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Registers a new transport connection. Returns None when the server is full.
    pub fn connect(&mut self, addr: SocketAddr) -> Option<String> {
        self.clients.add_client(addr)
    }

    /// Any inbound frame, including pongs, counts as a sign of life.
    pub fn heartbeat(&mut self, id: &str) {
        self.clients.touch(id);
    }

    pub fn handle_event(&mut self, id: &str, event: ClientEvent) -> Vec<Outbound> {
        if !self.clients.contains(id) {
            debug!("Dropping {} from closed connection {}", event.name(), id);
            return Vec::new();
        }
        self.clients.touch(id);

        match event {
            ClientEvent::Authenticate(auth) => self.authenticate(id, auth),
            ClientEvent::Setup(setup) => self.setup(id, setup),
            ClientEvent::Move(coords) => self.movement(id, coords),
            ClientEvent::Shoot(shot) => self.shoot(id, shot),
            ClientEvent::DestroyArrow(arrow) => self.destroy_arrow(arrow),
            ClientEvent::Hit(hit) => self.hit(id, hit),
            ClientEvent::Revive(revive) => self.revive(id, revive),
            ClientEvent::Stop => self.stop(id),
            ClientEvent::Reset => self.reset(id),
        }
    }

    /// Transport-level disconnect. Safe to call for ids that are already gone.
    pub fn disconnect(&mut self, id: &str) -> Vec<Outbound> {
        if self.clients.remove_client(id).is_none() {
            return Vec::new();
        }

        let mut outbound = Vec::new();
        if self.game.remove_player(id).is_some() {
            outbound.push(self.to_all(ServerEvent::Left(EntityRef { id: id.to_string() })));
        }

        if self.setup_requested_from.as_deref() == Some(id) {
            info!("Setup client {} left before answering", id);
            self.setup_requested_from = None;
            outbound.extend(self.request_setup());
        }
        outbound
    }

    /// Disconnects every connection silent for longer than `timeout`.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        for id in self.clients.check_timeouts(timeout) {
            warn!("Client {} timed out", id);
            outbound.extend(self.disconnect(&id));
            outbound.push(Outbound::Close { to: id });
        }
        outbound
    }

    fn authenticate(&mut self, id: &str, auth: AuthenticationData) -> Vec<Outbound> {
        if !self.game.lifecycle.is_accepting() {
            info!("Rejecting authentication from {}: session stopped", id);
            return vec![self.to_origin(id, ServerEvent::Stopped)];
        }

        match self.clients.phase(id) {
            Some(ClientPhase::Connected) => {}
            Some(ClientPhase::AwaitingSetup(_)) => {
                debug!("Client {} is already waiting for setup", id);
                return Vec::new();
            }
            _ => {
                warn!("Ignoring repeated authentication from {}", id);
                return Vec::new();
            }
        }

        if auth.name.trim().is_empty() || auth.character.trim().is_empty() {
            warn!("Ignoring authentication from {} without name or character", id);
            return Vec::new();
        }

        if self.game.spawns.is_configured() {
            return self.join(id, auth);
        }

        self.clients.set_phase(id, ClientPhase::AwaitingSetup(auth));
        self.request_setup()
    }

    /// Asks the oldest waiting connection for the team bases, unless a request is
    /// already outstanding.
    fn request_setup(&mut self) -> Vec<Outbound> {
        if self.setup_requested_from.is_some() || self.game.spawns.is_configured() {
            return Vec::new();
        }
        let Some((next, _)) = self.clients.awaiting_setup().into_iter().next() else {
            return Vec::new();
        };

        info!("Requesting team bases from {}", next);
        self.setup_requested_from = Some(next.clone());
        vec![self.to_origin(&next, ServerEvent::SetupRequest)]
    }

    fn setup(&mut self, id: &str, setup: SetupData) -> Vec<Outbound> {
        if self.game.spawns.is_configured() {
            warn!("Ignoring setup from {}: bases already configured", id);
            return Vec::new();
        }
        if self.setup_requested_from.as_deref() != Some(id) {
            warn!("Ignoring unsolicited setup from {}", id);
            return Vec::new();
        }

        self.setup_requested_from = None;
        self.game.configure_bases(setup.bases);

        let mut outbound = Vec::new();
        for (waiting, auth) in self.clients.awaiting_setup() {
            outbound.extend(self.join(&waiting, auth));
        }
        outbound
    }

    fn join(&mut self, id: &str, auth: AuthenticationData) -> Vec<Outbound> {
        let Some(player) = self.game.add_player(id, auth) else {
            return Vec::new();
        };
        self.clients.set_phase(id, ClientPhase::Joined);
        self.game.expire_arrows(get_timestamp());

        vec![
            self.to_origin(id, ServerEvent::Players(self.game.players.all_except(id))),
            self.to_origin(id, ServerEvent::Protagonist(player.clone())),
            self.to_origin(id, ServerEvent::Arrows(self.game.arrows.all())),
            self.to_origin(id, ServerEvent::Points(self.game.score.snapshot())),
            self.to_others(id, ServerEvent::Joined(player)),
        ]
    }

    fn movement(&mut self, id: &str, coords: PlayerCoordinates) -> Vec<Outbound> {
        if !coords.id.is_empty() && coords.id != id {
            debug!("Client {} sent coordinates for {}", id, coords.id);
        }
        match self.game.apply_movement(id, &coords) {
            Some(relay) => vec![self.to_others(id, ServerEvent::Moved(relay))],
            None => Vec::new(),
        }
    }

    fn shoot(&mut self, id: &str, shot: ShootData) -> Vec<Outbound> {
        if !self.game.players.contains(id) {
            return self.reload_notice(id);
        }
        if shot.player_id != id {
            debug!("Client {} fired on behalf of {}", id, shot.player_id);
        }

        match self.game.fire_arrow(id, &shot) {
            Some(arrow) => {
                debug!("Player {} fired arrow {}", id, arrow.id);
                vec![self.to_all(ServerEvent::ArrowCreated(arrow))]
            }
            None => {
                warn!(
                    "Dropping shot from {} with direction ({}, {})",
                    id, shot.pos_diff_x, shot.pos_diff_y
                );
                Vec::new()
            }
        }
    }

    fn destroy_arrow(&mut self, arrow: EntityRef) -> Vec<Outbound> {
        match self.game.destroy_arrow(&arrow.id) {
            Some(_) => vec![self.to_all(ServerEvent::ArrowDestroyed(arrow))],
            None => Vec::new(),
        }
    }

    fn hit(&mut self, id: &str, hit: PlayerHitData) -> Vec<Outbound> {
        if !self.game.players.contains(id) {
            return self.reload_notice(id);
        }
        let Some(outcome) = self.game.resolve_hit(&hit.player_id, &hit.arrow_id) else {
            return Vec::new();
        };

        if outcome.killing_blow {
            info!("Player {} was killed by {}", hit.player_id, hit.arrow_id);
        }

        let mut outbound = vec![self.to_all(ServerEvent::Hit(outcome.health))];
        if let Some(arrow_id) = outcome.destroyed_arrow {
            outbound.push(self.to_all(ServerEvent::ArrowDestroyed(EntityRef { id: arrow_id })));
        }
        if outcome.score_changed {
            outbound.push(self.to_all(ServerEvent::Points(self.game.score.snapshot())));
        }
        outbound
    }

    fn revive(&mut self, id: &str, revive: ReviveData) -> Vec<Outbound> {
        if !self.game.players.contains(id) {
            return self.reload_notice(id);
        }
        if revive.player_id != id {
            warn!("Client {} tried to revive {}", id, revive.player_id);
            return Vec::new();
        }

        match self.game.revive_player(id) {
            Some(revived) => vec![self.to_all(ServerEvent::Revived(revived))],
            None => Vec::new(),
        }
    }

    fn stop(&mut self, id: &str) -> Vec<Outbound> {
        info!("Stop requested by {}", id);
        self.game.stop();
        self.close_all(ServerEvent::Stopped)
    }

    fn reset(&mut self, id: &str) -> Vec<Outbound> {
        info!("Reset requested by {}", id);
        self.game.reset();
        self.close_all(ServerEvent::Reconnect)
    }

    /// Notifies every open connection, then closes them all.
    fn close_all(&mut self, notice: ServerEvent) -> Vec<Outbound> {
        self.setup_requested_from = None;

        let mut ids = self.clients.ids();
        ids.sort();
        self.clients.clear();

        let mut outbound = vec![Outbound::Event {
            to: ids.clone(),
            event: notice,
        }];
        outbound.extend(ids.into_iter().map(|to| Outbound::Close { to }));
        outbound
    }

    fn reload_notice(&mut self, id: &str) -> Vec<Outbound> {
        if matches!(self.clients.phase(id), Some(ClientPhase::AwaitingSetup(_))) {
            debug!("Client {} acted before setup completed", id);
            return Vec::new();
        }
        if !self.clients.mark_reload_notified(id) {
            return Vec::new();
        }

        warn!("Client {} has no player, asking it to reload", id);
        vec![self.to_origin(id, ServerEvent::Reconnect)]
    }

    fn to_origin(&self, id: &str, event: ServerEvent) -> Outbound {
        Outbound::Event {
            to: vec![id.to_string()],
            event,
        }
    }

    fn to_others(&self, id: &str, event: ServerEvent) -> Outbound {
        let mut to: Vec<String> = self
            .clients
            .joined_ids()
            .into_iter()
            .filter(|other| other != id)
            .collect();
        to.sort();
        Outbound::Event { to, event }
    }

    fn to_all(&self, event: ServerEvent) -> Outbound {
        let mut to = self.clients.joined_ids();
        to.sort();
        Outbound::Event { to, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{Player, Team, TeamBase};
    use std::collections::BTreeMap;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn dispatcher() -> Dispatcher {
        let game = GameState::with_rng(
            GameRules::default().with_base_health(3),
            StdRng::seed_from_u64(9),
        );
        Dispatcher::with_game(game, 8)
    }

    fn bases() -> Vec<TeamBase> {
        vec![
            TeamBase {
                x: 0.0,
                y: 0.0,
                width: 160.0,
                height: 160.0,
                team: Team::Red,
            },
            TeamBase {
                x: 600.0,
                y: 400.0,
                width: 160.0,
                height: 160.0,
                team: Team::Blue,
            },
        ]
    }

    fn authenticate(name: &str) -> ClientEvent {
        ClientEvent::Authenticate(AuthenticationData {
            name: name.to_string(),
            character: "dude".to_string(),
        })
    }

    fn shoot(id: &str) -> ClientEvent {
        ClientEvent::Shoot(ShootData {
            player_id: id.to_string(),
            x: 100.0,
            y: 100.0,
            pos_diff_x: 1.0,
            pos_diff_y: 0.0,
        })
    }

    fn hit(player_id: &str, arrow_id: &str) -> ClientEvent {
        ClientEvent::Hit(PlayerHitData {
            player_id: player_id.to_string(),
            arrow_id: arrow_id.to_string(),
        })
    }

    /// Events delivered to `id`, in order.
    fn events_for(outbound: &[Outbound], id: &str) -> Vec<ServerEvent> {
        outbound
            .iter()
            .filter_map(|o| match o {
                Outbound::Event { to, event } if to.iter().any(|t| t == id) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    fn names(events: &[ServerEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.name()).collect()
    }

    fn closed(outbound: &[Outbound]) -> Vec<String> {
        let mut ids: Vec<String> = outbound
            .iter()
            .filter_map(|o| match o {
                Outbound::Close { to } => Some(to.clone()),
                _ => None,
            })
            .collect();
        ids.sort();
        ids
    }

    /// Connects and joins a player, completing setup on first use.
    fn join(dispatcher: &mut Dispatcher, name: &str) -> String {
        let id = dispatcher.connect(addr()).unwrap();
        let outbound = dispatcher.handle_event(&id, authenticate(name));
        if events_for(&outbound, &id).contains(&ServerEvent::SetupRequest) {
            dispatcher.handle_event(&id, ClientEvent::Setup(SetupData { bases: bases() }));
        }
        assert!(dispatcher.game().players.contains(&id));
        id
    }

    fn fire(dispatcher: &mut Dispatcher, shooter: &str) -> String {
        let outbound = dispatcher.handle_event(shooter, shoot(shooter));
        match events_for(&outbound, shooter).as_slice() {
            [ServerEvent::ArrowCreated(arrow)] => arrow.id.clone(),
            other => panic!("Unexpected events: {:?}", other),
        }
    }

    fn player(dispatcher: &Dispatcher, id: &str) -> Player {
        dispatcher.game().players.get(id).unwrap().clone()
    }

    #[test]
    fn test_first_authentication_requests_setup() {
        let mut dispatcher = dispatcher();
        let id = dispatcher.connect(addr()).unwrap();

        let outbound = dispatcher.handle_event(&id, authenticate("alice"));

        assert_eq!(
            outbound,
            vec![Outbound::Event {
                to: vec![id.clone()],
                event: ServerEvent::SetupRequest
            }]
        );
        assert!(dispatcher.game().players.is_empty());
    }

    #[test]
    fn test_setup_requested_once_and_admits_waiting_clients() {
        let mut dispatcher = dispatcher();
        let first = dispatcher.connect(addr()).unwrap();
        let second = dispatcher.connect(addr()).unwrap();

        dispatcher.handle_event(&first, authenticate("alice"));
        let outbound = dispatcher.handle_event(&second, authenticate("bob"));
        assert!(outbound.is_empty());

        // only the asked client may answer
        let outbound = dispatcher.handle_event(&second, ClientEvent::Setup(SetupData { bases: bases() }));
        assert!(outbound.is_empty());
        assert!(!dispatcher.game().spawns.is_configured());

        let outbound = dispatcher.handle_event(&first, ClientEvent::Setup(SetupData { bases: bases() }));

        let first_events = events_for(&outbound, &first);
        let second_events = events_for(&outbound, &second);
        assert_eq!(
            names(&first_events),
            vec![
                "actors:collection",
                "player:protagonist",
                "arrow:collection",
                "game:points",
                "player:joined"
            ]
        );
        assert_eq!(
            names(&second_events),
            vec![
                "actors:collection",
                "player:protagonist",
                "arrow:collection",
                "game:points"
            ]
        );

        match &second_events[0] {
            ServerEvent::Players(roster) => {
                assert_eq!(roster.len(), 1);
                assert_eq!(roster[0].id, first);
            }
            other => panic!("Unexpected event: {:?}", other),
        }

        assert_eq!(player(&dispatcher, &first).team, Team::Red);
        assert_eq!(player(&dispatcher, &second).team, Team::Blue);
    }

    #[test]
    fn test_join_fan_out() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");
        let c = dispatcher.connect(addr()).unwrap();

        let outbound = dispatcher.handle_event(&c, authenticate("carol"));

        let own = events_for(&outbound, &c);
        assert_eq!(
            names(&own),
            vec![
                "actors:collection",
                "player:protagonist",
                "arrow:collection",
                "game:points"
            ]
        );
        match &own[1] {
            ServerEvent::Protagonist(player) => {
                assert_eq!(player.id, c);
                assert_eq!(player.name, "carol");
                assert_eq!(player.health, 3);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        for other in [&a, &b] {
            assert_eq!(names(&events_for(&outbound, other)), vec!["player:joined"]);
        }
    }

    #[test]
    fn test_join_with_unbounded_bases_still_spawns() {
        let mut dispatcher = dispatcher();
        let first = dispatcher.connect(addr()).unwrap();
        dispatcher.handle_event(&first, authenticate("alice"));

        let setup: ClientEvent = shared::decode(
            r#"{"event":"game:setup","data":{"bases":[
                {"x":0,"y":0,"width":1e39,"height":100,"team":"red"},
                {"x":3e38,"y":0,"width":3e38,"height":100,"team":"blue"}
            ]}}"#,
        )
        .unwrap();
        let outbound = dispatcher.handle_event(&first, setup);

        let own = events_for(&outbound, &first);
        assert_eq!(names(&own)[1], "player:protagonist");
        let second = join(&mut dispatcher, "bob");
        for id in [&first, &second] {
            let spawned = player(&dispatcher, id);
            assert!((1.0..=800.0).contains(&spawned.x), "x out of arena: {}", spawned.x);
            assert!((1.0..=600.0).contains(&spawned.y), "y out of arena: {}", spawned.y);
        }
    }

    #[test]
    fn test_join_snapshot_skips_stale_arrows() {
        let mut game = GameState::with_rng(
            GameRules::default().with_base_health(3),
            StdRng::seed_from_u64(9),
        );
        game.configure_bases(bases());
        let auth = AuthenticationData {
            name: "gone".to_string(),
            character: "dude".to_string(),
        };
        game.add_player("gone", auth).unwrap();
        let stale = match shoot("gone") {
            ClientEvent::Shoot(shot) => game.fire_arrow("gone", &shot).unwrap(),
            other => panic!("Unexpected event: {:?}", other),
        };
        game.arrows.get_mut(&stale.id).unwrap().created_at = 1;
        game.remove_player("gone");
        let mut dispatcher = Dispatcher::with_game(game, 8);

        let a = join(&mut dispatcher, "alice");
        let live = fire(&mut dispatcher, &a);
        let b = dispatcher.connect(addr()).unwrap();
        let outbound = dispatcher.handle_event(&b, authenticate("bob"));

        match &events_for(&outbound, &b)[2] {
            ServerEvent::Arrows(arrows) => {
                assert_eq!(arrows.len(), 1);
                assert_eq!(arrows[0].id, live);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(!dispatcher.game().arrows.contains(&stale.id));
    }

    #[test]
    fn test_setup_client_leaving_delegates_setup() {
        let mut dispatcher = dispatcher();
        let first = dispatcher.connect(addr()).unwrap();
        let second = dispatcher.connect(addr()).unwrap();
        dispatcher.handle_event(&first, authenticate("alice"));
        dispatcher.handle_event(&second, authenticate("bob"));

        let outbound = dispatcher.disconnect(&first);

        assert_eq!(
            outbound,
            vec![Outbound::Event {
                to: vec![second.clone()],
                event: ServerEvent::SetupRequest
            }]
        );
        dispatcher.handle_event(&second, ClientEvent::Setup(SetupData { bases: bases() }));
        assert!(dispatcher.game().players.contains(&second));
    }

    #[test]
    fn test_authentication_while_stopped() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        dispatcher.handle_event(&a, ClientEvent::Stop);

        let late = dispatcher.connect(addr()).unwrap();
        let outbound = dispatcher.handle_event(&late, authenticate("late"));

        assert_eq!(
            outbound,
            vec![Outbound::Event {
                to: vec![late.clone()],
                event: ServerEvent::Stopped
            }]
        );
        assert!(dispatcher.game().players.is_empty());
    }

    #[test]
    fn test_stop_notifies_and_closes_everyone() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");
        let idle = dispatcher.connect(addr()).unwrap();

        let outbound = dispatcher.handle_event(&b, ClientEvent::Stop);

        for id in [&a, &b, &idle] {
            assert_eq!(events_for(&outbound, id), vec![ServerEvent::Stopped]);
        }
        let mut expected = vec![a.clone(), b.clone(), idle.clone()];
        expected.sort();
        assert_eq!(closed(&outbound), expected);
        assert!(dispatcher.clients().is_empty());
        assert!(!dispatcher.game().lifecycle.is_accepting());

        // the transport reports the closures afterwards
        assert!(dispatcher.disconnect(&a).is_empty());
    }

    #[test]
    fn test_reset_scenario() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");
        let arrow = fire(&mut dispatcher, &a);
        dispatcher.handle_event(&a, hit(&b, &arrow));

        let outbound = dispatcher.handle_event(&a, ClientEvent::Reset);

        for id in [&a, &b] {
            assert_eq!(events_for(&outbound, id), vec![ServerEvent::Reconnect]);
        }
        assert_eq!(closed(&outbound).len(), 2);
        assert!(dispatcher.game().players.is_empty());
        assert_eq!(
            dispatcher.game().score.snapshot(),
            BTreeMap::from([(Team::Red, 0), (Team::Blue, 0)])
        );

        let next = dispatcher.connect(addr()).unwrap();
        let outbound = dispatcher.handle_event(&next, authenticate("next"));
        assert_eq!(events_for(&outbound, &next), vec![ServerEvent::SetupRequest]);
    }

    #[test]
    fn test_movement_relayed_to_others_only() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");

        let outbound = dispatcher.handle_event(
            &a,
            ClientEvent::Move(PlayerCoordinates {
                id: a.clone(),
                x: 70.0,
                y: 80.0,
                velocity_x: 0.0,
                velocity_y: 150.0,
                animation: Some("down".to_string()),
            }),
        );

        assert!(events_for(&outbound, &a).is_empty());
        match events_for(&outbound, &b).as_slice() {
            [ServerEvent::Moved(coords)] => {
                assert_eq!(coords.id, a);
                assert_eq!((coords.x, coords.y), (70.0, 80.0));
            }
            other => panic!("Unexpected events: {:?}", other),
        }
        assert_eq!(player(&dispatcher, &a).animation, "down");
    }

    #[test]
    fn test_movement_from_unjoined_connection_is_silent() {
        let mut dispatcher = dispatcher();
        join(&mut dispatcher, "alice");
        let lurker = dispatcher.connect(addr()).unwrap();

        let outbound = dispatcher.handle_event(
            &lurker,
            ClientEvent::Move(PlayerCoordinates {
                id: lurker.clone(),
                x: 1.0,
                y: 1.0,
                velocity_x: 0.0,
                velocity_y: 0.0,
                animation: None,
            }),
        );
        assert!(outbound.is_empty());
    }

    #[test]
    fn test_ghost_shot_gets_one_reload_notice() {
        let mut dispatcher = dispatcher();
        join(&mut dispatcher, "alice");
        let ghost = dispatcher.connect(addr()).unwrap();

        let outbound = dispatcher.handle_event(&ghost, shoot(&ghost));
        assert_eq!(
            outbound,
            vec![Outbound::Event {
                to: vec![ghost.clone()],
                event: ServerEvent::Reconnect
            }]
        );

        assert!(dispatcher.handle_event(&ghost, shoot(&ghost)).is_empty());
        assert!(dispatcher.game().arrows.is_empty());
    }

    #[test]
    fn test_shot_before_setup_is_gated() {
        let mut dispatcher = dispatcher();
        let first = dispatcher.connect(addr()).unwrap();
        dispatcher.handle_event(&first, authenticate("alice"));

        assert!(dispatcher.handle_event(&first, shoot(&first)).is_empty());
        assert!(dispatcher.game().arrows.is_empty());
    }

    #[test]
    fn test_shot_broadcast_to_all() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");

        let outbound = dispatcher.handle_event(&a, shoot(&a));

        assert_eq!(names(&events_for(&outbound, &a)), vec!["arrow:create"]);
        assert_eq!(names(&events_for(&outbound, &b)), vec!["arrow:create"]);
        assert_eq!(player(&dispatcher, &a).statistics.arrows_fired, 1);
    }

    #[test]
    fn test_diagonal_shot_dropped() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");

        let outbound = dispatcher.handle_event(
            &a,
            ClientEvent::Shoot(ShootData {
                player_id: a.clone(),
                x: 0.0,
                y: 0.0,
                pos_diff_x: 1.0,
                pos_diff_y: 1.0,
            }),
        );
        assert!(outbound.is_empty());
    }

    #[test]
    fn test_destroy_arrow_twice() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");
        let arrow = fire(&mut dispatcher, &a);

        let destroy = ClientEvent::DestroyArrow(EntityRef { id: arrow.clone() });
        let outbound = dispatcher.handle_event(&a, destroy.clone());
        assert_eq!(names(&events_for(&outbound, &b)), vec!["arrow:destroy"]);

        assert!(dispatcher.handle_event(&b, destroy).is_empty());
        assert!(dispatcher.game().arrows.is_empty());
    }

    #[test]
    fn test_hit_scenario_red_versus_blue() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");
        assert_eq!(player(&dispatcher, &a).team, Team::Red);
        assert_eq!(player(&dispatcher, &b).team, Team::Blue);

        let arrow = fire(&mut dispatcher, &a);
        let outbound = dispatcher.handle_event(&a, hit(&b, &arrow));

        for id in [&a, &b] {
            let events = events_for(&outbound, id);
            assert_eq!(
                events,
                vec![
                    ServerEvent::Hit(shared::PlayerHealthData {
                        id: b.clone(),
                        health: 2
                    }),
                    ServerEvent::ArrowDestroyed(EntityRef { id: arrow.clone() }),
                    ServerEvent::Points(BTreeMap::from([(Team::Red, 10), (Team::Blue, 0)])),
                ]
            );
        }

        for _ in 0..3 {
            let arrow = fire(&mut dispatcher, &a);
            dispatcher.handle_event(&a, hit(&b, &arrow));
        }

        let target = player(&dispatcher, &b);
        assert_eq!(target.health, 0);
        assert_eq!(target.statistics.deaths, 1);
        assert_eq!(player(&dispatcher, &a).statistics.deadly_hits, 1);
        assert_eq!(dispatcher.game().score.get(Team::Red), 10 + 10 + 10 + 20 + 10);
    }

    #[test]
    fn test_duplicate_hit_report_is_noop() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");
        let arrow = fire(&mut dispatcher, &a);

        dispatcher.handle_event(&a, hit(&b, &arrow));
        let outbound = dispatcher.handle_event(&b, hit(&b, &arrow));

        assert!(outbound.is_empty());
        assert_eq!(player(&dispatcher, &b).health, 2);
    }

    #[test]
    fn test_hit_on_unknown_player() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let arrow = fire(&mut dispatcher, &a);
        let before = player(&dispatcher, &a);

        let outbound = dispatcher.handle_event(&a, hit("nobody", &arrow));

        assert!(outbound.is_empty());
        assert_eq!(player(&dispatcher, &a), before);
        assert_eq!(dispatcher.game().players.len(), 1);
        assert!(dispatcher.game().arrows.contains(&arrow));
    }

    #[test]
    fn test_revive_own_player_only() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");
        for _ in 0..3 {
            let arrow = fire(&mut dispatcher, &a);
            dispatcher.handle_event(&a, hit(&b, &arrow));
        }

        let outbound = dispatcher.handle_event(
            &a,
            ClientEvent::Revive(ReviveData {
                player_id: b.clone(),
            }),
        );
        assert!(outbound.is_empty());
        assert_eq!(player(&dispatcher, &b).health, 0);

        let outbound = dispatcher.handle_event(
            &b,
            ClientEvent::Revive(ReviveData {
                player_id: b.clone(),
            }),
        );
        for id in [&a, &b] {
            match events_for(&outbound, id).as_slice() {
                [ServerEvent::Revived(revived)] => {
                    assert_eq!(revived.id, b);
                    assert_eq!(revived.health, 3);
                }
                other => panic!("Unexpected events: {:?}", other),
            }
        }
        let revived = player(&dispatcher, &b);
        assert!(bases()[1].contains(revived.x, revived.y));
    }

    #[test]
    fn test_disconnect_broadcasts_departure() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");
        let arrow = fire(&mut dispatcher, &a);

        let outbound = dispatcher.disconnect(&a);

        assert_eq!(
            outbound,
            vec![Outbound::Event {
                to: vec![b.clone()],
                event: ServerEvent::Left(EntityRef { id: a.clone() })
            }]
        );
        assert!(!dispatcher.game().players.contains(&a));
        // arrows outlive their owner
        assert!(dispatcher.game().arrows.contains(&arrow));
        assert!(dispatcher.disconnect(&a).is_empty());

        // the new team count only reflects connected players
        let c = join(&mut dispatcher, "carol");
        assert_eq!(player(&dispatcher, &c).team, Team::Red);
    }

    #[test]
    fn test_repeated_authentication_ignored() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");

        assert!(dispatcher.handle_event(&a, authenticate("again")).is_empty());
        assert_eq!(player(&dispatcher, &a).name, "alice");
        assert_eq!(dispatcher.game().players.len(), 1);
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut dispatcher = dispatcher();
        let id = dispatcher.connect(addr()).unwrap();

        let outbound = dispatcher.handle_event(&id, authenticate("   "));
        assert!(outbound.is_empty());
        assert_eq!(dispatcher.clients().phase(&id), Some(&ClientPhase::Connected));
    }

    #[test]
    fn test_timeouts_disconnect_and_close() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        let b = join(&mut dispatcher, "bob");

        std::thread::sleep(Duration::from_millis(20));
        dispatcher.heartbeat(&b);
        let outbound = dispatcher.check_timeouts(Duration::from_millis(10));

        assert_eq!(
            outbound,
            vec![
                Outbound::Event {
                    to: vec![b.clone()],
                    event: ServerEvent::Left(EntityRef { id: a.clone() })
                },
                Outbound::Close { to: a.clone() },
            ]
        );
        assert!(dispatcher.clients().contains(&b));
    }

    #[test]
    fn test_events_after_close_are_dropped() {
        let mut dispatcher = dispatcher();
        let a = join(&mut dispatcher, "alice");
        dispatcher.handle_event(&a, ClientEvent::Stop);

        assert!(dispatcher.handle_event(&a, shoot(&a)).is_empty());
        assert!(dispatcher.handle_event(&a, authenticate("alice")).is_empty());
    }
}
