//! Scripted scoreboard scenario.
//!
//! Players post `goal` events and update a watched `score` property. A
//! scoreboard tallies goals from every player through the type-global
//! channel, an announcer follows a single player, and the match itself
//! posts class-level `kickoff` / `final-whistle` events.

use crate::config::DemoConfig;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tether_core::{
    EventCenter, EventContext, EventHandling, Events, Observable, Observations, Property,
    TypeEvents,
};
use tracing::{debug, info};

/// Context of a `goal` event.
#[derive(Debug, Clone)]
pub struct Goal {
    pub player: String,
    pub points: u32,
}

/// A player that scores.
pub struct Player {
    name: String,
    events: Events,
    observations: Observations,
    score: Property<u32>,
}

impl Player {
    pub fn new(center: &EventCenter, name: impl Into<String>) -> Self {
        let observations = Observations::new();
        Self {
            name: name.into(),
            events: Events::with_center::<Player>(center),
            score: Property::new(&observations, "score", 0),
            observations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self) -> u32 {
        self.score.get()
    }

    /// Add points and announce the goal.
    pub fn scores(&self, points: u32) {
        self.score.update(|score| *score += points);
        self.trigger_event_with(
            "goal",
            Goal {
                player: self.name.clone(),
                points,
            },
        );
    }
}

impl EventHandling for Player {
    fn events(&self) -> &Events {
        &self.events
    }
}

impl Observable for Player {
    fn observations(&self) -> &Observations {
        &self.observations
    }
}

/// Tallies goals from all players.
pub struct Scoreboard {
    events: Events,
    totals: Arc<Mutex<BTreeMap<String, u32>>>,
    score_writes: Arc<AtomicUsize>,
}

impl Scoreboard {
    pub fn new(center: &EventCenter) -> Self {
        let board = Self {
            events: Events::with_center::<Scoreboard>(center),
            totals: Arc::default(),
            score_writes: Arc::default(),
        };

        let totals = Arc::clone(&board.totals);
        board.when_any::<Player>("goal", move |ctx| {
            if let Some(goal) = ctx.downcast_ref::<Goal>() {
                let mut totals = totals.lock().unwrap_or_else(PoisonError::into_inner);
                *totals.entry(goal.player.clone()).or_default() += goal.points;
            }
        });

        board
    }

    /// Count every write to the player's score.
    pub fn track(&self, player: &Player) {
        let writes = Arc::clone(&self.score_writes);
        let name = player.name().to_string();
        self.on_change_of_any(player, ["score"], move || {
            writes.fetch_add(1, Ordering::Relaxed);
            debug!(player = %name, "Score written");
        });
    }

    pub fn totals(&self) -> BTreeMap<String, u32> {
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn score_writes(&self) -> usize {
        self.score_writes.load(Ordering::Relaxed)
    }
}

impl EventHandling for Scoreboard {
    fn events(&self) -> &Events {
        &self.events
    }
}

/// Follows one player and the match whistles.
pub struct Announcer {
    events: Events,
    calls: Arc<AtomicUsize>,
}

impl Announcer {
    pub fn new(center: &EventCenter) -> Self {
        Self {
            events: Events::with_center::<Announcer>(center),
            calls: Arc::default(),
        }
    }

    pub fn follow(&self, player: &Player) {
        let calls = Arc::clone(&self.calls);
        self.when(player, "goal", move |ctx| {
            calls.fetch_add(1, Ordering::Relaxed);
            if let Ok(goal) = ctx.get::<Goal>() {
                info!(player = %goal.player, points = goal.points, "GOAL!");
            }
        });
    }

    pub fn listen_to_match(&self) {
        let calls = Arc::clone(&self.calls);
        self.when_type_any_of::<Match, _>(["kickoff", "final-whistle"], move |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            info!("Whistle");
        });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl EventHandling for Announcer {
    fn events(&self) -> &Events {
        &self.events
    }
}

/// Publisher of class-level match events.
pub struct Match;

/// What happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub totals: BTreeMap<String, u32>,
    pub score_writes: usize,
    pub announcements: usize,
    pub kickoffs_seen: usize,
    pub handles_peak: usize,
    pub handles_after: usize,
}

/// Play the scenario on `center`.
pub fn run(config: &DemoConfig, center: &EventCenter) -> Summary {
    let match_events = TypeEvents::of::<Match>(center);
    let kickoffs = Arc::new(AtomicUsize::new(0));
    {
        let kickoffs = Arc::clone(&kickoffs);
        match_events.on_once("kickoff", move |_: &EventContext| {
            kickoffs.fetch_add(1, Ordering::Relaxed);
        });
    }

    let players: Vec<Player> = (0..config.players)
        .map(|i| Player::new(center, format!("player-{}", i + 1)))
        .collect();

    let board = Scoreboard::new(center);
    for player in &players {
        board.track(player);
    }

    let announcer = Announcer::new(center);
    if let Some(first) = players.first() {
        announcer.follow(first);
    }
    announcer.listen_to_match();

    let handles_peak = center.handle_count();
    info!(handles = handles_peak, players = players.len(), "Kickoff");
    match_events.trigger_event("kickoff");

    for round in 0..config.rounds {
        for (i, player) in players.iter().enumerate() {
            player.scores((round + i) as u32 % 3 + 1);
        }
        // A second kickoff reaches the announcer but not the once-listener.
        match_events.trigger_event("kickoff");
    }

    match_events.trigger_event("final-whistle");
    let announcements = announcer.calls();
    drop(announcer);

    for player in &players {
        info!(player = %player.name(), score = player.score(), "Final score");
    }

    let totals = board.totals();
    let score_writes = board.score_writes();
    drop(board);
    drop(players);
    match_events.reset();

    Summary {
        totals,
        score_writes,
        announcements,
        kickoffs_seen: kickoffs.load(Ordering::Relaxed),
        handles_peak,
        handles_after: center.handle_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_tallies_every_goal() {
        let center = EventCenter::new();
        let summary = run(
            &DemoConfig {
                players: 2,
                rounds: 2,
            },
            &center,
        );

        // player-1 scores 1 then 2, player-2 scores 2 then 3
        assert_eq!(summary.totals.get("player-1"), Some(&3));
        assert_eq!(summary.totals.get("player-2"), Some(&5));
        assert_eq!(summary.score_writes, 4);
        assert_eq!(summary.kickoffs_seen, 1);
    }

    #[test]
    fn test_scenario_announcements() {
        let center = EventCenter::new();
        let summary = run(
            &DemoConfig {
                players: 3,
                rounds: 1,
            },
            &center,
        );

        // One followed goal, kickoff twice, final whistle once
        assert_eq!(summary.announcements, 4);
    }

    #[test]
    fn test_scenario_releases_all_handles() {
        let center = EventCenter::new();
        let summary = run(&DemoConfig::default(), &center);

        assert!(summary.handles_peak > 0);
        assert_eq!(summary.handles_after, 0);
        assert_eq!(center.stats().listener_count, 0);
    }

    #[test]
    fn test_scenario_without_players() {
        let center = EventCenter::new();
        let summary = run(
            &DemoConfig {
                players: 0,
                rounds: 3,
            },
            &center,
        );

        assert!(summary.totals.is_empty());
        assert_eq!(summary.announcements, 5);
    }
}
