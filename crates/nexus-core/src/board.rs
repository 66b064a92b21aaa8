use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::card::{Card, CardId, CardState, Coordinates, Horizon, HorizonSet, NewCard};
use crate::config::Config;
use crate::persistence::CardPersistence;
use crate::stats::CardStats;
use crate::store::{Slice, SliceAction, SliceHandle, Store};

pub const CARDS_SLICE: &str = "cards";

#[derive(Debug, Clone, Default)]
pub struct BoardConfig {
    pub horizons: HorizonSet,
    /// Whether the `all` view and stats bucket count done cards.
    pub all_includes_done: bool,
}

impl BoardConfig {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let horizons = match cfg.get("board.horizons") {
            Some(raw) => HorizonSet::parse_list(raw)?,
            None => HorizonSet::default(),
        };
        Ok(Self {
            horizons,
            all_includes_done: cfg.flag("board.all_includes_done").unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HorizonFilter {
    All,
    Lane(Horizon),
}

impl HorizonFilter {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().eq_ignore_ascii_case(Horizon::ALL) {
            return Ok(HorizonFilter::All);
        }
        Ok(HorizonFilter::Lane(Horizon::parse(raw)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Before => f.write_str("before"),
            Placement::After => f.write_str("after"),
        }
    }
}

impl FromStr for Placement {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" => Ok(Placement::Before),
            "after" => Ok(Placement::After),
            other => Err(anyhow!("expected before|after, got: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CardsState {
    pub items: Vec<Card>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CardAction {
    SetItems(Vec<Card>),
    Append(Card),
    MoveToHorizon {
        id: CardId,
        horizon: Horizon,
        at: DateTime<Utc>,
    },
    MoveRelative {
        id: CardId,
        target: CardId,
        placement: Placement,
    },
    SetCoordinates {
        id: CardId,
        coords: Coordinates,
    },
    SetError(Option<String>),
}

impl SliceAction for CardAction {
    fn name(&self) -> &'static str {
        match self {
            CardAction::SetItems(_) => "setItems",
            CardAction::Append(_) => "append",
            CardAction::MoveToHorizon { .. } => "moveToHorizon",
            CardAction::MoveRelative { .. } => "moveRelative",
            CardAction::SetCoordinates { .. } => "setCoordinates",
            CardAction::SetError(_) => "setError",
        }
    }
}

pub struct CardsSlice;

impl Slice for CardsSlice {
    type State = CardsState;
    type Action = CardAction;

    fn reduce(state: &CardsState, action: CardAction) -> CardsState {
        let mut next = state.clone();
        match action {
            CardAction::SetItems(items) => {
                next.items = items;
                next.error = None;
            }
            CardAction::Append(card) => next.items.push(card),
            CardAction::MoveToHorizon { id, horizon, at } => {
                if let Some(idx) = next.items.iter().position(|c| c.id == id) {
                    let mut card = next.items.remove(idx);
                    card.state = CardState::enter(horizon, at);
                    next.items.push(card);
                }
            }
            CardAction::MoveRelative {
                id,
                target,
                placement,
            } => next.items = reorder(&state.items, &id, &target, placement),
            CardAction::SetCoordinates { id, coords } => {
                if let Some(card) = next.items.iter_mut().find(|c| c.id == id) {
                    card.coords = Some(coords);
                }
            }
            CardAction::SetError(error) => next.error = error,
        }
        next
    }
}

/// Takes `id` out of the sequence and puts it back next to `target`. The
/// target index is looked up after the removal since removal shifts it.
fn reorder(items: &[Card], id: &CardId, target: &CardId, placement: Placement) -> Vec<Card> {
    let mut next = items.to_vec();
    if id == target {
        return next;
    }
    let Some(from) = next.iter().position(|c| &c.id == id) else {
        return next;
    };
    if !next.iter().any(|c| &c.id == target) {
        return next;
    }

    let card = next.remove(from);
    let Some(to) = next.iter().position(|c| &c.id == target) else {
        return items.to_vec();
    };
    let at = match placement {
        Placement::Before => to,
        Placement::After => to + 1,
    };
    next.insert(at, card);
    next
}

/// Payload of the "card-update" event emitted after each board change.
#[derive(Debug, Clone, Serialize)]
pub struct CardEvent {
    pub source: String,
    pub stats: CardStats,
}

pub type CardEventHook = Box<dyn Fn(&CardEvent) + Send + Sync>;

/// Card collection plus the lane, ordering, and badge logic over it.
///
/// The collection lives in the store's `cards` slice, so store subscribers
/// see every change. Bad input (unknown ids, unknown lanes) is logged and
/// turns into a `false` return rather than an error.
pub struct CardBoard {
    store: Store,
    cards: SliceHandle<CardsSlice>,
    config: BoardConfig,
    persistence: Option<Box<dyn CardPersistence>>,
    events: Option<CardEventHook>,
    /// Set while the stored collection is unreadable, so saves cannot
    /// overwrite it.
    saves_blocked: AtomicBool,
}

impl fmt::Debug for CardBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardBoard")
            .field("config", &self.config)
            .field("persistence", &self.persistence.is_some())
            .field("events", &self.events.is_some())
            .field("saves_blocked", &self.saves_blocked.load(Ordering::SeqCst))
            .finish()
    }
}

impl CardBoard {
    #[instrument(skip(store, config))]
    pub fn new(store: Store, config: BoardConfig) -> anyhow::Result<Self> {
        let cards = store.register_slice::<CardsSlice>(CARDS_SLICE, CardsState::default())?;
        debug!(horizons = config.horizons.len(), "card board ready");
        Ok(Self {
            store,
            cards,
            config,
            persistence: None,
            events: None,
            saves_blocked: AtomicBool::new(false),
        })
    }

    pub fn with_persistence(mut self, persistence: Box<dyn CardPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_events<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CardEvent) + Send + Sync + 'static,
    {
        self.events = Some(Box::new(hook));
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Pulls the collection from persistence. A failed load keeps the
    /// in-memory board and records the error on the slice.
    ///
    /// Stored cards are kept as-is: a card whose horizon is not configured
    /// stays in the collection (and on disk) but shows up in no lane.
    #[instrument(skip(self))]
    pub fn load(&self) -> bool {
        let Some(persistence) = self.persistence.as_ref() else {
            debug!("no persistence configured; nothing to load");
            return false;
        };
        match persistence.load().and_then(|cards| self.check_loaded(cards)) {
            Ok(cards) => {
                info!(count = cards.len(), "loaded cards");
                self.saves_blocked.store(false, Ordering::SeqCst);
                self.cards.dispatch(CardAction::SetItems(cards));
                self.emit("cards.setItems");
                true
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to load cards; keeping in-memory board");
                self.saves_blocked.store(true, Ordering::SeqCst);
                self.cards.dispatch(CardAction::SetError(Some(format!("{err:#}"))));
                false
            }
        }
    }

    /// Replaces the collection. Duplicate ids and unknown lanes are dropped.
    #[instrument(skip(self, cards), fields(count = cards.len()))]
    pub fn seed(&self, cards: Vec<Card>) {
        let kept = self.accept_cards(cards);
        info!(count = kept.len(), "seeded cards");
        self.cards.dispatch(CardAction::SetItems(kept));
        self.after_mutation("cards.setItems");
    }

    #[instrument(skip(self, new), fields(horizon = %new.horizon))]
    pub fn add_card(&self, new: NewCard) -> Option<CardId> {
        let horizon = self.known_horizon(&new.horizon)?;
        let mut id = CardId::generate();
        while self.find(&id).is_some() {
            id = CardId::generate();
        }

        let card = Card::new(id.clone(), new.title, horizon, new.priority, Utc::now())
            .with_summary(new.summary);
        self.cards.dispatch(CardAction::Append(card));
        info!(id = %id, "added card");
        self.after_mutation("cards.append");
        Some(id)
    }

    /// Why the last `load` failed, until the collection is replaced.
    pub fn load_error(&self) -> Option<String> {
        self.cards.get().error
    }

    pub fn cards(&self) -> Vec<Card> {
        self.cards.get().items
    }

    pub fn get_card(&self, card_id: &str) -> Option<Card> {
        self.find(&CardId::new(card_id))
    }

    /// Cards of one lane in stored order. `all` follows the board's done
    /// policy; an unparseable lane yields nothing.
    pub fn get_cards_by_horizon(&self, horizon: &str) -> Vec<Card> {
        match HorizonFilter::parse(horizon) {
            Ok(filter) => self.cards_matching(&filter),
            Err(err) => {
                warn!(horizon, error = %err, "invalid horizon filter");
                Vec::new()
            }
        }
    }

    pub fn cards_matching(&self, filter: &HorizonFilter) -> Vec<Card> {
        let include_done = self.config.all_includes_done;
        let horizons = &self.config.horizons;
        self.cards()
            .into_iter()
            .filter(|card| horizons.contains(card.horizon()))
            .filter(|card| match filter {
                HorizonFilter::All => include_done || !card.is_done(),
                HorizonFilter::Lane(horizon) => card.horizon() == horizon.as_str(),
            })
            .collect()
    }

    /// Moves a card to the end of `target`'s lane. Entering `done` stamps
    /// `closed_at`; leaving it clears the stamp.
    #[instrument(skip(self))]
    pub fn move_card(&self, card_id: &str, target: &str) -> bool {
        let Some(horizon) = self.known_horizon(target) else {
            return false;
        };
        let Some(card) = self.lookup(card_id, "move") else {
            return false;
        };
        if card.horizon() == horizon.as_str() {
            debug!(id = card_id, horizon = %horizon, "card already in horizon");
            return true;
        }

        let from = card.horizon().to_string();
        self.cards.dispatch(CardAction::MoveToHorizon {
            id: card.id,
            horizon: horizon.clone(),
            at: Utc::now(),
        });
        info!(id = card_id, from = %from, to = %horizon, "moved card");
        self.after_mutation("cards.moveToHorizon");
        true
    }

    /// Drag-and-drop reorder. Lane membership is left alone.
    #[instrument(skip(self))]
    pub fn move_card_relative(&self, card_id: &str, target_id: &str, placement: Placement) -> bool {
        if card_id == target_id {
            warn!(id = card_id, "cannot move a card relative to itself");
            return false;
        }
        let (Some(card), Some(target)) = (
            self.lookup(card_id, "reorder"),
            self.lookup(target_id, "reorder target"),
        ) else {
            return false;
        };

        self.cards.dispatch(CardAction::MoveRelative {
            id: card.id,
            target: target.id,
            placement,
        });
        info!(id = card_id, target = target_id, %placement, "reordered card");
        self.after_mutation("cards.moveRelative");
        true
    }

    /// Freeform layout placement. Order and lane are untouched.
    #[instrument(skip(self))]
    pub fn update_card_position(&self, card_id: &str, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            warn!(id = card_id, x, y, "rejected non-finite coordinates");
            return false;
        }
        let Some(card) = self.lookup(card_id, "place") else {
            return false;
        };

        self.cards.dispatch(CardAction::SetCoordinates {
            id: card.id,
            coords: Coordinates { x, y },
        });
        debug!(id = card_id, x, y, "placed card");
        self.after_mutation("cards.setCoordinates");
        true
    }

    pub fn mark_done(&self, card_id: &str) -> bool {
        self.move_card(card_id, Horizon::DONE)
    }

    pub fn get_card_stats(&self) -> CardStats {
        CardStats::compute(
            &self.cards(),
            &self.config.horizons,
            self.config.all_includes_done,
        )
    }

    fn find(&self, id: &CardId) -> Option<Card> {
        self.cards().into_iter().find(|c| &c.id == id)
    }

    fn lookup(&self, card_id: &str, op: &str) -> Option<Card> {
        let card = self.find(&CardId::new(card_id));
        if card.is_none() {
            warn!(id = card_id, op, "card not found");
        }
        card
    }

    fn known_horizon(&self, name: &str) -> Option<Horizon> {
        match Horizon::parse(name) {
            Ok(horizon) if self.config.horizons.contains(horizon.as_str()) => Some(horizon),
            Ok(horizon) => {
                warn!(horizon = %horizon, "horizon not configured");
                None
            }
            Err(err) => {
                warn!(horizon = name, error = %err, "invalid horizon");
                None
            }
        }
    }

    fn accept_cards(&self, cards: Vec<Card>) -> Vec<Card> {
        let mut seen = HashSet::new();
        cards
            .into_iter()
            .filter(|card| {
                if !self.config.horizons.contains(card.horizon()) {
                    warn!(id = %card.id, horizon = card.horizon(), "dropping card in unknown horizon");
                    return false;
                }
                if !seen.insert(card.id.clone()) {
                    warn!(id = %card.id, "dropping card with duplicate id");
                    return false;
                }
                true
            })
            .collect()
    }

    /// Stored ids must be unique; anything else is treated as unreadable
    /// data rather than silently thinned out.
    fn check_loaded(&self, cards: Vec<Card>) -> anyhow::Result<Vec<Card>> {
        let mut seen = HashSet::new();
        let mut hidden = 0usize;
        for card in &cards {
            if !seen.insert(&card.id) {
                return Err(anyhow!("duplicate card id {} in stored cards", card.id));
            }
            if !self.config.horizons.contains(card.horizon()) {
                hidden += 1;
            }
        }
        if hidden > 0 {
            warn!(hidden, "keeping cards whose horizon is not configured out of every lane");
        }
        Ok(cards)
    }

    fn after_mutation(&self, source: &str) {
        if let Some(persistence) = self.persistence.as_ref() {
            if self.saves_blocked.load(Ordering::SeqCst) {
                warn!(source, "stored cards are unreadable; change kept in memory only");
            } else if let Err(err) = persistence.save(&self.cards()) {
                warn!(source, error = %format!("{err:#}"), "failed to persist cards");
            }
        }
        self.emit(source);
    }

    fn emit(&self, source: &str) {
        if let Some(hook) = self.events.as_ref() {
            hook(&CardEvent {
                source: source.to_string(),
                stats: self.get_card_stats(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::anyhow;
    use chrono::Utc;
    use parking_lot::Mutex;

    use super::{BoardConfig, CardBoard, Placement};
    use crate::card::{Card, CardId, Horizon, HorizonSet, NewCard, Priority};
    use crate::persistence::{CardPersistence, MemoryPersistence};
    use crate::store::Store;

    fn card(id: &str, horizon: &str, priority: Priority) -> Card {
        Card::new(
            CardId::new(id),
            format!("card {id}"),
            Horizon::parse(horizon).expect("horizon"),
            priority,
            Utc::now(),
        )
    }

    fn board(cards: Vec<Card>) -> CardBoard {
        let board = CardBoard::new(Store::new(), BoardConfig::default()).expect("board");
        board.seed(cards);
        board
    }

    fn ids(cards: &[Card]) -> Vec<String> {
        cards.iter().map(|c| c.id.to_string()).collect()
    }

    fn three_cards() -> CardBoard {
        board(vec![
            card("c1", "now", Priority::P1),
            card("c2", "now", Priority::P2),
            card("c3", "later", Priority::P3),
        ])
    }

    #[test]
    fn done_round_trip_sets_and_clears_closed_at() {
        let board = three_cards();

        assert!(board.move_card("c1", "done"));
        let done = board.get_card("c1").expect("c1");
        assert!(done.closed_at().is_some());
        assert_eq!(done.horizon(), "done");

        assert!(board.move_card("c1", "now"));
        let reopened = board.get_card("c1").expect("c1");
        assert_eq!(reopened.closed_at(), None);
        assert_eq!(reopened.horizon(), "now");
    }

    #[test]
    fn move_appends_to_end_of_destination() {
        let board = three_cards();
        assert!(board.move_card("c1", "later"));
        assert_eq!(ids(&board.get_cards_by_horizon("later")), vec!["c3", "c1"]);
        assert_eq!(ids(&board.get_cards_by_horizon("now")), vec!["c2"]);
        assert_eq!(board.cards().len(), 3);
    }

    #[test]
    fn move_within_same_horizon_keeps_closed_at() {
        let board = three_cards();
        assert!(board.mark_done("c2"));
        let closed = board.get_card("c2").and_then(|c| c.closed_at());
        assert!(board.mark_done("c2"));
        assert_eq!(board.get_card("c2").and_then(|c| c.closed_at()), closed);
    }

    #[test]
    fn unknown_card_is_rejected_without_notification() {
        let board = three_cards();
        let sources = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&sources);
        board.store().subscribe(move |_, source| {
            sink.lock().push(source.to_string());
            Ok(())
        });
        let before = board.cards();

        assert!(!board.move_card("missing-id", "now"));
        assert!(!board.move_card("c1", "someday"));
        assert!(!board.move_card_relative("c1", "missing-id", Placement::Before));
        assert!(!board.move_card_relative("c1", "c1", Placement::After));
        assert!(!board.update_card_position("missing-id", 1.0, 2.0));
        assert!(!board.update_card_position("c1", f64::NAN, 2.0));

        assert_eq!(board.cards(), before);
        assert!(sources.lock().is_empty());
    }

    #[test]
    fn relative_move_across_lanes_keeps_membership() {
        let board = three_cards();
        assert!(board.move_card_relative("c3", "c1", Placement::Before));

        assert_eq!(ids(&board.cards()), vec!["c3", "c1", "c2"]);
        assert_eq!(ids(&board.get_cards_by_horizon("later")), vec!["c3"]);
        assert_eq!(ids(&board.get_cards_by_horizon("now")), vec!["c1", "c2"]);
    }

    #[test]
    fn before_then_after_restores_neighbours() {
        let board = board(vec![
            card("a", "now", Priority::P3),
            card("x", "now", Priority::P3),
            card("b", "now", Priority::P3),
            card("y", "now", Priority::P3),
        ]);

        assert!(board.move_card_relative("a", "b", Placement::Before));
        assert_eq!(ids(&board.cards()), vec!["x", "a", "b", "y"]);
        assert!(board.move_card_relative("a", "b", Placement::After));
        assert_eq!(ids(&board.cards()), vec!["x", "b", "a", "y"]);

        let order = ids(&board.cards());
        let b = order.iter().position(|id| id == "b").expect("b");
        assert_eq!(order[b - 1], "x");
    }

    #[test]
    fn relative_move_from_before_the_target() {
        let board = board(vec![
            card("a", "now", Priority::P3),
            card("b", "now", Priority::P3),
            card("c", "now", Priority::P3),
        ]);
        assert!(board.move_card_relative("a", "c", Placement::After));
        assert_eq!(ids(&board.cards()), vec!["b", "c", "a"]);
        assert!(board.move_card_relative("a", "b", Placement::Before));
        assert_eq!(ids(&board.cards()), vec!["a", "b", "c"]);
    }

    #[test]
    fn freeform_position_leaves_order_alone() {
        let board = three_cards();
        assert!(board.update_card_position("c2", 40.0, -8.5));
        let placed = board.get_card("c2").expect("c2");
        let coords = placed.coords.expect("coords");
        assert_eq!((coords.x, coords.y), (40.0, -8.5));
        assert_eq!(placed.horizon(), "now");
        assert_eq!(ids(&board.cards()), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn all_view_excludes_done_by_default() {
        let board = three_cards();
        board.mark_done("c2");
        assert_eq!(ids(&board.get_cards_by_horizon("all")), vec!["c1", "c3"]);
        assert_eq!(ids(&board.get_cards_by_horizon("done")), vec!["c2"]);

        let inclusive = CardBoard::new(
            Store::new(),
            BoardConfig {
                all_includes_done: true,
                ..BoardConfig::default()
            },
        )
        .expect("board");
        inclusive.seed(board.cards());
        assert_eq!(inclusive.get_cards_by_horizon("all").len(), 3);
        assert_eq!(inclusive.get_card_stats().all.count, 3);
    }

    #[test]
    fn stats_track_moves() {
        let board = three_cards();
        let stats = board.get_card_stats();
        assert_eq!(stats.horizon("now").map(|s| s.count), Some(2));
        assert_eq!(stats.all.count, 3);

        board.mark_done("c1");
        let stats = board.get_card_stats();
        let now = stats.horizon("now").expect("now");
        assert_eq!(now.count, 1);
        assert!(!now.has_p1());
        assert!(now.has_p2());
        assert_eq!(stats.horizon("done").map(|s| s.count), Some(1));
        assert_eq!(stats.all.count, 2);
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn seed_drops_duplicates_and_unknown_lanes() {
        let board = board(vec![
            card("c1", "now", Priority::P1),
            card("c1", "next", Priority::P2),
            card("c2", "next", Priority::P2),
        ]);
        assert_eq!(ids(&board.cards()), vec!["c1", "c2"]);

        let narrow = CardBoard::new(
            Store::new(),
            BoardConfig {
                horizons: crate::card::HorizonSet::parse_list("now,done").expect("set"),
                all_includes_done: false,
            },
        )
        .expect("board");
        narrow.seed(vec![card("c1", "now", Priority::P3), card("c2", "later", Priority::P3)]);
        assert_eq!(ids(&narrow.cards()), vec!["c1"]);
    }

    #[test]
    fn add_card_appends_with_fresh_id() {
        let board = three_cards();
        let id = board
            .add_card(NewCard {
                title: "Triage alerts".to_string(),
                summary: "from the pager".to_string(),
                horizon: "inbox".to_string(),
                priority: Priority::P1,
            })
            .expect("added");
        assert!(id.as_str().starts_with("c-"));
        assert_eq!(board.cards().last().map(|c| c.id.clone()), Some(id));

        assert!(
            board
                .add_card(NewCard {
                    title: "Nowhere".to_string(),
                    summary: String::new(),
                    horizon: "someday".to_string(),
                    priority: Priority::P3,
                })
                .is_none()
        );
        assert_eq!(board.cards().len(), 4);
    }

    #[test]
    fn mutations_persist_and_emit_events() {
        let storage = MemoryPersistence::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let board = CardBoard::new(Store::new(), BoardConfig::default())
            .expect("board")
            .with_persistence(Box::new(storage.clone()))
            .with_events(move |event| sink.lock().push((event.source.clone(), event.stats.all.count)));

        board.seed(vec![card("c1", "now", Priority::P1), card("c2", "next", Priority::P3)]);
        board.mark_done("c2");

        assert_eq!(storage.snapshot(), board.cards());
        assert_eq!(
            *events.lock(),
            vec![
                ("cards.setItems".to_string(), 2),
                ("cards.moveToHorizon".to_string(), 1),
            ]
        );
    }

    struct BrokenPersistence;

    impl CardPersistence for BrokenPersistence {
        fn load(&self) -> anyhow::Result<Vec<Card>> {
            Err(anyhow!("disk on fire"))
        }

        fn save(&self, _cards: &[Card]) -> anyhow::Result<()> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[test]
    fn persistence_faults_are_swallowed() {
        let board = CardBoard::new(Store::new(), BoardConfig::default())
            .expect("board")
            .with_persistence(Box::new(BrokenPersistence));
        board.seed(vec![card("c1", "now", Priority::P1)]);

        assert!(!board.load());
        assert_eq!(ids(&board.cards()), vec!["c1"]);
        assert!(board.move_card("c1", "next"));
        assert_eq!(
            board.store().get("cards.error"),
            Some(serde_json::json!("disk on fire"))
        );
    }

    #[test]
    fn narrower_horizons_keep_stored_cards() {
        let stored = MemoryPersistence::with_cards(vec![
            card("c1", "now", Priority::P1),
            card("c2", "later", Priority::P2),
            card("c3", "inbox", Priority::P3),
        ]);
        let narrow = BoardConfig {
            horizons: HorizonSet::parse_list("now,next,done").expect("set"),
            all_includes_done: false,
        };
        let board = CardBoard::new(Store::new(), narrow)
            .expect("board")
            .with_persistence(Box::new(stored.clone()));

        assert!(board.load());
        assert_eq!(ids(&board.get_cards_by_horizon("all")), vec!["c1"]);
        assert!(board.get_cards_by_horizon("later").is_empty());
        assert_eq!(board.get_card_stats().total, 1);

        assert!(board.move_card("c1", "next"));
        assert_eq!(ids(&stored.snapshot()), vec!["c2", "c3", "c1"]);

        assert!(board.move_card("c3", "now"));
        assert_eq!(ids(&board.get_cards_by_horizon("now")), vec!["c3"]);
    }

    #[test]
    fn duplicate_stored_ids_fail_the_load() {
        let stored = MemoryPersistence::with_cards(vec![
            card("c1", "now", Priority::P1),
            card("c1", "later", Priority::P2),
        ]);
        let board = CardBoard::new(Store::new(), BoardConfig::default())
            .expect("board")
            .with_persistence(Box::new(stored.clone()));

        assert!(!board.load());
        assert!(board.load_error().is_some_and(|e| e.contains("duplicate card id c1")));

        board.seed(vec![card("c9", "now", Priority::P3)]);
        assert_eq!(ids(&stored.snapshot()), vec!["c1", "c1"]);
    }

    #[test]
    fn store_notifications_carry_slice_tags() {
        let board = three_cards();
        let sources = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&sources);
        board.store().subscribe(move |state, source| {
            assert!(state.slices.contains_key("cards"));
            sink.lock().push(source.to_string());
            Ok(())
        });

        board.move_card("c3", "now");
        board.move_card_relative("c3", "c1", Placement::Before);
        board.update_card_position("c3", 1.0, 1.0);

        assert_eq!(
            *sources.lock(),
            vec!["cards.moveToHorizon", "cards.moveRelative", "cards.setCoordinates"]
        );
        assert_eq!(board.store().get("cards.items.0.id"), Some(serde_json::json!("c3")));
    }

    #[test]
    fn second_board_on_same_store_shares_cards() {
        let store = Store::new();
        let first = CardBoard::new(store.clone(), BoardConfig::default()).expect("first");
        first.seed(vec![card("c1", "now", Priority::P1)]);
        let second = CardBoard::new(store, BoardConfig::default()).expect("second");
        assert_eq!(ids(&second.cards()), vec!["c1"]);
    }
}
