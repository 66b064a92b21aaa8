use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("c-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A named lane of the board. Names are lowercase identifiers; `all` is
/// reserved for the aggregate view and never names a real lane.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Horizon(String);

impl Horizon {
    pub const DONE: &'static str = "done";
    pub const ALL: &'static str = "all";

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let name = raw.trim().to_ascii_lowercase();
        if name.is_empty() {
            bail!("horizon name cannot be empty");
        }
        if name == Self::ALL {
            bail!("'{}' is reserved for the aggregate view", Self::ALL);
        }
        if !name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            bail!("invalid horizon name: {raw}");
        }
        Ok(Self(name))
    }

    pub fn done() -> Self {
        Self(Self::DONE.to_string())
    }

    pub fn is_done(&self) -> bool {
        self.0 == Self::DONE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Horizon {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Horizon {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Horizon> for String {
    fn from(value: Horizon) -> Self {
        value.0
    }
}

/// The configured, closed set of lanes. Always contains `done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HorizonSet(Vec<Horizon>);

impl HorizonSet {
    pub fn new(horizons: Vec<Horizon>) -> anyhow::Result<Self> {
        for (idx, horizon) in horizons.iter().enumerate() {
            if horizons[..idx].contains(horizon) {
                bail!("duplicate horizon: {horizon}");
            }
        }
        if !horizons.iter().any(Horizon::is_done) {
            bail!("horizon set must include '{}'", Horizon::DONE);
        }
        Ok(Self(horizons))
    }

    /// Parses a comma separated list such as `inbox,now,next,later,done`.
    pub fn parse_list(raw: &str) -> anyhow::Result<Self> {
        let horizons = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Horizon::parse)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Self::new(horizons)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|h| h.as_str() == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|h| h.as_str() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Horizon> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for HorizonSet {
    fn default() -> Self {
        Self(
            ["inbox", "now", "next", "later", Horizon::DONE]
                .into_iter()
                .map(|name| Horizon(name.to_string()))
                .collect(),
        )
    }
}

/// Badge tier. Never used for ordering cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    P1,
    P2,
    #[default]
    P3,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::P1 => "p1",
            Priority::P2 => "p2",
            Priority::P3 => "p3",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p1" | "1" | "high" => Ok(Priority::P1),
            "p2" | "2" | "medium" => Ok(Priority::P2),
            "p3" | "3" | "low" => Ok(Priority::P3),
            other => Err(anyhow!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

/// Where a card sits on the board. Only the done state carries a close time.
#[derive(Debug, Clone, PartialEq)]
pub enum CardState {
    Open { horizon: Horizon },
    Done { closed_at: DateTime<Utc> },
}

impl CardState {
    /// Returns `None` for `done`, which has to go through [`CardState::Done`].
    pub fn open(horizon: Horizon) -> Option<Self> {
        if horizon.is_done() {
            None
        } else {
            Some(CardState::Open { horizon })
        }
    }

    pub fn enter(horizon: Horizon, now: DateTime<Utc>) -> Self {
        match Self::open(horizon) {
            Some(open) => open,
            None => CardState::Done { closed_at: now },
        }
    }

    pub fn horizon(&self) -> &str {
        match self {
            CardState::Open { horizon } => horizon.as_str(),
            CardState::Done { .. } => Horizon::DONE,
        }
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            CardState::Open { .. } => None,
            CardState::Done { closed_at } => Some(*closed_at),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, CardState::Done { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CardRecord", into = "CardRecord")]
pub struct Card {
    pub id: CardId,
    pub title: String,
    pub summary: String,
    pub priority: Priority,
    pub state: CardState,
    pub coords: Option<Coordinates>,
}

impl Card {
    pub fn new(
        id: CardId,
        title: impl Into<String>,
        horizon: Horizon,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            summary: String::new(),
            priority,
            state: CardState::enter(horizon, now),
            coords: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn horizon(&self) -> &str {
        self.state.horizon()
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.state.closed_at()
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }
}

/// Input for appending a card to the board.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub title: String,
    pub summary: String,
    pub horizon: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardRecord {
    id: CardId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    priority: Priority,
    horizon: Horizon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<f64>,
}

impl TryFrom<CardRecord> for Card {
    type Error = anyhow::Error;

    fn try_from(record: CardRecord) -> Result<Self, Self::Error> {
        let state = match (record.horizon.is_done(), record.closed_at) {
            (true, Some(closed_at)) => CardState::Done { closed_at },
            (true, None) => bail!("card {} is done but has no closedAt", record.id),
            (false, Some(_)) => bail!(
                "card {} has closedAt outside of done ({})",
                record.id,
                record.horizon
            ),
            (false, None) => CardState::Open {
                horizon: record.horizon,
            },
        };

        let coords = match (record.x, record.y) {
            (Some(x), Some(y)) => Some(Coordinates { x, y }),
            (None, None) => None,
            _ => bail!("card {} has only one freeform coordinate", record.id),
        };

        Ok(Card {
            id: record.id,
            title: record.title,
            summary: record.summary,
            priority: record.priority,
            state,
            coords,
        })
    }
}

impl From<Card> for CardRecord {
    fn from(card: Card) -> Self {
        let (horizon, closed_at) = match card.state {
            CardState::Open { horizon } => (horizon, None),
            CardState::Done { closed_at } => (Horizon::done(), Some(closed_at)),
        };
        CardRecord {
            id: card.id,
            title: card.title,
            summary: card.summary,
            priority: card.priority,
            horizon,
            closed_at,
            x: card.coords.map(|c| c.x),
            y: card.coords.map(|c| c.y),
        }
    }
}
