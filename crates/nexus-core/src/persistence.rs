use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::card::Card;

/// Best-effort storage for the card collection. The board logs and
/// swallows every error coming out of here.
pub trait CardPersistence: Send + Sync {
    fn load(&self) -> anyhow::Result<Vec<Card>>;
    fn save(&self, cards: &[Card]) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    pub data_dir: PathBuf,
    pub cards_path: PathBuf,
}

impl JsonFilePersistence {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let cards_path = data_dir.join("cards.json");
        info!(
            data_dir = %data_dir.display(),
            cards = %cards_path.display(),
            "opened card file"
        );

        Ok(Self {
            data_dir,
            cards_path,
        })
    }
}

impl CardPersistence for JsonFilePersistence {
    #[tracing::instrument(skip(self))]
    fn load(&self) -> anyhow::Result<Vec<Card>> {
        if !self.cards_path.exists() {
            debug!(file = %self.cards_path.display(), "no card file yet");
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.cards_path)
            .with_context(|| format!("failed reading {}", self.cards_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let cards: Vec<Card> = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.cards_path.display()))?;
        debug!(count = cards.len(), "loaded cards");
        Ok(cards)
    }

    #[tracing::instrument(skip(self, cards))]
    fn save(&self, cards: &[Card]) -> anyhow::Result<()> {
        debug!(file = %self.cards_path.display(), count = cards.len(), "saving cards atomically");

        let dir = self.cards_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, cards)?;
        writeln!(temp)?;
        temp.flush()?;

        temp.persist(&self.cards_path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.cards_path.display(), err))?;
        Ok(())
    }
}

/// Shared in-memory storage; clones see the same collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    cards: Arc<Mutex<Vec<Card>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cards(cards: Vec<Card>) -> Self {
        Self {
            cards: Arc::new(Mutex::new(cards)),
        }
    }

    pub fn snapshot(&self) -> Vec<Card> {
        self.cards.lock().clone()
    }
}

impl CardPersistence for MemoryPersistence {
    fn load(&self) -> anyhow::Result<Vec<Card>> {
        Ok(self.snapshot())
    }

    fn save(&self, cards: &[Card]) -> anyhow::Result<()> {
        *self.cards.lock() = cards.to_vec();
        Ok(())
    }
}
