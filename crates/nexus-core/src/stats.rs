use serde::Serialize;

use crate::card::{Card, Horizon, HorizonSet, Priority};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HorizonStats {
    pub count: usize,
    pub p1: usize,
    pub p2: usize,
    pub p3: usize,
}

impl HorizonStats {
    fn record(&mut self, priority: Priority) {
        self.count += 1;
        match priority {
            Priority::P1 => self.p1 += 1,
            Priority::P2 => self.p2 += 1,
            Priority::P3 => self.p3 += 1,
        }
    }

    pub fn has_p1(&self) -> bool {
        self.p1 > 0
    }

    pub fn has_p2(&self) -> bool {
        self.p2 > 0
    }

    /// Tier used to color the lane badge.
    pub fn highest_priority(&self) -> Option<Priority> {
        if self.p1 > 0 {
            Some(Priority::P1)
        } else if self.p2 > 0 {
            Some(Priority::P2)
        } else if self.p3 > 0 {
            Some(Priority::P3)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HorizonBadge {
    pub horizon: Horizon,
    #[serde(flatten)]
    pub stats: HorizonStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardStats {
    pub total: usize,
    pub horizons: Vec<HorizonBadge>,
    pub all: HorizonStats,
}

impl CardStats {
    /// Single pass over `cards`. Lanes come out in configured order and are
    /// disjoint; the `all` bucket skips `done` unless `all_includes_done`.
    /// Cards outside the configured lanes are not counted anywhere.
    #[tracing::instrument(skip(cards, horizons))]
    pub fn compute(cards: &[Card], horizons: &HorizonSet, all_includes_done: bool) -> Self {
        let mut buckets = vec![HorizonStats::default(); horizons.len()];
        let mut all = HorizonStats::default();
        let mut total = 0;

        for card in cards {
            let Some(idx) = horizons.position(card.horizon()) else {
                continue;
            };
            total += 1;
            buckets[idx].record(card.priority);
            if all_includes_done || !card.is_done() {
                all.record(card.priority);
            }
        }

        let horizons = horizons
            .iter()
            .cloned()
            .zip(buckets)
            .map(|(horizon, stats)| HorizonBadge { horizon, stats })
            .collect();

        Self {
            total,
            horizons,
            all,
        }
    }

    pub fn horizon(&self, name: &str) -> Option<&HorizonStats> {
        if name == Horizon::ALL {
            return Some(&self.all);
        }
        self.horizons
            .iter()
            .find(|badge| badge.horizon.as_str() == name)
            .map(|badge| &badge.stats)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::CardStats;
    use crate::card::{Card, CardId, Horizon, HorizonSet, Priority};

    fn card(id: &str, horizon: &str, priority: Priority) -> Card {
        let now = Utc
            .with_ymd_and_hms(2026, 1, 22, 2, 47, 0)
            .single()
            .expect("valid time");
        Card::new(
            CardId::new(id),
            id,
            Horizon::parse(horizon).expect("horizon"),
            priority,
            now,
        )
    }

    #[test]
    fn lane_counts_sum_to_total() {
        let cards = vec![
            card("a", "now", Priority::P1),
            card("b", "now", Priority::P3),
            card("c", "next", Priority::P2),
            card("d", "done", Priority::P1),
            card("e", "inbox", Priority::P3),
        ];
        let stats = CardStats::compute(&cards, &HorizonSet::default(), false);

        let sum: usize = stats.horizons.iter().map(|b| b.stats.count).sum();
        assert_eq!(sum, stats.total);
        assert_eq!(stats.total, 5);

        let now = stats.horizon("now").expect("now bucket");
        assert_eq!(now.count, 2);
        assert!(now.has_p1());
        assert!(!now.has_p2());
        assert_eq!(stats.horizon("later").expect("later").count, 0);
        assert_eq!(stats.horizon("later").expect("later").highest_priority(), None);
    }

    #[test]
    fn all_bucket_follows_done_policy() {
        let cards = vec![card("a", "now", Priority::P3), card("b", "done", Priority::P1)];

        let excluding = CardStats::compute(&cards, &HorizonSet::default(), false);
        assert_eq!(excluding.all.count, 1);
        assert!(!excluding.all.has_p1());

        let including = CardStats::compute(&cards, &HorizonSet::default(), true);
        assert_eq!(including.all.count, 2);
        assert_eq!(including.horizon("all").map(|s| s.p1), Some(1));
    }

    #[test]
    fn unconfigured_lanes_stay_out_of_counts() {
        let cards = vec![
            card("a", "now", Priority::P1),
            card("b", "later", Priority::P1),
            card("c", "done", Priority::P2),
        ];
        let set = HorizonSet::parse_list("now,done").expect("set");
        let stats = CardStats::compute(&cards, &set, true);

        assert_eq!(stats.total, 2);
        assert_eq!(stats.all.count, 2);
        assert_eq!(stats.all.p1, 1);
        assert_eq!(stats.horizon("later"), None);
    }

    #[test]
    fn lanes_keep_configured_order() {
        let set = HorizonSet::parse_list("later,now,done").expect("set");
        let stats = CardStats::compute(&[], &set, false);
        let names: Vec<&str> = stats.horizons.iter().map(|b| b.horizon.as_str()).collect();
        assert_eq!(names, vec!["later", "now", "done"]);
    }
}
