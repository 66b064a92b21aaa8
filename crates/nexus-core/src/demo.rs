use chrono::{DateTime, Utc};

use crate::card::{Card, CardId, Horizon, HorizonSet, Priority};

const DEMO: [(&str, &str, Priority, &str, &str); 8] = [
    (
        "c-101",
        "now",
        Priority::P1,
        "Review quarterly reports",
        "Final pass on the Q4 statements before the board meeting.",
    ),
    (
        "c-102",
        "now",
        Priority::P1,
        "Server outage analysis",
        "Root cause for yesterday's downtime.",
    ),
    (
        "c-201",
        "next",
        Priority::P2,
        "Update user permissions",
        "Roll out the new RBAC roles.",
    ),
    (
        "c-202",
        "next",
        Priority::P2,
        "Design system migration",
        "Migration guide for button components needs review.",
    ),
    (
        "c-301",
        "inbox",
        Priority::P3,
        "New feature request",
        "Dark mode toggle requested by users.",
    ),
    (
        "c-302",
        "inbox",
        Priority::P1,
        "Bug report: login",
        "Users hitting a 404 on the login page.",
    ),
    ("c-303", "inbox", Priority::P3, "Team sync notes", "Weekly sync notes."),
    (
        "c-401",
        "later",
        Priority::P3,
        "Q2 roadmap planning",
        "Early discussion of Q2 goals.",
    ),
];

/// The demo board shown by a fresh dashboard, restricted to `horizons`.
pub fn demo_cards(horizons: &HorizonSet, now: DateTime<Utc>) -> Vec<Card> {
    DEMO.iter()
        .filter(|(_, horizon, ..)| horizons.contains(horizon))
        .filter_map(|(id, horizon, priority, title, summary)| {
            let horizon = Horizon::parse(horizon).ok()?;
            Some(Card::new(CardId::new(*id), *title, horizon, *priority, now).with_summary(*summary))
        })
        .collect()
}
