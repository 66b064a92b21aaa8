use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::card::{Card, Horizon, Priority};
use crate::config::Config;
use crate::stats::{CardStats, HorizonStats};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or("on");
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, cards))]
    pub fn print_card_table(&mut self, cards: &[Card]) -> anyhow::Result<()> {
        let rows = cards.iter().map(|card| self.card_row(card)).collect();
        write_table(io::stdout().lock(), card_headers(), rows)
    }

    #[tracing::instrument(skip(self, card), fields(id = %card.id))]
    pub fn print_card_info(&mut self, card: &Card) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", card.id)?;
        writeln!(out, "title     {}", card.title)?;
        writeln!(out, "horizon   {}", card.horizon())?;
        writeln!(out, "priority  {}", self.priority(card.priority))?;
        if !card.summary.is_empty() {
            writeln!(out, "summary   {}", card.summary)?;
        }
        if let Some(closed_at) = card.closed_at() {
            writeln!(out, "closed    {}", closed_at.format("%Y-%m-%d %H:%M:%SZ"))?;
        }
        if let Some(coords) = card.coords {
            writeln!(out, "position  {}, {}", coords.x, coords.y)?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, stats))]
    pub fn print_stats(&mut self, stats: &CardStats) -> anyhow::Result<()> {
        let headers = vec![
            "Horizon".to_string(),
            "Count".to_string(),
            "P1".to_string(),
            "P2".to_string(),
            "P3".to_string(),
            "Badge".to_string(),
        ];

        let mut rows: Vec<Vec<String>> = stats
            .horizons
            .iter()
            .map(|badge| self.stats_row(badge.horizon.as_str(), &badge.stats))
            .collect();
        rows.push(self.stats_row("all", &stats.all));

        let mut out = io::stdout().lock();
        write_table(&mut out, headers, rows)?;
        writeln!(out, "total {}", stats.total)?;
        Ok(())
    }

    fn card_row(&self, card: &Card) -> Vec<String> {
        let position = card
            .coords
            .map(|c| format!("{},{}", c.x, c.y))
            .unwrap_or_default();
        vec![
            self.paint(card.id.as_str(), "33"),
            card.horizon().to_string(),
            self.priority(card.priority),
            card.title.clone(),
            position,
        ]
    }

    fn stats_row(&self, horizon: &str, stats: &HorizonStats) -> Vec<String> {
        // Finished work never earns a priority badge.
        let badge = if horizon == Horizon::DONE {
            String::new()
        } else {
            stats
                .highest_priority()
                .map(|p| self.priority(p))
                .unwrap_or_default()
        };
        vec![
            horizon.to_string(),
            stats.count.to_string(),
            stats.p1.to_string(),
            stats.p2.to_string(),
            stats.p3.to_string(),
            badge,
        ]
    }

    fn priority(&self, priority: Priority) -> String {
        match priority {
            Priority::P1 => self.paint(priority.as_str(), "31"),
            Priority::P2 => self.paint(priority.as_str(), "33"),
            Priority::P3 => priority.as_str().to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn card_headers() -> Vec<String> {
    ["ID", "Horizon", "Pri", "Title", "Pos"]
        .into_iter()
        .map(ToString::to_string)
        .collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ", width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{Renderer, strip_ansi, write_table};
    use crate::config::Config;
    use crate::stats::HorizonStats;

    #[test]
    fn done_row_has_no_badge() {
        let renderer = Renderer::new(&Config::default()).expect("renderer");
        let stats = HorizonStats {
            count: 2,
            p1: 1,
            p2: 1,
            p3: 0,
        };

        let done = renderer.stats_row("done", &stats);
        assert_eq!(done[1], "2");
        assert_eq!(done[5], "");
        assert_eq!(strip_ansi(&renderer.stats_row("now", &stats)[5]), "p1");
    }

    #[test]
    fn table_pads_by_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".to_string(), "Title".to_string()],
            vec![
                vec!["\x1b[33mc-1\x1b[0m".to_string(), "Café sync".to_string()],
                vec!["c-22".to_string(), "日本".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID   Title     ");
        assert_eq!(lines[1], "---- --------- ");
        assert_eq!(strip_ansi(lines[2]), "c-1  Café sync ");
        assert_eq!(lines[3], "c-22 日本      ");
    }
}
