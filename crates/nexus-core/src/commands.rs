use anyhow::{anyhow, bail, ensure};
use chrono::Utc;
use tracing::{debug, info};

use crate::board::{CardBoard, HorizonFilter, Placement};
use crate::card::{NewCard, Priority};
use crate::cli::Command;
use crate::demo::demo_cards;
use crate::render::Renderer;

#[tracing::instrument(skip(board, renderer))]
pub fn dispatch(
    board: &CardBoard,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    if let Some(err) = board.load_error()
        && !command.is_read_only()
    {
        bail!("stored cards could not be read, refusing to modify the board: {err}");
    }

    match command {
        Command::List { horizon } => {
            let filter = HorizonFilter::parse(&horizon)?;
            if let HorizonFilter::Lane(lane) = &filter {
                ensure!(
                    board.config().horizons.contains(lane.as_str()),
                    "unknown horizon: {lane}"
                );
            }
            let cards = board.cards_matching(&filter);
            debug!(horizon = %horizon, count = cards.len(), "listing cards");
            renderer.print_card_table(&cards)
        }
        Command::Stats => renderer.print_stats(&board.get_card_stats()),
        Command::Show { id } => {
            let card = board
                .get_card(&id)
                .ok_or_else(|| anyhow!("no card with id {id}"))?;
            renderer.print_card_info(&card)
        }
        Command::Add {
            horizon,
            priority,
            summary,
            title,
        } => {
            let priority: Priority = priority.parse()?;
            let id = board
                .add_card(NewCard {
                    title: title.join(" "),
                    summary,
                    horizon: horizon.clone(),
                    priority,
                })
                .ok_or_else(|| anyhow!("cannot add card to horizon {horizon}"))?;
            println!("Created card {id}.");
            Ok(())
        }
        Command::Move { id, horizon } => {
            ensure!(
                board.move_card(&id, &horizon),
                "cannot move card {id} to {horizon}"
            );
            println!("Moved card {id} to {horizon}.");
            Ok(())
        }
        Command::Reorder {
            id,
            placement,
            target,
        } => {
            let placement: Placement = placement.parse()?;
            ensure!(
                board.move_card_relative(&id, &target, placement),
                "cannot move card {id} {placement} {target}"
            );
            println!("Moved card {id} {placement} {target}.");
            Ok(())
        }
        Command::Place { id, x, y } => {
            ensure!(
                board.update_card_position(&id, x, y),
                "cannot place card {id} at {x},{y}"
            );
            println!("Placed card {id} at {x},{y}.");
            Ok(())
        }
        Command::Done { id } => {
            ensure!(board.mark_done(&id), "cannot mark card {id} done");
            println!("Completed card {id}.");
            Ok(())
        }
        Command::Seed { force } => {
            let existing = board.cards().len();
            if existing > 0 && !force {
                bail!("board already has {existing} cards; pass --force to replace them");
            }
            let cards = demo_cards(&board.config().horizons, Utc::now());
            let count = cards.len();
            board.seed(cards);
            info!(count, "seeded demo board");
            println!("Seeded {count} cards.");
            Ok(())
        }
    }
}
