use std::io::{self, BufRead};
use std::thread;

use crossbeam_channel::{unbounded, Receiver};
use tracing::{info, warn};

use meta_sim::commands::{parse_command_line, DriverCommand, HELP};
use meta_sim::{CycleReport, MetaError, MetaSimulation};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut sim = MetaSimulation::from_env();
    let command_rx = spawn_stdin_listener();

    info!(
        target: "meta_sim::driver",
        week = sim.week(),
        phase = %sim.phase(),
        "Meta simulation driver ready"
    );
    println!("{HELP}");

    while let Ok(command) = command_rx.recv() {
        if command == DriverCommand::Quit {
            break;
        }
        if let Err(err) = handle_command(&mut sim, command) {
            warn!(target: "meta_sim::driver", error = %err, "command.failed");
            println!("error: {err}");
        }
    }
}

fn spawn_stdin_listener() -> Receiver<DriverCommand> {
    let (sender, receiver) = unbounded::<DriverCommand>();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(target: "meta_sim::driver", error = %err, "stdin.read_failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command_line(&line) {
                Ok(cmd) => {
                    if sender.send(cmd).is_err() {
                        break;
                    }
                }
                Err(err) => println!("error: {err}"),
            }
        }
        let _ = sender.send(DriverCommand::Quit);
    });
    receiver
}

fn handle_command(sim: &mut MetaSimulation, command: DriverCommand) -> Result<(), MetaError> {
    match command {
        DriverCommand::Help => println!("{HELP}"),
        DriverCommand::Quit => {}
        DriverCommand::Status => print_status(sim),
        DriverCommand::Phase(phase) => {
            let report = sim.advance_phase(phase);
            println!("entered {phase} (week {})", sim.week());
            print_report(&report);
        }
        DriverCommand::Week => {
            let report = sim.advance_week();
            println!("week {}", sim.week());
            print_report(&report);
        }
        DriverCommand::Time(dt) => {
            let report = sim.advance_time(dt);
            print_report(&report);
        }
        DriverCommand::Modify {
            character,
            stat,
            percent,
        } => {
            let change = sim.modify_stat(character, stat, percent)?;
            println!(
                "{character} {stat}: {:.1} -> {:.1}",
                change.previous, change.value
            );
        }
        DriverCommand::Set {
            character,
            stat,
            value,
        } => {
            let change = sim.set_stat(character, stat, value)?;
            println!(
                "{character} {stat}: {:.1} -> {:.1}",
                change.previous, change.value
            );
        }
        DriverCommand::Get { character, stat } => {
            println!("{character} {stat} = {:.2}", sim.get_stat(character, stat)?);
        }
        DriverCommand::Undo(character) => match sim.undo_last_modifier(character)? {
            Some(modifier) => println!(
                "{character} {} restored to {:.1}",
                modifier.stat, modifier.previous
            ),
            None => println!("{character} has no modifiers to undo"),
        },
        DriverCommand::Reset => {
            sim.reset_all_characters();
            println!("all characters reset to base stats");
        }
        DriverCommand::Recalculate => {
            let report = sim.recalculate_win_rates();
            for (archetype, entry) in &report.entries {
                println!(
                    "{archetype:<8} {:>5.1}%  (target {:.1}, matchup {:+.2}, popularity {:+.2})",
                    entry.value, entry.target, entry.matchup, entry.popularity
                );
            }
        }
        DriverCommand::Trigger(id) => {
            let instance = sim.trigger_catalog_event(&id)?;
            println!("spawned #{instance} ({id})");
        }
        DriverCommand::Display(id) => {
            sim.mark_event_displayed(id)?;
            println!("event #{id} displayed");
        }
        DriverCommand::Resolve { id, response } => {
            let resolution = sim.resolve_event(id, &response)?;
            println!(
                "#{id} {} -> {:?}, sentiment {:.1} -> {:.1}",
                resolution.response_id,
                resolution.outcome,
                resolution.sentiment_before,
                resolution.sentiment_after
            );
            if let Some(message) = &resolution.message {
                println!("  {message}");
            }
        }
        DriverCommand::Expire(id) => {
            let resolution = sim.force_expire_event(id)?;
            println!("#{id} expired ({})", resolution.response_id);
        }
        DriverCommand::ClearEvents => {
            let cleared = sim.clear_active_events();
            println!("expired {} events", cleared.len());
        }
        DriverCommand::Events => {
            if sim.active_events().is_empty() {
                println!("no active events");
            }
            for event in sim.active_events() {
                let responses: Vec<String> = event
                    .definition
                    .responses
                    .iter()
                    .map(|response| format!("{} [{}]", response.id, response.cost))
                    .collect();
                println!(
                    "#{} {:?} {} ({:.0}s left): {}",
                    event.id,
                    event.state,
                    event.definition.title,
                    event.time_remaining,
                    responses.join(", ")
                );
            }
        }
        DriverCommand::History => {
            for resolution in sim.event_history() {
                println!(
                    "week {} #{} {} -> {} ({:?})",
                    resolution.week,
                    resolution.id,
                    resolution.definition_id,
                    resolution.response_id,
                    resolution.outcome
                );
            }
        }
        DriverCommand::Health => {
            let health = sim.meta_health();
            println!(
                "meta health {:.1} (diversity {:.1}, balance {:.1}, engagement {:.1})",
                health.overall, health.diversity, health.balance, health.engagement
            );
        }
    }
    Ok(())
}

fn print_status(sim: &MetaSimulation) {
    println!(
        "week {} | phase {} | cycle {} | sentiment {:.1} | resources {}",
        sim.week(),
        sim.phase(),
        sim.cycle(),
        sim.community_sentiment(),
        sim.available_resources()
    );
    for (archetype, table) in sim.stat_store().tables() {
        println!(
            "{archetype:<8} hp {:>5.1} dmg {:>5.1} spd {:>5.1} util {:>5.1} | win {:>5.1}% pop {:>5.1}%",
            table.get(meta_sim::StatKind::Health),
            table.get(meta_sim::StatKind::Damage),
            table.get(meta_sim::StatKind::Speed),
            table.get(meta_sim::StatKind::Utility),
            table.get(meta_sim::StatKind::WinRate),
            table.get(meta_sim::StatKind::Popularity),
        );
    }
}

fn print_report(report: &CycleReport) {
    if report.recalculated {
        println!("win rates recalculated");
    }
    for id in &report.spawned {
        println!("event #{id} spawned");
    }
    for resolution in &report.resolutions {
        println!(
            "event #{} {} ended ({:?})",
            resolution.id, resolution.definition_id, resolution.outcome
        );
    }
    for item in &report.feedback {
        println!("[{}] {}", item.tone.as_str(), item.message);
    }
}
