//! Studytimer - a terminal study-session timer.
//!
//! Reads commands from stdin while a background clock drives the countdown.

use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::sync::mpsc::{self, Sender};
use std::thread;

use studytimer::command::{self, Command, EventResult};
use studytimer::config::{Config, ENV_USER};
use studytimer::engine::{Collaborators, TimerEngine};
use studytimer::notifications::{self, DesktopNotifier};
use studytimer::persistence::Database;
use studytimer::timer::{SystemClock, TimerMessage};

const HELP: &str = "commands: start, pause, reset, focus, short, long, \
                    set <focus|short|long|cycle> <n>, goal <minutes>, status, quit";

/// Forwards parsed stdin lines to the main loop.
fn read_commands(tx: Sender<TimerMessage>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match Command::parse(&line) {
            Ok(command) => {
                if tx.send(TimerMessage::Command(command)).is_err() {
                    return;
                }
            }
            Err(e) => eprintln!("{} ({})", e, HELP),
        }
    }
    let _ = tx.send(TimerMessage::InputClosed);
}

fn print_status(engine: &TimerEngine) {
    println!("{}", engine.status_line());
}

/// Rewrites the current terminal line while the countdown runs.
fn print_tick(engine: &TimerEngine) {
    print!("\r{}  ", engine.status_line());
    let _ = io::stdout().flush();
}

fn report_failures(engine: &mut TimerEngine) {
    for failure in engine.drain_failures() {
        eprintln!("\n{}", failure);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let db = Rc::new(Database::open(&config.db_path)?);
    log::info!("Using database at {}", config.db_path.display());

    let (tx, rx) = mpsc::channel();

    let deps = Collaborators {
        settings: Box::new(Rc::clone(&db)),
        sessions: Box::new(Rc::clone(&db)),
        goals: Box::new(db),
        clock: Box::new(SystemClock::new(tx.clone())),
        // Audio is created on the main thread to avoid Send issues
        notifier: Box::new(DesktopNotifier::new(
            config.sound_enabled,
            config.notifications_enabled,
        )),
    };
    let mut engine = TimerEngine::new(config.user, deps);

    match engine.user() {
        Some(user) => println!("Signed in as {}", user),
        None => println!(
            "No user set ({}); progress is kept for this run only",
            ENV_USER
        ),
    }
    println!("{}", HELP);
    print_status(&engine);
    report_failures(&mut engine);

    thread::spawn(move || read_commands(tx));

    for message in rx {
        match message {
            TimerMessage::Tick(subscription) => {
                let (changed, completion) = engine.handle_tick(subscription);
                if let Some(event) = completion {
                    println!();
                    println!("{}", notifications::completion_title(&event));
                    println!("{}", notifications::completion_body(&event));
                    print_status(&engine);
                } else if changed {
                    print_tick(&engine);
                }
            }
            TimerMessage::Command(command) => match command::apply(&mut engine, command) {
                EventResult::Quit => break,
                EventResult::StateChanged => {
                    println!();
                    print_status(&engine);
                }
                EventResult::GoalUpdated(confirmation) => {
                    println!();
                    println!("{}", confirmation);
                    print_status(&engine);
                }
                EventResult::Rejected(e) => eprintln!("\n{}", e),
            },
            TimerMessage::InputClosed => break,
        }
        report_failures(&mut engine);
    }

    Ok(())
}
