//! Reader-desk executable.
//!
//! # Responsibility
//! - Wire config, logging, storage, the desk and the reconciliation ticker.
//! - Treat each stdin line as a card read, or a `:command` for the operator.

use rollcall_core::{
    AttendanceDesk, CaptureKind, DeskSettings, ReconciliationTicker, RollcallConfig, ScanOutcome,
    ServiceError, SqliteStore, SystemClock,
};
use std::error::Error;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

type Desk = AttendanceDesk<SqliteStore>;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Scan(String),
    StartCapture(CaptureKind),
    Cancel,
    Captured,
    Add(String),
    Remove,
    Today,
    Summary,
    Recent,
    Schedule {
        date: Option<String>,
        start: String,
        end: String,
    },
    Help,
    Quit,
    Unknown(String),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rollcall: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => RollcallConfig::load(path)?,
        None => RollcallConfig::default(),
    };
    if let Some(dir) = &config.logging.dir {
        rollcall_core::init_logging(&config.logging.level, dir)?;
    }

    let store = Arc::new(SqliteStore::open(&config.storage.db_path)?);
    let desk = Arc::new(AttendanceDesk::new(
        store,
        Arc::new(SystemClock),
        DeskSettings::from_config(&config)?,
    ));
    let ticker = ReconciliationTicker::start(Arc::clone(&desk), config.tick_interval(), "desk")?;

    println!(
        "rollcall {} ready; db={} (type :help)",
        rollcall_core::core_version(),
        config.storage.db_path.display()
    );
    for line in io::stdin().lock().lines() {
        let command = parse_line(&line?);
        if command == Command::Quit {
            break;
        }
        if let Err(err) = execute(&desk, command) {
            println!("error: {err}");
        }
    }

    ticker.stop();
    Ok(())
}

fn parse_line(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Scan(line.to_string());
    };
    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();
    match name {
        "enroll" => Command::StartCapture(CaptureKind::Enroll),
        "delete" => Command::StartCapture(CaptureKind::Delete),
        "cancel" => Command::Cancel,
        "captured" => Command::Captured,
        "add" => Command::Add(args.to_string()),
        "remove" => Command::Remove,
        "today" => Command::Today,
        "summary" => Command::Summary,
        "recent" => Command::Recent,
        "schedule" => parse_schedule(args).unwrap_or_else(|| Command::Unknown(line.to_string())),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

fn parse_schedule(args: &str) -> Option<Command> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (date, start, end) = match parts.as_slice() {
        [start, end] => (None, *start, *end),
        [date, start, end] => (Some((*date).to_string()), *start, *end),
        _ => return None,
    };
    Some(Command::Schedule {
        date,
        start: start.to_string(),
        end: end.to_string(),
    })
}

fn execute(desk: &Desk, command: Command) -> Result<(), ServiceError> {
    match command {
        Command::Scan(uid) => match desk.scan(&uid)? {
            ScanOutcome::Captured(captured) => {
                println!("captured {} for {}", captured.uid, captured.kind.as_str());
            }
            ScanOutcome::Attendance(outcome) if outcome.already => println!(
                "{}: already recorded as {}",
                outcome.student.name,
                outcome.status.as_str()
            ),
            ScanOutcome::Attendance(outcome) => println!(
                "{}: {} at {}",
                outcome.student.name,
                outcome.status.as_str(),
                outcome.recorded_time.as_ref().map_or("--:--", |time| time.as_str())
            ),
        },
        Command::StartCapture(kind) => {
            desk.start_capture_session(kind);
            println!("waiting for a card to {}", kind.as_str());
        }
        Command::Cancel => {
            desk.cancel_capture_session();
            println!("capture cancelled");
        }
        Command::Captured => match desk.peek_captured_uid() {
            Some(uid) => println!("captured {uid}"),
            None => println!("no captured card"),
        },
        Command::Add(name) => match desk.peek_captured_uid() {
            Some(uid) => {
                let student = desk.enroll_student(&name, uid.as_str())?;
                println!("enrolled #{} {}", student.id, student.name);
            }
            None => println!("scan a card after :enroll first"),
        },
        Command::Remove => match desk.peek_captured_uid() {
            Some(uid) => {
                let student = desk.remove_student_by_card(uid.as_str())?;
                println!("removed #{} {}", student.id, student.name);
            }
            None => println!("scan a card after :delete first"),
        },
        Command::Today => {
            let today = desk.today();
            let names = desk
                .list_students()?
                .into_iter()
                .map(|student| (student.id, student.name))
                .collect::<std::collections::HashMap<_, _>>();
            for record in desk.get_daily_attendance(today.as_str())? {
                println!(
                    "{:<24} {:<8} {}",
                    names.get(&record.student_id).map_or("?", String::as_str),
                    record.status.as_str(),
                    record.recorded_time.as_ref().map_or("--:--", |time| time.as_str())
                );
            }
        }
        Command::Summary => {
            let today = desk.today();
            let schedule = desk.effective_schedule(today.as_str())?;
            let summary = desk.daily_summary(today.as_str())?;
            println!(
                "{today} {}-{}{}: present={} late={} absent={} unrecorded={} enrolled={}",
                schedule.start_time,
                schedule.end_time,
                if schedule.is_custom { " (custom)" } else { "" },
                summary.present,
                summary.late,
                summary.absent,
                summary.unrecorded,
                summary.enrolled
            );
            if let Some(at) = desk.last_reconciliation() {
                println!("last reconciliation {}", at.to_rfc3339());
            }
        }
        Command::Recent => {
            for event in desk.recent_scans() {
                println!("{} {}", event.timestamp.to_rfc3339(), event.message());
            }
        }
        Command::Schedule { date, start, end } => {
            let scope = desk.set_schedule(date.as_deref(), &start, &end)?;
            println!("schedule saved ({scope:?})");
        }
        Command::Help => println!(
            "<uid> | :enroll | :delete | :cancel | :captured | :add <name> | :remove | \
             :today | :summary | :recent | :schedule [YYYY-MM-DD] HH:MM HH:MM | :quit"
        ),
        Command::Quit => {}
        Command::Unknown(line) => println!("unknown command `{line}`; try :help"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_line, Command};
    use rollcall_core::CaptureKind;

    #[test]
    fn plain_lines_are_scans() {
        assert_eq!(parse_line(" 04:A2:19 \n"), Command::Scan("04:A2:19".to_string()));
    }

    #[test]
    fn commands_are_parsed() {
        assert_eq!(
            parse_line(":enroll"),
            Command::StartCapture(CaptureKind::Enroll)
        );
        assert_eq!(
            parse_line(":add  Ali Valiyev "),
            Command::Add("Ali Valiyev".to_string())
        );
        assert_eq!(
            parse_line(":schedule 2024-09-16 09:30 10:30"),
            Command::Schedule {
                date: Some("2024-09-16".to_string()),
                start: "09:30".to_string(),
                end: "10:30".to_string(),
            }
        );
        assert_eq!(
            parse_line(":schedule 09:30"),
            Command::Unknown(":schedule 09:30".to_string())
        );
    }
}
