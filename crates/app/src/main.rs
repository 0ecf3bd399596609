use std::fmt;

use services::{
    AppServices, Clock, CompletionReason, LoadOutcome, NextStep, ServiceError,
    SessionCompletion, StudyController, StudyPhase,
};
use study_api::{ClientConfig, InMemoryStudyApi};
use study_core::model::{DifficultyTier, Flashcard, FlashcardId};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidValue {
        flag: &'static str,
        source: study_core::Error,
    },
    InvalidCount { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, source } => write!(f, "invalid {flag} value: {source}"),
            ArgsError::InvalidCount { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArgsError::InvalidValue { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_count(raw: String, flag: &'static str) -> Result<u32, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidCount { flag, raw })
}

fn parse_tier(raw: &str) -> Result<DifficultyTier, ArgsError> {
    raw.parse::<DifficultyTier>()
        .map_err(|err| ArgsError::InvalidValue {
            flag: "--difficulty",
            source: err.into(),
        })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- login    --email <email> --password <password>");
    eprintln!("  cargo run -p app -- register --email <email> --username <name> --password <password>");
    eprintln!("  cargo run -p app -- generate --topic <topic> (--text <text> | --file <path>)");
    eprintln!("                               [--count <1-20>] [--difficulty easy|medium|hard] [--offline]");
    eprintln!("  cargo run -p app -- study    [--topic <topic>] [--count <n>] [--offline]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  generate --count 5 --difficulty medium");
    eprintln!("  study    --count 10");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_API_BASE_URL, STUDY_API_TOKEN, STUDY_API_TIMEOUT_SECS, STUDY_API_MAX_RETRIES, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Login {
        email: String,
        password: String,
    },
    Register {
        email: String,
        username: String,
        password: String,
    },
    Generate {
        topic: String,
        text: TextSource,
        count: u32,
        difficulty: DifficultyTier,
        offline: bool,
    },
    Study {
        topic: Option<String>,
        count: u32,
        offline: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextSource {
    Inline(String),
    File(String),
}

impl Command {
    fn parse(name: &str, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut email = None;
        let mut username = None;
        let mut password = None;
        let mut topic = None;
        let mut text = None;
        let mut count = None;
        let mut difficulty = DifficultyTier::default();
        let mut offline = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--email" => email = Some(require_value(args, "--email")?),
                "--username" => username = Some(require_value(args, "--username")?),
                "--password" => password = Some(require_value(args, "--password")?),
                "--topic" => topic = Some(require_value(args, "--topic")?),
                "--text" => text = Some(TextSource::Inline(require_value(args, "--text")?)),
                "--file" => text = Some(TextSource::File(require_value(args, "--file")?)),
                "--count" => count = Some(parse_count(require_value(args, "--count")?, "--count")?),
                "--difficulty" => difficulty = parse_tier(&require_value(args, "--difficulty")?)?,
                "--offline" => offline = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        match name {
            "login" => Ok(Self::Login {
                email: email.ok_or(ArgsError::MissingFlag { flag: "--email" })?,
                password: password.ok_or(ArgsError::MissingFlag { flag: "--password" })?,
            }),
            "register" => Ok(Self::Register {
                email: email.ok_or(ArgsError::MissingFlag { flag: "--email" })?,
                username: username.ok_or(ArgsError::MissingFlag { flag: "--username" })?,
                password: password.ok_or(ArgsError::MissingFlag { flag: "--password" })?,
            }),
            "generate" => Ok(Self::Generate {
                topic: topic.ok_or(ArgsError::MissingFlag { flag: "--topic" })?,
                text: text.ok_or(ArgsError::MissingFlag { flag: "--text" })?,
                count: count.unwrap_or(5),
                difficulty,
                offline,
            }),
            "study" => Ok(Self::Study {
                topic,
                count: count.unwrap_or(10),
                offline,
            }),
            other => Err(ArgsError::UnknownArg(other.to_string())),
        }
    }

    fn offline(&self) -> bool {
        match self {
            Command::Generate { offline, .. } | Command::Study { offline, .. } => *offline,
            Command::Login { .. } | Command::Register { .. } => false,
        }
    }
}

/// Small built-in deck so `--offline` works without a running service.
fn demo_cards() -> Vec<Flashcard> {
    [
        ("What is the powerhouse of the cell?", "The mitochondrion", DifficultyTier::Easy),
        ("Which molecule carries amino acids to the ribosome?", "tRNA", DifficultyTier::Medium),
        ("What enzyme unwinds the DNA double helix?", "Helicase", DifficultyTier::Medium),
        ("In which phase do sister chromatids separate?", "Anaphase", DifficultyTier::Hard),
    ]
    .into_iter()
    .zip(1..)
    .map(|((question, answer, tier), id)| {
        Flashcard::new(FlashcardId::new(id), question, answer, tier).with_topic("Biology")
    })
    .collect()
}

fn build_services(offline: bool, clock: Clock) -> Result<AppServices, Box<dyn std::error::Error>> {
    if offline {
        tracing::info!("using the built-in offline study service");
        let api = InMemoryStudyApi::new()
            .with_clock(clock)
            .with_cards(demo_cards());
        return Ok(AppServices::in_memory(api, clock));
    }
    let config = ClientConfig::from_env()?;
    Ok(AppServices::from_config(config, clock)?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let name = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(flag) if flag == "--help" || flag == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(name) => name,
    };

    let command = Command::parse(&name, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let clock = Clock::default_clock();
    let app = build_services(command.offline(), clock)?;

    match command {
        Command::Login { email, password } => {
            let session = app.accounts().login(&email, &password).await?;
            println!(
                "Logged in as {}.",
                session.username.as_deref().unwrap_or(email.as_str())
            );
            println!("export STUDY_API_TOKEN={}", session.access_token);
        }
        Command::Register {
            email,
            username,
            password,
        } => {
            app.accounts().register(&email, &username, &password).await?;
            println!("Registered {username}. Run `login` to get an access token.");
        }
        Command::Generate {
            topic,
            text,
            count,
            difficulty,
            ..
        } => {
            let text = match text {
                TextSource::Inline(text) => text,
                TextSource::File(path) => tokio::fs::read_to_string(&path).await?,
            };
            let cards = app
                .generation()
                .generate(&text, &topic, count, difficulty)
                .await?;
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        Command::Study { topic, count, .. } => {
            let controller = app
                .study_loop()
                .start_session(topic.as_deref(), count)
                .await?;
            study(&controller).await?;
        }
    }
    Ok(())
}

async fn read_answer(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> std::io::Result<String> {
    eprint!("{prompt}");
    Ok(lines
        .next_line()
        .await?
        .map(|line| line.trim().to_lowercase())
        .unwrap_or_else(|| "q".into()))
}

/// The service rejected the credential in the middle of a session.
#[derive(Debug)]
struct LoggedOut;

impl fmt::Display for LoggedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("your login has expired; run `login` again and restart the session")
    }
}

impl std::error::Error for LoggedOut {}

fn session_error(err: ServiceError) -> Box<dyn std::error::Error> {
    if err.requires_login() {
        LoggedOut.into()
    } else {
        err.into()
    }
}

async fn study(controller: &StudyController) -> Result<(), Box<dyn std::error::Error>> {
    let result = study_cards(controller).await;
    match &result {
        Err(err) if err.is::<LoggedOut>() => controller.abandon(),
        Err(_) if controller.phase() != StudyPhase::Completed => {
            match controller.end_session().await {
                Ok(completion) => print_completion(&completion),
                Err(err) => tracing::warn!(error = %err, "could not end the study session"),
            }
        }
        _ => {}
    }
    result
}

async fn study_cards(controller: &StudyController) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut card = match controller.load_cards().await.map_err(session_error)? {
        LoadOutcome::Ready(card) => card,
        LoadOutcome::Empty(completion) => {
            print_completion(&completion);
            return Ok(());
        }
        LoadOutcome::Discarded => return Ok(()),
    };

    loop {
        println!();
        println!("[{}/{}] ({}) {}", card.position, card.total, card.difficulty, card.question);
        if read_answer(&mut lines, "Enter to reveal, q to quit: ").await? == "q" {
            let completion = controller.end_session().await?;
            print_completion(&completion);
            break;
        }

        let revealed = controller.reveal()?;
        println!("Answer: {}", revealed.answer.unwrap_or_default());

        let is_correct = loop {
            match read_answer(&mut lines, "Correct? [y/n]: ").await?.as_str() {
                "y" | "yes" => break true,
                "n" | "no" => break false,
                _ => {}
            }
        };

        let report = controller.answer(is_correct).await.map_err(session_error)?;
        if report.requires_login() {
            return Err(LoggedOut.into());
        }
        if let Some(err) = &report.submit_error {
            eprintln!("Could not save the answer ({err}); it will be resent at the end.");
        }
        println!(
            "Score {}/{} ({:.1}%), next difficulty: {}",
            report.stats.correct(),
            report.stats.total(),
            report.accuracy,
            report.tier
        );

        match report.next {
            NextStep::Present(next) => card = next,
            NextStep::Completed(completion) => {
                print_completion(&completion);
                break;
            }
            NextStep::Discarded => break,
        }
    }

    if !controller.pending_answers().is_empty() {
        let resubmit = controller.resubmit_pending().await?;
        println!(
            "Resent {} answer(s), {} still unsaved.",
            resubmit.delivered.len(),
            resubmit.still_pending
        );
    }
    Ok(())
}

fn print_completion(completion: &SessionCompletion) {
    let outcome = &completion.outcome;
    println!();
    match outcome.reason {
        CompletionReason::EmptyCardSet => println!("No cards to study for this session."),
        CompletionReason::EndedEarly => println!("Session ended early."),
        CompletionReason::Exhausted => println!("Session complete."),
    }
    if outcome.stats.total() > 0 {
        println!(
            "{} of {} correct ({:.1}%).",
            outcome.stats.correct(),
            outcome.stats.total(),
            outcome.accuracy
        );
    }
    if let Some(err) = &completion.completion_error {
        eprintln!("The service did not confirm completion: {err}");
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str, args: &[&str]) -> Result<Command, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_string());
        Command::parse(name, &mut iter)
    }

    #[test]
    fn auth_failures_end_the_study_loop() {
        let err = session_error(ServiceError::from(study_api::ApiError::Unauthorized));
        assert!(err.is::<LoggedOut>());

        let err = session_error(ServiceError::from(services::StateError::Busy));
        assert!(!err.is::<LoggedOut>());
    }

    #[test]
    fn study_defaults() {
        assert_eq!(
            parse("study", &[]).unwrap(),
            Command::Study {
                topic: None,
                count: 10,
                offline: false
            }
        );
    }

    #[test]
    fn generate_reads_all_flags() {
        let command = parse(
            "generate",
            &["--topic", "Bio", "--text", "cells", "--count", "3", "--difficulty", "HARD"],
        )
        .unwrap();
        assert_eq!(
            command,
            Command::Generate {
                topic: "Bio".into(),
                text: TextSource::Inline("cells".into()),
                count: 3,
                difficulty: DifficultyTier::Hard,
                offline: false,
            }
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse("study", &["--count"]),
            Err(ArgsError::MissingValue { flag: "--count" })
        ));
        assert!(matches!(
            parse("study", &["--count", "many"]),
            Err(ArgsError::InvalidCount { .. })
        ));
        assert!(matches!(
            parse("generate", &["--topic", "x", "--text", "y", "--difficulty", "expert"]),
            Err(ArgsError::InvalidValue { flag: "--difficulty", .. })
        ));
        assert!(matches!(
            parse("login", &["--email", "a@b.c"]),
            Err(ArgsError::MissingFlag { flag: "--password" })
        ));
        assert!(matches!(parse("dance", &[]), Err(ArgsError::UnknownArg(_))));
    }
}
