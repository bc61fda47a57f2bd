use crate::args::{Cli, Commands, GrammarArgs, InitArgs};
use anyhow::{bail, Context, Result};
use chomsky::config::Config;
use chomsky::grammar::builder::{GrammarBuilder, GrammarError};
use chomsky::grammar::engine::DerivationState;
use chomsky::grammar::symbol::single_char;
use chomsky::history::CompletionRecord;
use chomsky::io::display::{format_chain, format_numbered_rule, format_sentential};
use chomsky::io::snapshot::UserData;
use chomsky::notification::Notice;
use chomsky::io::store::{FileSnapshotStore, SnapshotStore, StoreOutcome};
use chomsky::session::{Command, Controller, ControllerEvent, Session, SessionError};
use chomsky::utils::export::export_derivations;
use chomsky::utils::io::{format_from_extension, OutputFormat};
use chomsky::DerivationError;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Validates the configuration and dispatches the subcommand.
pub fn run(cli: Cli) -> Result<()> {
    let autosave = matches!(cli.command, Commands::Derive { autosave: true });
    let config = Config::new(cli.snapshot.clone(), Duration::from_millis(cli.notice_ms), autosave);
    config.validate()?;

    match cli.command {
        Commands::Init(args) => init_snapshot(&config, &args),
        Commands::Grammar(args) => author_grammar(&config, args),
        Commands::Show => show_snapshot(&config),
        Commands::Derive { .. } => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            derive_interactive(&config, stdin.lock(), &mut stdout.lock())
        }
        Commands::Export { output, format } => export_snapshot(&config, &output, format.as_deref()),
    }
}

fn open_session(store: &mut FileSnapshotStore) -> Result<Session> {
    match store.load() {
        StoreOutcome::Success(document) => Session::open(document)
            .with_context(|| format!("Failed to open snapshot {}", store.path().display())),
        StoreOutcome::Cancelled => bail!("Loading {} was cancelled", store.path().display()),
        StoreOutcome::Failed(message) => bail!("{}", message),
    }
}

fn save_session(store: &mut FileSnapshotStore, session: &Session) -> Result<()> {
    match store.save(session.document()) {
        StoreOutcome::Success(()) => Ok(()),
        StoreOutcome::Cancelled => bail!("Saving {} was cancelled", store.path().display()),
        StoreOutcome::Failed(message) => bail!("{}", message),
    }
}

fn init_snapshot(config: &Config, args: &InitArgs) -> Result<()> {
    if config.snapshot_path.exists() && !args.force {
        bail!(
            "Snapshot {} already exists (use --force to overwrite)",
            config.snapshot_path.display()
        );
    }
    let user = UserData::new(&args.last_name, &args.first_name, &args.patronymic, &args.group)
        .context("Invalid user data")?;
    let session = Session::new(user);
    let mut store = FileSnapshotStore::new(&config.snapshot_path);
    save_session(&mut store, &session)?;
    println!(
        "Created snapshot for {} at {}",
        session.user().short_name(),
        config.snapshot_path.display()
    );
    Ok(())
}

fn symbol_arg(input: &str) -> Result<char> {
    single_char(input).with_context(|| format!("'{}' is not a single symbol", input))
}

fn parse_rule_arg(input: &str) -> Result<(&str, &str)> {
    input
        .split_once('=')
        .with_context(|| format!("Rule '{}' must be written LEFT=RIGHT", input))
}

// A rejected edit is reported and remembered as a notice. Saving is refused
// while the latest notice is still inside the notice window.
fn report_rejected<T>(
    rejected: &mut Option<Notice<String>>,
    result: Result<T, GrammarError>,
    what: impl FnOnce() -> String,
) {
    if let Err(e) = result {
        let message = format!("{}: {}", what(), e);
        eprintln!("{}", message);
        *rejected = Some(Notice::new(message));
    }
}

fn author_grammar(config: &Config, edits: GrammarArgs) -> Result<()> {
    let mut store = FileSnapshotStore::new(&config.snapshot_path);
    let mut session = open_session(&mut store)?;

    let builder = match session.grammar() {
        Some(grammar) if !edits.fresh => GrammarBuilder::from_grammar(grammar),
        _ => GrammarBuilder::new(),
    };
    let mut builder = builder.with_notice_window(config.notice_window);
    let mut rejected = None;

    // Highest ordinal first so earlier removals do not shift later ones.
    let mut remove_rules = edits.remove_rules;
    remove_rules.sort_unstable_by(|a, b| b.cmp(a));
    remove_rules.dedup();
    for ordinal in remove_rules {
        report_rejected(&mut rejected, builder.remove_rule(ordinal), || format!("Cannot remove rule {}", ordinal));
    }
    for symbol in &edits.remove_terminals {
        let symbol_char = symbol_arg(symbol)?;
        report_rejected(&mut rejected, builder.remove_terminal(symbol_char), || {
            format!("Cannot remove terminal '{}'", symbol)
        });
    }
    for symbol in &edits.remove_non_terminals {
        let symbol_char = symbol_arg(symbol)?;
        report_rejected(&mut rejected, builder.remove_non_terminal(symbol_char), || {
            format!("Cannot remove non-terminal '{}'", symbol)
        });
    }
    for symbol in &edits.terminals {
        report_rejected(&mut rejected, builder.add_terminal(symbol), || format!("Cannot add terminal '{}'", symbol));
    }
    for symbol in &edits.non_terminals {
        report_rejected(&mut rejected, builder.add_non_terminal(symbol), || {
            format!("Cannot add non-terminal '{}'", symbol)
        });
    }
    for rule in &edits.rules {
        let (left, right) = parse_rule_arg(rule)?;
        report_rejected(&mut rejected, builder.add_rule(left, right), || format!("Cannot add rule '{}'", rule));
    }

    if let Some(message) = rejected
        .as_ref()
        .and_then(|notice| notice.active(Instant::now(), config.notice_window))
    {
        bail!("Grammar cannot be saved: {}", message);
    }
    let grammar = builder.build().context("Grammar cannot be saved")?;
    session.set_grammar(grammar);
    session.persist()?;
    save_session(&mut store, &session)?;

    if let Some(grammar) = session.grammar() {
        println!("Saved grammar with {} rules:", grammar.rule_count());
        for (i, rule) in grammar.rules().iter().enumerate() {
            println!("  {}", format_numbered_rule(i + 1, rule));
        }
    }
    Ok(())
}

fn show_snapshot(config: &Config) -> Result<()> {
    let mut store = FileSnapshotStore::new(&config.snapshot_path);
    let session = open_session(&mut store)?;
    let user = session.user();
    println!("User: {} {} {} ({})", user.last_name, user.first_name, user.patronymic, user.group);

    let (Some(grammar), Some(history)) = (session.grammar(), session.history()) else {
        println!("No grammar defined.");
        return Ok(());
    };

    let join = |symbols: &[char]| symbols.iter().map(|ch| ch.to_string()).collect::<Vec<_>>().join(", ");
    println!("Terminals: {{{}}}", join(grammar.terminals()));
    println!("Non-terminals: {{{}}}", join(grammar.non_terminals()));
    println!("Start symbol: {}", grammar.start_symbol());
    println!("== Rules ({} total) ==", grammar.rule_count());
    for (i, rule) in grammar.rules().iter().enumerate() {
        println!("  {}", format_numbered_rule(i + 1, rule));
    }

    println!("== Current derivation ==");
    println!("  {}", format_chain(history.derivation().steps()));
    println!("== Completed derivations ({} total) ==", history.saved().len());
    for saved in history.saved() {
        println!("  {} {}  {}", saved.id, format_sentential(&saved.final_word), format_chain(&saved.steps));
    }
    Ok(())
}

fn export_snapshot(config: &Config, output: &Path, format: Option<&str>) -> Result<()> {
    let mut store = FileSnapshotStore::new(&config.snapshot_path);
    let session = open_session(&mut store)?;
    let (Some(grammar), Some(history)) = (session.grammar(), session.history()) else {
        bail!(SessionError::NoGrammar);
    };
    let format = match format {
        Some(name) => OutputFormat::parse(name)?,
        None => format_from_extension(output)?,
    };
    export_derivations(grammar, history.saved(), output, format)?;
    println!("Exported {} derivations to {}", history.saved().len(), output.display());
    Ok(())
}

const DERIVE_HELP: &str = "\
Keys 1-9 and A-Z apply the rule with that label.
Commands: :undo  :reset  :clear  :list  :remove <id>  :save  :load  :export <path>  :help  :quit";

fn print_state<W: Write>(session: &Session, out: &mut W) -> Result<()> {
    let (Some(grammar), Some(history)) = (session.grammar(), session.history()) else {
        writeln!(out, "No grammar defined.")?;
        return Ok(());
    };
    let derivation = history.derivation();
    writeln!(out, "Current: {}", format_sentential(derivation.current()))?;
    if derivation.state(grammar) == DerivationState::Completed {
        return Ok(());
    }
    let rules = session.available_rules();
    if rules.iter().all(|entry| !entry.available) {
        writeln!(out, "No rule applies.")?;
    }
    for entry in rules {
        let marker = if entry.available { " " } else { "-" };
        writeln!(out, " {} {}", marker, format_numbered_rule(entry.ordinal, entry.rule))?;
    }
    Ok(())
}

fn report_events<W: Write>(events: Vec<ControllerEvent>, out: &mut W) -> Result<()> {
    for event in events {
        match event {
            ControllerEvent::Saved => writeln!(out, "Saved.")?,
            ControllerEvent::Loaded => writeln!(out, "Loaded.")?,
            ControllerEvent::Exported(path) => writeln!(out, "Exported to {}.", path.display())?,
            ControllerEvent::Cancelled => writeln!(out, "Cancelled.")?,
            ControllerEvent::Failed(message) => writeln!(out, "Error: {}", message)?,
            ControllerEvent::QuitRequested => {}
        }
    }
    Ok(())
}

fn derive_interactive<R: BufRead, W: Write>(config: &Config, input: R, out: &mut W) -> Result<()> {
    let mut store = FileSnapshotStore::new(&config.snapshot_path);
    let session = open_session(&mut store)?;
    if session.grammar().is_none() {
        bail!(SessionError::NoGrammar);
    }
    let mut controller = Controller::new(session, store).with_autosave(config.autosave);
    let commands = controller.commands();

    writeln!(out, "{}", DERIVE_HELP)?;
    print_state(controller.session(), out)?;

    for line in input.lines() {
        let line = line.context("Failed to read input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix(':') {
            let mut parts = command.split_whitespace();
            match (parts.next().unwrap_or(""), parts.next()) {
                ("undo", _) => match controller.session_mut().undo() {
                    Ok(_) | Err(SessionError::Derivation(DerivationError::NothingToUndo)) => {}
                    Err(e) => writeln!(out, "Error: {}", e)?,
                },
                ("reset", _) => controller.session_mut().reset(),
                ("clear", _) => {
                    let event = controller.clear();
                    report_events(vec![event], out)?;
                }
                ("list", _) => {
                    if let Some(history) = controller.session().history() {
                        writeln!(out, "== Completed derivations ({} total) ==", history.saved().len())?;
                        for saved in history.saved() {
                            writeln!(out, "  {} {}", saved.id, format_chain(&saved.steps))?;
                        }
                    }
                    continue;
                }
                ("remove", Some(id)) => {
                    if controller.session_mut().remove_saved(id) {
                        writeln!(out, "Removed {}.", id)?;
                    }
                    continue;
                }
                ("save", _) => commands.send(Command::Save)?,
                ("load", _) => commands.send(Command::Load)?,
                ("export", Some(path)) => commands.send(Command::Export(PathBuf::from(path)))?,
                ("help", _) => {
                    writeln!(out, "{}", DERIVE_HELP)?;
                    continue;
                }
                ("quit", _) => {
                    commands.send(Command::Save)?;
                    commands.send(Command::Quit)?;
                }
                _ => {
                    writeln!(out, "Unknown command: {}", line)?;
                    continue;
                }
            }
        } else {
            for key in line.chars() {
                let Some(outcome) = controller.press_key(key) else {
                    continue;
                };
                match outcome.completion {
                    Some(CompletionRecord::Added(_)) => {
                        writeln!(out, "Completed: {} (saved)", format_sentential(&outcome.step.result))?
                    }
                    Some(CompletionRecord::Duplicate(_)) => {
                        writeln!(out, "Completed: {} (already saved)", format_sentential(&outcome.step.result))?
                    }
                    None => {}
                }
            }
        }

        report_events(controller.pump(), out)?;
        if !controller.is_running() {
            return Ok(());
        }
        print_state(controller.session(), out)?;
    }

    // End of input: keep progress.
    commands.send(Command::Save)?;
    report_events(controller.pump(), out)?;
    Ok(())
}
