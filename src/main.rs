use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{
    KeyCode, KeyEvent, KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Wrap};
use tracing::{info, warn};

use keytrace::app::{App, AppScreen, Runner};
use keytrace::client::api::StoredSession;
use keytrace::client::store::{HttpSessionStore, SessionStore};
use keytrace::config::Config;
use keytrace::event::{AppEvent, EventHandler};
use keytrace::generator::HttpTextSource;
use keytrace::logging;
use keytrace::session::Mode;
use keytrace::session::input::InputKey;
use keytrace::session::trial::SystemClock;
use keytrace::store::json_store::JsonStore;
use keytrace::ui::components::progress_bar::ProgressBar;
use keytrace::ui::components::review_panel::ReviewPanel;
use keytrace::ui::components::typing_area::TypingArea;
use keytrace::ui::layout::{AppLayout, pack_hint_lines};
use keytrace::ui::palette::Palette;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "keytrace", version, about = "Keystroke timing capture for typing analysis")]
struct Cli {
    #[arg(short, long, help = "Collection server base URL")]
    server: Option<String>,

    #[arg(short, long, help = "Text mode (top200, trigraphs, nonsense, calibration, trigraph_test)")]
    mode: Option<Mode>,

    #[arg(short, long, help = "Number of probes in a trigraph_test sequence")]
    probes: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Type texts and record their timings (default)
    Capture,
    /// Check that the collection server is reachable
    Health,
    /// Set or clear the label on a stored session
    Label {
        session_id: i64,
        label: Option<String>,
    },
    /// List stored sessions, newest first
    Sessions {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Delete a stored session and its keystrokes
    Delete { session_id: i64 },
    /// Write the effective configuration to the config file
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("failed to load config")?;
    if let Some(server) = cli.server {
        config.server_url = server.trim_end_matches('/').to_string();
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(probes) = cli.probes.filter(|p| *p > 0) {
        config.probe_count = probes;
    }

    if let Err(err) = logging::init(&Config::data_dir()) {
        eprintln!("warning: file logging disabled: {err:#}");
    }

    match cli.command.unwrap_or(Command::Capture) {
        Command::Capture => capture(config),
        Command::Health => {
            let store = HttpSessionStore::new(&config.server_url, config.request_timeout())?;
            let health = store.health()?;
            println!("{}: {}", config.server_url, health.status);
            Ok(())
        }
        Command::Label { session_id, label } => {
            let store = HttpSessionStore::new(&config.server_url, config.request_timeout())?;
            store.set_label(session_id, label.as_deref())?;
            match label {
                Some(label) => println!("session {session_id} labelled {label:?}"),
                None => println!("session {session_id} label cleared"),
            }
            Ok(())
        }
        Command::Sessions { limit } => {
            let store = HttpSessionStore::new(&config.server_url, config.request_timeout())?;
            let list = store.list_sessions(limit)?;
            for session in &list.sessions {
                println!("{}", session_row(session));
            }
            println!("{} session(s)", list.total);
            Ok(())
        }
        Command::Delete { session_id } => {
            let store = HttpSessionStore::new(&config.server_url, config.request_timeout())?;
            store.delete_session(session_id)?;
            if let Ok(journal) = JsonStore::new() {
                journal.remove_session(session_id)?;
            }
            println!("session {session_id} deleted");
            Ok(())
        }
        Command::InitConfig => {
            config.save()?;
            println!("wrote {}", Config::config_path().display());
            Ok(())
        }
    }
}

fn session_row(session: &StoredSession) -> String {
    let when = chrono::DateTime::from_timestamp(session.timestamp as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let preview: String = session.raw_text.chars().take(32).collect();
    format!(
        "{:>6}  {when}  {:<13}  {:<12}  {preview}",
        session.id,
        session.mode,
        session.label.as_deref().unwrap_or("-"),
    )
}

fn capture(config: Config) -> Result<()> {
    let store: Arc<dyn SessionStore> = Arc::new(HttpSessionStore::new(
        &config.server_url,
        config.request_timeout(),
    )?);
    let source = HttpTextSource::new(&config.server_url, config.request_timeout())?;
    let journal = if config.journal_enabled {
        JsonStore::new()
            .inspect_err(|e| warn!(error = %e, "journal unavailable"))
            .ok()
    } else {
        None
    };
    info!(server = %config.server_url, mode = %config.mode, "starting capture");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    // Release events let the input layer tell a keydown from a key-up.
    let keyboard_enhanced = execute!(
        io::stdout(),
        PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
    )
    .is_ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = EventHandler::new(Duration::from_millis(100));
    let mut app = App::new(
        config,
        Box::new(source),
        store,
        Box::new(SystemClock),
        journal,
        events.sender(),
    );
    app.start_trial();

    let result = run_app(&mut terminal, &mut app, &events);

    if keyboard_enhanced {
        let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if app.in_flight > 0 {
        drain_deliveries(&mut app, &events);
    }

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
    }
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        match events.next()? {
            AppEvent::Key(key) => handle_key(app, key),
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize(_, _) => {}
            AppEvent::Delivered { seq, delivery } => app.on_delivered(seq, *delivery),
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Give outstanding submissions a moment to land in the journal before exit.
fn drain_deliveries(app: &mut App, events: &EventHandler) {
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while app.in_flight > 0 && Instant::now() < deadline {
        match events.next() {
            Ok(AppEvent::Delivered { seq, delivery }) => app.on_delivered(seq, *delivery),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    if app.in_flight > 0 {
        warn!(pending = app.in_flight, "exiting with submissions still in flight");
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }
    if let Some(input) = InputKey::from_key_event(key) {
        app.handle_input(input);
    }
}

fn render(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    frame.render_widget(Block::default().style(Style::default().bg(Palette::BG)), area);

    let probe = match &app.runner {
        Runner::Probe(probe) => Some(probe),
        Runner::Single(_) => None,
    };
    let layout = AppLayout::new(area, probe.is_some());

    let mut header = vec![
        Span::styled(
            " keytrace ",
            Style::default()
                .fg(Palette::HEADER_FG)
                .bg(Palette::HEADER_BG)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} | {}", app.mode, app.config.server_url),
            Style::default().fg(Palette::FG),
        ),
    ];
    if app.in_flight > 0 {
        header.push(Span::styled(
            format!(" | {} saving", app.in_flight),
            Style::default().fg(Palette::ACCENT),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(header)), layout.header);

    match app.screen {
        AppScreen::Typing => match app.active_trial() {
            Some(trial) => frame.render_widget(
                TypingArea::new(trial).practice(app.is_practice_pass()),
                layout.main,
            ),
            None => frame.render_widget(
                Paragraph::new("fetching text...")
                    .style(Style::default().fg(Palette::TEXT_PENDING))
                    .block(Block::bordered()),
                layout.main,
            ),
        },
        AppScreen::Review => match &app.review {
            Some(review) => frame.render_widget(
                ReviewPanel::new(&review.session, &review.metrics, review.pending)
                    .discarded(review.discarded),
                layout.main,
            ),
            None => frame.render_widget(Block::bordered(), layout.main),
        },
        AppScreen::Error => frame.render_widget(
            Paragraph::new(app.error.as_deref().unwrap_or("unknown error"))
                .style(Style::default().fg(Palette::WARNING))
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(" could not fetch text ")),
            layout.main,
        ),
    }

    if let (Some(probe), Some(area)) = (probe, layout.progress) {
        frame.render_widget(
            ProgressBar::for_sequence(probe.run_state().probe_sequence_index, probe.probe_count()),
            area,
        );
    }

    let hints: &[&str] = match app.screen {
        AppScreen::Typing => &["[Tab/Esc] new text", "[Ctrl+C] quit"],
        AppScreen::Review => &["[n/Tab] next", "[d] discard", "[q] quit"],
        AppScreen::Error => &["[r] retry", "[q] quit"],
    };
    let mut footer: Vec<Line> = Vec::new();
    if let Some(status) = &app.status {
        footer.push(Line::from(Span::styled(
            format!(" {status}"),
            Style::default().fg(Palette::ACCENT),
        )));
    }
    footer.extend(
        pack_hint_lines(hints, layout.footer.width as usize)
            .into_iter()
            .map(|l| Line::from(Span::styled(l, Style::default().fg(Palette::TEXT_PENDING)))),
    );
    frame.render_widget(Paragraph::new(footer), layout.footer);
}
