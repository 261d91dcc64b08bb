mod app;
mod msg;
mod views;

use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::EnvFilter;

use app::App;
use msg::Msg;
use power_cursors::model::config::AppConfig;

/// Terminal editor for composing cursors one at a time.
#[derive(Debug, Parser)]
#[command(name = "power-cursors", version, about)]
struct Cli {
    /// Files to open, one view each.
    files: Vec<PathBuf>,

    /// Config file to use instead of the platform default.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    // Initialize logging to file (never stdout)
    let log_dir = directories::ProjectDirs::from("", "", "power-cursors")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "power-cursors.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_filter));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .init();

    tracing::info!("power-cursors starting");

    let mut app = App::new(config, cli.files)?;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app);
    app.finish_saves();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        tracing::error!("fatal: {e:?}");
        eprintln!("power-cursors error: {e:?}");
    }

    Ok(())
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Msg>();

    // Input thread: reads terminal events and forwards them as Msg
    thread::spawn(move || {
        loop {
            if let Ok(event) = event::read() {
                let msg = match event {
                    Event::Key(k) => Msg::Key(k),
                    Event::Resize(w, h) => Msg::Resize(w, h),
                    _ => continue,
                };
                if tx.send(msg).is_err() {
                    break;
                }
            }
        }
    });

    let size = terminal.size()?;
    app.update(Msg::Resize(size.width, size.height))?;
    terminal.draw(|f| app.view(f))?;

    // ── Main event loop ──
    loop {
        // Batch-drain all pending messages
        let first = rx.recv()?;
        app.update(first)?;

        while let Ok(msg) = rx.try_recv() {
            app.update(msg)?;
        }

        if app.should_quit {
            break;
        }

        terminal.draw(|f| app.view(f))?;
    }

    Ok(())
}
