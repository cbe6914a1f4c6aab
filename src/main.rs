use color_eyre::Result;
use logmein_tui::{
    app::App,
    config::Config,
    controller::Controller,
    events::{Event, EventHandler},
    logging, ui,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Instrumentation and safety
    let _log_guard = logging::initialize_logging();
    color_eyre::install()?;
    install_panic_hook();

    let config = Config::load();
    let controller = Controller::from_config(&config)?;

    // Ready terminal and state
    let mut terminal = setup_terminal()?;
    let mut app = App::new();
    let mut events = EventHandler::new(250);

    // Controller task owns all geolocation state and talks to the log API
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let controller_task = tokio::spawn(controller.run(cmd_rx, events.tx.clone()));
    info!("Viewer started against {}", config.api.base_url);

    // Main loop
    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &app))?;

        match events.next().await {
            Some(Event::Input(key)) => {
                if let Some(command) = app.handle_key(key) {
                    if cmd_tx.send(command).is_err() {
                        error!("Controller stopped; exiting");
                        app.should_quit = true;
                    }
                }
            }
            Some(event) => app.apply(event),
            None => break,
        }
    }

    drop(cmd_tx);
    controller_task.abort();
    restore_terminal(terminal)?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen, crossterm::cursor::Hide)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show)?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Force terminal cleanup!
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show).ok();
        original_hook(panic_info);
    }));
}
