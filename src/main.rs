/*
 * This file is part of ThinkFan UI.
 *
 * Copyright (C) 2025 ThinkFan UI contributors
 *
 * ThinkFan UI is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * ThinkFan UI is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with ThinkFan UI. If not, see <https://www.gnu.org/licenses/>.
 */

use std::io::stdout;

use clap::Parser;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;
use tracing::{error, info, warn};

use thinkfan_ui::app::{App, Services};
use thinkfan_ui::cli::{self, Cli};
use thinkfan_ui::events::{handle_key_event, handle_mouse_event};
use thinkfan_ui::handlers;
use thinkfan_ui::instance::{self, InstanceGuard, InstanceRole};
use thinkfan_ui::logger::{self, LogTarget};
use thinkfan_ui::ui::ui;
use thinkfan_ui::config;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Subcommands log to stderr; the terminal UI owns the screen
    let target = match (&cli.command, cli.logging) {
        (Some(_), _) => LogTarget::Stderr,
        (None, true) => LogTarget::File(logger::default_log_path()),
        (None, false) => LogTarget::Off,
    };
    logger::init_logging(target)?;

    let mut settings = config::load_settings();
    cli.apply(&mut settings);
    config::validate_settings(&settings)?;

    if let Some(command) = &cli.command {
        let services = Services::system(&settings);
        let mut out = stdout().lock();
        return cli::run_command(command, &settings, &services, &mut out);
    }

    let guard = match instance::acquire(&instance::socket_path()) {
        Ok(InstanceRole::Primary(guard)) => Some(guard),
        Ok(InstanceRole::Secondary) => {
            println!("ThinkFan UI is already running");
            return Ok(());
        }
        Err(e) => {
            warn!(error = %e, "single-instance socket unavailable");
            None
        }
    };

    let mut app = App::new(settings.clone(), Services::system(&settings));
    handlers::load_config(&mut app);
    handlers::check_fan_access(&mut app);

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    info!("terminal UI started");
    let res = run_app(&mut terminal, &mut app, guard.as_ref());

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = %err, "terminal UI failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    Ok(())
}

fn run_app(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    guard: Option<&InstanceGuard>,
) -> anyhow::Result<()> {
    app.refresh();

    loop {
        // draw
        terminal.draw(|f| ui(f, app))?;

        // tick
        let timeout = app.refresh_interval.saturating_sub(app.last_refresh.elapsed());
        if event::poll(timeout).unwrap_or(false) {
            match event::read()? {
                Event::Key(key_event) => {
                    if handle_key_event(app, key_event)? {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse_event) => handle_mouse_event(app, mouse_event)?,
                _ => {}
            }
        }

        if guard.is_some_and(|g| g.poll_activation()) {
            handlers::on_activation(app);
        }

        if app.last_refresh.elapsed() >= app.refresh_interval {
            app.refresh();
        }
    }
}
