//! TUI rendering for the log viewer
//!
//! Draws the newest-entry summary, the log list, the status and help bars,
//! and the location consent popup on top when it is open.

use crate::app::App;
use crate::controller::{LogLine, LogView};
use ratatui::{prelude::*, widgets::*};

/// Renders one frame of the TUI based on current application state.
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Summary
            Constraint::Min(3),    // Log list
            Constraint::Length(1), // Status
            Constraint::Length(1), // Help
        ])
        .split(f.size());

    render_summary(f, app, chunks[0]);
    render_log_list(f, app, chunks[1]);
    render_status_bar(f, app, chunks[2]);

    let help = Paragraph::new(
        " t test log   c clear   d details   r refresh   h health   ↑/↓ scroll   q quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[3]);

    if app.consent_open {
        render_consent_popup(f, app);
    }
}

fn render_summary(f: &mut Frame, app: &App, area: Rect) {
    let (last_log, count) = match app.view {
        Some(ref view) => (view.last_log.as_str(), view.count.to_string()),
        None => ("-", "…".to_string()),
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Dernier log : ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                last_log,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Nombre de logs : ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(count, Style::default().add_modifier(Modifier::BOLD)),
        ]),
    ];

    let block = Block::default()
        .title(" Logs ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn level_color(level: &str) -> Color {
    match level.to_ascii_uppercase().as_str() {
        "ERROR" | "CRITICAL" => Color::Red,
        "WARN" | "WARNING" => Color::Yellow,
        "DEBUG" => Color::DarkGray,
        _ => Color::Green,
    }
}

fn log_item(line: &LogLine) -> ListItem<'_> {
    let mut text = vec![
        Line::from(vec![
            Span::raw(format!("[{}] ", line.timestamp)),
            Span::styled(
                format!("({})", line.level),
                Style::default().fg(level_color(&line.level)),
            ),
        ]),
        Line::from(Span::styled(
            line.message.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];

    if let Some(ref details) = line.details {
        text.push(Line::from(Span::styled(
            details.as_str(),
            Style::default().fg(Color::Magenta),
        )));
    }
    if let Some(ref agent) = line.user_agent {
        text.push(Line::from(vec![
            Span::styled("User Agent : ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(agent.as_str(), Style::default().fg(Color::DarkGray)),
        ]));
    }
    text.push(Line::from(""));

    ListItem::new(text)
}

fn render_log_list(f: &mut Frame, app: &App, area: Rect) {
    let title = match app.view {
        Some(LogView {
            show_details: true, ..
        }) => " Entries (details) ",
        _ => " Entries ",
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);

    let Some(ref view) = app.view else {
        let waiting = if app.consent_open {
            "En attente du choix de localisation…"
        } else {
            "Chargement…"
        };
        f.render_widget(
            Paragraph::new(waiting)
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    };

    if let Some(empty) = view.empty_text {
        f.render_widget(Paragraph::new(empty).block(block), area);
        return;
    }

    let items: Vec<ListItem> = view.lines.iter().skip(app.scroll).map(log_item).collect();
    f.render_widget(List::new(items).block(block), area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();

    match app.health {
        Some(ref health) => {
            let db_style = if health.db {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            };
            spans.push(Span::raw(format!(" Backend: {} ", health.backend.to_uppercase())));
            spans.push(Span::styled(
                format!("DB: {} ", if health.db { "OK" } else { "DOWN" }),
                db_style,
            ));
            spans.push(Span::raw(format!("v{} ", health.version)));
        }
        None => spans.push(Span::styled(
            " Backend: ? ",
            Style::default().fg(Color::DarkGray),
        )),
    }

    if let Some(ref stats) = app.stats {
        spans.push(Span::raw(format!("│ stored: {} ", stats.log_count)));
    }

    if let Some(updated) = app.last_update {
        spans.push(Span::raw(format!("│ updated {}s ago ", updated.elapsed().as_secs())));
    }

    if let Some(ref error) = app.last_error {
        spans.push(Span::styled(
            format!("│ {}", error),
            Style::default().fg(Color::Red),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Rectangle of `width` x `height` centered in `area`, clamped to fit.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_consent_popup(f: &mut Frame, app: &App) {
    let area = centered_rect(72, 13, f.size());

    let actions = if app.consent_pending {
        Line::from(Span::styled(
            "Localisation en cours…",
            Style::default().fg(Color::Yellow),
        ))
    } else {
        Line::from(vec![
            Span::styled(
                " l  Plus tard ",
                Style::default().fg(Color::Gray).bg(Color::Rgb(55, 65, 81)),
            ),
            Span::raw("   "),
            Span::styled(
                " a  Autoriser la localisation ",
                Style::default()
                    .fg(Color::Rgb(5, 46, 43))
                    .bg(Color::Rgb(16, 185, 129))
                    .add_modifier(Modifier::BOLD),
            ),
        ])
    };

    let text = vec![
        Line::from(Span::styled(
            "Accès à ta localisation",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("On l'utilise pour afficher Ville, Pays dans les logs (meilleure précision)."),
        Line::from("Tu peux refuser : on utilisera une estimation via ton adresse IP."),
        Line::from(""),
        actions.alignment(Alignment::Right),
        Line::from(""),
        Line::from(Span::styled(
            "Astuce : la localisation précise nécessite HTTPS (sauf en local).",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let popup = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .padding(Padding::horizontal(1)),
        );

    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}
