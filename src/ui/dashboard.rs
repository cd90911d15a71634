// ============================================================================
// Dashboard - Rendu de l'interface principale
// ============================================================================
// ┌──────────────────────── header ────────────────────────┐
// │ liste des marchés        │ détail du marché sélectionné │
// │ (dépôts / emprunts)      │ flottant + tableau des pools │
// └──────────────── raccourcis + statut ───────────────────┘
//
// Toutes les valeurs affichées viennent de App::display_markets, donc de
// display::render : l'écran et l'export CSV montrent les mêmes textes.
// ============================================================================

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table},
    Frame,
};

use crate::app::{unix_now, App, StatusLevel};
use crate::models::{DisplayMarket, DisplayMode};

/// Dessine l'interface complète
pub fn render(frame: &mut Frame, app: &App) {
    let markets = app.display_markets(unix_now());
    let chunks = create_layout(frame.size());

    render_header(frame, app, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    render_market_list(frame, app, &markets, body[0]);
    render_market_detail(frame, markets.get(app.selected_index), body[1]);

    render_footer(frame, app, chunks[2]);
}

/// Header, contenu, footer (2 lignes : raccourcis puis statut)
fn create_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(4),
        ])
        .split(area)
        .to_vec()
}

/// Couleur configurée du marché ("#rrggbb"), blanc si illisible
fn market_color(color: &str) -> Color {
    color.parse::<Color>().unwrap_or(Color::White)
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" LazyLend ")
        .title_alignment(Alignment::Center);

    let reference = app
        .snapshot()
        .map(|s| format!("block time {} · {} markets", s.reference_timestamp, s.len()))
        .unwrap_or_else(|| "waiting for first round".to_string());

    let mode = match app.mode {
        DisplayMode::Asset => "Asset units".to_string(),
        DisplayMode::Fiat => format!("Fiat ({})", app.prices().currency.to_uppercase()),
    };

    let line = Line::from(vec![
        Span::styled(
            "Lending markets",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  ·  "),
        Span::styled(mode, Style::default().fg(Color::Yellow)),
        Span::raw("  ·  "),
        Span::styled(reference, Style::default().fg(Color::Gray)),
    ]);

    let paragraph = Paragraph::new(line).block(block).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

// ============================================================================
// Liste des marchés
// ============================================================================

fn render_market_list(frame: &mut Frame, app: &App, markets: &[DisplayMarket], area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Markets ");

    if markets.is_empty() {
        let message = if app.is_loading { "Loading..." } else { "No market data" };
        let paragraph = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(message, Style::default().fg(Color::Gray))),
        ])
        .block(block)
        .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = markets
        .iter()
        .enumerate()
        .map(|(index, market)| {
            let mut style = Style::default().fg(market_color(&market.color));
            if index == app.selected_index {
                style = style.add_modifier(Modifier::BOLD).add_modifier(Modifier::REVERSED);
            }

            ListItem::new(vec![
                Line::from(Span::styled(format!(" {}", market.symbol), style)),
                Line::from(vec![
                    Span::styled("   dep ", Style::default().fg(Color::DarkGray)),
                    Span::raw(market.floating_deposits.clone()),
                ]),
                Line::from(vec![
                    Span::styled("   bor ", Style::default().fg(Color::DarkGray)),
                    Span::raw(market.floating_borrows.clone()),
                ]),
            ])
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

// ============================================================================
// Détail du marché sélectionné
// ============================================================================

fn render_market_detail(frame: &mut Frame, market: Option<&DisplayMarket>, area: Rect) {
    let market = match market {
        Some(market) => market,
        None => {
            let block = Block::default().borders(Borders::ALL).title(" Details ");
            frame.render_widget(block, area);
            return;
        }
    };

    let color = market_color(&market.color);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    let floating = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Floating Deposits  ", Style::default().fg(Color::Gray)),
            Span::raw(market.floating_deposits.clone()),
        ]),
        Line::from(vec![
            Span::styled("Floating Borrows   ", Style::default().fg(Color::Gray)),
            Span::raw(market.floating_borrows.clone()),
        ]),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(format!(" {} · {} ", market.symbol, market.name)),
    );
    frame.render_widget(floating, chunks[0]);

    let header = Row::new(vec!["Maturity", "Seconds left", "Deposits", "Borrows", "Pending Interests"])
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = market
        .pools
        .iter()
        .map(|pool| {
            Row::new(vec![
                Cell::from(pool.maturity_date.clone()),
                Cell::from(pool.seconds_remaining.clone()),
                Cell::from(pool.deposits.clone()),
                Cell::from(pool.borrows.clone()),
                Cell::from(pool.unassigned_earnings.clone()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(13),
        Constraint::Length(13),
        Constraint::Percentage(25),
        Constraint::Percentage(25),
        Constraint::Percentage(25),
    ];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(format!(" Fixed pools ({}) ", market.pools.len())),
    );
    frame.render_widget(table, chunks[1]);
}

// ============================================================================
// Footer : raccourcis et statut
// ============================================================================

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let key = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let shortcuts = if app.is_awaiting_quit_confirmation() {
        Line::from(vec![
            Span::styled("⚠  Press ", key),
            Span::styled(
                "[q]",
                Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(" again to quit, any other key to cancel ⚠", key),
        ])
    } else {
        Line::from(vec![
            Span::styled("[q]", key),
            Span::raw(" Quit  "),
            Span::styled("[↑↓ / j k]", key),
            Span::raw(" Navigate  "),
            Span::styled("[f]", key),
            Span::raw(format!(" {}  ", app.mode.toggle().label())),
            Span::styled("[r]", key),
            Span::raw(" Refresh  "),
            Span::styled("[e]", key),
            Span::raw(" Export CSV"),
        ])
    };

    let status = match &app.status {
        Some(status) => {
            let color = match status.level {
                StatusLevel::Info if app.is_loading => Color::Cyan,
                StatusLevel::Info => Color::Green,
                StatusLevel::Error => Color::Red,
            };
            Line::from(Span::styled(status.text.clone(), Style::default().fg(color)))
        }
        None => Line::from(""),
    };

    let paragraph = Paragraph::new(vec![shortcuts, status])
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}
