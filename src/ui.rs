use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use finance_dashboard::{
    format_currency, pricing_cards, BillingCycle, Budget, BudgetPeriod, Feature, FeatureGuard, GuardOutcome,
    PlanCatalog, PlanStore, PricingCard, RestrictedAccessView, Route, SessionProvider, SessionState,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io;

/// Amount `+`/`-` moves the selected category limit
const LIMIT_STEP: Decimal = dec!(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Budget,
    Pricing,
    Investments,
    Bills,
    Account,
}

impl Page {
    pub const ALL: [Page; 5] = [Page::Budget, Page::Pricing, Page::Investments, Page::Bills, Page::Account];

    pub fn next(&self) -> Self {
        match self {
            Page::Budget => Page::Pricing,
            Page::Pricing => Page::Investments,
            Page::Investments => Page::Bills,
            Page::Bills => Page::Account,
            Page::Account => Page::Budget,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Budget => Page::Account,
            Page::Pricing => Page::Budget,
            Page::Investments => Page::Pricing,
            Page::Bills => Page::Investments,
            Page::Account => Page::Bills,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Budget => "Budget",
            Page::Pricing => "Pricing",
            Page::Investments => "Investments",
            Page::Bills => "Bills",
            Page::Account => "Account",
        }
    }

    /// Feature a page is gated behind, if any
    pub fn required_feature(&self) -> Option<Feature> {
        match self {
            Page::Investments => Some(Feature::InvestmentTracking),
            Page::Bills => Some(Feature::BillReminders),
            _ => None,
        }
    }
}

pub struct App<S: PlanStore> {
    pub catalog: PlanCatalog,
    pub store: S,
    pub session: SessionProvider,
    pub budget: Budget,
    pub cycle: BillingCycle,
    pub current_page: Page,
    pub last_page: Page,
    pub category_state: TableState,
    pub plan_state: TableState,
    pub investments: FeatureGuard,
    pub bills: FeatureGuard,
    pub status: Option<String>,
}

impl<S: PlanStore> App<S> {
    pub fn new(catalog: PlanCatalog, store: S, session: SessionProvider, budget: Budget) -> Self {
        let mut category_state = TableState::default();
        if !budget.categories.is_empty() {
            category_state.select(Some(0));
        }

        let mut plan_state = TableState::default();
        plan_state.select(Some(0));

        Self {
            catalog,
            store,
            session,
            budget,
            cycle: BillingCycle::Monthly,
            current_page: Page::Budget,
            last_page: Page::Budget,
            category_state,
            plan_state,
            investments: FeatureGuard::new(Feature::InvestmentTracking),
            bills: FeatureGuard::new(Feature::BillReminders),
            status: None,
        }
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn next_page(&mut self) {
        self.open_page(self.current_page.next());
    }

    pub fn previous_page(&mut self) {
        self.open_page(self.current_page.previous());
    }

    /// Switch page. Guarded pages re-check access on every activation.
    pub fn open_page(&mut self, page: Page) {
        if page != self.current_page {
            self.last_page = self.current_page;
        }
        self.current_page = page;
        self.status = None;

        let identity = self.session.identity();
        let guard = match page {
            Page::Investments => &mut self.investments,
            Page::Bills => &mut self.bills,
            _ => return,
        };
        guard.reset();
        guard.check(&self.catalog, identity.as_ref(), &self.store);
    }

    pub fn go_back(&mut self) {
        let target = if self.last_page.required_feature().is_some() {
            Page::Budget
        } else {
            self.last_page
        };
        self.open_page(target);
    }

    pub fn guard_for(&self, page: Page) -> Option<&FeatureGuard> {
        match page {
            Page::Investments => Some(&self.investments),
            Page::Bills => Some(&self.bills),
            _ => None,
        }
    }

    /// Outcome of the current page's guard; unguarded pages always render
    pub fn current_outcome(&self) -> GuardOutcome {
        self.guard_for(self.current_page)
            .map(|g| g.outcome())
            .unwrap_or(GuardOutcome::Render)
    }

    /// Follow the restricted view's actions
    pub fn follow(&mut self, route: Route) {
        match route {
            Route::Back => self.go_back(),
            Route::Pricing => self.open_page(Page::Pricing),
            Route::Auth => self.open_page(Page::Account),
            Route::RestrictedAccess => {}
        }
    }

    // ------------------------------------------------------------------------
    // Budget page
    // ------------------------------------------------------------------------

    pub fn selected_category(&self) -> Option<&str> {
        self.category_state
            .selected()
            .and_then(|i| self.budget.categories.get(i))
            .map(|c| c.label.as_str())
    }

    pub fn adjust_selected(&mut self, step: Decimal) {
        let Some(label) = self.selected_category().map(str::to_string) else {
            return;
        };
        if let Some(current) = self.budget.category(&label).map(|c| c.limit) {
            self.budget.set_limit(&label, current.saturating_add(step));
        }
    }

    pub fn toggle_auto_adjust(&mut self) {
        self.budget.toggle_auto_adjust();
    }

    pub fn toggle_period(&mut self) {
        let period = match self.budget.period {
            BudgetPeriod::Monthly => BudgetPeriod::Weekly,
            BudgetPeriod::Weekly => BudgetPeriod::Monthly,
        };
        self.budget.set_period(period);
    }

    // ------------------------------------------------------------------------
    // Pricing page
    // ------------------------------------------------------------------------

    pub fn toggle_cycle(&mut self) {
        self.cycle = self.cycle.toggle();
    }

    pub fn cards(&self) -> Vec<PricingCard> {
        pricing_cards(&self.catalog, self.session.plan().as_deref(), self.cycle)
    }

    /// Move the signed-in user to the selected plan and re-resolve the session
    pub fn choose_selected_plan(&mut self) -> Result<()> {
        let Some(identity) = self.session.identity() else {
            self.status = Some("Sign in to choose a plan".to_string());
            return Ok(());
        };
        let Some(plan) = self.plan_state.selected().and_then(|i| self.catalog.plans().get(i)) else {
            return Ok(());
        };
        let (plan_id, plan_name) = (plan.id.clone(), plan.name.clone());

        if self.session.plan().as_deref() == Some(plan_id.as_str()) {
            self.status = Some(format!("Already on {}", plan_name));
            return Ok(());
        }

        self.store.set_user_plan(&identity.uid, &plan_id)?;
        self.session.on_identity_changed(Some(identity), &self.store)?;
        self.status = Some(format!("Switched to {}", plan_name));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Account page
    // ------------------------------------------------------------------------

    pub fn logout(&mut self) {
        let route = self.session.logout();
        self.status = Some("Signed out".to_string());
        self.follow(route);
    }

    // ------------------------------------------------------------------------
    // Row selection
    // ------------------------------------------------------------------------

    fn selection(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Pricing => (&mut self.plan_state, self.catalog.plans().len()),
            _ => (&mut self.category_state, self.budget.categories.len()),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.selection();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.selection();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }
}

pub fn run_ui<S: PlanStore>(app: &mut App<S>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend, S: PlanStore>(terminal: &mut Terminal<B>, app: &mut App<S>) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            let restricted = matches!(
                app.current_outcome(),
                GuardOutcome::RestrictedInPlace | GuardOutcome::Redirect(_)
            );

            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Esc | KeyCode::Char('b') if restricted => app.follow(Route::Back),
                KeyCode::Char('p') if restricted => app.follow(Route::Pricing),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Char('+') | KeyCode::Char('=') if app.current_page == Page::Budget => {
                    app.adjust_selected(LIMIT_STEP)
                }
                KeyCode::Char('-') if app.current_page == Page::Budget => app.adjust_selected(-LIMIT_STEP),
                KeyCode::Char('a') if app.current_page == Page::Budget => app.toggle_auto_adjust(),
                KeyCode::Char('m') if app.current_page == Page::Budget => app.toggle_period(),
                KeyCode::Char('c') if app.current_page == Page::Pricing => app.toggle_cycle(),
                KeyCode::Enter if app.current_page == Page::Pricing => {
                    if let Err(e) = app.choose_selected_plan() {
                        app.status = Some(format!("Plan change failed: {}", e));
                    }
                }
                KeyCode::Char('l') if app.current_page == Page::Account => app.logout(),
                _ => {}
            }
        }
    }
}

fn ui<S: PlanStore>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_outcome() {
        GuardOutcome::Loading => render_loading(f, chunks[1]),
        GuardOutcome::Render => match app.current_page {
            Page::Budget => render_budget(f, chunks[1], app),
            Page::Pricing => render_pricing(f, chunks[1], app),
            Page::Investments | Page::Bills => render_feature_page(f, chunks[1], app),
            Page::Account => render_account(f, chunks[1], app),
        },
        GuardOutcome::RestrictedInPlace | GuardOutcome::Redirect(Route::RestrictedAccess) => {
            render_restricted(f, chunks[1], app)
        }
        GuardOutcome::Redirect(_) => render_sign_in_required(f, chunks[1]),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header<S: PlanStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let name = match page.required_feature() {
            Some(_) => format!("🔒 {}", page.title()),
            None => page.title().to_string(),
        };
        tab_spans.push(Span::styled(name, style));
    }

    tab_spans.push(Span::raw("  |  "));
    match app.session.plan_badge() {
        Some(badge) => tab_spans.push(Span::styled(badge, Style::default().fg(Color::Green))),
        None => tab_spans.push(Span::styled("Signed out", Style::default().fg(Color::Red))),
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_budget<S: PlanStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let summary = app.budget.summary();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let overview = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {} ", app.budget.period.label()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("{} → {}", app.budget.start_date, app.budget.end_date)),
        Span::raw("  |  Budget "),
        Span::styled(format_currency(summary.total_budget), Style::default().fg(Color::White)),
        Span::raw("  Spent "),
        Span::styled(format_currency(summary.total_spent), Style::default().fg(Color::Red)),
        Span::raw("  Remaining "),
        Span::styled(format_currency(summary.remaining), Style::default().fg(Color::Green)),
        Span::raw("  |  Auto-adjust "),
        if app.budget.auto_adjust {
            Span::styled("ON", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        } else {
            Span::styled("OFF", Style::default().fg(Color::DarkGray))
        },
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Overview "));
    f.render_widget(overview, chunks[0]);

    let ratio = (summary.progress_pct / dec!(100)).clamp(Decimal::ZERO, Decimal::ONE);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Progress "))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio.to_f64().unwrap_or(0.0))
        .label(format!("{}%", summary.progress_pct));
    f.render_widget(gauge, chunks[1]);

    let header_cells = ["Category", "Limit", "Spent", "Progress"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray)).height(1);

    let rows = summary.categories.iter().map(|c| {
        let color = if c.over_budget { Color::Red } else { Color::White };
        Row::new(vec![
            Cell::from(c.label.clone()),
            Cell::from(format_currency(c.limit)),
            Cell::from(format_currency(c.spent)).style(Style::default().fg(color)),
            Cell::from(format!("{}%", c.progress_pct)).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Categories "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[2], &mut app.category_state);
}

fn render_pricing<S: PlanStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let cards = app.cards();

    let header_cells = ["Plan", "Price / month", "Features", "Action"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray)).height(1);

    let rows = cards.iter().map(|card| {
        let name = if card.highlighted {
            format!("⭐ {}", card.name)
        } else {
            card.name.clone()
        };
        let included: Vec<&str> = card.features.iter().filter(|l| l.included).map(|l| l.name).collect();
        let price = match app.cycle {
            BillingCycle::Annual if !card.savings_pct.is_zero() => {
                format!("{} (-{}%)", format_currency(card.price_per_month), card.savings_pct)
            }
            _ => format_currency(card.price_per_month),
        };

        Row::new(vec![
            Cell::from(name),
            Cell::from(price),
            Cell::from(included.join(", ")),
            Cell::from(card.action_label).style(Style::default().fg(Color::Cyan)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Length(18),
            Constraint::Min(30),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Pricing - {} billing ", app.cycle.label())),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.plan_state);
}

fn render_feature_page<S: PlanStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let (title, body) = match app.current_page {
        Page::Investments => (
            " Investments ",
            "Portfolio positions and performance are tracked here.",
        ),
        _ => (" Bills ", "Upcoming bills and reminders are listed here."),
    };

    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  ✓ Unlocked by your {}", app.session.plan_badge().unwrap_or_default()),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("  {}", body)),
    ];

    let paragraph = Paragraph::new(content).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(paragraph, area);
}

fn render_loading(f: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new("  Checking access...")
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(paragraph, area);
}

fn render_restricted<S: PlanStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let Some(feature) = app.current_page.required_feature() else {
        return;
    };
    let view = RestrictedAccessView::new(&app.catalog, feature);

    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  🔒 {}", view.title),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("  {}", view.message)),
    ];
    if let Some(plan) = &view.suggested_plan {
        content.push(Line::from(""));
        content.push(Line::from(vec![
            Span::raw(format!("  {} is included from the ", feature.display_name())),
            Span::styled(plan.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(" plan."),
        ]));
    }
    content.push(Line::from(""));

    let keys = ["b", "p"];
    let mut actions = vec![Span::raw("  ")];
    for (key, action) in keys.iter().zip(view.actions()) {
        actions.push(Span::styled(format!("[{}]", key), Style::default().fg(Color::Yellow)));
        actions.push(Span::raw(format!(" {}   ", action.label())));
    }
    content.push(Line::from(actions));

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(format!(" {} ", app.current_page.title())),
    );
    f.render_widget(paragraph, area);
}

fn render_sign_in_required(f: &mut Frame, area: Rect) {
    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Sign in required",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("  Restart with --user <uid> to sign in."),
    ];
    let paragraph = Paragraph::new(content).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn render_account<S: PlanStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let content = match app.session.snapshot() {
        SessionState::SignedIn { identity, plan, profile } => {
            let name = format!("{} {}", profile.name, profile.last_name);
            vec![
                Line::from(""),
                Line::from(vec![
                    Span::raw("  Name:   "),
                    Span::styled(name.trim().to_string(), Style::default().fg(Color::White)),
                ]),
                Line::from(vec![
                    Span::raw("  Email:  "),
                    Span::raw(identity.email.unwrap_or_default()),
                ]),
                Line::from(vec![
                    Span::raw("  Plan:   "),
                    Span::styled(
                        format!("{} Plan", plan.to_uppercase()),
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                    ),
                ]),
                Line::from(""),
                Line::from(vec![
                    Span::raw("  "),
                    Span::styled("l", Style::default().fg(Color::Yellow)),
                    Span::raw(" Logout"),
                ]),
            ]
        }
        SessionState::Resolving { identity } => vec![
            Line::from(""),
            Line::from(format!("  Loading plan for {}...", identity.uid)),
        ],
        SessionState::SignedOut => vec![Line::from(""), Line::from("  Not signed in.")],
    };

    let paragraph = Paragraph::new(content).block(Block::default().borders(Borders::ALL).title(" Account "));
    f.render_widget(paragraph, area);
}

fn render_status_bar<S: PlanStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let mut status_spans = vec![];

    if let Some(status) = &app.status {
        status_spans.push(Span::styled(format!(" {} ", status), Style::default().fg(Color::Green)));
        status_spans.push(Span::raw("|"));
    }

    let hints: &[(&str, &str)] = match app.current_page {
        Page::Budget => &[("↑/↓", "Select"), ("+/-", "Limit"), ("a", "Auto-adjust"), ("m", "Period")],
        Page::Pricing => &[("↑/↓", "Select"), ("c", "Cycle"), ("Enter", "Choose")],
        Page::Account => &[("l", "Logout")],
        Page::Investments | Page::Bills => &[("b", "Back"), ("p", "Pricing")],
    };
    for (key, label) in hints {
        status_spans.push(Span::raw(" "));
        status_spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(format!(" {} |", label)));
    }

    status_spans.push(Span::raw(" "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finance_dashboard::{seed_plans, Identity, MemoryStore, UserDocument};

    fn app_for(plan: Option<&str>) -> App<MemoryStore> {
        let catalog = PlanCatalog::standard();
        let store = MemoryStore::new();
        seed_plans(&store, &catalog).unwrap();
        let session = SessionProvider::new();

        if let Some(plan) = plan {
            store
                .create_user("u1", &UserDocument::new(plan, "Ada", "Lovelace", "ada@example.com"))
                .unwrap();
            session.sign_in_with_provider(Identity::new("u1"), &store).unwrap();
        }

        let budget = Budget::new(BudgetPeriod::Monthly, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        App::new(catalog, store, session, budget)
    }

    #[test]
    fn test_page_cycle() {
        let mut app = app_for(Some("free"));

        for _ in 0..Page::ALL.len() {
            app.next_page();
        }
        assert_eq!(app.current_page, Page::Budget);

        app.previous_page();
        assert_eq!(app.current_page, Page::Account);
    }

    #[test]
    fn test_guarded_page_restricted_for_free_plan() {
        let mut app = app_for(Some("free"));

        app.open_page(Page::Investments);
        assert_eq!(app.current_outcome(), GuardOutcome::RestrictedInPlace);

        app.follow(Route::Pricing);
        assert_eq!(app.current_page, Page::Pricing);
    }

    #[test]
    fn test_guarded_page_without_session_redirects_to_auth() {
        let mut app = app_for(None);

        app.open_page(Page::Bills);
        assert_eq!(app.current_outcome(), GuardOutcome::Redirect(Route::Auth));
    }

    #[test]
    fn test_back_from_restricted_returns_to_previous_page() {
        let mut app = app_for(Some("free"));

        app.open_page(Page::Pricing);
        app.open_page(Page::Bills);
        app.follow(Route::Back);

        assert_eq!(app.current_page, Page::Pricing);
    }

    #[test]
    fn test_choosing_plan_unlocks_guarded_page() {
        let mut app = app_for(Some("free"));

        app.open_page(Page::Pricing);
        app.plan_state.select(Some(1)); // starter
        app.choose_selected_plan().unwrap();

        assert_eq!(app.session.plan().as_deref(), Some("starter"));
        app.open_page(Page::Bills);
        assert_eq!(app.current_outcome(), GuardOutcome::Render);
    }

    #[test]
    fn test_choose_plan_requires_session() {
        let mut app = app_for(None);

        app.plan_state.select(Some(2));
        app.choose_selected_plan().unwrap();

        assert_eq!(app.status.as_deref(), Some("Sign in to choose a plan"));
        assert_eq!(app.store.user_count(), 0);
    }

    #[test]
    fn test_adjust_selected_keeps_total() {
        let mut app = app_for(Some("free"));
        let total = app.budget.total_budget();

        app.adjust_selected(LIMIT_STEP);
        assert_eq!(app.budget.category("food").unwrap().limit, dec!(550));
        assert_eq!(app.budget.total_budget(), total);

        app.toggle_auto_adjust();
        app.adjust_selected(LIMIT_STEP);
        assert_eq!(app.budget.total_budget(), total + LIMIT_STEP);
    }

    #[test]
    fn test_logout_goes_to_account() {
        let mut app = app_for(Some("pro"));

        app.open_page(Page::Account);
        app.logout();

        assert!(!app.session.is_signed_in());
        assert_eq!(app.current_page, Page::Account);
        assert!(app.cards().iter().all(|c| c.action_label != "Current Plan"));
    }

    #[test]
    fn test_selection_wraps_per_page() {
        let mut app = app_for(Some("free"));

        app.previous();
        assert_eq!(app.selected_category(), Some("other"));

        app.open_page(Page::Pricing);
        app.previous();
        assert_eq!(app.plan_state.selected(), Some(3));
        app.next();
        assert_eq!(app.plan_state.selected(), Some(0));
    }
}
