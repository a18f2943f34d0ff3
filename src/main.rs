// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use finance_dashboard::{
    format_currency, get_events_for_entity, pricing_cards, resolve_access, seed_plans, AppConfig, BillingCycle,
    Budget, BudgetPeriod, Feature, Identity, PlanCatalog, PlanStore, SessionProvider, SqliteStore,
};
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "finance-dashboard")]
#[command(version)]
#[command(about = "Personal finance dashboard: plans, feature access and budgets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and write the plan feature documents
    Init,
    /// Show the pricing table
    Plans {
        /// Show annual prices per month
        #[arg(long)]
        annual: bool,
        /// Label actions relative to this plan
        #[arg(long)]
        current: Option<String>,
    },
    /// Manage user documents
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Check whether a user may open a feature
    Check { uid: String, feature: Feature },
    /// Print a budget with the default categories
    Budget {
        #[arg(long, value_enum, default_value = "monthly")]
        period: PeriodArg,
        /// Any date inside the period (defaults to today)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Set a category limit, e.g. --set food=600 (repeatable)
        #[arg(long = "set", value_parser = parse_limit)]
        limits: Vec<(String, Decimal)>,
        /// Let the total drift instead of rebalancing other categories
        #[arg(long)]
        no_auto_adjust: bool,
    },
    /// Interactive terminal dashboard
    Ui {
        /// Sign in as this user
        #[arg(long)]
        user: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Sign up a new user on the default plan
    Add {
        uid: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Show a user document and its recent events
    Show { uid: String },
    /// Move a user to another plan
    Plan { uid: String, plan: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum PeriodArg {
    Weekly,
    Monthly,
}

impl From<PeriodArg> for BudgetPeriod {
    fn from(arg: PeriodArg) -> Self {
        match arg {
            PeriodArg::Weekly => BudgetPeriod::Weekly,
            PeriodArg::Monthly => BudgetPeriod::Monthly,
        }
    }
}

fn parse_limit(s: &str) -> Result<(String, Decimal), String> {
    let (label, amount) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=AMOUNT, got '{}'", s))?;
    let amount: Decimal = amount
        .trim()
        .parse()
        .map_err(|e| format!("invalid amount '{}': {}", amount, e))?;
    Ok((label.trim().to_string(), amount))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, load_error) = AppConfig::from_env();

    match cli.command {
        Commands::Ui { user } => {
            // The TUI owns the terminal, so no subscriber; say it before starting
            if let Some(e) = &load_error {
                println!("⚠️  Config not loaded, using defaults: {:#}", e);
            }
            run_ui_mode(&config, user)
        }
        command => {
            init_logging(&config);
            if let Some(e) = &load_error {
                AppConfig::report_load_error(e);
            }
            run_command(&config, command)
        }
    }
}

/// Structured logs go to stderr so command output stays clean
fn init_logging(config: &AppConfig) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_directive()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_store(config: &AppConfig, catalog: &PlanCatalog) -> Result<SqliteStore> {
    let store = SqliteStore::open(&config.database_path)?;
    seed_plans(&store, catalog)?;
    Ok(store)
}

fn run_command(config: &AppConfig, command: Commands) -> Result<()> {
    let catalog = config.load_catalog()?;

    match command {
        Commands::Init => run_init(config, &catalog),
        Commands::Plans { annual, current } => {
            let cycle = if annual { BillingCycle::Annual } else { BillingCycle::Monthly };
            run_plans(&catalog, current.as_deref(), cycle);
            Ok(())
        }
        Commands::User { action } => run_user(config, &catalog, action),
        Commands::Check { uid, feature } => run_check(config, &catalog, &uid, feature),
        Commands::Budget {
            period,
            start,
            limits,
            no_auto_adjust,
        } => {
            run_budget(period.into(), start, &limits, !no_auto_adjust);
            Ok(())
        }
        Commands::Ui { .. } => Ok(()),
    }
}

fn run_init(config: &AppConfig, catalog: &PlanCatalog) -> Result<()> {
    println!("🗄️  Plan store - SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n🔧 Setting up database...");
    let store = open_store(config, catalog)?;
    println!("✓ Database initialized at {:?}", config.database_path);
    println!("✓ {} plan documents written", catalog.plans().len());

    println!("\n🔍 Verifying database...");
    println!("✓ {} users", store.user_count()?);
    for (plan, count) in store.plan_distribution()? {
        println!("   {:<14} {}", plan, count);
    }

    Ok(())
}

fn run_plans(catalog: &PlanCatalog, current: Option<&str>, cycle: BillingCycle) {
    println!("💳 Pricing - {} billing", cycle.label());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for card in pricing_cards(catalog, current, cycle) {
        let star = if card.highlighted { " ⭐" } else { "" };
        println!("\n{}{}  {}/month  [{}]", card.name, star, format_currency(card.price_per_month), card.action_label);
        if !card.description.is_empty() {
            println!("   {}", card.description);
        }
        for line in card.features {
            let mark = if line.included { "✓" } else { "✗" };
            println!("   {} {}", mark, line.name);
        }
    }
}

fn run_user(config: &AppConfig, catalog: &PlanCatalog, action: UserCommands) -> Result<()> {
    let store = open_store(config, catalog)?;

    match action {
        UserCommands::Add { uid, email, name } => {
            if store.get_user(&uid)?.is_some() {
                bail!("user {} already exists", uid);
            }
            let session = SessionProvider::with_default_plan(&config.default_plan);
            let identity = Identity::new(&uid).with_email(&email).with_display_name(&name);
            let plan = session.sign_up_with_email(identity, &store)?;
            println!("✓ Created {} on the {} plan", uid, plan);
        }
        UserCommands::Show { uid } => {
            let Some(doc) = store.get_user(&uid)? else {
                bail!("no user {}", uid);
            };
            println!("👤 {}", uid);
            println!("   Name:  {}", doc.full_name());
            println!("   Email: {}", doc.email);
            println!("   Plan:  {} Plan", doc.plan.to_uppercase());

            let events = get_events_for_entity(store.connection(), "user", &uid)?;
            if !events.is_empty() {
                println!("\n📜 History");
                for event in events {
                    println!("   {}  {}", event.timestamp, event.event_type);
                }
            }
        }
        UserCommands::Plan { uid, plan } => {
            if !catalog.contains(&plan) {
                bail!("unknown plan '{}' (expected one of: {})", plan, catalog.ids().join(", "));
            }
            if store.get_user(&uid)?.is_none() {
                bail!("no user {}", uid);
            }
            store.set_user_plan(&uid, &plan)?;
            println!("✓ {} is now on the {} plan", uid, plan);
        }
    }

    Ok(())
}

fn run_check(config: &AppConfig, catalog: &PlanCatalog, uid: &str, feature: Feature) -> Result<()> {
    let store = open_store(config, catalog)?;
    let decision = resolve_access(catalog, Some(uid), &store, feature);

    if decision.is_granted() {
        println!("✅ {} may use {}", uid, feature.display_name());
    } else {
        println!("🔒 {} may not use {}", uid, feature.display_name());
        if let Some(plan) = catalog.cheapest_with(feature) {
            println!("   Included from the {} plan", plan.name);
        }
    }
    println!("   {}", serde_json::to_string(&decision)?);

    Ok(())
}

fn run_budget(period: BudgetPeriod, start: Option<NaiveDate>, limits: &[(String, Decimal)], auto_adjust: bool) {
    let mut budget = Budget::new(period, start.unwrap_or_else(|| Utc::now().date_naive()));
    if budget.auto_adjust != auto_adjust {
        budget.toggle_auto_adjust();
    }
    for (label, amount) in limits {
        if budget.category(label).is_none() {
            println!("⚠️  Unknown category '{}', skipped", label);
            continue;
        }
        budget.set_limit(label, *amount);
    }

    let summary = budget.summary();
    println!("💰 {} budget {} → {}", period.label(), budget.start_date, budget.end_date);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for category in &summary.categories {
        println!("   {:<16} {:>12}", category.label, format_currency(category.limit));
    }
    println!("   {:<16} {:>12}", "Total", format_currency(summary.total_budget));
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig, user: Option<String>) -> Result<()> {
    println!("🖥️  Loading Finance Dashboard UI...\n");

    let catalog = config.load_catalog()?;
    let store = open_store(config, &catalog)?;
    let session = SessionProvider::with_default_plan(&config.default_plan);

    if let Some(uid) = user {
        session.sign_in_with_provider(Identity::new(&uid), &store)?;
        if let Some(badge) = session.plan_badge() {
            println!("✓ Signed in as {} ({})", uid, badge);
        }
    }

    println!("Starting UI... (Press 'q' to quit)\n");

    let budget = Budget::new(BudgetPeriod::Monthly, Utc::now().date_naive());
    let mut app = ui::App::new(catalog, store, session, budget);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig, _user: Option<String>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin dashboard-server --features server");
    std::process::exit(1);
}
