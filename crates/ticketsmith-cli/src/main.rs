//! `tks` — TicketSmith command-line front end.
//!
//! Stands in for the windowed UI: establishes a session against the active
//! database, inspects templates, and creates and manages job tickets. Every
//! command prints one JSON document on stdout; failures exit non-zero with
//! a condition-specific message on stderr.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use ticketsmith_core::{Merged, StaticKind, Template, TicketInput};
use ticketsmith_store::{
    ActiveStore, AddUserOutcome, LoginOutcome, Privilege, Session, SystemDatabase,
};
use time::OffsetDateTime;

#[derive(Debug, Parser)]
#[command(name = "tks")]
#[command(about = "TicketSmith job ticket manager")]
struct Cli {
    /// Override the system database location (defaults to the platform
    /// data directory).
    #[arg(long, global = true)]
    system_root: Option<PathBuf>,

    /// Operate on this active database instead of the selected one.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Username for stores that require login.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Password for stores that require login.
    #[arg(long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Establish the system database and the default store.
    Init,
    /// Show the active database and session-relevant state.
    Status,
    /// Select a different active database.
    UseDb { path: PathBuf },
    /// Manage the credential store.
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Allow or deny guest sessions from viewing ticket contents.
    GuestView {
        #[arg(value_enum)]
        state: ToggleArg,
    },
    /// Inspect and edit templates.
    Template {
        #[command(subcommand)]
        command: TemplateCommand,
    },
    /// Create and manage job tickets.
    Ticket {
        #[command(subcommand)]
        command: TicketCommand,
    },
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    /// Add a user. The first user of a store must be an admin.
    Add {
        username: String,
        new_password: String,
        #[arg(value_enum)]
        privilege: PrivilegeArg,
    },
    /// Attempt a login and report the outcome.
    Login { username: String, login_password: String },
    /// Change an existing user's privilege.
    Promote {
        username: String,
        #[arg(value_enum)]
        privilege: PrivilegeArg,
    },
    /// List usernames and privileges.
    List,
}

#[derive(Debug, Subcommand)]
enum TemplateCommand {
    List,
    /// Print a template's fields in the combined walk order.
    Show { name: String },
    /// Create and persist an empty template.
    New { name: String, document: String },
    AddTextbox(AddFieldArgs),
    AddCheckbox(AddFieldArgs),
    AddStatic {
        template: String,
        #[arg(value_enum)]
        kind: StaticKindArg,
        /// Counter only: reset the running value each new year.
        #[arg(long)]
        reset_annually: bool,
    },
    Delete { name: String },
}

#[derive(Debug, Args)]
struct AddFieldArgs {
    template: String,
    name: String,
    #[arg(long)]
    required: bool,
    #[arg(long)]
    priority: Option<u32>,
}

#[derive(Debug, Subcommand)]
enum TicketCommand {
    /// Create a ticket from a template and user-entered values.
    Create {
        template: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Textbox value as NAME=TEXT; repeatable.
        #[arg(long = "text")]
        texts: Vec<String>,
        /// Checkbox to tick by name; repeatable.
        #[arg(long = "check")]
        checks: Vec<String>,
    },
    List,
    /// Print a ticket's contents (guest access is store-gated).
    Show { stem: String },
    Delete { stem: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PrivilegeArg {
    Admin,
    Guest,
}

impl From<PrivilegeArg> for Privilege {
    fn from(arg: PrivilegeArg) -> Self {
        match arg {
            PrivilegeArg::Admin => Self::Admin,
            PrivilegeArg::Guest => Self::Guest,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ToggleArg {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StaticKindArg {
    CustomerFirstName,
    CustomerLastName,
    Counter,
    Day,
    Month,
    Year,
    TimeStamp,
    TemplateId,
}

impl StaticKindArg {
    fn into_kind(self, reset_annually: bool) -> StaticKind {
        match self {
            Self::CustomerFirstName => StaticKind::CustomerFirstName,
            Self::CustomerLastName => StaticKind::CustomerLastName,
            Self::Counter => StaticKind::Counter { value: 0, reset_annually },
            Self::Day => StaticKind::Day,
            Self::Month => StaticKind::Month,
            Self::Year => StaticKind::Year,
            Self::TimeStamp => StaticKind::TimeStamp,
            Self::TemplateId => StaticKind::TemplateId,
        }
    }
}

fn system_database(cli: &Cli) -> Result<SystemDatabase> {
    match &cli.system_root {
        Some(root) => Ok(SystemDatabase::at(root)),
        None => SystemDatabase::discover().context("cannot locate the system database"),
    }
}

fn open_store(cli: &Cli) -> Result<ActiveStore> {
    if let Some(db) = &cli.db {
        return ActiveStore::open(db).context("failed to open the requested database");
    }
    let system = system_database(cli)?;
    system
        .open_active()
        .context("failed to open the active database; run `tks init` first")
}

/// Establish a session. The default store needs no login; any other store
/// requires credentials, and each login failure gets its own message.
fn establish_session(cli: &Cli, store: &ActiveStore) -> Result<Session> {
    if let Some(session) = store.default_session() {
        return Ok(session);
    }
    let credentials = store.credentials();
    if !credentials.initialized() {
        bail!(
            "this store has no users yet; create the first admin with \
             `tks user add <name> <password> admin`"
        );
    }
    let (Some(user), Some(password)) = (cli.user.as_deref(), cli.password.as_deref()) else {
        bail!("this store requires login; pass --user and --password");
    };
    match credentials.login(user, password)? {
        LoginOutcome::Admin => Ok(Session::for_user(user, Privilege::Admin)),
        LoginOutcome::Guest => Ok(Session::for_user(user, Privilege::Guest)),
        LoginOutcome::StoreMissing => bail!("the credential store is missing"),
        LoginOutcome::UsernameNotFound => bail!("unknown username: {user}"),
        LoginOutcome::WrongPassword => bail!("wrong password for {user}"),
    }
}

fn require_admin(session: &Session) -> Result<()> {
    if session.is_admin() {
        Ok(())
    } else {
        Err(anyhow!("this operation requires admin privilege"))
    }
}

fn parse_assignment(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=TEXT, got: {raw}"))?;
    Ok((name.to_string(), value.to_string()))
}

fn template_json(template: &Template) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = template
        .fields_in_order()
        .into_iter()
        .map(|field| match field {
            Merged::Textbox(t) => json!({
                "kind": "textbox",
                "name": t.name,
                "priority": t.priority,
                "required": t.required,
                "x": t.x,
                "y": t.y,
                "width": t.width,
                "height": t.height,
            }),
            Merged::Checkbox(c) => json!({
                "kind": "checkbox",
                "name": c.name,
                "priority": c.priority,
                "required": c.required,
                "x": c.x,
                "y": c.y,
                "scale": c.scale,
            }),
        })
        .collect();
    let statics: Vec<serde_json::Value> = template
        .statics()
        .iter()
        .map(|s| {
            let mut entry = json!({
                "name": s.name,
                "x": s.x,
                "y": s.y,
                "width": s.width(),
                "height": s.height(),
            });
            if let StaticKind::Counter { value, reset_annually } = &s.kind {
                entry["counterValue"] = json!(value.to_string());
                entry["resetAnnually"] = json!(reset_annually);
            }
            entry
        })
        .collect();
    json!({
        "name": template.name,
        "documentPath": template.document_path,
        "fields": fields,
        "statics": statics,
    })
}

fn run(cli: &Cli) -> Result<serde_json::Value> {
    match &cli.command {
        Command::Init => {
            let system = system_database(cli)?;
            let default_store = system.initialize()?;
            Ok(json!({
                "systemRoot": system.root(),
                "activeDatabase": system.active_database()?,
                "defaultStore": default_store.root(),
            }))
        }
        Command::Status => {
            let store = open_store(cli)?;
            let settings = store.settings()?;
            Ok(json!({
                "activeDatabase": store.root(),
                "isDefault": store.is_default(),
                "credentialsInitialized": store.credentials().initialized(),
                "guestCanView": settings.guest_can_view,
                "templates": store.list_templates()?.len(),
                "tickets": store.list_tickets()?.len(),
            }))
        }
        Command::UseDb { path } => {
            let system = system_database(cli)?;
            system.initialize()?;
            let store = ActiveStore::open(path)?;
            system.set_active_database(store.root())?;
            Ok(json!({ "activeDatabase": store.root() }))
        }
        Command::User { command } => run_user(cli, command),
        Command::GuestView { state } => {
            let store = open_store(cli)?;
            let session = establish_session(cli, &store)?;
            require_admin(&session)?;
            let enabled = matches!(*state, ToggleArg::On);
            store.set_guest_can_view(enabled)?;
            Ok(json!({ "guestCanView": enabled }))
        }
        Command::Template { command } => run_template(cli, command),
        Command::Ticket { command } => run_ticket(cli, command),
    }
}

fn run_user(cli: &Cli, command: &UserCommand) -> Result<serde_json::Value> {
    let store = open_store(cli)?;
    let credentials = store.credentials();
    match command {
        UserCommand::Add { username, new_password, privilege } => {
            let privilege = Privilege::from(*privilege);
            if credentials.initialized() {
                let session = establish_session(cli, &store)?;
                require_admin(&session)?;
            } else if privilege != Privilege::Admin {
                bail!("the first user of a store must be an admin");
            }
            match credentials.add_user(username, new_password, privilege)? {
                AddUserOutcome::Added => Ok(json!({
                    "added": username,
                    "privilege": privilege.as_str(),
                })),
                AddUserOutcome::UsernameExists => {
                    bail!("username already exists: {username}")
                }
            }
        }
        UserCommand::Login { username, login_password } => {
            let outcome = match credentials.login(username, login_password)? {
                LoginOutcome::Admin => "admin",
                LoginOutcome::Guest => "guest",
                LoginOutcome::StoreMissing => "store-missing",
                LoginOutcome::UsernameNotFound => "username-not-found",
                LoginOutcome::WrongPassword => "wrong-password",
            };
            Ok(json!({ "login": outcome }))
        }
        UserCommand::Promote { username, privilege } => {
            let session = establish_session(cli, &store)?;
            require_admin(&session)?;
            let privilege = Privilege::from(*privilege);
            credentials.promote_user(username, privilege)?;
            Ok(json!({ "username": username, "privilege": privilege.as_str() }))
        }
        UserCommand::List => {
            let session = establish_session(cli, &store)?;
            require_admin(&session)?;
            let users: Vec<serde_json::Value> = credentials
                .list_users()?
                .into_iter()
                .map(|(name, privilege)| json!({ "username": name, "privilege": privilege.as_str() }))
                .collect();
            Ok(json!({ "users": users }))
        }
    }
}

fn run_template(cli: &Cli, command: &TemplateCommand) -> Result<serde_json::Value> {
    let store = open_store(cli)?;
    let session = establish_session(cli, &store)?;
    let now = OffsetDateTime::now_utc();
    match command {
        TemplateCommand::List => Ok(json!({ "templates": store.list_templates()? })),
        TemplateCommand::Show { name } => {
            let template = store.load_template_for_year(name, now)?;
            Ok(template_json(&template))
        }
        TemplateCommand::New { name, document } => {
            require_admin(&session)?;
            let mut template = Template::new(document.clone());
            template.name.clone_from(name);
            let path = store.save_template(&template)?;
            Ok(json!({ "template": template.name, "path": path }))
        }
        TemplateCommand::AddTextbox(args) => {
            require_admin(&session)?;
            let mut template = store.load_template_for_year(&args.template, now)?;
            let accepted = template.add_textbox(&args.name);
            if args.required {
                let _change = template.set_textbox_required(&accepted, true)?;
            }
            if let Some(priority) = args.priority {
                let _change = template.set_textbox_priority(&accepted, priority, false)?;
            }
            store.save_template(&template)?;
            Ok(json!({ "template": template.name, "added": accepted }))
        }
        TemplateCommand::AddCheckbox(args) => {
            require_admin(&session)?;
            let mut template = store.load_template_for_year(&args.template, now)?;
            let accepted = template.add_checkbox(&args.name);
            if args.required {
                let _change = template.set_checkbox_required(&accepted, true)?;
            }
            if let Some(priority) = args.priority {
                let _change = template.set_checkbox_priority(&accepted, priority, false)?;
            }
            store.save_template(&template)?;
            Ok(json!({ "template": template.name, "added": accepted }))
        }
        TemplateCommand::AddStatic { template, kind, reset_annually } => {
            require_admin(&session)?;
            let mut loaded = store.load_template_for_year(template, now)?;
            let accepted = loaded.add_static(kind.into_kind(*reset_annually));
            store.save_template(&loaded)?;
            Ok(json!({ "template": loaded.name, "added": accepted }))
        }
        TemplateCommand::Delete { name } => {
            require_admin(&session)?;
            store.delete_template(name)?;
            Ok(json!({ "deleted": name }))
        }
    }
}

fn run_ticket(cli: &Cli, command: &TicketCommand) -> Result<serde_json::Value> {
    let store = open_store(cli)?;
    let session = establish_session(cli, &store)?;
    let now = OffsetDateTime::now_utc();
    match command {
        TicketCommand::Create { template, first_name, last_name, texts, checks } => {
            require_admin(&session)?;
            let mut loaded = store.load_template_for_year(template, now)?;

            let mut input = TicketInput {
                customer_first_name: first_name.clone(),
                customer_last_name: last_name.clone(),
                texts: BTreeMap::new(),
                checks: BTreeMap::new(),
            };
            for raw in texts {
                let (name, value) = parse_assignment(raw)?;
                input.texts.insert(name, value);
            }
            for name in checks {
                input.checks.insert(name.clone(), true);
            }

            let saved = store.create_ticket(&mut loaded, &input, now)?;
            let statics: BTreeMap<&str, &str> = saved
                .ticket
                .statics()
                .iter()
                .map(|s| (s.name.as_str(), s.text.as_str()))
                .collect();
            Ok(json!({
                "sequence": saved.sequence,
                "stem": saved.stem,
                "statics": statics,
            }))
        }
        TicketCommand::List => Ok(json!({ "tickets": store.list_tickets()? })),
        TicketCommand::Show { stem } => {
            if !session.is_admin() && !store.settings()?.guest_can_view {
                bail!("guest sessions may not view ticket contents in this store");
            }
            let ticket = store.load_ticket(stem)?;
            let fields: Vec<serde_json::Value> = ticket
                .fields_in_order()
                .into_iter()
                .map(|field| match field {
                    Merged::Textbox(t) => json!({
                        "kind": "textbox",
                        "name": t.name,
                        "text": t.text,
                    }),
                    Merged::Checkbox(c) => json!({
                        "kind": "checkbox",
                        "name": c.name,
                        "checked": c.checked,
                    }),
                })
                .collect();
            let statics: Vec<serde_json::Value> = ticket
                .statics()
                .iter()
                .map(|s| json!({ "name": s.name, "text": s.text }))
                .collect();
            Ok(json!({
                "customerFirstName": ticket.customer_first_name,
                "customerLastName": ticket.customer_last_name,
                "documentPath": ticket.document_path,
                "fields": fields,
                "statics": statics,
            }))
        }
        TicketCommand::Delete { stem } => {
            require_admin(&session)?;
            store.delete_ticket(stem)?;
            Ok(json!({ "deleted": stem }))
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = run(&cli)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
