//! `stampcard` command-line host.
//!
//! ## Commands
//!
//! - `stampcard start [--url <URL>]`
//! - `stampcard status`
//! - `stampcard scan <URL-OR-TOKEN>`
//! - `stampcard scan --scanner-error <NAME>`
//! - `stampcard redeem [--yes]`
//! - `stampcard reset`
//! - `stampcard token`
//! - `stampcard call <ENDPOINT> [--body <JSON>] [--no-token] [--method <METHOD>]`

pub mod presenter;

use std::io::BufRead;
use std::io::Stdout;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use stampcard_core::ApiClient;
use stampcard_core::ApiError;
use stampcard_core::CampaignConfig;
use stampcard_core::CookieJar;
use stampcard_core::EnvPassword;
use stampcard_core::Notice;
use stampcard_core::PersistentStore;
use stampcard_core::RedeemOutcome;
use stampcard_core::RequestOptions;
use stampcard_core::ScanOutcome;
use stampcard_core::Session;
use stampcard_core::StampCard;
use stampcard_core::UrlLocation;
use stampcard_core::Visitor;
use stampcard_core::config::default_home;
use url::Url;

use crate::presenter::TerminalPresenter;

/// Environment variable holding the campaign password.
pub const PASSWORD_ENV_VAR: &str = "STAMPCARD_PASSWORD";

const JAR_FILE: &str = "cookies.json";

const NO_VISITOR_HINT: &str = "No visitor yet. Run `stampcard start` to begin collecting.";

#[derive(Debug, Parser)]
#[command(name = "stampcard", version, about = "Collect stamps and redeem the reward")]
pub struct Cli {
    /// Campaign config file (TOML). Defaults to `~/.stampcard/config.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cookie jar file. Defaults to `~/.stampcard/cookies.json`.
    #[arg(long, global = true)]
    pub jar: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a visitor identity if needed, then process a scanned URL.
    Start(StartArgs),
    /// Show collected items, reward state and the token slot.
    Status,
    /// Process a scanned QR code: a URL with a `token` parameter or a bare token.
    Scan(ScanArgs),
    /// Redeem the reward once all four items are collected.
    Redeem(RedeemArgs),
    /// Forget the visitor, progress and token.
    Reset,
    /// Print the bearer token, requesting one if none is stored.
    Token,
    /// Send an authorized request and print the JSON response.
    Call(CallArgs),
}

#[derive(Debug, Parser)]
pub struct StartArgs {
    /// Landing URL, possibly carrying a `token` parameter.
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Debug, Parser)]
pub struct ScanArgs {
    /// Scanned URL or bare token.
    #[arg(required_unless_present = "scanner_error")]
    pub input: Option<String>,

    /// Report a scanner failure by its media error name, e.g. `NotAllowedError`.
    #[arg(long, value_name = "NAME", conflicts_with = "input")]
    pub scanner_error: Option<String>,
}

#[derive(Debug, Parser)]
pub struct RedeemArgs {
    /// Confirm without prompting.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Parser)]
pub struct CallArgs {
    /// Endpoint relative to the server URL, e.g. `api/redeem`.
    pub endpoint: String,

    /// JSON request body.
    #[arg(long)]
    pub body: Option<String>,

    /// Send without a bearer token.
    #[arg(long = "no-token")]
    pub no_token: bool,

    /// HTTP method.
    #[arg(long, default_value = "POST")]
    pub method: String,
}

/// Resolved config and storage shared by every command.
struct App {
    config: CampaignConfig,
    store: Arc<CookieJar>,
}

impl App {
    fn load(cli: &Cli) -> Result<Self> {
        let home = default_home().context("could not determine the stampcard home directory")?;
        let config = CampaignConfig::load_layered(cli.config.as_deref(), &home)
            .context("failed to load campaign config")?;
        let jar = cli.jar.clone().unwrap_or_else(|| home.join(JAR_FILE));
        tracing::debug!("using cookie jar {}", jar.display());
        Ok(Self {
            config,
            store: Arc::new(CookieJar::new(jar)),
        })
    }

    fn card(&self) -> Result<StampCard<TerminalPresenter<Stdout>>> {
        let store: Arc<dyn PersistentStore> = self.store.clone();
        let session = Session::new(store, self.config.store_keys(), self.config.state_ttl());
        let table = self.config.qr_table()?;
        Ok(StampCard::new(
            session,
            table,
            TerminalPresenter::new(std::io::stdout()),
        ))
    }

    fn client(&self) -> Result<ApiClient> {
        let store: Arc<dyn PersistentStore> = self.store.clone();
        let client = ApiClient::from_config(
            &self.config,
            store,
            Arc::new(EnvPassword::new(PASSWORD_ENV_VAR)),
        )?;
        Ok(client)
    }

    /// Address the card starts from when the command carries none.
    fn landing(&self) -> Result<UrlLocation> {
        Ok(UrlLocation::new(self.config.base_url()?))
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let app = App::load(&cli)?;
    match cli.command {
        Command::Start(args) => cmd_start(&app, args),
        Command::Status => cmd_status(&app),
        Command::Scan(args) => cmd_scan(&app, args),
        Command::Redeem(args) => cmd_redeem(&app, args),
        Command::Reset => cmd_reset(&app),
        Command::Token => cmd_token(&app).await,
        Command::Call(args) => cmd_call(&app, args).await,
    }
}

fn cmd_start(app: &App, args: StartArgs) -> Result<()> {
    let mut location = match args.url {
        Some(url) => UrlLocation::new(parse_url(&url)?),
        None => app.landing()?,
    };
    let mut card = app.card()?;
    card.boot(&mut app.landing()?);
    let outcome = card.start(&mut location);
    report_scan(&mut card, outcome);
    card.presenter_mut().print_card();
    Ok(())
}

fn cmd_status(app: &App) -> Result<()> {
    let mut card = app.card()?;
    if card.boot(&mut app.landing()?) == Visitor::New {
        card.presenter_mut().line(NO_VISITOR_HINT);
        return Ok(());
    }
    card.presenter_mut().print_card();
    let token = app.client()?.tokens().token_state();
    card.presenter_mut().line(&format!("token: {token}"));
    Ok(())
}

fn cmd_scan(app: &App, args: ScanArgs) -> Result<()> {
    let mut card = app.card()?;
    let visitor = card.boot(&mut app.landing()?);
    if let Some(name) = args.scanner_error {
        card.scanner_failed(&name);
        bail!("the scanner could not start ({name})");
    }
    if visitor == Visitor::New {
        bail!("{NO_VISITOR_HINT}");
    }
    let Some(input) = args.input else {
        bail!("nothing to scan");
    };
    let outcome = match Url::parse(&input) {
        Ok(url) => card.handle_location(&mut UrlLocation::new(url)),
        Err(_) => card.scan_token(input.trim()),
    };
    report_scan(&mut card, outcome);
    card.presenter_mut().print_card();
    Ok(())
}

fn cmd_redeem(app: &App, args: RedeemArgs) -> Result<()> {
    let mut card = app.card()?;
    if card.boot(&mut app.landing()?) == Visitor::New {
        bail!("{NO_VISITOR_HINT}");
    }
    if !card.request_redeem() {
        let state = card.state();
        if state.redeemed {
            bail!("the reward has already been redeemed");
        }
        bail!(
            "not redeemable yet: {}/4 items collected",
            state.collected_count()
        );
    }

    if !args.yes && !prompt_yes("Redeem now? [y/N] ")? {
        card.cancel_redeem();
        card.presenter_mut().line("Redemption cancelled.");
        return Ok(());
    }

    match card.confirm_redeem() {
        RedeemOutcome::Redeemed => {
            card.presenter_mut().line("Reward redeemed. Enjoy!");
            Ok(())
        }
        RedeemOutcome::Rejected => bail!("the card is no longer redeemable"),
        RedeemOutcome::Invalidated => {
            bail!("the visitor changed while redeeming; nothing was redeemed")
        }
        RedeemOutcome::NotRequested => bail!("no redemption in progress"),
    }
}

fn cmd_reset(app: &App) -> Result<()> {
    let mut card = app.card()?;
    card.reset();
    card.presenter_mut().line("Stamp card cleared.");
    Ok(())
}

async fn cmd_token(app: &App) -> Result<()> {
    let client = app.client()?;
    let token = client
        .tokens()
        .check_and_get_token()
        .await
        .map_err(notice_error)?;
    println!("{token}");
    Ok(())
}

async fn cmd_call(app: &App, args: CallArgs) -> Result<()> {
    let body = args
        .body
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--body is not valid JSON")?;
    let method = reqwest::Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{}'", args.method))?;

    let mut options = RequestOptions::default().method(method);
    if args.no_token {
        options = options.without_token();
    }

    let client = app.client()?;
    let response = client
        .authorized_request(&args.endpoint, body.as_ref(), options)
        .await
        .map_err(notice_error)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn report_scan<W: std::io::Write>(
    card: &mut StampCard<TerminalPresenter<W>>,
    outcome: ScanOutcome,
) {
    let message = match outcome {
        // Collections are announced by the presenter.
        ScanOutcome::Collected(_) | ScanOutcome::NoToken => return,
        ScanOutcome::AlreadyCollected(item) => format!("{item} was already collected."),
        ScanOutcome::Unrecognized => "That code is not part of this stamp card.".to_string(),
        ScanOutcome::NoVisitor => NO_VISITOR_HINT.to_string(),
    };
    card.presenter_mut().line(&message);
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).with_context(|| format!("invalid URL '{raw}'"))
}

fn prompt_yes(question: &str) -> Result<bool> {
    use std::io::Write;

    print!("{question}");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn notice_error(err: ApiError) -> anyhow::Error {
    anyhow::anyhow!("{}", Notice::from(&err))
}
