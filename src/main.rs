use std::{
    io::{self, stdin},
    net::SocketAddr,
    path::PathBuf,
    time::Duration,
};

use anyhow::bail;
use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use wordmint::{
    app::App,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore, DEFAULT_SERVER_URL},
    identity::Identity,
    leaderboard::LeaderboardFeed,
    logging::{setup_logger, LogTarget},
    round::RoundController,
    runtime::{CrosstermEventSource, FixedTicker, GameEventSource, Runner, Ticker},
    server,
    sound::{Silent, SoundEffects, TerminalBell},
    speech::select_speech,
    stats::StatsDb,
    store::{open_store, StoreKind, LEADERBOARD_LIMIT},
    submit::BackgroundSubmitter,
    timer::ThreadScheduler,
    ui,
    words::WordList,
};

const TICK_RATE_MS: u64 = 100;

/// Targets too chatty to log at debug
const QUIET_TARGETS: &[&str] = &["hyper", "reqwest", "rustls", "axum"];

/// listen-and-spell game: hear a word, type it before the clock runs out
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A listen-and-spell terminal game. Each round speaks a word, then gives you a fixed number of seconds to type it. Consecutive correct answers build a streak that is posted to a shared leaderboard when you are signed in."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// player id used for leaderboard submissions (also read from WORDMINT_PLAYER)
    #[clap(long)]
    player: Option<String>,

    /// seconds allowed to type each word
    #[clap(short = 's', long)]
    round_secs: Option<u32>,

    /// where leaderboard scores are kept
    #[clap(long, value_enum)]
    store: Option<StoreKind>,

    /// path of the file or sqlite store
    #[clap(long)]
    store_path: Option<PathBuf>,

    /// base url of a `wordmint serve` instance, used with --store http
    #[clap(long)]
    server_url: Option<String>,

    /// url returning a JSON array of words; falls back to the built-in list
    #[clap(long)]
    word_list_url: Option<String>,

    /// text-to-speech command line; the word is appended as the last argument
    #[clap(long)]
    speech_command: Option<String>,

    /// no speech and no sound cues
    #[clap(long)]
    mute: bool,

    /// seconds between leaderboard refreshes
    #[clap(long)]
    refresh_secs: Option<u64>,

    /// trace, debug, info, warn or error
    #[clap(long)]
    log_level: Option<String>,

    /// persist the effective settings to the config file
    #[clap(long)]
    save_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// run the leaderboard HTTP service
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    /// address to listen on
    #[clap(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// backing store for served scores
    #[clap(long, value_enum, default_value_t = StoreKind::File)]
    store: StoreKind,

    /// path of the file or sqlite store
    #[clap(long)]
    store_path: Option<PathBuf>,

    /// trace, debug, info, warn or error
    #[clap(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Flags take precedence over the stored config
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(player) = &self.player {
            config.player = Some(player.clone());
        }
        if let Some(secs) = self.round_secs {
            config.round_secs = secs;
        }
        if let Some(store) = self.store {
            config.store = store;
        }
        if let Some(path) = &self.store_path {
            config.store_path = Some(path.clone());
        }
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        if let Some(url) = &self.word_list_url {
            config.word_list_url = Some(url.clone());
        }
        if let Some(command) = &self.speech_command {
            config.speech_command = Some(command.clone());
        }
        if let Some(secs) = self.refresh_secs {
            config.leaderboard_refresh_secs = secs;
        }
        if let Some(level) = &self.log_level {
            config.log_level = Some(level.clone());
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.clone() {
        Some(Command::Serve(args)) => run_server(args),
        None => run_game(cli),
    }
}

fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    if args.store == StoreKind::Http {
        bail!("serve needs a local store: memory, file or sqlite");
    }

    setup_logger(
        args.log_level.clone(),
        LogTarget::Stdout,
        QUIET_TARGETS.iter().map(|t| t.to_string()).collect(),
    )?;
    let store = open_store(args.store, args.store_path.clone(), DEFAULT_SERVER_URL)?;
    info!("serving {} store", args.store);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server::serve(args.bind, store, LEADERBOARD_LIMIT))
}

fn run_game(cli: Cli) -> anyhow::Result<()> {
    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply_overrides(&mut config);
    if cli.save_config {
        config_store.save(&config)?;
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    setup_logger(
        config.log_level.clone(),
        LogTarget::File(AppDirs::log_path()),
        QUIET_TARGETS.iter().map(|t| t.to_string()).collect(),
    )?;

    let store = open_store(config.store, config.store_path.clone(), &config.server_url)?;
    let (words, word_warning) = WordList::load(config.word_list_url.as_deref());
    info!("{} words loaded, {} store", words.len(), config.store);

    let events = CrosstermEventSource::new();
    let tx = events.sender();

    let sound: Box<dyn SoundEffects> = if cli.mute {
        Box::new(Silent)
    } else {
        Box::new(TerminalBell)
    };
    let controller = RoundController::new(
        words,
        Box::new(ThreadScheduler::new(tx.clone())),
        Box::new(tx.clone()),
    )
    .with_settings(config.round_settings())
    .with_speech(select_speech(config.speech_command.as_deref(), cli.mute))
    .with_sound(sound)
    .with_submitter(Box::new(BackgroundSubmitter::new(store.clone(), tx.clone())));

    let feed = LeaderboardFeed::background(
        store,
        tx,
        config.refresh_interval(),
        config.leaderboard_size,
    );

    let (stats, stats_warning) = match StatsDb::new() {
        Ok(db) => (Some(db), None),
        Err(e) => {
            warn!("stats history disabled: {}", e);
            (None, Some(format!("Stats unavailable: {}", e)))
        }
    };

    let identity = Identity::resolve(config.player.as_deref());
    let mut app = App::new(controller, feed, identity, stats);
    if let Some(warning) = startup_warning([word_warning, stats_warning]) {
        app.warn(warning);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.mount();
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));
    let result = start_tui(&mut terminal, &mut app, &runner);
    app.controller.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Everything that went wrong during setup, on one line
fn startup_warning<const N: usize>(warnings: [Option<String>; N]) -> Option<String> {
    let warnings: Vec<String> = warnings.into_iter().flatten().collect();
    if warnings.is_empty() {
        None
    } else {
        Some(warnings.join("; "))
    }
}

fn start_tui<B: Backend, E: GameEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> anyhow::Result<()> {
    terminal.draw(|f| ui::draw(app, f))?;

    loop {
        app.handle_event(runner.step());
        if app.should_quit {
            break;
        }
        terminal.draw(|f| ui::draw(app, f))?;
    }

    Ok(())
}
