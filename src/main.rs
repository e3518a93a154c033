use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mkhd::{AsciiKeycodeMap, Daemon, PidFile, ShellCommandRunner};
use simplelog::{format_description, *};
use std::path::PathBuf;

const SERVICE_NAME: &str = "mkhd";

#[derive(Parser, Debug)]
#[command(author, version, verbatim_doc_comment)]
/// mkhd: a user-space keyboard remapping and hotkey daemon
///
/// mkhd watches key events and dispatches them against a stack of named
/// layers loaded from a configuration file. See the project README for the
/// configuration language.
struct Args {
    /// Configuration file to use. If not specified, the discovery order is
    /// $XDG_CONFIG_HOME/mkhd/mkhdrc, $HOME/.config/mkhd/mkhdrc, $HOME/.mkhdrc.
    #[arg(short, long, verbatim_doc_comment)]
    config: Option<PathBuf>,

    /// Disable the file watcher; configuration only reloads on SIGUSR1.
    #[arg(long, verbatim_doc_comment)]
    no_hotload: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Print per-dispatch timing to the debug log.
    #[arg(long)]
    profile: bool,

    /// Ask the already-running instance to reload its configuration, then exit.
    #[arg(long, verbatim_doc_comment)]
    reload: bool,

    /// Parse STRING as a single key combination and print its resolved
    /// modifier flags and keycode, then exit. Does not load a config file.
    #[arg(long, value_name = "STRING", verbatim_doc_comment)]
    key: Option<String>,

    /// Resolve STRING as the focused-process name against the loaded
    /// config's blocklist and print the verdict, then exit.
    #[arg(long, value_name = "STRING", verbatim_doc_comment)]
    text: Option<String>,

    /// Load the config, print every parsed layer and hotkey, then exit
    /// without dispatching any events.
    #[arg(long)]
    observe: bool,

    #[command(subcommand)]
    service: Option<ServiceCommand>,
}

#[derive(Subcommand, Debug)]
enum ServiceCommand {
    /// Install mkhd as a background service (platform service manager).
    Install,
    /// Uninstall the background service.
    Uninstall,
    /// Start the installed service.
    Start,
    /// Stop the running service.
    Stop,
    /// Restart the running service.
    Restart,
}

fn init_logging(verbose: bool) {
    let log_lvl = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut log_cfg = ConfigBuilder::new();
    if let Err(e) = log_cfg.set_time_offset_to_local() {
        eprintln!("WARNING: could not set log TZ to local: {e:?}");
    }
    log_cfg.set_time_format_custom(format_description!(
        version = 2,
        "[hour]:[minute]:[second].[subsecond digits:4]"
    ));
    CombinedLogger::init(vec![TermLogger::new(
        log_lvl,
        log_cfg.build(),
        TerminalMode::Mixed,
        ColorChoice::AlwaysAnsi,
    )])
    .expect("logger can init");
}

fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    mkhd::config_paths::discover().context(
        "no configuration file found; pass --config PATH or create one of \
         $XDG_CONFIG_HOME/mkhd/mkhdrc, $HOME/.config/mkhd/mkhdrc, $HOME/.mkhdrc",
    )
}

/// Service install/uninstall/start/stop/restart are informative (`spec.md`
/// §6): each platform's service manager differs and is out of this crate's
/// scope, so these report what a real install would do rather than doing it.
fn run_service_command(cmd: ServiceCommand) -> Result<()> {
    match cmd {
        ServiceCommand::Install => {
            println!("would install a {SERVICE_NAME} service unit for the current user");
        }
        ServiceCommand::Uninstall => {
            println!("would remove the {SERVICE_NAME} service unit");
        }
        ServiceCommand::Start => {
            println!("would start the {SERVICE_NAME} service");
        }
        ServiceCommand::Stop => {
            println!("would stop the {SERVICE_NAME} service");
        }
        ServiceCommand::Restart => {
            println!("would restart the {SERVICE_NAME} service");
        }
    }
    Ok(())
}

fn send_reload_signal() -> Result<()> {
    let pid = PidFile::read_running_pid(SERVICE_NAME)
        .context("no running instance found (pid file missing or unreadable)")?;
    log::info!("sending SIGUSR1 to running instance (pid {pid})");
    unsafe {
        if libc::kill(pid, libc::SIGUSR1) != 0 {
            bail!("failed to signal pid {pid}: {}", std::io::Error::last_os_error());
        }
    }
    Ok(())
}

fn run_key_probe(text: &str) -> Result<()> {
    let event = mkhd_parser::parse::parse_standalone_key_combination(text, &AsciiKeycodeMap)?;
    println!("{event:?}");
    Ok(())
}

fn run_text_probe(daemon: &Daemon, process_name: &str) -> Result<()> {
    let blocked = daemon.state().blocklist.contains(&process_name.to_lowercase());
    println!("{process_name}: {}", if blocked { "blocklisted" } else { "allowed" });
    Ok(())
}

fn run_observe(daemon: &Daemon) -> Result<()> {
    for name in daemon.state().layer_names() {
        let layer = daemon.state().layer(name).expect("name came from layer_names()");
        println!("layer {name}: {} rules", layer.rule_count());
    }
    Ok(())
}

fn main_impl() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    log::info!("{SERVICE_NAME} v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(cmd) = args.service {
        return run_service_command(cmd);
    }
    if args.reload {
        return send_reload_signal();
    }
    if let Some(key) = args.key.as_deref() {
        return run_key_probe(key);
    }

    let config_path = resolve_config_path(args.config)?;
    let daemon = Daemon::new(config_path, Box::new(AsciiKeycodeMap), Box::new(ShellCommandRunner))?
        .with_event_source(Box::new(mkhd::StdinEventSource::new(Box::new(AsciiKeycodeMap))));

    if let Some(text) = args.text.as_deref() {
        return run_text_probe(&daemon, text);
    }
    if args.observe {
        return run_observe(&daemon);
    }

    run_daemon(daemon, args.no_hotload, args.profile)
}

/// The live main loop. `spec.md` §5: a single cooperative loop drives both
/// dispatch and reload; external callers (signal handler, file watcher) only
/// ever set the `reload_requested` flag, never touch `EngineState` directly.
fn run_daemon(mut daemon: Daemon, no_hotload: bool, profile: bool) -> Result<()> {
    let _pid_file = PidFile::acquire(SERVICE_NAME)?;

    signal_hook::flag::register(signal_hook::consts::SIGUSR1, daemon.reload_handle())
        .context("installing SIGUSR1 handler")?;

    #[cfg(feature = "watch")]
    let mut watcher = if no_hotload {
        None
    } else {
        Some(mkhd::PollingFileWatcher::new(vec![daemon.config_path().to_path_buf()]))
    };
    #[cfg(not(feature = "watch"))]
    let _ = no_hotload;

    log::info!("mkhd ready, dispatching events");
    loop {
        #[cfg(feature = "watch")]
        if let Some(w) = watcher.as_mut() {
            use mkhd::FileWatcher;
            if w.poll_changed() {
                daemon.request_reload();
            }
        }

        if daemon.take_reload_request() {
            match daemon.load_config() {
                Ok(()) => log::info!("configuration reloaded"),
                Err(e) => log::error!("reload failed, keeping previous configuration: {e:?}"),
            }
        }

        let Some((event, process_name)) = daemon.next_event() else {
            log::info!("event source exhausted, exiting");
            return Ok(());
        };

        let started = profile.then(std::time::Instant::now);
        let consumed = daemon.dispatch(event, &process_name);
        if let Some(started) = started {
            log::debug!("dispatch took {:?} (consumed={consumed})", started.elapsed());
        }
    }
}

pub fn main() -> Result<()> {
    let ret = main_impl();
    if let Err(ref e) = ret {
        log::error!("{e:?}");
    }
    ret
}
