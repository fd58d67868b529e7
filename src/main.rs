//! pi_everywhere - sensor server, relay and store in one binary.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures_util::{stream, StreamExt};
use pi_everywhere::device::{open_backend, ChannelMap};
use pi_everywhere::dispatch::Dispatcher;
use pi_everywhere::model::{time, Host};
use pi_everywhere::poller::{relay, ReadingPoller};
use pi_everywhere::{
    build_facade, create_app, start_web_server, AppState, DeviceFacade, DeviceTokenRegistry,
    FacadeKind, RelayConfig, RemoteFacade, StoreFacade,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "pi_everywhere")]
#[command(about = "Read Pi sensors, serve them over HTTP and relay them into a store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML configuration file
    #[arg(short, long, env = "PI_EVERYWHERE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP surface (default)
    Serve(ServeArgs),

    /// Read one analog channel and exit
    Read(ReadArgs),

    /// Sample analog channels periodically and forward them upstream
    Relay(RelayArgs),

    /// Register this board's address with the upstream server
    Announce(AnnounceArgs),

    /// Handle one serverless event read from a file or stdin
    Event(EventArgs),

    /// Show configuration and compiled features
    Info,
}

#[derive(Args)]
struct ServeArgs {
    /// Which facade answers requests
    #[arg(short, long, value_enum, default_value_t = FacadeKind::Hardware)]
    role: FacadeKind,

    /// Web server port (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Args)]
struct ReadArgs {
    /// Analog channel to read
    #[arg(short, long)]
    channel: u8,

    /// Which facade to read through
    #[arg(short, long, value_enum, default_value_t = FacadeKind::Hardware)]
    role: FacadeKind,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,
}

#[derive(Args)]
struct RelayArgs {
    /// Sample once and exit
    #[arg(long)]
    once: bool,
}

#[derive(Args)]
struct AnnounceArgs {
    /// Address peers should use to reach this board
    #[arg(long)]
    ip: String,

    /// Port this board serves on
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args)]
struct EventArgs {
    /// Event JSON file; stdin when omitted
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = RelayConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(config, args).await?,
        Some(Commands::Read(args)) => read_command(&config, args).await?,
        Some(Commands::Relay(args)) => relay_command(&config, args).await?,
        Some(Commands::Announce(args)) => announce_command(&config, args).await?,
        Some(Commands::Event(args)) => event_command(&config, args).await?,
        Some(Commands::Info) => info_command(&config),
        None => {
            // Default to serve command
            let serve_args = ServeArgs {
                role: FacadeKind::Hardware,
                port: None,
                no_cors: false,
            };
            serve_command(config, &serve_args).await?;
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// State for the store role: one backend shared by the facade and the token registry.
async fn store_state(config: &RelayConfig) -> anyhow::Result<AppState> {
    let backend = open_backend(&config.store)
        .await
        .context("Failed to open store")?;
    let facade = StoreFacade::new(
        backend.clone(),
        config.hardware.channels.clone(),
        config.store.lookback(),
    );
    let registry = DeviceTokenRegistry::new(backend);
    Ok(AppState::new(Arc::new(facade)).with_registry(Arc::new(registry)))
}

async fn state_for(role: FacadeKind, config: &RelayConfig) -> anyhow::Result<AppState> {
    match role {
        FacadeKind::Store => store_state(config).await,
        other => {
            let facade = build_facade(other, config)
                .await
                .with_context(|| format!("Failed to build {} facade", other))?;
            Ok(AppState::new(facade))
        }
    }
}

fn upstream(config: &RelayConfig) -> anyhow::Result<RemoteFacade> {
    let Some(base_url) = config.upstream.base_url.as_deref() else {
        bail!("No upstream configured: set upstream.base_url or API_GATEWAY_URL");
    };
    Ok(RemoteFacade::new(base_url, config.upstream.timeout())?)
}

async fn serve_command(config: RelayConfig, args: &ServeArgs) -> anyhow::Result<()> {
    info!("Starting pi_everywhere as {}", args.role);

    let mut web_config = config.web.clone().with_cors(!args.no_cors);
    if let Some(port) = args.port {
        web_config = web_config.with_port(port);
    }

    let state = state_for(args.role, &config).await?;

    info!("Web server configuration:");
    info!("  - Bind address: {}", web_config.bind_address());
    info!("  - CORS enabled: {}", web_config.enable_cors);
    info!("  - Body limit: {} bytes", web_config.body_limit);

    start_web_server(web_config, state).await?;
    Ok(())
}

async fn read_command(config: &RelayConfig, args: &ReadArgs) -> anyhow::Result<()> {
    let facade = build_facade(args.role, config).await?;
    let reading = facade.get_analog_reading(args.channel).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reading)?),
        OutputFormat::Pretty => {
            let name = facade
                .channels()
                .and_then(|map| map.analog_input(args.channel).ok())
                .map(|input| input.name.clone())
                .unwrap_or_else(|| format!("channel {}", args.channel));
            println!(
                "{}: {:.2} at {}",
                name,
                reading.value,
                time::format_timestamp(&reading.upload_date)
            );
        }
    }

    Ok(())
}

async fn relay_command(config: &RelayConfig, args: &RelayArgs) -> anyhow::Result<()> {
    let upstream: Arc<dyn DeviceFacade> = Arc::new(upstream(config)?);
    let hardware = build_facade(FacadeKind::Hardware, config).await?;

    let poller = ReadingPoller::new(hardware, config.poll.channels.clone(), config.poll.interval());
    info!(
        "Relaying channels {:?} every {}s",
        config.poll.channels, config.poll.interval_secs
    );

    if args.once {
        let readings = poller.sample().await;
        let stats = relay(stream::iter(readings).boxed(), upstream).await;
        println!("Forwarded {} readings, {} failed", stats.forwarded, stats.failed);
        return Ok(());
    }

    tokio::select! {
        stats = relay(poller.stream(), upstream) => {
            info!("Relay stream ended after {} readings", stats.forwarded);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }
    Ok(())
}

async fn announce_command(config: &RelayConfig, args: &AnnounceArgs) -> anyhow::Result<()> {
    let port = args.port.unwrap_or(config.web.port);
    let registered = upstream(config)?
        .post_host(Host::new(args.ip.clone(), port))
        .await
        .context("Failed to register host")?;

    match registered.last_seen {
        Some(at) => println!(
            "Registered {}:{} at {}",
            registered.ip_address,
            registered.port,
            time::format_timestamp(&at)
        ),
        None => println!("Registered {}:{}", registered.ip_address, registered.port),
    }
    Ok(())
}

async fn event_command(config: &RelayConfig, args: &EventArgs) -> anyhow::Result<()> {
    let payload = match &args.file {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    let state = store_state(config).await?;
    let router = create_app(state, &config.web);
    let dispatcher = Dispatcher::for_events(router, config.auth.token.clone());

    let output = dispatcher.dispatch(&payload).await?;
    println!("{}", String::from_utf8_lossy(&output));
    Ok(())
}

fn info_command(config: &RelayConfig) {
    println!("pi_everywhere {}", env!("CARGO_PKG_VERSION"));
    println!("================================");
    println!();

    println!("Web:");
    println!("  Bind address: {}", config.web.bind_address());
    println!("  CORS enabled: {}", config.web.enable_cors);
    println!();

    println!("Store:");
    println!("  Backend: {:?}", config.store.backend);
    println!("  Table: {}", config.store.table);
    println!("  Log file: {}", config.store.log_path().display());
    println!("  Lookback: {:?}", config.store.lookback());
    println!();

    println!("Upstream:");
    match &config.upstream.base_url {
        Some(url) => println!("  URL: {} (timeout {}s)", url, config.upstream.timeout_secs),
        None => println!("  URL: not configured"),
    }
    println!();

    print_channels(&config.hardware.channels);
    println!(
        "  Poll: channels {:?} every {}s",
        config.poll.channels, config.poll.interval_secs
    );
    println!();

    println!(
        "Authorizer token: {}",
        if config.auth.token.is_some() { "set" } else { "not set" }
    );
    println!();

    println!("Features compiled:");
    #[cfg(feature = "gpio")]
    println!("  - GPIO/SPI support: ✓");
    #[cfg(not(feature = "gpio"))]
    println!("  - GPIO/SPI support: ✗ (simulated drivers)");
}

fn print_channels(channels: &ChannelMap) {
    println!("Hardware channels:");
    for input in &channels.analog_inputs {
        println!(
            "  Analog {}: {} ({:?}, {:.1} V ref)",
            input.channel, input.name, input.calibration, input.reference_voltage
        );
    }
    for output in &channels.digital_outputs {
        println!("  Digital {}: {}", output.channel, output.name);
    }
    if let Some(led) = channels.led {
        println!("  LED on {}", led);
    }
    if let Some(light) = channels.light_sensor {
        println!("  Light sensor on analog {}", light);
    }
}
