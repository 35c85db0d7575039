use crate::console::{self, InputEnd, PromptSlot};
use anyhow::Context;
use clap::Args;
use harness_core::config::{HarnessConfig, WarnLevel};
use harness_core::controls::check_send_delay;
use harness_core::sampler::JsonSchemaSampler;
use harness_core::{runtime, ChannelPresentation, ChannelTransport, Dispatcher};
use harness_server::state::AppState;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(long)]
    pub port: Option<u16>,

    /// Answer forced actions automatically with a random candidate
    #[arg(long)]
    pub auto_send: bool,

    /// Drop forced actions without executing anything
    #[arg(long)]
    pub ignore_forced: bool,

    /// Send operator payloads without checking them against the schema
    #[arg(long)]
    pub no_validate: bool,

    /// Delay before each outgoing command reaches the game (0-10000 ms)
    #[arg(long, allow_negative_numbers = true)]
    pub delay_ms: Option<i64>,

    /// Seed for forced-action selection and sample generation
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ServeArgs {
    /// Layer the flags over the file configuration.
    pub fn apply(&self, config: &mut HarnessConfig) -> anyhow::Result<()> {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.auto_send {
            config.controls.auto_send = true;
        }
        if self.ignore_forced {
            config.controls.ignore_forced_actions = true;
        }
        if self.no_validate {
            config.controls.validate_schema = false;
        }
        if let Some(ms) = self.delay_ms {
            config.controls.send_delay_ms = check_send_delay(ms).context("invalid --delay-ms")?;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(())
    }
}

pub fn run(mut config: HarnessConfig, args: ServeArgs) -> anyhow::Result<()> {
    args.apply(&mut config)?;

    let mut has_errors = false;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => {
                eprintln!("[error] {}", w.message);
                has_errors = true;
            }
        }
    }
    if has_errors {
        anyhow::bail!("refusing to start with an invalid configuration");
    }

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(serve(config));
    // stdin is read on a blocking thread that never finishes on its own.
    rt.shutdown_background();
    result
}

async fn serve(config: HarnessConfig) -> anyhow::Result<()> {
    let (presentation, events) = ChannelPresentation::channel();
    let (transport, outbound) = ChannelTransport::channel();
    let sampler = match config.seed {
        Some(seed) => JsonSchemaSampler::seeded(seed),
        None => JsonSchemaSampler::new(),
    };
    let mut dispatcher = Dispatcher::new(
        config.controls.clone(),
        Box::new(presentation),
        Box::new(transport),
        Box::new(sampler),
    );
    if let Some(seed) = config.seed {
        dispatcher = dispatcher.with_seed(seed);
    }
    let (handle, _dispatch_task) = runtime::spawn(dispatcher);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    println!(
        "Waiting for a game on ws://{} (type `help` for commands)",
        listener.local_addr()?
    );

    let prompt = PromptSlot::default();
    tokio::spawn(console::render_events(events, prompt.clone()));

    let state = AppState::new(handle.clone(), outbound);
    let mut server = tokio::spawn(harness_server::serve_on(state, listener));

    tokio::select! {
        end = console::run_input(handle, prompt) => {
            if end? == InputEnd::Eof {
                tracing::info!("stdin closed; serving until interrupted");
                wait_for_exit(&mut server).await?;
            }
        }
        result = &mut server => {
            result.context("server task failed")??;
        }
        _ = tokio::signal::ctrl_c() => {}
    }

    server.abort();
    Ok(())
}

async fn wait_for_exit(
    server: &mut tokio::task::JoinHandle<anyhow::Result<()>>,
) -> anyhow::Result<()> {
    tokio::select! {
        result = server => result.context("server task failed")?,
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}
