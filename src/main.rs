// main.rs: lariza, a single-instance URI dispatcher
//
// The first instance listens on the cooperation FIFO and prints every URI it
// is asked to open on stdout, one per line (`<uri>` or `<uri> 0x<xid>` when
// embedding into tabbed). Later instances hand their URIs to it and exit.
//
//   lariza | while read -r uri xid; do surf ${xid:+-e $xid} "$uri" & done

use std::io::Write;

use anyhow::Context;
use calloop::EventLoop;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lariza::{
    config::{Cli, Config},
    coop::Coordinator,
    shell::{EmbedRefused, Frontend, Shell, ShellEvent},
    tabbed::{TabbedCommand, Xid},
};

// ── frontend ──────────────────────────────────────────────────────────────────

struct StdoutFrontend;

impl Frontend for StdoutFrontend {
    fn open_window(&mut self, uri: &str, embed: Option<Xid>) -> Result<(), EmbedRefused> {
        let mut out = std::io::stdout().lock();
        let written = match embed {
            Some(xid) => writeln!(out, "{uri} {xid:#x}"),
            None => writeln!(out, "{uri}"),
        };
        if let Err(e) = written.and_then(|()| out.flush()) {
            tracing::warn!("Could not write {uri} to stdout: {e}");
        }
        Ok(())
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let cli = Cli::parse();

    let coordinator = if cli.cooperative() {
        Coordinator::setup(&config.coop_settings())
    } else {
        Coordinator::disabled()
    };
    let mut shell = Shell::new(config, coordinator, StdoutFrontend);

    if !shell.coordinator().is_alone() {
        shell.open_initial(&cli.uris);
        return Ok(());
    }

    let embed = if cli.tabbed_automagic() {
        TabbedCommand::for_app(&shell.config().app_name).launch_or_skip()
    } else {
        cli.embed
    };
    shell.set_embed(embed);

    let Some(source) = shell.coordinator_mut().take_source() else {
        // Standalone: nothing can reach us after the initial batch.
        shell.open_initial(&cli.uris);
        return Ok(());
    };

    let mut event_loop: EventLoop<'static, Shell<StdoutFrontend>> =
        EventLoop::try_new().context("creating event loop")?;
    let signal = event_loop.get_signal();
    event_loop
        .handle()
        .insert_source(source, move |uri, _, shell| {
            shell.dispatch_or_stop(ShellEvent::Remote(uri), &signal);
        })
        .map_err(|e| anyhow::anyhow!("watching FIFO: {}", e.error))?;

    shell.open_initial(&cli.uris);
    tracing::info!("Listening for remote requests");
    event_loop
        .run(None, &mut shell, |_| {})
        .context("event loop")?;
    Ok(())
}
