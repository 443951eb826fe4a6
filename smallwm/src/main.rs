mod input;
mod state;

use std::time::Duration;

use calloop::{channel, EventLoop};
use clap::Parser;
use mpxwm::{
    input::{grab_flat_bindings, InputConfig},
    producer::{insert_producer_source, PollStatus, Poller, SyntheticEvent},
    rules::{run_idle_cycle, Context, EventKind},
};
use tracing::{info, warn};

pub use state::Smallwm;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of master devices to manage
    #[arg(short, long, default_value_t = 1)]
    masters: u32,
    /// Interval of the periodic tick, in milliseconds
    #[arg(long, default_value_t = 1000)]
    tick: u64,
    /// Drop auto-repeated key presses before any binding sees them
    #[arg(long)]
    ignore_key_repeat: bool,
    /// Replay a scripted session instead of waiting for input
    #[arg(long)]
    demo: bool,
}

fn init_logging() {
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt().compact().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().compact().init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    let mut event_loop: EventLoop<Smallwm> = EventLoop::try_new()?;
    let mut state = Smallwm::new(event_loop.get_signal(), cli.masters);

    let config = InputConfig {
        ignore_key_repeat: cli.ignore_key_repeat,
        ..Default::default()
    };
    state.install(config);
    let failed = grab_flat_bindings(&mut state);
    if failed > 0 {
        warn!(failed, "some bindings could not be grabbed");
    }

    let (sender, receiver) = channel::channel();
    insert_producer_source(&event_loop.handle(), receiver)?;

    let ticker = Poller::spawn("periodic", Duration::from_millis(cli.tick), sender.clone(), |events| {
        events.push(SyntheticEvent::Rules {
            kind: EventKind::Periodic,
            context: Context::none(),
        });
        PollStatus::Continue
    })?;

    let demo = if cli.demo {
        let mut script = input::demo_script(state.active_master_id()).into_iter();
        Some(Poller::spawn("demo", Duration::from_millis(200), sender, move |events| {
            match script.next() {
                Some(event) => {
                    events.push(SyntheticEvent::Input(event));
                    PollStatus::Continue
                }
                None => PollStatus::Stop,
            }
        })?)
    } else {
        drop(sender);
        None
    };

    info!("smallwm is running");
    event_loop.run(None, &mut state, |state| {
        run_idle_cycle(state);
    })?;

    ticker.stop();
    if let Some(demo) = demo {
        demo.stop();
    }
    info!(moves = state.moves, retiles = state.retiles, "smallwm exited");

    Ok(())
}
