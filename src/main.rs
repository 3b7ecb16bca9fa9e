//! Kinetic Plinko entry point
//!
//! The browser build is driven from JavaScript through `kinetic_plinko::web`.
//! Natively this runs a headless session on a simulated clock, which is handy
//! for balancing the economy and for soak-testing saves.

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::path::PathBuf;

    use anyhow::{Context, Result};
    use clap::Parser;

    use kinetic_plinko::audio::NullAudio;
    use kinetic_plinko::format::format_number;
    use kinetic_plinko::persistence::{FileStorage, MemoryStorage, Storage};
    use kinetic_plinko::{Engine, EngineEvent, UpgradeId, platform};

    #[derive(Parser, Debug)]
    #[command(about = "Run a headless Kinetic Plinko session", version)]
    pub struct Args {
        /// Simulated seconds to run
        #[arg(long, default_value_t = 300)]
        seconds: u32,
        /// Frames per simulated second
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// RNG seed (defaults to the clock)
        #[arg(long)]
        seed: Option<u64>,
        /// Directory for the save file; omit for an in-memory session
        #[arg(long)]
        save_dir: Option<PathBuf>,
        /// Buy the cheapest affordable upgrade every second
        #[arg(long)]
        autobuy: bool,
        /// Prestige as soon as the run is eligible
        #[arg(long)]
        prestige: bool,
        #[arg(long, default_value_t = 400.0)]
        width: f32,
        #[arg(long, default_value_t = 600.0)]
        height: f32,
    }

    /// Cheapest upgrade the engine will sell right now
    fn buy_cheapest(engine: &mut Engine) -> bool {
        let mut offers: Vec<(f64, UpgradeId)> = UpgradeId::ALL
            .into_iter()
            .filter_map(|id| engine.upgrade_cost(id.as_str()).map(|cost| (cost, id)))
            .filter(|(cost, _)| *cost <= engine.state().money)
            .collect();
        offers.sort_by(|a, b| a.0.total_cmp(&b.0));
        offers
            .into_iter()
            .any(|(_, id)| engine.buy_upgrade(id.as_str()).is_ok())
    }

    pub fn run() -> Result<()> {
        let args = Args::parse();
        anyhow::ensure!(args.fps > 0, "--fps must be positive");

        let storage: Box<dyn Storage> = match &args.save_dir {
            Some(dir) => Box::new(
                FileStorage::new(dir)
                    .with_context(|| format!("opening save directory {}", dir.display()))?,
            ),
            None => Box::new(MemoryStorage::new()),
        };
        let seed = args.seed.unwrap_or_else(platform::time_seed);
        log::info!("Seed {seed}");

        let mut engine = Engine::new(storage, Box::new(NullAudio), seed);
        engine.attach_board(args.width, args.height);

        let mut now = platform::now_ms();
        engine.start(now);
        if let Some(amount) = engine.take_offline_earnings() {
            log::info!("Welcome back: ${} earned offline", format_number(amount));
        }

        let dt = 1.0 / args.fps as f32;
        let frame_ms = 1000.0 / f64::from(args.fps);
        for second in 1..=args.seconds {
            for _ in 0..args.fps {
                now += frame_ms;
                engine.frame(dt, now);
            }
            engine.second_tick(now);
            engine.drain_popups();

            for event in engine.drain_events() {
                match event {
                    EngineEvent::TutorialRequested => engine.unpause_bonus_marble(),
                    EngineEvent::BonusSpawned => {
                        let pos = engine.world().bonus.pos;
                        let reward = engine.click_bonus_marble(pos.x, pos.y);
                        log::debug!("Caught bonus marble for ${}", format_number(reward));
                    }
                    other => log::debug!("{other:?}"),
                }
            }

            if args.autobuy {
                while buy_cheapest(&mut engine) {}
            }
            if args.prestige {
                if let Some(rewards) = engine.prestige() {
                    log::info!("Prestiged for {} shards", rewards.shards);
                }
            }

            if second % 10 == 0 {
                let state = engine.state();
                log::info!(
                    "t={second}s money=${} mps=${} population={} shards={}",
                    format_number(state.money),
                    format_number(state.current_mps),
                    state.population(),
                    state.kinetic_shards
                );
            }
        }

        let state = engine.state();
        println!(
            "After {}s: ${} banked, ${} lifetime, peak ${}/s, {} balls, prestiged {}x",
            args.seconds,
            format_number(state.money),
            format_number(state.lifetime_earnings),
            format_number(state.peak_mps),
            state.population(),
            state.times_prestiged
        );
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    headless::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is kinetic_plinko::web::init, this is just to satisfy the compiler
}
