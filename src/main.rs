use anyhow::Result;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::Path;
use std::time::Instant;

use voxkraft::{
    config::EngineConfig,
    player::Player,
    render::NullBackend,
    world::{Screen, TickContext, World},
};

const CONFIG_PATH: &str = "voxkraft.toml";
const SAVE_PATH: &str = "world.dat";

/// Headless driver: builds (or restores) a world, drives the chunk
/// pipeline to readiness, and writes the save back out. The interactive
/// frontend plugs a real render backend and input into the same loop.
fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    let config = EngineConfig::load_or_default(Path::new(CONFIG_PATH));
    let mut world = World::new(&config);
    let mut player = Player::default();
    let mut backend = NullBackend::new();

    let save_path = Path::new(SAVE_PATH);
    if save_path.exists() {
        let data = std::fs::read(save_path)?;
        match world.load_save(&data, &mut player) {
            Ok(()) => info!(
                "restored world '{}' (seed {}, tick {})",
                world.name(),
                world.seed(),
                world.tick_count()
            ),
            Err(e) => {
                // A bad save must not corrupt anything: start fresh.
                log::error!("could not load {}: {}", SAVE_PATH, e);
                world = World::new(&config);
                player = Player::default();
            }
        }
    } else {
        info!("new world '{}' with seed {}", world.name(), world.seed());
    }

    let start = Instant::now();
    let mut last_report = Instant::now();
    let mut last_save = Instant::now();
    loop {
        let mut ctx = TickContext {
            screen: Screen::Loading,
            player: &player,
            backend: &mut backend,
        };
        world.tick(&mut ctx);

        if last_report.elapsed().as_secs() >= 1 {
            let (done, queued) = world.progress();
            info!("chunk pipeline: {} ready, {} queued", done, queued);
            last_report = Instant::now();
        }
        if last_save.elapsed().as_secs_f32() >= config.save_interval_secs {
            std::fs::write(save_path, world.get_save_data(&player))?;
            last_save = Instant::now();
        }
        if world.is_idle() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
    let (done, _) = world.progress();
    info!(
        "world ready: {} chunks meshed in {:.2}s",
        done,
        start.elapsed().as_secs_f32()
    );

    let data = world.get_save_data(&player);
    std::fs::write(save_path, &data)?;
    info!("saved {} bytes to {}", data.len(), SAVE_PATH);
    Ok(())
}
