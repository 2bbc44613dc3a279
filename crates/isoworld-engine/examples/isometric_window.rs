//! Interactive isometric sandbox.
//!
//! Run with:
//!   cargo run --example isometric_window --features renderer -p isoworld-engine [config.json]
//!
//! Controls:
//!   Left click -- place (or select / delete, depending on the tool)
//!   Right click -- delete the topmost block
//!   1 / 2 / 3 -- select / place / delete tool
//!   Z / Y -- undo / redo
//!   Arrows or WASD -- pan, mouse wheel -- zoom
//!   G / B -- toggle grid / chunk borders

use isoworld_engine::prelude::*;
use isoworld_engine::render::run_windowed;

fn main() -> anyhow::Result<()> {
    isoworld_engine::init_tracing("info,wgpu_core=warn,wgpu_hal=warn");

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    run_windowed(
        config,
        "isoworld sandbox",
        Some(Box::new(|sandbox: &mut Sandbox| {
            for i in 0..4 {
                sandbox.world().spawn_entity(
                    "firefly",
                    4.0 + f64::from(i),
                    4.0,
                    1.0,
                    EntityProperties {
                        glow: Some(Color::rgb(0xff, 0xe0, 0x60)),
                        size: 0.3,
                        ..EntityProperties::default()
                    },
                );
            }
        })),
    )
}
