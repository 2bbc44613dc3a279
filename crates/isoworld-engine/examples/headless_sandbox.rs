//! Scripted sandbox session without a window.
//!
//! Run with:
//!   cargo run --example headless_sandbox -p isoworld-engine
//!
//! Builds a small tower through simulated clicks, renders a few frames onto
//! a recording surface, then walks the history back and forth.

use isoworld_engine::prelude::*;

fn main() -> anyhow::Result<()> {
    isoworld_engine::init_tracing("info");

    let surface = RecordingSurface::shared(1280, 720);
    let mut sandbox = Sandbox::new(AppConfig::default(), surface.clone())?;
    sandbox.start()?;

    let palette = [BlockType::Stone, BlockType::Brick, BlockType::Glass, BlockType::Crystal];
    for block_type in palette {
        sandbox.state().set_block_type(block_type);
        sandbox.pointer_move(8.5, 8.5);
        sandbox.click(MouseButton::Left);
    }
    sandbox.world().spawn_entity(
        "wisp",
        6.0,
        7.0,
        1.0,
        EntityProperties {
            glow: Some(Color::rgb(0x80, 0xc0, 0xff)),
            ..EntityProperties::default()
        },
    );

    let frames = sandbox.run_frames(120, 1.0 / 60.0);
    let stats = sandbox.renderer().last_stats();
    tracing::info!(
        frames,
        blocks = stats.blocks,
        entities = stats.entities,
        ops = surface.borrow().ops().len(),
        top = ?sandbox.world().get_highest_occupied_layer(8, 8),
        "tower built"
    );

    while sandbox.state().undo() {}
    tracing::info!(top = ?sandbox.world().get_highest_occupied_layer(8, 8), "history rewound");
    while sandbox.state().redo() {}
    tracing::info!(
        top = ?sandbox.world().get_highest_occupied_layer(8, 8),
        history = sandbox.state().history_len(),
        "history replayed"
    );

    sandbox.shutdown();
    Ok(())
}
