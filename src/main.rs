mod app;
mod config;
mod core;
mod error;
mod renderer;

use winit::event_loop::{ControlFlow, EventLoop};
use anyhow::Result;
use log::*;

use app::App;

fn main() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    // Render continuously instead of waiting for window events.
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::default();
    event_loop.run_app(&mut app)?;

    match app.take_error() {
        Some(error) => Err(error),
        None => {
            info!("Exited cleanly.");
            Ok(())
        }
    }
}
