use crate::{config::*, renderer::Renderer};

use anyhow::Error;
use log::*;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    window::{Window, WindowId},
};

/// The window and the renderer drawing into it. The renderer is
/// declared first: it has to be dropped while its surface's window
/// still exists.
#[derive(Default)]
pub struct App {
    renderer: Option<Renderer>,
    window: Option<Window>,
    error: Option<Error>,
}

impl App {
    /// The error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    fn destroy(&mut self) {
        // Waits for the device, then unwinds the teardown stack.
        self.renderer = None;
        if self.window.take().is_some() {
            info!("Window closed.");
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Error) {
        error!("{:#}", error);
        self.destroy();
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        // The swapchain is never recreated, so the window can't be
        // resized.
        let attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
            .with_resizable(false);

        let window = match event_loop.create_window(attributes) {
            Ok(window) => window,
            Err(e) => return self.fail(event_loop, e.into()),
        };

        match unsafe { Renderer::create(&window) } {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, e.context("Failed to initialize the renderer")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.destroy();
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                if let Err(e) = renderer.render() {
                    self.fail(event_loop, e);
                }
            }
            WindowEvent::Resized(size) => {
                debug!("Ignoring resize to {}x{}.", size.width, size.height);
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
