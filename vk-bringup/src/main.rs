use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error, info};
use vk_bringup::{init_logging, BringupConfig, GraphicsContext};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

const CONFIG_ENV_VAR: &str = "VK_BRINGUP_CONFIG";

struct App {
    config: BringupConfig,
    // Declared before the window so it is dropped first.
    context: Option<GraphicsContext>,
    window: Option<Arc<Window>>,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: BringupConfig) -> Self {
        Self { config, context: None, window: None, failure: None }
    }

    fn bring_up(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attributes = Window::default_attributes()
            .with_title(self.config.window.title.as_str())
            .with_inner_size(LogicalSize::new(self.config.window.width, self.config.window.height))
            .with_resizable(self.config.window.resizable);
        let window = Arc::new(event_loop.create_window(attributes).context("failed to create window")?);

        let context = GraphicsContext::new(&self.config, Arc::clone(&window)).context("Vulkan bring-up failed")?;
        let assignment = context.queue_assignment();
        let swapchain = context.swapchain_config();
        info!(
            "Running on {}: graphics family {}, present family {} ({:?}); {} swapchain images at {}x{}, {:?}",
            context.physical_device().name,
            assignment.graphics_family,
            assignment.present_family,
            assignment.kind,
            context.swapchain().images().len(),
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.present_mode
        );

        self.context = Some(context);
        self.window = Some(window);
        Ok(())
    }

    fn shut_down(&mut self, event_loop: &ActiveEventLoop) {
        self.context.take();
        self.window.take();
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.failure.is_some() {
            return;
        }
        if let Err(err) = self.bring_up(event_loop) {
            self.failure = Some(err);
            self.shut_down(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down.");
                self.shut_down(event_loop);
            }
            WindowEvent::Resized(size) if size.width == 0 || size.height == 0 => {
                debug!("Window minimized, keeping the current swapchain.");
            }
            WindowEvent::Resized(size) => {
                let Some(context) = self.context.as_mut() else {
                    return;
                };
                debug!("Window resized to {}x{}", size.width, size.height);
                if let Err(err) = context.recreate_swapchain() {
                    self.failure = Some(anyhow::Error::new(err).context("swapchain recreation failed"));
                    self.shut_down(event_loop);
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.context.take();
        self.window.take();
    }
}

fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

fn run() -> anyhow::Result<()> {
    let config = BringupConfig::load_or_default(config_path()).context("failed to load configuration")?;
    init_logging(&config.logging);

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("event loop terminated abnormally")?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:?}", err);
            ExitCode::FAILURE
        }
    }
}
