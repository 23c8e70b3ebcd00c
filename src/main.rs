//! Aurascope - circular real-time audio spectrum visualizer
//!
//! Angle maps to frequency bin, brightness to amplitude. Each frame pulls a
//! fresh spectrum snapshot from the analyzer, mirrors it into a GPU texture
//! and draws one fullscreen quad through the radial shader.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use aurascope::analyzer::SpectrumAnalyzer;
use aurascope::cli::Args;
use aurascope::params::{AnalyzerConfig, RenderConfig, VisualParams};
use aurascope::rendering::RenderSystem;

/// Main application state
struct App {
    window: Option<Arc<Window>>,
    render_system: Option<RenderSystem>,
    analyzer: Option<SpectrumAnalyzer>,

    /// Latest spectrum snapshot, overwritten in place each frame
    snapshot: Vec<u8>,

    analyzer_config: AnalyzerConfig,
    visual: VisualParams,
    render_config: RenderConfig,
    init_failed: bool,
}

impl App {
    fn new(analyzer_config: AnalyzerConfig, visual: VisualParams) -> Self {
        Self {
            window: None,
            render_system: None,
            analyzer: None,
            snapshot: Vec::new(),
            analyzer_config,
            visual,
            render_config: RenderConfig::default(),
            init_failed: false,
        }
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &winit::event_loop::ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        let window_attributes = Window::default_attributes()
            .with_title("Aurascope")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.render_config.window_width,
                self.render_config.window_height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                eprintln!("Failed to create window: {}", e);
                self.init_failed = true;
                event_loop.exit();
                return;
            }
        };

        // One-time gate: no frame runs until audio access has resolved.
        // A failure here is terminal for the session attempt.
        let analyzer = match SpectrumAnalyzer::initialize(&self.analyzer_config) {
            Ok(analyzer) => analyzer,
            Err(e) => {
                eprintln!("{}", e);
                self.init_failed = true;
                event_loop.exit();
                return;
            }
        };

        let bin_count = analyzer.bin_count() as u32;
        let render_system = match pollster::block_on(RenderSystem::new(
            Arc::clone(&window),
            bin_count,
            &self.visual,
        )) {
            Ok(render_system) => render_system,
            Err(e) => {
                eprintln!("{}", e);
                self.init_failed = true;
                event_loop.exit();
                return;
            }
        };

        println!("\nAurascope is running!");
        println!("Press ESC to quit\n");

        self.snapshot = analyzer.new_snapshot();
        self.window = Some(window);
        self.render_system = Some(render_system);
        self.analyzer = Some(analyzer);
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.render_config.window_width = size.width;
                self.render_config.window_height = size.height;
                if let Some(render_system) = &mut self.render_system {
                    render_system.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.render_frame(event_loop);
            }
            _ => {}
        }
    }
}

impl App {
    /// One frame: refresh snapshot, mirror it into the texture, draw.
    /// The texture update always precedes the draw submission, so the
    /// shading stage reads exactly this frame's snapshot.
    fn render_frame(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        let (Some(render_system), Some(analyzer)) = (&self.render_system, &mut self.analyzer)
        else {
            return;
        };

        // A zero-sized surface has nothing to draw into; skip the frame
        if self.render_config.window_width == 0 || self.render_config.window_height == 0 {
            return;
        }

        analyzer.refresh(&mut self.snapshot);
        render_system.update_spectrum(&self.snapshot);

        match render_system.render() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                render_system.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                eprintln!("Render error: out of GPU memory");
                event_loop.exit();
            }
            Err(e) => eprintln!("Render error: {:?}", e),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let analyzer_config = args.analyzer_config();
    let visual = args.visual_params();
    for result in [analyzer_config.validate(), visual.validate()] {
        if let Err(e) = result {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let mut app = App::new(analyzer_config, visual);
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            eprintln!("Failed to create event loop: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = event_loop.run_app(&mut app) {
        eprintln!("Event loop error: {}", e);
        return ExitCode::FAILURE;
    }

    if app.init_failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
