//! A minimal window system for showing frames and reading key presses.
//!
//! winit requires its event loop to run on the main thread, so [`run`] takes over the main thread
//! and runs the application code on a spawned thread. The functions in this module send requests
//! to the event loop and receive [`Input`] events from it.

mod renderer;

use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Mutex, PoisonError,
    },
    time::Duration,
};

use anyhow::anyhow;
use once_cell::sync::OnceCell;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::WindowId,
};

use crate::{
    app::Viewer,
    image::{Image, Resolution},
    termination::Termination,
};

use self::renderer::{Gpu, Renderer, Window};

/// A user input event received by one of the windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A character was typed while a window had focus.
    Char(char),
    /// The user asked to close a window.
    CloseRequested,
}

impl Input {
    /// Returns whether this input asks the application to quit (`q`, `Q`, or closing a window).
    pub fn is_quit(&self) -> bool {
        matches!(self, Input::Char('q' | 'Q') | Input::CloseRequested)
    }
}

struct Gui {
    gpu: Rc<Gpu>,
    windows: HashMap<String, Renderer>,
    win_id_to_key: HashMap<WindowId, String>,
    input: Sender<Input>,
}

impl Gui {
    fn new(input: Sender<Input>) -> anyhow::Result<Self> {
        Ok(Self {
            gpu: Rc::new(pollster::block_on(Gpu::open())?),
            windows: HashMap::new(),
            win_id_to_key: HashMap::new(),
            input,
        })
    }

    fn get_renderer_mut(&mut self, win: WindowId) -> Option<&mut Renderer> {
        let key = self.win_id_to_key.get(&win)?;
        self.windows.get_mut(key)
    }

    fn show(
        &mut self,
        target: &EventLoopWindowTarget<Msg>,
        key: String,
        res: Resolution,
        data: &[u8],
    ) -> anyhow::Result<()> {
        if let Some(renderer) = self.windows.get(&key) {
            if renderer.resolution() != res {
                log::debug!("image '{key}' changed resolution to {res}, reopening window");
                self.close(&key);
            }
        }

        if !self.windows.contains_key(&key) {
            log::debug!("creating window for image '{key}' at {res}");
            let win = Window::open(target, &key, res)?;
            let win_id = win.win.id();
            let renderer = Renderer::new(win, self.gpu.clone())?;
            self.win_id_to_key.insert(win_id, key.clone());
            self.windows.insert(key.clone(), renderer);
        }

        if let Some(renderer) = self.windows.get_mut(&key) {
            renderer.update_texture(res, data);
            renderer.window().request_redraw();
        }
        Ok(())
    }

    fn close(&mut self, key: &str) {
        if let Some(renderer) = self.windows.remove(key) {
            self.win_id_to_key.remove(&renderer.window().id());
        }
    }

    fn send_input(&self, input: Input) {
        // Nobody might be listening anymore while the process is exiting.
        self.input.send(input).ok();
    }

    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::Image { key, res, data }) => {
                    if let Err(e) = self.show(target, key, res, &data) {
                        log::error!("failed to display image: {e:#}");
                        process::exit(1);
                    }
                }
                Event::UserEvent(Msg::DestroyAll) => {
                    log::debug!("destroying {} window(s)", self.windows.len());
                    self.windows.clear();
                    self.win_id_to_key.clear();
                }
                Event::WindowEvent { window_id, event } => match event {
                    WindowEvent::ReceivedCharacter(c) => self.send_input(Input::Char(c)),
                    WindowEvent::CloseRequested => {
                        if let Some(key) = self.win_id_to_key.get(&window_id) {
                            log::debug!("close requested for window '{key}'");
                        }
                        self.send_input(Input::CloseRequested);
                    }
                    _ => {}
                },
                Event::RedrawRequested(window) => {
                    if let Some(renderer) = self.get_renderer_mut(window) {
                        if let Err(e) = renderer.redraw() {
                            log::error!("failed to redraw window: {e:#}");
                        }
                    }
                }
                _ => {}
            }
        });
    }
}

#[derive(Debug)]
enum Msg {
    Image {
        key: String,
        res: Resolution,
        data: Vec<u8>,
    },
    DestroyAll,
}

/// Application-side connection to the event loop.
struct Display {
    proxy: Mutex<EventLoopProxy<Msg>>,
    input: Mutex<Receiver<Input>>,
}

impl Display {
    fn get() -> anyhow::Result<&'static Display> {
        DISPLAY.get().ok_or_else(|| {
            anyhow!("GUI not initialized (is `main` annotated with `#[handcam::main]`?)")
        })
    }

    fn send(&self, msg: Msg) -> anyhow::Result<()> {
        self.proxy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send_event(msg)
            .map_err(|_closed| anyhow!("GUI event loop has exited"))
    }
}

static DISPLAY: OnceCell<Display> = OnceCell::new();

pub(crate) fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    let (input_tx, input_rx) = mpsc::channel();
    let display = Display {
        proxy: Mutex::new(event_loop.create_proxy()),
        input: Mutex::new(input_rx),
    };
    if DISPLAY.set(display).is_err() {
        log::error!("GUI initialized twice");
        process::exit(1);
    }

    let gui = match Gui::new(input_tx) {
        Ok(gui) => gui,
        Err(e) => {
            log::error!("failed to initialize GUI: {e:#}");
            process::exit(1);
        }
    };

    // Everything the application needs is set up; hand it its own thread.
    std::thread::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(cb));
        match result {
            Ok(r) => {
                if r.is_success() {
                    process::exit(0);
                } else {
                    r.report(); // prints the error message
                    process::exit(1);
                }
            }
            Err(_payload) => {
                // The panic hook has already printed the message; exit like libstd would.
                process::exit(101);
            }
        }
    });

    gui.run(event_loop);
}

/// Displays an image in the window identified by `key`, opening it if necessary.
///
/// `key` is also used as the window title.
pub fn show_image(key: impl Into<String>, image: &Image) -> anyhow::Result<()> {
    // Images are RGBA8 internally, so no conversion before the GPU upload is needed.
    let data = image.data().to_vec();

    Display::get()?.send(Msg::Image {
        key: key.into(),
        res: image.resolution(),
        data,
    })
}

/// Waits up to `timeout` for a key press or window close request.
///
/// Returns `None` if nothing happened in time.
pub fn wait_key(timeout: Duration) -> anyhow::Result<Option<Input>> {
    let input = Display::get()?
        .input
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .recv_timeout(timeout);
    match input {
        Ok(input) => Ok(Some(input)),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("GUI event loop has exited")),
    }
}

/// Closes every window opened by [`show_image`].
pub fn destroy_all_windows() -> anyhow::Result<()> {
    Display::get()?.send(Msg::DestroyAll)
}

/// A [`Viewer`] that shows frames in a single window.
pub struct GuiViewer {
    title: String,
}

impl GuiViewer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Viewer for GuiViewer {
    fn show(&mut self, image: &Image) -> anyhow::Result<()> {
        show_image(self.title.as_str(), image)
    }

    fn wait_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Input>> {
        wait_key(timeout)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        destroy_all_windows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_inputs() {
        assert!(Input::Char('q').is_quit());
        assert!(Input::Char('Q').is_quit());
        assert!(Input::CloseRequested.is_quit());
        assert!(!Input::Char('w').is_quit());
        assert!(!Input::Char(' ').is_quit());
    }

    #[test]
    fn uninitialized() {
        let image = Image::new(4, 4);
        let err = show_image("test", &image).unwrap_err();
        assert!(err.to_string().contains("#[handcam::main]"));
        assert!(wait_key(Duration::ZERO).is_err());
    }
}
