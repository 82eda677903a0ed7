//! Live hand landmark tracking on webcam video.
//!
//! The [`app`] module contains the capture → track → draw → display loop. Everything it needs is
//! implemented in the remaining modules: V4L2 capture in [`video`], ONNX inference in [`nn`], palm
//! detection and landmark tracking in [`hand`], and a minimal window system in [`gui`].
//!
//! # Environment Variables
//!
//! Runtime configuration is read from the environment (see [`config::Settings::from_env`]):
//!
//! * `HANDCAM_CAMERA`: index of the V4L2 device to open (`/dev/video{N}`), default `0`.
//! * `HANDCAM_FPS`: minimum capture frame rate, default `30`.
//! * `HANDCAM_MODEL_DIR`: directory containing the ONNX networks.
//! * `HANDCAM_MODEL_COMPLEXITY`: `0` (lite networks, default) or `1` (full networks).
//! * `HANDCAM_MAX_HANDS`: maximum number of hands to track at once, default `2`.
//! * `HANDCAM_MIN_DETECTION_CONFIDENCE`: palm detection threshold, default `0.5`.
//! * `HANDCAM_MIN_TRACKING_CONFIDENCE`: hand presence threshold, default `0.5`.
//! * `HANDCAM_MIRROR`: whether to mirror the displayed image (`1`/`0`), default `1`.
//!
//! Some lower-level components can also be overridden:
//!
//! * `HANDCAM_JPEG_BACKEND`: Configures the JPEG image decoder to use. Allowed values are:
//!   * `mozjpeg` (the default): uses the [mozjpeg] library to decode JPEG images.
//!   * `zune-jpeg`: uses the pure-Rust [zune-jpeg] crate.
//!   * `jpeg-decoder`: uses the [jpeg-decoder] crate.
//! * `HANDCAM_WEBCAM_NAME`: Forces the [`Webcam`] device to open by name, overriding the camera
//!   index.
//!
//! Log output is controlled with `RUST_LOG`, using [`env_logger`] syntax.
//!
//! [mozjpeg]: https://github.com/mozilla/mozjpeg
//! [zune-jpeg]: https://github.com/etemesi254/zune-jpeg
//! [jpeg-decoder]: https://github.com/image-rs/jpeg-decoder/
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod app;
pub mod config;
pub mod detection;
pub mod filter;
pub mod gui;
pub mod hand;
pub mod image;
pub mod iter;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod termination;
pub mod timer;
pub mod video;

pub use handcam_macros::main;

#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let mut builder = env_logger::Builder::new();
    for module in [calling_crate, env!("CARGO_PKG_NAME")] {
        builder.filter_module(module, LevelFilter::Debug);
    }
    // GPU backends are chatty at info level.
    for module in ["wgpu", "naga"] {
        builder.filter_module(module, LevelFilter::Warn);
    }
    // An already installed logger stays in place.
    builder.parse_default_env().try_init().ok();
}

/// Logs to stderr at debug level for the calling crate and `handcam`, and at warn level for the
/// GPU stack. `RUST_LOG` takes precedence.
///
/// Does nothing when a logger is already installed.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}

#[doc(hidden)]
pub fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: termination::Termination + Send,
{
    gui::run(cb)
}
