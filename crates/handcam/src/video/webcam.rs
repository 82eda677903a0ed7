//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::{Image, Resolution};
use crate::num::TotalF32;
use crate::timer::Timer;

/// Indicates whether to prefer a higher resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, selecting the maximum resolution at the
/// desired frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ParamPreference {
    /// Prefer increased resolution over higher frame rates.
    #[default]
    Resolution,
    /// Prefer higher frame rate over higher image resolution.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Device selection and format negotiation options.
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    index: Option<u32>,
    name: Option<String>,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Selects the device at `/dev/video{index}`.
    #[inline]
    pub fn index(self, index: u32) -> Self {
        Self {
            index: Some(index),
            ..self
        }
    }

    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the desired image resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver the desired resolution.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    ///
    /// A lower frame rate might be selected if the webcam cannot deliver the desired frame rate.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects whether to prefer a higher resolution or frame rate.
    ///
    /// When the camera cannot deliver both, this controls which one is maintained. When it can,
    /// this controls which one is maximized while keeping the other at its desired value.
    #[inline]
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }
}

#[derive(Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        1.0 / self.frame_interval.as_f32()
    }
}

/// Finds the first compressed capture format the device offers.
fn jpeg_format(device: &Device) -> anyhow::Result<PixelFormat> {
    for desc in device.formats(BufType::VIDEO_CAPTURE) {
        let pixelformat = desc?.pixel_format();
        if [PixelFormat::JPEG, PixelFormat::MJPG].contains(&pixelformat) {
            return Ok(pixelformat);
        }
    }
    bail!("device offers neither JPEG nor MJPG frames")
}

/// Lists every (resolution, frame interval) pair the device supports for `pixelformat`.
fn capture_modes(device: &Device, pixelformat: PixelFormat) -> anyhow::Result<Vec<FrameFormat>> {
    let FrameSizes::Discrete(sizes) = device.frame_sizes(pixelformat)? else {
        bail!("only discrete frame sizes are supported");
    };

    let mut modes = Vec::new();
    for size in sizes {
        let (width, height) = (size.width(), size.height());
        let FrameIntervals::Discrete(intervals) =
            device.frame_intervals(pixelformat, width, height)?
        else {
            bail!("only discrete frame intervals are supported ({width}x{height})");
        };
        modes.extend(intervals.into_iter().map(|interval| FrameFormat {
            resolution: Resolution::new(width, height),
            frame_interval: *interval.fract(),
        }));
    }
    Ok(modes)
}

/// Picks the best of `formats` for `prefs`, dropping the less important preference (and then the
/// other one) until a format matches.
fn select_format(formats: &[FrameFormat], mut prefs: FramePrefs) -> Option<FrameFormat> {
    loop {
        if let Some(fmt) = select_format_step(formats, prefs) {
            return Some(fmt);
        }

        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        let relaxed = match prefs.pref {
            ParamPreference::Resolution => {
                prefs.fps.take().is_some() || prefs.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                prefs.resolution.take().is_some() || prefs.fps.take().is_some()
            }
        };
        if !relaxed {
            return None;
        }
        log::debug!("retrying with new prefs {:?}", prefs);
    }
}

fn select_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let eligible = formats.iter().filter(|fmt| {
        prefs.resolution.map_or(true, |res| {
            fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
        }) && prefs
            .fps
            .map_or(true, |fps| fmt.fps().round() >= fps as f32)
    });
    let best = match prefs.pref {
        ParamPreference::Resolution => {
            eligible.max_by_key(|fmt| (fmt.resolution.num_pixels(), TotalF32(fmt.fps())))
        }
        ParamPreference::Framerate => {
            eligible.max_by_key(|fmt| (TotalF32(fmt.fps()), fmt.resolution.num_pixels()))
        }
    };
    best.copied()
}

const ENV_VAR_WEBCAM_NAME: &str = "HANDCAM_WEBCAM_NAME";

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    name: String,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens a webcam.
    ///
    /// Without an index or name in `options`, the first supported device is used. The
    /// `HANDCAM_WEBCAM_NAME` environment variable overrides the device selection of `options`.
    ///
    /// Blocks while the camera starts up, which can take a few hundred milliseconds.
    pub fn open(mut options: WebcamOptions) -> anyhow::Result<Self> {
        if let Ok(name) = env::var(ENV_VAR_WEBCAM_NAME) {
            log::debug!("{ENV_VAR_WEBCAM_NAME}={name} overrides webcam selection");
            options.index = None;
            options.name = Some(name);
        }

        let path = options.index.map(|i| PathBuf::from(format!("/dev/video{i}")));
        for device in linuxvideo::list()? {
            let device = match device {
                Ok(device) => device,
                Err(e) => {
                    log::warn!("skipping video device: {e}");
                    continue;
                }
            };
            match Self::try_device(device, &options, path.as_deref()) {
                Ok(Some(webcam)) => return Ok(webcam),
                Ok(None) => {}
                Err(e) => log::debug!("unusable video device: {e}"),
            }
        }

        if let Some(path) = path {
            bail!("cannot open webcam {}", path.display());
        }
        match options.name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    /// Opens `device` if it matches `options`.
    fn try_device(
        device: Device,
        options: &WebcamOptions,
        path: Option<&Path>,
    ) -> anyhow::Result<Option<Self>> {
        let dev_path = device.path()?;
        if path.is_some_and(|path| path != dev_path) {
            return Ok(None);
        }

        let caps = device.capabilities()?;
        let card = caps.card();
        if options.name.as_deref().is_some_and(|name| name != card) {
            return Ok(None);
        }
        if !caps
            .device_capabilities()
            .contains(CapabilityFlags::VIDEO_CAPTURE)
        {
            log::debug!("{card} ({}) cannot capture video", dev_path.display());
            return Ok(None);
        }

        let pixelformat = jpeg_format(&device)?;
        let modes = capture_modes(&device, pixelformat)?;
        let Some(mode) = select_format(&modes, options.frame) else {
            bail!("{card}: none of {} capture modes is usable", modes.len());
        };

        let (width, height) = (mode.resolution.width(), mode.resolution.height());
        let capture = device.video_capture(PixFormat::new(width, height, pixelformat))?;
        let interval = capture.set_frame_interval(mode.frame_interval)?;
        log::info!(
            "opened {card} ({}) at {}x{}, {:.1} FPS",
            dev_path.display(),
            capture.format().width(),
            capture.format().height(),
            1.0 / interval.as_f32(),
        );

        Ok(Some(Self {
            stream: capture.into_stream()?,
            name: card.to_string(),
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is. Frames that are empty or
    /// fail to decode are logged and reported as `Ok(None)`; webcams occasionally produce
    /// corrupted MJPG frames.
    pub fn read(&mut self) -> anyhow::Result<Option<Image>> {
        let dequeue_guard = self.t_dequeue.start();
        let t_decode = &self.t_decode;
        let image = self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            if buf.is_empty() {
                log::warn!("webcam returned an empty frame");
                return Ok(None);
            }

            match t_decode.time(|| Image::decode_jpeg(&buf)) {
                Ok(image) => Ok(Some(image)),
                Err(e) => {
                    log::warn!("webcam decode error: {}", e);
                    Ok(None)
                }
            }
        })?;
        Ok(image)
    }

    /// Returns profiling timers for webcam access and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        log::debug!("releasing webcam {}", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(width: u32, height: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(width, height),
            frame_interval: Fract::new(1, fps),
        }
    }

    fn modes() -> Vec<FrameFormat> {
        vec![
            fmt(640, 480, 30),
            fmt(640, 480, 60),
            fmt(1280, 720, 30),
            fmt(1920, 1080, 5),
        ]
    }

    fn prefs(resolution: Option<Resolution>, fps: Option<u32>, pref: ParamPreference) -> FramePrefs {
        FramePrefs {
            resolution,
            fps,
            pref,
        }
    }

    #[test]
    fn prefers_resolution() {
        let sel = select_format(&modes(), prefs(None, Some(30), ParamPreference::Resolution)).unwrap();
        assert_eq!(sel.resolution, Resolution::RES_720P);

        let sel = select_format(&modes(), FramePrefs::default()).unwrap();
        assert_eq!(sel.resolution, Resolution::new(1920, 1080));
    }

    #[test]
    fn requested_fps_skips_slow_modes() {
        let options = WebcamOptions::default().index(0).fps(30);
        let sel = select_format(&modes(), options.frame).unwrap();
        assert_eq!(sel.resolution, Resolution::RES_720P);
        assert_eq!(sel.fps().round(), 30.0);
    }

    #[test]
    fn prefers_framerate() {
        let sel = select_format(&modes(), prefs(None, None, ParamPreference::Framerate)).unwrap();
        assert_eq!(sel.resolution, Resolution::VGA);
        assert_eq!(sel.fps().round(), 60.0);

        let sel = select_format(
            &modes(),
            prefs(Some(Resolution::RES_720P), None, ParamPreference::Framerate),
        )
        .unwrap();
        assert_eq!(sel.resolution, Resolution::RES_720P);
        assert_eq!(sel.fps().round(), 30.0);
    }

    #[test]
    fn relaxes_unsatisfiable_prefs() {
        // No mode does 1080p at 30 FPS. Keep the resolution, drop the frame rate.
        let wanted = Some(Resolution::new(1920, 1080));
        let sel = select_format(&modes(), prefs(wanted, Some(30), ParamPreference::Resolution))
            .unwrap();
        assert_eq!(sel.resolution, Resolution::new(1920, 1080));

        // Keep the frame rate, drop the resolution.
        let sel = select_format(&modes(), prefs(wanted, Some(30), ParamPreference::Framerate))
            .unwrap();
        assert_eq!(sel.fps().round(), 60.0);
    }

    #[test]
    fn no_modes() {
        assert!(select_format(&[], prefs(None, Some(30), ParamPreference::Resolution)).is_none());
    }
}
