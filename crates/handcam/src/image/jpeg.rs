use std::{
    env::{self, VarError},
    fmt,
    panic::catch_unwind,
};

use anyhow::bail;
use image::ImageBuffer;
use once_cell::sync::Lazy;

use super::Image;

/// The JPEG decoders that can be used for MJPEG webcam frames.
///
/// Selected with the `HANDCAM_JPEG_BACKEND` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegBackend {
    /// The `jpeg-decoder` crate (via `image`), a robust but slow pure-Rust JPEG decoder.
    JpegDecoder,
    /// The `mozjpeg` crate, a wrapper around Mozilla's libjpeg fork. Robust and fast-ish, but C.
    MozJpeg,
    /// The `zune-jpeg` crate, a pure-Rust JPEG decoder somewhat faster than `jpeg-decoder`.
    ZuneJpeg,
}

impl JpegBackend {
    pub const DEFAULT: Self = Self::MozJpeg;

    const ENV_VAR: &'static str = "HANDCAM_JPEG_BACKEND";

    /// Parses a backend name as accepted by `HANDCAM_JPEG_BACKEND`.
    pub fn from_name(name: &str) -> anyhow::Result<Self> {
        match name {
            "mozjpeg" => Ok(Self::MozJpeg),
            "jpeg-decoder" => Ok(Self::JpegDecoder),
            "zune-jpeg" => Ok(Self::ZuneJpeg),
            _ => bail!(
                "invalid value set for `{}` variable: '{name}' (expected one of `mozjpeg`, \
                 `jpeg-decoder`, `zune-jpeg`)",
                Self::ENV_VAR
            ),
        }
    }

    fn from_env() -> anyhow::Result<Self> {
        match env::var(Self::ENV_VAR) {
            Ok(v) => Self::from_name(&v),
            Err(VarError::NotPresent) => Ok(Self::DEFAULT),
            Err(VarError::NotUnicode(s)) => bail!(
                "invalid value set for `{}` variable: {}",
                Self::ENV_VAR,
                s.to_string_lossy()
            ),
        }
    }
}

impl fmt::Display for JpegBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::JpegDecoder => "jpeg-decoder",
            Self::MozJpeg => "mozjpeg",
            Self::ZuneJpeg => "zune-jpeg",
        })
    }
}

static JPEG_BACKEND: Lazy<Result<JpegBackend, String>> = Lazy::new(|| {
    let backend = JpegBackend::from_env().map_err(|e| e.to_string());
    if let Ok(backend) = &backend {
        log::debug!("using JPEG backend: {backend}");
    }
    backend
});

pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let backend = match &*JPEG_BACKEND {
        Ok(backend) => *backend,
        Err(msg) => bail!("{msg}"),
    };
    decode_with(backend, data)
}

pub(super) fn decode_with(backend: JpegBackend, data: &[u8]) -> anyhow::Result<Image> {
    let buf = match backend {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
        }
        JpegBackend::MozJpeg => {
            // mozjpeg reports errors by unwinding
            let (buf, width, height) = catch_unwind(|| -> anyhow::Result<_> {
                let mut decompress = mozjpeg::Decompress::new_mem(data)?;

                // Tune settings for decode performance.
                decompress.do_fancy_upsampling(false);
                decompress.dct_method(mozjpeg::DctMethod::IntegerFast);

                let mut decompress = decompress.rgba()?;
                let buf = decompress
                    .read_scanlines_flat()
                    .ok_or_else(|| anyhow::anyhow!("failed to decode image"))?;
                Ok((buf, decompress.width(), decompress.height()))
            })
            .map_err(|payload| match payload.downcast::<String>() {
                Ok(string) => anyhow::Error::msg(string),
                Err(_) => anyhow::anyhow!("<unknown panic message>"),
            })??;

            from_raw(width.try_into()?, height.try_into()?, buf)?
        }
        JpegBackend::ZuneJpeg => {
            use zune_jpeg::zune_core::colorspace::ColorSpace;
            use zune_jpeg::zune_core::options::DecoderOptions;

            let mut decomp = zune_jpeg::JpegDecoder::new_with_options(
                DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGBA),
                data,
            );
            decomp
                .decode_headers()
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            match decomp.get_output_colorspace() {
                Some(ColorSpace::RGBA) => {}
                other => bail!("unsupported colorspace {other:?} (expected RGBA)"),
            }

            let buf = decomp.decode().map_err(|e| anyhow::anyhow!("{e:?}"))?;
            let (width, height) = decomp
                .dimensions()
                .ok_or_else(|| anyhow::anyhow!("JPEG dimensions unavailable after decoding"))?;
            from_raw(width.into(), height.into(), buf)?
        }
    };

    Ok(Image { buf })
}

fn from_raw(width: u32, height: u32, buf: Vec<u8>) -> anyhow::Result<image::RgbaImage> {
    let len = buf.len();
    ImageBuffer::from_raw(width, height, buf).ok_or_else(|| {
        anyhow::anyhow!("decoded {len} bytes, which is too small for a {width}x{height} image")
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::image::{Color, Resolution};

    use super::*;

    fn encode_test_jpeg() -> Vec<u8> {
        let mut src = Image::new(16, 8);
        src.clear(Color::from_rgb8(200, 30, 30));
        let rgb = image::DynamicImage::ImageRgba8(src.buf).to_rgb8();
        let mut out = Cursor::new(Vec::new());
        rgb.write_to(&mut out, image::ImageOutputFormat::Jpeg(95))
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn backend_names() {
        assert_eq!(
            JpegBackend::from_name("zune-jpeg").unwrap(),
            JpegBackend::ZuneJpeg
        );
        assert_eq!(
            JpegBackend::from_name("mozjpeg").unwrap(),
            JpegBackend::DEFAULT
        );
        assert!(JpegBackend::from_name("turbo").is_err());
        assert_eq!(JpegBackend::JpegDecoder.to_string(), "jpeg-decoder");
    }

    #[test]
    fn decode_pure_rust_backends() {
        let jpeg = encode_test_jpeg();
        for backend in [JpegBackend::JpegDecoder, JpegBackend::ZuneJpeg] {
            let image = decode_with(backend, &jpeg).unwrap();
            assert_eq!(image.resolution(), Resolution::new(16, 8), "{backend}");
            let px = image.get(8, 4);
            assert!(px.r() > 150 && px.g() < 80 && px.b() < 80, "{backend}: {px:?}");
        }
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_with(JpegBackend::JpegDecoder, b"not a jpeg").is_err());
        assert!(decode_with(JpegBackend::ZuneJpeg, b"not a jpeg").is_err());
    }
}
