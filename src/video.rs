// src/video.rs - Frame sources and MJPEG output
use std::io::Write;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, DynamicImage, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use tracing::{debug, info};

use crate::config::CameraConfig;
use crate::{Error, Result};

pub enum VideoSource {
    Camera { camera: Camera, mirror: bool },
    /// The same frame `remaining` more times; drives landmark replays.
    Still { frame: DynamicImage, remaining: usize },
}

impl VideoSource {
    pub fn new_camera(config: &CameraConfig) -> Result<Self> {
        debug!("Opening camera index {}", config.index);

        let format = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(format));

        let mut camera = Camera::new(CameraIndex::Index(config.index), requested)
            .map_err(|e| Error::Camera(format!("failed to open camera {}: {}", config.index, e)))?;
        camera
            .open_stream()
            .map_err(|e| Error::Camera(format!("failed to open camera stream: {}", e)))?;

        info!(
            "Camera {} streaming at {}x{}",
            config.index,
            camera.resolution().width(),
            camera.resolution().height()
        );
        Ok(VideoSource::Camera {
            camera,
            mirror: config.mirror,
        })
    }

    pub fn new_still(width: u32, height: u32, count: usize) -> Self {
        VideoSource::Still {
            frame: DynamicImage::new_rgba8(width, height),
            remaining: count,
        }
    }

    /// Next frame, or `None` once a finite source is exhausted. Camera read
    /// errors are returned so the caller can skip the frame.
    pub fn read_frame(&mut self) -> Result<Option<DynamicImage>> {
        match self {
            VideoSource::Camera { camera, mirror } => {
                let buffer = camera
                    .frame()
                    .map_err(|e| Error::Camera(format!("failed to capture frame: {}", e)))?;
                let decoded = buffer
                    .decode_image::<RgbFormat>()
                    .map_err(|e| Error::Camera(format!("failed to decode frame: {}", e)))?;

                Ok(Some(prepare_frame(decoded, *mirror)))
            }
            VideoSource::Still { frame, remaining } => {
                if *remaining == 0 {
                    return Ok(None);
                }
                *remaining -= 1;
                Ok(Some(frame.clone()))
            }
        }
    }
}

/// Converts a decoded camera frame to RGBA, mirrored for a selfie view.
fn prepare_frame(decoded: RgbImage, mirror: bool) -> DynamicImage {
    let rgba = DynamicImage::ImageRgb8(decoded).into_rgba8();
    if mirror {
        DynamicImage::ImageRgba8(image::imageops::flip_horizontal(&rgba))
    } else {
        DynamicImage::ImageRgba8(rgba)
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if let VideoSource::Camera { camera, .. } = self {
            let _ = camera.stop_stream();
        }
    }
}

/// Names of the cameras the platform backend can see.
pub fn list_cameras() -> Result<Vec<String>> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| Error::Camera(format!("failed to query cameras: {}", e)))?;
    Ok(cameras.iter().map(|c| c.human_name()).collect())
}

/// Opens the camera and grabs a single frame.
pub fn probe_camera(config: &CameraConfig) -> Result<()> {
    let mut source = VideoSource::new_camera(config)?;
    source.read_frame()?;
    Ok(())
}

pub fn encode_jpeg(frame: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = frame.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(bytes)
}

/// Writes frames as `multipart/x-mixed-replace; boundary=frame` parts.
pub struct MjpegWriter<W: Write> {
    out: W,
    quality: u8,
    frames: usize,
}

impl<W: Write> MjpegWriter<W> {
    pub const CONTENT_TYPE: &'static str = "multipart/x-mixed-replace; boundary=frame";

    pub fn new(out: W, quality: u8) -> Self {
        Self {
            out,
            quality,
            frames: 0,
        }
    }

    pub fn write_frame(&mut self, frame: &DynamicImage) -> Result<()> {
        let jpeg = encode_jpeg(frame, self.quality)?;
        self.out.write_all(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n")?;
        self.out.write_all(&jpeg)?;
        self.out.write_all(b"\r\n")?;
        self.out.flush()?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> usize {
        self.frames
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_still_source_is_finite() {
        let mut source = VideoSource::new_still(16, 8, 2);
        let frame = source.read_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 8));
        assert!(source.read_frame().unwrap().is_some());
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_camera_frame_is_rgba_and_mirrored() {
        let mut decoded = RgbImage::new(4, 2);
        decoded.put_pixel(0, 1, image::Rgb([200, 10, 20]));

        let frame = prepare_frame(decoded.clone(), true);
        let rgba = frame.as_rgba8().unwrap();
        assert_eq!(rgba.get_pixel(3, 1), &image::Rgba([200, 10, 20, 255]));

        let frame = prepare_frame(decoded, false);
        assert_eq!(frame.as_rgba8().unwrap().get_pixel(0, 1), &image::Rgba([200, 10, 20, 255]));
    }

    #[test]
    fn test_jpeg_signature() {
        let jpeg = encode_jpeg(&DynamicImage::new_rgb8(8, 8), 85).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_mjpeg_part_framing() {
        let mut writer = MjpegWriter::new(Vec::new(), 85);
        writer.write_frame(&DynamicImage::new_rgb8(8, 8)).unwrap();
        writer.write_frame(&DynamicImage::new_rgb8(8, 8)).unwrap();
        assert_eq!(writer.frames_written(), 2);

        let bytes = writer.into_inner();
        let header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        assert!(bytes.starts_with(header));
        assert!(bytes.ends_with(b"\r\n"));
        let parts = bytes.windows(header.len()).filter(|w| *w == header).count();
        assert_eq!(parts, 2);
    }
}
