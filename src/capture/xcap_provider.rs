use image::imageops::{self, FilterType};
use image::RgbaImage;
use xcap::Monitor;

use super::region::Region;
use super::CaptureProvider;
use crate::errors::CaptureError;
use crate::frame::Frame;

/// Screen capture through `xcap`.
///
/// Captures the monitor containing the region's top-left corner, crops the
/// physical area and scales it back to the logical size.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapProvider;

impl XcapProvider {
    pub fn new() -> Self {
        Self
    }

    fn monitor_for(region: &Region) -> Result<Monitor, CaptureError> {
        Monitor::from_point(region.left(), region.top()).map_err(|e| {
            tracing::debug!(target: "capture", "[XCAP] No monitor at ({}, {}): {}", region.left(), region.top(), e);
            CaptureError::MonitorNotFound {
                x: region.left(),
                y: region.top(),
            }
        })
    }
}

impl CaptureProvider for XcapProvider {
    fn capture(&self, region: &Region) -> Result<Frame, CaptureError> {
        let monitor = Self::monitor_for(region)?;
        let scale = monitor.scale_factor() as f64;

        let screen = monitor
            .capture_image()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let logical = crop_to_region(&screen, region, (monitor.x(), monitor.y()), scale)?;
        rgba_to_frame(logical)
    }
}

/// Crops `region` out of a monitor image whose top-left corner sits at
/// logical `origin`, and scales the result to the region's logical size.
/// The crop is clamped to the image, so it is never empty.
fn crop_to_region(
    screen: &RgbaImage,
    region: &Region,
    origin: (i32, i32),
    scale: f64,
) -> Result<RgbaImage, CaptureError> {
    let (screen_w, screen_h) = screen.dimensions();
    if screen_w == 0 || screen_h == 0 {
        return Err(CaptureError::CaptureFailed(format!(
            "Monitor image is empty ({}x{})",
            screen_w, screen_h
        )));
    }

    let to_physical = |v: i32| (v as f64 * scale).trunc().max(0.0) as u32;
    let x = to_physical(region.left().saturating_sub(origin.0)).min(screen_w - 1);
    let y = to_physical(region.top().saturating_sub(origin.1)).min(screen_h - 1);
    let w = to_physical(region.width() as i32).clamp(1, screen_w - x);
    let h = to_physical(region.height() as i32).clamp(1, screen_h - y);

    let cropped = imageops::crop_imm(screen, x, y, w, h).to_image();
    if (w, h) == (region.width(), region.height()) {
        return Ok(cropped);
    }
    Ok(imageops::resize(&cropped, region.width(), region.height(), FilterType::Triangle))
}

fn rgba_to_frame(image: RgbaImage) -> Result<Frame, CaptureError> {
    let (width, height) = image.dimensions();
    let mut data = image.into_raw();
    for px in data.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    Frame::new(width, height, data).map_err(|e| CaptureError::CaptureFailed(e.to_string()))
}
