//! Two-colour drawing surface and the PBM-backed framebuffer behind it.

use embedded_graphics::mono_font::{ascii::FONT_6X10, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use async_trait::async_trait;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Panel geometry of the 2.13" monochrome e-paper the chart is laid out for.
pub const DISPLAY_WIDTH: u32 = 250;
pub const DISPLAY_HEIGHT: u32 = 122;

pub const FOREGROUND: BinaryColor = BinaryColor::On;
pub const BACKGROUND: BinaryColor = BinaryColor::Off;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to write frame: {0}")]
    Io(#[from] std::io::Error),
}

/// Drawing primitives of a low-refresh bitmap display.
///
/// Nothing becomes visible until `present` is called.
#[async_trait]
pub trait DisplaySink: Send {
    fn size(&self) -> Size;

    fn fill(&mut self, color: BinaryColor);

    fn rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: BinaryColor);

    fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: BinaryColor);

    fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: BinaryColor);

    fn text(&mut self, text: &str, x: i32, y: i32, color: BinaryColor);

    async fn present(&mut self) -> Result<(), DisplayError>;
}

/// 1 bit per pixel, rows padded to whole bytes, most significant bit first.
/// `On` pixels are stored as 1, matching PBM's "ink" convention.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    bits: Vec<u8>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width.div_ceil(8) as usize;
        Framebuffer {
            width,
            height,
            bits: vec![0; stride * height as usize],
        }
    }

    fn stride(&self) -> usize {
        self.width.div_ceil(8) as usize
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<BinaryColor> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let byte = self.bits[y as usize * self.stride() + (x / 8) as usize];
        Some(BinaryColor::from(byte & (0x80 >> (x % 8)) != 0))
    }

    fn set(&mut self, x: u32, y: u32, color: BinaryColor) {
        let idx = y as usize * self.stride() + (x / 8) as usize;
        let mask = 0x80 >> (x % 8);
        if color.is_on() {
            self.bits[idx] |= mask;
        } else {
            self.bits[idx] &= !mask;
        }
    }

    /// Serialise as a binary PBM (P4) image
    pub fn to_pbm(&self) -> Vec<u8> {
        let mut out = format!("P4\n{} {}\n", self.width, self.height).into_bytes();
        out.extend_from_slice(&self.bits);
        out
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Framebuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                let (x, y) = (point.x as u32, point.y as u32);
                if x < self.width && y < self.height {
                    self.set(x, y, color);
                }
            }
        }
        Ok(())
    }
}

/// Framebuffer that publishes each presented frame as a PBM file.
///
/// The file is replaced atomically so readers never see a half-written frame.
pub struct PbmDisplay {
    frame: Framebuffer,
    path: PathBuf,
}

impl PbmDisplay {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_size(path, DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }

    pub fn with_size<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Self {
        PbmDisplay {
            frame: Framebuffer::new(width, height),
            path: path.as_ref().to_path_buf(),
        }
    }

    #[cfg(test)]
    pub fn frame(&self) -> &Framebuffer {
        &self.frame
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DisplaySink for PbmDisplay {
    fn size(&self) -> Size {
        self.frame.size()
    }

    fn fill(&mut self, color: BinaryColor) {
        self.frame.clear(color).ok();
    }

    fn rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: BinaryColor) {
        Rectangle::new(Point::new(x, y), Size::new(w, h))
            .into_styled(PrimitiveStyle::with_stroke(color, 1))
            .draw(&mut self.frame)
            .ok();
    }

    fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: BinaryColor) {
        Line::new(Point::new(x0, y0), Point::new(x1, y1))
            .into_styled(PrimitiveStyle::with_stroke(color, 1))
            .draw(&mut self.frame)
            .ok();
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: BinaryColor) {
        Rectangle::new(Point::new(x, y), Size::new(w, h))
            .into_styled(PrimitiveStyle::with_fill(color))
            .draw(&mut self.frame)
            .ok();
    }

    fn text(&mut self, text: &str, x: i32, y: i32, color: BinaryColor) {
        let style = MonoTextStyle::new(&FONT_6X10, color);
        Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
            .draw(&mut self.frame)
            .ok();
    }

    async fn present(&mut self) -> Result<(), DisplayError> {
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&self.frame.to_pbm()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
