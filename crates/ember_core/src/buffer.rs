//! Output buffers written by the renderer.
//!
//! `OutputBuffer` is the seam the host plugs its own framebuffers into.
//! `RenderBuffer` is an in-memory implementation: every pixel component is
//! an atomic word so tiles can write disjoint pixels through `&self`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// Pixel formats understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Float32,
    Float32Vec3,
    Float32Vec4,
    Int32,
    UNorm8Vec4,
}

impl Format {
    /// Number of components per pixel.
    pub fn components(&self) -> usize {
        match self {
            Format::Float32 | Format::Int32 => 1,
            Format::Float32Vec3 => 3,
            Format::Float32Vec4 | Format::UNorm8Vec4 => 4,
        }
    }

    /// True for formats whose components hold integers.
    pub fn is_integer(&self) -> bool {
        matches!(self, Format::Int32)
    }
}

/// A 2D buffer the renderer writes AOV samples into.
///
/// Implementations must accept concurrent writes to distinct pixels.
pub trait OutputBuffer: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> Format;

    /// Multisampled buffers average every sample written to a pixel;
    /// single-sampled buffers keep the last one.
    fn is_multisampled(&self) -> bool;

    /// Begin writing. Calls nest; each `map` needs a matching `unmap`.
    fn map(&self);
    fn unmap(&self);
    fn is_mapped(&self) -> bool;

    /// Write up to `format().components()` float components to a pixel.
    fn write_f32(&self, x: u32, y: u32, data: &[f32]);
    /// Write up to `format().components()` integer components to a pixel.
    fn write_i32(&self, x: u32, y: u32, data: &[i32]);

    /// Fill every pixel and discard accumulated samples.
    fn clear_f32(&self, data: &[f32]);
    fn clear_i32(&self, data: &[i32]);

    fn set_converged(&self, converged: bool);
    fn is_converged(&self) -> bool;
}

/// In-memory output buffer.
pub struct RenderBuffer {
    width: u32,
    height: u32,
    format: Format,
    multisampled: bool,
    /// Last written (or cleared) value per component, as raw bits
    data: Vec<AtomicU32>,
    /// Running sums for multisampled float formats
    accum: Vec<AtomicU32>,
    sample_counts: Vec<AtomicU32>,
    map_count: AtomicUsize,
    converged: AtomicBool,
}

impl RenderBuffer {
    /// Create a zero-filled buffer.
    pub fn new(width: u32, height: u32, format: Format, multisampled: bool) -> Self {
        let pixels = (width * height) as usize;
        let words = pixels * format.components();
        let accumulates = multisampled && !format.is_integer();
        Self {
            width,
            height,
            format,
            multisampled,
            data: (0..words).map(|_| AtomicU32::new(0)).collect(),
            accum: if accumulates {
                (0..words).map(|_| AtomicU32::new(0)).collect()
            } else {
                Vec::new()
            },
            sample_counts: if accumulates {
                (0..pixels).map(|_| AtomicU32::new(0)).collect()
            } else {
                Vec::new()
            },
            map_count: AtomicUsize::new(0),
            converged: AtomicBool::new(false),
        }
    }

    /// Read a pixel's float components, resolving accumulated samples.
    pub fn read_f32(&self, x: u32, y: u32) -> Vec<f32> {
        let Some(pixel) = self.pixel_index(x, y) else {
            return Vec::new();
        };
        let n = self.format.components();
        let base = pixel * n;

        if self.format.is_integer() {
            return (0..n)
                .map(|c| self.data[base + c].load(Ordering::Relaxed) as i32 as f32)
                .collect();
        }

        let count = self
            .sample_counts
            .get(pixel)
            .map_or(0, |c| c.load(Ordering::Relaxed));
        if count > 0 {
            (0..n)
                .map(|c| {
                    f32::from_bits(self.accum[base + c].load(Ordering::Relaxed)) / count as f32
                })
                .collect()
        } else {
            (0..n)
                .map(|c| f32::from_bits(self.data[base + c].load(Ordering::Relaxed)))
                .collect()
        }
    }

    /// Read a pixel's integer components.
    pub fn read_i32(&self, x: u32, y: u32) -> Vec<i32> {
        if !self.format.is_integer() {
            return self.read_f32(x, y).into_iter().map(|v| v as i32).collect();
        }
        let Some(pixel) = self.pixel_index(x, y) else {
            return Vec::new();
        };
        let n = self.format.components();
        (0..n)
            .map(|c| self.data[pixel * n + c].load(Ordering::Relaxed) as i32)
            .collect()
    }

    /// Number of samples accumulated at a pixel (multisampled float formats).
    pub fn sample_count(&self, x: u32, y: u32) -> u32 {
        self.pixel_index(x, y)
            .and_then(|p| self.sample_counts.get(p))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    fn pixel_index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }

    fn quantize(&self, value: f32) -> f32 {
        match self.format {
            Format::UNorm8Vec4 => (value.clamp(0.0, 1.0) * 255.0).round() / 255.0,
            _ => value,
        }
    }

    fn store_f32(&self, pixel: usize, values: &[f32]) {
        let n = self.format.components();
        let base = pixel * n;
        let component = |c: usize| self.quantize(values.get(c).copied().unwrap_or(0.0));

        if self.accum.is_empty() {
            for c in 0..n {
                self.data[base + c].store(component(c).to_bits(), Ordering::Relaxed);
            }
            return;
        }

        // A pixel is only ever written by one tile per pass, so the
        // load/store pairs below do not race.
        let previous = self.sample_counts[pixel].fetch_add(1, Ordering::Relaxed);
        for c in 0..n {
            let value = component(c);
            self.data[base + c].store(value.to_bits(), Ordering::Relaxed);
            let sum = if previous == 0 {
                value
            } else {
                f32::from_bits(self.accum[base + c].load(Ordering::Relaxed)) + value
            };
            self.accum[base + c].store(sum.to_bits(), Ordering::Relaxed);
        }
    }
}

impl OutputBuffer for RenderBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> Format {
        self.format
    }

    fn is_multisampled(&self) -> bool {
        self.multisampled
    }

    fn map(&self) {
        self.map_count.fetch_add(1, Ordering::AcqRel);
    }

    fn unmap(&self) {
        let _ = self
            .map_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    fn is_mapped(&self) -> bool {
        self.map_count.load(Ordering::Acquire) > 0
    }

    fn write_f32(&self, x: u32, y: u32, data: &[f32]) {
        let Some(pixel) = self.pixel_index(x, y) else {
            return;
        };
        if self.format.is_integer() {
            let ints: Vec<i32> = data.iter().map(|&v| v as i32).collect();
            self.write_i32(x, y, &ints);
        } else {
            self.store_f32(pixel, data);
        }
    }

    fn write_i32(&self, x: u32, y: u32, data: &[i32]) {
        let Some(pixel) = self.pixel_index(x, y) else {
            return;
        };
        if !self.format.is_integer() {
            let floats: Vec<f32> = data.iter().map(|&v| v as f32).collect();
            self.store_f32(pixel, &floats);
            return;
        }
        let n = self.format.components();
        for c in 0..n {
            let value = data.get(c).copied().unwrap_or(0);
            self.data[pixel * n + c].store(value as u32, Ordering::Relaxed);
        }
    }

    fn clear_f32(&self, data: &[f32]) {
        if self.format.is_integer() {
            let ints: Vec<i32> = data.iter().map(|&v| v as i32).collect();
            self.clear_i32(&ints);
            return;
        }
        let n = self.format.components();
        for (i, word) in self.data.iter().enumerate() {
            let value = self.quantize(data.get(i % n).copied().unwrap_or(0.0));
            word.store(value.to_bits(), Ordering::Relaxed);
        }
        for count in &self.sample_counts {
            count.store(0, Ordering::Relaxed);
        }
    }

    fn clear_i32(&self, data: &[i32]) {
        if !self.format.is_integer() {
            let floats: Vec<f32> = data.iter().map(|&v| v as f32).collect();
            self.clear_f32(&floats);
            return;
        }
        let n = self.format.components();
        for (i, word) in self.data.iter().enumerate() {
            word.store(data.get(i % n).copied().unwrap_or(0) as u32, Ordering::Relaxed);
        }
    }

    fn set_converged(&self, converged: bool) {
        self.converged.store(converged, Ordering::Release);
    }

    fn is_converged(&self) -> bool {
        self.converged.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sample_keeps_last_write() {
        let buffer = RenderBuffer::new(2, 2, Format::Float32Vec4, false);
        buffer.write_f32(1, 0, &[0.1, 0.2, 0.3, 1.0]);
        buffer.write_f32(1, 0, &[0.5, 0.5, 0.5, 1.0]);

        assert_eq!(buffer.read_f32(1, 0), vec![0.5, 0.5, 0.5, 1.0]);
        assert_eq!(buffer.read_f32(0, 0), vec![0.0; 4]);
    }

    #[test]
    fn test_multisample_averages() {
        let buffer = RenderBuffer::new(1, 1, Format::Float32, true);
        buffer.write_f32(0, 0, &[1.0]);
        buffer.write_f32(0, 0, &[3.0]);

        assert_eq!(buffer.sample_count(0, 0), 2);
        assert_eq!(buffer.read_f32(0, 0), vec![2.0]);

        // Clearing drops accumulated samples
        buffer.clear_f32(&[7.0]);
        assert_eq!(buffer.sample_count(0, 0), 0);
        assert_eq!(buffer.read_f32(0, 0), vec![7.0]);
    }

    #[test]
    fn test_short_writes_zero_fill() {
        let buffer = RenderBuffer::new(1, 1, Format::Float32Vec3, false);
        buffer.write_f32(0, 0, &[0.25]);
        assert_eq!(buffer.read_f32(0, 0), vec![0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_int_buffer() {
        let buffer = RenderBuffer::new(2, 1, Format::Int32, true);
        buffer.clear_i32(&[-1]);
        buffer.write_i32(0, 0, &[42]);

        assert_eq!(buffer.read_i32(0, 0), vec![42]);
        assert_eq!(buffer.read_i32(1, 0), vec![-1]);
    }

    #[test]
    fn test_unorm8_quantizes() {
        let buffer = RenderBuffer::new(1, 1, Format::UNorm8Vec4, false);
        buffer.write_f32(0, 0, &[2.0, -1.0, 0.5, 1.0]);
        let pixel = buffer.read_f32(0, 0);

        assert_eq!(pixel[0], 1.0);
        assert_eq!(pixel[1], 0.0);
        assert!((pixel[2] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_bounds_ignored() {
        let buffer = RenderBuffer::new(1, 1, Format::Float32, false);
        buffer.write_f32(5, 5, &[1.0]);
        assert!(buffer.read_f32(5, 5).is_empty());
        assert_eq!(buffer.read_f32(0, 0), vec![0.0]);
    }

    #[test]
    fn test_map_nesting_and_convergence() {
        let buffer = RenderBuffer::new(1, 1, Format::Float32, false);
        assert!(!buffer.is_mapped());
        buffer.map();
        buffer.map();
        buffer.unmap();
        assert!(buffer.is_mapped());
        buffer.unmap();
        buffer.unmap();
        assert!(!buffer.is_mapped());

        assert!(!buffer.is_converged());
        buffer.set_converged(true);
        assert!(buffer.is_converged());
    }
}
