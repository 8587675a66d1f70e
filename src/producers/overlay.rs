// SPDX-License-Identifier: MPL-2.0

//! Watermark overlay producer
//!
//! Repaints the watermark into a CPU buffer at a fixed rate (once per second
//! by default) on its own thread and hands the result to the overlay texture
//! source. The watermark is a running counter plus a translucent badge that
//! moves to a new pseudo-random position on every repaint, so recordings
//! visibly prove the overlay updates live.
//!
//! Pixels are premultiplied-alpha RGBA to match the compositor's blend mode.

use crate::render::matrix::Mat4;
use crate::render::texture_source::{FrameNotifier, FramePayload};
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 3x5 pixel glyphs for the counter digits
const DIGIT_GLYPHS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111], // 0
    [0b010, 0b110, 0b010, 0b010, 0b111], // 1
    [0b111, 0b001, 0b111, 0b100, 0b111], // 2
    [0b111, 0b001, 0b111, 0b001, 0b111], // 3
    [0b101, 0b101, 0b111, 0b001, 0b001], // 4
    [0b111, 0b100, 0b111, 0b001, 0b111], // 5
    [0b111, 0b100, 0b111, 0b101, 0b111], // 6
    [0b111, 0b001, 0b010, 0b010, 0b010], // 7
    [0b111, 0b101, 0b111, 0b101, 0b111], // 8
    [0b111, 0b101, 0b111, 0b001, 0b111], // 9
];

const GLYPH_SCALE: u32 = 8;
const GLYPH_SPACING: u32 = GLYPH_SCALE;
const BADGE_SIZE: u32 = 64;

/// Fixed-rate watermark repaint loop.
pub struct OverlayProducer {
    running: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl OverlayProducer {
    /// Start repainting a `width` x `height` watermark every `period`.
    pub fn start(
        width: u32,
        height: u32,
        period: Duration,
        notifier: FrameNotifier,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        info!(width, height, period_ms = period.as_millis() as u64, "Starting overlay producer");

        let thread = std::thread::spawn(move || {
            let mut rng = Lcg::seeded_from_clock();
            let mut counter: u64 = 0;
            while flag.load(Ordering::Relaxed) {
                let started = Instant::now();
                let frame = paint_watermark(width, height, counter, &mut rng);
                notifier.notify_new_frame(frame);
                counter += 1;

                let elapsed = started.elapsed();
                if elapsed < period {
                    std::thread::sleep(period - elapsed);
                }
            }
            debug!("Overlay producer exiting");
        });

        Self {
            running,
            thread: Some(thread),
        }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for OverlayProducer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Paint one watermark frame: transparent background, counter text in the
/// top-left corner, wandering badge.
fn paint_watermark(width: u32, height: u32, counter: u64, rng: &mut Lcg) -> FramePayload {
    let mut image = RgbaImage::new(width, height);

    draw_counter(&mut image, counter);

    let badge_x = rng.next_below(width.saturating_sub(BADGE_SIZE).max(1));
    let badge_y = rng.next_below(height.saturating_sub(BADGE_SIZE).max(1));
    draw_badge(&mut image, badge_x, badge_y);

    FramePayload {
        data: Arc::from(image.into_raw().into_boxed_slice()),
        width,
        height,
        stride: width * 4,
        transform: Mat4::IDENTITY,
    }
}

fn draw_counter(image: &mut RgbaImage, counter: u64) {
    let digits: Vec<usize> = counter
        .to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();
    let mut x = GLYPH_SPACING;
    let y = GLYPH_SPACING;
    for digit in digits {
        draw_glyph(image, &DIGIT_GLYPHS[digit], x, y);
        x += 3 * GLYPH_SCALE + GLYPH_SPACING;
    }
}

fn draw_glyph(image: &mut RgbaImage, glyph: &[u8; 5], origin_x: u32, origin_y: u32) {
    // Opaque white; premultiplied form of white is white
    let white = Rgba([255, 255, 255, 255]);
    for (row, bits) in glyph.iter().enumerate() {
        for col in 0..3u32 {
            if bits & (0b100 >> col) == 0 {
                continue;
            }
            for dy in 0..GLYPH_SCALE {
                for dx in 0..GLYPH_SCALE {
                    let px = origin_x + col * GLYPH_SCALE + dx;
                    let py = origin_y + row as u32 * GLYPH_SCALE + dy;
                    if px < image.width() && py < image.height() {
                        image.put_pixel(px, py, white);
                    }
                }
            }
        }
    }
}

fn draw_badge(image: &mut RgbaImage, origin_x: u32, origin_y: u32) {
    // Half-transparent amber, premultiplied: rgb already scaled by alpha
    let badge = Rgba([128, 96, 0, 128]);
    for dy in 0..BADGE_SIZE {
        for dx in 0..BADGE_SIZE {
            let px = origin_x + dx;
            let py = origin_y + dy;
            if px < image.width() && py < image.height() {
                image.put_pixel(px, py, badge);
            }
        }
    }
}

/// Small linear congruential generator; badge placement does not need
/// cryptographic randomness.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn seeded_from_clock() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9)
            | 1;
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state >> 33
    }

    fn next_below(&mut self, bound: u32) -> u32 {
        (self.next() % bound.max(1) as u64) as u32
    }
}
