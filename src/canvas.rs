use tracing::warn;

use crate::frame::{Frame, Slot};

const BYTES_PER_PIXEL: usize = 4;

/// Destination RGBA pixel buffer, logically partitioned into four quadrants
/// matching the slot layout.
///
/// Quadrant regions are disjoint byte ranges, so per-slot writes never
/// overlap. The canvas is not double-buffered; the display collaborator
/// reads it between blits.
#[derive(Debug)]
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width % 2 == 0 && height % 2 == 0, "canvas dimensions must be even");
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel origin of a slot's quadrant.
    pub fn quadrant_origin(&self, slot: Slot) -> (u32, u32) {
        let qw = self.width / 2;
        let qh = self.height / 2;
        match slot {
            Slot::TopLeft => (0, 0),
            Slot::TopRight => (qw, 0),
            Slot::BottomLeft => (0, qh),
            Slot::BottomRight => (qw, qh),
        }
    }

    /// Copy a frame's pixels into the quadrant matching its slot.
    ///
    /// Frames whose size does not match the quadrant are dropped with a
    /// warning; the collaborator contract is that scaling already happened.
    pub fn blit(&mut self, frame: &Frame) {
        let qw = self.width / 2;
        let qh = self.height / 2;
        if frame.width != qw || frame.height != qh {
            warn!(
                "Dropping {}x{} frame for slot {}, quadrant is {}x{}",
                frame.width, frame.height, frame.slot, qw, qh
            );
            return;
        }

        let (ox, oy) = self.quadrant_origin(frame.slot);
        let canvas_stride = self.width as usize * BYTES_PER_PIXEL;
        let frame_stride = qw as usize * BYTES_PER_PIXEL;

        for row in 0..qh as usize {
            let src_start = row * frame_stride;
            let dst_start = (oy as usize + row) * canvas_stride + ox as usize * BYTES_PER_PIXEL;
            self.data[dst_start..dst_start + frame_stride]
                .copy_from_slice(&frame.data[src_start..src_start + frame_stride]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(slot: Slot, value: u8, width: u32, height: u32) -> Frame {
        let data = vec![value; width as usize * height as usize * BYTES_PER_PIXEL];
        Frame::new(slot, 0, width, height, data)
    }

    fn pixel_at(canvas: &Canvas, x: u32, y: u32) -> u8 {
        canvas.data()[(y as usize * canvas.width() as usize + x as usize) * BYTES_PER_PIXEL]
    }

    #[test]
    fn test_quadrant_origins() {
        let canvas = Canvas::new(8, 8);
        assert_eq!(canvas.quadrant_origin(Slot::TopLeft), (0, 0));
        assert_eq!(canvas.quadrant_origin(Slot::TopRight), (4, 0));
        assert_eq!(canvas.quadrant_origin(Slot::BottomLeft), (0, 4));
        assert_eq!(canvas.quadrant_origin(Slot::BottomRight), (4, 4));
    }

    #[test]
    fn test_blit_writes_only_its_quadrant() {
        let mut canvas = Canvas::new(8, 8);
        canvas.blit(&solid_frame(Slot::TopRight, 0xff, 4, 4));

        assert_eq!(pixel_at(&canvas, 4, 0), 0xff);
        assert_eq!(pixel_at(&canvas, 7, 3), 0xff);
        // The other three quadrants stay untouched.
        assert_eq!(pixel_at(&canvas, 0, 0), 0);
        assert_eq!(pixel_at(&canvas, 0, 4), 0);
        assert_eq!(pixel_at(&canvas, 4, 4), 0);
    }

    #[test]
    fn test_blit_all_quadrants_disjoint() {
        let mut canvas = Canvas::new(8, 8);
        for (i, slot) in Slot::ALL.into_iter().enumerate() {
            canvas.blit(&solid_frame(slot, (i + 1) as u8, 4, 4));
        }
        assert_eq!(pixel_at(&canvas, 0, 0), 1);
        assert_eq!(pixel_at(&canvas, 4, 0), 2);
        assert_eq!(pixel_at(&canvas, 0, 4), 3);
        assert_eq!(pixel_at(&canvas, 4, 4), 4);
    }

    #[test]
    fn test_blit_rejects_mismatched_size() {
        let mut canvas = Canvas::new(8, 8);
        canvas.blit(&solid_frame(Slot::TopLeft, 0xff, 2, 2));
        assert!(canvas.data().iter().all(|&b| b == 0));
    }
}
