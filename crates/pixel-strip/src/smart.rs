//! Adapter from any `smart_leds::SmartLedsWrite` RGBW sink to [`PixelStrip`].

use smart_leds::{SmartLedsWrite, White, RGBW};

use crate::{scale_channel, unpack, PackedColor, PixelStrip, StripError, StripFactory};

pub struct SmartLedStrip<W> {
    writer: W,
    buffer: Vec<PackedColor>,
    brightness: u8,
}

impl<W> SmartLedStrip<W>
where
    W: SmartLedsWrite<Color = RGBW<u8>>,
{
    pub fn new(writer: W, pixel_count: usize) -> Self {
        Self {
            writer,
            buffer: vec![0; pixel_count],
            brightness: 255,
        }
    }

    fn to_rgbw(color: PackedColor, brightness: u8) -> RGBW<u8> {
        let (r, g, b, w) = unpack(color);
        RGBW {
            r: scale_channel(r, brightness),
            g: scale_channel(g, brightness),
            b: scale_channel(b, brightness),
            a: White(scale_channel(w, brightness)),
        }
    }
}

impl<W> PixelStrip for SmartLedStrip<W>
where
    W: SmartLedsWrite<Color = RGBW<u8>> + Send,
    W::Error: std::fmt::Debug,
{
    fn set_pixel_color(&mut self, index: usize, color: PackedColor) -> Result<(), StripError> {
        let len = self.buffer.len();
        let slot = self
            .buffer
            .get_mut(index)
            .ok_or(StripError::OutOfRange { index, len })?;
        *slot = color;
        Ok(())
    }

    fn show(&mut self) -> Result<(), StripError> {
        let brightness = self.brightness;
        let frame = self.buffer.iter().map(|c| Self::to_rgbw(*c, brightness));
        self.writer
            .write(frame)
            .map_err(|e| StripError::Write(format!("{:?}", e)))
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }

    fn brightness(&self) -> u8 {
        self.brightness
    }

    fn num_pixels(&self) -> usize {
        self.buffer.len()
    }

    fn pixel_color(&self, index: usize) -> Result<PackedColor, StripError> {
        self.buffer
            .get(index)
            .copied()
            .ok_or(StripError::OutOfRange {
                index,
                len: self.buffer.len(),
            })
    }
}

/// Builds a [`SmartLedStrip`] per pin using a caller-supplied writer constructor.
pub struct SmartLedFactory<F> {
    open: F,
}

impl<F> SmartLedFactory<F> {
    pub fn new(open: F) -> Self {
        Self { open }
    }
}

impl<F, W> StripFactory for SmartLedFactory<F>
where
    F: Fn(u8, u8) -> Result<W, StripError> + Send + Sync,
    W: SmartLedsWrite<Color = RGBW<u8>> + Send + 'static,
    W::Error: std::fmt::Debug,
{
    fn init(
        &self,
        pixel_count: usize,
        pin: u8,
        channel: u8,
    ) -> Result<Box<dyn PixelStrip>, StripError> {
        let writer = (self.open)(pin, channel)?;
        Ok(Box::new(SmartLedStrip::new(writer, pixel_count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture {
        frames: Arc<Mutex<Vec<Vec<RGBW<u8>>>>>,
    }

    impl SmartLedsWrite for Capture {
        type Error = ();
        type Color = RGBW<u8>;

        fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
        where
            T: IntoIterator<Item = I>,
            I: Into<Self::Color>,
        {
            let frame = iterator.into_iter().map(Into::into).collect();
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    #[test]
    fn show_writes_scaled_frame() {
        let capture = Capture::default();
        let mut strip = SmartLedStrip::new(capture.clone(), 2);
        strip.set_pixel_color(0, 0x80ff0000).unwrap();
        strip.set_brightness(0);
        strip.show().unwrap();
        strip.set_brightness(255);
        strip.show().unwrap();

        let frames = capture.frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][0].r, 0);
        assert_eq!(frames[1][0].r, 255);
        assert_eq!(frames[1][0].a.0, 0x80);
        assert_eq!(frames[1][1].g, 0);
        drop(frames);
        assert!(!strip.is_simulated());
    }

    #[test]
    fn factory_propagates_open_errors() {
        let factory = SmartLedFactory::new(|_pin, _channel| -> Result<Capture, StripError> {
            Err(StripError::Unavailable("spi busy".into()))
        });
        assert!(factory.init(4, 10, 0).is_err());
    }
}
