//! Display control module for PineTime

use display_interface_spi::SPIInterface;
use embassy_nrf::{
    gpio::Output,
    peripherals::{P0_18, P0_25, P0_26},
    spim::{self, Spim},
};
use embassy_time::Delay;
use embedded_graphics::{draw_target::DrawTarget, pixelcolor::Rgb565, prelude::RgbColor};
use mipidsi::{models::ST7789, Builder, Orientation};

use watchface::{
    layout::{SCREEN_H, SCREEN_W},
    Settings, WatchFace,
};

type Lcd<'a, SPI> = mipidsi::Display<
    SPIInterface<Spim<'a, SPI>, Output<'a, P0_18>, Output<'a, P0_25>>,
    ST7789,
    Output<'a, P0_26>,
>;

pub struct Display<'a, SPI>
where
    SPI: spim::Instance,
{
    /// ST7789 LCD on the SPI bus
    lcd: Lcd<'a, SPI>,
}

impl<'a, SPI> Display<'a, SPI>
where
    SPI: spim::Instance,
{
    /// Configure display settings on boot
    pub fn init(
        spim: Spim<'a, SPI>,
        cs_pin: Output<'a, P0_25>,
        dc_pin: Output<'a, P0_18>,
        rst_pin: Output<'a, P0_26>,
    ) -> Result<Self, Error> {
        let lcd = Builder::st7789(SPIInterface::new(spim, dc_pin, cs_pin))
            .with_display_size(SCREEN_W as u16, SCREEN_H as u16)
            .with_orientation(Orientation::Portrait(false))
            .init(&mut Delay, Some(rst_pin))
            .map_err(|_| Error::Init)?;

        let mut display = Self { lcd };
        display.clear()?;
        Ok(display)
    }

    /// Clear the display to the watchface background
    pub fn clear(&mut self) -> Result<(), Error> {
        self.lcd.clear(Rgb565::WHITE).map_err(|_| Error::Bus)
    }

    /// Draw the layers of `face` that are out of date
    pub fn render(&mut self, face: &mut WatchFace, settings: &Settings) -> Result<(), Error> {
        face.draw(settings, &mut self.lcd).map_err(|_| Error::Bus)
    }
}

#[derive(Debug, defmt::Format)]
pub enum Error {
    /// Controller did not come up
    Init,
    /// Writing pixels failed
    Bus,
}
