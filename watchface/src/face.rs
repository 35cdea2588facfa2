//! The watchface window and its layers

use core::fmt;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use embedded_graphics::{
    draw_target::{DrawTarget, DrawTargetExt},
    geometry::{Dimensions, Point},
    image::Image,
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::{BinaryColor, Rgb565, RgbColor},
    primitives::{PrimitiveStyle, Rectangle, StyledDrawable},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
    Drawable, Pixel,
};
use profont::{PROFONT_18_POINT, PROFONT_24_POINT};

use crate::{
    art::{self, Art, Character, Route},
    clock::{self, HourFormat},
    layout::{Layer, Layers},
    message::{self, Dictionary, DictionaryWriter, Tuple},
    settings::{self, Settings},
    variant::{Variant, KEY_REQUEST},
};

/// Settings key of the selected character
pub const PERSIST_CHARACTER: u32 = 0;
/// Settings key of the selected route
pub const PERSIST_ROUTE: u32 = 1;

const BACKGROUND_COLOR: Rgb565 = Rgb565::WHITE;
const INK_COLOR: Rgb565 = Rgb565::BLACK;

const TIME_FONT: &MonoFont = &PROFONT_24_POINT;
const SECONDARY_FONT: &MonoFont = &PROFONT_18_POINT;

const TIME_LEN: usize = 8;
const SECONDARY_LEN: usize = 32;
/// Longest weather condition kept before formatting
const CONDITIONS_LEN: usize = 16;

/// Fixed size text buffer backing a text layer
#[derive(Debug, Clone)]
struct Label<const N: usize> {
    str_buf: [u8; N],
    len: usize,
}

impl<const N: usize> Label<N> {
    fn new(text: &str) -> Self {
        let mut label = Self {
            str_buf: [0; N],
            len: 0,
        };
        label.set(text);
        label
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.str_buf[..self.len]).unwrap_or_default()
    }

    /// Replace the text, cutting it at the buffer size
    fn set(&mut self, text: &str) {
        let text = truncate(text, N);
        self.str_buf[..text.len()].copy_from_slice(text.as_bytes());
        self.len = text.len();
    }

    /// Replace the text with the output of `show`. The old text is kept if
    /// formatting fails.
    fn show<F>(&mut self, show: F) -> Result<(), fmt::Error>
    where
        F: FnOnce(&mut [u8]) -> Result<&str, fmt::Error>,
    {
        let mut scratch = [0u8; N];
        let text = show(&mut scratch)?;
        let len = text.len();
        self.str_buf[..len].copy_from_slice(&scratch[..len]);
        self.len = len;
        Ok(())
    }
}

/// Longest prefix of `text` with at most `max_bytes` bytes, on a char boundary
fn truncate(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Longest prefix of `text` with at most `max_chars` characters
fn fit_columns(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Characters of `font` that fit the width of `layer`
fn columns(font: &MonoFont, layer: Layer) -> usize {
    let advance = font.character_size.width + font.character_spacing;
    (layer.bounds().size.width / advance) as usize
}

/// What changed after feeding an event into the face
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Update {
    /// Layers that need redrawing
    pub redraw: Layers,
    /// Settings changed and should be written to flash
    pub persisted: bool,
    /// The companion should be asked for fresh weather
    pub request_weather: bool,
}

/// Layers owned by a loaded window
#[derive(Debug)]
struct Window {
    /// Layers making up this window, in drawing order
    layers: Layers,
    /// Layers drawn out of date
    dirty: Layers,
}

impl Window {
    fn load(variant: Variant) -> Self {
        let mut layers = Layers::all();
        if !variant.has_route() {
            layers.remove(Layer::Route);
        }
        Self {
            layers,
            dirty: layers,
        }
    }
}

pub struct WatchFace {
    variant: Variant,
    hour_format: HourFormat,
    window: Option<Window>,
    time_label: Label<TIME_LEN>,
    secondary_label: Label<SECONDARY_LEN>,
    /// Day and minute of day of the last weather request
    weather_requested: Option<(NaiveDate, u32)>,
}

impl WatchFace {
    pub fn new(variant: Variant, hour_format: HourFormat) -> Self {
        Self {
            variant,
            hour_format,
            window: None,
            time_label: Label::new("00:00"),
            secondary_label: Label::new(variant.placeholder()),
            weather_requested: None,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn is_loaded(&self) -> bool {
        self.window.is_some()
    }

    /// Create the window layers. Everything is drawn on the next `draw`.
    pub fn load(&mut self) {
        self.window = Some(Window::load(self.variant));
    }

    /// Release the window layers
    pub fn unload(&mut self) {
        self.window = None;
    }

    pub fn time_text(&self) -> &str {
        self.time_label.as_str()
    }

    pub fn secondary_text(&self) -> &str {
        self.secondary_label.as_str()
    }

    /// Layers waiting to be drawn
    pub fn dirty(&self) -> Layers {
        self.window
            .as_ref()
            .map(|window| window.dirty)
            .unwrap_or_default()
    }

    /// Refresh the clock text for a new minute. Weather is requested at
    /// most once per minute.
    pub fn tick(&mut self, now: &NaiveDateTime) -> Update {
        let format = self.hour_format;
        let mut update = Update::default();

        if self
            .time_label
            .show(|buf| clock::format_time(now, format, buf))
            .is_ok()
        {
            update.redraw.insert(Layer::Time);
        }
        if self.variant.requests_weather() && clock::weather_due(now) {
            // A clock set inside the same minute ticks again
            let minute = Some((now.date(), now.hour() * 60 + now.minute()));
            update.request_weather = self.weather_requested != minute;
            self.weather_requested = minute;
        }

        self.mark(update.redraw);
        update
    }

    /// Apply an inbox message. Fields this variant does not know, or that
    /// carry the wrong type, are ignored.
    pub fn receive(
        &mut self,
        dict: &Dictionary<'_>,
        settings: &mut Settings,
    ) -> Result<Update, settings::Error> {
        let keys = self.variant.keys();
        let mut update = Update::default();

        if let Some(character) = dict.find(keys.character).and_then(Tuple::as_int) {
            update.persisted |= settings.write_int(PERSIST_CHARACTER, character)?;
            update.redraw.insert(Layer::Character);
        }

        if let Some(route) = keys
            .route
            .and_then(|key| dict.find(key))
            .and_then(Tuple::as_int)
        {
            update.persisted |= settings.write_int(PERSIST_ROUTE, route)?;
            update.redraw.insert(Layer::Route);
        }

        if let Some(steps) = keys
            .steps
            .and_then(|key| dict.find(key))
            .and_then(Tuple::as_int)
        {
            if self.set_secondary(format_args!("{}", steps)).is_ok() {
                update.redraw.insert(Layer::Secondary);
            }
        }

        let temperature = keys
            .temperature
            .and_then(|key| dict.find(key))
            .and_then(Tuple::as_int);
        let conditions = keys
            .conditions
            .and_then(|key| dict.find(key))
            .and_then(Tuple::as_str);
        if let (Some(temperature), Some(conditions)) = (temperature, conditions) {
            let conditions = truncate(conditions, CONDITIONS_LEN);
            if self
                .set_secondary(format_args!("{}C, {}", temperature, conditions))
                .is_ok()
            {
                update.redraw.insert(Layer::Secondary);
            }
        }

        self.mark(update.redraw);
        Ok(update)
    }

    /// Encode the outbound weather request into `buf`
    pub fn weather_request(&self, buf: &mut [u8]) -> Result<usize, message::Error> {
        let mut writer = DictionaryWriter::new(buf)?;
        writer.write_uint(KEY_REQUEST, 1)?;
        Ok(writer.finish())
    }

    /// Draw all out of date layers. Nothing is drawn while unloaded.
    pub fn draw<D>(&mut self, settings: &Settings, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let Some(window) = self.window.as_ref() else {
            return Ok(());
        };
        let dirty = window.dirty;

        for layer in dirty.iter() {
            self.draw_layer(layer, settings, target)?;
        }

        if let Some(window) = self.window.as_mut() {
            window.dirty = Layers::empty();
        }
        Ok(())
    }

    /// Mark every layer of a loaded window out of date
    pub fn invalidate(&mut self) {
        if let Some(window) = self.window.as_mut() {
            window.dirty = window.layers;
        }
    }

    fn mark(&mut self, layers: Layers) {
        if let Some(window) = self.window.as_mut() {
            for layer in layers.iter() {
                if window.layers.contains(layer) {
                    window.dirty.insert(layer);
                }
            }
        }
    }

    fn set_secondary(&mut self, args: fmt::Arguments) -> Result<(), fmt::Error> {
        self.secondary_label.show(|buf| format_no_std::show(buf, args))?;
        let max_chars = columns(SECONDARY_FONT, Layer::Secondary);
        self.secondary_label.len = fit_columns(self.secondary_label.as_str(), max_chars).len();
        Ok(())
    }

    fn draw_layer<D>(
        &self,
        layer: Layer,
        settings: &Settings,
        target: &mut D,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let bounds = layer.bounds();
        let mut clipped = target.clipped(&bounds);

        bounds.draw_styled(&PrimitiveStyle::with_fill(BACKGROUND_COLOR), &mut clipped)?;

        match layer {
            Layer::Background => draw_art(art::LINE, &bounds, &mut clipped),
            Layer::Character => {
                let character = Character::from_key(settings.read_int(PERSIST_CHARACTER));
                draw_art(character.art(), &bounds, &mut clipped)
            }
            Layer::Route => {
                let route = Route::from_key(settings.read_int(PERSIST_ROUTE));
                draw_art(route.art(), &bounds, &mut clipped)
            }
            Layer::Time => {
                draw_text(self.time_label.as_str(), TIME_FONT, &bounds, &mut clipped)
            }
            Layer::Secondary => draw_text(
                self.secondary_label.as_str(),
                SECONDARY_FONT,
                &bounds,
                &mut clipped,
            ),
        }
    }
}

/// Right aligned text, top of the layer
fn draw_text<D>(
    text: &str,
    font: &MonoFont,
    bounds: &Rectangle,
    target: &mut D,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let character_style = MonoTextStyle::new(font, INK_COLOR);
    let text_style = TextStyleBuilder::new()
        .alignment(Alignment::Right)
        .baseline(Baseline::Top)
        .build();
    let anchor = Point::new(
        bounds.top_left.x + bounds.size.width as i32 - 1,
        bounds.top_left.y,
    );

    Text::with_text_style(text, anchor, character_style, text_style).draw(target)?;
    Ok(())
}

fn draw_art<D>(art: Art, bounds: &Rectangle, target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let image = art.image();
    Image::new(&image, bounds.top_left).draw(&mut Ink {
        target,
        ink: INK_COLOR,
    })
}

/// Draws the set pixels of monochrome art in one color, leaving the rest
/// of the target untouched
struct Ink<'d, D> {
    target: &'d mut D,
    ink: Rgb565,
}

impl<D> Dimensions for Ink<'_, D>
where
    D: DrawTarget<Color = Rgb565>,
{
    fn bounding_box(&self) -> Rectangle {
        self.target.bounding_box()
    }
}

impl<D> DrawTarget for Ink<'_, D>
where
    D: DrawTarget<Color = Rgb565>,
{
    type Color = BinaryColor;
    type Error = D::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let ink = self.ink;
        self.target.draw_iter(
            pixels
                .into_iter()
                .filter(|Pixel(_, color)| color.is_on())
                .map(|Pixel(point, _)| Pixel(point, ink)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::{
        geometry::{OriginDimensions, Size},
        primitives::PointsIter,
    };

    use crate::layout::{SCREEN_H, SCREEN_W};

    /// In-memory 240x240 screen
    struct Canvas {
        pixels: Vec<Rgb565>,
        writes: usize,
    }

    impl Canvas {
        fn new() -> Self {
            Self {
                pixels: vec![Rgb565::RED; (SCREEN_W * SCREEN_H) as usize],
                writes: 0,
            }
        }

        fn get(&self, x: i32, y: i32) -> Rgb565 {
            self.pixels[(y as u32 * SCREEN_W + x as u32) as usize]
        }

        fn count_in(&self, area: &Rectangle, color: Rgb565) -> usize {
            area.points().filter(|p| self.get(p.x, p.y) == color).count()
        }

        fn snapshot(&self, area: &Rectangle) -> Vec<Rgb565> {
            area.points().map(|p| self.get(p.x, p.y)).collect()
        }
    }

    impl OriginDimensions for Canvas {
        fn size(&self) -> Size {
            Size::new(SCREEN_W, SCREEN_H)
        }
    }

    impl DrawTarget for Canvas {
        type Color = Rgb565;
        type Error = core::convert::Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(point, color) in pixels {
                let on_screen = (0..SCREEN_W as i32).contains(&point.x)
                    && (0..SCREEN_H as i32).contains(&point.y);
                assert!(on_screen, "pixel off screen: {:?}", point);
                self.pixels[(point.y as u32 * SCREEN_W + point.x as u32) as usize] = color;
                self.writes += 1;
            }
            Ok(())
        }
    }

    fn at(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 3)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn message(build: impl FnOnce(&mut DictionaryWriter)) -> ([u8; 64], usize) {
        let mut buf = [0u8; 64];
        let mut writer = DictionaryWriter::new(&mut buf).unwrap();
        build(&mut writer);
        let len = writer.finish();
        (buf, len)
    }

    fn set(layers: &[Layer]) -> Layers {
        layers.iter().copied().collect()
    }

    fn loaded(variant: Variant) -> WatchFace {
        let mut face = WatchFace::new(variant, HourFormat::H24);
        face.load();
        face
    }

    #[test]
    fn load_marks_everything_dirty() {
        let face = loaded(Variant::Walker);
        assert_eq!(face.dirty(), Layers::all());

        let face = loaded(Variant::Pedometer);
        assert!(!face.dirty().contains(Layer::Route));
        assert!(face.dirty().contains(Layer::Character));
    }

    #[test]
    fn unloaded_face_draws_nothing() {
        let mut face = WatchFace::new(Variant::Pedometer, HourFormat::H24);
        let mut canvas = Canvas::new();
        face.tick(&at(10, 0));
        face.draw(&Settings::new(), &mut canvas).unwrap();
        assert_eq!(canvas.writes, 0);
        // The time text still follows the clock
        assert_eq!(face.time_text(), "10:00");
    }

    #[test]
    fn first_draw_paints_every_layer() {
        let mut face = loaded(Variant::Walker);
        let mut canvas = Canvas::new();
        face.draw(&Settings::new(), &mut canvas).unwrap();

        for layer in Layer::ALL {
            let bounds = layer.bounds();
            assert_eq!(canvas.count_in(&bounds, Rgb565::RED), 0, "{:?} not drawn", layer);
            assert!(canvas.count_in(&bounds, INK_COLOR) > 0, "{:?} is blank", layer);
        }
        assert!(face.dirty().is_empty());

        // Nothing left to do
        let writes = canvas.writes;
        face.draw(&Settings::new(), &mut canvas).unwrap();
        assert_eq!(canvas.writes, writes);
    }

    #[test]
    fn tick_only_redraws_time() {
        let mut face = loaded(Variant::Pedometer);
        let mut canvas = Canvas::new();
        let settings = Settings::new();
        face.draw(&settings, &mut canvas).unwrap();

        let character = canvas.snapshot(&Layer::Character.bounds());
        let time = canvas.snapshot(&Layer::Time.bounds());

        let update = face.tick(&at(12, 34));
        assert_eq!(update.redraw, set(&[Layer::Time]));
        assert!(!update.request_weather);
        assert_eq!(face.time_text(), "12:34");

        face.draw(&settings, &mut canvas).unwrap();
        assert_eq!(canvas.snapshot(&Layer::Character.bounds()), character);
        assert_ne!(canvas.snapshot(&Layer::Time.bounds()), time);
    }

    #[test]
    fn twelve_hour_clock() {
        let mut face = WatchFace::new(Variant::Pedometer, HourFormat::H12);
        face.tick(&at(15, 7));
        assert_eq!(face.time_text(), "03:07");
    }

    #[test]
    fn weather_requested_on_half_hour() {
        let mut face = loaded(Variant::Weather);
        assert!(face.tick(&at(8, 30)).request_weather);
        assert!(!face.tick(&at(8, 31)).request_weather);

        assert!(face.tick(&at(9, 0)).request_weather);

        // Other variants never ask
        let mut face = loaded(Variant::Walker);
        assert!(!face.tick(&at(8, 30)).request_weather);
    }

    #[test]
    fn weather_requested_once_per_minute() {
        let mut face = loaded(Variant::Weather);
        assert!(face.tick(&at(8, 30)).request_weather);
        // Clock set again within the same minute
        let update = face.tick(&at(8, 30));
        assert!(!update.request_weather);
        assert!(update.redraw.contains(Layer::Time));

        assert!(face.tick(&at(9, 0)).request_weather);
        // Same minute on another day
        let tomorrow = at(9, 0) + chrono::TimeDelta::days(1);
        assert!(face.tick(&tomorrow).request_weather);
    }

    #[test]
    fn character_message_persists_and_redraws() {
        let mut face = loaded(Variant::Pedometer);
        let mut settings = Settings::new();
        let mut canvas = Canvas::new();
        face.draw(&settings, &mut canvas).unwrap();
        let pikachu = canvas.snapshot(&Layer::Character.bounds());

        let (buf, len) = message(|w| w.write_int(0, 4).unwrap());
        let dict = Dictionary::parse(&buf[..len]).unwrap();
        let update = face.receive(&dict, &mut settings).unwrap();

        assert!(update.persisted);
        assert_eq!(update.redraw, set(&[Layer::Character]));
        assert_eq!(settings.read_int(PERSIST_CHARACTER), 4);

        face.draw(&settings, &mut canvas).unwrap();
        assert_ne!(canvas.snapshot(&Layer::Character.bounds()), pikachu);

        // Same selection again: redrawn, but nothing new to persist
        let update = face.receive(&dict, &mut settings).unwrap();
        assert!(!update.persisted);
        assert!(update.redraw.contains(Layer::Character));
    }

    #[test]
    fn route_only_on_walker() {
        let (buf, len) = message(|w| w.write_int(1, 0).unwrap());
        let dict = Dictionary::parse(&buf[..len]).unwrap();

        let mut settings = Settings::new();
        let mut face = loaded(Variant::Walker);
        let update = face.receive(&dict, &mut settings).unwrap();
        assert!(update.redraw.contains(Layer::Route));
        assert!(settings.contains(PERSIST_ROUTE));

        // Key 1 is the step count on the pedometer
        let mut settings = Settings::new();
        let mut face = loaded(Variant::Pedometer);
        let update = face.receive(&dict, &mut settings).unwrap();
        assert!(!update.persisted);
        assert_eq!(update.redraw, set(&[Layer::Secondary]));
        assert_eq!(face.secondary_text(), "0");
    }

    #[test]
    fn steps_update_secondary() {
        let mut face = loaded(Variant::Walker);
        let mut settings = Settings::new();
        assert_eq!(face.secondary_text(), "0");

        let (buf, len) = message(|w| w.write_uint(2, 12_345).unwrap());
        let dict = Dictionary::parse(&buf[..len]).unwrap();
        let update = face.receive(&dict, &mut settings).unwrap();

        assert_eq!(face.secondary_text(), "12345");
        assert!(update.redraw.contains(Layer::Secondary));
        assert!(settings.is_empty());
    }

    #[test]
    fn weather_needs_both_fields() {
        let mut face = loaded(Variant::Weather);
        let mut settings = Settings::new();
        assert_eq!(face.secondary_text(), "Loading...");

        let (buf, len) = message(|w| w.write_int(1, 21).unwrap());
        let dict = Dictionary::parse(&buf[..len]).unwrap();
        let update = face.receive(&dict, &mut settings).unwrap();
        assert!(update.redraw.is_empty());
        assert_eq!(face.secondary_text(), "Loading...");

        let (buf, len) = message(|w| {
            w.write_int(1, -3).unwrap();
            w.write_cstr(2, "Snow").unwrap();
        });
        let dict = Dictionary::parse(&buf[..len]).unwrap();
        let update = face.receive(&dict, &mut settings).unwrap();
        assert!(update.redraw.contains(Layer::Secondary));
        assert_eq!(face.secondary_text(), "-3C, Snow");
    }

    #[test]
    fn malformed_fields_are_skipped() {
        let mut face = loaded(Variant::Weather);
        let mut settings = Settings::new();

        // Character as a string, temperature as a string
        let (buf, len) = message(|w| {
            w.write_cstr(0, "four").unwrap();
            w.write_cstr(1, "warm").unwrap();
            w.write_cstr(2, "Clear").unwrap();
        });
        let dict = Dictionary::parse(&buf[..len]).unwrap();
        let update = face.receive(&dict, &mut settings).unwrap();

        assert_eq!(update, Update::default());
        assert!(settings.is_empty());
    }

    #[test]
    fn long_conditions_fit_the_layer() {
        let mut face = loaded(Variant::Weather);
        let mut settings = Settings::new();

        let (buf, len) = message(|w| {
            w.write_int(1, 18).unwrap();
            w.write_cstr(2, "Thunderstorms with heavy rain").unwrap();
        });
        let dict = Dictionary::parse(&buf[..len]).unwrap();
        face.receive(&dict, &mut settings).unwrap();

        let text = face.secondary_text();
        assert!(text.starts_with("18C, Thun"));
        assert!(text.chars().count() <= columns(SECONDARY_FONT, Layer::Secondary));
    }

    #[test]
    fn weather_request_payload() {
        let face = WatchFace::new(Variant::Weather, HourFormat::H24);
        let mut buf = [0u8; 16];
        let len = face.weather_request(&mut buf).unwrap();

        let dict = Dictionary::parse(&buf[..len]).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.find(KEY_REQUEST).and_then(Tuple::as_int), Some(1));
    }

    #[test]
    fn unload_then_reload_redraws_all() {
        let mut face = loaded(Variant::Walker);
        let mut canvas = Canvas::new();
        face.draw(&Settings::new(), &mut canvas).unwrap();
        assert!(face.dirty().is_empty());

        face.unload();
        assert!(!face.is_loaded());
        assert!(face.dirty().is_empty());

        face.load();
        assert_eq!(face.dirty(), Layers::all());
    }

    #[test]
    fn label_truncates_on_char_boundary() {
        let label: Label<4> = Label::new("aé€");
        assert_eq!(label.as_str(), "aé");
        assert_eq!(fit_columns("abcdef", 3), "abc");
        assert_eq!(fit_columns("ab", 3), "ab");
    }
}
