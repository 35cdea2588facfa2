//! Layer geometry for the 240x240 screen

use embedded_graphics::{
    geometry::{Point, Size},
    primitives::Rectangle,
};

pub const SCREEN_W: u32 = 240;
pub const SCREEN_H: u32 = 240;

/// Y coordinate of the background line
const LINE_Y: i32 = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Layer {
    Background,
    Character,
    Route,
    Time,
    Secondary,
}

impl Layer {
    pub const ALL: [Layer; 5] = [
        Layer::Background,
        Layer::Route,
        Layer::Character,
        Layer::Time,
        Layer::Secondary,
    ];

    pub fn bounds(&self) -> Rectangle {
        match self {
            Self::Background => Rectangle::new(Point::new(0, LINE_Y), Size::new(SCREEN_W, 2)),
            Self::Character => Rectangle::new(Point::new(132, LINE_Y - 96), Size::new(96, 96)),
            Self::Route => Rectangle::new(Point::new(12, LINE_Y - 56), Size::new(96, 56)),
            Self::Time => Rectangle::new(Point::new(0, 56), Size::new(120, 40)),
            Self::Secondary => Rectangle::new(Point::new(96, LINE_Y + 8), Size::new(132, 32)),
        }
    }

    const fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

/// A set of layers, used to track what needs redrawing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layers(u8);

impl Layers {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Layer::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, layer: Layer) {
        self.0 |= layer.bit();
    }

    pub fn remove(&mut self, layer: Layer) {
        self.0 &= !layer.bit();
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.0 & layer.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Layers in this set, in drawing order
    pub fn iter(self) -> impl Iterator<Item = Layer> {
        Layer::ALL.into_iter().filter(move |layer| self.contains(*layer))
    }
}

impl FromIterator<Layer> for Layers {
    fn from_iter<I: IntoIterator<Item = Layer>>(iter: I) -> Self {
        let mut layers = Self::empty();
        for layer in iter {
            layers.insert(layer);
        }
        layers
    }
}
