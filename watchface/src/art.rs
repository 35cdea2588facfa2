//! Bitmap resources and the lookup tables selecting them
//!
//! All art is stored as 1 bit per pixel, MSB first, rows padded to a whole
//! byte. A set bit is ink.

use embedded_graphics::{geometry::Size, image::ImageRaw, pixelcolor::BinaryColor};

/// A monochrome bitmap compiled into flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Art {
    data: &'static [u8],
    size: Size,
}

impl Art {
    const fn new(data: &'static [u8], width: u32, height: u32) -> Self {
        Self {
            data,
            size: Size::new(width, height),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn image(&self) -> ImageRaw<'static, BinaryColor> {
        ImageRaw::new(self.data, self.size.width)
    }
}

pub const LINE: Art = Art::new(include_bytes!("../assets/line.raw"), 240, 2);

const PIKACHU: Art = Art::new(include_bytes!("../assets/pikachu.raw"), 96, 96);
const CHARMANDER: Art = Art::new(include_bytes!("../assets/charmander.raw"), 96, 96);
const ROUTE_TOWNS: Art = Art::new(include_bytes!("../assets/route_towns.raw"), 96, 56);

/// Character shown next to the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Character {
    Pikachu,
    Charmander,
}

impl Character {
    /// Look up the character for a persisted selection key.
    ///
    /// Unknown keys show Pikachu.
    pub fn from_key(key: i32) -> Self {
        match key {
            4 => Self::Charmander,
            _ => Self::Pikachu,
        }
    }

    pub fn art(&self) -> Art {
        match self {
            Self::Pikachu => PIKACHU,
            Self::Charmander => CHARMANDER,
        }
    }
}

/// Route scenery shown left of the character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    Towns,
}

impl Route {
    pub fn from_key(key: i32) -> Self {
        match key {
            0 => Self::Towns,
            _ => Self::Towns,
        }
    }

    pub fn art(&self) -> Art {
        match self {
            Self::Towns => ROUTE_TOWNS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_fits(art: Art) {
        let stride = (art.size().width as usize + 7) / 8;
        assert_eq!(art.data.len(), stride * art.size().height as usize);
    }

    #[test]
    fn bitmaps_match_their_size() {
        for art in [LINE, PIKACHU, CHARMANDER, ROUTE_TOWNS] {
            assert_fits(art);
        }
    }

    #[test]
    fn character_lookup() {
        assert_eq!(Character::from_key(0), Character::Pikachu);
        assert_eq!(Character::from_key(4), Character::Charmander);
        assert_eq!(Character::from_key(-1), Character::Pikachu);
        assert_eq!(Character::from_key(5), Character::Pikachu);
    }

    #[test]
    fn route_lookup_defaults_to_towns() {
        assert_eq!(Route::from_key(0), Route::Towns);
        assert_eq!(Route::from_key(9), Route::Towns);
    }
}
