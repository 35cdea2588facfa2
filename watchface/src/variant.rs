//! Watchface variants and the inbox keys each of them reads

/// Inbox key holding the character selection, shared by all variants
pub const KEY_CHARACTER: u32 = 0;

/// Inbox key of the outbound weather request
pub const KEY_REQUEST: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// Character and a step counter
    Pedometer,
    /// Character, route art and a step counter
    Walker,
    /// Character and the current weather
    Weather,
}

/// Inbox keys understood by a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keys {
    pub character: u32,
    pub route: Option<u32>,
    pub steps: Option<u32>,
    pub temperature: Option<u32>,
    pub conditions: Option<u32>,
}

impl Variant {
    /// Select a variant by index, falling back to [`Variant::Pedometer`].
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => Self::Walker,
            2 => Self::Weather,
            _ => Self::Pedometer,
        }
    }

    pub fn keys(&self) -> Keys {
        let none = Keys {
            character: KEY_CHARACTER,
            route: None,
            steps: None,
            temperature: None,
            conditions: None,
        };

        match self {
            Self::Pedometer => Keys {
                steps: Some(1),
                ..none
            },
            Self::Walker => Keys {
                route: Some(1),
                steps: Some(2),
                ..none
            },
            Self::Weather => Keys {
                temperature: Some(1),
                conditions: Some(2),
                ..none
            },
        }
    }

    /// Whether the route layer is part of this face
    pub fn has_route(&self) -> bool {
        self.keys().route.is_some()
    }

    /// Whether this face asks the companion for weather every 30 minutes
    pub fn requests_weather(&self) -> bool {
        matches!(self, Self::Weather)
    }

    /// Text shown in the secondary layer before the first message arrives
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::Weather => "Loading...",
            _ => "0",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_do_not_collide() {
        for variant in [Variant::Pedometer, Variant::Walker, Variant::Weather] {
            let keys = variant.keys();
            let used = [
                Some(keys.character),
                keys.route,
                keys.steps,
                keys.temperature,
                keys.conditions,
            ];
            let used: Vec<u32> = used.into_iter().flatten().collect();
            for (i, key) in used.iter().enumerate() {
                assert!(!used[i + 1..].contains(key), "{:?} reuses key {}", variant, key);
            }
        }
    }

    #[test]
    fn only_walker_has_route() {
        assert!(!Variant::Pedometer.has_route());
        assert!(Variant::Walker.has_route());
        assert!(!Variant::Weather.has_route());
    }

    #[test]
    fn unknown_index_falls_back() {
        assert_eq!(Variant::from_index(2), Variant::Weather);
        assert_eq!(Variant::from_index(42), Variant::Pedometer);
    }
}
