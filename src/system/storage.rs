//! Persisted settings in internal flash
//!
//! The settings record occupies the last flash page. All access goes through
//! the SoftDevice so flash operations do not disturb the radio.

use embedded_storage_async::nor_flash::{NorFlash, ReadNorFlash};
use nrf_softdevice::{Flash, FlashError};
use watchface::settings::{self, Settings, RECORD_LEN};

/// Start of the settings page, kept out of the application by `memory.x`
const SETTINGS_PAGE: u32 = 0x7_F000;

/// Flash writes must come from word aligned memory
#[repr(align(4))]
struct Record([u8; RECORD_LEN]);

pub struct SettingsStore {
    flash: Flash,
}

impl SettingsStore {
    pub fn new(flash: Flash) -> Self {
        Self { flash }
    }

    /// Read the stored settings. A blank or damaged page yields empty
    /// settings.
    pub async fn load(&mut self) -> Settings {
        let mut record = Record([0; RECORD_LEN]);
        if let Err(e) = self.flash.read(SETTINGS_PAGE, &mut record.0).await {
            defmt::warn!("Reading settings failed: {}", defmt::Debug2Format(&e));
            return Settings::new();
        }

        match Settings::decode(&record.0) {
            Ok(settings) => {
                defmt::info!("Loaded {} settings", settings.len());
                settings
            }
            Err(e) => {
                defmt::info!("No stored settings ({})", e);
                Settings::new()
            }
        }
    }

    /// Replace the stored record with `settings`
    pub async fn save(&mut self, settings: &Settings) -> Result<(), Error> {
        let mut record = Record([0xff; RECORD_LEN]);
        let len = settings.encode(&mut record.0)?;

        self.flash
            .erase(SETTINGS_PAGE, SETTINGS_PAGE + Flash::ERASE_SIZE as u32)
            .await?;
        self.flash.write(SETTINGS_PAGE, &record.0[..len]).await?;

        defmt::debug!("Saved {} bytes of settings", len);
        Ok(())
    }
}

#[derive(Debug)]
pub enum Error {
    Encode(settings::Error),
    Flash(FlashError),
}

impl From<settings::Error> for Error {
    fn from(e: settings::Error) -> Self {
        Self::Encode(e)
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Encode(e) => defmt::write!(f, "encode: {}", e),
            Self::Flash(e) => defmt::write!(f, "flash: {}", defmt::Debug2Format(e)),
        }
    }
}
