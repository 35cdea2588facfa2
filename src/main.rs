#![no_std]
#![no_main]

mod peripherals;
mod system;

// Panic handler and debugging
use defmt::unwrap;

use defmt_rtt as _;
use panic_probe as _;

// Device
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::{
    bind_interrupts,
    gpio::{Input, Level, Output, OutputDrive, Pull},
    interrupt::{self, InterruptExt, Priority},
    peripherals::SPI2,
    spim,
};
use embassy_sync::{blocking_mutex::raw::ThreadModeRawMutex, channel::Channel, signal::Signal};
use embassy_time::{Duration, Timer};
use nrf_softdevice::Softdevice;
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    SPIM2_SPIS2_SPI2 => spim::InterruptHandler<SPI2>;
});

// Crate
use peripherals::{
    backlight::{Backlight, MAX_BRIGHTNESS},
    button::Button,
    display::Display,
};
use system::{
    bluetooth::{self, Event, InboxMessage, OutboxMessage, Server, OUTBOX_LEN},
    config,
    storage::SettingsStore,
    time::{TimeManager, TimeReference},
};
use watchface::{clock, Dictionary, HourFormat, Settings, Variant, WatchFace};

// Others
use chrono::{NaiveDateTime, Timelike};

// Include current UTC epoch at compile time
include!(concat!(env!("OUT_DIR"), "/utc.rs"));
const TIMEZONE: i32 = 1 * 3_600;

#[cfg(feature = "weather")]
const VARIANT: Variant = Variant::Weather;
#[cfg(all(feature = "pedometer", not(feature = "weather")))]
const VARIANT: Variant = Variant::Pedometer;
#[cfg(not(any(feature = "pedometer", feature = "weather")))]
const VARIANT: Variant = Variant::Walker;

const HOUR_FORMAT: HourFormat = HourFormat::H24;

/// Backlight level after boot
const BRIGHTNESS: u8 = 2;

// Communication channels
static INBOX: Channel<ThreadModeRawMutex, InboxMessage, 4> = Channel::new();
static INCREASE_BRIGHTNESS: Signal<ThreadModeRawMutex, bool> = Signal::new();
static PERSIST: Signal<ThreadModeRawMutex, Settings> = Signal::new();
static SET_TIME: Signal<ThreadModeRawMutex, TimeReference> = Signal::new();
static TIME: Signal<ThreadModeRawMutex, NaiveDateTime> = Signal::new();
static WEATHER_REQUEST: Signal<ThreadModeRawMutex, OutboxMessage> = Signal::new();

static SERVER: StaticCell<Server> = StaticCell::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Advertise, then serve the companion app until it disconnects
#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice, server: &'static Server) {
    loop {
        let conn = match bluetooth::advertise(sd).await {
            Ok(conn) => conn,
            Err(e) => {
                defmt::warn!("Advertising failed: {}", e);
                Timer::after(Duration::from_secs(1)).await;
                continue;
            }
        };
        defmt::info!("Companion connected");

        let gatt = bluetooth::serve(&conn, server, |event| match event {
            Event::Inbox(message) => {
                if INBOX.try_send(message).is_err() {
                    defmt::warn!("Inbox full, dropped message");
                }
            }
            Event::CurrentTime(bytes) => match TimeReference::from_cts_bytes(&bytes) {
                Some(reference) => SET_TIME.signal(reference),
                None => defmt::warn!("Ignored invalid time {}", bytes),
            },
        });

        let outbox = async {
            loop {
                let message = WEATHER_REQUEST.wait().await;
                match bluetooth::send(&conn, server, &message) {
                    Ok(()) => defmt::info!("Requested weather"),
                    Err(e) => defmt::warn!("Sending weather request failed: {}", e),
                }
            }
        };

        if let Either::First(_) = select(gatt, outbox).await {
            defmt::info!("Companion disconnected");
        }
    }
}

/// Signal the time at boot, on every full minute and whenever the phone
/// sets the clock
#[embassy_executor::task]
async fn clock_task(mut time: TimeManager) {
    loop {
        let now = time.now();
        TIME.signal(now);

        let next_minute = Timer::after(Duration::from_millis(clock::until_next_minute(&now)));
        if let Either::Second(reference) = select(next_minute, SET_TIME.wait()).await {
            defmt::info!("Clock set by companion");
            time.set_time(reference);
        }
    }
}

/// Owns the watchface: applies ticks and inbox messages, then redraws
#[embassy_executor::task]
async fn face_task(mut display: Display<'static, SPI2>, mut settings: Settings) {
    let mut face = WatchFace::new(VARIANT, HOUR_FORMAT);
    face.load();
    defmt::info!("Watchface loaded: {}", face.variant());

    loop {
        match select(TIME.wait(), INBOX.receive()).await {
            Either::First(time) => {
                defmt::debug!("Tick {}:{}", time.hour(), time.minute());
                let update = face.tick(&time);

                if update.request_weather {
                    let mut buf = [0u8; OUTBOX_LEN];
                    match face.weather_request(&mut buf) {
                        Ok(len) => {
                            if let Ok(message) = OutboxMessage::from_slice(&buf[..len]) {
                                WEATHER_REQUEST.signal(message);
                            } else {
                                defmt::warn!("Weather request does not fit the outbox");
                            }
                        }
                        Err(e) => defmt::warn!("Encoding weather request failed: {}", e),
                    }
                }
            }
            Either::Second(message) => {
                let dict = match Dictionary::parse(&message) {
                    Ok(dict) => dict,
                    Err(e) => {
                        defmt::warn!("Dropped inbound message: {}", e);
                        continue;
                    }
                };

                match face.receive(&dict, &mut settings) {
                    Ok(update) => {
                        defmt::info!("Inbox message applied: {}", update);
                        if update.persisted {
                            PERSIST.signal(settings.clone());
                        }
                    }
                    Err(e) => defmt::warn!("Storing selection failed: {}", e),
                }
            }
        }

        if let Err(e) = display.render(&mut face, &settings) {
            defmt::warn!("Drawing watchface failed: {}", e);
            face.invalidate();
        }
    }
}

/// Write settings to flash whenever they change
#[embassy_executor::task]
async fn storage_task(mut store: SettingsStore) {
    loop {
        let settings = PERSIST.wait().await;
        if let Err(e) = store.save(&settings).await {
            defmt::warn!("Saving settings failed: {}", e);
        }
    }
}

/// Polls the button state every 10ms
#[embassy_executor::task]
async fn poll_button(mut button: Button<'static>) {
    loop {
        if button.pressed().await {
            INCREASE_BRIGHTNESS.signal(true);
        }

        // Re-schedule the timer interrupt in 10ms
        Timer::after(Duration::from_millis(10)).await;
    }
}

/// Update backlight brightness
#[embassy_executor::task]
async fn update_brightness(mut backlight: Backlight<'static>) {
    loop {
        if INCREASE_BRIGHTNESS.wait().await {
            if backlight.get_brightness() < MAX_BRIGHTNESS {
                if let Err(e) = backlight.brighter() {
                    defmt::warn!("Backlight: {}", e);
                }
            } else {
                backlight.off();
            }
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(config::peripherals());
    defmt::info!("Initializing");

    // Initialize Backlight
    let backlight = unwrap!(Backlight::init(
        Output::new(p.P0_14, Level::High, OutputDrive::Standard),
        Output::new(p.P0_22, Level::High, OutputDrive::Standard),
        Output::new(p.P0_23, Level::High, OutputDrive::Standard),
        BRIGHTNESS,
    ));

    // Initialize Button
    let button = Button::init(
        Input::new(p.P0_13, Pull::None),
        Output::new(p.P0_15, Level::Low, OutputDrive::Standard),
    );

    // Initialize SPI
    let mut spim_config = spim::Config::default();
    // Use SPI at 8MHz (the fastest clock available on the nRF52832),
    // otherwise refreshing will be super slow.
    spim_config.frequency = spim::Frequency::M8;
    // SPI must be used in mode 3. Mode 0 (the default) won't work.
    spim_config.mode = spim::MODE_3;

    // Priorities 0, 1 and 4 belong to the SoftDevice
    interrupt::SPIM2_SPIS2_SPI2.set_priority(Priority::P3);
    let spim = spim::Spim::new(p.SPI2, Irqs, p.P0_02, p.P0_04, p.P0_03, spim_config);

    // Initialize LCD
    let display = unwrap!(Display::init(
        spim,
        Output::new(p.P0_25, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_18, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_26, Level::Low, OutputDrive::Standard),
    ));

    // Initialize Bluetooth
    let sd = Softdevice::enable(&config::softdevice());
    let server = SERVER.init(unwrap!(Server::new(sd)));
    unwrap!(spawner.spawn(softdevice_task(sd)));

    // Restore persisted settings
    let mut store = SettingsStore::new(nrf_softdevice::Flash::take(sd));
    let settings = store.load().await;

    // Start the clock from the build time until a phone sets it
    let reference = unwrap!(TimeReference::from_epoch(UTC_EPOCH, TIMEZONE));

    defmt::info!("Initialization finished");

    // Schedule tasks
    unwrap!(spawner.spawn(ble_task(sd, server)));
    unwrap!(spawner.spawn(clock_task(TimeManager::new(reference))));
    unwrap!(spawner.spawn(face_task(display, settings)));
    unwrap!(spawner.spawn(storage_task(store)));
    unwrap!(spawner.spawn(poll_button(button)));
    unwrap!(spawner.spawn(update_brightness(backlight)));
}
