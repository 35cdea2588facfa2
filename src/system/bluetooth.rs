//! Bluetooth module
//!
//! The companion app talks to the watch through two GATT services: the
//! message service carries inbox and outbox dictionaries, the Current Time
//! Service sets the clock.

use heapless::Vec;
use nrf_softdevice::ble::{
    advertisement_builder::{
        Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
    },
    gatt_server, peripheral, Connection,
};
use nrf_softdevice::Softdevice;

use super::time::CTS_LEN;

/// Largest inbox dictionary in a single write
pub const INBOX_LEN: usize = 64;
/// Largest outbox dictionary
pub const OUTBOX_LEN: usize = 16;

pub type InboxMessage = Vec<u8, INBOX_LEN>;
pub type OutboxMessage = Vec<u8, OUTBOX_LEN>;

/// Message service UUID, 8e3a0001-5c4f-4d3e-9a8b-2f1e0d7c6b5a, in advertising
/// (little endian) order
const MESSAGE_SERVICE_UUID: [u8; 16] = [
    0x5a, 0x6b, 0x7c, 0x0d, 0x1e, 0x2f, 0x8b, 0x9a, 0x3e, 0x4d, 0x4f, 0x5c, 0x01, 0x00, 0x3a, 0x8e,
];

pub static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .full_name("PineWalker")
    .build();

pub static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .services_128(ServiceList::Complete, &[MESSAGE_SERVICE_UUID])
    .build();

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub message: MessageService,
    pub cts: CurrentTimeService,
}

#[nrf_softdevice::gatt_service(uuid = "8e3a0001-5c4f-4d3e-9a8b-2f1e0d7c6b5a")]
pub struct MessageService {
    /// Dictionaries written by the phone
    #[characteristic(uuid = "8e3a0002-5c4f-4d3e-9a8b-2f1e0d7c6b5a", write)]
    pub inbox: Vec<u8, 64>,
    /// Dictionaries sent to the phone
    #[characteristic(uuid = "8e3a0003-5c4f-4d3e-9a8b-2f1e0d7c6b5a", read, notify)]
    pub outbox: Vec<u8, 16>,
}

#[nrf_softdevice::gatt_service(uuid = "1805")]
pub struct CurrentTimeService {
    #[characteristic(uuid = "2a2b", read, write)]
    pub current_time: [u8; CTS_LEN],
}

/// Events the connection hands to the rest of the firmware
pub enum Event {
    Inbox(InboxMessage),
    CurrentTime([u8; CTS_LEN]),
}

/// Advertise until a phone connects
pub async fn advertise(sd: &Softdevice) -> Result<Connection, peripheral::AdvertiseError> {
    let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
        adv_data: &ADV_DATA,
        scan_data: &SCAN_DATA,
    };
    let config = peripheral::Config::default();
    peripheral::advertise_connectable(sd, adv, &config).await
}

/// Serve GATT requests on `conn` until it is dropped
pub async fn serve<F>(
    conn: &Connection,
    server: &Server,
    mut on_event: F,
) -> gatt_server::DisconnectedError
where
    F: FnMut(Event),
{
    gatt_server::run(conn, server, |e| match e {
        ServerEvent::Message(MessageServiceEvent::InboxWrite(bytes)) => {
            on_event(Event::Inbox(bytes));
        }
        ServerEvent::Message(MessageServiceEvent::OutboxCccdWrite { notifications }) => {
            defmt::info!("Outbox notifications: {}", notifications);
        }
        ServerEvent::Cts(CurrentTimeServiceEvent::CurrentTimeWrite(bytes)) => {
            on_event(Event::CurrentTime(bytes));
        }
    })
    .await
}

/// Notify the phone with an outbox dictionary
pub fn send(
    conn: &Connection,
    server: &Server,
    message: &OutboxMessage,
) -> Result<(), gatt_server::NotifyValueError> {
    server.message.outbox_notify(conn, message)
}
