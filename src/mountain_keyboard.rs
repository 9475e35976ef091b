//! Mountain keyboard RGB control.
//!
//! Every command is a single 64 byte output report starting with report ID 0. Custom per-LED
//! colors are streamed as a start packet, numbered data packets and three confirmations.

use std::thread;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use hidapi::{HidApi, HidDevice};

use crate::controller::HidTransport;
use crate::error::Error;
use crate::Rgb;

pub const VENDOR_ID: u16 = 0x3282;
pub const PRODUCT_ID: u16 = 0x0001;

/// Start of the vendor-defined usage pages carrying the lighting interface.
const VENDOR_USAGE_PAGE: u16 = 0xff00;

pub const PACKET_SIZE: usize = 64;
const HEADER_SIZE: usize = 8;

/// Color bytes carried by one custom color packet.
pub const MAX_PAYLOAD_SIZE: usize = PACKET_SIZE - HEADER_SIZE;

// Command and message type bytes. Unlike the report offsets they are written to, these values
// are not confirmed against a hardware capture yet.
const SEND_CMD: u8 = 0x14;
const SAVE_CMD: u8 = 0x15;
const SAVE_MAGIC: u8 = 0x04;
const SELECT_MODE_CMD: u8 = 0x2d;
const COLOR_DATA_CMD: u8 = 0x2c;
const COLOR_EDGE_CMD: u8 = 0x2f;
const CONFIRM_CMD: u8 = 0x2e;

const MSG_OFF: u8 = 0x00;
const MSG_STATIC: u8 = 0x01;
const MSG_WAVE: u8 = 0x02;
const MSG_TORNADO: u8 = 0x03;
const MSG_BREATHING: u8 = 0x04;
const MSG_MATRIX: u8 = 0x05;
const MSG_REACTIVE: u8 = 0x06;
const MSG_CUSTOM: u8 = 0x07;

/// Time the firmware needs to switch or store a mode slot.
const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Delay after every other report.
const PACKET_DELAY: Duration = Duration::from_millis(10);

/// Colors used by an effect.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum ColorMode {
    Single(Rgb),
    Dual(Rgb, Rgb),
    Rainbow,
}

impl ColorMode {
    /// Primary color, black for rainbow effects.
    fn first(&self) -> Rgb {
        match self {
            Self::Single(color) | Self::Dual(color, _) => *color,
            Self::Rainbow => Rgb::default(),
        }
    }

    /// Secondary color, black unless two colors are used.
    fn second(&self) -> Rgb {
        match self {
            Self::Dual(_, color) => *color,
            _ => Rgb::default(),
        }
    }
}

impl Default for ColorMode {
    fn default() -> Self {
        Self::Single(Rgb::default())
    }
}

/// Effect parameters.
///
/// Effects only read the fields they support, everything else is left zeroed in the report.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct ColorSetup {
    pub colors: ColorMode,
    pub speed: u8,
    pub brightness: u8,
    pub direction: u8,
}

/// Mountain keyboard RGB controller.
pub struct MountainKeyboard<T: HidTransport = HidDevice> {
    device: T,
    path: String,
}

impl MountainKeyboard<HidDevice> {
    /// Open the first connected keyboard.
    pub fn open(api: &HidApi) -> Result<Self, Error> {
        let info = api
            .device_list()
            .filter(|info| info.vendor_id() == VENDOR_ID && info.product_id() == PRODUCT_ID)
            .max_by_key(|info| info.usage_page() >= VENDOR_USAGE_PAGE)
            .ok_or(Error::DeviceNotFound("Mountain keyboard"))?;

        let path = info.path().to_string_lossy().into_owned();
        let device = info.open_device(api)?;

        log::debug!("Opened Mountain keyboard at {}", path);

        Ok(Self::new(device, path))
    }
}

impl<T: HidTransport> MountainKeyboard<T> {
    pub fn new(device: T, path: impl Into<String>) -> Self {
        Self { device, path: path.into() }
    }

    /// Device location.
    pub fn location(&self) -> String {
        format!("HID: {}", self.path)
    }

    /// USB serial number, empty if it cannot be read.
    pub fn serial(&self) -> String {
        match self.device.serial_number() {
            Ok(serial) => serial.unwrap_or_default(),
            Err(err) => {
                log::debug!("Unable to read serial number: {}", err);
                String::new()
            },
        }
    }

    /// Activate a mode slot.
    pub fn select_mode(&self, mode: u8) {
        self.send(&select_mode_packet(mode), SETTLE_DELAY);
    }

    /// Persist the current effect into a mode slot.
    pub fn save_data(&self, mode: u8) {
        self.send(&save_packet(mode), SETTLE_DELAY);
    }

    pub fn send_off(&self) {
        self.send(&off_packet(), PACKET_DELAY);
    }

    pub fn send_static(&self, setup: &ColorSetup) {
        self.send(&static_packet(setup), PACKET_DELAY);
    }

    pub fn send_wave(&self, setup: &ColorSetup) {
        self.send(&wave_packet(setup), PACKET_DELAY);
    }

    pub fn send_tornado(&self, setup: &ColorSetup) {
        self.send(&tornado_packet(setup), PACKET_DELAY);
    }

    pub fn send_breathing(&self, setup: &ColorSetup) {
        self.send(&breathing_packet(setup), PACKET_DELAY);
    }

    pub fn send_matrix(&self, setup: &ColorSetup) {
        self.send(&dual_color_packet(MSG_MATRIX, setup), PACKET_DELAY);
    }

    pub fn send_reactive(&self, setup: &ColorSetup) {
        self.send(&dual_color_packet(MSG_REACTIVE, setup), PACKET_DELAY);
    }

    /// Stream custom key colors.
    pub fn send_direct_color(&self, brightness: u8, data: &[u8]) {
        self.stream(brightness, data, |pkt_no, chunk| color_packet(pkt_no, brightness, chunk));
    }

    /// Stream custom edge lighting colors.
    pub fn send_direct_color_edge(&self, brightness: u8, data: &[u8]) {
        self.stream(brightness, data, edge_packet);
    }

    fn stream<F>(&self, brightness: u8, data: &[u8], packet: F)
    where
        F: Fn(u8, &[u8]) -> Option<Bytes>,
    {
        self.send(&start_packet(brightness), PACKET_DELAY);

        // Sequence numbers wrap after 256 packets.
        for (i, chunk) in data.chunks(MAX_PAYLOAD_SIZE).enumerate() {
            let pkt_no = i as u8;
            match packet(pkt_no, chunk) {
                Some(packet) => self.send(&packet, PACKET_DELAY),
                None => log::warn!("Skipping oversized color packet {}", pkt_no),
            }
        }

        for marker in 0..3 {
            self.send(&finish_packet(marker), PACKET_DELAY);
        }
    }

    /// Write a report and give the firmware time to process it.
    fn send(&self, packet: &[u8], delay: Duration) {
        log::trace!("HID write {:02x?}", packet);
        if let Err(err) = self.device.write(packet) {
            log::warn!("HID write to {} failed: {}", self.path, err);
        }

        thread::sleep(delay);
    }
}

/// Fixed-size report under construction.
struct Packet([u8; PACKET_SIZE]);

impl Packet {
    fn new(command: u8, subcommand: u8) -> Self {
        let mut packet = Self([0; PACKET_SIZE]);
        packet.0[0x01] = command;
        packet.0[0x02] = subcommand;
        packet
    }

    /// Effect report using the given message type.
    fn effect(msg: u8) -> Self {
        let mut packet = Self::new(SEND_CMD, COLOR_DATA_CMD);
        packet.0[0x03] = msg;
        packet
    }

    fn set(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.0[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    fn color(self, offset: usize, color: Rgb) -> Self {
        self.set(offset, &[color.r, color.g, color.b])
    }

    fn freeze(self) -> Bytes {
        Bytes::copy_from_slice(&self.0)
    }
}

fn select_mode_packet(mode: u8) -> Bytes {
    Packet::new(SEND_CMD, SELECT_MODE_CMD).set(0x05, &[0x01, mode]).freeze()
}

fn save_packet(mode: u8) -> Bytes {
    Packet::new(SAVE_CMD, SAVE_MAGIC).set(0x05, &[mode]).freeze()
}

fn off_packet() -> Bytes {
    Packet::effect(MSG_OFF).set(0x05, &[0xff, 0x64, 0xff, 0xff, 0xff]).freeze()
}

fn static_packet(setup: &ColorSetup) -> Bytes {
    Packet::effect(MSG_STATIC)
        .set(0x05, &[0xff, setup.brightness, 0x00, 0xff, 0xff])
        .color(0x0a, setup.colors.first())
        .freeze()
}

fn wave_packet(setup: &ColorSetup) -> Bytes {
    let packet = sweep_packet(MSG_WAVE, setup);

    match setup.colors {
        ColorMode::Dual(first, second) => packet
            .set(0x07, &[0x00])
            .set(0x09, &[0x02, 0x04, 0x19])
            .color(0x0c, first)
            .set(0x0f, &[0x32])
            .color(0x10, second)
            .set(0x13, &[0x4b])
            .color(0x14, first)
            .set(0x17, &[0x64])
            .color(0x18, second)
            .freeze(),
        _ => sweep_colors(packet, setup.colors).freeze(),
    }
}

fn tornado_packet(setup: &ColorSetup) -> Bytes {
    sweep_colors(sweep_packet(MSG_TORNADO, setup), setup.colors).freeze()
}

/// Common header of the directional effects.
fn sweep_packet(msg: u8, setup: &ColorSetup) -> Packet {
    Packet::effect(msg).set(0x05, &[setup.speed, setup.brightness]).set(0x08, &[setup.direction])
}

/// Single color and rainbow layout shared by the directional effects.
fn sweep_colors(packet: Packet, colors: ColorMode) -> Packet {
    match colors {
        ColorMode::Single(color) => packet
            .set(0x07, &[0x00])
            .set(0x09, &[0x00, 0x01, 0x64])
            .color(0x0c, color)
            .set(0x0f, &[0xff]),
        ColorMode::Rainbow => {
            packet.set(0x07, &[0x02]).set(0x09, &[0x02]).set(0x0b, &[0xff]).set(0x0f, &[0xff])
        },
        ColorMode::Dual(..) => packet,
    }
}

fn breathing_packet(setup: &ColorSetup) -> Bytes {
    let packet = Packet::effect(MSG_BREATHING).set(0x05, &[setup.speed, setup.brightness]);

    let packet = match setup.colors {
        ColorMode::Dual(first, second) => {
            packet.set(0x07, &[0x10, 0xff, 0xff]).color(0x0a, first).color(0x0d, second)
        },
        ColorMode::Single(color) => packet.set(0x07, &[0x00, 0xff, 0xff]).color(0x0a, color),
        ColorMode::Rainbow => packet.set(0x07, &[0x02, 0xff, 0xff]),
    };

    packet.freeze()
}

/// Layout of the matrix and reactive effects.
fn dual_color_packet(msg: u8, setup: &ColorSetup) -> Bytes {
    Packet::effect(msg)
        .set(0x05, &[setup.speed, setup.brightness, 0x00, 0xff, 0xff])
        .color(0x0a, setup.colors.first())
        .color(0x13, setup.colors.second())
        .freeze()
}

fn start_packet(brightness: u8) -> Bytes {
    let mut packet = Packet([0xff; PACKET_SIZE]);
    packet.0[0x00] = 0x00;
    packet.set(0x01, &[SEND_CMD, COLOR_DATA_CMD, MSG_CUSTOM, 0x00]).set(0x06, &[brightness]).freeze()
}

/// Custom key color packet, `None` if the chunk does not fit.
fn color_packet(pkt_no: u8, brightness: u8, chunk: &[u8]) -> Option<Bytes> {
    let header = [0x00, SEND_CMD, COLOR_DATA_CMD, 0x00, 0x01, pkt_no, brightness, 0x00];
    payload_packet(header, chunk)
}

/// Custom edge color packet, `None` if the chunk does not fit.
fn edge_packet(pkt_no: u8, chunk: &[u8]) -> Option<Bytes> {
    let header = [0x00, SEND_CMD, COLOR_EDGE_CMD, 0x0a, 0x00, pkt_no, 0xff, 0x00];
    payload_packet(header, chunk)
}

fn payload_packet(header: [u8; HEADER_SIZE], chunk: &[u8]) -> Option<Bytes> {
    if chunk.len() > MAX_PAYLOAD_SIZE {
        return None;
    }

    let mut buf = BytesMut::with_capacity(PACKET_SIZE);
    buf.put_slice(&header);
    buf.put_slice(chunk);

    // Zero padding for the last chunk.
    buf.put_bytes(0, MAX_PAYLOAD_SIZE - chunk.len());

    Some(buf.freeze())
}

fn finish_packet(marker: u8) -> Bytes {
    Packet::new(SEND_CMD, CONFIRM_CMD).set(0x03, &[marker]).freeze()
}
