//! Integration tests for the firmware-driven chips
//!
//! Firmware files live in per-test scratch directories, which also hold the
//! staleness sidecars. They cover:
//! - OR51132 split-image upload, handshake and version readback
//! - Firmware staleness and family switches
//! - Lock polling and signal measurement
//! - XC5000 byte-code upload, register programming and source selection
//! - NXT2004 checksummed upload, microcontroller start and signal readout
//! - S5H1411 register tables, receiver switching and sleep on drop
//! - XC3028 section selection, scan-code tables and tuning

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tuner_chips::or51132::{QAM_FIRMWARE_KEY, VSB_FIRMWARE_KEY};
use tuner_chips::s5h1411::{BoardConfig, IfFrequency, OutputClock};
use tuner_chips::xc5000::{FIRMWARE_KEY, SOURCE_KEY};
use tuner_chips::{DemodMode, FirmwareFlags, Nxt2004, Or51132, S5h1411, Xc3028, Xc5000};
use tuner_core::{
    AnalogChannel, AnalogTuner, AudioFormat, BitOrder, ClockMode, DigitalChannel, DigitalTuner,
    Inversion, Lifecycle, LockState, MapConfig, Modulation, TunerError, VideoFormat,
};
use tuner_firmware::sections::{BASE_8MHZ, BASE_FM, DIGITAL_6MHZ, DIGITAL_8MHZ, SCODE_ATSC};
use tuner_sim::{init_test_logging, SimBus, SimDelay};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "tuner-chips-it-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Build a split image from two segments
    pub fn split_image(a: &[u8], b: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(a.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(b.len() as u32).to_le_bytes());
        bytes.extend_from_slice(a);
        bytes.extend_from_slice(b);
        bytes
    }

    pub const VSB_FIRST: [u8; 3] = [0xAA; 3];
    pub const VSB_SECOND: [u8; 2] = [0xBB; 2];
    pub const QAM_FIRST: [u8; 1] = [0xCC];
    pub const QAM_SECOND: [u8; 1] = [0xDD];

    /// Config naming both demodulator images, written under `dir`
    pub fn demod_config(dir: &Path) -> MapConfig {
        let vsb = dir.join("or51132_vsb.fw");
        let qam = dir.join("or51132_qam.fw");
        fs::write(&vsb, split_image(&VSB_FIRST, &VSB_SECOND)).unwrap();
        fs::write(&qam, split_image(&QAM_FIRST, &QAM_SECOND)).unwrap();
        MapConfig::new()
            .with(VSB_FIRMWARE_KEY, vsb.to_string_lossy())
            .with(QAM_FIRMWARE_KEY, qam.to_string_lossy())
            .with_storage_dir(dir.join("state"))
    }

    /// Status word and noise reading served by a simulated demodulator
    #[derive(Clone, Default)]
    pub struct Demod {
        status: Arc<Mutex<[u8; 2]>>,
        noise: Arc<AtomicU16>,
    }

    impl Demod {
        pub fn report(&self, mode: DemodMode, status: u8) {
            *self.status.lock().unwrap() = [mode.code(), status];
        }

        pub fn set_noise(&self, noise: u16) {
            self.noise.store(noise, Ordering::SeqCst);
        }

        pub fn attach(&self, bus: &SimBus) {
            let status = Arc::clone(&self.status);
            let noise = Arc::clone(&self.noise);
            bus.set_responder(move |last, out| match last {
                [0x04, 0x00] => out.copy_from_slice(&*status.lock().unwrap()),
                [0x04, 0x02] => out.copy_from_slice(&noise.load(Ordering::SeqCst).to_le_bytes()),
                _ => out.fill(0),
            });
        }
    }

    pub type TestDemod = Or51132<SimBus, MapConfig, SimDelay>;

    pub fn demod(config: MapConfig) -> (TestDemod, SimBus, SimDelay, Demod) {
        init_test_logging();
        let clock = SimDelay::new();
        let bus = SimBus::new().with_clock(&clock);
        let chip = Demod::default();
        chip.attach(&bus);
        let demod = Or51132::with_delay(bus.clone(), config, clock.clone());
        (demod, bus, clock, chip)
    }

    /// Queue the eight version bytes the handshake reads back
    pub fn queue_version(bus: &SimBus) {
        for pair in [[0x01u8, 0x02], [0x03, 0x04], [0x05, 0x06], [0x07, 0x08]] {
            bus.push_reply(pair.to_vec());
        }
    }

    pub fn vsb() -> DigitalChannel {
        DigitalChannel::new(Modulation::Vsb8, 503_000_000, 6_000_000)
    }

    pub fn qam256() -> DigitalChannel {
        DigitalChannel::new(Modulation::Qam256, 555_000_000, 6_000_000)
    }

    /// Registers served by a simulated XC5000
    #[derive(Clone)]
    pub struct Xc {
        product: Arc<AtomicU16>,
        lock: Arc<AtomicU16>,
        busy: Arc<AtomicU16>,
    }

    impl Xc {
        pub fn new(product: u16) -> Self {
            Self {
                product: Arc::new(AtomicU16::new(product)),
                lock: Arc::new(AtomicU16::new(0)),
                busy: Arc::new(AtomicU16::new(0)),
            }
        }

        pub fn set_lock(&self, value: u16) {
            self.lock.store(value, Ordering::SeqCst);
        }

        pub fn set_busy(&self, value: u16) {
            self.busy.store(value, Ordering::SeqCst);
        }

        pub fn attach(&self, bus: &SimBus) {
            let chip = self.clone();
            bus.set_responder(move |last, out| {
                let value = match last {
                    [0x00, 0x08] => chip.product.load(Ordering::SeqCst),
                    [0x00, 0x04] => chip.lock.load(Ordering::SeqCst),
                    [0x00, 0x09] => chip.busy.load(Ordering::SeqCst),
                    _ => 0,
                };
                out.copy_from_slice(&value.to_be_bytes());
            });
        }
    }

    pub const PRODUCT_LOADED: u16 = 0x1388;
    pub const PRODUCT_EMPTY: u16 = 0x2000;

    /// Reset, 10 ms sleep, one three-byte write, end of stream
    pub const BYTE_CODE: [u8; 11] = [
        0x00, 0x00, 0x80, 0x0A, 0x00, 0x03, 0x12, 0x34, 0x56, 0xFF, 0xFF,
    ];

    pub fn tuner_config(dir: &Path) -> MapConfig {
        let fw = dir.join("xc5000.fw");
        fs::write(&fw, BYTE_CODE).unwrap();
        MapConfig::new()
            .with(FIRMWARE_KEY, fw.to_string_lossy())
            .with_storage_dir(dir.join("state"))
    }

    pub type TestTuner = Xc5000<SimBus, MapConfig, SimDelay>;

    /// IF the tuner feeds its demodulator
    pub const IFREQ_HZ: u32 = 5_380_000;

    pub fn tuner(product: u16, config: MapConfig) -> (TestTuner, SimBus, Xc) {
        init_test_logging();
        let clock = SimDelay::new();
        let bus = SimBus::new().with_clock(&clock);
        let chip = Xc::new(product);
        chip.attach(&bus);
        let tuner = Xc5000::with_delay(bus.clone(), config, clock, IFREQ_HZ).unwrap();
        bus.clear_events();
        (tuner, bus, chip)
    }

    /// Writes other than register-read addresses
    pub fn register_writes(bus: &SimBus) -> Vec<Vec<u8>> {
        bus.writes()
            .into_iter()
            .filter(|w| !(w.len() == 2 && w[0] == 0x00))
            .collect()
    }

    /// Value written to register `reg`, if any
    pub fn written(bus: &SimBus, reg: u8) -> Option<u16> {
        register_writes(bus)
            .iter()
            .rev()
            .find(|w| w.len() == 4 && w[0] == 0x00 && w[1] == reg)
            .map(|w| u16::from_be_bytes([w[2], w[3]]))
    }

    /// Status register served by a simulated NXT2004
    #[derive(Clone)]
    pub struct Nxt {
        status: Arc<AtomicU8>,
    }

    impl Nxt {
        pub const MICRO_STOPPED: u8 = 0x10;
        pub const LOCKED: u8 = 0x20;

        pub fn new() -> Self {
            Self {
                status: Arc::new(AtomicU8::new(Self::MICRO_STOPPED)),
            }
        }

        pub fn set_locked(&self, locked: bool) {
            let lock = if locked { Self::LOCKED } else { 0 };
            self.status.store(Self::MICRO_STOPPED | lock, Ordering::SeqCst);
        }

        pub fn attach(&self, bus: &SimBus) {
            let status = Arc::clone(&self.status);
            bus.set_responder(move |last, out| {
                out.fill(0);
                match last {
                    [0x00] => out[0] = tuner_chips::nxt2004::CHIP_ID,
                    [0x31] => out[0] = status.load(Ordering::SeqCst),
                    _ => {}
                }
            });
        }
    }

    /// Microcontroller image with a well-known CRC-16/XMODEM of 0x31C3
    pub const NXT_FIRMWARE: &[u8] = b"123456789";

    pub fn nxt_config(dir: &Path) -> MapConfig {
        let fw = dir.join("nxt2004.fw");
        fs::write(&fw, NXT_FIRMWARE).unwrap();
        MapConfig::new()
            .with(tuner_chips::nxt2004::FIRMWARE_KEY, fw.to_string_lossy())
            .with_storage_dir(dir.join("state"))
    }

    pub type TestNxt = Nxt2004<SimBus, SimDelay>;

    pub fn nxt(config: &MapConfig) -> (TestNxt, SimBus, SimDelay, Nxt) {
        init_test_logging();
        let clock = SimDelay::new();
        let bus = SimBus::new().with_clock(&clock);
        let chip = Nxt::new();
        chip.attach(&bus);
        let demod = Nxt2004::with_delay(bus.clone(), config, clock.clone()).unwrap();
        (demod, bus, clock, chip)
    }

    /// Lock bit served by a simulated S5H1411 in both receiver modes
    #[derive(Clone, Default)]
    pub struct S5 {
        lock: Arc<AtomicU8>,
    }

    impl S5 {
        pub fn set_locked(&self, locked: bool) {
            self.lock.store(if locked { 0x10 } else { 0 }, Ordering::SeqCst);
        }

        pub fn attach(&self, bus: &SimBus) {
            let lock = Arc::clone(&self.lock);
            bus.set_responder(move |last, out| {
                out.fill(0);
                match last {
                    [0x05] => out.copy_from_slice(&tuner_chips::s5h1411::CHIP_ID),
                    [0xF2] => out[0] = lock.load(Ordering::SeqCst),
                    [0xF0] => out[1] = lock.load(Ordering::SeqCst),
                    _ => {}
                }
            });
        }
    }

    pub type TestS5 = S5h1411<SimBus, SimBus, SimDelay>;

    /// Returns the demodulator, its main and QAM buses, and the chip model
    pub fn s5h1411(board: BoardConfig) -> (TestS5, SimBus, SimBus, S5) {
        init_test_logging();
        let bus = SimBus::new();
        let qam_bus = SimBus::new();
        let chip = S5::default();
        chip.attach(&bus);
        let demod =
            S5h1411::with_delay(bus.clone(), qam_bus.clone(), board, SimDelay::new()).unwrap();
        bus.clear_events();
        qam_bus.clear_events();
        (demod, bus, qam_bus, chip)
    }

    /// Lock register served by a simulated XC3028
    #[derive(Clone, Default)]
    pub struct Xc3 {
        lock: Arc<AtomicU16>,
    }

    impl Xc3 {
        pub fn set_lock(&self, value: u16) {
            self.lock.store(value, Ordering::SeqCst);
        }

        pub fn attach(&self, bus: &SimBus) {
            let lock = Arc::clone(&self.lock);
            bus.set_responder(move |last, out| {
                let value = match last {
                    [0x00, 0x02] => lock.load(Ordering::SeqCst),
                    [0x00, 0x04] => XC3028_VERSION,
                    _ => 0,
                };
                out.copy_from_slice(&value.to_be_bytes());
            });
        }
    }

    pub const XC3028_VERSION: u16 = 0x0207;

    /// Multi-section blob; every byte-code payload writes one marker byte
    ///
    /// | section | entry                         | marker |
    /// |---------|-------------------------------|--------|
    /// | base    | no flags (reset first)        | 0xB0   |
    /// | base    | 8 MHz                         | 0xB8   |
    /// | base    | FM                            | 0xBF   |
    /// | digital | 8-VSB and 256-QAM, 6 MHz      | 0xD6   |
    /// | digital | OFDM, 8 MHz                   | 0xD8   |
    /// | analog  | NTSC-M with BTSC              | 0x5A   |
    /// | analog  | FM stereo                     | 0x0F   |
    ///
    /// The scan-code image for 4560 kHz ATSC holds table `n` filled with `0x50 + n`.
    pub fn xc3028_blob() -> Vec<u8> {
        fn marker(byte: u8) -> Vec<u8> {
            vec![0x00, 0x01, byte, 0xFF, 0xFF]
        }
        let mut base0 = vec![0x00, 0x00];
        base0.extend(marker(0xB0));
        let parts = [
            base0,
            marker(0xB8),
            marker(0xBF),
            marker(0xD6),
            marker(0xD8),
            marker(0x5A),
            marker(0x0F),
            (0..16u8).flat_map(|n| [0x50 + n; 12]).collect(),
        ];
        let mut raw = Vec::new();
        let mut spans = Vec::new();
        for part in &parts {
            spans.push((raw.len() as u32, part.len() as u32));
            raw.extend_from_slice(part);
        }
        let span = |out: &mut Vec<u8>, i: usize| {
            out.extend_from_slice(&spans[i].0.to_le_bytes());
            out.extend_from_slice(&spans[i].1.to_le_bytes());
        };

        let mut out = XC3028_VERSION.to_le_bytes().to_vec();
        out.extend_from_slice(&[0, 0, 3, 0]);
        for (i, flags) in [(0, 0u16), (1, BASE_8MHZ), (2, BASE_FM)] {
            span(&mut out, i);
            out.extend_from_slice(&flags.to_le_bytes());
        }
        out.extend_from_slice(&[1, 0, 2, 0]);
        let vsb_qam = (Modulation::Vsb8.capability() | Modulation::Qam256.capability()) as u16;
        let ofdm = Modulation::Ofdm.capability() as u16;
        for (i, mask, flags) in [(3, vsb_qam, DIGITAL_6MHZ), (4, ofdm, DIGITAL_8MHZ)] {
            span(&mut out, i);
            out.extend_from_slice(&mask.to_le_bytes());
            out.extend_from_slice(&flags.to_le_bytes());
        }
        out.extend_from_slice(&[2, 0, 2, 0]);
        for (i, video, audio) in [
            (5, VideoFormat::NtscM.capability(), AudioFormat::Btsc.capability()),
            (6, VideoFormat::None.capability(), AudioFormat::FmStereo.capability()),
        ] {
            span(&mut out, i);
            out.extend_from_slice(&video.to_le_bytes());
            out.extend_from_slice(&audio.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
        }
        out.extend_from_slice(&[3, 0, 1, 0]);
        span(&mut out, 7);
        out.extend_from_slice(&4560u16.to_le_bytes());
        out.extend_from_slice(&SCODE_ATSC.to_le_bytes());
        out.extend_from_slice(&[4, 0, 1, 0]);
        out.extend_from_slice(&raw);
        out
    }

    pub type TestXc3 = Xc3028<SimBus, MapConfig, SimDelay>;

    /// Returns the tuner, its bus, the virtual clock, the chip model and a reset counter
    pub fn xc3028(dir: &Path) -> (TestXc3, SimBus, SimDelay, Xc3, Arc<AtomicUsize>) {
        init_test_logging();
        let fw = dir.join("xc3028.fw");
        fs::write(&fw, xc3028_blob()).unwrap();
        let config = MapConfig::new()
            .with(tuner_chips::xc3028::FIRMWARE_KEY, fw.to_string_lossy())
            .with_storage_dir(dir.join("state"));
        let clock = SimDelay::new();
        let bus = SimBus::new().with_clock(&clock);
        let chip = Xc3::default();
        chip.attach(&bus);
        let resets = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resets);
        let tuner = Xc3028::with_delay(bus.clone(), config, clock.clone())
            .unwrap()
            .with_reset_hook(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        (tuner, bus, clock, chip, resets)
    }
}

use helpers::{PRODUCT_EMPTY, PRODUCT_LOADED};

// ============================================================================
// OR51132 Firmware Tests
// ============================================================================

mod demod_firmware_tests {
    use super::*;

    #[test]
    fn upload_runs_handshake_and_reads_version() {
        let dir = helpers::scratch("or-upload");
        let (mut demod, bus, clock, _) = helpers::demod(helpers::demod_config(&dir));
        assert_eq!(demod.mode(), DemodMode::Unknown);

        bus.clear_events();
        helpers::queue_version(&bus);
        let before = clock.elapsed_ms();
        let negotiation = demod.set_channel(&helpers::vsb()).unwrap();

        assert_eq!(negotiation.input_width_bits, 8);
        assert_eq!(negotiation.clock, ClockMode::Normal);
        assert_eq!(demod.state(), LockState::Configured);
        assert_eq!(demod.mode(), DemodMode::Vsb);
        assert_eq!(demod.firmware_version(), Some("02010403-06050807"));

        let writes = bus.writes();
        assert_eq!(
            writes,
            vec![
                helpers::VSB_FIRST.to_vec(),
                helpers::VSB_SECOND.to_vec(),
                vec![0x7F, 0x01],
                vec![0x7F, 0x01],
                vec![0x10, 0x10, 0x00],
                vec![0x04, 0x17],
                vec![0x00, 0x00],
                vec![0x10, 0x00, 0x00],
            ]
        );
        assert_eq!(bus.read_count(), 4);
        // two segment settles plus the handshake steps
        assert_eq!(clock.elapsed_ms() - before, 232);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn current_firmware_is_not_uploaded_again() {
        let dir = helpers::scratch("or-current");
        let config = helpers::demod_config(&dir);
        let (mut first, _, _, _) = helpers::demod(config.clone());
        first.set_channel(&helpers::vsb()).unwrap();

        // a fresh driver finds the chip already running 8-VSB
        let bus = SimBus::new();
        let chip = helpers::Demod::default();
        chip.report(DemodMode::Vsb, 0x00);
        chip.attach(&bus);
        let mut second = Or51132::with_delay(bus.clone(), config, SimDelay::new());
        assert_eq!(second.mode(), DemodMode::Vsb);
        bus.clear_events();

        second.set_channel(&helpers::vsb()).unwrap();
        assert!(bus.writes().is_empty());
        assert_eq!(second.state(), LockState::Configured);
        assert_eq!(second.firmware_version(), None);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn family_switch_forces_upload() {
        let dir = helpers::scratch("or-switch");
        let (mut demod, bus, _, _) = helpers::demod(helpers::demod_config(&dir));
        demod.set_channel(&helpers::vsb()).unwrap();
        // same family, same mode: nothing to transfer
        bus.clear_events();
        demod.set_channel(&helpers::vsb()).unwrap();
        assert!(bus.writes().is_empty());

        let negotiation = demod.set_channel(&helpers::qam256()).unwrap();
        assert_eq!(negotiation.clock, ClockMode::Punctured);
        assert_eq!(demod.mode(), DemodMode::Qam256);
        let writes = bus.writes();
        assert_eq!(writes[0], helpers::QAM_FIRST.to_vec());
        assert_eq!(writes[1], helpers::QAM_SECOND.to_vec());

        // QAM-64 shares the QAM image, which is now current
        bus.clear_events();
        demod
            .set_channel(&DigitalChannel::new(Modulation::Qam64, 555_000_000, 6_000_000))
            .unwrap();
        assert!(bus.writes().is_empty());
        assert_eq!(demod.mode(), DemodMode::Qam64);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn reset_forces_upload() {
        let dir = helpers::scratch("or-reset");
        let (mut demod, bus, _, _) = helpers::demod(helpers::demod_config(&dir));
        demod.set_channel(&helpers::vsb()).unwrap();
        demod.reset().unwrap();
        assert_eq!(demod.state(), LockState::Unconfigured);
        assert_eq!(demod.mode(), DemodMode::Unknown);

        bus.clear_events();
        demod.set_channel(&helpers::vsb()).unwrap();
        assert_eq!(bus.writes()[0], helpers::VSB_FIRST.to_vec());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_image_leaves_demod_unconfigured() {
        let dir = helpers::scratch("or-missing");
        let config = MapConfig::new()
            .with(VSB_FIRMWARE_KEY, dir.join("absent.fw").to_string_lossy())
            .with_storage_dir(dir.join("state"));
        let (mut demod, bus, _, _) = helpers::demod(config);
        bus.clear_events();

        assert!(matches!(
            demod.set_channel(&helpers::vsb()),
            Err(TunerError::NotFound(_))
        ));
        // no QAM key at all
        assert!(matches!(
            demod.set_channel(&helpers::qam256()),
            Err(TunerError::NotFound(_))
        ));
        assert_eq!(demod.state(), LockState::Unconfigured);
        assert_eq!(demod.mode(), DemodMode::Unknown);
        assert!(bus.writes().is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unsupported_modulation_is_rejected() {
        let (mut demod, bus, _, _) = helpers::demod(MapConfig::new());
        bus.clear_events();
        let channel = DigitalChannel::new(Modulation::Ofdm, 650_000_000, 8_000_000);
        assert!(matches!(
            demod.set_channel(&channel),
            Err(TunerError::InvalidArgument(_))
        ));
        assert!(bus.events().is_empty());
    }
}

// ============================================================================
// OR51132 Lock Tests
// ============================================================================

mod demod_lock_tests {
    use super::*;

    #[test]
    fn start_before_channel_is_not_ready() {
        let (mut demod, _, _, _) = helpers::demod(MapConfig::new());
        assert!(matches!(demod.start(100), Err(TunerError::NotReady(_))));
    }

    #[test]
    fn start_configures_receiver_and_locks() {
        let dir = helpers::scratch("or-lock");
        let (mut demod, bus, _, chip) = helpers::demod(helpers::demod_config(&dir));
        demod.set_channel(&helpers::qam256()).unwrap();
        chip.report(DemodMode::Qam256, 0x01);

        bus.clear_events();
        demod.start(1000).unwrap();
        assert_eq!(demod.state(), LockState::Locked);
        let writes = bus.writes();
        assert_eq!(writes[0], vec![0x04, 0x01, 0x5F]);
        assert_eq!(writes[1], vec![0x1C, 0x00, 0x45]);
        assert_eq!(writes[2], vec![0x04, 0x00]);

        // already locked: nothing to do
        bus.clear_events();
        demod.start(1000).unwrap();
        assert!(bus.events().is_empty());

        demod.stop().unwrap();
        assert_eq!(demod.state(), LockState::Configured);
        assert!(bus.events().is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn vsb_receiver_settings() {
        let dir = helpers::scratch("or-vsb");
        let (mut demod, bus, _, chip) = helpers::demod(helpers::demod_config(&dir));
        demod.set_channel(&helpers::vsb()).unwrap();
        chip.report(DemodMode::Vsb, 0x01);

        bus.clear_events();
        demod.start(1000).unwrap();
        let writes = bus.writes();
        assert_eq!(writes[0], vec![0x04, 0x01, 0x50]);
        assert_eq!(writes[1], vec![0x1C, 0x03, 0x06]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn timeout_reports_waited_time() {
        let dir = helpers::scratch("or-timeout");
        let (mut demod, _, _, chip) = helpers::demod(helpers::demod_config(&dir));
        demod.set_channel(&helpers::vsb()).unwrap();
        chip.report(DemodMode::Vsb, 0x00);

        match demod.start(200) {
            Err(TunerError::Timeout { waited_ms }) => assert_eq!(waited_ms, 200),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(demod.state(), LockState::Configured);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn lost_firmware_during_poll_is_not_ready() {
        let dir = helpers::scratch("or-lost");
        let (mut demod, _, _, chip) = helpers::demod(helpers::demod_config(&dir));
        demod.set_channel(&helpers::vsb()).unwrap();
        chip.report(DemodMode::Unknown, 0x00);

        assert!(matches!(demod.start(200), Err(TunerError::NotReady(_))));
        assert_eq!(demod.state(), LockState::Unconfigured);
        assert_eq!(demod.mode(), DemodMode::Unknown);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failed_configure_write_unconfigures() {
        let dir = helpers::scratch("or-write-fail");
        let (mut demod, bus, _, _) = helpers::demod(helpers::demod_config(&dir));
        demod.set_channel(&helpers::vsb()).unwrap();
        bus.fail_write_after(1);

        assert!(matches!(demod.start(200), Err(TunerError::Io(_))));
        assert_eq!(demod.state(), LockState::Unconfigured);
        assert_eq!(demod.mode(), DemodMode::Unknown);
        fs::remove_dir_all(&dir).unwrap();
    }
}

// ============================================================================
// OR51132 Signal Tests
// ============================================================================

mod demod_signal_tests {
    use super::*;

    #[test]
    fn snr_from_noise_reading() {
        let (mut demod, _, _, chip) = helpers::demod(MapConfig::new());
        chip.report(DemodMode::Qam64, 0x01);
        chip.set_noise(1000);

        let signal = demod.get_signal().unwrap();
        assert!(signal.locked);
        assert!((signal.snr - 29.529).abs() < 0.01);
        assert!((signal.strength - signal.snr / 35.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn ntsc_filter_lowers_vsb_snr() {
        let (mut demod, _, _, chip) = helpers::demod(MapConfig::new());
        chip.set_noise(1000);
        chip.report(DemodMode::Vsb, 0x01);
        let plain = demod.get_signal().unwrap().snr;
        chip.report(DemodMode::Vsb, 0x11);
        let filtered = demod.get_signal().unwrap().snr;
        assert!((plain - filtered - 3.0).abs() < 1e-9);
    }

    #[test]
    fn no_lock_and_auto_mode() {
        let (mut demod, _, _, chip) = helpers::demod(MapConfig::new());
        chip.report(DemodMode::Qam256, 0x00);
        assert!(matches!(demod.get_signal(), Err(TunerError::NotReady(_))));

        chip.report(DemodMode::QamAuto, 0x01);
        assert!(matches!(demod.get_signal(), Err(TunerError::Unsupported(_))));
    }
}

// ============================================================================
// XC5000 Firmware Tests
// ============================================================================

mod tuner_firmware_tests {
    use super::*;

    #[test]
    fn product_id_reports_running_firmware() {
        let (tuner, _, _) = helpers::tuner(PRODUCT_LOADED, MapConfig::new());
        assert!(tuner.firmware_loaded());
        let (tuner, _, _) = helpers::tuner(PRODUCT_EMPTY, MapConfig::new());
        assert!(!tuner.firmware_loaded());
        // unknown IDs are tolerated
        let (tuner, _, _) = helpers::tuner(0x1234, MapConfig::new());
        assert!(!tuner.firmware_loaded());
        assert_eq!(tuner.state(), LockState::Unconfigured);
    }

    #[test]
    fn bus_error_at_construction() {
        init_test_logging();
        let bus = SimBus::new();
        bus.fail_write_after(0);
        let result = Xc5000::with_delay(bus, MapConfig::new(), SimDelay::new(), helpers::IFREQ_HZ);
        assert!(matches!(result, Err(TunerError::Io(_))));
    }

    #[test]
    fn byte_code_upload_runs_reset_hook() {
        let dir = helpers::scratch("xc-upload");
        let (tuner, bus, _) = helpers::tuner(PRODUCT_EMPTY, helpers::tuner_config(&dir));
        let resets = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resets);
        let mut tuner = tuner.with_reset_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        assert!(tuner.firmware_loaded());
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(tuner.state(), LockState::Configured);

        assert_eq!(
            helpers::register_writes(&bus),
            vec![
                vec![0x12, 0x34, 0x56],
                // init
                vec![0x00, 0x00, 0x00, 0x00],
                // over the air
                vec![0x00, 0x0D, 0x00, 0x00],
                vec![0x00, 0x01, 0x80, 0x02],
                vec![0x00, 0x02, 0x00, 0xC0],
                // 5.38 MHz IF
                vec![0x00, 0x05, 0x15, 0x85],
                // (503 MHz - 1.75 MHz) / 15.625 kHz = 32080
                vec![0x00, 0x03, 0x7D, 0x50],
            ]
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn current_firmware_is_skipped_only_when_running() {
        let dir = helpers::scratch("xc-current");
        let config = helpers::tuner_config(&dir);
        let (mut first, _, _) = helpers::tuner(PRODUCT_EMPTY, config.clone());
        DigitalTuner::set_channel(&mut first, &helpers::vsb()).unwrap();

        let (mut running, bus, _) = helpers::tuner(PRODUCT_LOADED, config.clone());
        DigitalTuner::set_channel(&mut running, &helpers::vsb()).unwrap();
        assert_eq!(helpers::register_writes(&bus)[0], vec![0x00, 0x00, 0x00, 0x00]);

        // a chip without firmware is reloaded even though the file is current
        let (mut empty, bus, _) = helpers::tuner(PRODUCT_EMPTY, config);
        DigitalTuner::set_channel(&mut empty, &helpers::vsb()).unwrap();
        assert_eq!(helpers::register_writes(&bus)[0], vec![0x12, 0x34, 0x56]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_firmware_key() {
        let (mut tuner, bus, _) = helpers::tuner(PRODUCT_EMPTY, MapConfig::new());
        assert!(matches!(
            DigitalTuner::set_channel(&mut tuner, &helpers::vsb()),
            Err(TunerError::NotFound(_))
        ));
        assert!(helpers::register_writes(&bus).is_empty());
        assert_eq!(tuner.state(), LockState::Unconfigured);
    }

    #[test]
    fn busy_chip_times_out() {
        let dir = helpers::scratch("xc-busy");
        let (mut tuner, _, chip) = helpers::tuner(PRODUCT_LOADED, helpers::tuner_config(&dir));
        chip.set_busy(1);
        match DigitalTuner::set_channel(&mut tuner, &helpers::vsb()) {
            Err(TunerError::Timeout { waited_ms }) => assert_eq!(waited_ms, 1000),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(tuner.state(), LockState::Unconfigured);
        assert!(tuner.programmed().is_none());
        fs::remove_dir_all(&dir).unwrap();
    }
}

// ============================================================================
// XC5000 Tuning Tests
// ============================================================================

mod tuner_tuning_tests {
    use super::*;

    #[test]
    fn cable_source_and_override() {
        let dir = helpers::scratch("xc-source");
        let config = helpers::tuner_config(&dir);

        let (mut tuner, bus, _) = helpers::tuner(PRODUCT_LOADED, config.clone());
        DigitalTuner::set_channel(&mut tuner, &helpers::qam256()).unwrap();
        assert_eq!(helpers::written(&bus, 0x0D), Some(1));

        let (mut tuner, bus, _) = helpers::tuner(PRODUCT_LOADED, config.clone().with(SOURCE_KEY, "AIR"));
        DigitalTuner::set_channel(&mut tuner, &helpers::qam256()).unwrap();
        assert_eq!(helpers::written(&bus, 0x0D), Some(0));

        // unrecognized values fall back to the modulation's default
        let (mut tuner, bus, _) = helpers::tuner(PRODUCT_LOADED, config.with(SOURCE_KEY, "satellite"));
        DigitalTuner::set_channel(&mut tuner, &helpers::qam256()).unwrap();
        assert_eq!(helpers::written(&bus, 0x0D), Some(1));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn bandwidth_selects_video_mode() {
        let dir = helpers::scratch("xc-bandwidth");
        let (mut tuner, bus, _) = helpers::tuner(PRODUCT_LOADED, helpers::tuner_config(&dir));

        let channel = DigitalChannel::new(Modulation::Ofdm, 650_000_000, 8_000_000);
        DigitalTuner::set_channel(&mut tuner, &channel).unwrap();
        assert_eq!(helpers::written(&bus, 0x01), Some(0x800B));
        // no offset outside 6 MHz channels
        assert_eq!(helpers::written(&bus, 0x03), Some(41600));

        let channel = DigitalChannel::new(Modulation::Ofdm, 650_000_000, 7_000_000);
        DigitalTuner::set_channel(&mut tuner, &channel).unwrap();
        assert_eq!(helpers::written(&bus, 0x01), Some(0x8007));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn repeated_request_is_not_reprogrammed() {
        let dir = helpers::scratch("xc-repeat");
        let (mut tuner, bus, _) = helpers::tuner(PRODUCT_LOADED, helpers::tuner_config(&dir));
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();

        bus.clear_events();
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        assert!(bus.events().is_empty());

        tuner.reset().unwrap();
        assert_eq!(tuner.state(), LockState::Unconfigured);
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        assert!(!helpers::register_writes(&bus).is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn analog_television() {
        let dir = helpers::scratch("xc-analog");
        let (mut tuner, bus, _) = helpers::tuner(PRODUCT_LOADED, helpers::tuner_config(&dir));
        let channel = AnalogChannel::tv(61_250_000, 6_000_000, VideoFormat::NtscM, AudioFormat::Btsc);
        AnalogTuner::set_channel(&mut tuner, &channel).unwrap();

        assert_eq!(helpers::written(&bus, 0x0D), Some(0));
        assert_eq!(helpers::written(&bus, 0x01), Some(0x8020));
        assert_eq!(helpers::written(&bus, 0x02), Some(0x0400));
        assert_eq!(helpers::written(&bus, 0x03), Some(3920));
        assert_eq!(helpers::written(&bus, 0x05), None);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn fm_radio() {
        let dir = helpers::scratch("xc-fm");
        let (mut tuner, bus, _) = helpers::tuner(PRODUCT_LOADED, helpers::tuner_config(&dir));
        let channel = AnalogChannel::fm_radio(98_100_000, AudioFormat::FmStereo);
        AnalogTuner::set_channel(&mut tuner, &channel).unwrap();
        assert_eq!(helpers::written(&bus, 0x01), Some(0x9002));
        assert_eq!(helpers::written(&bus, 0x02), Some(0x0208));
        assert_eq!(helpers::written(&bus, 0x03), Some(6278));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn invalid_requests_touch_nothing() {
        let (mut tuner, bus, _) = helpers::tuner(PRODUCT_LOADED, MapConfig::new());
        let digital = [
            DigitalChannel::new(Modulation::Qpsk, 503_000_000, 6_000_000),
            DigitalChannel::new(Modulation::Vsb8, 503_000_000, 5_000_000),
            DigitalChannel::new(Modulation::Ofdm, 1_500_000_000, 8_000_000),
            // 1 MHz less the 6 MHz offset is below the range
            DigitalChannel::new(Modulation::Vsb8, 1_000_000, 6_000_000),
        ];
        for channel in &digital {
            assert!(matches!(
                DigitalTuner::set_channel(&mut tuner, channel),
                Err(TunerError::InvalidArgument(_))
            ));
        }
        let analog = [
            AnalogChannel::tv(5_000_000_000, 8_000_000, VideoFormat::PalB, AudioFormat::A2),
            AnalogChannel::tv(175_250_000, 8_000_000, VideoFormat::PalH, AudioFormat::A2),
        ];
        for channel in &analog {
            assert!(matches!(
                AnalogTuner::set_channel(&mut tuner, channel),
                Err(TunerError::InvalidArgument(_))
            ));
        }
        assert!(bus.events().is_empty());
    }
}

// ============================================================================
// XC5000 Lock Tests
// ============================================================================

mod tuner_lock_tests {
    use super::*;

    #[test]
    fn start_polls_lock_register() {
        let dir = helpers::scratch("xc-lock");
        let (mut tuner, bus, chip) = helpers::tuner(PRODUCT_LOADED, helpers::tuner_config(&dir));
        assert!(matches!(tuner.start(100), Err(TunerError::NotReady(_))));

        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        chip.set_lock(1);
        bus.clear_events();
        tuner.start(100).unwrap();
        assert_eq!(tuner.state(), LockState::Locked);
        assert_eq!(bus.writes(), vec![vec![0x00, 0x04]]);

        tuner.stop().unwrap();
        assert_eq!(tuner.state(), LockState::Configured);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn no_lock_times_out() {
        let dir = helpers::scratch("xc-nolock");
        let (mut tuner, _, _) = helpers::tuner(PRODUCT_LOADED, helpers::tuner_config(&dir));
        DigitalTuner::set_channel(&mut tuner, &helpers::qam256()).unwrap();
        match tuner.start(500) {
            Err(TunerError::Timeout { waited_ms }) => assert_eq!(waited_ms, 500),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(tuner.state(), LockState::Configured);
        fs::remove_dir_all(&dir).unwrap();
    }
}

// ============================================================================
// NXT2004 Tests
// ============================================================================

mod nxt_tests {
    use super::*;
    use helpers::Nxt;

    #[test]
    fn upload_is_followed_by_crc() {
        let dir = helpers::scratch("nxt-upload");
        let (demod, bus, _, _) = helpers::nxt(&helpers::nxt_config(&dir));
        assert_eq!(demod.firmware_crc(), 0x31C3);

        let writes = bus.writes();
        assert_eq!(writes[0], vec![0x00]);
        let at = writes
            .iter()
            .position(|w| w[..] == [0x29, 0x10, 0x00, 0x81])
            .unwrap();
        let mut burst = vec![0x2C];
        burst.extend_from_slice(helpers::NXT_FIRMWARE);
        assert_eq!(writes[at + 1], burst);
        assert_eq!(writes[at + 2], vec![0x2C, 0x31, 0xC3]);
        assert_eq!(demod.state(), LockState::Unconfigured);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn upload_respects_transaction_limit() {
        let dir = helpers::scratch("nxt-limit");
        let firmware = b"0123456789ABCDEFGHIJ";
        let fw = dir.join("nxt2004.fw");
        fs::write(&fw, firmware).unwrap();
        let config = MapConfig::new()
            .with(tuner_chips::nxt2004::FIRMWARE_KEY, fw.to_string_lossy())
            .with_storage_dir(dir.join("state"));
        // the longest register sequence write is ten bytes
        let bus = SimBus::new().with_max_transaction(10);
        Nxt::new().attach(&bus);
        let demod = Nxt2004::with_delay(bus.clone(), &config, SimDelay::new()).unwrap();

        let crc = tuner_firmware::checksum::crc16(firmware);
        assert_eq!(demod.firmware_crc(), crc);
        let bursts: Vec<_> = bus
            .writes()
            .into_iter()
            .skip_while(|w| w[..] != [0x29, 0x10, 0x00, 0x81])
            .skip(1)
            .take(4)
            .collect();
        let [hi, lo] = crc.to_be_bytes();
        assert_eq!(
            bursts,
            vec![
                b"\x2C012345678".to_vec(),
                b"\x2C9ABCDEFGH".to_vec(),
                b"\x2CIJ".to_vec(),
                vec![0x2C, hi, lo],
            ]
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn wrong_chip_id_is_not_found() {
        let dir = helpers::scratch("nxt-id");
        let bus = SimBus::new();
        bus.push_reply(vec![0x07]);
        let result = Nxt2004::with_delay(bus.clone(), &helpers::nxt_config(&dir), SimDelay::new());
        assert!(matches!(result, Err(TunerError::DeviceNotFound(_))));
        assert_eq!(bus.writes(), vec![vec![0x00]]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_firmware_key() {
        let bus = SimBus::new();
        Nxt::new().attach(&bus);
        let result = Nxt2004::with_delay(bus, &MapConfig::new(), SimDelay::new());
        assert!(matches!(result, Err(TunerError::NotFound(_))));
    }

    #[test]
    fn unsupported_modulation_touches_nothing() {
        let dir = helpers::scratch("nxt-qpsk");
        let (mut demod, bus, _, _) = helpers::nxt(&helpers::nxt_config(&dir));
        bus.clear_events();
        let channel = DigitalChannel::new(Modulation::Qpsk, 1_200_000_000, 8_000_000);
        assert!(matches!(
            demod.set_channel(&channel),
            Err(TunerError::InvalidArgument(_))
        ));
        assert!(bus.events().is_empty());
        assert!(matches!(demod.start(100), Err(TunerError::NotReady(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn negotiation_follows_family() {
        let dir = helpers::scratch("nxt-negotiate");
        let (mut demod, _, _, _) = helpers::nxt(&helpers::nxt_config(&dir));
        let vsb = demod.set_channel(&helpers::vsb()).unwrap();
        assert_eq!(vsb.clock, ClockMode::Normal);
        assert_eq!(vsb.bit_order, BitOrder::MsbFirst);
        let qam = demod.set_channel(&helpers::qam256()).unwrap();
        assert_eq!(qam.clock, ClockMode::Punctured);
        assert_eq!(demod.modulation(), Some(Modulation::Qam256));
        assert_eq!(demod.state(), LockState::Configured);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn start_programs_modulation_and_locks() {
        let dir = helpers::scratch("nxt-start");
        let (mut demod, bus, _, chip) = helpers::nxt(&helpers::nxt_config(&dir));
        demod.set_channel(&helpers::vsb()).unwrap();
        chip.set_locked(true);
        bus.clear_events();
        demod.start(500).unwrap();
        assert_eq!(demod.state(), LockState::Locked);
        let writes = bus.writes();
        assert!(writes.contains(&vec![0x42, 0x70]));
        assert!(writes.contains(&vec![0x5C, 0x60, 0x00]));
        assert!(writes.contains(&vec![0x30, 0x00]));
        assert_eq!(writes.iter().rev().nth(1), Some(&vec![0x5C, 0xF0]));

        demod.stop().unwrap();
        demod.set_channel(&DigitalChannel::new(Modulation::Qam64, 555_000_000, 6_000_000)).unwrap();
        bus.clear_events();
        demod.start(500).unwrap();
        let writes = bus.writes();
        assert!(writes.contains(&vec![0x42, 0x74]));
        assert!(writes.contains(&vec![0x5C, 0x68, 0x00]));
        assert!(writes.contains(&vec![0x30, 0x02]));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn start_without_lock_times_out() {
        let dir = helpers::scratch("nxt-timeout");
        let (mut demod, _, clock, _) = helpers::nxt(&helpers::nxt_config(&dir));
        demod.set_channel(&helpers::qam256()).unwrap();
        let before = clock.elapsed_ms();
        match demod.start(200) {
            Err(TunerError::Timeout { waited_ms }) => assert_eq!(waited_ms, 200),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(clock.elapsed_ms() - before, 200);
        assert_eq!(demod.state(), LockState::Configured);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn signal_from_microcontroller_registers() {
        let dir = helpers::scratch("nxt-signal");
        let (mut demod, bus, _, _) = helpers::nxt(&helpers::nxt_config(&dir));
        demod.set_channel(&helpers::vsb()).unwrap();
        bus.push_reply(vec![Nxt::MICRO_STOPPED | Nxt::LOCKED]);
        // top of the 24-30 dB range
        bus.push_reply(vec![0x7F, 0xFF]);
        bus.push_reply(vec![0x00, 0x03, 0x09]);
        let signal = demod.get_signal().unwrap();
        assert!(signal.locked);
        assert!((signal.snr - 30.0).abs() < 1e-9);
        assert!((signal.strength - 30.0 / 35.0 * 100.0).abs() < 1e-9);
        assert_eq!(signal.ber, 24.0);
        assert_eq!(signal.uncorrected_blocks, 9);
        assert_eq!(bus.pending_replies(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }
}

// ============================================================================
// S5H1411 Tests
// ============================================================================

mod s5h1411_tests {
    use super::*;

    #[test]
    fn wrong_chip_id_is_not_found() {
        let bus = SimBus::new();
        let qam_bus = SimBus::new();
        let result = S5h1411::with_delay(
            bus.clone(),
            qam_bus.clone(),
            BoardConfig::default(),
            SimDelay::new(),
        );
        assert!(matches!(result, Err(TunerError::DeviceNotFound(_))));
        assert_eq!(bus.writes(), vec![vec![0x05]]);
        assert_eq!(qam_bus.write_count(), 0);
    }

    #[test]
    fn init_writes_register_tables_to_both_cores() {
        init_test_logging();
        let bus = SimBus::new();
        let qam_bus = SimBus::new();
        helpers::S5::default().attach(&bus);
        let board = BoardConfig {
            serial_output: true,
            gpio: true,
            clock: OutputClock::GatedInverted,
            ..Default::default()
        };
        let _demod = S5h1411::with_delay(bus.clone(), qam_bus.clone(), board, SimDelay::new())
            .unwrap();

        let writes = bus.writes();
        assert_eq!(writes[1], vec![0xF4, 0x00, 0x00]);
        assert!(writes.contains(&vec![0xBD, 0x01, 0x00]));
        assert!(writes.contains(&vec![0xE0, 0x00, 0x02]));
        assert!(writes.contains(&vec![0xBE, 0x20, 0x00]));
        assert!(writes.contains(&vec![0x38, 0x1B, 0xE4]));
        assert_eq!(
            writes[writes.len() - 3..].to_vec(),
            vec![vec![0xF7, 0x00, 0x00], vec![0xF7, 0x00, 0x01], vec![0xF5, 0x00, 0x01]]
        );

        let qam_writes = qam_bus.writes();
        assert_eq!(qam_writes.len(), 19);
        assert_eq!(qam_writes[0], vec![0xF3, 0x00, 0x00]);
        assert_eq!(qam_writes[18], vec![0x2C, 0x1B, 0xE4]);
    }

    #[test]
    fn parallel_output_leaves_mode_register_alone() {
        let bus = SimBus::new();
        helpers::S5::default().attach(&bus);
        let _demod = S5h1411::with_delay(
            bus.clone(),
            SimBus::new(),
            BoardConfig::default(),
            SimDelay::new(),
        )
        .unwrap();
        let writes = bus.writes();
        assert!(!writes.iter().any(|w| w.len() == 3 && w[0] == 0xBD));
        assert!(!writes.iter().any(|w| w.len() == 3 && w[0] == 0xE0));
        assert!(writes.contains(&vec![0xBE, 0x00, 0x00]));
    }

    #[test]
    fn same_family_only_soft_resets() {
        let (mut demod, bus, qam_bus, _) = helpers::s5h1411(BoardConfig::default());
        demod.set_channel(&helpers::vsb()).unwrap();
        assert!(bus.writes().contains(&vec![0xCD, 0x00, 0xF1]));
        assert_eq!(qam_bus.writes(), vec![vec![0x2C, 0x1B, 0xE4]]);

        bus.clear_events();
        qam_bus.clear_events();
        let negotiation = demod.set_channel(&helpers::vsb()).unwrap();
        assert_eq!(
            bus.writes(),
            vec![
                vec![0xF7, 0x00, 0x00],
                vec![0xF7, 0x00, 0x01],
                vec![0xF7, 0x00, 0x00],
                vec![0xF7, 0x00, 0x01],
            ]
        );
        assert_eq!(qam_bus.write_count(), 0);
        assert_eq!(negotiation.input_width_bits, 8);
        assert_eq!(negotiation.clock, ClockMode::Punctured);
        assert_eq!(negotiation.bit_order, BitOrder::MsbFirst);
    }

    #[test]
    fn switching_to_qam_programs_both_cores() {
        let board = BoardConfig {
            qam_ifreq: IfFrequency::Mhz4,
            serial_output: true,
            ..Default::default()
        };
        let (mut demod, bus, qam_bus, _) = helpers::s5h1411(board);
        demod.set_channel(&helpers::vsb()).unwrap();
        bus.clear_events();
        qam_bus.clear_events();

        let negotiation = demod.set_channel(&helpers::qam256()).unwrap();
        assert_eq!(negotiation.input_width_bits, 1);
        let writes = bus.writes();
        assert!(writes.contains(&vec![0x38, 0x14, 0xBC]));
        assert!(writes.contains(&vec![0x00, 0x01, 0x71]));
        assert!(writes.contains(&vec![0xCD, 0x00, 0xF0]));
        assert_eq!(
            qam_bus.writes(),
            vec![vec![0x2C, 0x14, 0xBD], vec![0x16, 0x11, 0x01]]
        );
        assert_eq!(demod.modulation(), Some(Modulation::Qam256));
    }

    #[test]
    fn inversion_sets_spectral_bit() {
        let (mut demod, bus, _, _) = helpers::s5h1411(BoardConfig::default());
        let channel = helpers::vsb().with_inversion(Inversion::On);
        demod.set_channel(&channel).unwrap();
        assert!(bus.writes().contains(&vec![0x24, 0x10, 0x00]));

        // automatic inversion is treated as off
        bus.clear_events();
        demod
            .set_channel(&helpers::vsb().with_inversion(Inversion::Auto))
            .unwrap();
        assert!(bus.writes().contains(&vec![0x24, 0x00, 0x00]));
    }

    #[test]
    fn unsupported_modulation_touches_nothing() {
        let (mut demod, bus, qam_bus, _) = helpers::s5h1411(BoardConfig::default());
        let channel = DigitalChannel::new(Modulation::Ofdm, 650_000_000, 8_000_000);
        assert!(matches!(
            demod.set_channel(&channel),
            Err(TunerError::InvalidArgument(_))
        ));
        assert!(bus.events().is_empty());
        assert!(qam_bus.events().is_empty());
    }

    #[test]
    fn start_closes_gate_and_locks() {
        let (mut demod, bus, _, chip) = helpers::s5h1411(BoardConfig::default());
        assert!(matches!(demod.start(100), Err(TunerError::NotReady(_))));
        demod.set_channel(&helpers::qam256()).unwrap();
        chip.set_locked(true);
        bus.clear_events();
        demod.start(100).unwrap();
        assert_eq!(demod.state(), LockState::Locked);
        assert!(bus.writes().contains(&vec![0xF5, 0x00, 0x00]));

        demod.stop().unwrap();
        assert_eq!(demod.state(), LockState::Configured);
        assert_eq!(bus.writes().last(), Some(&vec![0xF5, 0x00, 0x01]));
    }

    #[test]
    fn start_without_lock_times_out() {
        let (mut demod, _, _, _) = helpers::s5h1411(BoardConfig::default());
        demod.set_channel(&helpers::vsb()).unwrap();
        match demod.start(150) {
            Err(TunerError::Timeout { waited_ms }) => assert_eq!(waited_ms, 150),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn vsb_signal_strength_and_block_errors() {
        let (mut demod, bus, _, _) = helpers::s5h1411(BoardConfig::default());
        demod.set_channel(&helpers::vsb()).unwrap();
        bus.push_reply(vec![0x10, 0x00]);
        bus.push_reply(vec![0x00, 0x05]);
        bus.push_reply(vec![0x13, 0x9F]);
        let signal = demod.get_signal().unwrap();
        assert!(signal.locked);
        assert_eq!(signal.uncorrected_blocks, 5);
        assert!((signal.strength - 100.0).abs() < 1e-9);
    }

    #[test]
    fn qam_signal_strength_is_capped() {
        let (mut demod, bus, _, _) = helpers::s5h1411(BoardConfig::default());
        assert!(matches!(demod.get_signal(), Err(TunerError::NotReady(_))));
        demod.set_channel(&helpers::qam256()).unwrap();
        bus.push_reply(vec![0x00, 0x00]);
        bus.push_reply(vec![0x00, 0x00]);
        bus.push_reply(vec![0x00, 0x00]);
        let signal = demod.get_signal().unwrap();
        assert!(!signal.locked);
        assert_eq!(signal.strength, 100.0);

        bus.push_reply(vec![0x00, 0x00]);
        bus.push_reply(vec![0x00, 0x00]);
        bus.push_reply(vec![0xFF, 0xFF]);
        let signal = demod.get_signal().unwrap();
        assert!((signal.strength - 2416.0 / 65535.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn drop_opens_gate_and_sleeps() {
        let (demod, bus, _, _) = helpers::s5h1411(BoardConfig::default());
        drop(demod);
        assert_eq!(
            bus.writes(),
            vec![vec![0xF5, 0x00, 0x01], vec![0xF4, 0x00, 0x01]]
        );
    }

    #[test]
    fn drop_tolerates_bus_failure() {
        let (demod, bus, _, _) = helpers::s5h1411(BoardConfig::default());
        bus.fail_write_after(0);
        drop(demod);
        assert_eq!(bus.write_count(), 0);
    }
}

// ============================================================================
// XC3028 Tests
// ============================================================================

mod xc3028_tests {
    use super::*;
    use tuner_chips::xc3028::{DEFAULT_SETTLE_US, SETTLE_KEY};

    #[test]
    fn missing_firmware_key() {
        let result = Xc3028::with_delay(SimBus::new(), MapConfig::new(), SimDelay::new());
        assert!(matches!(result, Err(TunerError::NotFound(_))));
    }

    #[test]
    fn construction_touches_nothing() {
        let dir = helpers::scratch("xc3-new");
        let (tuner, bus, _, _, _) = helpers::xc3028(&dir);
        assert_eq!(tuner.firmware_version(), helpers::XC3028_VERSION);
        assert!(bus.events().is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn digital_loads_base_then_digital_then_tunes() {
        let dir = helpers::scratch("xc3-digital");
        let (mut tuner, bus, _, _, resets) = helpers::xc3028(&dir);
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        // 503 MHz less the 6 MHz offset, in 15.625 kHz steps
        assert_eq!(
            bus.writes(),
            vec![
                vec![0xB0],
                vec![0x00, 0x04],
                vec![0xD6],
                vec![0x80, 0x02, 0x00, 0x00],
                vec![0x00, 0x00, 0x7D, 0x50],
            ]
        );
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(tuner.frequency_hz(), Some(501_250_000));
        assert_eq!(tuner.state(), LockState::Configured);

        // the same request only retunes
        bus.clear_events();
        DigitalTuner::set_channel(&mut tuner, &helpers::qam256()).unwrap();
        assert_eq!(bus.write_count(), 2);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn eight_mhz_channel_switches_base() {
        let dir = helpers::scratch("xc3-8mhz");
        let (mut tuner, bus, _, _, _) = helpers::xc3028(&dir);
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        bus.clear_events();
        let channel = DigitalChannel::new(Modulation::Ofdm, 650_000_000, 8_000_000);
        DigitalTuner::set_channel(&mut tuner, &channel).unwrap();
        assert_eq!(
            bus.writes(),
            vec![
                vec![0xB8],
                vec![0x00, 0x04],
                vec![0xD8],
                vec![0x80, 0x02, 0x00, 0x00],
                vec![0x00, 0x00, 0xA1, 0xD0],
            ]
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn scan_code_table_follows_digital_image() {
        let dir = helpers::scratch("xc3-scode");
        let (mut tuner, bus, _, _, _) = helpers::xc3028(&dir);
        tuner.set_firmware_flags(FirmwareFlags {
            scan_code: SCODE_ATSC,
            scan_ifreq_khz: 4560,
            scan_table: 2,
            ..Default::default()
        });
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        let writes = bus.writes();
        assert_eq!(writes[3], vec![0xA0, 0x00, 0x00, 0x00]);
        assert_eq!(writes[4], vec![0x52; 12]);
        assert_eq!(writes[5], vec![0x00, 0x8C]);
        assert_eq!(tuner.loader().current_scan_table(), Some(2));

        // a different table of the same image is sent on the next request
        let flags = FirmwareFlags {
            scan_table: 9,
            ..*tuner.firmware_flags()
        };
        tuner.set_firmware_flags(flags);
        bus.clear_events();
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        assert_eq!(bus.writes()[1], vec![0x59; 12]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_scan_code_leaves_tuner_unconfigured() {
        let dir = helpers::scratch("xc3-noscode");
        let (mut tuner, _, _, _, _) = helpers::xc3028(&dir);
        tuner.set_firmware_flags(FirmwareFlags {
            scan_ifreq_khz: 5400,
            ..Default::default()
        });
        assert!(matches!(
            DigitalTuner::set_channel(&mut tuner, &helpers::vsb()),
            Err(TunerError::NotFound(_))
        ));
        assert_eq!(tuner.state(), LockState::Unconfigured);
        assert_eq!(tuner.frequency_hz(), None);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn analog_television_and_radio() {
        let dir = helpers::scratch("xc3-analog");
        let (mut tuner, bus, _, _, _) = helpers::xc3028(&dir);
        let tv = AnalogChannel::tv(61_250_000, 6_000_000, VideoFormat::NtscM, AudioFormat::Btsc);
        AnalogTuner::set_channel(&mut tuner, &tv).unwrap();
        let writes = bus.writes();
        assert_eq!(writes[0], vec![0xB0]);
        assert_eq!(writes[2], vec![0x5A]);
        assert_eq!(writes[4], vec![0x00, 0x00, 0x0F, 0x50]);

        bus.clear_events();
        let radio = AnalogChannel::fm_radio(98_100_000, AudioFormat::FmStereo);
        AnalogTuner::set_channel(&mut tuner, &radio).unwrap();
        let writes = bus.writes();
        assert_eq!(writes[0], vec![0xBF]);
        assert_eq!(writes[2], vec![0x0F]);
        assert_eq!(writes[4], vec![0x00, 0x00, 0x18, 0x86]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn requests_without_firmware_touch_nothing() {
        let dir = helpers::scratch("xc3-invalid");
        let (mut tuner, bus, _, _, _) = helpers::xc3028(&dir);
        let invalid = [
            DigitalChannel::new(Modulation::Qpsk, 1_200_000_000, 8_000_000),
            DigitalChannel::new(Modulation::Ofdm, 650_000_000, 6_000_000),
            DigitalChannel::new(Modulation::Vsb8, 900_000_000, 6_000_000),
            DigitalChannel::new(Modulation::Vsb8, 503_000_000, 5_000_000),
        ];
        for channel in &invalid {
            assert!(matches!(
                DigitalTuner::set_channel(&mut tuner, channel),
                Err(TunerError::InvalidArgument(_))
            ));
        }
        let pal = AnalogChannel::tv(175_250_000, 7_000_000, VideoFormat::PalB, AudioFormat::A2);
        assert!(matches!(
            AnalogTuner::set_channel(&mut tuner, &pal),
            Err(TunerError::InvalidArgument(_))
        ));
        assert!(bus.events().is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn start_waits_for_lock_then_settles() {
        let dir = helpers::scratch("xc3-start");
        let (mut tuner, _, clock, chip, _) = helpers::xc3028(&dir);
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        chip.set_lock(1);
        let before = clock.elapsed_us();
        tuner.start(1000).unwrap();
        assert_eq!(tuner.state(), LockState::Locked);
        assert_eq!(clock.elapsed_us() - before, u64::from(DEFAULT_SETTLE_US));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn configured_settle_time() {
        let dir = helpers::scratch("xc3-settle");
        fs::write(dir.join("xc3028.fw"), helpers::xc3028_blob()).unwrap();
        let config = MapConfig::new()
            .with(tuner_chips::xc3028::FIRMWARE_KEY, dir.join("xc3028.fw").to_string_lossy())
            .with(SETTLE_KEY, "2000")
            .with_storage_dir(dir.join("state"));
        let clock = SimDelay::new();
        let bus = SimBus::new().with_clock(&clock);
        let chip = helpers::Xc3::default();
        chip.attach(&bus);
        chip.set_lock(1);
        let mut tuner = Xc3028::with_delay(bus, config, clock.clone()).unwrap();
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        let before = clock.elapsed_us();
        tuner.start(1000).unwrap();
        assert_eq!(clock.elapsed_us() - before, 2000);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn no_lock_times_out_and_reset_reloads() {
        let dir = helpers::scratch("xc3-reset");
        let (mut tuner, bus, _, _, resets) = helpers::xc3028(&dir);
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        assert!(matches!(
            tuner.start(200),
            Err(TunerError::Timeout { waited_ms: 200 })
        ));
        tuner.reset().unwrap();
        assert_eq!(tuner.state(), LockState::Unconfigured);

        bus.clear_events();
        DigitalTuner::set_channel(&mut tuner, &helpers::vsb()).unwrap();
        assert_eq!(bus.writes()[0], vec![0xB0]);
        assert_eq!(resets.load(Ordering::SeqCst), 2);
        fs::remove_dir_all(&dir).unwrap();
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use tuner_chips::or51132::snr_db;

    proptest! {
        #[test]
        fn snr_falls_as_noise_rises(noise in 1u16..u16::MAX) {
            for mode in [DemodMode::Vsb, DemodMode::Qam64, DemodMode::Qam256] {
                let lower = snr_db(mode, noise, false).unwrap();
                let higher = snr_db(mode, noise + 1, false).unwrap();
                prop_assert!(higher < lower);
            }
        }

        #[test]
        fn out_of_range_frequencies_are_refused(
            hz in prop_oneof![0u32..1_000_000, 1_023_000_001u32..4_000_000_000]
        ) {
            let (mut tuner, bus, _) = helpers::tuner(PRODUCT_LOADED, MapConfig::new());
            let channel = DigitalChannel::new(Modulation::Ofdm, hz, 8_000_000);
            prop_assert!(matches!(
                DigitalTuner::set_channel(&mut tuner, &channel),
                Err(TunerError::InvalidArgument(_))
            ));
            prop_assert!(bus.events().is_empty());
        }

        #[test]
        fn xc3028_divider_is_nearest_step(hz in 42_000_000u64..=864_000_000) {
            let divider = u64::from(tuner_chips::xc3028::frequency_divider(hz).unwrap());
            let error = (divider * 15_625).abs_diff(hz);
            prop_assert!(error <= 15_625 / 2);
        }

        #[test]
        fn s5h1411_strength_stays_in_range(reading in any::<u16>(), locked in any::<bool>()) {
            let (mut demod, bus, _, _) = helpers::s5h1411(BoardConfig::default());
            demod.set_channel(&helpers::qam256()).unwrap();
            bus.push_reply(vec![0x00, if locked { 0x10 } else { 0x00 }]);
            bus.push_reply(vec![0x00, 0x00]);
            bus.push_reply(reading.to_be_bytes().to_vec());
            let signal = demod.get_signal().unwrap();
            prop_assert_eq!(signal.locked, locked);
            prop_assert!((0.0..=100.0).contains(&signal.strength));
        }

        #[test]
        fn in_range_frequencies_program_input_register(hz in 1_000_000u32..=1_023_000_000) {
            let dir = helpers::scratch("xc-prop");
            let (mut tuner, bus, _) = helpers::tuner(PRODUCT_LOADED, helpers::tuner_config(&dir));
            let channel = DigitalChannel::new(Modulation::Ofdm, hz, 8_000_000);
            DigitalTuner::set_channel(&mut tuner, &channel).unwrap();
            prop_assert_eq!(helpers::written(&bus, 0x03), Some((hz / 15_625) as u16));
            fs::remove_dir_all(&dir).unwrap();
        }
    }
}
