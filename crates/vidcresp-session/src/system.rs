//! Responses addressed to the firmware as a whole (session id zero).

use std::sync::{Mutex, PoisonError, RwLock};

use bytes::Bytes;
use tracing::{debug, error, info, warn};
use vidcresp_packet::{
    decode_crash_report, decode_image_version, Packet, PacketFlags, ResponseBatch, SystemClass,
    PROP_IMAGE_VERSION,
};

use crate::error::Result;
use crate::ops::CoreOps;
use crate::signal::InitSignal;

/// What a system response did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemReport {
    pub handled: usize,
    /// Packets of a type the system scope does not handle.
    pub ignored: usize,
    /// A fatal firmware error tore the core down; later packets were skipped.
    pub torn_down: bool,
}

/// Firmware-wide state updated by system responses.
#[derive(Debug, Default)]
pub(crate) struct SystemState {
    pub(crate) init_done: InitSignal,
    fw_version: RwLock<Option<String>>,
    crash_region: Mutex<Option<Bytes>>,
}

impl SystemState {
    pub(crate) fn firmware_version(&self) -> Option<String> {
        self.fw_version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_crash_region(&self, region: Bytes) {
        *self
            .crash_region
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(region);
    }

    /// Handle packets in wire order.
    pub(crate) fn handle(
        &self,
        batch: &ResponseBatch<'_>,
        ops: &dyn CoreOps,
    ) -> Result<SystemReport> {
        let mut report = SystemReport::default();
        for packet in batch.packets() {
            let packet_type = packet.header.packet_type;
            match SystemClass::of(packet_type) {
                SystemClass::Init => self.handle_init(&packet),
                SystemClass::Error(_) => {
                    self.system_error(ops);
                    report.handled += 1;
                    report.torn_down = true;
                    break;
                }
                SystemClass::Property(_) => {
                    if packet.header.flags.contains(PacketFlags::SYSTEM_ERROR) {
                        error!(
                            property = format_args!("{packet_type:#x}"),
                            "system error on property"
                        );
                        self.system_error(ops);
                        report.handled += 1;
                        report.torn_down = true;
                        break;
                    }
                    self.handle_property(&packet)?;
                }
                SystemClass::Unknown(_) => {
                    warn!(packet_type = format_args!("{packet_type:#x}"), "unknown system packet");
                    report.ignored += 1;
                    continue;
                }
            }
            report.handled += 1;
        }
        Ok(report)
    }

    fn handle_init(&self, packet: &Packet<'_>) {
        let flags = packet.header.flags;
        if flags.contains(PacketFlags::SYSTEM_ERROR) {
            error!("system error on init");
        } else if flags.contains(PacketFlags::SUCCESS) {
            info!("firmware init done");
            self.init_done.complete();
        } else {
            debug!(flags = flags.bits(), "unhandled init response");
        }
    }

    fn handle_property(&self, packet: &Packet<'_>) -> Result<()> {
        let packet_type = packet.header.packet_type;
        if packet_type != PROP_IMAGE_VERSION {
            debug!(property = format_args!("{packet_type:#x}"), "system property successful");
            return Ok(());
        }
        let version = decode_image_version(packet.payload)?;
        info!(version = version.trim(), "firmware version");
        *self
            .fw_version
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(version);
        Ok(())
    }

    fn system_error(&self, ops: &dyn CoreOps) {
        error!("system error received");
        let region = self
            .crash_region
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(region) = region {
            match decode_crash_report(&region) {
                Ok(report) => error!(report = %report, "firmware crash report"),
                Err(err) => warn!(%err, "unreadable crash report"),
            }
        }
        ops.deinit(true);
    }
}
