//! Wi-Fi link signal strength in dBm.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: queries the associated AP record of the STA interface.
//! On host/test: returns whatever was set with [`sim_set_rssi`]; `None`
//! (not associated) until then.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicI16, Ordering};

use crate::app::ports::SensorSource;
use crate::protocol::Reading;

/// Outside the i8 range, so it can stand for "not associated".
#[cfg(not(target_os = "espidf"))]
const SIM_NO_LINK: i16 = i16::MIN;

#[cfg(not(target_os = "espidf"))]
static SIM_RSSI: AtomicI16 = AtomicI16::new(SIM_NO_LINK);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_rssi(rssi: Option<i8>) {
    SIM_RSSI.store(rssi.map_or(SIM_NO_LINK, i16::from), Ordering::Relaxed);
}

#[derive(Default)]
pub struct SignalStrengthSensor {
    last: Option<i8>,
}

impl SignalStrengthSensor {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Last value sampled, if the link was up.
    pub fn last(&self) -> Option<i8> {
        self.last
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        use esp_idf_svc::sys::{ESP_OK, esp_wifi_sta_get_ap_info, wifi_ap_record_t};

        let mut info: wifi_ap_record_t = Default::default();
        // SAFETY: plain query into a caller-owned record; fails cleanly when
        // the STA is not associated.
        let rc = unsafe { esp_wifi_sta_get_ap_info(&mut info) };
        if rc == ESP_OK as i32 { Some(info.rssi) } else { None }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        i8::try_from(SIM_RSSI.load(Ordering::Relaxed)).ok()
    }
}

impl SensorSource for SignalStrengthSensor {
    fn sample(&mut self) -> Option<Reading> {
        self.last = self.platform_rssi();
        self.last.map(Reading::SignalStrength)
    }
}
