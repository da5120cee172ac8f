//! Source Power Data Objects.

use serde::Serialize;
use std::fmt;

use crate::bits::{bit_set, extract_bits};
use crate::constants::*;

/// Fixed supply PDO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixedSupply {
    pub dual_role_power: bool,
    pub usb_suspend_supported: bool,
    pub unconstrained_power: bool,
    pub usb_communications_capable: bool,
    pub dual_role_data: bool,
    pub unchunked_extended_messages: bool,
    pub epr_mode_capable: bool,
    pub peak_current: u8,
    pub voltage_mv: u32,
    pub max_current_ma: u32,
}

impl From<u32> for FixedSupply {
    fn from(raw: u32) -> Self {
        Self {
            dual_role_power: bit_set(raw, 29),
            usb_suspend_supported: bit_set(raw, 28),
            unconstrained_power: bit_set(raw, 27),
            usb_communications_capable: bit_set(raw, 26),
            dual_role_data: bit_set(raw, 25),
            unchunked_extended_messages: bit_set(raw, 24),
            epr_mode_capable: bit_set(raw, 23),
            peak_current: extract_bits(raw, 21, 20) as u8,
            voltage_mv: extract_bits(raw, 19, 10) * PDO_MILLIVOLTS_PER_STEP,
            max_current_ma: extract_bits(raw, 9, 0) * PDO_MILLIAMPS_PER_STEP,
        }
    }
}

/// Battery PDO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Battery {
    pub max_voltage_mv: u32,
    pub min_voltage_mv: u32,
    pub max_power_mw: u32,
}

impl From<u32> for Battery {
    fn from(raw: u32) -> Self {
        Self {
            max_voltage_mv: extract_bits(raw, 29, 20) * PDO_MILLIVOLTS_PER_STEP,
            min_voltage_mv: extract_bits(raw, 19, 10) * PDO_MILLIVOLTS_PER_STEP,
            max_power_mw: extract_bits(raw, 9, 0) * PDO_MILLIWATTS_PER_STEP,
        }
    }
}

/// Variable (non-battery) supply PDO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariableSupply {
    pub max_voltage_mv: u32,
    pub min_voltage_mv: u32,
    pub max_current_ma: u32,
}

impl From<u32> for VariableSupply {
    fn from(raw: u32) -> Self {
        Self {
            max_voltage_mv: extract_bits(raw, 29, 20) * PDO_MILLIVOLTS_PER_STEP,
            min_voltage_mv: extract_bits(raw, 19, 10) * PDO_MILLIVOLTS_PER_STEP,
            max_current_ma: extract_bits(raw, 9, 0) * PDO_MILLIAMPS_PER_STEP,
        }
    }
}

/// SPR Programmable Power Supply APDO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pps {
    pub power_limited: bool,
    pub max_voltage_mv: u32,
    pub min_voltage_mv: u32,
    pub max_current_ma: u32,
}

impl From<u32> for Pps {
    fn from(raw: u32) -> Self {
        Self {
            power_limited: bit_set(raw, 27),
            max_voltage_mv: extract_bits(raw, 24, 17) * APDO_MILLIVOLTS_PER_STEP,
            min_voltage_mv: extract_bits(raw, 15, 8) * APDO_MILLIVOLTS_PER_STEP,
            max_current_ma: extract_bits(raw, 6, 0) * APDO_MILLIAMPS_PER_STEP,
        }
    }
}

/// EPR Adjustable Voltage Supply APDO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Avs {
    pub peak_current: u8,
    pub max_voltage_mv: u32,
    pub min_voltage_mv: u32,
    pub pdp_mw: u32,
}

impl From<u32> for Avs {
    fn from(raw: u32) -> Self {
        Self {
            peak_current: extract_bits(raw, 27, 26) as u8,
            max_voltage_mv: extract_bits(raw, 25, 17) * APDO_MILLIVOLTS_PER_STEP,
            min_voltage_mv: extract_bits(raw, 15, 8) * APDO_MILLIVOLTS_PER_STEP,
            pdp_mw: extract_bits(raw, 7, 0) * APDO_MILLIWATTS_PER_STEP,
        }
    }
}

/// Augmented PDO, subtyped by bits 29..28.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Augmented {
    Pps(Pps),
    Avs(Avs),
    Unknown(u8),
}

impl From<u32> for Augmented {
    fn from(raw: u32) -> Self {
        match extract_bits(raw, 29, 28) {
            0 => Augmented::Pps(Pps::from(raw)),
            1 => Augmented::Avs(Avs::from(raw)),
            other => Augmented::Unknown(other as u8),
        }
    }
}

/// A source capability, keyed by the PDO type in bits 31..30.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourcePdo {
    Fixed(FixedSupply),
    Battery(Battery),
    Variable(VariableSupply),
    Augmented(Augmented),
}

impl From<u32> for SourcePdo {
    fn from(raw: u32) -> Self {
        match extract_bits(raw, 31, 30) {
            0 => SourcePdo::Fixed(FixedSupply::from(raw)),
            1 => SourcePdo::Battery(Battery::from(raw)),
            2 => SourcePdo::Variable(VariableSupply::from(raw)),
            _ => SourcePdo::Augmented(Augmented::from(raw)),
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

impl fmt::Display for SourcePdo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePdo::Fixed(p) => write!(
                f,
                "PDO - Fixed Supply, Dual-Role Power={}, Dual-Role Data={}, USB Suspend={}, \
                 USB Comms={}, Unconstrained Power={}, Unchunked Ext Msgs={}, EPR Mode={}, \
                 Peak Current Mode={}, Voltage={} mV, MaxCurrent={} mA",
                yes_no(p.dual_role_power),
                yes_no(p.dual_role_data),
                yes_no(p.usb_suspend_supported),
                yes_no(p.usb_communications_capable),
                yes_no(p.unconstrained_power),
                yes_no(p.unchunked_extended_messages),
                yes_no(p.epr_mode_capable),
                p.peak_current,
                p.voltage_mv,
                p.max_current_ma
            ),
            SourcePdo::Battery(p) => write!(
                f,
                "PDO - Battery, MaxVoltage={} mV, MinVoltage={} mV, MaxPower={} mW",
                p.max_voltage_mv, p.min_voltage_mv, p.max_power_mw
            ),
            SourcePdo::Variable(p) => write!(
                f,
                "PDO - Variable Supply, MaxVoltage={} mV, MinVoltage={} mV, MaxCurrent={} mA",
                p.max_voltage_mv, p.min_voltage_mv, p.max_current_ma
            ),
            SourcePdo::Augmented(Augmented::Pps(p)) => write!(
                f,
                "APDO - SPR PPS, Power Limited={}, MaxVoltage={} mV, MinVoltage={} mV, MaxCurrent={} mA",
                yes_no(p.power_limited),
                p.max_voltage_mv,
                p.min_voltage_mv,
                p.max_current_ma
            ),
            SourcePdo::Augmented(Augmented::Avs(p)) => write!(
                f,
                "APDO - EPR AVS, Peak Current Mode={}, MaxVoltage={} mV, MinVoltage={} mV, PDP={} mW",
                p.peak_current, p.max_voltage_mv, p.min_voltage_mv, p.pdp_mw
            ),
            SourcePdo::Augmented(Augmented::Unknown(kind)) => {
                write!(f, "APDO - Invalid Type {}", kind)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_5v_3a() {
        // 5 V / 3 A, USB comms capable, dual-role data
        let raw: u32 = (1 << 26) | (1 << 25) | (100 << 10) | 300;
        let SourcePdo::Fixed(pdo) = SourcePdo::from(raw) else {
            panic!("expected a fixed supply PDO");
        };
        assert_eq!(pdo.voltage_mv, 5000);
        assert_eq!(pdo.max_current_ma, 3000);
        assert!(pdo.usb_communications_capable);
        assert!(pdo.dual_role_data);
        assert!(!pdo.dual_role_power);
    }

    #[test]
    fn test_battery_and_variable() {
        let raw: u32 = (1 << 30) | (420 << 20) | (100 << 10) | 200;
        assert_eq!(
            SourcePdo::from(raw),
            SourcePdo::Battery(Battery {
                max_voltage_mv: 21000,
                min_voltage_mv: 5000,
                max_power_mw: 50000,
            })
        );

        let raw: u32 = (2 << 30) | (240 << 20) | (100 << 10) | 150;
        assert_eq!(
            SourcePdo::from(raw),
            SourcePdo::Variable(VariableSupply {
                max_voltage_mv: 12000,
                min_voltage_mv: 5000,
                max_current_ma: 1500,
            })
        );
    }

    #[test]
    fn test_pps_apdo() {
        // 3.3-21 V, 3 A PPS
        let raw: u32 = (3 << 30) | (210 << 17) | (33 << 8) | 60;
        assert_eq!(
            SourcePdo::from(raw),
            SourcePdo::Augmented(Augmented::Pps(Pps {
                power_limited: false,
                max_voltage_mv: 21000,
                min_voltage_mv: 3300,
                max_current_ma: 3000,
            }))
        );
    }

    #[test]
    fn test_avs_and_unknown_apdo() {
        let raw: u32 = (3 << 30) | (1 << 28) | (480 << 17) | (150 << 8) | 140;
        assert_eq!(
            SourcePdo::from(raw),
            SourcePdo::Augmented(Augmented::Avs(Avs {
                peak_current: 0,
                max_voltage_mv: 48000,
                min_voltage_mv: 15000,
                pdp_mw: 140000,
            }))
        );

        let raw: u32 = (3 << 30) | (2 << 28);
        assert_eq!(SourcePdo::from(raw), SourcePdo::Augmented(Augmented::Unknown(2)));
        assert_eq!(SourcePdo::from(raw).to_string(), "APDO - Invalid Type 2");
    }

    #[test]
    fn test_display_fixed() {
        let text = SourcePdo::from((100u32 << 10) | 300).to_string();
        assert!(text.starts_with("PDO - Fixed Supply"), "{}", text);
        assert!(text.contains("Voltage=5000 mV"), "{}", text);
        assert!(text.contains("MaxCurrent=3000 mA"), "{}", text);
    }
}
