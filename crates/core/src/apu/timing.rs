//! Console region timing.

use serde::{Deserialize, Serialize};

/// Console region. Selects clock rates and region-specific lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingMode {
    /// NTSC (North America, Japan) - 1.789773 MHz CPU clock
    #[default]
    Ntsc,
    /// PAL (Europe, Australia) - 1.662607 MHz CPU clock
    Pal,
}

impl TimingMode {
    pub fn cpu_clock_hz(&self) -> f64 {
        match self {
            TimingMode::Ntsc => 1_789_773.0,
            TimingMode::Pal => 1_662_607.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&TimingMode::Pal).unwrap();
        assert_eq!(json, "\"pal\"");
        let mode: TimingMode = serde_json::from_str("\"ntsc\"").unwrap();
        assert_eq!(mode, TimingMode::Ntsc);
    }

    #[test]
    fn test_pal_cpu_is_slower() {
        assert!(TimingMode::Pal.cpu_clock_hz() < TimingMode::Ntsc.cpu_clock_hz());
        assert_eq!(TimingMode::default().cpu_clock_hz(), 1_789_773.0);
    }
}
