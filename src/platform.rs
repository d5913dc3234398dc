//! Target platform selection and per-platform capabilities.
//!
//! The system-wide collectors read vendor debug interfaces whose location and
//! format differ between SoC families, so every platform-specific decision is
//! funnelled through this enum rather than scattered across the collectors.

use clap::ValueEnum;

/// Supported set-top-box SoC families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Platform {
    Amlogic,
    #[value(name = "amlogic-950d4")]
    Amlogic950d4,
    Realtek,
    Realtek64,
    Broadcom,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Amlogic => "AMLOGIC",
            Platform::Amlogic950d4 => "AMLOGIC_950D4",
            Platform::Realtek => "REALTEK",
            Platform::Realtek64 => "REALTEK64",
            Platform::Broadcom => "BROADCOM",
        }
    }

    /// Parse the uppercase platform name used in config files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "AMLOGIC" => Some(Platform::Amlogic),
            "AMLOGIC_950D4" => Some(Platform::Amlogic950d4),
            "REALTEK" => Some(Platform::Realtek),
            "REALTEK64" => Some(Platform::Realtek64),
            "BROADCOM" => Some(Platform::Broadcom),
            _ => None,
        }
    }

    /// Expected number of whitespace-separated columns in a /proc/buddyinfo
    /// zone line (4 header fields + one free-page count per order).
    ///
    /// 32-bit Realtek kernels are built with a larger MAX_ORDER, hence the
    /// two extra orders.
    pub fn buddyinfo_columns(&self) -> usize {
        match self {
            Platform::Realtek => 17,
            _ => 15,
        }
    }

    /// Whether the DDR bandwidth counter is available (Amlogic only).
    pub fn supports_memory_bandwidth(&self) -> bool {
        matches!(self, Platform::Amlogic | Platform::Amlogic950d4)
    }

    /// Map a directory name under the CMA debugfs root to a human-readable
    /// region name, based on the kernel DTS for each device family.
    ///
    /// Returns `None` for region names that are not known on this platform.
    pub fn cma_region_name(&self, dir_name: &str) -> Option<&'static str> {
        const AMLOGIC_REGIONS: &[(&str, &str)] = &[
            ("cma-0", "secmon_reserved"),
            ("cma-1", "logo_reserved"),
            ("cma-2", "codec_mm_cma"),
            ("cma-3", "ion_cma_reserved"),
            ("cma-4", "vdin1_cma_reserved"),
            ("cma-5", "demod_cma_reserved"),
            ("cma-6", "kernel_reserved"),
        ];
        const REALTEK_REGIONS: &[(&str, &str)] = &[
            ("cma-0", "cma-0"),
            ("cma-1", "cma-1"),
            ("cma-2", "cma-2"),
            ("cma-3", "cma-3"),
            ("cma-4", "cma-4"),
            ("cma-5", "cma-5"),
            ("cma-6", "cma-6"),
            ("cma-7", "cma-7"),
            ("cma-8", "cma-8"),
        ];
        const BROADCOM_REGIONS: &[(&str, &str)] = &[
            ("cma-WiFi@4C0000", "cma-WiFi@4C0000"),
            ("cma-reserved", "cma-reserved"),
        ];

        let table = match self {
            Platform::Amlogic | Platform::Amlogic950d4 => AMLOGIC_REGIONS,
            Platform::Realtek | Platform::Realtek64 => REALTEK_REGIONS,
            Platform::Broadcom => BROADCOM_REGIONS,
        };

        table
            .iter()
            .find(|(dir, _)| *dir == dir_name)
            .map(|(_, name)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buddyinfo_columns() {
        assert_eq!(Platform::Amlogic.buddyinfo_columns(), 15);
        assert_eq!(Platform::Amlogic950d4.buddyinfo_columns(), 15);
        assert_eq!(Platform::Realtek.buddyinfo_columns(), 17);
        assert_eq!(Platform::Realtek64.buddyinfo_columns(), 15);
        assert_eq!(Platform::Broadcom.buddyinfo_columns(), 15);
    }

    #[test]
    fn test_cma_region_names() {
        assert_eq!(
            Platform::Amlogic.cma_region_name("cma-2"),
            Some("codec_mm_cma")
        );
        assert_eq!(Platform::Realtek.cma_region_name("cma-2"), Some("cma-2"));
        assert_eq!(Platform::Amlogic.cma_region_name("cma-99"), None);
        assert_eq!(
            Platform::Broadcom.cma_region_name("cma-reserved"),
            Some("cma-reserved")
        );
    }

    #[test]
    fn test_bandwidth_support() {
        assert!(Platform::Amlogic.supports_memory_bandwidth());
        assert!(Platform::Amlogic950d4.supports_memory_bandwidth());
        assert!(!Platform::Realtek.supports_memory_bandwidth());
        assert!(!Platform::Broadcom.supports_memory_bandwidth());
    }
}
