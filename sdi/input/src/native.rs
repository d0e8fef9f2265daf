/*!
    Device-native identifiers used by the capture SDK.

    Most identifiers are four-character codes packed big-endian into a `u32`,
    so `FourCc::new(b"Hp25")` is the same value the SDK headers define.
*/

use std::fmt;

/**
    A four-character code.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub u32);

impl FourCc {
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(u32::from_be_bytes(*code))
    }

    pub const fn bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bytes() {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc(\"{self}\")")
    }
}

/// Native display mode identifier.
pub type DisplayModeId = FourCc;

/// Display modes this module knows how to request.
pub mod mode {
    use super::FourCc;

    pub const NTSC: FourCc = FourCc::new(b"ntsc");
    pub const PAL: FourCc = FourCc::new(b"pal ");
    pub const HD720P50: FourCc = FourCc::new(b"hp50");
    pub const HD720P5994: FourCc = FourCc::new(b"hp59");
    pub const HD720P60: FourCc = FourCc::new(b"hp60");
    pub const HD1080I50: FourCc = FourCc::new(b"Hi50");
    pub const HD1080I5994: FourCc = FourCc::new(b"Hi59");
    pub const HD1080I6000: FourCc = FourCc::new(b"Hi60");
    pub const HD1080P2398: FourCc = FourCc::new(b"23ps");
    pub const HD1080P24: FourCc = FourCc::new(b"24ps");
    pub const HD1080P25: FourCc = FourCc::new(b"Hp25");
    pub const HD1080P2997: FourCc = FourCc::new(b"Hp29");
    pub const HD1080P30: FourCc = FourCc::new(b"Hp30");
    pub const HD1080P50: FourCc = FourCc::new(b"Hp50");
    pub const HD1080P5994: FourCc = FourCc::new(b"Hp59");
    pub const HD1080P6000: FourCc = FourCc::new(b"Hp60");
    pub const DCI2K2398: FourCc = FourCc::new(b"2k23");
    pub const DCI2K24: FourCc = FourCc::new(b"2k24");
    pub const DCI2K25: FourCc = FourCc::new(b"2k25");
}

/// Video input connection bits.
pub mod video_connection {
    pub const SDI: u32 = 1 << 0;
    pub const HDMI: u32 = 1 << 1;
    pub const OPTICAL_SDI: u32 = 1 << 2;
    pub const COMPONENT: u32 = 1 << 3;
    pub const COMPOSITE: u32 = 1 << 4;
    pub const S_VIDEO: u32 = 1 << 5;
}

/// Audio input connection bits.
pub mod audio_connection {
    pub const EMBEDDED: u32 = 1 << 0;
    pub const AES_EBU: u32 = 1 << 1;
    pub const ANALOG: u32 = 1 << 2;
}

/// Configuration parameter: video input connection.
pub const CONFIG_VIDEO_INPUT_CONNECTION: FourCc = FourCc::new(b"vicn");
/// Configuration parameter: audio input connection.
pub const CONFIG_AUDIO_INPUT_CONNECTION: FourCc = FourCc::new(b"aicn");

/// Wire pixel format: 10-bit 4:2:2 packed.
pub const PIXEL_FORMAT_10BIT_YUV: FourCc = FourCc::new(b"v210");

/// The only audio sample rate capture hardware delivers.
pub const AUDIO_SAMPLE_RATE_48K: u32 = 48_000;

/**
    Audio sample width requested from the device.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioSampleType {
    Int32 = 32,
}

/**
    Field dominance of a display mode.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldDominance {
    Unknown,
    LowerFieldFirst,
    UpperFieldFirst,
    Progressive,
    ProgressiveSegmented,
}

macro_rules! flags {
    ($(#[$meta:meta])* $name:ident { $($(#[$cmeta:meta])* $flag:ident = $value:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            $( $(#[$cmeta])* pub const $flag: Self = Self($value); )*

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }
    };
}

flags! {
    /// Flags passed when enabling video input.
    VideoInputFlags {
        DEFAULT = 0,
    }
}

flags! {
    /// Per-frame flags reported by the driver.
    FrameFlags {
        NONE = 0,
        /// No signal is present on the selected input.
        HAS_NO_INPUT_SOURCE = 1 << 31,
    }
}

flags! {
    /// What changed in a format-changed notification.
    FormatChangedEvents {
        DISPLAY_MODE_CHANGED = 1 << 0,
        FIELD_DOMINANCE_CHANGED = 1 << 1,
        COLORSPACE_CHANGED = 1 << 2,
    }
}

flags! {
    /// Signal characteristics detected alongside a format change.
    DetectedSignalFlags {
        YCBCR422 = 1 << 0,
        RGB444 = 1 << 1,
        DUAL_STREAM_3D = 1 << 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_is_big_endian() {
        assert_eq!(FourCc::new(b"v210").0, 0x7632_3130);
        assert_eq!(mode::PAL.to_string(), "pal ");
        assert_eq!(format!("{:?}", mode::HD1080P25), "FourCc(\"Hp25\")");
    }

    #[test]
    fn fourcc_display_escapes_binary() {
        assert_eq!(FourCc(0).to_string(), "\\x00\\x00\\x00\\x00");
    }

    #[test]
    fn flags_contains() {
        let flags = FrameFlags(FrameFlags::HAS_NO_INPUT_SOURCE.0 | 1);
        assert!(flags.contains(FrameFlags::HAS_NO_INPUT_SOURCE));
        assert!(!FrameFlags::NONE.contains(FrameFlags::HAS_NO_INPUT_SOURCE));
        let events = FormatChangedEvents(
            FormatChangedEvents::DISPLAY_MODE_CHANGED.0 | FormatChangedEvents::COLORSPACE_CHANGED.0,
        );
        assert!(events.contains(FormatChangedEvents::COLORSPACE_CHANGED));
        assert!(!events.contains(FormatChangedEvents::FIELD_DOMINANCE_CHANGED));
    }
}
