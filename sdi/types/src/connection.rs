/*!
    Abstract input selections: connectors and video formats.

    These are the pipeline's own identifiers. Capture backends translate them
    into device-native values through their lookup tables.
*/

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant ),+ ];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| ParseError::new($kind, s))
            }
        }

        #[cfg(feature = "serde")]
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        #[cfg(feature = "serde")]
        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

named_enum! {
    /**
        Physical video input path.
    */
    VideoConnection, "video connection" {
        Sdi => "sdi",
        Hdmi => "hdmi",
        OpticalSdi => "optical-sdi",
        Component => "component",
        Composite => "composite",
        SVideo => "s-video",
    }
}

named_enum! {
    /**
        Physical audio input path.
    */
    AudioConnection, "audio connection" {
        /// Audio carried inside the SDI/HDMI signal
        Embedded => "embedded",
        AesEbu => "aes-ebu",
        Analogue => "analogue",
    }
}

named_enum! {
    /**
        Named resolution and frame-rate combinations the pipeline can request.

        Not every capture backend supports every format; backends report the
        ones they cannot map as unsupported.
    */
    VideoFormat, "video format" {
        Pal => "pal",
        Ntsc => "ntsc",
        Hd720p50 => "720p50",
        Hd720p5994 => "720p59.94",
        Hd720p60 => "720p60",
        Hd1080i50 => "1080i50",
        Hd1080i5994 => "1080i59.94",
        Hd1080i60 => "1080i60",
        Hd1080p2398 => "1080p23.98",
        Hd1080p24 => "1080p24",
        Hd1080p25 => "1080p25",
        Hd1080p2997 => "1080p29.97",
        Hd1080p30 => "1080p30",
        Hd1080p50 => "1080p50",
        Hd1080p5994 => "1080p59.94",
        Hd1080p60 => "1080p60",
        Dci2k2398 => "2k23.98",
        Dci2k24 => "2k24",
        Dci2k25 => "2k25",
        Uhd2160p25 => "2160p25",
        Uhd2160p50 => "2160p50",
        Uhd2160p5994 => "2160p59.94",
    }
}

/**
    A connector of either kind, as passed to connector lookups.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Connector {
    Video(VideoConnection),
    Audio(AudioConnection),
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video(c) => write!(f, "video connection '{c}'"),
            Self::Audio(c) => write!(f, "audio connection '{c}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("HDMI".parse::<VideoConnection>(), Ok(VideoConnection::Hdmi));
        assert_eq!(
            " aes-ebu ".parse::<AudioConnection>(),
            Ok(AudioConnection::AesEbu)
        );
        assert_eq!(
            "1080p59.94".parse::<VideoFormat>(),
            Ok(VideoFormat::Hd1080p5994)
        );
    }

    #[test]
    fn parse_unknown_reports_kind() {
        let err = "betamax".parse::<VideoFormat>().unwrap_err();
        assert_eq!(err.kind, "video format");
        assert_eq!(err.to_string(), "unknown video format 'betamax'");
    }

    #[test]
    fn format_names_are_unique() {
        let mut names: Vec<&str> = VideoFormat::ALL.iter().map(|f| f.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), VideoFormat::ALL.len());
    }

    #[test]
    fn connector_display() {
        let connector = Connector::Video(VideoConnection::OpticalSdi);
        assert_eq!(connector.to_string(), "video connection 'optical-sdi'");
    }
}
