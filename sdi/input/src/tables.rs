/*!
    Translation from abstract pipeline selections to device-native values.
*/

use std::fmt::Display;

use sdi_types::{AudioConnection, Connector, Rational, VideoConnection, VideoFormat};

use crate::error::NotFound;
use crate::native::{DisplayModeId, audio_connection, mode, video_connection};

/**
    A fixed, ordered mapping. Lookups scan front to back and the first entry
    whose key matches wins.
*/
pub struct FormatTable<K: 'static, V: 'static> {
    name: &'static str,
    entries: &'static [(K, V)],
}

impl<K, V> FormatTable<K, V>
where
    K: PartialEq + Display,
    V: Copy,
{
    pub const fn new(name: &'static str, entries: &'static [(K, V)]) -> Self {
        Self { name, entries }
    }

    pub fn lookup(&self, key: &K) -> Result<V, NotFound> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| NotFound {
                table: self.name,
                key: key.to_string(),
            })
    }

    pub fn entries(&self) -> &'static [(K, V)] {
        self.entries
    }
}

pub static VIDEO_CONNECTIONS: FormatTable<VideoConnection, u32> = FormatTable::new(
    "video connection",
    &[
        (VideoConnection::Sdi, video_connection::SDI),
        (VideoConnection::Hdmi, video_connection::HDMI),
        (VideoConnection::OpticalSdi, video_connection::OPTICAL_SDI),
        (VideoConnection::Component, video_connection::COMPONENT),
        (VideoConnection::Composite, video_connection::COMPOSITE),
        (VideoConnection::SVideo, video_connection::S_VIDEO),
    ],
);

pub static AUDIO_CONNECTIONS: FormatTable<AudioConnection, u32> = FormatTable::new(
    "audio connection",
    &[
        (AudioConnection::Embedded, audio_connection::EMBEDDED),
        (AudioConnection::AesEbu, audio_connection::AES_EBU),
        (AudioConnection::Analogue, audio_connection::ANALOG),
    ],
);

/// Display mode and nominal timebase per video format.
pub static VIDEO_FORMATS: FormatTable<VideoFormat, (DisplayModeId, Rational)> = FormatTable::new(
    "video format",
    &[
        (VideoFormat::Pal, (mode::PAL, Rational::new(1, 25))),
        (VideoFormat::Ntsc, (mode::NTSC, Rational::new(1001, 30000))),
        (VideoFormat::Hd720p50, (mode::HD720P50, Rational::new(1, 50))),
        (VideoFormat::Hd720p5994, (mode::HD720P5994, Rational::new(1001, 60000))),
        (VideoFormat::Hd720p60, (mode::HD720P60, Rational::new(1, 60))),
        (VideoFormat::Hd1080i50, (mode::HD1080I50, Rational::new(1, 25))),
        (VideoFormat::Hd1080i5994, (mode::HD1080I5994, Rational::new(1001, 30000))),
        (VideoFormat::Hd1080i60, (mode::HD1080I6000, Rational::new(1, 60))),
        (VideoFormat::Hd1080p2398, (mode::HD1080P2398, Rational::new(1001, 24000))),
        (VideoFormat::Hd1080p24, (mode::HD1080P24, Rational::new(1, 24))),
        (VideoFormat::Hd1080p25, (mode::HD1080P25, Rational::new(1, 25))),
        (VideoFormat::Hd1080p2997, (mode::HD1080P2997, Rational::new(1001, 30000))),
        (VideoFormat::Hd1080p30, (mode::HD1080P30, Rational::new(1, 30))),
        (VideoFormat::Hd1080p50, (mode::HD1080P50, Rational::new(1, 50))),
        (VideoFormat::Hd1080p5994, (mode::HD1080P5994, Rational::new(1001, 60000))),
        (VideoFormat::Hd1080p60, (mode::HD1080P6000, Rational::new(1, 60))),
        (VideoFormat::Dci2k2398, (mode::DCI2K2398, Rational::new(1001, 24000))),
        (VideoFormat::Dci2k24, (mode::DCI2K24, Rational::new(1, 24))),
        (VideoFormat::Dci2k25, (mode::DCI2K25, Rational::new(1, 25))),
    ],
);

/**
    Resolve a video or audio connector to the device-native connection value.
*/
pub fn resolve_connector(connector: Connector) -> Result<u32, NotFound> {
    match connector {
        Connector::Video(c) => VIDEO_CONNECTIONS.lookup(&c),
        Connector::Audio(c) => AUDIO_CONNECTIONS.lookup(&c),
    }
}

/**
    Resolve a video format to its native display mode and nominal timebase.
*/
pub fn resolve_video_format(format: VideoFormat) -> Result<(DisplayModeId, Rational), NotFound> {
    VIDEO_FORMATS.lookup(&format)
}
