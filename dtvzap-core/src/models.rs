use std::fmt;

use chrono::DateTime;
use chrono::FixedOffset;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceType {
    Sat,
    Cab,
    Ter,
    Ip,
    Undefined,
}

impl SourceType {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, SourceType::Sat | SourceType::Cab | SourceType::Ter)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SourceType::Sat => write!(f, "SAT"),
            SourceType::Cab => write!(f, "CAB"),
            SourceType::Ter => write!(f, "TER"),
            SourceType::Ip => write!(f, "IP"),
            SourceType::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

// The middleware hands out route handles as plain integers and uses -1 for
// "no route".  The sentinel never leaves the middleware boundary.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct RouteId(i32);

impl RouteId {
    pub fn from_raw(raw: i32) -> Option<Self> {
        if raw < 0 { None } else { Some(RouteId(raw)) }
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

impl From<u16> for RouteId {
    fn from(value: u16) -> Self {
        Self(value as i32)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct EpgFilterId(i32);

impl EpgFilterId {
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for EpgFilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter#{}", self.0)
    }
}

impl From<i32> for EpgFilterId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

// descriptors

#[derive(Clone, Debug, PartialEq)]
pub struct FrontendDescriptor {
    pub id: u32,
    pub types: Vec<SourceType>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DemuxDescriptor {
    pub id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecoderDescriptor {
    pub id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputDescriptor {
    pub id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MassStorageDescriptor {
    pub id: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub source_type: SourceType,
    /// Position of the service in its service list.
    pub index: usize,
}

// channels

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct IpChannel {
    pub name: String,
    pub url: Url,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EpgEventType {
    Present,
    Following,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpgEvent {
    pub name: String,
    pub description: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelInfoMode {
    /// Name only, used right after a channel change.
    Change,
    /// Name together with the present and following events.
    Status,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    /// 1-based number shown to the user.
    pub number: usize,
    pub name: String,
    pub present: Option<EpgEvent>,
    pub following: Option<EpgEvent>,
}

impl ChannelInfo {
    pub fn new(index: usize, name: String) -> Self {
        ChannelInfo {
            number: index + 1,
            name,
            present: None,
            following: None,
        }
    }

    pub fn index(&self) -> usize {
        self.number - 1
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CurrentChannel {
    Index(usize),
    /// The middleware could not tell which channel is on air.  Callers fall
    /// back to the last watched channel.
    Unresolved,
}
