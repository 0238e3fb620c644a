//! Interfaces of the DTV middleware driven by the channel router.
//!
//! The middleware owns tuners, demultiplexers, decoders, service lists and
//! the EPG database.  The router only talks to it through the traits below,
//! each of which mirrors one control block of the middleware.

use std::sync::Arc;

use chrono::DateTime;
use chrono::FixedOffset;
use url::Url;

use crate::error::Error;
use crate::models::*;

/// Receives EPG update notifications.
///
/// The middleware may call this from any of its own threads.
pub trait EpgListener: Send + Sync {
    fn now_next_updated(&self);
}

pub trait RouteControl {
    fn frontend_count(&self) -> Result<usize, Error>;
    fn frontend_descriptor(&self, index: usize) -> Result<FrontendDescriptor, Error>;
    fn demux_descriptor(&self, index: usize) -> Result<DemuxDescriptor, Error>;
    fn decoder_descriptor(&self, index: usize) -> Result<DecoderDescriptor, Error>;
    fn output_descriptor(&self, index: usize) -> Result<OutputDescriptor, Error>;
    fn mass_storage_descriptor(&self, index: usize) -> Result<MassStorageDescriptor, Error>;

    /// Builds a front-end -> demux -> decoder path.
    fn live_route(&self, frontend: u32, demux: u32, decoder: u32) -> Result<RouteId, Error>;

    /// Builds a front-end -> demux -> mass storage path.
    fn record_route(&self, frontend: u32, demux: u32, mass_storage: u32)
    -> Result<RouteId, Error>;

    /// Builds a mass storage -> demux -> decoder path.
    fn playback_route(&self, mass_storage: u32, demux: u32, decoder: u32)
    -> Result<RouteId, Error>;
}

pub trait ServiceControl {
    fn service_list_count(&self, list: usize) -> Result<usize, Error>;
    fn service_descriptor(&self, list: usize, index: usize) -> Result<ServiceDescriptor, Error>;
    fn start_service(&self, route: RouteId, list: usize, index: usize) -> Result<(), Error>;
    fn stop_service(&self, route: RouteId) -> Result<(), Error>;

    /// Returns the list index of the service currently played on `route`.
    ///
    /// Some middleware builds report a negative index right after a zap, so
    /// the value is signed.
    fn active_service_index(&self, route: RouteId) -> Result<i64, Error>;

    fn zap_url(&self, route: RouteId, url: &Url) -> Result<(), Error>;
}

pub trait EpgControl {
    fn create_event_list(&self) -> Result<EpgFilterId, Error>;
    fn release_event_list(&self, filter: EpgFilterId) -> Result<(), Error>;
    fn register_callback(
        &self,
        filter: EpgFilterId,
        listener: Arc<dyn EpgListener>,
    ) -> Result<(), Error>;
    fn unregister_callback(&self, filter: EpgFilterId) -> Result<(), Error>;
    fn present_following_event(
        &self,
        filter: EpgFilterId,
        index: usize,
        event_type: EpgEventType,
    ) -> Result<EpgEvent, Error>;
}

pub trait SetupControl {
    fn time_date(&self) -> Result<DateTime<FixedOffset>, Error>;
}

pub trait VideoControl {
    fn video_blank(&self, route: RouteId, enabled: bool) -> Result<(), Error>;
}

pub trait Middleware:
    RouteControl + ServiceControl + EpgControl + SetupControl + VideoControl
{
}

impl<T> Middleware for T where
    T: RouteControl + ServiceControl + EpgControl + SetupControl + VideoControl
{
}

// </coverage:exclude>
