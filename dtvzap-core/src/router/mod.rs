//! Channel navigation on top of the middleware routes.
//!
//! Broadcast services and IP channels share one 0-based channel number
//! space: broadcast services come first in service-list order, followed by
//! the IP channels supplied by the host application.  When IP coexists with
//! another source type, the middleware puts a placeholder service at the top
//! of the service list, so broadcast channel `n` is service `n + 1`.


use std::sync::Arc;

use chrono::DateTime;
use chrono::FixedOffset;

use crate::error::Error;
use crate::last_watched::LastWatchedStore;
use crate::middleware::Middleware;
use crate::models::*;
use crate::route::RouteTable;
use crate::status::StatusListener;
use crate::status::StatusNotifier;

// Only the first service list is used.
const CURRENT_LIST_INDEX: usize = 0;

pub struct ChannelRouter<M, S> {
    middleware: M,
    routes: RouteTable,
    epg_filter: EpgFilterId,
    epg_callback_registered: bool,
    ip_channels: Vec<IpChannel>,
    last_watched: S,
    notifier: StatusNotifier,
    current_live_route: Option<RouteId>,
    current_record_route: Option<RouteId>,
    // The middleware cannot tell which IP channel is on air, so it's kept here.
    current_ip_channel: Option<usize>,
}

impl<M, S> ChannelRouter<M, S>
where
    M: Middleware,
    S: LastWatchedStore,
{
    pub fn new(middleware: M, ip_channels: Vec<IpChannel>, last_watched: S) -> Result<Self, Error> {
        let routes = RouteTable::discover(&middleware)?;
        let epg_filter = middleware.create_event_list()?;
        tracing::info!(
            has_ip = routes.has_ip(),
            has_broadcast = routes.has_broadcast(),
            has_dummy_entry = routes.has_dummy_entry(),
            ip_channels.len = ip_channels.len(),
            %epg_filter,
            "Initialized channel router"
        );
        Ok(ChannelRouter {
            middleware,
            routes,
            epg_filter,
            epg_callback_registered: false,
            ip_channels,
            last_watched,
            notifier: Default::default(),
            current_live_route: None,
            current_record_route: None,
            current_ip_channel: None,
        })
    }

    /// Forwards EPG updates from the middleware to the status listener.
    pub fn register_epg_callback(&mut self) -> Result<(), Error> {
        if self.epg_callback_registered {
            tracing::debug!(epg_filter = %self.epg_filter, "EPG callback already registered");
            return Ok(());
        }
        self.middleware
            .register_callback(self.epg_filter, Arc::new(self.notifier.clone()))?;
        self.epg_callback_registered = true;
        tracing::debug!(
            epg_filter = %self.epg_filter,
            has_listener = self.notifier.has_listener(),
            "Registered EPG callback"
        );
        Ok(())
    }

    /// Stops playback and releases the EPG resources.
    ///
    /// Every step runs even if an earlier one fails.  The first error is
    /// returned.
    pub fn stop(self) -> Result<(), Error> {
        let mut result = Ok(());
        if let Some(route) = self.routes.playback_route() {
            result = result.and(
                self.middleware
                    .video_blank(route, false)
                    .inspect_err(|err| tracing::error!(%err, %route, "Failed to unblank video")),
            );
        }
        if let Some(route) = self.current_live_route {
            result = result.and(
                self.middleware
                    .stop_service(route)
                    .inspect_err(|err| tracing::error!(%err, %route, "Failed to stop service")),
            );
        }
        if self.epg_callback_registered {
            result = result.and(
                self.middleware
                    .unregister_callback(self.epg_filter)
                    .inspect_err(|err| {
                        tracing::error!(%err, epg_filter = %self.epg_filter, "Failed to unregister EPG callback")
                    }),
            );
        }
        result = result.and(
            self.middleware
                .release_event_list(self.epg_filter)
                .inspect_err(|err| {
                    tracing::error!(%err, epg_filter = %self.epg_filter, "Failed to release event list")
                }),
        );
        tracing::info!("Stopped channel router");
        result
    }

    pub fn change_channel_up(&mut self) -> Result<Option<ChannelInfo>, Error> {
        let current = self.current_or_last_watched()?;
        if self.channel_list_size()? == 0 {
            return Ok(None);
        }
        self.change_channel_by_number(current as i64 + 1)
    }

    pub fn change_channel_down(&mut self) -> Result<Option<ChannelInfo>, Error> {
        let current = self.current_or_last_watched()?;
        if self.channel_list_size()? == 0 {
            return Ok(None);
        }
        self.change_channel_by_number(current as i64 - 1)
    }

    /// Tunes to `number`, wrapping around the channel list in both directions.
    ///
    /// Returns `None` when there is no channel at all or when no live route
    /// exists for the source type of the selected service.
    pub fn change_channel_by_number(&mut self, number: i64) -> Result<Option<ChannelInfo>, Error> {
        let size = self.channel_list_size()?;
        if size == 0 {
            tracing::warn!("No channel available");
            return Ok(None);
        }
        let index = number.rem_euclid(size as i64) as usize;
        let num_dtv_channels = self.dtv_channel_count(size);

        if index < num_dtv_channels {
            let service_index = index + self.dummy_shift();
            let service = self
                .middleware
                .service_descriptor(CURRENT_LIST_INDEX, service_index)?;
            let Some(live) = self.routes.live_route(service.source_type) else {
                tracing::warn!(
                    channel.index = index,
                    %service.source_type,
                    "No live route for the source type"
                );
                return Ok(None);
            };
            self.current_live_route = Some(live);
            self.current_record_route = self.routes.record_route(service.source_type);
            self.current_ip_channel = None;
            self.middleware
                .start_service(live, CURRENT_LIST_INDEX, service_index)?;
            tracing::info!(
                channel.index = index,
                channel.name = service.name,
                %service.source_type,
                route = %live,
                "Started service"
            );
        } else {
            let Some(live) = self.routes.live_route(SourceType::Ip) else {
                tracing::warn!(channel.index = index, "No live route for IP");
                return Ok(None);
            };
            let channel = self
                .ip_channels
                .get(index - num_dtv_channels)
                .ok_or(Error::ChannelNotFound)?;
            self.current_live_route = Some(live);
            self.current_record_route = self.routes.record_route(SourceType::Ip);
            self.current_ip_channel = Some(index);
            self.middleware.zap_url(live, &channel.url)?;
            tracing::info!(
                channel.index = index,
                channel.name = channel.name,
                %channel.url,
                route = %live,
                "Zapped to URL"
            );
        }

        self.notifier.age_locked(false);
        self.last_watched.set(index)?;
        self.channel_info(index, ChannelInfoMode::Change)
    }

    pub fn channel_list_size(&self) -> Result<usize, Error> {
        let service_count = self.middleware.service_list_count(CURRENT_LIST_INDEX)?;
        let size = if self.routes.has_dummy_entry() {
            service_count.saturating_sub(1) + self.ip_channels.len()
        } else if self.routes.has_ip() {
            self.ip_channels.len()
        } else {
            service_count
        };
        Ok(size)
    }

    pub fn channel_names(&self) -> Result<Vec<String>, Error> {
        let size = self.channel_list_size()?;
        let shift = self.dummy_shift();
        let mut names = Vec::with_capacity(size);
        for i in shift..(self.dtv_channel_count(size) + shift) {
            names.push(
                self.middleware
                    .service_descriptor(CURRENT_LIST_INDEX, i)?
                    .name,
            );
        }
        if self.routes.has_ip() {
            names.extend(self.ip_channels.iter().map(|channel| channel.name.clone()));
        }
        Ok(names)
    }

    pub fn current_channel_number(&self) -> Result<CurrentChannel, Error> {
        let Some(live) = self.current_live_route else {
            return Ok(CurrentChannel::Unresolved);
        };
        if self.routes.live_route(SourceType::Ip) == Some(live) {
            if let Some(index) = self.current_ip_channel {
                return Ok(CurrentChannel::Index(index));
            }
        }
        let index = self.middleware.active_service_index(live)? - self.dummy_shift() as i64;
        if index < 0 {
            tracing::warn!(index, route = %live, "Middleware reported an invalid active service");
            return Ok(CurrentChannel::Unresolved);
        }
        Ok(CurrentChannel::Index(index as usize))
    }

    pub fn channel_info(
        &self,
        number: usize,
        mode: ChannelInfoMode,
    ) -> Result<Option<ChannelInfo>, Error> {
        let size = self.channel_list_size()?;
        if number >= size {
            return Ok(None);
        }
        let num_dtv_channels = self.dtv_channel_count(size);

        if number < num_dtv_channels {
            let service = self
                .middleware
                .service_descriptor(CURRENT_LIST_INDEX, number + self.dummy_shift())?;
            let mut info = ChannelInfo::new(number, service.name);
            // The EPG is keyed by the channel number, not by the service index.
            if mode == ChannelInfoMode::Status {
                info.present = Some(self.middleware.present_following_event(
                    self.epg_filter,
                    number,
                    EpgEventType::Present,
                )?);
                info.following = Some(self.middleware.present_following_event(
                    self.epg_filter,
                    number,
                    EpgEventType::Following,
                )?);
            }
            Ok(Some(info))
        } else {
            let channel = self
                .ip_channels
                .get(number - num_dtv_channels)
                .ok_or(Error::ChannelNotFound)?;
            Ok(Some(ChannelInfo::new(number, channel.name.clone())))
        }
    }

    pub fn current_time(&self) -> Result<DateTime<FixedOffset>, Error> {
        self.middleware.time_date()
    }

    pub fn set_status_listener(&self, listener: Option<Arc<dyn StatusListener>>) {
        self.notifier.set_listener(listener);
    }

    pub fn update_now_next(&self) {
        self.notifier.update_now_next();
    }

    pub fn update_age_locked(&self, locked: bool) {
        self.notifier.age_locked(locked);
    }

    pub fn update_channel_locked(&self, locked: bool) {
        self.notifier.channel_locked(locked);
    }

    pub fn last_watched(&self) -> usize {
        self.last_watched.get()
    }

    pub fn has_dummy_entry(&self) -> bool {
        self.routes.has_dummy_entry()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn current_live_route(&self) -> Option<RouteId> {
        self.current_live_route
    }

    pub fn current_record_route(&self) -> Option<RouteId> {
        self.current_record_route
    }

    pub fn ip_channels(&self) -> &[IpChannel] {
        &self.ip_channels
    }

    pub fn set_ip_channels(&mut self, ip_channels: Vec<IpChannel>) {
        tracing::debug!(ip_channels.len = ip_channels.len(), "Updated IP channels");
        self.ip_channels = ip_channels;
    }

    pub fn middleware(&self) -> &M {
        &self.middleware
    }

    fn current_or_last_watched(&self) -> Result<usize, Error> {
        match self.current_channel_number()? {
            CurrentChannel::Index(index) => Ok(index),
            CurrentChannel::Unresolved => {
                let index = self.last_watched.get();
                tracing::debug!(index, "Use the last watched channel");
                Ok(index)
            }
        }
    }

    fn dummy_shift(&self) -> usize {
        if self.routes.has_dummy_entry() { 1 } else { 0 }
    }

    fn dtv_channel_count(&self, size: usize) -> usize {
        if self.routes.has_ip() {
            size.saturating_sub(self.ip_channels.len())
        } else {
            size
        }
    }
}
