//! A software middleware behaving like a set-top box with the front-ends and
//! services listed in the config.
//!
//! It has a single demux, decoder, output and mass storage device, allocates
//! route handles on demand and generates present/following events of a fixed
//! duration aligned to the wall clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use chrono::DateTime;
use chrono::FixedOffset;
use url::Url;

use crate::config::SimulatorConfig;
use crate::error::Error;
use crate::middleware::*;
use crate::models::*;

const DUMMY_SERVICE_NAME: &str = "IP";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum RouteKind {
    Live { frontend: u32 },
    Record { frontend: u32 },
    Playback,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Playing {
    Service { list: usize, index: usize },
    Url(Url),
}

#[derive(Default)]
struct EventList {
    listener: Option<Arc<dyn EpgListener>>,
}

#[derive(Default)]
struct State {
    next_route: u16,
    routes: HashMap<RouteKind, RouteId>,
    playing: HashMap<RouteId, Playing>,
    blanked: HashMap<RouteId, bool>,
    next_filter: i32,
    event_lists: HashMap<EpgFilterId, EventList>,
}

impl State {
    fn route(&mut self, kind: RouteKind) -> RouteId {
        if let Some(route) = self.routes.get(&kind) {
            return *route;
        }
        let route = RouteId::from(self.next_route);
        self.next_route += 1;
        self.routes.insert(kind, route);
        tracing::debug!(?kind, %route, "Allocated route");
        route
    }

    fn kind_of(&self, route: RouteId) -> Option<RouteKind> {
        self.routes
            .iter()
            .find_map(|(kind, id)| if *id == route { Some(*kind) } else { None })
    }
}

pub struct SimulatedMiddleware {
    frontends: Vec<FrontendDescriptor>,
    services: Vec<ServiceDescriptor>,
    has_dummy_entry: bool,
    event_duration: chrono::Duration,
    fixed_time: Option<DateTime<FixedOffset>>,
    state: Mutex<State>,
}

impl SimulatedMiddleware {
    pub fn new(config: &SimulatorConfig) -> Result<Self, Error> {
        let frontends: Vec<FrontendDescriptor> = config
            .frontends
            .iter()
            .enumerate()
            .map(|(i, frontend)| FrontendDescriptor {
                id: i as u32,
                types: frontend.types.clone(),
            })
            .collect();

        let has_ip = frontends
            .iter()
            .any(|frontend| frontend.types.contains(&SourceType::Ip));
        let has_broadcast = frontends
            .iter()
            .any(|frontend| frontend.types.iter().any(SourceType::is_broadcast));

        let has_dummy_entry = has_ip && has_broadcast;
        let mut services = vec![];
        if has_dummy_entry {
            services.push(ServiceDescriptor {
                name: DUMMY_SERVICE_NAME.to_string(),
                source_type: SourceType::Ip,
                index: 0,
            });
        }
        for service in config.services.iter() {
            services.push(ServiceDescriptor {
                name: service.name.clone(),
                source_type: service.source_type,
                index: services.len(),
            });
        }

        let event_duration = chrono::Duration::from_std(config.epg.event_duration)
            .map_err(|err| anyhow::anyhow!("Invalid event duration: {err}"))?;

        tracing::debug!(
            frontends.len = frontends.len(),
            services.len = services.len(),
            "Created simulated middleware"
        );

        Ok(SimulatedMiddleware {
            frontends,
            services,
            has_dummy_entry,
            event_duration,
            fixed_time: None,
            state: Default::default(),
        })
    }

    /// Freezes the clock of the middleware.
    pub fn with_time(mut self, time: DateTime<FixedOffset>) -> Self {
        self.fixed_time = Some(time);
        self
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn playing(&self, route: RouteId) -> Option<Playing> {
        self.state().playing.get(&route).cloned()
    }

    pub fn is_video_blanked(&self, route: RouteId) -> Option<bool> {
        self.state().blanked.get(&route).cloned()
    }

    pub fn has_event_list(&self, filter: EpgFilterId) -> bool {
        self.state().event_lists.contains_key(&filter)
    }

    pub fn has_epg_listener(&self, filter: EpgFilterId) -> bool {
        self.state()
            .event_lists
            .get(&filter)
            .is_some_and(|list| list.listener.is_some())
    }

    /// Fires the EPG listeners as if new EIT sections had been received.
    pub fn notify_epg_updated(&self) {
        // Listeners are called without the lock held.
        let listeners: Vec<_> = self
            .state()
            .event_lists
            .values()
            .filter_map(|list| list.listener.clone())
            .collect();
        tracing::debug!(listeners.len = listeners.len(), "Notify EPG update");
        for listener in listeners {
            listener.now_next_updated();
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn frontend(&self, id: u32) -> Result<&FrontendDescriptor, Error> {
        self.frontends
            .get(id as usize)
            .ok_or(Error::ResourceUnavailable)
    }

    fn check_single_device(index: u32) -> Result<(), Error> {
        if index == 0 {
            Ok(())
        } else {
            Err(Error::ResourceUnavailable)
        }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        self.fixed_time
            .unwrap_or_else(|| chrono::Local::now().fixed_offset())
    }

    fn make_event(&self, service: &ServiceDescriptor, slot: i64) -> Result<EpgEvent, Error> {
        let now = self.now();
        let duration_secs = self.event_duration.num_seconds().max(1);
        let slot_start = now.timestamp().div_euclid(duration_secs) * duration_secs;
        let start_secs = slot_start + slot * duration_secs;
        let start_time = DateTime::from_timestamp(start_secs, 0)
            .ok_or_else(|| Error::Middleware(format!("Invalid timestamp: {start_secs}")))?
            .with_timezone(now.offset());
        let end_time = start_time + self.event_duration;
        Ok(EpgEvent {
            name: format!("{} {}", service.name, start_time.format("%H:%M")),
            description: format!("Program on {}", service.name),
            start_time,
            end_time,
        })
    }
}

impl RouteControl for SimulatedMiddleware {
    fn frontend_count(&self) -> Result<usize, Error> {
        Ok(self.frontends.len())
    }

    fn frontend_descriptor(&self, index: usize) -> Result<FrontendDescriptor, Error> {
        self.frontends
            .get(index)
            .cloned()
            .ok_or(Error::ResourceUnavailable)
    }

    fn demux_descriptor(&self, index: usize) -> Result<DemuxDescriptor, Error> {
        Self::check_single_device(index as u32)?;
        Ok(DemuxDescriptor { id: 0 })
    }

    fn decoder_descriptor(&self, index: usize) -> Result<DecoderDescriptor, Error> {
        Self::check_single_device(index as u32)?;
        Ok(DecoderDescriptor { id: 0 })
    }

    fn output_descriptor(&self, index: usize) -> Result<OutputDescriptor, Error> {
        Self::check_single_device(index as u32)?;
        Ok(OutputDescriptor { id: 0 })
    }

    fn mass_storage_descriptor(&self, index: usize) -> Result<MassStorageDescriptor, Error> {
        Self::check_single_device(index as u32)?;
        Ok(MassStorageDescriptor { id: 0 })
    }

    fn live_route(&self, frontend: u32, demux: u32, decoder: u32) -> Result<RouteId, Error> {
        self.frontend(frontend)?;
        Self::check_single_device(demux)?;
        Self::check_single_device(decoder)?;
        Ok(self.state().route(RouteKind::Live { frontend }))
    }

    fn record_route(
        &self,
        frontend: u32,
        demux: u32,
        mass_storage: u32,
    ) -> Result<RouteId, Error> {
        self.frontend(frontend)?;
        Self::check_single_device(demux)?;
        Self::check_single_device(mass_storage)?;
        Ok(self.state().route(RouteKind::Record { frontend }))
    }

    fn playback_route(
        &self,
        mass_storage: u32,
        demux: u32,
        decoder: u32,
    ) -> Result<RouteId, Error> {
        Self::check_single_device(mass_storage)?;
        Self::check_single_device(demux)?;
        Self::check_single_device(decoder)?;
        Ok(self.state().route(RouteKind::Playback))
    }
}

impl ServiceControl for SimulatedMiddleware {
    fn service_list_count(&self, list: usize) -> Result<usize, Error> {
        if list != 0 {
            return Err(Error::ServiceNotFound);
        }
        Ok(self.services.len())
    }

    fn service_descriptor(&self, list: usize, index: usize) -> Result<ServiceDescriptor, Error> {
        if list != 0 {
            return Err(Error::ServiceNotFound);
        }
        self.services
            .get(index)
            .cloned()
            .ok_or(Error::ServiceNotFound)
    }

    fn start_service(&self, route: RouteId, list: usize, index: usize) -> Result<(), Error> {
        let service = self.service_descriptor(list, index)?;
        let mut state = self.state();
        let Some(RouteKind::Live { frontend }) = state.kind_of(route) else {
            return Err(Error::ResourceUnavailable);
        };
        if !self.frontend(frontend)?.types.contains(&service.source_type) {
            tracing::error!(%route, service.name, %service.source_type, "Front-end cannot receive the service");
            return Err(Error::ResourceUnavailable);
        }
        tracing::debug!(%route, service.name, "Start service");
        state.playing.insert(route, Playing::Service { list, index });
        Ok(())
    }

    fn stop_service(&self, route: RouteId) -> Result<(), Error> {
        let mut state = self.state();
        if state.kind_of(route).is_none() {
            return Err(Error::ResourceUnavailable);
        }
        tracing::debug!(%route, "Stop service");
        state.playing.remove(&route);
        Ok(())
    }

    fn active_service_index(&self, route: RouteId) -> Result<i64, Error> {
        let state = self.state();
        if state.kind_of(route).is_none() {
            return Err(Error::ResourceUnavailable);
        }
        // Like real middleware, -1 is reported when no service is on air.
        match state.playing.get(&route) {
            Some(Playing::Service { index, .. }) => Ok(*index as i64),
            _ => Ok(-1),
        }
    }

    fn zap_url(&self, route: RouteId, url: &Url) -> Result<(), Error> {
        let mut state = self.state();
        let Some(RouteKind::Live { frontend }) = state.kind_of(route) else {
            return Err(Error::ResourceUnavailable);
        };
        if !self.frontend(frontend)?.types.contains(&SourceType::Ip) {
            tracing::error!(%route, %url, "Front-end cannot receive IP streams");
            return Err(Error::ResourceUnavailable);
        }
        tracing::debug!(%route, %url, "Zap to URL");
        state.playing.insert(route, Playing::Url(url.clone()));
        Ok(())
    }
}

impl EpgControl for SimulatedMiddleware {
    fn create_event_list(&self) -> Result<EpgFilterId, Error> {
        let mut state = self.state();
        let filter = EpgFilterId::from(state.next_filter);
        state.next_filter += 1;
        state.event_lists.insert(filter, Default::default());
        tracing::debug!(%filter, "Created event list");
        Ok(filter)
    }

    fn release_event_list(&self, filter: EpgFilterId) -> Result<(), Error> {
        match self.state().event_lists.remove(&filter) {
            Some(_) => {
                tracing::debug!(%filter, "Released event list");
                Ok(())
            }
            None => Err(Error::ResourceUnavailable),
        }
    }

    fn register_callback(
        &self,
        filter: EpgFilterId,
        listener: Arc<dyn EpgListener>,
    ) -> Result<(), Error> {
        match self.state().event_lists.get_mut(&filter) {
            Some(list) => {
                list.listener = Some(listener);
                Ok(())
            }
            None => Err(Error::ResourceUnavailable),
        }
    }

    fn unregister_callback(&self, filter: EpgFilterId) -> Result<(), Error> {
        match self.state().event_lists.get_mut(&filter) {
            Some(list) => {
                list.listener = None;
                Ok(())
            }
            None => Err(Error::ResourceUnavailable),
        }
    }

    fn present_following_event(
        &self,
        filter: EpgFilterId,
        index: usize,
        event_type: EpgEventType,
    ) -> Result<EpgEvent, Error> {
        if !self.has_event_list(filter) {
            return Err(Error::ResourceUnavailable);
        }
        // Events are looked up by channel number, which doesn't count the
        // placeholder service.
        let shift = if self.has_dummy_entry { 1 } else { 0 };
        let service = self.service_descriptor(0, index + shift)?;
        match event_type {
            EpgEventType::Present => self.make_event(&service, 0),
            EpgEventType::Following => self.make_event(&service, 1),
        }
    }
}

impl SetupControl for SimulatedMiddleware {
    fn time_date(&self) -> Result<DateTime<FixedOffset>, Error> {
        Ok(self.now())
    }
}

impl VideoControl for SimulatedMiddleware {
    fn video_blank(&self, route: RouteId, enabled: bool) -> Result<(), Error> {
        let mut state = self.state();
        if state.kind_of(route).is_none() {
            return Err(Error::ResourceUnavailable);
        }
        tracing::debug!(%route, enabled, "Video blank");
        state.blanked.insert(route, enabled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrontendConfig;
    use crate::config::ServiceConfig;
    use assert_matches::assert_matches;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use test_log::test;

    fn config(frontends: Vec<Vec<SourceType>>, services: Vec<(&str, SourceType)>) -> SimulatorConfig {
        SimulatorConfig {
            frontends: frontends
                .into_iter()
                .map(|types| FrontendConfig { types })
                .collect(),
            services: services
                .into_iter()
                .map(|(name, source_type)| ServiceConfig {
                    name: name.to_string(),
                    source_type,
                })
                .collect(),
            epg: Default::default(),
        }
    }

    #[test]
    fn test_services_with_dummy_entry() {
        let sim = SimulatedMiddleware::new(&config(
            vec![vec![SourceType::Ter], vec![SourceType::Ip]],
            vec![("one", SourceType::Ter), ("two", SourceType::Ter)],
        ))
        .unwrap();
        assert_eq!(sim.service_list_count(0).unwrap(), 3);
        assert_eq!(sim.service_descriptor(0, 0).unwrap().name, DUMMY_SERVICE_NAME);
        assert_matches!(sim.service_descriptor(0, 1), Ok(service) => {
            assert_eq!(service.name, "one");
            assert_eq!(service.index, 1);
        });
        assert_matches!(sim.service_descriptor(0, 3), Err(Error::ServiceNotFound));
        assert_matches!(sim.service_list_count(1), Err(Error::ServiceNotFound));
    }

    #[test]
    fn test_services_without_dummy_entry() {
        let sim = SimulatedMiddleware::new(&config(
            vec![vec![SourceType::Sat]],
            vec![("one", SourceType::Sat)],
        ))
        .unwrap();
        assert_eq!(sim.service_list_count(0).unwrap(), 1);
        assert_eq!(sim.service_descriptor(0, 0).unwrap().name, "one");
    }

    #[test]
    fn test_routes() {
        let sim = SimulatedMiddleware::new(&config(
            vec![vec![SourceType::Ter], vec![SourceType::Ip]],
            vec![],
        ))
        .unwrap();
        let live0 = sim.live_route(0, 0, 0).unwrap();
        let live1 = sim.live_route(1, 0, 0).unwrap();
        assert_ne!(live0, live1);
        assert_eq!(sim.live_route(0, 0, 0).unwrap(), live0);
        assert_ne!(sim.record_route(0, 0, 0).unwrap(), live0);
        assert_matches!(sim.live_route(2, 0, 0), Err(Error::ResourceUnavailable));
        assert_matches!(sim.live_route(0, 1, 0), Err(Error::ResourceUnavailable));
        assert_matches!(sim.demux_descriptor(1), Err(Error::ResourceUnavailable));
        assert_matches!(sim.playback_route(0, 0, 0), Ok(_));
    }

    #[test]
    fn test_start_service() {
        let sim = SimulatedMiddleware::new(&config(
            vec![vec![SourceType::Ter], vec![SourceType::Ip]],
            vec![("one", SourceType::Ter), ("sat", SourceType::Sat)],
        ))
        .unwrap();
        let ter = sim.live_route(0, 0, 0).unwrap();
        let ip = sim.live_route(1, 0, 0).unwrap();
        let record = sim.record_route(0, 0, 0).unwrap();

        assert_eq!(sim.active_service_index(ter).unwrap(), -1);
        assert_matches!(sim.start_service(ter, 0, 1), Ok(()));
        assert_eq!(sim.playing(ter), Some(Playing::Service { list: 0, index: 1 }));
        assert_eq!(sim.active_service_index(ter).unwrap(), 1);

        assert_matches!(sim.start_service(ip, 0, 1), Err(Error::ResourceUnavailable));
        assert_matches!(sim.start_service(ter, 0, 2), Err(Error::ResourceUnavailable));
        assert_matches!(sim.start_service(record, 0, 1), Err(Error::ResourceUnavailable));
        assert_matches!(sim.start_service(ter, 0, 9), Err(Error::ServiceNotFound));

        assert_matches!(sim.stop_service(ter), Ok(()));
        assert_eq!(sim.playing(ter), None);
        assert_eq!(sim.active_service_index(ter).unwrap(), -1);
    }

    #[test]
    fn test_zap_url() {
        let sim = SimulatedMiddleware::new(&config(
            vec![vec![SourceType::Ter], vec![SourceType::Ip]],
            vec![],
        ))
        .unwrap();
        let ter = sim.live_route(0, 0, 0).unwrap();
        let ip = sim.live_route(1, 0, 0).unwrap();
        let url = Url::parse("udp://239.0.0.1:1234").unwrap();

        assert_matches!(sim.zap_url(ip, &url), Ok(()));
        assert_eq!(sim.playing(ip), Some(Playing::Url(url.clone())));
        assert_eq!(sim.active_service_index(ip).unwrap(), -1);
        assert_matches!(sim.zap_url(ter, &url), Err(Error::ResourceUnavailable));
    }

    #[test]
    fn test_epg() {
        let time = DateTime::parse_from_rfc3339("2024-01-01T12:10:00+09:00").unwrap();
        let sim = SimulatedMiddleware::new(&config(
            vec![vec![SourceType::Ter]],
            vec![("one", SourceType::Ter)],
        ))
        .unwrap()
        .with_time(time);

        let filter = sim.create_event_list().unwrap();
        assert!(sim.has_event_list(filter));

        assert_matches!(sim.present_following_event(filter, 0, EpgEventType::Present), Ok(event) => {
            assert_eq!(event.name, "one 12:00");
            assert_eq!(event.start_time, DateTime::parse_from_rfc3339("2024-01-01T12:00:00+09:00").unwrap());
            assert_eq!(event.end_time, DateTime::parse_from_rfc3339("2024-01-01T12:30:00+09:00").unwrap());
        });
        assert_matches!(sim.present_following_event(filter, 0, EpgEventType::Following), Ok(event) => {
            assert_eq!(event.name, "one 12:30");
            assert_eq!(event.start_time, DateTime::parse_from_rfc3339("2024-01-01T12:30:00+09:00").unwrap());
        });
        assert_matches!(
            sim.present_following_event(filter, 1, EpgEventType::Present),
            Err(Error::ServiceNotFound)
        );
        assert_eq!(sim.time_date().unwrap(), time);

        assert_matches!(sim.release_event_list(filter), Ok(()));
        assert!(!sim.has_event_list(filter));
        assert_matches!(sim.release_event_list(filter), Err(Error::ResourceUnavailable));
        assert_matches!(
            sim.present_following_event(filter, 0, EpgEventType::Present),
            Err(Error::ResourceUnavailable)
        );
    }

    #[test]
    fn test_epg_with_dummy_entry() {
        let time = DateTime::parse_from_rfc3339("2024-01-01T12:10:00+09:00").unwrap();
        let sim = SimulatedMiddleware::new(&config(
            vec![vec![SourceType::Ter], vec![SourceType::Ip]],
            vec![("one", SourceType::Ter), ("two", SourceType::Ter)],
        ))
        .unwrap()
        .with_time(time);

        let filter = sim.create_event_list().unwrap();
        assert_matches!(sim.present_following_event(filter, 0, EpgEventType::Present), Ok(event) => {
            assert_eq!(event.name, "one 12:00");
        });
        assert_matches!(sim.present_following_event(filter, 1, EpgEventType::Following), Ok(event) => {
            assert_eq!(event.name, "two 12:30");
        });
        assert_matches!(
            sim.present_following_event(filter, 2, EpgEventType::Present),
            Err(Error::ServiceNotFound)
        );
    }

    #[test]
    fn test_epg_callback() {
        struct Counter(AtomicUsize);

        impl EpgListener for Counter {
            fn now_next_updated(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let sim = SimulatedMiddleware::new(&config(vec![], vec![])).unwrap();
        let filter = sim.create_event_list().unwrap();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));

        sim.notify_epg_updated();
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        assert_matches!(sim.register_callback(filter, counter.clone()), Ok(()));
        assert!(sim.has_epg_listener(filter));
        sim.notify_epg_updated();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        assert_matches!(sim.unregister_callback(filter), Ok(()));
        assert!(!sim.has_epg_listener(filter));
        sim.notify_epg_updated();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_video_blank() {
        let sim = SimulatedMiddleware::new(&config(vec![], vec![])).unwrap();
        let playback = sim.playback_route(0, 0, 0).unwrap();
        assert_eq!(sim.is_video_blanked(playback), None);
        assert_matches!(sim.video_blank(playback, false), Ok(()));
        assert_eq!(sim.is_video_blanked(playback), Some(false));
        assert_matches!(
            sim.video_blank(RouteId::from(99), true),
            Err(Error::ResourceUnavailable)
        );
    }
}
