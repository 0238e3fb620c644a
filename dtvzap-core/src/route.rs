use crate::error::Error;
use crate::middleware::RouteControl;
use crate::models::*;

// Routes are always built on the first demux, decoder, output and mass
// storage device.
const DESCRIPTOR_INDEX: usize = 0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct RoutePair {
    live: Option<RouteId>,
    record: Option<RouteId>,
}

/// Live and record routes for each source type found on the front-ends.
///
/// Built once by [`RouteTable::discover`] and never modified afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteTable {
    sat: RoutePair,
    cab: RoutePair,
    ter: RoutePair,
    ip: RoutePair,
    playback: Option<RouteId>,
}

impl RouteTable {
    pub fn discover<R>(control: &R) -> Result<Self, Error>
    where
        R: RouteControl + ?Sized,
    {
        let demux = control.demux_descriptor(DESCRIPTOR_INDEX)?;
        let decoder = control.decoder_descriptor(DESCRIPTOR_INDEX)?;
        // Not used for building routes, but the middleware expects it to be
        // queried before any route is requested.
        let _output = control.output_descriptor(DESCRIPTOR_INDEX)?;
        let mass_storage = control.mass_storage_descriptor(DESCRIPTOR_INDEX)?;

        let mut table = RouteTable::default();

        let num_frontends = control.frontend_count()?;
        tracing::debug!(num_frontends, "Enumerating front-ends");
        for i in 0..num_frontends {
            let frontend = control.frontend_descriptor(i)?;
            for source_type in frontend.types.iter().cloned() {
                let Some(pair) = table.pair_mut(source_type) else {
                    tracing::debug!(frontend.id, %source_type, "Ignore unsupported source type");
                    continue;
                };
                if pair.live.is_none() {
                    pair.live = Some(control.live_route(frontend.id, demux.id, decoder.id)?);
                } else {
                    tracing::debug!(frontend.id, %source_type, "Live route already resolved");
                }
                if pair.record.is_none() {
                    pair.record =
                        Some(control.record_route(frontend.id, demux.id, mass_storage.id)?);
                }
            }
        }

        table.playback = Some(control.playback_route(mass_storage.id, demux.id, decoder.id)?);

        tracing::debug!(
            live.sat = ?table.sat.live,
            live.cab = ?table.cab.live,
            live.ter = ?table.ter.live,
            live.ip = ?table.ip.live,
            "Live routes"
        );
        tracing::debug!(
            record.sat = ?table.sat.record,
            record.cab = ?table.cab.record,
            record.ter = ?table.ter.record,
            record.ip = ?table.ip.record,
            playback = ?table.playback,
            "Record and playback routes"
        );

        Ok(table)
    }

    fn pair(&self, source_type: SourceType) -> Option<&RoutePair> {
        match source_type {
            SourceType::Sat => Some(&self.sat),
            SourceType::Cab => Some(&self.cab),
            SourceType::Ter => Some(&self.ter),
            SourceType::Ip => Some(&self.ip),
            SourceType::Undefined => None,
        }
    }

    fn pair_mut(&mut self, source_type: SourceType) -> Option<&mut RoutePair> {
        match source_type {
            SourceType::Sat => Some(&mut self.sat),
            SourceType::Cab => Some(&mut self.cab),
            SourceType::Ter => Some(&mut self.ter),
            SourceType::Ip => Some(&mut self.ip),
            SourceType::Undefined => None,
        }
    }

    pub fn live_route(&self, source_type: SourceType) -> Option<RouteId> {
        self.pair(source_type).and_then(|pair| pair.live)
    }

    pub fn record_route(&self, source_type: SourceType) -> Option<RouteId> {
        self.pair(source_type).and_then(|pair| pair.record)
    }

    pub fn playback_route(&self) -> Option<RouteId> {
        self.playback
    }

    pub fn has_ip(&self) -> bool {
        self.ip.live.is_some()
    }

    pub fn has_broadcast(&self) -> bool {
        self.sat.live.is_some() || self.cab.live.is_some() || self.ter.live.is_some()
    }

    /// True when the middleware puts a placeholder service at the top of the
    /// broadcast service list.  This happens when IP coexists with another
    /// source type.
    pub fn has_dummy_entry(&self) -> bool {
        self.has_ip() && self.has_broadcast()
    }
}
