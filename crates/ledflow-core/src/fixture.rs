//! Fixture registry and universe allocation
//!
//! Every fixture owns one or more [`UniverseAllocation`]s. Registration order
//! fixes the mapping between positions in a flat [`Frame`](crate::Frame) and
//! fixtures: the first fixture takes the first `pixel_count` pixels, and so on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::ops::Range;
use tracing::{debug, info};

use crate::config::FixtureConfig;
use crate::dmx::{
    DeviceInfo, DiscoveryProtocol, CHANNELS_PER_PIXEL, DEFAULT_PIXEL_COUNT,
    MAX_PIXELS_PER_UNIVERSE, MAX_UNIVERSE, UNIVERSE_SIZE,
};
use crate::pattern::{pixels_to_channels, Rgb};
use crate::{error::ControlError, Result};

/// How a fixture got into the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FixtureSource {
    Manual,
    Discovered(DiscoveryProtocol),
}

/// A contiguous run of a fixture's pixels inside one universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UniverseAllocation {
    pub universe: u16,
    /// First channel used in the universe (0-based)
    pub channel_offset: usize,
    /// Index of the first pixel of this run within the fixture
    pub first_pixel: usize,
    pub pixel_count: usize,
}

impl UniverseAllocation {
    /// Channels occupied in the universe
    pub fn channel_range(&self) -> Range<usize> {
        self.channel_offset..self.channel_offset + self.pixel_count * CHANNELS_PER_PIXEL
    }

    /// Pixels of the owning fixture carried by this universe
    pub fn pixel_range(&self) -> Range<usize> {
        self.first_pixel..self.first_pixel + self.pixel_count
    }

    /// True when both claim a channel of the same universe
    pub fn overlaps(&self, other: &UniverseAllocation) -> bool {
        let (a, b) = (self.channel_range(), other.channel_range());
        self.universe == other.universe && a.start < b.end && b.start < a.end
    }

    /// Channel data for this universe: zeros up to the offset, then R-G-B bytes.
    ///
    /// `fixture_pixels` is the fixture's whole slice of the frame.
    pub fn channel_data(&self, fixture_pixels: &[Rgb]) -> Vec<u8> {
        let mut data = vec![0u8; self.channel_offset];
        data.extend(pixels_to_channels(&fixture_pixels[self.pixel_range()]));
        data
    }
}

/// Split `pixel_count` pixels into allocations starting at `universe`/`channel_offset`
fn allocate(
    universe: u16,
    channel_offset: usize,
    pixel_count: usize,
) -> Result<Vec<UniverseAllocation>> {
    let mut allocations = Vec::new();
    let mut universe = universe as u32;
    let mut offset = channel_offset;
    let mut first_pixel = 0;

    while first_pixel < pixel_count {
        if universe > MAX_UNIVERSE as u32 {
            return Err(ControlError::UniverseOutOfRange(universe));
        }
        let fits = (UNIVERSE_SIZE - offset) / CHANNELS_PER_PIXEL;
        let count = fits.min(pixel_count - first_pixel);
        allocations.push(UniverseAllocation {
            universe: universe as u16,
            channel_offset: offset,
            first_pixel,
            pixel_count: count,
        });
        first_pixel += count;
        universe += 1;
        offset = 0;
    }

    Ok(allocations)
}

fn universes_needed(pixel_count: usize) -> usize {
    pixel_count.div_ceil(MAX_PIXELS_PER_UNIVERSE)
}

/// A discovery result waiting to be registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureDescriptor {
    /// Art-Net address the fixture will be driven at
    pub address: SocketAddr,
    pub name: Option<String>,
    pub pixel_count: Option<usize>,
    pub protocol: DiscoveryProtocol,
}

impl FixtureDescriptor {
    pub fn new(address: SocketAddr, info: DeviceInfo) -> Self {
        Self {
            address,
            name: info.name,
            pixel_count: info.pixel_count,
            protocol: info.protocol,
        }
    }
}

/// A registered LED fixture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fixture {
    address: SocketAddr,
    name: String,
    pixel_count: usize,
    allocations: Vec<UniverseAllocation>,
    source: FixtureSource,
    last_seen: DateTime<Utc>,
}

impl Fixture {
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// Get the total number of DMX channels for this fixture
    pub fn channel_count(&self) -> usize {
        self.pixel_count * CHANNELS_PER_PIXEL
    }

    /// First (or only) universe of the fixture
    pub fn universe(&self) -> u16 {
        self.allocations[0].universe
    }

    /// Starting channel offset in the first universe
    pub fn channel_offset(&self) -> usize {
        self.allocations[0].channel_offset
    }

    pub fn allocations(&self) -> &[UniverseAllocation] {
        &self.allocations
    }

    pub fn source(&self) -> FixtureSource {
        self.source
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }
}

fn default_name(address: SocketAddr) -> String {
    format!("Fixture-{}", address.ip())
}

/// A borrowed view of one fixture's part of a frame
#[derive(Debug, Clone, Copy)]
pub struct FixtureSlice<'a> {
    pub fixture: &'a Fixture,
    pub pixels: &'a [Rgb],
}

/// Ordered set of fixtures keyed by address
#[derive(Debug)]
pub struct FixtureRegistry {
    fixtures: Vec<Fixture>,
    next_universe: u16,
}

impl Default for FixtureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self {
            fixtures: Vec::new(),
            next_universe: 1,
        }
    }

    fn position(&self, address: SocketAddr) -> Option<usize> {
        self.fixtures.iter().position(|f| f.address == address)
    }

    fn conflict(
        &self,
        allocations: &[UniverseAllocation],
    ) -> Option<(&Fixture, UniverseAllocation)> {
        self.fixtures.iter().find_map(|fixture| {
            fixture
                .allocations
                .iter()
                .find(|existing| allocations.iter().any(|a| a.overlaps(existing)))
                .map(|existing| (fixture, *existing))
        })
    }

    /// Pick universes for a new fixture at offset 0.
    ///
    /// The last octet of an IPv4 address is tried first. Otherwise, or when that
    /// range is taken, the first free run at or after the sequential counter is used.
    fn assign_universes(
        &mut self,
        address: SocketAddr,
        pixel_count: usize,
    ) -> Result<Vec<UniverseAllocation>> {
        if let IpAddr::V4(ip) = address.ip() {
            let candidate = ip.octets()[3] as u16;
            if let Ok(allocations) = allocate(candidate, 0, pixel_count) {
                if self.conflict(&allocations).is_none() {
                    debug!("Assigned universe {} to {} from its IP", candidate, address);
                    return Ok(allocations);
                }
            }
        }

        let span = universes_needed(pixel_count);
        for start in [self.next_universe, 1] {
            let mut base = start as u32;
            while base + span as u32 - 1 <= MAX_UNIVERSE as u32 {
                let allocations = allocate(base as u16, 0, pixel_count)?;
                match self.conflict(&allocations) {
                    Some((_, taken)) => base = taken.universe as u32 + 1,
                    None => {
                        self.next_universe = (base + span as u32).min(MAX_UNIVERSE as u32) as u16;
                        info!("Using sequential universe {} for {}", base, address);
                        return Ok(allocations);
                    }
                }
            }
        }

        Err(ControlError::UniversesExhausted(span))
    }

    fn insert(&mut self, fixture: Fixture) -> &Fixture {
        info!(
            "Added fixture: {} at {} ({} pixels, universe {})",
            fixture.name,
            fixture.address,
            fixture.pixel_count,
            fixture.universe()
        );
        self.fixtures.push(fixture);
        &self.fixtures[self.fixtures.len() - 1]
    }

    /// Register a discovered fixture.
    ///
    /// Idempotent: a known address only has its last-seen time refreshed and the
    /// existing record is returned unchanged.
    pub fn add_discovered(&mut self, descriptor: FixtureDescriptor) -> Result<&Fixture> {
        if let Some(index) = self.position(descriptor.address) {
            let fixture = &mut self.fixtures[index];
            fixture.last_seen = Utc::now();
            debug!("Fixture {} seen again", fixture.address);
            return Ok(&self.fixtures[index]);
        }

        let pixel_count = descriptor.pixel_count.unwrap_or(DEFAULT_PIXEL_COUNT);
        if pixel_count == 0 {
            return Err(ControlError::InvalidParameter(format!(
                "Fixture at {} reports zero pixels",
                descriptor.address
            )));
        }
        let allocations = self.assign_universes(descriptor.address, pixel_count)?;

        Ok(self.insert(Fixture {
            address: descriptor.address,
            name: descriptor
                .name
                .unwrap_or_else(|| default_name(descriptor.address)),
            pixel_count,
            allocations,
            source: FixtureSource::Discovered(descriptor.protocol),
            last_seen: Utc::now(),
        }))
    }

    /// Register a fixture by hand using the default universe policy
    pub fn add_manual(
        &mut self,
        address: SocketAddr,
        pixel_count: usize,
        name: Option<&str>,
    ) -> Result<&Fixture> {
        self.check_new(address, pixel_count)?;
        let allocations = self.assign_universes(address, pixel_count)?;
        Ok(self.insert(Self::manual(address, pixel_count, name, allocations)))
    }

    /// Register a fixture by hand at an explicit universe and channel offset
    pub fn add_patched(
        &mut self,
        address: SocketAddr,
        pixel_count: usize,
        name: Option<&str>,
        universe: u16,
        channel_offset: usize,
    ) -> Result<&Fixture> {
        self.check_new(address, pixel_count)?;
        if channel_offset + CHANNELS_PER_PIXEL > UNIVERSE_SIZE {
            return Err(ControlError::InvalidParameter(format!(
                "Channel offset {} leaves no room for a pixel",
                channel_offset
            )));
        }

        let allocations = allocate(universe, channel_offset, pixel_count)?;
        if let Some((fixture, taken)) = self.conflict(&allocations) {
            let channels = taken.channel_range();
            return Err(ControlError::FixtureOverlap {
                address: fixture.address,
                universe: taken.universe,
                start: channels.start,
                end: channels.end,
            });
        }

        Ok(self.insert(Self::manual(address, pixel_count, name, allocations)))
    }

    fn check_new(&self, address: SocketAddr, pixel_count: usize) -> Result<()> {
        if self.position(address).is_some() {
            return Err(ControlError::DuplicateFixture(address));
        }
        if pixel_count == 0 {
            return Err(ControlError::InvalidParameter(
                "Pixel count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn manual(
        address: SocketAddr,
        pixel_count: usize,
        name: Option<&str>,
        allocations: Vec<UniverseAllocation>,
    ) -> Fixture {
        Fixture {
            address,
            name: name.map_or_else(|| default_name(address), str::to_string),
            pixel_count,
            allocations,
            source: FixtureSource::Manual,
            last_seen: Utc::now(),
        }
    }

    /// Registry holding the fixtures listed in a configuration file, in order.
    ///
    /// Entries with an explicit universe are patched there, the rest are assigned
    /// one like [`add_manual`](Self::add_manual).
    pub fn from_config(fixtures: &[FixtureConfig], default_port: u16) -> Result<Self> {
        let mut registry = Self::new();
        for fixture in fixtures {
            let address = fixture.socket_addr(default_port)?;
            let name = fixture.name.as_deref();
            match fixture.universe {
                Some(universe) => registry.add_patched(
                    address,
                    fixture.pixel_count,
                    name,
                    universe,
                    fixture.channel_offset.unwrap_or(0),
                )?,
                None => registry.add_manual(address, fixture.pixel_count, name)?,
            };
        }
        Ok(registry)
    }

    /// Remove a fixture, returning it if it was registered
    pub fn remove(&mut self, address: SocketAddr) -> Option<Fixture> {
        let index = self.position(address)?;
        let fixture = self.fixtures.remove(index);
        info!("Removed fixture {} at {}", fixture.name, fixture.address);
        Some(fixture)
    }

    /// Remove all fixtures
    pub fn clear(&mut self) {
        self.fixtures.clear();
        self.next_universe = 1;
        info!("Cleared all fixtures");
    }

    pub fn get(&self, address: SocketAddr) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.address == address)
    }

    /// All fixtures in registration order
    pub fn all(&self) -> &[Fixture] {
        &self.fixtures
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Required length of every frame
    pub fn total_pixel_count(&self) -> usize {
        self.fixtures.iter().map(|f| f.pixel_count).sum()
    }

    pub fn total_channel_count(&self) -> usize {
        self.fixtures.iter().map(Fixture::channel_count).sum()
    }

    fn check_frame(&self, frame: &[Rgb]) -> Result<()> {
        let expected = self.total_pixel_count();
        if frame.len() != expected {
            return Err(ControlError::FrameLength {
                expected,
                actual: frame.len(),
            });
        }
        Ok(())
    }

    /// The part of `frame` that belongs to `fixture`
    pub fn slice_for<'f>(&self, fixture: &Fixture, frame: &'f [Rgb]) -> Result<&'f [Rgb]> {
        self.check_frame(frame)?;
        let mut start = 0;
        for candidate in &self.fixtures {
            if candidate.address == fixture.address {
                return Ok(&frame[start..start + candidate.pixel_count]);
            }
            start += candidate.pixel_count;
        }
        Err(ControlError::UnknownFixture(fixture.address))
    }

    /// Split `frame` into per-fixture slices in registration order
    pub fn slices<'a>(&'a self, frame: &'a [Rgb]) -> Result<Vec<FixtureSlice<'a>>> {
        self.check_frame(frame)?;
        let mut start = 0;
        Ok(self
            .fixtures
            .iter()
            .map(|fixture| {
                let pixels = &frame[start..start + fixture.pixel_count];
                start += fixture.pixel_count;
                FixtureSlice { fixture, pixels }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_allocate_spans_universes() {
        let allocations = allocate(7, 0, 400).unwrap();
        assert_eq!(allocations.len(), 3);
        assert_eq!(allocations[0].pixel_count, 170);
        assert_eq!(allocations[1].universe, 8);
        assert_eq!(allocations[1].first_pixel, 170);
        assert_eq!(allocations[2].pixel_count, 60);
        for allocation in &allocations {
            assert!(allocation.channel_range().end <= UNIVERSE_SIZE);
        }
    }

    #[test]
    fn test_allocate_with_offset() {
        let allocations = allocate(0, 300, 100).unwrap();
        assert_eq!(allocations[0].pixel_count, 70);
        assert_eq!(allocations[0].channel_range(), 300..510);
        assert_eq!(allocations[1].channel_offset, 0);
        assert_eq!(allocations[1].pixel_count, 30);
    }

    #[test]
    fn test_allocate_past_last_universe() {
        let result = allocate(MAX_UNIVERSE, 0, 171);
        assert!(matches!(result, Err(ControlError::UniverseOutOfRange(0x8000))));
    }

    #[test]
    fn test_channel_data_with_offset() {
        let allocation = UniverseAllocation {
            universe: 0,
            channel_offset: 2,
            first_pixel: 1,
            pixel_count: 1,
        };
        let data = allocation.channel_data(&[Rgb::RED, Rgb::BLUE]);
        assert_eq!(data, vec![0, 0, 0, 0, 255]);
    }

    #[test]
    fn test_last_octet_conflict_falls_back_to_counter() {
        let mut registry = FixtureRegistry::new();
        registry.add_manual(addr("10.0.0.7:6454"), 10, None).unwrap();
        let second = registry.add_manual(addr("10.0.1.7:6454"), 10, None).unwrap();
        assert_eq!(second.universe(), 1);
    }

    #[test]
    fn test_counter_skips_taken_universes() {
        let mut registry = FixtureRegistry::new();
        registry.add_manual(addr("10.0.0.1:6454"), 10, None).unwrap();
        registry.add_manual(addr("10.0.0.2:6454"), 10, None).unwrap();

        let v6 = registry.add_manual(addr("[fe80::1]:6454"), 10, None).unwrap();
        assert_eq!(v6.universe(), 3);
        let v6b = registry.add_manual(addr("[fe80::2]:6454"), 10, None).unwrap();
        assert_eq!(v6b.universe(), 4);
    }

    #[test]
    fn test_clear_resets_counter() {
        let mut registry = FixtureRegistry::new();
        registry.add_manual(addr("[fe80::1]:6454"), 1, None).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        let again = registry.add_manual(addr("[fe80::1]:6454"), 1, None).unwrap();
        assert_eq!(again.universe(), 1);
    }
}
