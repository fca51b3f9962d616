//! Per-community research map: the stops, their geofence and the local day.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::common::error::{MapError, MapResult, StopCandidate};
use crate::common::text::{fold_key, normalize_apostrophes};
use crate::common::{Bounds, Coordinates};
use crate::matcher::partial_ratio;

use super::clock::Clock;
use super::stop::{Stop, StopId, TEMP_NICKNAME_PREFIX};
use super::task::Task;

/// Minimum score a fuzzy stop name match must exceed.
pub const STOP_THRESHOLD: u8 = 80;

/// Largest allowed bounds span, in degrees, on either axis.
pub const MAX_BOUNDS_SPAN: f64 = 1.0;

/// Default lifetime of an event overlay.
pub const DEFAULT_OVERLAY_EXPIRY_MINUTES: i64 = 30;

#[derive(Debug, Clone)]
pub struct ResearchMap {
    stops: Vec<Stop>,
    next_stop_id: u64,
    bounds: Option<Bounds>,
    location: Option<Coordinates>,
    time_zone: Option<Tz>,
    overlay_expiry: Duration,
    clock: Clock,
    /// Set when a lookup reset a stale stop or handed out temporary nicknames.
    lookup_changed: bool,
}

impl Default for ResearchMap {
    fn default() -> Self {
        Self {
            stops: Vec::new(),
            next_stop_id: 0,
            bounds: None,
            location: None,
            time_zone: None,
            overlay_expiry: Duration::minutes(DEFAULT_OVERLAY_EXPIRY_MINUTES),
            clock: Clock::System,
            lookup_changed: false,
        }
    }
}

impl ResearchMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a map from persisted parts.
    pub fn from_parts(
        stops: Vec<Stop>,
        bounds: Option<Bounds>,
        location: Option<Coordinates>,
        time_zone: Option<Tz>,
    ) -> Self {
        let next_stop_id = stops.iter().map(|s| s.id.0).max().unwrap_or(0);
        Self {
            stops,
            next_stop_id,
            bounds,
            location,
            time_zone,
            ..Self::default()
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    pub fn set_overlay_expiry(&mut self, expiry: Duration) {
        self.overlay_expiry = expiry;
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == id)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn location(&self) -> Option<Coordinates> {
        self.location
    }

    pub fn time_zone(&self) -> Option<Tz> {
        self.time_zone
    }

    /// The current instant.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The current calendar date in the map's time zone, UTC if unset.
    pub fn today(&self) -> NaiveDate {
        let now = self.clock.now();
        match self.time_zone {
            Some(tz) => now.with_timezone(&tz).date_naive(),
            None => now.date_naive(),
        }
    }

    /// Create an empty stop inside the map bounds.
    pub fn new_stop(&mut self, coordinates: Coordinates, name: &str) -> MapResult<StopId> {
        let bounds = self.bounds.ok_or(MapError::BoundsNotSet)?;
        if !bounds.contains(coordinates) {
            return Err(MapError::StopOutsideBoundary);
        }

        self.next_stop_id += 1;
        let id = StopId(self.next_stop_id);
        let name = normalize_apostrophes(name.trim());
        debug!(stop = %name, ?coordinates, "Stop created");
        self.stops.push(Stop::new(id, &name, coordinates, self.today()));
        Ok(id)
    }

    /// Find a stop by name or nickname, falling back to a fuzzy name search.
    ///
    /// Stale matches are reset before returning. Several exact matches give the
    /// ones without nicknames temporary nicknames and fail with `MultipleStopsFound`.
    pub fn find_stop(&mut self, query: &str) -> MapResult<&Stop> {
        if query.contains('\n') {
            return Err(MapError::StopNotFound);
        }
        let key = fold_key(query);
        if key.is_empty() {
            return Err(MapError::StopNotFound);
        }

        let found: Vec<usize> = self
            .stops
            .iter()
            .enumerate()
            .filter(|(_, stop)| {
                fold_key(&stop.name) == key || stop.nicknames.iter().any(|n| fold_key(n) == key)
            })
            .map(|(i, _)| i)
            .collect();

        let today = self.today();
        for &i in &found {
            self.reset_if_stale(i, today);
        }

        match found.as_slice() {
            [] => {
                let index = self.fuzzy_stop(&key)?;
                self.reset_if_stale(index, today);
                Ok(&self.stops[index])
            }
            [index] => Ok(&self.stops[*index]),
            _ => Err(self.disambiguate(&found)),
        }
    }

    /// Whether a lookup changed the map since the last call. Lookups reset
    /// stale stops and assign temporary nicknames, both of which must be saved.
    pub fn take_lookup_changes(&mut self) -> bool {
        std::mem::take(&mut self.lookup_changed)
    }

    fn reset_if_stale(&mut self, index: usize, today: NaiveDate) {
        if self.stops[index].is_stale(today) {
            debug!(stop = %self.stops[index].name, "Stale stop reset on lookup");
            self.stops[index].reset(today);
            self.lookup_changed = true;
        }
    }

    fn fuzzy_stop(&self, key: &str) -> MapResult<usize> {
        let mut best: Option<(usize, u8)> = None;
        for (i, stop) in self.stops.iter().enumerate() {
            let score = partial_ratio(key, &stop.name);
            let top = best.map_or(0, |(_, s)| s);
            if score > STOP_THRESHOLD && score > top {
                best = Some((i, score));
            } else if score == 100 {
                // Two perfect partial matches: refuse to guess.
                return Err(MapError::StopNotFound);
            }
        }
        match best {
            Some((i, score)) => {
                debug!(query = key, stop = %self.stops[i].name, score, "Fuzzy stop match");
                Ok(i)
            }
            None => Err(MapError::StopNotFound),
        }
    }

    fn disambiguate(&mut self, found: &[usize]) -> MapError {
        let mut number = 0;
        for &i in found {
            if self.stops[i].nicknames.is_empty() {
                number = self.next_temp_number(number);
                self.lookup_changed = true;
                self.stops[i]
                    .nicknames
                    .push(format!("{}{}", TEMP_NICKNAME_PREFIX, number));
            }
        }
        let candidates = found
            .iter()
            .map(|&i| {
                let stop = &self.stops[i];
                StopCandidate {
                    id: stop.id.0,
                    name: stop.name.clone(),
                    nicknames: stop.nicknames.clone(),
                }
            })
            .collect();
        MapError::MultipleStopsFound { candidates }
    }

    /// Smallest temporary nickname number above `after` not used anywhere in the map.
    fn next_temp_number(&self, after: u32) -> u32 {
        let mut number = after + 1;
        loop {
            let nickname = format!("{}{}", TEMP_NICKNAME_PREFIX, number);
            if !self.stops.iter().any(|s| s.nicknames.contains(&nickname)) {
                return number;
            }
            number += 1;
        }
    }

    pub fn reset_stop(&mut self, id: StopId) -> MapResult<()> {
        let today = self.today();
        self.stop_mut(id)?.reset(today);
        Ok(())
    }

    pub fn reset_all_stops(&mut self) {
        let today = self.today();
        for stop in &mut self.stops {
            stop.reset(today);
        }
        debug!(stops = self.stops.len(), "All stops reset");
    }

    /// Reset stops last edited on an earlier day and expire old overlays.
    /// Returns whether anything changed.
    pub fn reset_old_stops(&mut self) -> bool {
        let today = self.today();
        let now = self.now();
        let expiry = self.overlay_expiry;
        let mut changed = false;

        for stop in &mut self.stops {
            if stop.is_stale(today) {
                stop.reset(today);
                changed = true;
            } else if let Some(overlay) = &stop.overlay {
                let elapsed = now - overlay.started;
                if elapsed > expiry || elapsed < Duration::zero() {
                    debug!(stop = %stop.name, "Event overlay expired");
                    stop.clear_overlay();
                    changed = true;
                }
            }
        }
        if changed {
            debug!("Old stops reset");
        }
        changed
    }

    pub fn set_task(&mut self, id: StopId, task: &Task) -> MapResult<()> {
        let today = self.today();
        let stop = self.stop_mut(id)?;
        stop.set_task(task, today)?;
        debug!(stop = %stop.name, reward = %task.reward, "Task assigned");
        Ok(())
    }

    pub fn set_event_overlay(&mut self, id: StopId, subject: Option<&str>) -> MapResult<()> {
        let now = self.now();
        let stop = self.stop_mut(id)?;
        stop.set_overlay(subject, now);
        debug!(stop = %stop.name, subject, "Event overlay set");
        Ok(())
    }

    /// Returns whether an overlay was active.
    pub fn clear_event_overlay(&mut self, id: StopId) -> MapResult<bool> {
        Ok(self.stop_mut(id)?.clear_overlay())
    }

    /// Add a nickname to a stop. Fails if another stop already uses it.
    pub fn add_nickname(&mut self, id: StopId, nickname: &str) -> MapResult<()> {
        let key = fold_key(nickname);
        if key.is_empty() {
            return Err(MapError::StopNotFound);
        }
        if let Some(owner) = self
            .stops
            .iter()
            .find(|s| s.id != id && s.nicknames.iter().any(|n| fold_key(n) == key))
        {
            return Err(MapError::NicknameInUse {
                owner: format!("the stop: {}", owner.name),
            });
        }
        self.stop_mut(id)?.add_nickname(nickname);
        Ok(())
    }

    pub fn remove_stop(&mut self, id: StopId) -> MapResult<Stop> {
        let index = self
            .stops
            .iter()
            .position(|s| s.id == id)
            .ok_or(MapError::StopNotFound)?;
        Ok(self.stops.remove(index))
    }

    /// Set the geofence. Both spans must be at most one degree and an existing
    /// center location must lie inside.
    pub fn set_bounds(&mut self, corner1: Coordinates, corner2: Coordinates) -> MapResult<()> {
        let bounds = Bounds::new(corner1, corner2);
        if bounds.latitude_span() > MAX_BOUNDS_SPAN || bounds.longitude_span() > MAX_BOUNDS_SPAN {
            return Err(MapError::BoundsTooLarge);
        }
        if let Some(location) = self.location {
            if !bounds.contains(location) {
                return Err(MapError::LocationNotInBounds);
            }
        }
        self.bounds = Some(bounds);
        Ok(())
    }

    pub fn set_location(&mut self, location: Coordinates) -> MapResult<()> {
        if let Some(bounds) = self.bounds {
            if !bounds.contains(location) {
                return Err(MapError::LocationNotInBounds);
            }
        }
        self.location = Some(location);
        Ok(())
    }

    /// Set the IANA time zone used for the daily reset.
    pub fn set_time_zone(&mut self, zone: &str) -> MapResult<()> {
        let tz: Tz = zone.trim().parse().map_err(|_| MapError::InvalidTimezone {
            zone: zone.trim().to_string(),
        })?;
        self.time_zone = Some(tz);
        Ok(())
    }

    fn stop_mut(&mut self, id: StopId) -> MapResult<&mut Stop> {
        self.stops
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(MapError::StopNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn map() -> ResearchMap {
        let mut map = ResearchMap::new().with_clock(Clock::Fixed(noon()));
        map.set_location(Coordinates::new(42.5, -76.5)).unwrap();
        map.set_bounds(Coordinates::new(42.0, -77.0), Coordinates::new(43.0, -76.0))
            .unwrap();
        map
    }

    fn pikachu() -> Task {
        Task::new("Pikachu", "Catch 5 Pokemon", false)
    }

    #[test]
    fn test_town_hall_scenario() {
        let mut map = map();
        let id = map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();

        assert_eq!(map.find_stop("town hall").unwrap().id, id);
        map.set_task(id, &pikachu()).unwrap();

        let err = map
            .set_task(id, &Task::new("Rare Candy", "Win a raid", false))
            .unwrap_err();
        assert!(matches!(err, MapError::TaskAlreadyAssigned { .. }));
        let stop = map.stop(id).unwrap();
        assert_eq!(stop.task.as_ref().unwrap().reward, "Pikachu");
    }

    #[test]
    fn test_new_stop_requires_bounds() {
        let mut map = ResearchMap::new();
        assert_eq!(
            map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall"),
            Err(MapError::BoundsNotSet)
        );
    }

    #[test]
    fn test_new_stop_edges() {
        let mut map = map();
        assert!(map.new_stop(Coordinates::new(43.0, -76.0), "Corner").is_ok());
        assert!(map.new_stop(Coordinates::new(42.0, -76.5), "South Edge").is_ok());
        assert_eq!(
            map.new_stop(Coordinates::new(43.0001, -76.5), "North"),
            Err(MapError::StopOutsideBoundary)
        );
        assert_eq!(
            map.new_stop(Coordinates::new(42.5, -77.0001), "West"),
            Err(MapError::StopOutsideBoundary)
        );
    }

    #[test]
    fn test_find_stop_is_idempotent() {
        let mut map = map();
        let id = map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();
        let first = map.find_stop("Town Hall").unwrap().id;
        let second = map.find_stop("Town Hall").unwrap().id;
        assert_eq!(first, id);
        assert_eq!(second, id);
    }

    #[test]
    fn test_find_stop_by_nickname_and_apostrophe() {
        let mut map = map();
        let id = map
            .new_stop(Coordinates::new(42.6, -76.4), "Joe’s Diner")
            .unwrap();
        map.add_nickname(id, "diner").unwrap();
        assert_eq!(map.find_stop("joe's diner").unwrap().id, id);
        assert_eq!(map.find_stop("DINER").unwrap().id, id);
    }

    #[test]
    fn test_find_stop_fuzzy() {
        let mut map = map();
        let id = map
            .new_stop(Coordinates::new(42.6, -76.4), "Memorial Fountain")
            .unwrap();
        assert_eq!(map.find_stop("memorial fountian").unwrap().id, id);
        assert_eq!(map.find_stop("fountain").unwrap().id, id);
    }

    #[test]
    fn test_fuzzy_match_resets_stale_stop() {
        let mut map = map();
        let id = map
            .new_stop(Coordinates::new(42.6, -76.4), "Memorial Fountain")
            .unwrap();
        map.set_task(id, &pikachu()).unwrap();
        assert!(!map.take_lookup_changes());

        let after_midnight = Utc.with_ymd_and_hms(2024, 6, 2, 0, 1, 0).unwrap();
        map.set_clock(Clock::Fixed(after_midnight));
        assert_eq!(map.find_stop("memorial fountian").unwrap().id, id);
        assert!(map.take_lookup_changes());

        map.set_task(id, &Task::new("Rare Candy", "Win a raid", false))
            .unwrap();
        assert_eq!(map.stop(id).unwrap().task.as_ref().unwrap().reward, "Rare Candy");
    }

    #[test]
    fn test_find_stop_fuzzy_double_perfect_is_not_found() {
        let mut map = map();
        map.new_stop(Coordinates::new(42.6, -76.4), "North Fountain").unwrap();
        map.new_stop(Coordinates::new(42.7, -76.4), "South Fountain").unwrap();
        assert_eq!(map.find_stop("fountain").unwrap_err(), MapError::StopNotFound);
    }

    #[test]
    fn test_find_stop_rejects_multiline() {
        let mut map = map();
        map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();
        assert_eq!(
            map.find_stop("Town Hall\nPikachu").unwrap_err(),
            MapError::StopNotFound
        );
    }

    #[test]
    fn test_duplicate_names_get_temp_nicknames() {
        let mut map = map();
        let a = map.new_stop(Coordinates::new(42.6, -76.4), "Park").unwrap();
        let b = map.new_stop(Coordinates::new(42.7, -76.3), "Park").unwrap();

        match map.find_stop("Park") {
            Err(MapError::MultipleStopsFound { candidates }) => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected result: {:?}", other.map(|s| s.id)),
        }

        let mut nicknames: Vec<String> = [a, b]
            .iter()
            .flat_map(|id| map.stop(*id).unwrap().nicknames.clone())
            .collect();
        nicknames.sort();
        assert_eq!(nicknames, vec!["Temp1", "Temp2"]);
        assert!(map.take_lookup_changes());
        assert!(!map.take_lookup_changes());

        // The temporary nickname is consumed by a real one.
        map.add_nickname(a, "North Park").unwrap();
        assert_eq!(map.stop(a).unwrap().nicknames, vec!["North Park"]);
        assert_eq!(map.find_stop("north park").unwrap().id, a);
    }

    #[test]
    fn test_nickname_in_use_by_other_stop() {
        let mut map = map();
        let a = map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();
        let b = map.new_stop(Coordinates::new(42.7, -76.3), "Library").unwrap();
        map.add_nickname(a, "Center").unwrap();
        assert!(matches!(
            map.add_nickname(b, "center"),
            Err(MapError::NicknameInUse { .. })
        ));
    }

    #[test]
    fn test_reset_old_stops_same_day_is_noop() {
        let mut map = map();
        let id = map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();
        map.set_task(id, &pikachu()).unwrap();
        let before = map.stops().to_vec();

        assert!(!map.reset_old_stops());
        assert_eq!(map.stops(), before.as_slice());
    }

    #[test]
    fn test_reset_old_stops_after_day_change() {
        let mut map = map();
        let a = map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();
        let b = map.new_stop(Coordinates::new(42.7, -76.3), "Library").unwrap();
        map.set_task(a, &pikachu()).unwrap();
        map.set_task(b, &Task::new("Rare Candy", "Win a raid", false))
            .unwrap();

        map.set_clock(Clock::Fixed(noon() + Duration::days(1)));
        assert!(map.reset_old_stops());
        assert!(map.stops().iter().all(|s| !s.has_task() && s.category.is_none()));
        assert!(!map.reset_old_stops());
    }

    #[test]
    fn test_day_change_across_year_end() {
        let new_years_eve = Utc.with_ymd_and_hms(2023, 12, 31, 12, 0, 0).unwrap();
        let mut map = map();
        map.set_clock(Clock::Fixed(new_years_eve));
        let id = map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();
        map.set_task(id, &pikachu()).unwrap();

        map.set_clock(Clock::Fixed(new_years_eve + Duration::days(1)));
        assert!(map.reset_old_stops());
        assert!(!map.stop(id).unwrap().has_task());
    }

    #[test]
    fn test_day_follows_time_zone() {
        // 03:00 UTC is still the previous evening in New York.
        let early = Utc.with_ymd_and_hms(2024, 6, 2, 3, 0, 0).unwrap();
        let mut map = map().with_clock(Clock::Fixed(early));
        assert_eq!(map.today(), NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        map.set_time_zone("America/New_York").unwrap();
        assert_eq!(map.today(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn test_invalid_time_zone() {
        let mut map = map();
        assert_eq!(
            map.set_time_zone("Mars/Olympus"),
            Err(MapError::InvalidTimezone {
                zone: "Mars/Olympus".to_string()
            })
        );
    }

    #[test]
    fn test_overlay_expires() {
        let mut map = map();
        let id = map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();
        map.set_task(id, &pikachu()).unwrap();
        map.set_event_overlay(id, Some("Bulbasaur")).unwrap();

        map.set_clock(Clock::Fixed(noon() + Duration::minutes(20)));
        assert!(!map.reset_old_stops());
        assert!(map.stop(id).unwrap().overlay.is_some());

        map.set_clock(Clock::Fixed(noon() + Duration::minutes(31)));
        assert!(map.reset_old_stops());
        let stop = map.stop(id).unwrap();
        assert!(stop.overlay.is_none());
        assert!(stop.has_task());
        assert_eq!(stop.icon.as_deref(), Some("Pikachu"));
    }

    #[test]
    fn test_overlay_with_backwards_clock_is_cleared() {
        let mut map = map();
        let id = map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();
        map.set_event_overlay(id, None).unwrap();
        map.set_clock(Clock::Fixed(noon() - Duration::minutes(5)));
        assert!(map.reset_old_stops());
        assert!(map.stop(id).unwrap().overlay.is_none());
    }

    #[test]
    fn test_set_bounds_validation() {
        let mut map = ResearchMap::new();
        assert_eq!(
            map.set_bounds(Coordinates::new(42.0, -77.0), Coordinates::new(43.5, -76.0)),
            Err(MapError::BoundsTooLarge)
        );
        map.set_location(Coordinates::new(44.0, -76.5)).unwrap();
        assert_eq!(
            map.set_bounds(Coordinates::new(42.0, -77.0), Coordinates::new(43.0, -76.0)),
            Err(MapError::LocationNotInBounds)
        );
        assert_eq!(map.bounds(), None);
    }

    #[test]
    fn test_remove_stop() {
        let mut map = map();
        let id = map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();
        assert_eq!(map.remove_stop(id).unwrap().name, "Town Hall");
        assert_eq!(map.find_stop("Town Hall").unwrap_err(), MapError::StopNotFound);
        assert_eq!(map.remove_stop(id).unwrap_err(), MapError::StopNotFound);
    }

    #[test]
    fn test_ids_survive_restore() {
        let mut map = map();
        let id = map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();
        let mut restored =
            ResearchMap::from_parts(map.stops().to_vec(), map.bounds(), map.location(), None);
        let next = restored
            .new_stop(Coordinates::new(42.7, -76.4), "Library")
            .unwrap();
        assert_ne!(id, next);
    }
}
