//! Location and time resolution: human hints become concrete coordinates,
//! time labels become absolute UTC windows. Never fails — an unresolvable
//! location yields the (0,0) sentinel and downstream skips the providers.

use std::collections::HashMap;

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
    Weekday,
};
use chrono_tz::Tz;

use citypulse_common::taxonomy::is_generic_keyword;
use citypulse_common::{
    DateWindow, EventsQuery, GeoPoint, LocationHint, PlacesQuery, ProviderPlan, ResolvedPlan,
    SearchIntent, TimeContext, TimeLabel, UserContext, METERS_PER_MILE,
};

/// Deterministic zip→point and city→point tables. The builtin seed covers
/// major cities; production deployments construct the table from their own
/// data.
#[derive(Debug, Clone)]
pub struct GeoTable {
    zips: HashMap<String, GeoPoint>,
    cities: HashMap<String, GeoPoint>,
}

impl GeoTable {
    pub fn empty() -> Self {
        Self {
            zips: HashMap::new(),
            cities: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for (name, lat, lng) in [
            ("new york", 40.7128, -74.0060),
            ("brooklyn", 40.6782, -73.9442),
            ("san francisco", 37.7749, -122.4194),
            ("los angeles", 34.0522, -118.2437),
            ("chicago", 41.8781, -87.6298),
            ("washington", 38.9072, -77.0369),
            ("boston", 42.3601, -71.0589),
            ("philadelphia", 39.9526, -75.1652),
            ("atlanta", 33.7490, -84.3880),
            ("miami", 25.7617, -80.1918),
            ("seattle", 47.6062, -122.3321),
            ("austin", 30.2672, -97.7431),
            ("portland", 45.5152, -122.6784),
            ("denver", 39.7392, -104.9903),
            ("las vegas", 36.1699, -115.1398),
            ("new orleans", 29.9511, -90.0715),
        ] {
            table.add_city(name, GeoPoint::new(lat, lng));
        }
        for (zip, lat, lng) in [
            ("10001", 40.7506, -73.9972),
            ("11211", 40.7093, -73.9565),
            ("60622", 41.9020, -87.6780),
            ("94110", 37.7485, -122.4184),
            ("90026", 34.0783, -118.2606),
            ("98101", 47.6101, -122.3344),
        ] {
            table.add_zip(zip, GeoPoint::new(lat, lng));
        }
        table
    }

    pub fn add_city(&mut self, name: &str, point: GeoPoint) {
        self.cities.insert(name.to_lowercase(), point);
    }

    pub fn add_zip(&mut self, zip: &str, point: GeoPoint) {
        self.zips.insert(zip.to_string(), point);
    }

    pub fn lookup_city(&self, name: &str) -> Option<GeoPoint> {
        self.cities.get(&name.to_lowercase()).copied()
    }

    pub fn lookup_zip(&self, zip: &str) -> Option<GeoPoint> {
        self.zips.get(zip).copied()
    }
}

impl Default for GeoTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Resolve a plan against the user context. `radius_cap_miles` is the
/// caller-supplied search radius, applied on top of the planned radii.
pub fn resolve(
    plan: &ProviderPlan,
    intent: &SearchIntent,
    ctx: &UserContext,
    geo: &GeoTable,
    radius_cap_miles: Option<f64>,
) -> ResolvedPlan {
    let mut notes = Vec::new();

    let center = match resolve_center(&intent.location, ctx, geo, &mut notes) {
        Some(center) => center,
        None => {
            notes.push("location unresolved, aborting provider calls".to_string());
            return ResolvedPlan::unresolved(notes);
        }
    };

    let keyword = provider_keyword(intent);

    let places = plan.places.as_ref().map(|params| {
        let mut radius_meters = params.radius_meters;
        if let Some(cap) = radius_cap_miles {
            let cap_meters = (cap * METERS_PER_MILE) as u32;
            if cap_meters < radius_meters {
                notes.push(format!("places radius capped to {cap} mi by request"));
                radius_meters = cap_meters;
            }
        }
        PlacesQuery {
            center,
            radius_meters,
            max_results: params.max_results,
            types: params.types.clone(),
            keyword: keyword.clone(),
        }
    });

    let events = plan.events.as_ref().map(|params| {
        let mut radius_miles = params.radius_miles;
        if let Some(cap) = radius_cap_miles {
            let cap = cap.max(1.0) as u32;
            if cap < radius_miles {
                notes.push(format!("events radius capped to {cap} mi by request"));
                radius_miles = cap;
            }
        }
        let window = intent
            .time
            .and_then(|time| event_window(time, ctx, &mut notes));
        EventsQuery {
            center,
            radius_miles,
            max_results: params.max_results,
            window,
            keyword: keyword.clone(),
            category: intent.categories.first().copied(),
        }
    });

    ResolvedPlan {
        center,
        places,
        events,
        notes,
    }
}

/// Resolution order: near-me, zip table, city table, then the caller's own
/// location.
fn resolve_center(
    hint: &LocationHint,
    ctx: &UserContext,
    geo: &GeoTable,
    notes: &mut Vec<String>,
) -> Option<GeoPoint> {
    let user_location = ctx.location.filter(|p| p.is_valid() && !p.is_sentinel());
    match hint {
        LocationHint::NearMe => {
            if user_location.is_some() {
                notes.push("near-me resolved from device location".to_string());
            }
            user_location
        }
        LocationHint::Zip { code } => match geo.lookup_zip(code) {
            Some(point) => {
                notes.push(format!("zip {code} resolved from table"));
                Some(point)
            }
            None => {
                notes.push(format!("zip {code} not in table, using device location"));
                user_location
            }
        },
        LocationHint::City { name } => match geo.lookup_city(name) {
            Some(point) => {
                notes.push(format!("city {name} resolved from table"));
                Some(point)
            }
            None => {
                notes.push(format!("city {name} not in table, using device location"));
                user_location
            }
        },
        LocationHint::Unknown => {
            if user_location.is_some() {
                notes.push("no location hint, using device location".to_string());
            }
            user_location
        }
    }
}

/// The first keyword discriminating enough to send upstream.
fn provider_keyword(intent: &SearchIntent) -> Option<String> {
    intent
        .keywords
        .iter()
        .find(|k| !is_generic_keyword(k))
        .cloned()
}

/// Interpret a local wall-clock as UTC by iterative fixed point: start from
/// the naive value, compute the zone offset for the trial instant, subtract,
/// repeat. Three iterations converge across DST boundaries.
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    let mut trial = local;
    for _ in 0..3 {
        let offset = tz.offset_from_utc_datetime(&trial).fix();
        trial = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    }
    Utc.from_utc_datetime(&trial)
}

fn parse_tz(name: &str, notes: &mut Vec<String>) -> Tz {
    name.parse().unwrap_or_else(|_| {
        notes.push(format!("unknown timezone {name}, assuming UTC"));
        chrono_tz::UTC
    })
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).expect("valid time")
}

/// Convert a time label into an absolute UTC window in the caller's zone.
pub fn event_window(
    time: TimeContext,
    ctx: &UserContext,
    notes: &mut Vec<String>,
) -> Option<DateWindow> {
    let tz = parse_tz(&ctx.timezone, notes);
    let local_now = ctx.now.with_timezone(&tz).naive_local();
    let today = local_now.date();

    let window = match time.label {
        TimeLabel::Now => DateWindow {
            start: ctx.now,
            end: ctx.now + Duration::hours(6),
        },
        TimeLabel::Tonight => DateWindow {
            start: ctx.now,
            end: local_to_utc(tz, today.and_time(end_of_day())),
        },
        TimeLabel::Today => DateWindow {
            start: local_to_utc(tz, today.and_time(NaiveTime::MIN)),
            end: local_to_utc(tz, today.and_time(end_of_day())),
        },
        TimeLabel::Weekend => {
            let saturday = next_occurrence(today, Weekday::Sat);
            let sunday = saturday + Duration::days(1);
            DateWindow {
                start: local_to_utc(tz, saturday.and_time(NaiveTime::MIN)),
                end: local_to_utc(tz, sunday.and_time(end_of_day())),
            }
        }
        TimeLabel::Specific => {
            let target = next_occurrence(today, time.weekday?);
            let start_time = if time.night {
                NaiveTime::from_hms_opt(18, 0, 0).expect("valid time")
            } else {
                NaiveTime::MIN
            };
            DateWindow {
                start: local_to_utc(tz, target.and_time(start_time)),
                end: local_to_utc(tz, target.and_time(end_of_day())),
            }
        }
    };
    Some(window)
}

/// The next local date falling on `weekday`; today counts.
fn next_occurrence(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (weekday.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    today + Duration::days(ahead)
}
