use chrono::{DateTime, Utc, Weekday};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

// --- Intent model ---

/// Whether a query wants a place, an event, or a mixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Place,
    Event,
    Both,
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentKind::Place => write!(f, "place"),
            IntentKind::Event => write!(f, "event"),
            IntentKind::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for IntentKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "place" => Ok(Self::Place),
            "event" => Ok(Self::Event),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown IntentKind: {other}")),
        }
    }
}

/// The authoritative macro taxonomy. Routing and filtering only ever see
/// these; micro-categories map into them and affect novelty scoring alone.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Food,
    Nightlife,
    Music,
    Art,
    History,
    Fitness,
    Outdoor,
    Social,
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Food,
        Category::Nightlife,
        Category::Music,
        Category::Art,
        Category::History,
        Category::Fitness,
        Category::Outdoor,
        Category::Social,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Nightlife => "nightlife",
            Category::Music => "music",
            Category::Art => "art",
            Category::History => "history",
            Category::Fitness => "fitness",
            Category::Outdoor => "outdoor",
            Category::Social => "social",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "food" => Ok(Self::Food),
            "nightlife" => Ok(Self::Nightlife),
            "music" => Ok(Self::Music),
            "art" => Ok(Self::Art),
            "history" => Ok(Self::History),
            "fitness" => Ok(Self::Fitness),
            "outdoor" => Ok(Self::Outdoor),
            "social" => Ok(Self::Social),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown Category: {other}")),
        }
    }
}

/// When the user wants something, as a label rather than an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeLabel {
    Now,
    Today,
    Tonight,
    Weekend,
    Specific,
}

impl std::fmt::Display for TimeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeLabel::Now => write!(f, "now"),
            TimeLabel::Today => write!(f, "today"),
            TimeLabel::Tonight => write!(f, "tonight"),
            TimeLabel::Weekend => write!(f, "weekend"),
            TimeLabel::Specific => write!(f, "specific"),
        }
    }
}

/// A time label plus the weekday it names when the label is `Specific`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeContext {
    pub label: TimeLabel,
    pub weekday: Option<Weekday>,
    /// The query said "night", narrowing a weekday window to the evening.
    #[serde(default)]
    pub night: bool,
}

impl TimeContext {
    pub fn label(label: TimeLabel) -> Self {
        Self {
            label,
            weekday: None,
            night: false,
        }
    }

    pub fn weekday(day: Weekday) -> Self {
        Self {
            label: TimeLabel::Specific,
            weekday: Some(day),
            night: false,
        }
    }

    pub fn at_night(mut self) -> Self {
        self.night = true;
        self
    }
}

/// Where the user wants results, as expressed in the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "hint", rename_all = "snake_case")]
pub enum LocationHint {
    NearMe,
    City { name: String },
    Zip { code: String },
    Unknown,
}

impl LocationHint {
    pub fn is_unknown(&self) -> bool {
        matches!(self, LocationHint::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Romantic,
    Adventurous,
    Chill,
    Energetic,
    Cozy,
}

impl std::str::FromStr for Mood {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "romantic" => Ok(Self::Romantic),
            "adventurous" => Ok(Self::Adventurous),
            "chill" => Ok(Self::Chill),
            "energetic" => Ok(Self::Energetic),
            "cozy" => Ok(Self::Cozy),
            other => Err(format!("unknown Mood: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLevel {
    Free,
    Budget,
    Moderate,
    Upscale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroupSize {
    Solo,
    Date,
    SmallGroup,
    LargeGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Immediate,
    NearFuture,
    Planning,
}

/// Optional refinements below the intent kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubIntents {
    pub mood: Option<Mood>,
    pub budget: Option<BudgetLevel>,
    pub group: Option<GroupSize>,
    pub urgency: Option<UrgencyLevel>,
}

/// The classified reading of one raw query. Immutable after classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIntent {
    pub kind: IntentKind,
    pub keywords: Vec<String>,
    pub vibes: Vec<String>,
    pub categories: Vec<Category>,
    pub time: Option<TimeContext>,
    pub location: LocationHint,
    /// Always within [0, 1].
    pub confidence: f32,
    #[serde(default)]
    pub sub: SubIntents,
}

impl SearchIntent {
    /// A low-confidence "show me anything" intent. Used when classification
    /// finds nothing to hold on to.
    pub fn browse() -> Self {
        Self {
            kind: IntentKind::Both,
            keywords: Vec::new(),
            vibes: Vec::new(),
            categories: Vec::new(),
            time: None,
            location: LocationHint::Unknown,
            confidence: 0.2,
            sub: SubIntents::default(),
        }
    }

    pub fn has_category(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    pub fn time_label(&self) -> Option<TimeLabel> {
        self.time.map(|t| t.label)
    }
}

// --- Request context ---

/// Caller-supplied context. Immutable per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub location: Option<GeoPoint>,
    /// IANA timezone name, e.g. "America/Chicago".
    pub timezone: String,
    pub now: DateTime<Utc>,
}

// --- Provider routing ---

pub const PLACES_RADIUS_MIN_METERS: u32 = 100;
pub const PLACES_RADIUS_MAX_METERS: u32 = 50_000;
pub const PLACES_MAX_RESULTS: u32 = 40;
pub const PLACES_TYPE_FILTER_MAX: usize = 3;

pub const EVENTS_RADIUS_MIN_MILES: u32 = 1;
pub const EVENTS_RADIUS_MAX_MILES: u32 = 100;
pub const EVENTS_MAX_RESULTS: u32 = 50;

/// The closed set of place type filters the places provider understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceType {
    Restaurant,
    Cafe,
    Bar,
    NightClub,
    Museum,
    ArtGallery,
    Gym,
    Park,
    TouristAttraction,
}

impl PlaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceType::Restaurant => "restaurant",
            PlaceType::Cafe => "cafe",
            PlaceType::Bar => "bar",
            PlaceType::NightClub => "night_club",
            PlaceType::Museum => "museum",
            PlaceType::ArtGallery => "art_gallery",
            PlaceType::Gym => "gym",
            PlaceType::Park => "park",
            PlaceType::TouristAttraction => "tourist_attraction",
        }
    }
}

impl std::fmt::Display for PlaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Uncapped parameters the plan builder chose for the places provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacesParams {
    pub radius_meters: u32,
    pub max_results: u32,
    /// At most [`PLACES_TYPE_FILTER_MAX`] entries, priority order.
    pub types: Vec<PlaceType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsParams {
    pub radius_miles: u32,
    pub max_results: u32,
}

/// The deterministic routing decision for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPlan {
    pub call_places: bool,
    pub call_events: bool,
    pub places: Option<PlacesParams>,
    pub events: Option<EventsParams>,
    /// Human-readable routing trace, one line per decision.
    pub reasoning: Vec<String>,
}

// --- Resolved plan ---

/// An absolute UTC window for event queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Concrete parameters for one places call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacesQuery {
    pub center: GeoPoint,
    pub radius_meters: u32,
    pub max_results: u32,
    pub types: Vec<PlaceType>,
    pub keyword: Option<String>,
}

/// Concrete parameters for one events call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsQuery {
    pub center: GeoPoint,
    pub radius_miles: u32,
    pub max_results: u32,
    pub window: Option<DateWindow>,
    pub keyword: Option<String>,
    pub category: Option<Category>,
}

/// The plan after location and time resolution. A sentinel center means
/// resolution failed and no provider may be called.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPlan {
    pub center: GeoPoint,
    pub places: Option<PlacesQuery>,
    pub events: Option<EventsQuery>,
    pub notes: Vec<String>,
}

impl ResolvedPlan {
    pub fn unresolved(notes: Vec<String>) -> Self {
        Self {
            center: GeoPoint::sentinel(),
            places: None,
            events: None,
            notes,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.center.is_sentinel()
    }
}

// --- Results ---

/// A provider photo reference: either already a URL, or a provider-side
/// resource name resolved later by the photo proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoRef {
    Url(String),
    Resource(String),
}

/// Fields shared by every result regardless of kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultCore {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub location: GeoPoint,
    pub photo: Option<PhotoRef>,
    pub external_url: Option<String>,
    /// Haversine distance from the request center, filled by the executor.
    pub distance_meters: Option<f64>,
    /// Non-negative after ranking.
    pub score: f64,
    /// Short factual tag, e.g. "close by" or "starting soon".
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    /// 1 (cheap) through 4 (splurge).
    pub price_level: Option<u8>,
    pub open_now: Option<bool>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDetails {
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub is_free: Option<bool>,
}

/// Kind-specific attributes, tagged for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultDetails {
    Place(PlaceDetails),
    Event(EventDetails),
}

/// A unified place-or-event record: shared head plus a tagged body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub core: ResultCore,
    #[serde(flatten)]
    pub details: ResultDetails,
}

impl SearchResult {
    pub fn kind(&self) -> IntentKind {
        match self.details {
            ResultDetails::Place(_) => IntentKind::Place,
            ResultDetails::Event(_) => IntentKind::Event,
        }
    }

    pub fn place(&self) -> Option<&PlaceDetails> {
        match &self.details {
            ResultDetails::Place(p) => Some(p),
            ResultDetails::Event(_) => None,
        }
    }

    pub fn event(&self) -> Option<&EventDetails> {
        match &self.details {
            ResultDetails::Event(e) => Some(e),
            ResultDetails::Place(_) => None,
        }
    }

    pub fn rating(&self) -> Option<f32> {
        self.place().and_then(|p| p.rating)
    }

    pub fn review_count(&self) -> Option<u32> {
        self.place().and_then(|p| p.review_count)
    }

    pub fn open_now(&self) -> Option<bool> {
        self.place().and_then(|p| p.open_now)
    }

    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.event().and_then(|e| e.starts_at)
    }

    pub fn venue(&self) -> Option<&str> {
        self.event().and_then(|e| e.venue.as_deref())
    }

    pub fn address(&self) -> Option<&str> {
        self.place().and_then(|p| p.address.as_deref())
    }
}
