//! Deterministic synthetic feed data
//!
//! Produces realistic disaster data in the exact shapes the real adapters
//! emit, so the entire downstream pipeline (disaster auto-creation →
//! predictions → anomaly detection → alerts) runs end-to-end without any
//! external API keys. Seeded: a given seed replays the same stream, which
//! the regression tests rely on.

use std::sync::Mutex;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde_json::json;

use crate::types::{
    new_id, EventType, HotspotConfidence, SatelliteObservation, Severity, WeatherObservation,
};

use super::NormalizedEvent;

/// (name, lat, lon, country, likely disaster types)
type Region = (&'static str, f64, f64, &'static str, &'static [&'static str]);

/// Real disaster-prone regions used to place synthetic events.
const DISASTER_REGIONS: &[Region] = &[
    // Earthquake zones
    ("Tokyo, Japan", 35.6762, 139.6503, "Japan", &["earthquake", "tsunami"]),
    ("San Francisco, USA", 37.7749, -122.4194, "USA", &["earthquake", "wildfire"]),
    ("Kathmandu, Nepal", 27.7172, 85.3240, "Nepal", &["earthquake", "landslide"]),
    ("Istanbul, Turkey", 41.0082, 28.9784, "Turkey", &["earthquake"]),
    ("Lima, Peru", -12.0464, -77.0428, "Peru", &["earthquake", "tsunami"]),
    ("Santiago, Chile", -33.4489, -70.6693, "Chile", &["earthquake"]),
    ("Mexico City, Mexico", 19.4326, -99.1332, "Mexico", &["earthquake"]),
    ("Manila, Philippines", 14.5995, 120.9842, "Philippines", &["earthquake", "hurricane"]),
    // Hurricane / cyclone zones
    ("Miami, USA", 25.7617, -80.1918, "USA", &["hurricane", "flood"]),
    ("Houston, USA", 29.7604, -95.3698, "USA", &["hurricane", "flood"]),
    ("Dhaka, Bangladesh", 23.8103, 90.4125, "Bangladesh", &["flood", "hurricane"]),
    ("Mumbai, India", 19.0760, 72.8777, "India", &["flood", "hurricane"]),
    ("Havana, Cuba", 23.1136, -82.3666, "Cuba", &["hurricane"]),
    // Flood zones
    ("Jakarta, Indonesia", -6.2088, 106.8456, "Indonesia", &["flood", "earthquake"]),
    ("Bangkok, Thailand", 13.7563, 100.5018, "Thailand", &["flood"]),
    ("Venice, Italy", 45.4408, 12.3155, "Italy", &["flood"]),
    ("Wuhan, China", 30.5928, 114.3055, "China", &["flood"]),
    // Wildfire zones
    ("Los Angeles, USA", 34.0522, -118.2437, "USA", &["wildfire", "earthquake"]),
    ("Sydney, Australia", -33.8688, 151.2093, "Australia", &["wildfire"]),
    ("Athens, Greece", 37.9838, 23.7275, "Greece", &["wildfire", "earthquake"]),
    ("Brasilia, Brazil", -15.8267, -47.9218, "Brazil", &["wildfire", "drought"]),
    // Volcano zones
    ("Reykjavik, Iceland", 64.1466, -21.9426, "Iceland", &["volcano", "earthquake"]),
    ("Naples, Italy", 40.8518, 14.2681, "Italy", &["volcano", "earthquake"]),
    ("Yogyakarta, Indonesia", -7.7956, 110.3695, "Indonesia", &["volcano", "earthquake"]),
    // Drought zones
    ("Nairobi, Kenya", -1.2921, 36.8219, "Kenya", &["drought"]),
    ("Cape Town, South Africa", -33.9249, 18.4241, "South Africa", &["drought", "wildfire"]),
];

const WEATHER_CONDITIONS: &[(&str, &str)] = &[
    ("Clear", "clear sky"),
    ("Clouds", "scattered clouds"),
    ("Clouds", "overcast clouds"),
    ("Rain", "moderate rain"),
    ("Rain", "heavy intensity rain"),
    ("Thunderstorm", "thunderstorm with rain"),
    ("Snow", "light snow"),
    ("Drizzle", "light drizzle"),
    ("Mist", "mist"),
];

const CYCLONE_NAMES: &[&str] = &[
    "Maria", "Irma", "Katrina", "Harvey", "Dorian", "Haiyan", "Amphan", "Nargis", "Sandy",
    "Michael", "Idai", "Winston",
];

const SOCIAL_SOS_TEMPLATES: &[&str] = &[
    "URGENT: Flooding in {region}, people trapped on rooftops. Need immediate rescue! #SOS #disaster",
    "Major earthquake just hit {region}. Buildings collapsed. Please send help! #earthquake #emergency",
    "Wildfire spreading rapidly near {region}. Evacuations underway. #wildfire #help",
    "Hurricane approaching {region}. Category {cat} winds. Seeking shelter. #hurricane",
    "Severe flooding in {region}. Roads washed out. Family of {fam} needs rescue. #flood #SOS",
    "Volcanic eruption near {region}! Ash cloud rising. Emergency evacuation needed. #volcano",
    "Landslide in {region} has buried homes. Multiple people missing. #landslide #rescue",
    "Critical water shortage in {region}. {days} days without clean water. Children sick. #drought #help",
    "Aftershock M{mag} in {region}. More buildings damaged. Urgent medical supplies needed.",
    "SOS from {region}: {fam} people stranded after flash flood. No food or water for {days} days.",
];

/// Seeded synthetic generator shared by all adapters.
pub struct MockGenerator {
    rng: Mutex<StdRng>,
}

impl MockGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Seed from configuration.
    pub fn from_config() -> Self {
        Self::new(crate::config::get().ingestion.mock_seed)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        #[allow(clippy::unwrap_used)]
        let mut rng = self.rng.lock().unwrap();
        f(&mut rng)
    }

    /// Random 10-hex-char upstream id, unique within the rng stream.
    fn upstream_id(rng: &mut StdRng) -> String {
        format!("{:010x}", rng.gen::<u64>() & 0xff_ffff_ffff)
    }

    fn regions_for(kind: &str) -> Vec<&'static Region> {
        let matching: Vec<&Region> = DISASTER_REGIONS
            .iter()
            .filter(|r| r.4.contains(&kind))
            .collect();
        if matching.is_empty() {
            DISASTER_REGIONS.iter().collect()
        } else {
            matching
        }
    }

    // ── Earthquakes ─────────────────────────────────────────────────

    /// Synthetic earthquakes matching the geophysical adapter's output.
    ///
    /// `count = None` follows the realistic distribution: usually zero,
    /// occasionally one to three.
    pub fn earthquakes(&self, count: Option<usize>) -> Vec<NormalizedEvent> {
        self.with_rng(|rng| {
            let count = count.unwrap_or_else(|| {
                if rng.gen::<f64>() < 0.6 {
                    0
                } else {
                    rng.gen_range(1..=3)
                }
            });
            let regions = Self::regions_for("earthquake");
            let now = Utc::now();

            (0..count)
                .map(|_| {
                    #[allow(clippy::unwrap_used)]
                    let region = regions.choose(rng).unwrap();
                    let lat = region.1 + rng.gen_range(-0.5..0.5);
                    let lon = region.2 + rng.gen_range(-0.5..0.5);

                    // Weighted towards smaller magnitudes
                    #[allow(clippy::unwrap_used)]
                    let normal: Normal<f64> = Normal::new(0.0, 1.2).unwrap();
                    let magnitude =
                        ((4.0 + normal.sample(rng).abs()).min(9.0) * 10.0).round() / 10.0;
                    let depth_km = (rng.gen_range(5.0..300.0) * 10.0_f64).round() / 10.0;
                    let severity = super::usgs::magnitude_to_severity(magnitude);

                    let bearing = ['N', 'S', 'E', 'W'][rng.gen_range(0..4)];
                    let place =
                        format!("{}km {} of {}", rng.gen_range(5..200), bearing, region.0);
                    let usgs_id = format!("mock{}", Self::upstream_id(rng));

                    NormalizedEvent {
                        external_id: format!("usgs-{usgs_id}"),
                        event_type: EventType::Earthquake,
                        title: format!("M{magnitude} - {place}"),
                        description: format!(
                            "M{magnitude} earthquake at {place}. Depth: {depth_km} km."
                        ),
                        severity,
                        latitude: Some(round4(lat)),
                        longitude: Some(round4(lon)),
                        location_name: Some(place.clone()),
                        raw_payload: json!({
                            "usgs_id": usgs_id,
                            "magnitude": magnitude,
                            "mag_type": "mww",
                            "depth_km": depth_km,
                            "place": place,
                            "time": now.timestamp_millis(),
                            "tsunami": if magnitude >= 7.0 { 1 } else { 0 },
                            "felt": if magnitude >= 5.0 { rng.gen_range(0..500) } else { 0 },
                            "status": "reviewed",
                            "type": "earthquake",
                            "mock": true,
                        }),
                    }
                })
                .collect()
        })
    }

    // ── Humanitarian alerts ─────────────────────────────────────────

    /// Synthetic GDACS-style alerts matching the RSS adapter's output.
    pub fn gdacs_events(&self, count: Option<usize>) -> Vec<NormalizedEvent> {
        self.with_rng(|rng| {
            let count = count.unwrap_or_else(|| {
                if rng.gen::<f64>() < 0.5 {
                    0
                } else {
                    rng.gen_range(1..=3)
                }
            });
            let now = Utc::now();

            (0..count)
                .map(|_| {
                    let (dtype, gdacs_type) = *[
                        ("hurricane", "TC"),
                        ("flood", "FL"),
                        ("wildfire", "WF"),
                        ("volcano", "VO"),
                        ("drought", "DR"),
                    ]
                    .choose(rng)
                    .unwrap_or(&("flood", "FL"));

                    let regions = Self::regions_for(dtype);
                    #[allow(clippy::unwrap_used)]
                    let region = regions.choose(rng).unwrap();
                    let lat = region.1 + rng.gen_range(-1.0..1.0);
                    let lon = region.2 + rng.gen_range(-1.0..1.0);

                    let alert_level = match rng.gen_range(0..100) {
                        0..=34 => "Green",
                        35..=74 => "Orange",
                        _ => "Red",
                    };
                    let severity = match alert_level {
                        "Red" => Severity::Critical,
                        "Orange" => Severity::High,
                        _ => Severity::Medium,
                    };
                    let event_id = rng.gen_range(1_000_000..10_000_000u64).to_string();
                    let population = rng.gen_range(10_000..5_000_000u64);

                    let (title, description) = match dtype {
                        "hurricane" => {
                            #[allow(clippy::unwrap_used)]
                            let name = CYCLONE_NAMES.choose(rng).unwrap();
                            let cat = rng.gen_range(1..=5);
                            (
                                format!("Tropical Cyclone {name} - Category {cat}"),
                                format!(
                                    "Tropical Cyclone {name} with sustained winds of {}km/h \
                                     affecting {}. Category {cat} storm. Population exposed: ~{population}.",
                                    rng.gen_range(120..300),
                                    region.0
                                ),
                            )
                        }
                        "flood" => (
                            format!("Flood Alert - {}", region.0),
                            format!(
                                "Severe flooding reported in {}. Water level {:.1}m above normal. \
                                 Affected area: {}km². Population exposed: ~{population}.",
                                region.0,
                                rng.gen_range(0.5..8.0),
                                rng.gen_range(50..5000)
                            ),
                        ),
                        "wildfire" => (
                            format!("Wildfire - {}", region.0),
                            format!(
                                "Active wildfire detected near {}. Burning area: {}ha. \
                                 Fire spread rate: {}ha/hr. Wind speed: {}km/h.",
                                region.0,
                                rng.gen_range(100..50_000),
                                rng.gen_range(5..200),
                                rng.gen_range(10..80)
                            ),
                        ),
                        "volcano" => (
                            format!("Volcanic Activity - {}", region.0),
                            format!(
                                "Increased volcanic activity detected at {}. Alert level: {}. \
                                 Ash plume height: {:.1}km.",
                                region.0,
                                ["Warning", "Watch", "Advisory"][rng.gen_range(0..3)],
                                rng.gen_range(1.0..15.0)
                            ),
                        ),
                        _ => (
                            format!("Drought Alert - {}", region.0),
                            format!(
                                "Severe drought conditions in {}. Rainfall deficit: {}% below \
                                 average. Duration: {} months.",
                                region.0,
                                rng.gen_range(40..90),
                                rng.gen_range(2..18)
                            ),
                        ),
                    };

                    NormalizedEvent {
                        external_id: format!("gdacs-{gdacs_type}-{event_id}"),
                        event_type: EventType::GdacsAlert,
                        title,
                        description,
                        severity,
                        latitude: Some(round4(lat)),
                        longitude: Some(round4(lon)),
                        location_name: Some(region.0.to_string()),
                        raw_payload: json!({
                            "link": format!("https://www.gdacs.org/report.aspx?eventid={event_id}"),
                            "pub_date": now.to_rfc2822(),
                            "gdacs_event_type": gdacs_type,
                            "gdacs_alert_level": alert_level,
                            "gdacs_event_id": event_id,
                            "gdacs_population": population.to_string(),
                            "disaster_type_mapped": dtype,
                            "mock": true,
                        }),
                    }
                })
                .collect()
        })
    }

    // ── Fire hotspots ───────────────────────────────────────────────

    /// Synthetic satellite hotspots matching the hotspot adapter's output.
    pub fn fire_hotspots(&self, count: Option<usize>) -> Vec<SatelliteObservation> {
        self.with_rng(|rng| {
            let count = count.unwrap_or_else(|| {
                if rng.gen::<f64>() < 0.4 {
                    0
                } else {
                    rng.gen_range(3..=15)
                }
            });
            let regions = Self::regions_for("wildfire");
            let now = Utc::now();
            let acq_date = now.format("%Y-%m-%d").to_string();
            let acq_time = now.format("%H%M").to_string();

            (0..count)
                .map(|_| {
                    #[allow(clippy::unwrap_used)]
                    let region = regions.choose(rng).unwrap();
                    // Hotspots cluster tightly around the burn area
                    let lat = round4(region.1 + rng.gen_range(-0.3..0.3));
                    let lon = round4(region.2 + rng.gen_range(-0.3..0.3));
                    let brightness = (rng.gen_range(300.0..500.0) * 10.0_f64).round() / 10.0;
                    let frp = (rng.gen_range(5.0..200.0) * 10.0_f64).round() / 10.0;

                    SatelliteObservation {
                        id: new_id(),
                        source: "mock_firms".into(),
                        external_id: format!(
                            "firms-{lat:.4}-{lon:.4}-{acq_date}-{acq_time}-{}",
                            Self::upstream_id(rng)
                        ),
                        latitude: lat,
                        longitude: lon,
                        brightness: Some(brightness),
                        frp: Some(frp),
                        confidence: Some(
                            *[
                                HotspotConfidence::Low,
                                HotspotConfidence::Nominal,
                                HotspotConfidence::High,
                            ]
                            .choose(rng)
                            .unwrap_or(&HotspotConfidence::Nominal),
                        ),
                        satellite: ["N20", "NOAA-20", "Suomi NPP"][rng.gen_range(0..3)].into(),
                        instrument: "VIIRS".into(),
                        acq_datetime: now,
                        daynight: if rng.gen::<bool>() { "D" } else { "N" }.into(),
                        raw_payload: json!({
                            "mock": true,
                            "brightness": brightness,
                            "frp": frp,
                            "region": region.0,
                        }),
                    }
                })
                .collect()
        })
    }

    // ── Weather ─────────────────────────────────────────────────────

    /// Synthetic weather observations. Without tracked locations, picks a
    /// few disaster regions; those rows carry no `location_id` since no
    /// location row backs them.
    pub fn weather(&self, locations: &[(Option<String>, f64, f64)]) -> Vec<WeatherObservation> {
        self.with_rng(|rng| {
            let targets: Vec<(Option<String>, f64, f64)> = if locations.is_empty() {
                let count = rng.gen_range(3..=6);
                let mut regions: Vec<&Region> = DISASTER_REGIONS.iter().collect();
                regions.shuffle(rng);
                regions
                    .into_iter()
                    .take(count)
                    .map(|r| (None, r.1, r.2))
                    .collect()
            } else {
                locations.to_vec()
            };

            let now = Utc::now();
            targets
                .into_iter()
                .map(|(location_id, lat, lon)| {
                    // Temperature tracks latitude: tropics run warmer
                    let base_temp = 30.0 - lat.abs() * 0.4 + rng.gen_range(-5.0..5.0);
                    #[allow(clippy::unwrap_used)]
                    let (weather_main, weather_desc) = *WEATHER_CONDITIONS.choose(rng).unwrap();

                    let precipitation = if weather_main.contains("Rain")
                        || weather_main.contains("Thunderstorm")
                    {
                        rng.gen_range(1.0..25.0)
                    } else if weather_main.contains("Snow") {
                        rng.gen_range(0.5..8.0)
                    } else if weather_main.contains("Drizzle") {
                        rng.gen_range(0.1..2.0)
                    } else {
                        0.0
                    };

                    WeatherObservation {
                        id: new_id(),
                        location_id,
                        latitude: lat,
                        longitude: lon,
                        temperature_c: Some((base_temp * 10.0).round() / 10.0),
                        humidity_pct: Some(rng.gen_range(30..=95) as f64),
                        wind_speed_ms: Some((rng.gen_range(0.5..25.0) * 10.0_f64).round() / 10.0),
                        wind_deg: Some(rng.gen_range(0..=360) as f64),
                        pressure_hpa: Some(rng.gen_range(995..=1030) as f64),
                        precipitation_mm: Some((precipitation * 10.0_f64).round() / 10.0),
                        visibility_m: Some(rng.gen_range(2_000..=10_000) as f64),
                        weather_main: Some(weather_main.to_string()),
                        weather_desc: Some(weather_desc.to_string()),
                        observed_at: now,
                        source: "mock_weather".into(),
                        raw_payload: json!({"mock": true, "generator": "mock"}),
                    }
                })
                .collect()
        })
    }

    // ── Social SOS signals ──────────────────────────────────────────

    /// Synthetic social SOS posts matching the social adapter's output.
    pub fn social_signals(&self, count: Option<usize>) -> Vec<NormalizedEvent> {
        self.with_rng(|rng| {
            let count = count.unwrap_or_else(|| {
                if rng.gen::<f64>() < 0.5 {
                    0
                } else {
                    rng.gen_range(1..=4)
                }
            });
            let now = Utc::now();

            (0..count)
                .map(|_| {
                    #[allow(clippy::unwrap_used)]
                    let region = DISASTER_REGIONS.choose(rng).unwrap();
                    #[allow(clippy::unwrap_used)]
                    let template = SOCIAL_SOS_TEMPLATES.choose(rng).unwrap();

                    let text = template
                        .replace("{region}", region.0)
                        .replace("{cat}", &rng.gen_range(1..=5).to_string())
                        .replace("{fam}", &rng.gen_range(2..=8).to_string())
                        .replace("{days}", &rng.gen_range(1..=7).to_string())
                        .replace("{mag}", &format!("{:.1}", rng.gen_range(4.0..6.5)));

                    let tweet_id = rng.gen_range(10u64.pow(17)..10u64.pow(18)).to_string();
                    let lat = round4(region.1 + rng.gen_range(-0.2..0.2));
                    let lon = round4(region.2 + rng.gen_range(-0.2..0.2));
                    let severity = super::social::estimate_severity(&text);

                    let title: String = text.chars().take(80).collect();
                    NormalizedEvent {
                        external_id: format!("twitter-{tweet_id}"),
                        event_type: EventType::SocialSos,
                        title: if text.len() > 80 {
                            format!("Social SOS: {title}...")
                        } else {
                            format!("Social SOS: {title}")
                        },
                        description: text.clone(),
                        severity,
                        latitude: Some(lat),
                        longitude: Some(lon),
                        location_name: Some(region.0.to_string()),
                        raw_payload: json!({
                            "tweet_id": tweet_id,
                            "author_id": rng.gen_range(100_000_000..1_000_000_000u64).to_string(),
                            "created_at": now.to_rfc3339(),
                            "text": text,
                            "public_metrics": {
                                "retweet_count": rng.gen_range(0..5000),
                                "reply_count": rng.gen_range(0..500),
                                "like_count": rng.gen_range(0..10_000),
                            },
                            "mock": true,
                        }),
                    }
                })
                .collect()
        })
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
