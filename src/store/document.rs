//! On-disk shape of a research map: a point feature collection.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::{Bounds, Coordinates};
use crate::research::{AssignedTask, EventOverlay, ResearchMap, Stop, StopId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDocument {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[lat1, lng1, lat2, lng2]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 4]>,
    /// `[lat, lng]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Geometry,
    pub properties: StopProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopProperties {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub nicknames: Vec<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub reward: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    pub last_edit: NaiveDate,
    #[serde(default)]
    pub overlay_label: Option<String>,
    #[serde(default)]
    pub overlay_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub old_category: Option<String>,
    #[serde(default)]
    pub old_icon: Option<String>,
}

impl From<&Stop> for Feature {
    fn from(stop: &Stop) -> Self {
        let overlay = stop.overlay.as_ref();
        Feature {
            kind: "Feature".to_string(),
            geometry: Geometry {
                kind: "Point".to_string(),
                coordinates: [stop.coordinates.longitude, stop.coordinates.latitude],
            },
            properties: StopProperties {
                id: stop.id.0,
                name: stop.name.clone(),
                nicknames: stop.nicknames.clone(),
                task: stop.task.as_ref().map(|t| t.quest.clone()),
                reward: stop.task.as_ref().map(|t| t.reward.clone()),
                category: stop.category.clone(),
                icon: stop.icon.clone(),
                last_edit: stop.last_edit,
                overlay_label: overlay.map(|o| o.label.clone()),
                overlay_time: overlay.map(|o| o.started),
                old_category: overlay.and_then(|o| o.saved_category.clone()),
                old_icon: overlay.and_then(|o| o.saved_icon.clone()),
            },
        }
    }
}

impl From<Feature> for Stop {
    fn from(feature: Feature) -> Self {
        let [longitude, latitude] = feature.geometry.coordinates;
        let p = feature.properties;
        let task = match (p.task, p.reward) {
            (Some(quest), Some(reward)) => Some(AssignedTask { quest, reward }),
            _ => None,
        };
        let overlay = match (p.overlay_label, p.overlay_time) {
            (Some(label), Some(started)) => Some(EventOverlay {
                label,
                started,
                saved_category: p.old_category,
                saved_icon: p.old_icon,
            }),
            _ => None,
        };
        Stop {
            id: StopId(p.id),
            name: p.name,
            nicknames: p.nicknames,
            coordinates: Coordinates::new(latitude, longitude),
            task,
            category: p.category,
            icon: p.icon,
            last_edit: p.last_edit,
            overlay,
        }
    }
}

impl From<&ResearchMap> for MapDocument {
    fn from(map: &ResearchMap) -> Self {
        MapDocument {
            kind: "FeatureCollection".to_string(),
            bounds: map.bounds().map(|b| {
                [
                    b.corner1.latitude,
                    b.corner1.longitude,
                    b.corner2.latitude,
                    b.corner2.longitude,
                ]
            }),
            loc: map.location().map(|l| [l.latitude, l.longitude]),
            timezone: map.time_zone().map(|tz| tz.name().to_string()),
            features: map.stops().iter().map(Feature::from).collect(),
        }
    }
}

impl From<MapDocument> for ResearchMap {
    fn from(doc: MapDocument) -> Self {
        let bounds = doc.bounds.map(|[lat1, lng1, lat2, lng2]| {
            Bounds::new(Coordinates::new(lat1, lng1), Coordinates::new(lat2, lng2))
        });
        let location = doc.loc.map(|[lat, lng]| Coordinates::new(lat, lng));
        let time_zone = doc.timezone.and_then(|name| match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                warn!(zone = %name, "Ignoring unknown time zone in saved map");
                None
            }
        });
        let stops = doc.features.into_iter().map(Stop::from).collect();
        ResearchMap::from_parts(stops, bounds, location, time_zone)
    }
}
