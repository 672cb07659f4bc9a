use crate::{
    config::Config,
    error::{ApiError, Result},
    proxy::UpstreamRequest,
};
use gtfs_rt::FeedMessage;
use prost::Message;
use serde::Serialize;

pub const GTFS_CACHE_TTL: u32 = 30;

fn env_segment(segment: &str) -> String {
    segment.to_ascii_uppercase().replace('-', "_")
}

/// Secret holding the feed URL, e.g. `BEST_VEHICLE_POSITIONS_URL`.
pub fn feed_url_key(agency: &str, feed: &str) -> String {
    format!("{}_{}_URL", env_segment(agency), env_segment(feed))
}

pub fn feed_request(config: &Config, agency: &str, feed: &str) -> Result<UpstreamRequest> {
    let valid = |s: &str| {
        !s.is_empty()
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    };
    if !valid(agency) || !valid(feed) {
        return Err(ApiError::BadRequest(
            "Bad request: expected /api/gtfs/{agency}/{feed}".into(),
        ));
    }

    let key = feed_url_key(agency, feed);
    let url = config.lookup(&key).ok_or_else(|| {
        ApiError::not_configured(
            format!("Endpoint not configured for {}/{}", agency, feed),
            format!("Set secret {}", key),
        )
    })?;

    let mut request = UpstreamRequest::get(url).cached(GTFS_CACHE_TTL);
    let agency_key = env_segment(agency);
    if let (Some(name), Some(value)) = (
        config.lookup(&format!("{}_AUTH_HEADER", agency_key)),
        config.lookup(&format!("{}_AUTH_VALUE", agency_key)),
    ) {
        request = request.header(&name, &value)?;
    }
    Ok(request)
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedSummary {
    pub header: HeaderSummary,
    pub entity_count: usize,
    pub vehicles: Vec<VehicleSummary>,
    pub trip_updates: Vec<TripUpdateSummary>,
    pub alerts: Vec<AlertSummary>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HeaderSummary {
    pub version: String,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSummary {
    pub entity_id: String,
    pub vehicle_id: Option<String>,
    pub label: Option<String>,
    pub trip_id: Option<String>,
    pub route_id: Option<String>,
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,
    pub bearing: Option<f32>,
    pub stop_id: Option<String>,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TripUpdateSummary {
    pub entity_id: String,
    pub trip_id: Option<String>,
    pub route_id: Option<String>,
    pub delay: Option<i32>,
    pub stop_time_updates: usize,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub entity_id: String,
    pub header: Option<String>,
    pub description: Option<String>,
    pub route_ids: Vec<String>,
    pub stop_ids: Vec<String>,
}

/// Decodes a GTFS-Realtime protobuf body into a JSON-friendly summary.
pub fn decode_feed(body: &[u8]) -> Result<FeedSummary> {
    let feed = FeedMessage::decode(body)
        .map_err(|e| ApiError::Upstream(format!("Failed to decode GTFS-RT feed: {}", e)))?;

    let mut summary = FeedSummary {
        header: HeaderSummary {
            version: feed.header.gtfs_realtime_version.clone(),
            timestamp: feed.header.timestamp,
        },
        entity_count: feed.entity.len(),
        vehicles: Vec::new(),
        trip_updates: Vec::new(),
        alerts: Vec::new(),
    };

    for entity in feed.entity {
        if let Some(vehicle) = entity.vehicle {
            let descriptor = vehicle.vehicle.as_ref();
            let trip = vehicle.trip.as_ref();
            summary.vehicles.push(VehicleSummary {
                entity_id: entity.id.clone(),
                vehicle_id: descriptor.and_then(|v| v.id.clone()),
                label: descriptor.and_then(|v| v.label.clone()),
                trip_id: trip.and_then(|t| t.trip_id.clone()),
                route_id: trip.and_then(|t| t.route_id.clone()),
                latitude: vehicle.position.as_ref().map(|p| p.latitude),
                longitude: vehicle.position.as_ref().map(|p| p.longitude),
                bearing: vehicle.position.as_ref().and_then(|p| p.bearing),
                stop_id: vehicle.stop_id.clone(),
                timestamp: vehicle.timestamp,
            });
        }

        if let Some(update) = entity.trip_update {
            summary.trip_updates.push(TripUpdateSummary {
                entity_id: entity.id.clone(),
                trip_id: update.trip.trip_id.clone(),
                route_id: update.trip.route_id.clone(),
                delay: update.delay,
                stop_time_updates: update.stop_time_update.len(),
                timestamp: update.timestamp,
            });
        }

        if let Some(alert) = entity.alert {
            let first_text = |text: Option<gtfs_rt::TranslatedString>| {
                text.and_then(|t| t.translation.first().map(|tr| tr.text.clone()))
            };
            summary.alerts.push(AlertSummary {
                entity_id: entity.id.clone(),
                header: first_text(alert.header_text),
                description: first_text(alert.description_text),
                route_ids: alert
                    .informed_entity
                    .iter()
                    .filter_map(|e| e.route_id.clone())
                    .collect(),
                stop_ids: alert
                    .informed_entity
                    .iter()
                    .filter_map(|e| e.stop_id.clone())
                    .collect(),
            });
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretSource;
    use gtfs_rt::{
        FeedEntity, FeedHeader, Position, TripDescriptor, TripUpdate, VehicleDescriptor,
        VehiclePosition,
    };
    use std::collections::HashMap;
    use std::sync::Arc;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::load(Arc::new(vars) as Arc<dyn SecretSource>)
    }

    #[test]
    fn test_feed_url_key() {
        assert_eq!(feed_url_key("best", "vehicle_positions"), "BEST_VEHICLE_POSITIONS_URL");
        assert_eq!(feed_url_key("metro", "trip-updates"), "METRO_TRIP_UPDATES_URL");
    }

    #[test]
    fn test_unconfigured_feed() {
        let err = feed_request(&config(&[]), "best", "alerts").unwrap_err();
        match err {
            ApiError::NotConfigured { hint, .. } => assert_eq!(hint, "Set secret BEST_ALERTS_URL"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_agency_auth_header_applied() {
        let request = feed_request(
            &config(&[
                ("BEST_ALERTS_URL", "https://feeds.example/best/alerts"),
                ("BEST_AUTH_HEADER", "x-api-key"),
                ("BEST_AUTH_VALUE", "k123"),
            ]),
            "best",
            "alerts",
        )
        .unwrap();

        assert_eq!(request.url, "https://feeds.example/best/alerts");
        assert_eq!(request.headers["x-api-key"], "k123");
        assert_eq!(request.cache_ttl, Some(GTFS_CACHE_TTL));
    }

    #[test]
    fn test_invalid_segment_rejected() {
        assert!(matches!(
            feed_request(&config(&[]), "best", ""),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            feed_request(&config(&[]), "be st", "alerts"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_decode_feed_summary() {
        let feed = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".into(),
                timestamp: Some(1_700_000_000),
                ..Default::default()
            },
            entity: vec![
                FeedEntity {
                    id: "bus-1".into(),
                    vehicle: Some(VehiclePosition {
                        vehicle: Some(VehicleDescriptor {
                            id: Some("MH01-1234".into()),
                            label: Some("Route 83".into()),
                            ..Default::default()
                        }),
                        trip: Some(TripDescriptor {
                            trip_id: Some("t-83-1".into()),
                            route_id: Some("83".into()),
                            ..Default::default()
                        }),
                        position: Some(Position {
                            latitude: 19.07,
                            longitude: 72.87,
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                FeedEntity {
                    id: "trip-1".into(),
                    trip_update: Some(TripUpdate {
                        trip: TripDescriptor {
                            trip_id: Some("t-1".into()),
                            ..Default::default()
                        },
                        delay: Some(120),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let summary = decode_feed(&feed.encode_to_vec()).unwrap();
        assert_eq!(summary.header.version, "2.0");
        assert_eq!(summary.entity_count, 2);
        assert_eq!(summary.vehicles.len(), 1);
        assert_eq!(summary.vehicles[0].route_id.as_deref(), Some("83"));
        assert_eq!(summary.vehicles[0].latitude, Some(19.07));
        assert_eq!(summary.trip_updates[0].delay, Some(120));
        assert!(summary.alerts.is_empty());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_feed(&[0xff, 0xff, 0xff]).is_err());
    }
}
