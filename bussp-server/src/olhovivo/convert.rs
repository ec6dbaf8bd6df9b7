//! Conversion from Olho Vivo DTOs to display records.
//!
//! Each processed record keeps the raw upstream fields (flattened) and adds
//! a stable identifier plus human-facing labels.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::{format_arrival_time, format_distance, line_label};
use crate::location::{Coordinates, distance_m};

use super::types::{BusLine, BusPosition, BusStop, StopPrediction};

/// A bus line ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBusLine {
    #[serde(flatten)]
    pub raw: BusLine,
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_circular: bool,
    pub line_type: String,
    pub is_favorite: bool,
}

/// A vehicle position ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBusPosition {
    #[serde(flatten)]
    pub raw: BusPosition,
    pub id: String,
    pub bus_line: String,
    pub is_accessible: bool,
    /// `None` when the upstream timestamp does not parse.
    pub last_update: Option<DateTime<Utc>>,
}

/// A stop ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBusStop {
    #[serde(flatten)]
    pub raw: BusStop,
    pub id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Distance from the rider in metres.
    pub distance: Option<f64>,
    pub distance_label: Option<String>,
}

pub fn process_line(line: BusLine) -> ProcessedBusLine {
    ProcessedBusLine {
        id: format!("line-{}", line.cl),
        name: line_label(line.cl, &line.tp),
        description: line.tp.clone(),
        is_circular: line.lc,
        line_type: line.lt.clone(),
        is_favorite: false,
        raw: line,
    }
}

pub fn process_position(position: BusPosition, line_code: i64) -> ProcessedBusPosition {
    let last_update = DateTime::parse_from_rfc3339(&position.ta)
        .ok()
        .map(|t| t.with_timezone(&Utc));

    ProcessedBusPosition {
        id: format!("pos-{}-{}", position.p, position.ta),
        bus_line: line_code.to_string(),
        is_accessible: position.a,
        last_update,
        raw: position,
    }
}

pub fn process_stop(stop: BusStop) -> ProcessedBusStop {
    ProcessedBusStop {
        id: format!("stop-{}", stop.cp),
        name: stop.np.clone(),
        address: stop.ed.clone(),
        latitude: stop.py,
        longitude: stop.px,
        distance: None,
        distance_label: None,
        raw: stop,
    }
}

/// Annotate stops with their distance from `origin` and sort nearest first.
pub fn with_distances(stops: &mut [ProcessedBusStop], origin: Coordinates) {
    for stop in stops.iter_mut() {
        let d = distance_m(origin, Coordinates::new(stop.latitude, stop.longitude));
        stop.distance = Some(d);
        stop.distance_label = Some(format_distance(d));
    }
    stops.sort_by(|a, b| {
        a.distance
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.distance.unwrap_or(f64::INFINITY))
    });
}

/// One bus expected at a stop, flattened out of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    pub line_code: i64,
    /// Public sign, e.g. "8000-10"
    pub line_sign: String,
    pub destination: String,
    pub vehicle: String,
    pub is_accessible: bool,
    /// Predicted arrival ("HH:MM")
    pub arrives_at: String,
    /// Minutes after the prediction's reference time.
    pub minutes: Option<i64>,
    pub arrival_label: Option<String>,
}

/// Every vehicle in `prediction`, soonest first. Arrivals whose time can't
/// be read sort last.
pub fn arrivals(prediction: &StopPrediction) -> Vec<Arrival> {
    let Some(stop) = &prediction.p else {
        return Vec::new();
    };

    let mut arrivals: Vec<_> = stop
        .l
        .iter()
        .flat_map(|line| {
            line.vs.iter().map(move |vehicle| {
                let minutes = minutes_until(&prediction.hr, &vehicle.t);
                Arrival {
                    line_code: line.cl,
                    line_sign: line.c.clone(),
                    destination: line.lt0.clone(),
                    vehicle: vehicle.p.clone(),
                    is_accessible: vehicle.a,
                    arrives_at: vehicle.t.clone(),
                    minutes,
                    arrival_label: minutes.map(format_arrival_time),
                }
            })
        })
        .collect();

    arrivals.sort_by_key(|a| a.minutes.unwrap_or(i64::MAX));
    arrivals
}

/// Minutes from `reference` to `at`, both "HH:MM". An arrival more than
/// twelve hours "earlier" is taken to be after midnight.
fn minutes_until(reference: &str, at: &str) -> Option<i64> {
    let reference = NaiveTime::parse_from_str(reference.trim(), "%H:%M").ok()?;
    let at = NaiveTime::parse_from_str(at.trim(), "%H:%M").ok()?;
    let minutes = (at - reference).num_minutes();
    if minutes < -12 * 60 {
        Some(minutes + 24 * 60)
    } else {
        Some(minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> BusLine {
        BusLine {
            cl: 1273,
            lc: false,
            lt: "8000".into(),
            sl: 1,
            tp: "PCA.RAMOS DE AZEVEDO".into(),
            ts: "TERMINAL LAPA".into(),
        }
    }

    fn stop(cp: i64, py: f64, px: f64) -> BusStop {
        BusStop {
            cp,
            np: format!("STOP {cp}"),
            ed: "R ARMINDA".into(),
            py,
            px,
        }
    }

    #[test]
    fn line_gets_id_and_label() {
        let processed = process_line(line());
        assert_eq!(processed.id, "line-1273");
        assert_eq!(processed.name, "1273 - PCA.RAMOS DE AZEVEDO");
        assert_eq!(processed.description, "PCA.RAMOS DE AZEVEDO");
        assert_eq!(processed.line_type, "8000");
        assert!(!processed.is_favorite);
    }

    #[test]
    fn processed_line_serializes_flat() {
        let value = serde_json::to_value(process_line(line())).unwrap();
        assert_eq!(value["cl"], 1273);
        assert_eq!(value["id"], "line-1273");
    }

    #[test]
    fn position_parses_timestamp() {
        let position = BusPosition {
            p: "31490".into(),
            a: true,
            ta: "2017-05-12T01:20:29Z".into(),
            py: -23.5,
            px: -46.6,
        };
        let processed = process_position(position, 1273);
        assert_eq!(processed.id, "pos-31490-2017-05-12T01:20:29Z");
        assert_eq!(processed.bus_line, "1273");
        assert!(processed.is_accessible);
        assert!(processed.last_update.is_some());
    }

    #[test]
    fn position_with_bad_timestamp_has_no_update() {
        let position = BusPosition {
            p: "1".into(),
            a: false,
            ta: "yesterday".into(),
            py: 0.0,
            px: 0.0,
        };
        assert!(process_position(position, 1).last_update.is_none());
    }

    #[test]
    fn stops_sorted_by_distance() {
        let origin = Coordinates::new(-23.5505, -46.6333);
        let mut stops = vec![
            process_stop(stop(1, -23.60, -46.6333)),
            process_stop(stop(2, -23.5510, -46.6333)),
        ];

        with_distances(&mut stops, origin);

        assert_eq!(stops[0].id, "stop-2");
        assert!(stops[0].distance.unwrap() < 100.0);
        assert!(stops[1].distance_label.as_deref().unwrap().ends_with("km"));
    }

    fn prediction() -> StopPrediction {
        serde_json::from_value(serde_json::json!({
            "hr": "23:50",
            "p": {
                "cp": 4200953, "np": "PARADA ROBERTO SELMI DEI B/C", "py": -23.6, "px": -46.7,
                "l": [
                    {
                        "c": "7021-10", "cl": 1989, "sl": 1,
                        "lt0": "TERM. JOÃO DIAS", "lt1": "SHOP. CIDADE JARDIM", "qv": 2,
                        "vs": [
                            {"p": "74558", "t": "00:05", "a": true, "ta": "", "py": -23.6, "px": -46.7},
                            {"p": "74559", "t": "23:51", "a": false, "ta": "", "py": -23.6, "px": -46.7}
                        ]
                    },
                    {
                        "c": "8000-10", "cl": 1273, "sl": 1,
                        "lt0": "TERMINAL LAPA", "lt1": "PCA.RAMOS DE AZEVEDO", "qv": 1,
                        "vs": [
                            {"p": 11031, "t": "23:50", "a": true, "ta": "", "py": -23.6, "px": -46.7}
                        ]
                    }
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn arrivals_are_labelled_and_sorted() {
        let arrivals = arrivals(&prediction());

        let labels: Vec<_> = arrivals
            .iter()
            .map(|a| (a.vehicle.as_str(), a.arrival_label.as_deref()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("11031", Some("Chegando")),
                ("74559", Some("1 minuto")),
                ("74558", Some("15 minutos")),
            ]
        );
        assert_eq!(arrivals[0].destination, "TERMINAL LAPA");
        assert_eq!(arrivals[2].line_sign, "7021-10");
    }

    #[test]
    fn unreadable_times_sort_last() {
        let mut prediction = prediction();
        prediction.hr = "soon".into();

        let arrivals = arrivals(&prediction);
        assert_eq!(arrivals.len(), 3);
        assert!(arrivals.iter().all(|a| a.minutes.is_none() && a.arrival_label.is_none()));
    }

    #[test]
    fn no_stop_means_no_arrivals() {
        assert!(arrivals(&StopPrediction::default()).is_empty());
    }
}
