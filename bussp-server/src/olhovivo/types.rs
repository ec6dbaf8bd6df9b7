//! Olho Vivo API response DTOs.
//!
//! These types map directly to the Olho Vivo v2.1 JSON responses, keeping
//! the upstream single-letter field names. Fields default when absent
//! because the API omits rather than nulls them in several places.

use serde::{Deserialize, Deserializer, Serialize};

/// A bus line from `GET /Linha/Buscar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusLine {
    /// Internal line code, used by every other endpoint.
    pub cl: i64,

    /// Whether the line is circular.
    #[serde(default)]
    pub lc: bool,

    /// First part of the public sign, e.g. "8000".
    #[serde(default, deserialize_with = "string_or_number")]
    pub lt: String,

    /// Direction (1 = main terminal to secondary, 2 = back).
    #[serde(default)]
    pub sl: i64,

    /// Destination shown in direction 1.
    #[serde(default)]
    pub tp: String,

    /// Destination shown in direction 2.
    #[serde(default)]
    pub ts: String,
}

/// A vehicle position on a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusPosition {
    /// Vehicle prefix.
    #[serde(deserialize_with = "string_or_number")]
    pub p: String,

    /// Accessible for people with reduced mobility.
    #[serde(default)]
    pub a: bool,

    /// UTC timestamp of the fix (ISO 8601).
    #[serde(default)]
    pub ta: String,

    /// Latitude.
    #[serde(alias = "lat")]
    pub py: f64,

    /// Longitude.
    #[serde(alias = "lng")]
    pub px: f64,
}

/// Response from `GET /Posicao/Linha`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinePositions {
    /// Local time the positions were generated ("HH:MM").
    #[serde(default)]
    pub hr: String,

    /// Vehicles currently on the line.
    #[serde(default)]
    pub vs: Vec<BusPosition>,
}

/// A stop from `GET /Parada/Buscar` or `GET /Parada/BuscarParadasProximas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusStop {
    /// Stop code.
    pub cp: i64,

    /// Stop name.
    #[serde(default)]
    pub np: String,

    /// Street address.
    #[serde(default)]
    pub ed: String,

    /// Latitude.
    pub py: f64,

    /// Longitude.
    pub px: f64,
}

/// Response from `GET /Previsao/Parada` and `GET /Previsao/Linha`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopPrediction {
    /// Local time the prediction was generated ("HH:MM").
    #[serde(default)]
    pub hr: String,

    /// The stop, absent when the API has no prediction for it.
    #[serde(default)]
    pub p: Option<PredictionStop>,
}

/// Stop section of a prediction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionStop {
    pub cp: i64,
    #[serde(default)]
    pub np: String,
    pub py: f64,
    pub px: f64,

    /// Lines expected at this stop.
    #[serde(default)]
    pub l: Vec<LinePrediction>,
}

/// One line expected at a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePrediction {
    /// Full public sign, e.g. "8000-10".
    #[serde(default)]
    pub c: String,
    pub cl: i64,
    #[serde(default)]
    pub sl: i64,
    #[serde(default)]
    pub lt0: String,
    #[serde(default)]
    pub lt1: String,

    /// Number of vehicles listed.
    #[serde(default)]
    pub qv: u32,

    #[serde(default)]
    pub vs: Vec<ArrivingVehicle>,
}

/// A vehicle with its predicted arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivingVehicle {
    #[serde(deserialize_with = "string_or_number")]
    pub p: String,

    /// Predicted arrival ("HH:MM").
    #[serde(default)]
    pub t: String,

    #[serde(default)]
    pub a: bool,

    #[serde(default)]
    pub ta: String,

    pub py: f64,
    pub px: f64,
}

/// The API is inconsistent about quoting vehicle prefixes and signs.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_search() {
        let json = r#"[
            {"cl":1273,"lc":false,"lt":"8000","sl":1,"tl":10,"tp":"PCA.RAMOS DE AZEVEDO","ts":"TERMINAL LAPA"}
        ]"#;

        let lines: Vec<BusLine> = serde_json::from_str(json).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].cl, 1273);
        assert_eq!(lines[0].lt, "8000");
        assert_eq!(lines[0].ts, "TERMINAL LAPA");
    }

    #[test]
    fn numeric_sign_is_accepted() {
        let json = r#"{"cl":1,"lt":8000,"tp":"A","ts":"B"}"#;
        let line: BusLine = serde_json::from_str(json).unwrap();
        assert_eq!(line.lt, "8000");
        assert!(!line.lc);
    }

    #[test]
    fn parse_positions() {
        let json = r#"{
            "hr":"22:20",
            "vs":[{"p":31490,"a":true,"ta":"2017-05-12T01:20:29Z","py":-23.5,"px":-46.6}]
        }"#;

        let positions: LinePositions = serde_json::from_str(json).unwrap();
        assert_eq!(positions.hr, "22:20");
        assert_eq!(positions.vs[0].p, "31490");
        assert!(positions.vs[0].a);
    }

    #[test]
    fn positions_accept_lat_lng_keys() {
        let json = r#"{"p":"1","a":false,"ta":"","lat":-23.1,"lng":-46.2}"#;
        let position: BusPosition = serde_json::from_str(json).unwrap();
        assert_eq!(position.py, -23.1);
        assert_eq!(position.px, -46.2);
    }

    #[test]
    fn empty_prediction() {
        let prediction: StopPrediction =
            serde_json::from_str(r#"{"hr":"20:09","p":null}"#).unwrap();
        assert!(prediction.p.is_none());
    }

    #[test]
    fn parse_prediction() {
        let json = r#"{
            "hr":"20:09",
            "p":{"cp":4200953,"np":"PARADA ROBERTO SELMI DEI B/C","py":-23.675,"px":-46.752,
                 "l":[{"c":"7021-10","cl":1989,"sl":1,"lt0":"TERM. JOAO DIAS","lt1":"JD. MARIA SAMPAIO","qv":1,
                       "vs":[{"p":"74558","t":"23:09","a":true,"ta":"2017-05-07T23:09:05Z","py":-23.678,"px":-46.755}]}]}
        }"#;

        let prediction: StopPrediction = serde_json::from_str(json).unwrap();
        let stop = prediction.p.unwrap();
        assert_eq!(stop.cp, 4200953);
        assert_eq!(stop.l[0].vs[0].t, "23:09");
    }
}
