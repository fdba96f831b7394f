#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};

use ghg_dashboard::error::DashError;
use ghg_dashboard::remote::RemoteClient;

pub const BASE_URL: &str = "https://data.example.org/ghg";

#[derive(Default)]
pub struct MockRemote {
    documents: HashMap<String, Value>,
    failing: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, document: Value) -> Self {
        self.documents.insert(url.to_string(), document);
        self
    }

    pub fn with_payload(self, filepath: &str, payload: Value) -> Self {
        self.with_document(&format!("{BASE_URL}/{filepath}"), payload)
    }

    /// The next `times` requests for `url` fail before it starts succeeding.
    pub fn failing(self, url: &str, times: usize) -> Self {
        self.failing
            .lock()
            .unwrap()
            .insert(url.to_string(), times);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| *call == url).count()
    }
}

impl RemoteClient for MockRemote {
    fn get_json(&self, url: &str) -> Result<Value, DashError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        {
            let mut failing = self.failing.lock().unwrap();
            if let Some(remaining) = failing.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DashError::FetchStatus {
                        status: 503,
                        message: "unavailable".to_string(),
                    });
                }
            }
        }
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| DashError::FetchStatus {
                status: 404,
                message: format!("no document at {url}"),
            })
    }
}

pub fn payload_url(filepath: &str) -> String {
    format!("{BASE_URL}/{filepath}")
}

pub fn leaf(filepath: &str, units: &str, site_name: &str) -> Value {
    json!({
        "filepath": filepath,
        "metadata": {
            "units": units,
            "long_name": site_name,
            "latitude": 52.5,
            "longitude": 1.1,
            "magl": "185m"
        }
    })
}

/// co2 at TAC and BSD, ch4 at TAC only, n2o at RGL only.
pub fn sample_catalogue() -> Value {
    json!({
        "co2": {
            "DECC": {
                "TAC": { "185m": { "picarro": leaf("co2/tac.json", "ppm", "tacolneston") } },
                "BSD": { "248m": { "picarro": leaf("co2/bsd.json", "ppm", "bilsdale") } }
            }
        },
        "ch4": {
            "DECC": {
                "TAC": { "185m": { "picarro": leaf("ch4/tac.json", "ppb", "tacolneston") } }
            }
        },
        "n2o": {
            "DECC": {
                "RGL": { "90m": { "medusa": leaf("n2o/rgl.json", "ppb", "ridge hill") } }
            }
        }
    })
}

pub fn sample_payload(offset: f64) -> Value {
    json!({
        "1577836800000": 410.0 + offset,
        "1577840400000": 411.5 + offset,
        "1577844000000": 412.25 + offset
    })
}

/// A mock serving every payload of [`sample_catalogue`].
pub fn sample_remote() -> MockRemote {
    MockRemote::new()
        .with_payload("co2/tac.json", sample_payload(0.0))
        .with_payload("co2/bsd.json", sample_payload(1.0))
        .with_payload("ch4/tac.json", sample_payload(1500.0))
        .with_payload("n2o/rgl.json", sample_payload(-80.0))
}
