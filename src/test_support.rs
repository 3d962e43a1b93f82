//! Record fixtures shared by unit tests

use crate::models::{GsmRecord, LteRecord, SurveyHeader, SurveyRecord};

pub(crate) fn header(n: i32) -> SurveyHeader {
    SurveyHeader {
        device_serial_number: "ns-1".to_string(),
        device_name: "Pixel".to_string(),
        device_time: "2024-05-01T12:00:00Z".to_string(),
        latitude: 51.5 + f64::from(n) * 0.001,
        longitude: -0.12,
        altitude: 20.0,
        mission_id: Some("survey-1".to_string()),
        record_number: n,
        accuracy: 5,
        speed: Some(1.5),
    }
}

pub(crate) fn gsm_record(n: i32) -> SurveyRecord {
    SurveyRecord::Gsm(GsmRecord {
        header: header(n),
        group_number: n,
        mcc: Some(310),
        mnc: Some(260),
        lac: Some(1200),
        ci: Some(4000 + n),
        arfcn: Some(128),
        bsic: Some(12),
        signal_strength: Some(-80.0),
        ta: Some(2),
        serving_cell: Some(true),
        provider: Some("T-Mobile".to_string()),
        slot: None,
    })
}

pub(crate) fn lte_record(n: i32) -> SurveyRecord {
    SurveyRecord::Lte(LteRecord {
        header: header(n),
        group_number: n,
        mcc: Some(310),
        mnc: Some(410),
        tac: Some(7001),
        eci: Some(123_456 + n),
        earfcn: Some(5230),
        pci: Some(101),
        rsrp: Some(-97.0),
        rsrq: Some(-11.0),
        ta: Some(3),
        serving_cell: Some(true),
        lte_bandwidth: Some("10".to_string()),
        provider: Some("AT&T".to_string()),
        signal_strength: Some(-70.0),
        cqi: None,
        slot: Some(1),
        snr: Some(12.5),
    })
}
