//! Table layout and row mapping for survey record tables
//!
//! Every kind shares the same leading columns: the identity column, one
//! delivery flag per upload target and the survey header. Kind-specific
//! columns follow. Rows are read back by column name, so the column order
//! below only matters for inserts.

use rusqlite::types::Value;
use rusqlite::Row;

use crate::models::{
    CdmaRecord, DeliveryFlags, GsmRecord, LteRecord, NrRecord, RecordKind, StoredRecord,
    SurveyHeader, SurveyRecord, UmtsRecord, UploadTarget, WifiRecord,
};

/// Header columns written for every kind, in insert order
const HEADER_COLUMNS: &[(&str, &str)] = &[
    ("device_serial_number", "TEXT NOT NULL"),
    ("device_name", "TEXT NOT NULL"),
    ("device_time", "TEXT NOT NULL"),
    ("latitude", "REAL NOT NULL"),
    ("longitude", "REAL NOT NULL"),
    ("altitude", "REAL NOT NULL"),
    ("mission_id", "TEXT"),
    ("record_number", "INTEGER NOT NULL"),
    ("accuracy", "INTEGER NOT NULL"),
    ("speed", "REAL"),
];

const GSM_COLUMNS: &[(&str, &str)] = &[
    ("group_number", "INTEGER NOT NULL"),
    ("mcc", "INTEGER"),
    ("mnc", "INTEGER"),
    ("lac", "INTEGER"),
    ("ci", "INTEGER"),
    ("arfcn", "INTEGER"),
    ("bsic", "INTEGER"),
    ("signal_strength", "REAL"),
    ("ta", "INTEGER"),
    ("serving_cell", "INTEGER"),
    ("provider", "TEXT"),
    ("slot", "INTEGER"),
];

const CDMA_COLUMNS: &[(&str, &str)] = &[
    ("group_number", "INTEGER NOT NULL"),
    ("sid", "INTEGER"),
    ("nid", "INTEGER"),
    ("zone", "INTEGER"),
    ("bsid", "INTEGER"),
    ("channel", "INTEGER"),
    ("pn_offset", "INTEGER"),
    ("signal_strength", "REAL"),
    ("ecio", "REAL"),
    ("serving_cell", "INTEGER"),
    ("provider", "TEXT"),
    ("slot", "INTEGER"),
];

const UMTS_COLUMNS: &[(&str, &str)] = &[
    ("group_number", "INTEGER NOT NULL"),
    ("mcc", "INTEGER"),
    ("mnc", "INTEGER"),
    ("lac", "INTEGER"),
    ("cid", "INTEGER"),
    ("uarfcn", "INTEGER"),
    ("psc", "INTEGER"),
    ("rscp", "REAL"),
    ("signal_strength", "REAL"),
    ("ecno", "REAL"),
    ("serving_cell", "INTEGER"),
    ("provider", "TEXT"),
    ("slot", "INTEGER"),
];

const LTE_COLUMNS: &[(&str, &str)] = &[
    ("group_number", "INTEGER NOT NULL"),
    ("mcc", "INTEGER"),
    ("mnc", "INTEGER"),
    ("tac", "INTEGER"),
    ("eci", "INTEGER"),
    ("earfcn", "INTEGER"),
    ("pci", "INTEGER"),
    ("rsrp", "REAL"),
    ("rsrq", "REAL"),
    ("ta", "INTEGER"),
    ("serving_cell", "INTEGER"),
    ("lte_bandwidth", "TEXT"),
    ("provider", "TEXT"),
    ("signal_strength", "REAL"),
    ("cqi", "INTEGER"),
    ("slot", "INTEGER"),
    ("snr", "REAL"),
];

const NR_COLUMNS: &[(&str, &str)] = &[
    ("group_number", "INTEGER NOT NULL"),
    ("mcc", "INTEGER"),
    ("mnc", "INTEGER"),
    ("tac", "INTEGER"),
    ("nci", "INTEGER"),
    ("narfcn", "INTEGER"),
    ("pci", "INTEGER"),
    ("ss_rsrp", "REAL"),
    ("ss_rsrq", "REAL"),
    ("ss_sinr", "REAL"),
    ("csi_rsrp", "REAL"),
    ("csi_rsrq", "REAL"),
    ("csi_sinr", "REAL"),
    ("ta", "INTEGER"),
    ("serving_cell", "INTEGER"),
    ("provider", "TEXT"),
    ("slot", "INTEGER"),
];

const WIFI_COLUMNS: &[(&str, &str)] = &[
    ("bssid", "TEXT NOT NULL"),
    ("ssid", "TEXT"),
    ("source_address", "TEXT"),
    ("destination_address", "TEXT"),
    ("beacon_interval", "INTEGER"),
    ("service_set_type", "TEXT"),
    ("encryption_type", "TEXT"),
    ("channel", "INTEGER"),
    ("frequency_mhz", "INTEGER"),
    ("signal_strength", "REAL"),
    ("snr", "REAL"),
    ("wps", "INTEGER"),
    ("passpoint", "INTEGER"),
    ("bandwidth", "TEXT"),
    ("node_type", "TEXT"),
    ("standard", "TEXT"),
];

fn kind_columns(kind: RecordKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        RecordKind::Gsm => GSM_COLUMNS,
        RecordKind::Cdma => CDMA_COLUMNS,
        RecordKind::Umts => UMTS_COLUMNS,
        RecordKind::Lte => LTE_COLUMNS,
        RecordKind::Nr => NR_COLUMNS,
        RecordKind::Wifi => WIFI_COLUMNS,
    }
}

/// DDL for one kind table plus its pending-row index
pub(crate) fn create_table_sql(kind: RecordKind) -> String {
    let table = kind.table_name();

    let mut columns = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    columns.extend(
        UploadTarget::ALL
            .iter()
            .map(|t| format!("{} INTEGER NOT NULL DEFAULT 0", t.flag_column())),
    );
    columns.extend(
        HEADER_COLUMNS
            .iter()
            .chain(kind_columns(kind))
            .map(|(name, ty)| format!("{name} {ty}")),
    );

    let flag_columns: Vec<&str> = UploadTarget::ALL.iter().map(|t| t.flag_column()).collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    {}\n);\n\
         CREATE INDEX IF NOT EXISTS idx_{table}_pending ON {table}({});\n",
        columns.join(",\n    "),
        flag_columns.join(", ")
    )
}

/// INSERT statement for one kind, delivery flags left at their defaults
pub(crate) fn insert_sql(kind: RecordKind) -> String {
    let names: Vec<&str> = HEADER_COLUMNS
        .iter()
        .chain(kind_columns(kind))
        .map(|(name, _)| *name)
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        kind.table_name(),
        names.join(", "),
        placeholders.join(", ")
    )
}

fn int(v: Option<i32>) -> Value {
    v.map_or(Value::Null, |v| Value::Integer(i64::from(v)))
}

fn real(v: Option<f32>) -> Value {
    v.map_or(Value::Null, |v| Value::Real(f64::from(v)))
}

fn text(v: &Option<String>) -> Value {
    v.as_ref().map_or(Value::Null, |s| Value::Text(s.clone()))
}

fn flag(v: Option<bool>) -> Value {
    v.map_or(Value::Null, |b| Value::Integer(i64::from(b)))
}

fn header_values(h: &SurveyHeader) -> Vec<Value> {
    vec![
        Value::Text(h.device_serial_number.clone()),
        Value::Text(h.device_name.clone()),
        Value::Text(h.device_time.clone()),
        Value::Real(h.latitude),
        Value::Real(h.longitude),
        Value::Real(f64::from(h.altitude)),
        text(&h.mission_id),
        Value::Integer(i64::from(h.record_number)),
        Value::Integer(i64::from(h.accuracy)),
        real(h.speed),
    ]
}

/// Parameter values matching [`insert_sql`] for the record's kind
pub(crate) fn insert_values(record: &SurveyRecord) -> Vec<Value> {
    let mut values = header_values(record.header());

    let specific = match record {
        SurveyRecord::Gsm(r) => vec![
            Value::Integer(i64::from(r.group_number)),
            int(r.mcc),
            int(r.mnc),
            int(r.lac),
            int(r.ci),
            int(r.arfcn),
            int(r.bsic),
            real(r.signal_strength),
            int(r.ta),
            flag(r.serving_cell),
            text(&r.provider),
            int(r.slot),
        ],
        SurveyRecord::Cdma(r) => vec![
            Value::Integer(i64::from(r.group_number)),
            int(r.sid),
            int(r.nid),
            int(r.zone),
            int(r.bsid),
            int(r.channel),
            int(r.pn_offset),
            real(r.signal_strength),
            real(r.ecio),
            flag(r.serving_cell),
            text(&r.provider),
            int(r.slot),
        ],
        SurveyRecord::Umts(r) => vec![
            Value::Integer(i64::from(r.group_number)),
            int(r.mcc),
            int(r.mnc),
            int(r.lac),
            int(r.cid),
            int(r.uarfcn),
            int(r.psc),
            real(r.rscp),
            real(r.signal_strength),
            real(r.ecno),
            flag(r.serving_cell),
            text(&r.provider),
            int(r.slot),
        ],
        SurveyRecord::Lte(r) => vec![
            Value::Integer(i64::from(r.group_number)),
            int(r.mcc),
            int(r.mnc),
            int(r.tac),
            int(r.eci),
            int(r.earfcn),
            int(r.pci),
            real(r.rsrp),
            real(r.rsrq),
            int(r.ta),
            flag(r.serving_cell),
            text(&r.lte_bandwidth),
            text(&r.provider),
            real(r.signal_strength),
            int(r.cqi),
            int(r.slot),
            real(r.snr),
        ],
        SurveyRecord::Nr(r) => vec![
            Value::Integer(i64::from(r.group_number)),
            int(r.mcc),
            int(r.mnc),
            int(r.tac),
            r.nci.map_or(Value::Null, Value::Integer),
            int(r.narfcn),
            int(r.pci),
            real(r.ss_rsrp),
            real(r.ss_rsrq),
            real(r.ss_sinr),
            real(r.csi_rsrp),
            real(r.csi_rsrq),
            real(r.csi_sinr),
            int(r.ta),
            flag(r.serving_cell),
            text(&r.provider),
            int(r.slot),
        ],
        SurveyRecord::Wifi(r) => vec![
            Value::Text(r.bssid.clone()),
            text(&r.ssid),
            text(&r.source_address),
            text(&r.destination_address),
            int(r.beacon_interval),
            text(&r.service_set_type),
            text(&r.encryption_type),
            int(r.channel),
            int(r.frequency_mhz),
            real(r.signal_strength),
            real(r.snr),
            flag(r.wps),
            flag(r.passpoint),
            text(&r.bandwidth),
            text(&r.node_type),
            text(&r.standard),
        ],
    };

    values.extend(specific);
    values
}

fn get_f32(row: &Row<'_>, col: &str) -> rusqlite::Result<f32> {
    Ok(row.get::<_, f64>(col)? as f32)
}

fn get_opt_f32(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<f32>> {
    Ok(row.get::<_, Option<f64>>(col)?.map(|v| v as f32))
}

fn read_header(row: &Row<'_>) -> rusqlite::Result<SurveyHeader> {
    Ok(SurveyHeader {
        device_serial_number: row.get("device_serial_number")?,
        device_name: row.get("device_name")?,
        device_time: row.get("device_time")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        altitude: get_f32(row, "altitude")?,
        mission_id: row.get("mission_id")?,
        record_number: row.get("record_number")?,
        accuracy: row.get("accuracy")?,
        speed: get_opt_f32(row, "speed")?,
    })
}

fn read_flags(row: &Row<'_>) -> rusqlite::Result<DeliveryFlags> {
    Ok(DeliveryFlags {
        opencellid: row.get(UploadTarget::OpenCelliD.flag_column())?,
        beacondb: row.get(UploadTarget::BeaconDb.flag_column())?,
    })
}

/// Map a `SELECT *` row of the kind table back into a stored record
pub(crate) fn read_stored(kind: RecordKind, row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let header = read_header(row)?;

    let record = match kind {
        RecordKind::Gsm => SurveyRecord::Gsm(GsmRecord {
            header,
            group_number: row.get("group_number")?,
            mcc: row.get("mcc")?,
            mnc: row.get("mnc")?,
            lac: row.get("lac")?,
            ci: row.get("ci")?,
            arfcn: row.get("arfcn")?,
            bsic: row.get("bsic")?,
            signal_strength: get_opt_f32(row, "signal_strength")?,
            ta: row.get("ta")?,
            serving_cell: row.get("serving_cell")?,
            provider: row.get("provider")?,
            slot: row.get("slot")?,
        }),
        RecordKind::Cdma => SurveyRecord::Cdma(CdmaRecord {
            header,
            group_number: row.get("group_number")?,
            sid: row.get("sid")?,
            nid: row.get("nid")?,
            zone: row.get("zone")?,
            bsid: row.get("bsid")?,
            channel: row.get("channel")?,
            pn_offset: row.get("pn_offset")?,
            signal_strength: get_opt_f32(row, "signal_strength")?,
            ecio: get_opt_f32(row, "ecio")?,
            serving_cell: row.get("serving_cell")?,
            provider: row.get("provider")?,
            slot: row.get("slot")?,
        }),
        RecordKind::Umts => SurveyRecord::Umts(UmtsRecord {
            header,
            group_number: row.get("group_number")?,
            mcc: row.get("mcc")?,
            mnc: row.get("mnc")?,
            lac: row.get("lac")?,
            cid: row.get("cid")?,
            uarfcn: row.get("uarfcn")?,
            psc: row.get("psc")?,
            rscp: get_opt_f32(row, "rscp")?,
            signal_strength: get_opt_f32(row, "signal_strength")?,
            ecno: get_opt_f32(row, "ecno")?,
            serving_cell: row.get("serving_cell")?,
            provider: row.get("provider")?,
            slot: row.get("slot")?,
        }),
        RecordKind::Lte => SurveyRecord::Lte(LteRecord {
            header,
            group_number: row.get("group_number")?,
            mcc: row.get("mcc")?,
            mnc: row.get("mnc")?,
            tac: row.get("tac")?,
            eci: row.get("eci")?,
            earfcn: row.get("earfcn")?,
            pci: row.get("pci")?,
            rsrp: get_opt_f32(row, "rsrp")?,
            rsrq: get_opt_f32(row, "rsrq")?,
            ta: row.get("ta")?,
            serving_cell: row.get("serving_cell")?,
            lte_bandwidth: row.get("lte_bandwidth")?,
            provider: row.get("provider")?,
            signal_strength: get_opt_f32(row, "signal_strength")?,
            cqi: row.get("cqi")?,
            slot: row.get("slot")?,
            snr: get_opt_f32(row, "snr")?,
        }),
        RecordKind::Nr => SurveyRecord::Nr(NrRecord {
            header,
            group_number: row.get("group_number")?,
            mcc: row.get("mcc")?,
            mnc: row.get("mnc")?,
            tac: row.get("tac")?,
            nci: row.get("nci")?,
            narfcn: row.get("narfcn")?,
            pci: row.get("pci")?,
            ss_rsrp: get_opt_f32(row, "ss_rsrp")?,
            ss_rsrq: get_opt_f32(row, "ss_rsrq")?,
            ss_sinr: get_opt_f32(row, "ss_sinr")?,
            csi_rsrp: get_opt_f32(row, "csi_rsrp")?,
            csi_rsrq: get_opt_f32(row, "csi_rsrq")?,
            csi_sinr: get_opt_f32(row, "csi_sinr")?,
            ta: row.get("ta")?,
            serving_cell: row.get("serving_cell")?,
            provider: row.get("provider")?,
            slot: row.get("slot")?,
        }),
        RecordKind::Wifi => SurveyRecord::Wifi(WifiRecord {
            header,
            bssid: row.get("bssid")?,
            ssid: row.get("ssid")?,
            source_address: row.get("source_address")?,
            destination_address: row.get("destination_address")?,
            beacon_interval: row.get("beacon_interval")?,
            service_set_type: row.get("service_set_type")?,
            encryption_type: row.get("encryption_type")?,
            channel: row.get("channel")?,
            frequency_mhz: row.get("frequency_mhz")?,
            signal_strength: get_opt_f32(row, "signal_strength")?,
            snr: get_opt_f32(row, "snr")?,
            wps: row.get("wps")?,
            passpoint: row.get("passpoint")?,
            bandwidth: row.get("bandwidth")?,
            node_type: row.get("node_type")?,
            standard: row.get("standard")?,
        }),
    };

    Ok(StoredRecord {
        id: row.get("id")?,
        flags: read_flags(row)?,
        record,
    })
}
