#![allow(dead_code)]

use connectors::memory::{MemorySource, MemoryTable};
use model::{
    core::{data_type::DataType, value::Value},
    records::row::RawColumn,
};

pub mod integration;
pub mod utils;

pub const PATIENTS_SQL: &str = "SELECT PatientId, Name, Zip FROM patients";
pub const VISITS_SQL: &str = "SELECT PatientId, VisitDate, Reason FROM visits";

/// Ten patients with ids 1..=10. Patients 4 and 9 have no zip code.
pub fn patients_table() -> MemoryTable {
    const ZIPS: [Option<&str>; 10] = [
        Some("02139"),
        Some("02141"),
        Some("90210"),
        None,
        Some("02139"),
        Some("99999"),
        Some("2139"),
        Some("90210-1234"),
        None,
        Some("02141"),
    ];

    MemoryTable::new(vec![
        RawColumn::new("PatientId", DataType::Long),
        RawColumn::new("Name", DataType::VarChar),
        RawColumn::new("Zip", DataType::VarChar),
    ])
    .with_rows(
        ZIPS.iter()
            .enumerate()
            .map(|(i, zip)| {
                let id = i as i64 + 1;
                vec![
                    Value::Int(id),
                    Value::from(format!("patient-{id}")),
                    zip.map_or(Value::Null, Value::from),
                ]
            })
            .collect(),
    )
}

/// Two visits for every even patient id, none for odd ones.
pub fn visits_table() -> MemoryTable {
    MemoryTable::new(vec![
        RawColumn::new("PatientId", DataType::Long),
        RawColumn::new("VisitDate", DataType::VarChar),
        RawColumn::new("Reason", DataType::VarChar),
    ])
    .with_rows(
        (2..=10)
            .step_by(2)
            .flat_map(|id| {
                [
                    vec![Value::Int(id), Value::from("2024-01-05"), Value::from("checkup")],
                    vec![Value::Int(id), Value::from("2024-03-17"), Value::from("follow-up")],
                ]
            })
            .collect(),
    )
}

pub fn clinic_source() -> MemorySource {
    MemorySource::new()
        .with_table(PATIENTS_SQL, patients_table())
        .with_table(VISITS_SQL, visits_table())
}

/// A job over patient ids 1..=10, split into slices of four keys.
/// `extra` is appended verbatim and may add tables or data sources.
pub fn job_toml(entities_per_batch: usize, extra: &str) -> String {
    format!(
        r#"
        [job]
        name = "clinic"
        top_level_key_column = "PatientId"
        entities_per_batch = {entities_per_batch}
        queue_capacity = 4
        monitor_interval_secs = 0

        [source]
        driver = "postgres"
        url = "memory://"

        [workers]
        extract = 3
        assemble = 2
        batch = 2
        save = 2
        upload = 2

        [ranges]
        key_range = {{ start = 1, end = 10, slice_size = 4 }}

        [[data_sources]]
        sql = "{PATIENTS_SQL}"
        {extra}
        "#
    )
}
